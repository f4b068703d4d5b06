/// Entry point: terminal front end around the simulation core.
///
/// Threads:
///   - main      : keyboard, level requests, viewport size; sends commands
///   - sim-loop  : steps the session at a fixed rate and draws each frame
///   - level-loader (transient): builds the next world's level

use std::error::Error;
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossterm::event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags};
use crossterm::{execute, terminal};
use env_logger::Target;
use log::{error, info, warn};

use robot_parkour::config::GameConfig;
use robot_parkour::sim::builder::Blueprint;
use robot_parkour::sim::level::LevelCatalog;
use robot_parkour::sim::runner::{LevelLoader, LoopCommand, LoopThread};
use robot_parkour::sim::world::GameSession;
use robot_parkour::ui::input::{KeyboardInput, MetaAction};
use robot_parkour::ui::renderer::Renderer;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

/// What the sim thread draws with. Shared so main can retitle and clean up.
struct Screen {
    renderer: Renderer,
    title: String,
}

fn main() {
    let config = GameConfig::load();
    init_logging(&config);

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        error!("terminal init failed: {e}");
        eprintln!("Terminal init failed: {e}");
        return;
    }
    let mut keys = KeyboardInput::new();
    keys.honor_release = enable_key_release();

    let screen = Arc::new(Mutex::new(Screen { renderer, title: String::new() }));
    let result = game_loop(&config, &screen, &mut keys);

    if keys.honor_release {
        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
    }
    match screen.lock() {
        Ok(mut s) => {
            if let Err(e) = s.renderer.cleanup() {
                eprintln!("Terminal cleanup failed: {e}");
            }
        }
        Err(_) => eprintln!("Terminal cleanup skipped: renderer lock poisoned"),
    }

    if let Err(e) = result {
        error!("game error: {e}");
        eprintln!("Game error: {e}");
    }
}

/// Logs go to a file: stderr shares the terminal with the alternate screen.
/// Without a writable file only warnings and errors are kept, on stderr.
fn init_logging(config: &GameConfig) {
    let path = config.log_path();
    let file = OpenOptions::new().create(true).append(true).open(&path);
    let level = if file.is_ok() { config.log_level.as_str() } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(level);
    let mut builder = env_logger::Builder::from_env(env);
    builder.format_timestamp_millis();
    match file {
        Ok(file) => {
            builder.target(Target::Pipe(Box::new(file)));
            builder.init();
        }
        Err(e) => {
            builder.init();
            warn!("log file {} unavailable: {e}", path.display());
        }
    }
}

/// Ask the terminal for key release events. False when unsupported.
fn enable_key_release() -> bool {
    if !matches!(terminal::supports_keyboard_enhancement(), Ok(true)) {
        return false;
    }
    execute!(
        std::io::stdout(),
        PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
    )
    .is_ok()
}

fn game_loop(config: &GameConfig, screen: &Arc<Mutex<Screen>>, keys: &mut KeyboardInput) -> Result<(), Box<dyn Error>> {
    let levels_dir = config.level.levels_dir.is_dir().then(|| config.level.levels_dir.clone());
    let mut catalog = LevelCatalog::standard(levels_dir);

    // The first level is built up front so the loop has something to step.
    let source = config.start_source(&catalog).ok_or("no playable world")?;
    let mut world = source.world;
    let first = catalog.store(source.world, source.stage, source.load()?);
    let mut tile_size = first.grid.tile_size() as f32;
    retitle(screen, &catalog, world);
    info!("starting in world {world}");

    let session = GameSession::new(first, config.physics, config.lives);
    let sink = Arc::clone(screen);
    let sim = LoopThread::spawn(session, config.fixed_step(), move |session, _events| {
        if let Ok(mut screen) = sink.lock() {
            let Screen { renderer, title } = &mut *screen;
            if let Err(e) = renderer.render(session, title) {
                warn!("render failed: {e}");
            }
        }
    })?;

    let mut loader = LevelLoader::new();
    let mut last_size = None;

    loop {
        keys.drain_events();

        match keys.meta_action() {
            Some(MetaAction::Quit) => break,
            Some(MetaAction::Restart) => {
                sim.send(LoopCommand::Restart);
            }
            Some(MetaAction::NextWorld) => {
                let next = catalog.next_world(world);
                match catalog.cached(next, 1) {
                    Some(bp) => {
                        world = next;
                        tile_size = swap_to(&sim, screen, &catalog, world, bp);
                        last_size = None;
                    }
                    None => {
                        if let Some(source) = catalog.source(next, 1) {
                            loader.request(source);
                        }
                    }
                }
            }
            None => {}
        }

        if let Some(loaded) = loader.poll() {
            match loaded.result {
                Ok(bp) => {
                    world = loaded.world;
                    let bp = catalog.store(loaded.world, loaded.stage, bp);
                    tile_size = swap_to(&sim, screen, &catalog, world, bp);
                    last_size = None;
                }
                Err(e) => warn!("world {} stage {} failed to load: {e}", loaded.world, loaded.stage),
            }
        }

        // Viewport follows the terminal size
        let size = terminal::size().unwrap_or((80, 24));
        if last_size != Some(size) {
            let (w, h) = Renderer::viewport_tiles(size.0, size.1);
            sim.send(LoopCommand::Viewport {
                width: w as f32 * tile_size,
                height: h as f32 * tile_size,
            });
            last_size = Some(size);
        }

        if !sim.send(LoopCommand::Input(keys.frame_input())) {
            break;
        }
        std::thread::sleep(FRAME_SLEEP);
    }

    if let Some(session) = sim.stop() {
        let r = session.result();
        info!("left world {world} after {:.1}s with {} coins", r.elapsed_seconds, r.coins);
    }
    Ok(())
}

/// Hand a new level to the sim thread. Returns its tile size.
fn swap_to(
    sim: &LoopThread,
    screen: &Arc<Mutex<Screen>>,
    catalog: &LevelCatalog,
    world: u32,
    bp: Arc<Blueprint>,
) -> f32 {
    let tile_size = bp.grid.tile_size() as f32;
    retitle(screen, catalog, world);
    sim.send(LoopCommand::Swap(bp));
    tile_size
}

fn retitle(screen: &Arc<Mutex<Screen>>, catalog: &LevelCatalog, world: u32) {
    let title = match catalog.world(world) {
        Some(info) => format!("World {} · {}", info.number, info.name),
        None => format!("World {world}"),
    };
    if let Ok(mut s) = screen.lock() {
        s.title = title;
    }
}
