/// Driving a session in real time.
///
/// ## Pieces
/// ┌──────────────┬────────────────────────────────────────────────────────┐
/// │ Type         │ Role                                                   │
/// ├──────────────┼────────────────────────────────────────────────────────┤
/// │ FixedStep    │ wall-clock frame time → whole simulation steps         │
/// │ LoopThread   │ owns a GameSession on its own thread, takes commands   │
/// │ LevelLoader  │ builds a Blueprint on a worker, polled without waiting │
/// └──────────────┴────────────────────────────────────────────────────────┘
///
/// ## Accumulator
///
/// Each frame adds `min(frame_dt, max_frame)` to the accumulator and runs one
/// step per whole `step` it holds. The clamp keeps a long stall (debugger,
/// suspended terminal) from turning into a burst of hundreds of steps.
/// The simulation only ever sees the fixed `step`, never the frame time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::domain::entity::FrameInput;
use crate::domain::physics::FIXED_DT;
use crate::error::Result;

use super::builder::Blueprint;
use super::event::GameEvent;
use super::level::LevelSource;
use super::step;
use super::world::GameSession;

/// Longest frame the accumulator accepts, in seconds.
pub const MAX_FRAME_SECONDS: f32 = 0.25;

// ══════════════════════════════════════════════════════════════
// FixedStep
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedStep {
    step: f32,
    max_frame: f32,
    accumulator: f32,
}

impl Default for FixedStep {
    fn default() -> Self {
        FixedStep::new(FIXED_DT, MAX_FRAME_SECONDS)
    }
}

impl FixedStep {
    pub fn new(step: f32, max_frame: f32) -> Self {
        FixedStep { step, max_frame, accumulator: 0.0 }
    }

    /// `hz` steps per second. Zero falls back to the default rate.
    pub fn from_hz(hz: u32, max_frame: f32) -> Self {
        let step = if hz == 0 { FIXED_DT } else { 1.0 / hz as f32 };
        FixedStep::new(step, max_frame)
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Feed one frame's wall-clock time. Returns how many steps to run.
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        if !(self.step > 0.0) {
            return 0;
        }
        if frame_dt > 0.0 {
            self.accumulator += frame_dt.min(self.max_frame);
        }
        let mut steps = 0;
        while self.accumulator >= self.step {
            self.accumulator -= self.step;
            steps += 1;
        }
        steps
    }

    /// Fraction of a step left over, for render interpolation.
    pub fn alpha(&self) -> f32 {
        if self.step > 0.0 { self.accumulator / self.step } else { 0.0 }
    }

    /// How long until the next step is due.
    pub fn until_next(&self) -> Duration {
        Duration::from_secs_f32((self.step - self.accumulator).max(0.0))
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

// ══════════════════════════════════════════════════════════════
// LoopThread
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub enum LoopCommand {
    /// Held inputs from now on. A `jump` pulse is consumed by the next step.
    Input(FrameInput),
    Swap(Arc<Blueprint>),
    Restart,
    Viewport { width: f32, height: f32 },
}

/// A session stepped on a dedicated thread. The render callback runs on
/// that thread once per frame, after the frame's steps, with their events.
pub struct LoopThread {
    running: Arc<AtomicBool>,
    commands: Sender<LoopCommand>,
    handle: Option<JoinHandle<GameSession>>,
}

impl LoopThread {
    pub fn spawn<F>(session: GameSession, timing: FixedStep, render: F) -> std::io::Result<Self>
    where
        F: FnMut(&GameSession, &[GameEvent]) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel();
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("sim-loop".into())
            .spawn(move || run_loop(session, timing, rx, flag, render))?;
        Ok(LoopThread { running, commands: tx, handle: Some(handle) })
    }

    /// False once the loop has stopped.
    pub fn send(&self, command: LoopCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the loop and hand back the session. `None` if the loop panicked.
    pub fn stop(mut self) -> Option<GameSession> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<GameSession> {
        self.running.store(false, Ordering::Release);
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(session) => Some(session),
            Err(_) => {
                warn!("sim-loop thread panicked");
                None
            }
        }
    }
}

impl Drop for LoopThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop<F>(
    mut session: GameSession,
    mut timing: FixedStep,
    commands: Receiver<LoopCommand>,
    running: Arc<AtomicBool>,
    mut render: F,
) -> GameSession
where
    F: FnMut(&GameSession, &[GameEvent]),
{
    info!("sim-loop: started at {:.1} Hz", 1.0 / timing.step());
    let mut input = FrameInput::default();
    let mut last = Instant::now();
    let mut events = Vec::new();

    while running.load(Ordering::Acquire) {
        for command in commands.try_iter() {
            apply(&mut session, &mut input, &mut timing, command);
        }

        let now = Instant::now();
        let steps = timing.advance(now.duration_since(last).as_secs_f32());
        last = now;

        events.clear();
        for _ in 0..steps {
            events.extend(step::tick(&mut session, input, timing.step()));
            input.jump = false;
        }
        render(&session, &events);

        thread::sleep(timing.until_next());
    }

    // Commands sent before stop() still land.
    for command in commands.try_iter() {
        apply(&mut session, &mut input, &mut timing, command);
    }
    info!("sim-loop: stopped after {} ticks", session.tick);
    session
}

fn apply(session: &mut GameSession, input: &mut FrameInput, timing: &mut FixedStep, command: LoopCommand) {
    match command {
        LoopCommand::Input(next) => {
            // keep an unconsumed pulse
            let jump = input.jump || next.jump;
            *input = FrameInput { jump, ..next };
        }
        LoopCommand::Swap(blueprint) => {
            session.swap(blueprint);
            timing.reset();
        }
        LoopCommand::Restart => {
            session.restart();
            timing.reset();
        }
        LoopCommand::Viewport { width, height } => {
            session.set_viewport(width, height);
            session.snap_camera();
        }
    }
}

// ══════════════════════════════════════════════════════════════
// LevelLoader
// ══════════════════════════════════════════════════════════════

/// A finished background load.
#[derive(Debug)]
pub struct LoadedLevel {
    pub world: u32,
    pub stage: u32,
    pub result: Result<Blueprint>,
}

struct PendingLoad {
    world: u32,
    stage: u32,
    rx: Receiver<Result<Blueprint>>,
}

/// One level load at a time. A new request replaces the pending one; the
/// replaced worker finishes on its own and its result is dropped.
#[derive(Default)]
pub struct LevelLoader {
    pending: Option<PendingLoad>,
}

impl LevelLoader {
    pub fn new() -> Self {
        LevelLoader::default()
    }

    pub fn request(&mut self, source: LevelSource) {
        let (tx, rx) = mpsc::channel();
        let (world, stage) = (source.world, source.stage);
        debug!("loader: requested world {} stage {}", world, stage);

        let spawned = thread::Builder::new().name("level-loader".into()).spawn({
            let source = source.clone();
            let tx = tx.clone();
            move || {
                let _ = tx.send(source.load());
            }
        });
        if let Err(e) = spawned {
            warn!("loader: no worker thread ({e}), loading inline");
            let _ = tx.send(source.load());
        }
        self.pending = Some(PendingLoad { world, stage, rx });
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// The finished load, if there is one. Never blocks.
    pub fn poll(&mut self) -> Option<LoadedLevel> {
        let pending = self.pending.as_ref()?;
        match pending.rx.try_recv() {
            Ok(result) => self.finish(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                warn!("loader: worker for world {} stage {} died", pending.world, pending.stage);
                self.pending = None;
                None
            }
        }
    }

    /// Block until the pending load is done.
    pub fn wait(&mut self) -> Option<LoadedLevel> {
        let pending = self.pending.as_ref()?;
        match pending.rx.recv() {
            Ok(result) => self.finish(result),
            Err(_) => {
                self.pending = None;
                None
            }
        }
    }

    fn finish(&mut self, result: Result<Blueprint>) -> Option<LoadedLevel> {
        let pending = self.pending.take()?;
        Some(LoadedLevel { world: pending.world, stage: pending.stage, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::physics::MovementProfile;
    use crate::sim::level::{LevelCatalog, LevelOrigin};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn flat_session() -> GameSession {
        let bp = Blueprint::from_legacy_rows(&["R.......", "GGGGGGGG"], 32).unwrap();
        GameSession::new(Arc::new(bp), MovementProfile::friction(), 3)
    }

    #[test]
    fn advance_counts_whole_steps() {
        let mut t = FixedStep::new(0.0625, 0.25);
        assert_eq!(t.advance(0.15625), 2);
        assert_eq!(t.accumulator(), 0.03125);
        assert_eq!(t.alpha(), 0.5);
        assert_eq!(t.advance(0.015625), 0);
        assert_eq!(t.advance(0.03125), 1);
        assert_eq!(t.alpha(), 0.25);
    }

    #[test]
    fn advance_clamps_long_frames() {
        let mut t = FixedStep::new(0.0625, 0.25);
        assert_eq!(t.advance(10.0), 4);
        let mut sixty = FixedStep::default();
        assert!((14..=15).contains(&sixty.advance(5.0)));
    }

    #[test]
    fn advance_ignores_bad_input() {
        let mut t = FixedStep::new(0.01, 0.25);
        assert_eq!(t.advance(-1.0), 0);
        assert_eq!(t.advance(f32::NAN), 0);
        assert_eq!(t.accumulator(), 0.0);
        let mut stuck = FixedStep::new(0.0, 0.25);
        assert_eq!(stuck.advance(0.1), 0);
        assert_eq!(FixedStep::from_hz(0, 0.25).step(), FIXED_DT);
        assert_eq!(FixedStep::from_hz(120, 0.25).step(), 1.0 / 120.0);
    }

    #[test]
    fn loop_thread_steps_and_renders() {
        let frames = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&frames);
        let lt = LoopThread::spawn(flat_session(), FixedStep::default(), move |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
        assert!(lt.is_running());
        assert!(lt.send(LoopCommand::Input(FrameInput { right: true, ..FrameInput::default() })));
        thread::sleep(Duration::from_millis(150));
        let session = lt.stop().unwrap();
        assert!(session.tick > 0);
        assert!(session.actor.x > 16.0);
        assert!(frames.load(Ordering::Relaxed) > 0);
    }

    #[test]
    fn commands_before_stop_are_applied() {
        let lt = LoopThread::spawn(flat_session(), FixedStep::default(), |_, _| {}).unwrap();
        let wide = Blueprint::from_legacy_rows(&["............", ".....R......", "GGGGGGGGGGGG"], 32).unwrap();
        lt.send(LoopCommand::Viewport { width: 128.0, height: 64.0 });
        lt.send(LoopCommand::Swap(Arc::new(wide)));
        let session = lt.stop().unwrap();
        assert_eq!(session.blueprint.grid.width(), 12);
        assert_eq!(session.actor.spawn, (176.0, 64.0));
        assert_eq!((session.camera.view_w, session.camera.view_h), (128.0, 64.0));
    }

    #[test]
    fn jump_pulse_survives_until_consumed() {
        let mut s = flat_session();
        let mut input = FrameInput::default();
        let mut timing = FixedStep::default();
        apply(&mut s, &mut input, &mut timing, LoopCommand::Input(FrameInput { jump: true, ..FrameInput::default() }));
        apply(&mut s, &mut input, &mut timing, LoopCommand::Input(FrameInput { right: true, ..FrameInput::default() }));
        assert!(input.jump && input.right);
    }

    #[test]
    fn render_sees_finish_event() {
        let bp = Blueprint::from_legacy_rows(&["RF..", "GGGG"], 32).unwrap();
        let session = GameSession::new(Arc::new(bp), MovementProfile::friction(), 3);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let lt = LoopThread::spawn(session, FixedStep::default(), move |_, events| {
            if let Ok(mut v) = sink.lock() {
                v.extend(events.iter().cloned());
            }
        })
        .unwrap();
        lt.send(LoopCommand::Input(FrameInput { right: true, ..FrameInput::default() }));
        thread::sleep(Duration::from_millis(400));
        let session = lt.stop().unwrap();
        assert!(session.is_finished());
        let seen = seen.lock().unwrap();
        assert!(seen.iter().any(|e| matches!(e, GameEvent::Finished(r) if r.victory)));
    }

    #[test]
    fn loader_delivers_generated_level() {
        let catalog = LevelCatalog::standard(None);
        let mut loader = LevelLoader::new();
        assert!(loader.poll().is_none());
        loader.request(catalog.source(1, 1).unwrap());
        assert!(loader.is_loading());
        let loaded = loader.wait().unwrap();
        assert_eq!((loaded.world, loaded.stage), (1, 1));
        assert_eq!(loaded.result.unwrap().grid.width(), 180);
        assert!(!loader.is_loading());
    }

    #[test]
    fn newer_request_replaces_pending() {
        let mut loader = LevelLoader::new();
        let generated = |world: u32, seed: &str| LevelSource {
            world,
            stage: 1,
            origin: LevelOrigin::Generated { variant: world as usize - 1, seed: seed.into() },
            override_path: None,
        };
        loader.request(generated(1, "a"));
        loader.request(generated(2, "b"));
        let loaded = loader.wait().unwrap();
        assert_eq!(loaded.world, 2);
        assert!(loader.wait().is_none());
    }

    #[test]
    fn poll_eventually_yields() {
        let mut loader = LevelLoader::new();
        loader.request(LevelSource {
            world: 3,
            stage: 2,
            origin: LevelOrigin::Legacy { name: "Heap Caverns".into() },
            override_path: None,
        });
        let deadline = Instant::now() + Duration::from_secs(10);
        let loaded = loop {
            if let Some(l) = loader.poll() {
                break l;
            }
            assert!(Instant::now() < deadline, "loader never finished");
            thread::sleep(Duration::from_millis(5));
        };
        assert_eq!((loaded.world, loaded.stage), (3, 2));
        assert!(loaded.result.is_ok());
    }
}
