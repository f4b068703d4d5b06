/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory, the CWD or the
/// data directories. Falls back to defaults if the file is missing,
/// incomplete or unparsable.
///
/// ```toml
/// [physics]
/// profile = "friction"      # or "instant"
/// gravity = 1800.0          # any MovementProfile field may be overridden
///
/// [timing]
/// step_hz = 60             # 1..=1000
/// max_frame_seconds = 0.25  # finite, > 0
///
/// [level]
/// world = 1
/// seed = "robot_cpp"        # optional: generate from this seed instead
/// variant = 0               # optional: with this layout variant
/// levels_dir = "levels"
///
/// [general]
/// lives = 3
/// log_level = "info"
/// log_file = "robot-parkour.log"   # relative paths land in the temp dir
/// ```

use serde::Deserialize;
use std::path::PathBuf;

use log::warn;
use thiserror::Error;

use crate::domain::entity::DEFAULT_LIVES;
use crate::domain::physics::MovementProfile;
use crate::sim::level::{LevelCatalog, LevelOrigin, LevelSource};
use crate::sim::runner::{FixedStep, MAX_FRAME_SECONDS};

/// Upper bound on `[timing] step_hz`.
pub const MAX_STEP_HZ: u32 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
    #[error("timing.step_hz must be in 1..={MAX_STEP_HZ}, got {0}")]
    StepRate(u32),
    #[error("timing.max_frame_seconds must be finite and positive, got {0}")]
    MaxFrame(f32),
}

// ── Public Config Struct ──

#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    pub physics: MovementProfile,
    pub timing: TimingConfig,
    pub level: LevelConfig,
    pub lives: u32,
    pub log_level: String,
    pub log_file: PathBuf,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimingConfig {
    pub step_hz: u32,
    pub max_frame_seconds: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LevelConfig {
    pub world: u32,
    pub variant: Option<usize>,
    pub seed: Option<String>,
    pub levels_dir: PathBuf,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    physics: TomlPhysics,
    #[serde(default)]
    timing: TomlTiming,
    #[serde(default)]
    level: TomlLevel,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlPhysics {
    #[serde(default = "default_profile")]
    profile: String,
    move_accel: Option<f32>,
    move_speed: Option<f32>,
    ground_friction: Option<f32>,
    air_friction: Option<f32>,
    gravity: Option<f32>,
    max_fall_speed: Option<f32>,
    jump_velocity: Option<f32>,
}

#[derive(Deserialize, Debug)]
struct TomlTiming {
    #[serde(default = "default_step_hz")]
    step_hz: u32,
    #[serde(default = "default_max_frame")]
    max_frame_seconds: f32,
}

#[derive(Deserialize, Debug)]
struct TomlLevel {
    #[serde(default = "default_world")]
    world: u32,
    variant: Option<usize>,
    seed: Option<String>,
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_lives")]
    lives: u32,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_log_file")]
    log_file: String,
}

// ── Defaults ──

fn default_profile() -> String { "friction".into() }
fn default_step_hz() -> u32 { 60 }
fn default_max_frame() -> f32 { MAX_FRAME_SECONDS }
fn default_world() -> u32 { 1 }
fn default_levels_dir() -> String { "levels".into() }
fn default_lives() -> u32 { DEFAULT_LIVES }
fn default_log_level() -> String { "info".into() }
fn default_log_file() -> String { "robot-parkour.log".into() }

impl Default for TomlPhysics {
    fn default() -> Self {
        TomlPhysics {
            profile: default_profile(),
            move_accel: None,
            move_speed: None,
            ground_friction: None,
            air_friction: None,
            gravity: None,
            max_fall_speed: None,
            jump_velocity: None,
        }
    }
}

impl Default for TomlTiming {
    fn default() -> Self {
        TomlTiming {
            step_hz: default_step_hz(),
            max_frame_seconds: default_max_frame(),
        }
    }
}

impl Default for TomlLevel {
    fn default() -> Self {
        TomlLevel {
            world: default_world(),
            variant: None,
            seed: None,
            levels_dir: default_levels_dir(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            lives: default_lives(),
            log_level: default_log_level(),
            log_file: default_log_file(),
        }
    }
}

impl TomlPhysics {
    fn profile(&self) -> MovementProfile {
        let mut p = match self.profile.to_ascii_lowercase().as_str() {
            "friction" => MovementProfile::friction(),
            "instant" => MovementProfile::instant(),
            other => {
                warn!("config: unknown physics profile `{other}`, using friction");
                MovementProfile::friction()
            }
        };
        if let Some(v) = self.move_accel { p.move_accel = v; }
        if let Some(v) = self.move_speed { p.move_speed = v; }
        if let Some(v) = self.ground_friction { p.ground_friction = v; }
        if let Some(v) = self.air_friction { p.air_friction = v; }
        if let Some(v) = self.gravity { p.gravity = v; }
        if let Some(v) = self.max_fall_speed { p.max_fall_speed = v; }
        if let Some(v) = self.jump_velocity { p.jump_velocity = v; }
        p
    }
}

impl From<TomlConfig> for GameConfig {
    fn from(cfg: TomlConfig) -> Self {
        GameConfig {
            physics: cfg.physics.profile(),
            timing: TimingConfig {
                step_hz: cfg.timing.step_hz,
                max_frame_seconds: cfg.timing.max_frame_seconds,
            },
            level: LevelConfig {
                world: cfg.level.world.max(1),
                variant: cfg.level.variant,
                seed: cfg.level.seed,
                levels_dir: PathBuf::from(cfg.level.levels_dir),
            },
            lives: cfg.general.lives,
            log_level: cfg.general.log_level,
            log_file: PathBuf::from(cfg.general.log_file),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        TomlConfig::default().into()
    }
}

impl TimingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.step_hz == 0 || self.step_hz > MAX_STEP_HZ {
            return Err(ConfigError::StepRate(self.step_hz));
        }
        if !self.max_frame_seconds.is_finite() || self.max_frame_seconds <= 0.0 {
            return Err(ConfigError::MaxFrame(self.max_frame_seconds));
        }
        Ok(())
    }
}

// ── Loading ──

impl GameConfig {
    /// Parse a config document. Missing sections and keys take defaults;
    /// timing values outside their range are rejected.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg = GameConfig::from(toml::from_str::<TomlConfig>(text)?);
        cfg.timing.validate()?;
        Ok(cfg)
    }

    /// Load config from `config.toml`.
    /// Search order: exe directory, CWD, `~/.local/share/robot-parkour`,
    /// `/usr/share/robot-parkour`. The first file found wins.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let mut cfg = load_toml(&search_dirs);

        // Resolve levels directory
        if cfg.level.levels_dir.is_relative() {
            if let Some(found) = search_dirs
                .iter()
                .map(|d| d.join(&cfg.level.levels_dir))
                .find(|p| p.is_dir())
            {
                cfg.level.levels_dir = found;
            }
        }
        cfg
    }

    /// Where log records go while the terminal UI owns the screen.
    pub fn log_path(&self) -> PathBuf {
        if self.log_file.is_absolute() {
            self.log_file.clone()
        } else {
            std::env::temp_dir().join(&self.log_file)
        }
    }

    pub fn fixed_step(&self) -> FixedStep {
        FixedStep::from_hz(self.timing.step_hz, self.timing.max_frame_seconds)
    }

    /// Source for the first level of a run: the configured world, with the
    /// generator inputs replaced by `[level] variant`/`seed` when given.
    pub fn start_source(&self, catalog: &LevelCatalog) -> Option<LevelSource> {
        let mut source = catalog
            .source(self.level.world, 1)
            .or_else(|| catalog.source(1, 1))?;
        if self.level.variant.is_none() && self.level.seed.is_none() {
            return Some(source);
        }
        let (base_variant, base_seed) = match &source.origin {
            LevelOrigin::Generated { variant, seed } => (*variant, seed.clone()),
            LevelOrigin::Legacy { .. } => (0, String::new()),
        };
        source.origin = LevelOrigin::Generated {
            variant: self.level.variant.unwrap_or(base_variant),
            seed: self.level.seed.clone().unwrap_or(base_seed),
        };
        Some(source)
    }
}

/// Candidate directories to search: exe dir + CWD + data paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/robot-parkour");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. System data directory
    let sys = PathBuf::from("/usr/share/robot-parkour");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> GameConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if !path.exists() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                return GameConfig::from_toml_str(&text).unwrap_or_else(|e| {
                    warn!("config: {} rejected, using defaults: {e}", path.display());
                    GameConfig::default()
                });
            }
            Err(e) => warn!("config: could not read {}: {e}", path.display()),
        }
    }
    GameConfig::default()
}
