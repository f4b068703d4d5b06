/// Entities: placements produced by level generation, and the Actor body.
///
/// Placements are immutable records. Whether a coin was collected or a
/// spike is active lives on the consuming side (`GameSession`), never on
/// the placement itself.

use std::collections::BTreeMap;

use super::collision::Rect;

/// Lives an actor starts with unless configured otherwise.
pub const DEFAULT_LIVES: u32 = 3;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Facing {
    Left,
    Right,
}

/// Placement type tag. Anything that is not one of the four core tags is an
/// enemy (or other consumer-defined) type and keeps its tag verbatim.
#[derive(Clone, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Coin,
    Spike,
    Flag,
    Spawn,
    Enemy(String),
}

impl EntityKind {
    /// Core tags match case-insensitively.
    pub fn from_tag(tag: &str) -> EntityKind {
        match tag.to_ascii_lowercase().as_str() {
            "coin" => EntityKind::Coin,
            "spike" => EntityKind::Spike,
            "flag" => EntityKind::Flag,
            "spawn" => EntityKind::Spawn,
            _ => EntityKind::Enemy(tag.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            EntityKind::Coin => "coin",
            EntityKind::Spike => "spike",
            EntityKind::Flag => "flag",
            EntityKind::Spawn => "spawn",
            EntityKind::Enemy(tag) => tag,
        }
    }
}

/// One entity record in a level blueprint.
///
/// `(x, y)` is a fractional tile position. `anchor` says which point of the
/// entity's own box sits there: `(0.5, 1.0)` is bottom-centre (standing on
/// a floor), `(0.5, 0.5)` is the centre.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityPlacement {
    pub kind: EntityKind,
    pub x: f32,
    pub y: f32,
    pub anchor: (f32, f32),
    pub extras: BTreeMap<String, String>,
}

impl EntityPlacement {
    pub fn new(kind: EntityKind, x: f32, y: f32, anchor: (f32, f32)) -> Self {
        EntityPlacement { kind, x, y, anchor, extras: BTreeMap::new() }
    }

    pub fn with_extra(mut self, key: &str, value: &str) -> Self {
        self.extras.insert(key.to_string(), value.to_string());
        self
    }

    /// Position in pixel space.
    pub fn pixel_pos(&self, tile_size: f32) -> (f32, f32) {
        (self.x * tile_size, self.y * tile_size)
    }

    /// Tile column/row containing the anchor point.
    pub fn tile_cell(&self) -> (i32, i32) {
        (self.x.floor() as i32, self.y.floor() as i32)
    }
}

/// Per-tick input intents. `jump` must be an edge pulse, see `JumpLatch`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameInput {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

/// Converts a held jump button into a one-tick pulse.
/// Holding the button never produces a second pulse until it is released.
#[derive(Clone, Copy, Debug, Default)]
pub struct JumpLatch {
    held: bool,
}

impl JumpLatch {
    pub fn pulse(&mut self, held_now: bool) -> bool {
        let fired = held_now && !self.held;
        self.held = held_now;
        fired
    }
}

/// The player body. `(x, y)` is the bottom-centre of its box (the feet).
#[derive(Clone, Debug, PartialEq)]
pub struct Actor {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub width: f32,
    pub height: f32,
    pub grounded: bool,
    pub facing: Facing,
    pub lives: u32,
    pub spawn: (f32, f32),
}

impl Actor {
    pub fn new(spawn_x: f32, spawn_y: f32, width: f32, height: f32) -> Self {
        Actor {
            x: spawn_x,
            y: spawn_y,
            vx: 0.0,
            vy: 0.0,
            width,
            height,
            grounded: false,
            facing: Facing::Right,
            lives: DEFAULT_LIVES,
            spawn: (spawn_x, spawn_y),
        }
    }

    pub fn with_lives(mut self, lives: u32) -> Self {
        self.lives = lives;
        self
    }

    pub fn half_width(&self) -> f32 {
        self.width * 0.5
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_feet(self.x, self.y, self.width, self.height)
    }

    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn reset_to_spawn(&mut self) {
        self.x = self.spawn.0;
        self.y = self.spawn.1;
        self.vx = 0.0;
        self.vy = 0.0;
        self.grounded = false;
    }

    /// Drop one life and respawn. Returns the lives left.
    pub fn lose_life(&mut self) -> u32 {
        self.lives = self.lives.saturating_sub(1);
        self.reset_to_spawn();
        self.lives
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags() {
        assert_eq!(EntityKind::from_tag("Spawn"), EntityKind::Spawn);
        assert_eq!(EntityKind::from_tag("coin").tag(), "coin");
        let enemy = EntityKind::from_tag("bugblob");
        assert_eq!(enemy, EntityKind::Enemy("bugblob".into()));
        assert_eq!(enemy.tag(), "bugblob");
    }

    #[test]
    fn placement_pixel_pos() {
        let p = EntityPlacement::new(EntityKind::Coin, 4.5, 12.4, (0.5, 0.5));
        let (px, py) = p.pixel_pos(32.0);
        assert_eq!(px, 144.0);
        assert!((py - 396.8).abs() < 1e-3);
        assert_eq!(p.tile_cell(), (4, 12));
    }

    #[test]
    fn jump_latch_fires_once_per_press() {
        let mut latch = JumpLatch::default();
        assert!(latch.pulse(true));
        assert!(!latch.pulse(true));
        assert!(!latch.pulse(true));
        assert!(!latch.pulse(false));
        assert!(latch.pulse(true));
    }

    #[test]
    fn lose_life_saturates_and_respawns() {
        let mut a = Actor::new(10.0, 20.0, 8.0, 8.0).with_lives(1);
        a.x = 99.0;
        a.vx = 5.0;
        a.grounded = true;
        assert_eq!(a.lose_life(), 0);
        assert_eq!((a.x, a.y, a.vx, a.grounded), (10.0, 20.0, 0.0, false));
        assert_eq!(a.lose_life(), 0);
    }

    #[test]
    fn bounds_from_feet() {
        let a = Actor::new(50.0, 100.0, 20.0, 30.0);
        assert_eq!(a.bounds(), Rect::new(40.0, 70.0, 60.0, 100.0));
        assert_eq!(a.half_width(), 10.0);
    }
}
