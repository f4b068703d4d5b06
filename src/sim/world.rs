/// GameSession: one run through one level, plus the camera that watches it.
///
/// ## Level data vs. run state
///
/// The blueprint is shared (`Arc`) and **never mutated** by a run. Everything
/// a run changes lives on the session:
///   - `actor`     : position, velocity, lives
///   - `collected` : one flag per placement, true once a coin is picked up
///   - `coins`, `elapsed`, `phase`, `tick`
///
/// `restart()` rebuilds that state from the same blueprint; `swap()` binds a
/// new one.
///
/// ## Camera / Viewport
///
/// Pixel space on both sides:
///   - `camera.(x, y)`: world pixel at the top-left of the view
///   - `world_to_view(wx, wy) = (wx - camera.x, wy - camera.y)`
///   - The camera follows the actor's box centre with a dead zone of
///     ±30% of the view width and ±20% of the view height around the
///     view centre, and scrolls by exactly the overshoot.
///   - Position is always clamped to `[0, max(0, world - view)]`.

use std::sync::Arc;

use log::info;

use crate::domain::collision::Rect;
use crate::domain::entity::{Actor, EntityKind, EntityPlacement, DEFAULT_LIVES};
use crate::domain::physics::MovementProfile;

use super::builder::Blueprint;
use super::event::RunResult;

/// Horizontal dead-zone half-width, as a fraction of the view width.
const DEAD_ZONE_X: f32 = 0.3;
/// Vertical dead-zone half-height, as a fraction of the view height.
const DEAD_ZONE_Y: f32 = 0.2;

/// Actor box, in tiles.
pub const ACTOR_WIDTH_TILES: f32 = 0.8;
pub const ACTOR_HEIGHT_TILES: f32 = 0.95;

/// Coin pickup box edge, in tiles.
const COIN_SIZE_TILES: f32 = 0.6;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Playing,
    Won,
    Lost,
}

// ══════════════════════════════════════════════════════════════
// Camera
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Camera {
    /// World X of the left edge of the view
    pub x: f32,
    /// World Y of the top edge of the view
    pub y: f32,
    pub view_w: f32,
    pub view_h: f32,
    world_w: f32,
    world_h: f32,
}

impl Camera {
    pub fn new(view_w: f32, view_h: f32) -> Self {
        Camera { view_w, view_h, ..Camera::default() }
    }

    pub fn set_viewport(&mut self, view_w: f32, view_h: f32) {
        self.view_w = view_w;
        self.view_h = view_h;
        self.clamp_to_world();
    }

    pub fn set_world_size(&mut self, world_w: f32, world_h: f32) {
        self.world_w = world_w;
        self.world_h = world_h;
        self.clamp_to_world();
    }

    pub fn world_size(&self) -> (f32, f32) {
        (self.world_w, self.world_h)
    }

    /// Jump straight to `(x, y)` (still clamped). Used on load and respawn.
    pub fn snap_to(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.clamp_to_world();
    }

    /// Scroll just enough to bring `(target_x, target_y)` back inside the dead zone.
    pub fn follow(&mut self, target_x: f32, target_y: f32) {
        let zone_x = self.view_w * DEAD_ZONE_X;
        let left = self.x + self.view_w * 0.5 - zone_x;
        let right = self.x + self.view_w * 0.5 + zone_x;
        if target_x < left {
            self.x -= left - target_x;
        } else if target_x > right {
            self.x += target_x - right;
        }

        let zone_y = self.view_h * DEAD_ZONE_Y;
        let top = self.y + self.view_h * 0.5 - zone_y;
        let bottom = self.y + self.view_h * 0.5 + zone_y;
        if target_y < top {
            self.y -= top - target_y;
        } else if target_y > bottom {
            self.y += target_y - bottom;
        }

        self.clamp_to_world();
    }

    /// Convert a world pixel to view space. May be negative or past the view.
    pub fn world_to_view(&self, wx: f32, wy: f32) -> (f32, f32) {
        (wx - self.x, wy - self.y)
    }

    pub fn sees(&self, r: &Rect) -> bool {
        r.intersects(&Rect::new(self.x, self.y, self.x + self.view_w, self.y + self.view_h))
    }

    fn clamp_to_world(&mut self) {
        let max_x = (self.world_w - self.view_w).max(0.0);
        let max_y = (self.world_h - self.view_h).max(0.0);
        self.x = self.x.clamp(0.0, max_x);
        self.y = self.y.clamp(0.0, max_y);
    }
}

// ══════════════════════════════════════════════════════════════
// GameSession
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct GameSession {
    pub blueprint: Arc<Blueprint>,
    pub actor: Actor,
    pub profile: MovementProfile,
    pub camera: Camera,

    // ── Run state ──
    pub collected: Vec<bool>,
    pub coins: u32,
    pub elapsed: f32,
    pub phase: Phase,
    pub tick: u64,
    pub starting_lives: u32,
}

impl GameSession {
    pub fn new(blueprint: Arc<Blueprint>, profile: MovementProfile, lives: u32) -> Self {
        let ts = blueprint.grid.tile_size() as f32;
        let (sx, sy) = blueprint.spawn_point();
        let mut session = GameSession {
            actor: Actor::new(sx, sy, ts * ACTOR_WIDTH_TILES, ts * ACTOR_HEIGHT_TILES).with_lives(lives),
            collected: vec![false; blueprint.placements.len()],
            blueprint,
            profile,
            camera: Camera::default(),
            coins: 0,
            elapsed: 0.0,
            phase: Phase::Playing,
            tick: 0,
            starting_lives: lives,
        };
        session.bind_camera();
        session
    }

    /// A session with the default life count.
    pub fn with_profile(blueprint: Arc<Blueprint>, profile: MovementProfile) -> Self {
        GameSession::new(blueprint, profile, DEFAULT_LIVES)
    }

    /// Start the same level over. The camera keeps its viewport.
    pub fn restart(&mut self) {
        let viewport = (self.camera.view_w, self.camera.view_h);
        *self = GameSession::new(Arc::clone(&self.blueprint), self.profile, self.starting_lives);
        self.camera.set_viewport(viewport.0, viewport.1);
        self.snap_camera();
    }

    /// Bind a different level and start over on it.
    pub fn swap(&mut self, blueprint: Arc<Blueprint>) {
        info!(
            "session: swapping to a {}x{} level",
            blueprint.grid.width(),
            blueprint.grid.height()
        );
        self.blueprint = blueprint;
        self.restart();
    }

    pub fn tile_size(&self) -> f32 {
        self.blueprint.grid.tile_size() as f32
    }

    pub fn is_finished(&self) -> bool {
        self.phase != Phase::Playing
    }

    pub fn coin_total(&self) -> usize {
        self.blueprint.count(&EntityKind::Coin)
    }

    pub fn is_collected(&self, index: usize) -> bool {
        self.collected.get(index).copied().unwrap_or(false)
    }

    /// Hit box of a placement in world pixels, or `None` for kinds the
    /// session never touches (spawn points, enemies).
    pub fn entity_bounds(&self, placement: &EntityPlacement) -> Option<Rect> {
        let ts = self.tile_size();
        let edge = match placement.kind {
            EntityKind::Coin => ts * COIN_SIZE_TILES,
            EntityKind::Spike | EntityKind::Flag => ts,
            EntityKind::Spawn | EntityKind::Enemy(_) => return None,
        };
        let (px, py) = placement.pixel_pos(ts);
        Some(Rect::anchored(px, py, edge, edge, placement.anchor))
    }

    pub fn result(&self) -> RunResult {
        RunResult {
            elapsed_seconds: self.elapsed,
            coins: self.coins,
            victory: self.phase == Phase::Won,
            lives_remaining: self.actor.lives,
        }
    }

    pub fn set_viewport(&mut self, view_w: f32, view_h: f32) {
        self.camera.set_viewport(view_w, view_h);
    }

    /// Centre the view horizontally on the actor, top row at the top.
    pub fn snap_camera(&mut self) {
        let x = (self.actor.x - self.camera.view_w * 0.5).max(0.0);
        self.camera.snap_to(x, 0.0);
    }

    pub(crate) fn follow_actor(&mut self) {
        let b = self.actor.bounds();
        self.camera.follow((b.left + b.right) * 0.5, (b.top + b.bottom) * 0.5);
    }

    fn bind_camera(&mut self) {
        let grid = &self.blueprint.grid;
        self.camera.set_world_size(grid.pixel_width(), grid.pixel_height());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grid::TileGrid;

    fn camera(view: (f32, f32), world: (f32, f32)) -> Camera {
        let mut c = Camera::new(view.0, view.1);
        c.set_world_size(world.0, world.1);
        c
    }

    fn session_from(rows: &[&str]) -> GameSession {
        let bp = Blueprint::from_legacy_rows(rows, 32).unwrap();
        GameSession::new(Arc::new(bp), MovementProfile::friction(), 3)
    }

    #[test]
    fn follow_inside_dead_zone_is_still() {
        let mut c = camera((100.0, 100.0), (1000.0, 1000.0));
        c.snap_to(200.0, 200.0);
        // centre is (250, 250); zone is [220, 280] x [230, 270]
        c.follow(221.0, 269.0);
        assert_eq!((c.x, c.y), (200.0, 200.0));
    }

    #[test]
    fn follow_scrolls_by_overshoot() {
        let mut c = camera((100.0, 100.0), (1000.0, 1000.0));
        c.snap_to(200.0, 200.0);
        c.follow(300.0, 250.0);
        assert_eq!((c.x, c.y), (220.0, 200.0));
        c.follow(220.0, 200.0);
        assert_eq!((c.x, c.y), (200.0, 170.0));
    }

    #[test]
    fn follow_clamps_to_world() {
        let mut c = camera((100.0, 100.0), (300.0, 150.0));
        c.follow(-500.0, -500.0);
        assert_eq!((c.x, c.y), (0.0, 0.0));
        c.follow(5000.0, 5000.0);
        assert_eq!((c.x, c.y), (200.0, 50.0));
    }

    #[test]
    fn small_world_pins_camera_at_origin() {
        let mut c = camera((640.0, 480.0), (320.0, 160.0));
        c.snap_to(100.0, 100.0);
        assert_eq!((c.x, c.y), (0.0, 0.0));
        c.follow(300.0, 150.0);
        assert_eq!((c.x, c.y), (0.0, 0.0));
    }

    #[test]
    fn shrinking_world_reclamps() {
        let mut c = camera((100.0, 100.0), (1000.0, 1000.0));
        c.snap_to(800.0, 800.0);
        c.set_world_size(500.0, 500.0);
        assert_eq!((c.x, c.y), (400.0, 400.0));
        assert_eq!(c.world_to_view(450.0, 410.0), (50.0, 10.0));
        assert!(c.sees(&Rect::new(490.0, 490.0, 510.0, 510.0)));
        assert!(!c.sees(&Rect::new(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn session_spawns_actor_on_marker() {
        let s = session_from(&[
            "......",
            ".R..F.",
            "GGGGGG",
        ]);
        assert_eq!((s.actor.x, s.actor.y), (48.0, 64.0));
        assert!((s.actor.width - 25.6).abs() < 1e-4);
        assert!((s.actor.height - 30.4).abs() < 1e-4);
        assert_eq!(s.actor.lives, 3);
        assert_eq!(s.phase, Phase::Playing);
        assert_eq!(s.camera.world_size(), (192.0, 96.0));
    }

    #[test]
    fn session_without_spawn_uses_default_point() {
        let s = session_from(&[
            "......",
            "......",
            "GGGGGG",
        ]);
        assert_eq!((s.actor.x, s.actor.y), (80.0, 32.0));
    }

    #[test]
    fn entity_boxes() {
        let s = session_from(&[
            ".C.S.F",
            "GGGGGG",
        ]);
        let boxes: Vec<Option<Rect>> =
            s.blueprint.placements.iter().map(|p| s.entity_bounds(p)).collect();
        let coin = boxes[0].unwrap();
        // centred at (48, 12.8), 19.2 px square
        assert!((coin.left - 38.4).abs() < 1e-3 && (coin.top - 3.2).abs() < 1e-3);
        assert!((coin.width() - 19.2).abs() < 1e-3);
        assert_eq!(boxes[1], Some(Rect::new(96.0, 0.0, 128.0, 32.0)));
        assert_eq!(boxes[2], Some(Rect::new(160.0, 0.0, 192.0, 32.0)));
        assert_eq!(s.coin_total(), 1);
    }

    #[test]
    fn spawn_and_enemies_have_no_box() {
        let grid = TileGrid::from_rows(&["....", "GGGG"], 32).unwrap();
        let bp = Blueprint::new(
            grid,
            vec![
                EntityPlacement::new(EntityKind::Spawn, 1.5, 1.0, (0.5, 1.0)),
                EntityPlacement::new(EntityKind::Enemy("bugblob".into()), 2.5, 1.0, (0.5, 1.0)),
            ],
        );
        let s = GameSession::with_profile(Arc::new(bp), MovementProfile::instant());
        assert!(s.blueprint.placements.iter().all(|p| s.entity_bounds(p).is_none()));
        assert_eq!(s.starting_lives, DEFAULT_LIVES);
    }

    #[test]
    fn restart_resets_run_state_and_keeps_viewport() {
        let mut s = session_from(&[
            "..........",
            ".R.C....F.",
            "GGGGGGGGGG",
        ]);
        s.set_viewport(100.0, 60.0);
        s.actor.x = 200.0;
        s.actor.lives = 1;
        s.collected[1] = true;
        s.coins = 1;
        s.elapsed = 4.0;
        s.phase = Phase::Lost;
        s.tick = 99;

        s.restart();
        assert_eq!((s.actor.x, s.actor.lives), (48.0, 3));
        assert!(s.collected.iter().all(|c| !c));
        assert_eq!((s.coins, s.elapsed, s.phase, s.tick), (0, 0.0, Phase::Playing, 0));
        assert_eq!((s.camera.view_w, s.camera.view_h), (100.0, 60.0));
        assert_eq!(s.camera.x, 0.0);
    }

    #[test]
    fn swap_binds_new_level() {
        let mut s = session_from(&["R...", "GGGG"]);
        let other = Blueprint::from_legacy_rows(&["......", "....R.", "GGGGGG"], 32).unwrap();
        s.swap(Arc::new(other));
        assert_eq!(s.blueprint.grid.width(), 6);
        assert_eq!((s.actor.x, s.actor.y), (144.0, 64.0));
        assert_eq!(s.collected.len(), 1);
        assert_eq!(s.camera.world_size(), (192.0, 96.0));
    }

    #[test]
    fn result_reports_run() {
        let mut s = session_from(&["R..F", "GGGG"]);
        s.elapsed = 12.5;
        s.coins = 4;
        s.phase = Phase::Won;
        s.actor.lives = 2;
        assert_eq!(
            s.result(),
            RunResult { elapsed_seconds: 12.5, coins: 4, victory: true, lives_remaining: 2 }
        );
    }
}
