/// LevelBuilder: an imperative painter over a flat tile buffer, plus the
/// Blueprint it produces.
///
/// ## Floor layout
///
/// A level is `floors` horizontal tiers. Floor 0 is the ground row at the
/// bottom; each higher floor sits `floor_spacing = clearance + 1` rows above
/// the previous one, and `top_margin` rows are left free above the top floor:
///
/// ```text
///   height      = top_margin + floors * floor_spacing + 1
///   floor_row(i) = (height - 1) - i * floor_spacing
/// ```
///
/// ## Clamping contract
///
/// Every operation clips its inputs to the buffer: floors are clamped to
/// `[0, floors)`, columns and rows to the buffer, and ranges with
/// `end < start` paint nothing. Nothing here returns an error or panics on
/// out-of-range coordinates. Generation parameters are derived internally
/// and a stray coordinate must never abort a level load.
///
/// ## Protected cells
///
/// Cells painted inside `protect()` belong to the main route. `carve_gap`
/// leaves them alone, so decoration passes cannot cut the route.

use std::collections::BTreeMap;

use log::debug;

use crate::domain::entity::{EntityKind, EntityPlacement};
use crate::domain::grid::{TileGrid, MAX_CELLS};
use crate::domain::physics::{MovementProfile, FIXED_DT};
use crate::domain::rules::{self, JumpEnvelope, Reach};
use crate::domain::tile::Tile;

/// Anchor for things standing on a floor.
const FEET: (f32, f32) = (0.5, 1.0);
/// Anchor for things floating in the air.
const CENTRE: (f32, f32) = (0.5, 0.5);

/// Height above the floor top at which coin cells sit, in tiles.
pub const COIN_LIFT: f32 = 1.6;

/// Coin centre below the top of its cell, in tiles.
const COIN_DROP: f32 = 0.4;

/// Cap on floors, clearance and margin.
const MAX_SHAPE: usize = 1024;

// ══════════════════════════════════════════════════════════════
// Blueprint
// ══════════════════════════════════════════════════════════════

/// The product of level generation: terrain plus entity placements.
#[derive(Clone, Debug, PartialEq)]
pub struct Blueprint {
    pub grid: TileGrid,
    pub placements: Vec<EntityPlacement>,
}

impl Blueprint {
    pub fn new(grid: TileGrid, placements: Vec<EntityPlacement>) -> Self {
        Blueprint { grid, placements }
    }

    /// Terrain as legacy row strings.
    pub fn rows(&self) -> Vec<String> {
        self.grid.rows()
    }

    pub fn count(&self, kind: &EntityKind) -> usize {
        self.placements.iter().filter(|p| &p.kind == kind).count()
    }

    pub fn spawn(&self) -> Option<&EntityPlacement> {
        self.placements.iter().find(|p| p.kind == EntityKind::Spawn)
    }

    pub fn flag(&self) -> Option<&EntityPlacement> {
        self.placements.iter().find(|p| p.kind == EntityKind::Flag)
    }

    /// Spawn point in pixels (feet position). Levels without a spawn
    /// placement start 2.5 tiles in and two tiles above the bottom.
    pub fn spawn_point(&self) -> (f32, f32) {
        let ts = self.grid.tile_size() as f32;
        match self.spawn() {
            Some(p) => p.pixel_pos(ts),
            None => (ts * 2.5, self.grid.pixel_height() - ts * 2.0),
        }
    }

    /// Can an actor of `actor_height` pixels, moving with `profile`, get from
    /// the spawn to the flag? Levels without a flag are trivially complete.
    pub fn is_traversable(&self, profile: &MovementProfile, actor_height: f32) -> bool {
        let ts = self.grid.tile_size() as f32;
        let envelope = JumpEnvelope::from_profile(profile, FIXED_DT, ts);
        let reach = Reach::new(&self.grid, envelope, rules::clearance_rows(actor_height, ts));

        let Some(flag) = self.flag() else { return true };
        let (sx, sy) = self.spawn_point();
        let start = ((sx / ts).floor() as i32, feet_row(sy / ts));
        let goal = (flag.x.floor() as i32, feet_row(flag.y));
        reach.can_reach(start, goal)
    }
}

/// Row whose bottom edge is at (or just below) tile coordinate `y`.
fn feet_row(y: f32) -> i32 {
    y.ceil() as i32 - 1
}

// ══════════════════════════════════════════════════════════════
// LevelBuilder
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct LevelBuilder {
    width: usize,
    height: usize,
    floors: usize,
    floor_spacing: usize,
    tile_size: u32,
    cells: Vec<Tile>,
    protected: Vec<bool>,
    protecting: bool,
    placements: Vec<EntityPlacement>,
}

impl LevelBuilder {
    /// Empty buffer. Zero sizes are bumped to one; the total stays within
    /// `MAX_CELLS`.
    pub fn new(width: usize, floors: usize, floor_clearance: usize, top_margin: usize, tile_size: u32) -> Self {
        let floors = floors.clamp(1, MAX_SHAPE);
        let floor_spacing = floor_clearance.min(MAX_SHAPE) + 1;
        let height = top_margin.min(MAX_SHAPE) + floors * floor_spacing + 1;
        let width = width.min(MAX_CELLS / height).max(1);
        LevelBuilder {
            width,
            height,
            floors,
            floor_spacing,
            tile_size: tile_size.max(1),
            cells: vec![Tile::Empty; width * height],
            protected: vec![false; width * height],
            protecting: false,
            placements: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn floor_spacing(&self) -> usize {
        self.floor_spacing
    }

    pub fn floor_count(&self) -> usize {
        self.floors
    }

    /// Row of the given floor's surface tiles.
    pub fn floor_row(&self, floor: i32) -> i32 {
        let floor = floor.clamp(0, self.floors as i32 - 1);
        (self.height as i32 - 1) - floor * self.floor_spacing as i32
    }

    pub fn tile(&self, x: i32, y: i32) -> Tile {
        self.index(x, y).map(|i| self.cells[i]).unwrap_or(Tile::Empty)
    }

    pub fn is_protected(&self, x: i32, y: i32) -> bool {
        self.index(x, y).map(|i| self.protected[i]).unwrap_or(false)
    }

    pub fn placements(&self) -> &[EntityPlacement] {
        &self.placements
    }

    /// Run `paint` with protection on: everything it paints joins the main route.
    pub fn protect<F: FnOnce(&mut Self)>(&mut self, paint: F) {
        let previous = self.protecting;
        self.protecting = true;
        paint(self);
        self.protecting = previous;
    }

    // ── Terrain ──

    /// Solid run on `floor`'s row over columns `[start_x, end_x)`.
    pub fn fill_floor_segment(&mut self, floor: i32, start_x: i32, end_x: i32, tile: Tile) {
        let row = self.floor_row(floor);
        let (start, end) = self.clamp_span(start_x, end_x);
        for x in start..end {
            self.paint(x, row, tile);
        }
    }

    /// Clear `[start_x, end_x)` on `floor`'s row, except protected cells.
    pub fn carve_gap(&mut self, floor: i32, start_x: i32, end_x: i32) {
        let row = self.floor_row(floor);
        let (start, end) = self.clamp_span(start_x, end_x);
        for x in start..end {
            if let Some(i) = self.index(x, row) {
                if !self.protected[i] {
                    self.cells[i] = Tile::Empty;
                }
            }
        }
    }

    /// Ascending staircase of `steps` columns starting at `start_x`, based on
    /// `floor`'s row. Column `i` is `i + 1` tiles tall, capped at the floor
    /// spacing. Step count is held to `[3, floor_spacing + 2]`.
    pub fn add_staircase(&mut self, floor: i32, start_x: i32, steps: i32, tile: Tile) {
        let base = self.floor_row(floor);
        let start = start_x.clamp(0, self.width as i32 - 1);
        let steps = steps.min(self.floor_spacing as i32 + 2).max(3);
        let cap = self.floor_spacing as i32;
        for i in 0..steps {
            let x = start + i;
            if x >= self.width as i32 {
                break;
            }
            for h in 0..=i.min(cap) {
                self.paint(x, base - h, tile);
            }
        }
    }

    /// One-row ledge a full floor clearance above `floor`'s row.
    pub fn add_floating_platform(&mut self, floor: i32, start_x: i32, end_x: i32, tile: Tile) {
        let row = self.floor_row(floor) - self.floor_spacing as i32;
        if row < 0 {
            return;
        }
        let (start, end) = self.clamp_span(start_x, end_x);
        for x in start..end {
            self.paint(x, row, tile);
        }
    }

    /// Vertical column of `height_tiles` tiles growing upward from `base_row`.
    pub fn add_floating_column(&mut self, x: i32, base_row: i32, height_tiles: i32, tile: Tile) {
        if x < 0 || x >= self.width as i32 {
            return;
        }
        let bottom = base_row.clamp(0, self.height as i32 - 1);
        let top = (bottom - height_tiles + 1).max(0);
        for y in top..=bottom {
            self.paint(x, y, tile);
        }
    }

    // ── Entities ──
    //
    // Positions name a tile cell by its top-left corner; placements land on
    // the cell's centre column.

    /// Coin in the cell at `(x, y)`.
    pub fn add_coin(&mut self, x: f32, y: f32) {
        self.place(EntityKind::Coin, x + 0.5, y + COIN_DROP, CENTRE);
    }

    /// `count` coins two tiles apart, floating above `floor`.
    pub fn add_coin_cluster(&mut self, floor: i32, start_x: f32, count: usize) {
        let y = self.floor_row(floor) as f32 - COIN_LIFT;
        for i in 0..count {
            self.add_coin(start_x + i as f32 * 2.0, y);
        }
    }

    pub fn add_spike(&mut self, floor: i32, tile_x: f32) {
        let y = self.floor_row(floor) as f32;
        self.place(EntityKind::Spike, tile_x + 0.5, y, FEET);
    }

    pub fn add_enemy_on_floor(&mut self, tag: &str, floor: i32, tile_x: f32) {
        let y = self.floor_row(floor) as f32;
        self.place(EntityKind::from_tag(tag), tile_x + 0.5, y, FEET);
    }

    /// Enemy floating `lift` tiles above `floor`'s surface.
    pub fn add_enemy_hovering(&mut self, tag: &str, floor: i32, tile_x: f32, lift: f32) {
        let y = self.floor_row(floor) as f32 - lift;
        self.place(EntityKind::from_tag(tag), tile_x + 0.5, y, CENTRE);
    }

    /// Spawn marker standing on `floor` in column `tile_x`, on top of any
    /// terrain already painted there.
    pub fn add_spawn(&mut self, floor: i32, tile_x: f32) {
        let y = self.surface(floor, tile_x) as f32;
        self.place(EntityKind::Spawn, tile_x + 0.5, y, FEET);
        if let Some(last) = self.placements.last_mut() {
            last.extras.insert("spawn".to_string(), "true".to_string());
        }
    }

    pub fn add_flag(&mut self, floor: i32, tile_x: f32) {
        let y = self.surface(floor, tile_x) as f32;
        self.place(EntityKind::Flag, tile_x + 0.5, y, FEET);
    }

    /// Snapshot the buffer. The builder is consumed.
    pub fn build(self) -> Blueprint {
        debug!(
            "built {}x{} level: {} solid tiles, {} placements",
            self.width,
            self.height,
            self.cells.iter().filter(|t| t.is_solid()).count(),
            self.placements.len()
        );
        let grid = TileGrid::from_trusted(self.width, self.height, self.tile_size, self.cells);
        Blueprint::new(grid, self.placements)
    }

    // ── Internal ──

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    fn paint(&mut self, x: i32, y: i32, tile: Tile) {
        if let Some(i) = self.index(x, y) {
            self.cells[i] = tile;
            if self.protecting {
                self.protected[i] = true;
            }
        }
    }

    /// Top of the solid stack resting on `floor`'s row in column `tile_x`.
    fn surface(&self, floor: i32, tile_x: f32) -> i32 {
        let x = tile_x.floor() as i32;
        let mut row = self.floor_row(floor);
        while row > 0 && self.tile(x, row - 1).is_solid() {
            row -= 1;
        }
        row
    }

    fn clamp_span(&self, start_x: i32, end_x: i32) -> (i32, i32) {
        let w = self.width as i32;
        let start = start_x.clamp(0, w);
        let end = end_x.clamp(0, w).max(start);
        (start, end)
    }

    fn place(&mut self, kind: EntityKind, x: f32, y: f32, anchor: (f32, f32)) {
        let x = x.clamp(0.0, self.width as f32);
        let y = y.clamp(0.0, self.height as f32);
        self.placements.push(EntityPlacement { kind, x, y, anchor, extras: BTreeMap::new() });
    }
}
