/// Labyrinth generator: a deterministic multi-floor level from
/// `(variant, seed)`.
///
/// ## Passes
///
///   1. Palette     : `variant % 4` picks the material for each floor
///   2. Route       : `variant % 3` picks a waypoint path across floors
///   3. Connect     : each consecutive waypoint pair becomes terrain
///   4. Markers     : spawn on the first waypoint, flag on the last
///   5. Highlights  : fixed platforms and columns, one of two gap layouts
///   6. Secret rooms: a side branch placed and sized by the seed
///   7. Guidance    : a coin/enemy rhythm read from the seed's characters,
///                     then fixed hazards
///
/// No randomness: the same inputs always give the same blueprint.
///
/// ## Route connection
///
/// ┌───────────────┬─────────────────────────────────────────────────────┐
/// │ Waypoint pair │ Terrain                                             │
/// ├───────────────┼─────────────────────────────────────────────────────┤
/// │ same floor    │ one segment spanning both                           │
/// │ one floor up  │ take-off pad, staircase of one-tile steps, upper    │
/// │               │ segment from the top step                           │
/// │ several up    │ chained through an intermediate waypoint per floor  │
/// │ down          │ run-off, landing under the drop, staircase on the   │
/// │               │ lower floor                                         │
/// └───────────────┴─────────────────────────────────────────────────────┘
///
/// Route cells are painted under `LevelBuilder::protect`, so the decorative
/// gaps of later passes cannot cut the path from spawn to flag.

use log::debug;

use crate::domain::tile::Tile;
use crate::domain::tile::Tile::{Debug as Q, Editor as G, Terminal as B};

use super::builder::{Blueprint, LevelBuilder};

pub const TILE_SIZE: u32 = 32;
pub const FLOORS: usize = 3;
pub const FLOOR_CLEARANCE: usize = 2;
pub const TOP_MARGIN: usize = 5;
pub const LEVEL_WIDTH: usize = 180;

/// Distance of the final waypoint from the right edge.
const TAIL_INSET: i32 = 8;
/// Horizontal run between the floors of a multi-floor ascent.
const ASCENT_RUN: i32 = 6;

const PALETTES: [[Tile; 3]; 4] = [[G, B, Q], [B, G, Q], [Q, B, G], [B, Q, G]];

/// Waypoint column `None` is the tail, resolved against the level width.
const ROUTES: [&[(i32, Option<i32>)]; 3] = [
    &[(0, Some(4)), (0, Some(38)), (1, Some(60)), (2, Some(92)), (1, Some(120)), (2, None)],
    &[(0, Some(4)), (0, Some(32)), (1, Some(54)), (2, Some(76)), (2, Some(106)), (1, Some(132)), (2, None)],
    &[(0, Some(6)), (1, Some(28)), (1, Some(56)), (2, Some(84)), (1, Some(114)), (0, Some(138)), (2, None)],
];

/// Level shape. `Default` is the shipped 180x15 three-floor layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LabyrinthParams {
    pub width: usize,
    pub floors: usize,
    pub floor_clearance: usize,
    pub top_margin: usize,
    pub tile_size: u32,
}

impl Default for LabyrinthParams {
    fn default() -> Self {
        LabyrinthParams {
            width: LEVEL_WIDTH,
            floors: FLOORS,
            floor_clearance: FLOOR_CLEARANCE,
            top_margin: TOP_MARGIN,
            tile_size: TILE_SIZE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Waypoint {
    floor: i32,
    x: i32,
}

/// Generate with the default shape.
pub fn generate(variant: usize, seed: &str) -> Blueprint {
    generate_with(&LabyrinthParams::default(), variant, seed)
}

pub fn generate_with(params: &LabyrinthParams, variant: usize, seed: &str) -> Blueprint {
    let mut b = LevelBuilder::new(
        params.width,
        params.floors,
        params.floor_clearance,
        params.top_margin,
        params.tile_size,
    );
    let palette = PALETTES[variant % PALETTES.len()];
    let route = route(variant, params.width, b.floor_count());

    b.protect(|b| {
        for pair in route.windows(2) {
            connect(b, pair[0], pair[1], &palette);
        }
    });

    if let (Some(first), Some(goal)) = (route.first(), route.last()) {
        b.add_spawn(first.floor, first.x as f32);
        b.add_flag(goal.floor, (goal.x - 1) as f32);
    }

    add_highlights(&mut b, variant, &palette);
    add_secret_rooms(&mut b, variant, seed, &palette);
    add_guidance(&mut b, seed);

    debug!("labyrinth variant={variant} seed={seed:?}: {} waypoints", route.len());
    b.build()
}

// ══════════════════════════════════════════════════════════════
// Route
// ══════════════════════════════════════════════════════════════

fn route(variant: usize, width: usize, floors: usize) -> Vec<Waypoint> {
    let tail = width.max(120) as i32 - TAIL_INSET;
    let top = floors as i32 - 1;
    ROUTES[variant % ROUTES.len()]
        .iter()
        .map(|&(floor, x)| Waypoint { floor: floor.clamp(0, top), x: x.unwrap_or(tail).max(2) })
        .collect()
}

fn material(palette: &[Tile; 3], floor: i32) -> Tile {
    palette[floor.clamp(0, 2) as usize]
}

fn connect(b: &mut LevelBuilder, from: Waypoint, to: Waypoint, palette: &[Tile; 3]) {
    if to.floor > from.floor + 1 {
        let mid = Waypoint { floor: from.floor + 1, x: from.x + ASCENT_RUN };
        connect(b, from, mid, palette);
        connect(b, mid, to, palette);
        return;
    }

    let spacing = b.floor_spacing() as i32;
    let start = from.x.min(to.x);
    let end = from.x.max(to.x);
    let from_tile = material(palette, from.floor);
    let to_tile = material(palette, to.floor);

    if from.floor == to.floor {
        b.fill_floor_segment(from.floor, start, end + 1, from_tile);
    } else if to.floor > from.floor {
        // One-tile steps all the way up; the upper floor begins on the top step.
        let stairs = from.x - 1;
        b.fill_floor_segment(from.floor, from.x - 2, from.x + 2, from_tile);
        b.add_staircase(from.floor, stairs, spacing + 1, from_tile);
        b.fill_floor_segment(to.floor, stairs + spacing, end + 1, to_tile);
    } else {
        // The landing starts under the drop-off so walking off the upper
        // floor always lands on the lower one.
        let landing = if from.x < to.x { from.x } else { start };
        let stairs = (to.x - spacing).max(start);
        b.fill_floor_segment(from.floor, start, from.x + 2, from_tile);
        b.fill_floor_segment(to.floor, landing, end + 1, to_tile);
        b.add_staircase(to.floor, stairs, spacing, to_tile);
    }
}

// ══════════════════════════════════════════════════════════════
// Decoration
// ══════════════════════════════════════════════════════════════

fn add_highlights(b: &mut LevelBuilder, variant: usize, palette: &[Tile; 3]) {
    let [p0, p1, p2] = *palette;
    b.add_floating_platform(1, 18, 26, p1);
    b.add_floating_platform(2, 42, 48, p2);
    b.add_floating_column(70, b.floor_row(1) - 1, 2, p1);
    b.add_floating_column(104, b.floor_row(2) - 1, 2, p2);

    if variant % 2 == 0 {
        b.carve_gap(0, 44, 52);
        b.add_floating_platform(0, 45, 50, p0);
        b.add_floating_platform(1, 64, 70, p1);
    } else {
        b.carve_gap(1, 82, 88);
        b.add_floating_platform(1, 76, 90, p1);
        b.add_floating_platform(2, 120, 130, p2);
    }
}

fn add_secret_rooms(b: &mut LevelBuilder, variant: usize, seed: &str, palette: &[Tile; 3]) {
    let [p0, p1, p2] = *palette;
    let spacing = b.floor_spacing() as i32;
    let anchor = 32 + (java_string_hash(seed).unsigned_abs() % 18) as i32;
    let len = 10 + (seed.encode_utf16().count() % 8) as i32;

    b.fill_floor_segment(0, anchor, anchor + len, p0);
    b.add_coin_cluster(0, anchor as f32 + 1.5, (len as usize / 2).min(6));
    b.add_enemy_on_floor("bugblob", 0, (anchor + len - 2) as f32);
    b.add_staircase(0, anchor + len - 4, spacing + 1, p0);
    b.fill_floor_segment(1, anchor + len - 4 + spacing, anchor + len + 6, p1);
    b.add_coin_cluster(1, (anchor + len) as f32 + 1.5, 4);

    if variant % 3 == 1 {
        b.carve_gap(2, 126, 132);
        b.add_floating_platform(2, 124, 136, p2);
        b.add_enemy_hovering("cloud_leech", 2, 130.0, 1.6);
    } else {
        b.add_floating_column(146, b.floor_row(1) - 1, spacing, p1);
        b.add_enemy_on_floor("patch_golem", 1, 148.0);
    }
}

fn add_guidance(b: &mut LevelBuilder, seed: &str) {
    let floors = b.floor_count() as i32;
    let mut floor = 0;
    let mut cursor = 12.0f32;
    for beat in rhythm(seed) {
        cursor += beat;
        let lift = if floor == 0 { 1.6 } else { 1.2 };
        b.add_coin(cursor, b.floor_row(floor) as f32 - lift);
        if beat > 3.0 {
            let tag = if floor == 0 { "keylogger_beetle" } else { "wurm_weasel" };
            b.add_enemy_on_floor(tag, floor, cursor + 1.2);
        }
        floor = (floor + 1) % floors.min(3);
    }

    b.add_spike(0, 58.0);
    b.add_spike(1, 98.0);
    b.add_spike(2, 138.0);
    b.add_enemy_hovering("glitch_saw", 2, 112.0, 0.7);
    b.add_enemy_hovering("spam_drone", 1, 84.0, 1.4);
    b.add_enemy_on_floor("compile_crusher", 2, 142.0);
    b.add_enemy_on_floor("bsod_block", 1, 150.0);
}

// ══════════════════════════════════════════════════════════════
// Seed derivation
// ══════════════════════════════════════════════════════════════

/// Beat lengths (in tiles) read from the seed: digits give `2 + 0.3d`,
/// letters give `1.5 + 0.15 * (c - 'a')`, anything else is skipped.
pub fn rhythm(seed: &str) -> Vec<f32> {
    if seed.is_empty() {
        return vec![8.0];
    }
    let beats: Vec<f32> = seed
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            '0'..='9' => Some(2.0 + 0.3 * (c as u32 - '0' as u32) as f32),
            'a'..='z' => Some(1.5 + 0.15 * (c as u32 - 'a' as u32) as f32),
            _ => None,
        })
        .collect();
    if beats.is_empty() {
        vec![6.0]
    } else {
        beats
    }
}

/// 31-polynomial hash over UTF-16 code units with wrapping `i32` arithmetic.
/// Seeds already published as level identities depend on these exact values.
pub fn java_string_hash(s: &str) -> i32 {
    s.encode_utf16().fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}
