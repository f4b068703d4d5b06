/// Traversal rules: what an actor with a given movement profile can reach.
///
/// Pure functions over a TileGrid. These answer "could the player get from
/// here to there" without running the physics, by searching a graph of
/// standing cells. The edges are derived from `JumpEnvelope`, which
/// integrates a jump with the same discrete update `physics::step` uses.
///
/// ## Cells
///
/// A cell `(x, y)` is where the actor's feet-row sits: the actor occupies
/// rows `y - clearance + 1 ..= y` of column `x`.
/// ┌────────────┬───────────────────────────────────────────────┐
/// │ Term       │ Meaning                                       │
/// ├────────────┼───────────────────────────────────────────────┤
/// │ open       │ inside the grid and not solid                 │
/// │ clear      │ `clearance` open cells stacked up from (x, y) │
/// │ floored    │ (x, y+1) solid, or y is the bottom row        │
/// │ standable  │ clear and floored                             │
/// └────────────┴───────────────────────────────────────────────┘
///
/// The bottom row counts as floored because the bottom of the world
/// holds the actor up.
///
/// ## Moves
/// ┌───────────┬────────────────────────────────────────────────────────┐
/// │ Move      │ Condition                                              │
/// ├───────────┼────────────────────────────────────────────────────────┤
/// │ Walk      │ neighbour column clear at the same row, then fall      │
/// │ Jump      │ rise in place up to `rise_tiles` rows (column clear),  │
/// │           │ drift up to `reach_tiles` columns at the apex (clear), │
/// │           │ then fall                                              │
/// │ Fall      │ straight down to the first floored cell                │
/// └───────────┴────────────────────────────────────────────────────────┘
///
/// The jump is modelled as "up, across, down", with the actor one column
/// wide. This is an approximation, not a bound: drift at full rise is
/// counted at `move_speed` for the whole ascent, which an accelerating actor
/// only gets with a running start. Route geometry should keep real jumps
/// well inside the envelope; generated courses are also checked by driving
/// `physics::step` from spawn to flag.

use std::collections::VecDeque;

use super::grid::TileGrid;
use super::physics::MovementProfile;

/// Safety cap on simulated jump steps.
const MAX_AIR_STEPS: u32 = 10_000;

/// How high and how far a single jump carries, in whole tiles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JumpEnvelope {
    /// Peak height gained, in pixels.
    pub rise_px: f32,
    pub rise_tiles: i32,
    pub reach_tiles: i32,
}

impl JumpEnvelope {
    /// Integrate a jump from standstill at the given step size.
    pub fn from_profile(profile: &MovementProfile, dt: f32, tile_size: f32) -> Self {
        let mut vy = profile.jump_velocity;
        let mut rise = 0.0f32;
        let mut rising_steps = 0u32;
        while rising_steps < MAX_AIR_STEPS {
            vy = (vy + profile.gravity * dt).min(profile.max_fall_speed);
            if vy >= 0.0 {
                break;
            }
            rise += -vy * dt;
            rising_steps += 1;
        }

        let rise_tiles = if tile_size > 0.0 { (rise / tile_size).floor() as i32 } else { 0 };
        let drift = profile.move_speed * rising_steps as f32 * dt;
        let reach_tiles = if tile_size > 0.0 { ((drift / tile_size).floor() as i32).max(1) } else { 1 };
        JumpEnvelope { rise_px: rise, rise_tiles, reach_tiles }
    }
}

/// Rows an actor of `height` pixels needs free above its feet.
pub fn clearance_rows(height: f32, tile_size: f32) -> i32 {
    if tile_size <= 0.0 {
        return 1;
    }
    ((height / tile_size).ceil() as i32).max(1)
}

/// Reachability search over one grid for one actor size and envelope.
pub struct Reach<'a> {
    grid: &'a TileGrid,
    envelope: JumpEnvelope,
    clearance: i32,
}

impl<'a> Reach<'a> {
    pub fn new(grid: &'a TileGrid, envelope: JumpEnvelope, clearance: i32) -> Self {
        Reach { grid, envelope, clearance: clearance.max(1) }
    }

    fn open(&self, x: i32, y: i32) -> bool {
        self.grid.index(x, y).is_some() && !self.grid.is_solid(x, y)
    }

    fn clear(&self, x: i32, y: i32) -> bool {
        (0..self.clearance).all(|k| self.open(x, y - k))
    }

    fn floored(&self, x: i32, y: i32) -> bool {
        y + 1 >= self.grid.height() as i32 || self.grid.is_solid(x, y + 1)
    }

    pub fn standable(&self, x: i32, y: i32) -> bool {
        self.clear(x, y) && self.floored(x, y)
    }

    /// Drop from a clear cell to the first floored cell below it.
    fn fall(&self, x: i32, mut y: i32) -> (i32, i32) {
        while !self.floored(x, y) {
            y += 1;
        }
        (x, y)
    }

    /// Where an actor whose feet are in cell `(x, y)` ends up at rest:
    /// pushed up out of solid tiles, then dropped onto a floor.
    pub fn settle(&self, x: i32, y: i32) -> Option<(i32, i32)> {
        if x < 0 || x >= self.grid.width() as i32 {
            return None;
        }
        let mut y = y.min(self.grid.height() as i32 - 1);
        while y >= 0 && !self.clear(x, y) {
            y -= 1;
        }
        if y < 0 {
            return None;
        }
        Some(self.fall(x, y))
    }

    /// Every cell reachable from `start`, indexed like the grid.
    pub fn flood(&self, start: (i32, i32)) -> Vec<bool> {
        let w = self.grid.width();
        let mut visited = vec![false; w * self.grid.height()];
        let Some(start) = self.settle(start.0, start.1) else { return visited };
        let Some(si) = self.grid.index(start.0, start.1) else { return visited };

        visited[si] = true;
        let mut queue = VecDeque::with_capacity(256);
        queue.push_back(start);

        let mut next = Vec::with_capacity(16);
        while let Some((x, y)) = queue.pop_front() {
            next.clear();
            self.moves_from(x, y, &mut next);
            for &(nx, ny) in &next {
                if let Some(i) = self.grid.index(nx, ny) {
                    if !visited[i] {
                        visited[i] = true;
                        queue.push_back((nx, ny));
                    }
                }
            }
        }
        visited
    }

    pub fn can_reach(&self, start: (i32, i32), goal: (i32, i32)) -> bool {
        let Some(goal) = self.settle(goal.0, goal.1) else { return false };
        let Some(gi) = self.grid.index(goal.0, goal.1) else { return false };
        self.flood(start)[gi]
    }

    fn moves_from(&self, x: i32, y: i32, out: &mut Vec<(i32, i32)>) {
        // Walk (and walk off ledges)
        for dir in [-1, 1] {
            let nx = x + dir;
            if self.clear(nx, y) {
                out.push(self.fall(nx, y));
            }
        }

        // Jump: rise in place, drift at the apex, come down
        for apex in (y - self.envelope.rise_tiles..y).rev() {
            if !self.clear(x, apex) {
                break;
            }
            for dir in [-1, 1] {
                for k in 1..=self.envelope.reach_tiles {
                    let nx = x + dir * k;
                    if !self.clear(nx, apex) {
                        break;
                    }
                    out.push(self.fall(nx, apex));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::physics::FIXED_DT;

    fn grid_from(rows: &[&str]) -> TileGrid {
        TileGrid::from_rows(rows, 32).unwrap()
    }

    fn envelope(rise_tiles: i32, reach_tiles: i32) -> JumpEnvelope {
        JumpEnvelope { rise_px: rise_tiles as f32 * 32.0, rise_tiles, reach_tiles }
    }

    #[test]
    fn friction_profile_clears_three_tiles() {
        let env = JumpEnvelope::from_profile(&MovementProfile::friction(), FIXED_DT, 32.0);
        assert!(env.rise_px > 96.0 && env.rise_px < 119.1);
        assert_eq!(env.rise_tiles, 3);
        assert!(env.reach_tiles >= 1);
    }

    #[test]
    fn instant_profile_falls_short_of_three_tiles() {
        // The analytic apex is ~96.6 px, but the discrete update loses a few pixels.
        let env = JumpEnvelope::from_profile(&MovementProfile::instant(), FIXED_DT, 32.0);
        assert!(env.rise_px < 96.0);
        assert_eq!(env.rise_tiles, 2);
    }

    #[test]
    fn clearance_for_actor_heights() {
        assert_eq!(clearance_rows(30.4, 32.0), 1);
        assert_eq!(clearance_rows(32.0, 32.0), 1);
        assert_eq!(clearance_rows(52.8, 32.0), 2);
        assert_eq!(clearance_rows(0.0, 32.0), 1);
    }

    #[test]
    fn standable_cells() {
        let g = grid_from(&[
            "....",
            ".G..",
            "GGGG",
        ]);
        let r = Reach::new(&g, envelope(1, 1), 1);
        assert!(r.standable(0, 1));
        assert!(r.standable(1, 0));
        assert!(!r.standable(1, 1));
        assert!(!r.standable(0, 0));
        // bottom row rests on the world floor
        let open = grid_from(&["..", ".."]);
        assert!(Reach::new(&open, envelope(1, 1), 1).standable(0, 1));
    }

    #[test]
    fn walks_across_flat_floor() {
        let g = grid_from(&[
            "......",
            "GGGGGG",
        ]);
        let r = Reach::new(&g, envelope(1, 1), 1);
        assert!(r.can_reach((0, 0), (5, 0)));
    }

    #[test]
    fn wall_height_limits() {
        let g = grid_from(&[
            "......",
            "......",
            "...G..",
            "...G..",
            "...G..",
            "GGGGGG",
        ]);
        assert!(Reach::new(&g, envelope(3, 1), 1).can_reach((0, 4), (5, 4)));
        assert!(!Reach::new(&g, envelope(2, 1), 1).can_reach((0, 4), (5, 4)));
    }

    #[test]
    fn ledge_needs_headroom() {
        // A ledge under a low ceiling: fine for a one-tile actor, blocked for a two-tile one.
        let g = grid_from(&[
            "GGGGGG",
            "......",
            "...GGG",
            "......",
            "GGGGGG",
        ]);
        let short = Reach::new(&g, envelope(2, 1), 1);
        assert!(short.can_reach((0, 3), (5, 1)));
        let tall = Reach::new(&g, envelope(2, 1), 2);
        assert!(!tall.can_reach((0, 3), (5, 1)));
    }

    #[test]
    fn gap_jump_uses_reach() {
        let g = grid_from(&[
            "........",
            "........",
            "GGG..GGG",
            "GGG..GGG",
        ]);
        // Falling into the pit lands on solid ground two rows down, which is
        // a dead end without enough rise to climb out.
        assert!(Reach::new(&g, envelope(1, 3), 1).can_reach((0, 1), (7, 1)));
        assert!(!Reach::new(&g, envelope(1, 1), 1).can_reach((0, 1), (7, 1)));
    }

    #[test]
    fn settle_pops_out_of_solid() {
        let g = grid_from(&[
            "...",
            ".G.",
            "GGG",
        ]);
        let r = Reach::new(&g, envelope(1, 1), 1);
        assert_eq!(r.settle(1, 1), Some((1, 0)));
        assert_eq!(r.settle(0, 0), Some((0, 1)));
        assert_eq!(r.settle(9, 0), None);
    }
}
