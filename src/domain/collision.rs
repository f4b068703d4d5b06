/// Collision queries over a TileGrid.
///
/// `CollisionWorld` borrows a grid and answers one question: which solid
/// tiles overlap this pixel-space rectangle. Results come back in row-major
/// order (top row first, left to right) so resolution is reproducible.

use super::grid::TileGrid;

/// Axis-aligned rectangle in pixel space. `y` grows downward.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Rect { left, top, right, bottom }
    }

    /// Rectangle of width `w` and height `h` whose bottom-centre is `(x, y)`.
    pub fn from_feet(x: f32, y: f32, w: f32, h: f32) -> Self {
        Rect { left: x - w * 0.5, top: y - h, right: x + w * 0.5, bottom: y }
    }

    /// Rectangle of width `w` and height `h` whose point at fractions
    /// `anchor` of its own extent sits on `(x, y)`.
    pub fn anchored(x: f32, y: f32, w: f32, h: f32, anchor: (f32, f32)) -> Self {
        let left = x - w * anchor.0;
        let top = y - h * anchor.1;
        Rect { left, top, right: left + w, bottom: top + h }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Rect {
        Rect {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }

    /// Strict overlap: rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }
}

pub struct CollisionWorld<'a> {
    grid: &'a TileGrid,
}

impl<'a> CollisionWorld<'a> {
    pub fn new(grid: &'a TileGrid) -> Self {
        CollisionWorld { grid }
    }

    pub fn grid(&self) -> &TileGrid {
        self.grid
    }

    pub fn tile_size(&self) -> f32 {
        self.grid.tile_size() as f32
    }

    pub fn pixel_width(&self) -> f32 {
        self.grid.pixel_width()
    }

    pub fn pixel_height(&self) -> f32 {
        self.grid.pixel_height()
    }

    /// False for any out-of-bounds coordinate.
    pub fn is_solid(&self, tile_x: i32, tile_y: i32) -> bool {
        self.grid.is_solid(tile_x, tile_y)
    }

    /// Pixel bounds of the tile at `(tile_x, tile_y)`.
    pub fn tile_bounds(&self, tile_x: i32, tile_y: i32) -> Rect {
        let ts = self.tile_size();
        let left = tile_x as f32 * ts;
        let top = tile_y as f32 * ts;
        Rect { left, top, right: left + ts, bottom: top + ts }
    }

    /// Bounds of every solid tile in the cell range covered by `rect`.
    pub fn query_solid(&self, rect: &Rect) -> Vec<Rect> {
        let mut out = Vec::new();
        self.query_solid_into(rect, &mut out);
        out
    }

    /// Same as `query_solid`, reusing the caller's buffer.
    pub fn query_solid_into(&self, rect: &Rect, out: &mut Vec<Rect>) {
        out.clear();
        let Some((x0, x1, y0, y1)) = self.cell_range(rect) else { return };
        for ty in y0..=y1 {
            for tx in x0..=x1 {
                if self.grid.is_solid(tx, ty) {
                    out.push(self.tile_bounds(tx, ty));
                }
            }
        }
    }

    /// Inclusive column/row range overlapped by `rect`, clamped to the grid.
    fn cell_range(&self, rect: &Rect) -> Option<(i32, i32, i32, i32)> {
        let ts = self.tile_size();
        let max_x = self.grid.width() as i32 - 1;
        let max_y = self.grid.height() as i32 - 1;

        let x0 = ((rect.left / ts).floor() as i32).max(0);
        let x1 = ((rect.right / ts).floor() as i32).min(max_x);
        let y0 = ((rect.top / ts).floor() as i32).max(0);
        let y1 = ((rect.bottom / ts).floor() as i32).min(max_y);

        if x1 < x0 || y1 < y0 {
            return None;
        }
        Some((x0, x1, y0, y1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_from(rows: &[&str]) -> TileGrid {
        TileGrid::from_rows(rows, 32).unwrap()
    }

    #[test]
    fn strict_intersection() {
        let a = Rect::new(0.0, 0.0, 32.0, 32.0);
        let touching = Rect::new(32.0, 0.0, 64.0, 32.0);
        let overlapping = Rect::new(31.0, 31.0, 40.0, 40.0);
        assert!(!a.intersects(&touching));
        assert!(a.intersects(&overlapping));
    }

    #[test]
    fn from_feet_anchors_bottom_centre() {
        let r = Rect::from_feet(100.0, 200.0, 20.0, 40.0);
        assert_eq!(r, Rect::new(90.0, 160.0, 110.0, 200.0));
    }

    #[test]
    fn is_solid_out_of_bounds() {
        let g = grid_from(&["GG", "GG"]);
        let world = CollisionWorld::new(&g);
        assert!(world.is_solid(0, 0));
        assert!(!world.is_solid(-1, 0));
        assert!(!world.is_solid(2, 1));
    }

    #[test]
    fn query_returns_row_major() {
        let g = grid_from(&[
            "G.G",
            ".G.",
        ]);
        let world = CollisionWorld::new(&g);
        let hits = world.query_solid(&Rect::new(0.0, 0.0, 95.0, 63.0));
        let origins: Vec<(f32, f32)> = hits.iter().map(|r| (r.left, r.top)).collect();
        assert_eq!(origins, vec![(0.0, 0.0), (64.0, 0.0), (32.0, 32.0)]);
    }

    #[test]
    fn query_clamps_to_grid() {
        let g = grid_from(&["GG", "GG"]);
        let world = CollisionWorld::new(&g);
        assert_eq!(world.query_solid(&Rect::new(-500.0, -500.0, 500.0, 500.0)).len(), 4);
        assert!(world.query_solid(&Rect::new(100.0, 100.0, 200.0, 200.0)).is_empty());
        assert!(world.query_solid(&Rect::new(-200.0, -200.0, -100.0, -100.0)).is_empty());
    }

    #[test]
    fn query_only_covered_cells() {
        let g = grid_from(&[
            "....",
            "..G.",
            "....",
        ]);
        let world = CollisionWorld::new(&g);
        assert!(world.query_solid(&Rect::new(0.0, 0.0, 60.0, 60.0)).is_empty());
        let hits = world.query_solid(&Rect::new(60.0, 40.0, 70.0, 50.0));
        assert_eq!(hits, vec![Rect::new(64.0, 32.0, 96.0, 64.0)]);
    }
}
