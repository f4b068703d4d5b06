/// TileGrid: the immutable terrain substrate shared by generation and physics.
///
/// ## Storage
///
/// A flat `Vec<Tile>` indexed by `y * width + x`. All reads go through
/// `tile()`, which answers `Tile::Empty` for anything outside
/// `[0, width) x [0, height)`. There is no mutating API: a grid is built once
/// (by `LevelBuilder::build`, the legacy row parser or the document decoder)
/// and replaced wholesale on level change.
///
/// ## Coordinates
///
/// Tile coordinates are integers, `y` grows downward. Pixel space is
/// `tile * tile_size`, so the grid spans `[0, pixel_width] x [0, pixel_height]`.

use crate::error::{LevelError, Result};

use super::tile::Tile;

/// Largest grid accepted from outside data, in cells.
pub const MAX_CELLS: usize = 1 << 22;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileGrid {
    width: usize,
    height: usize,
    tile_size: u32,
    cells: Vec<Tile>,
}

impl TileGrid {
    /// Wrap a row-major cell vector. Fails fast on degenerate shapes.
    pub fn new(width: usize, height: usize, tile_size: u32, cells: Vec<Tile>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(LevelError::EmptyGrid);
        }
        if tile_size == 0 {
            return Err(LevelError::ZeroTileSize);
        }
        let expected = cell_count(width, height)?;
        if cells.len() != expected {
            return Err(LevelError::CellCount { expected, found: cells.len() });
        }
        Ok(TileGrid { width, height, tile_size, cells })
    }

    /// Wrap cells whose shape the caller already guarantees
    /// (non-zero dimensions, positive tile size, `width * height` cells).
    pub(crate) fn from_trusted(width: usize, height: usize, tile_size: u32, cells: Vec<Tile>) -> Self {
        debug_assert!(width > 0 && height > 0 && tile_size > 0);
        debug_assert_eq!(cells.len(), width * height);
        TileGrid { width, height, tile_size, cells }
    }

    /// Parse legacy row strings. Every row must have the same length.
    pub fn from_rows<S: AsRef<str>>(rows: &[S], tile_size: u32) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map(|r| r.as_ref().chars().count()).unwrap_or(0);
        if width == 0 {
            return Err(LevelError::EmptyGrid);
        }

        let mut cells = Vec::with_capacity(cell_count(width, height)?);
        for (row, line) in rows.iter().enumerate() {
            let line = line.as_ref();
            let found = line.chars().count();
            if found != width {
                return Err(LevelError::RaggedRow { row, expected: width, found });
            }
            cells.extend(line.chars().map(Tile::from_code));
        }
        TileGrid::new(width, height, tile_size, cells)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn pixel_width(&self) -> f32 {
        (self.width as u64 * self.tile_size as u64) as f32
    }

    pub fn pixel_height(&self) -> f32 {
        (self.height as u64 * self.tile_size as u64) as f32
    }

    pub fn cells(&self) -> &[Tile] {
        &self.cells
    }

    /// Bounds-checked flat index.
    #[inline]
    pub fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y * self.width + x)
    }

    /// Tile at `(x, y)`. Out of bounds is empty, never solid.
    #[inline]
    pub fn tile(&self, x: i32, y: i32) -> Tile {
        self.index(x, y).map(|i| self.cells[i]).unwrap_or(Tile::Empty)
    }

    #[inline]
    pub fn is_solid(&self, x: i32, y: i32) -> bool {
        self.tile(x, y).is_solid()
    }

    /// Encode back to legacy row strings.
    pub fn rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.width)
            .map(|row| row.iter().map(|t| t.code()).collect())
            .collect()
    }

    pub fn solid_count(&self) -> usize {
        self.cells.iter().filter(|t| t.is_solid()).count()
    }
}

/// `width * height`, refused past `MAX_CELLS` or on overflow.
pub fn cell_count(width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .filter(|&n| n <= MAX_CELLS)
        .ok_or(LevelError::TooLarge { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows() {
        let g = TileGrid::from_rows(&["..G", "BQ."], 32).unwrap();
        assert_eq!(g.width(), 3);
        assert_eq!(g.height(), 2);
        assert_eq!(g.tile(2, 0), Tile::Editor);
        assert_eq!(g.tile(0, 1), Tile::Terminal);
        assert_eq!(g.tile(1, 1), Tile::Debug);
        assert_eq!(g.pixel_width(), 96.0);
        assert_eq!(g.pixel_height(), 64.0);
    }

    #[test]
    fn out_of_bounds_is_empty() {
        let g = TileGrid::from_rows(&["GG", "GG"], 32).unwrap();
        assert_eq!(g.tile(-1, 0), Tile::Empty);
        assert_eq!(g.tile(0, -1), Tile::Empty);
        assert_eq!(g.tile(2, 0), Tile::Empty);
        assert_eq!(g.tile(0, 2), Tile::Empty);
        assert!(!g.is_solid(5, 5));
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = TileGrid::from_rows(&["...", ".."], 32).unwrap_err();
        assert!(matches!(err, LevelError::RaggedRow { row: 1, expected: 3, found: 2 }));
    }

    #[test]
    fn rejects_zero_width() {
        let rows: [&str; 0] = [];
        assert!(matches!(TileGrid::from_rows(&rows, 32), Err(LevelError::EmptyGrid)));
        assert!(matches!(TileGrid::from_rows(&[""], 32), Err(LevelError::EmptyGrid)));
    }

    #[test]
    fn rejects_bad_cell_count() {
        let err = TileGrid::new(2, 2, 32, vec![Tile::Empty; 3]).unwrap_err();
        assert!(matches!(err, LevelError::CellCount { expected: 4, found: 3 }));
    }

    #[test]
    fn rejects_zero_tile_size() {
        assert!(matches!(TileGrid::from_rows(&["G"], 0), Err(LevelError::ZeroTileSize)));
    }

    #[test]
    fn rows_round_trip() {
        let src = ["..GB", "Q...", "GGGG"];
        let g = TileGrid::from_rows(&src, 16).unwrap();
        assert_eq!(g.rows(), src);
        assert_eq!(g.solid_count(), 7);
    }

    #[test]
    fn oversized_dimensions_rejected() {
        let huge = 1usize << 32;
        assert!(matches!(
            TileGrid::new(huge, huge, 32, Vec::new()),
            Err(LevelError::TooLarge { .. })
        ));
        assert!(matches!(
            TileGrid::new(MAX_CELLS + 1, 1, 32, Vec::new()),
            Err(LevelError::TooLarge { .. })
        ));
        assert_eq!(cell_count(usize::MAX, 2).ok(), None);
        assert_eq!(cell_count(MAX_CELLS, 1).ok(), Some(MAX_CELLS));
    }
}
