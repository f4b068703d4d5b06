/// Errors raised while constructing or decoding level data.
///
/// Generation, collision and physics never fail: they clamp. Only the
/// boundaries that accept foreign data (row strings, JSON documents,
/// level files on disk) return these.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level has zero width or height")]
    EmptyGrid,

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow { row: usize, expected: usize, found: usize },

    #[error("tile data has {found} cells, expected {expected}")]
    CellCount { expected: usize, found: usize },

    #[error("level of {width}x{height} tiles is too large")]
    TooLarge { width: usize, height: usize },

    #[error("tile size must be positive")]
    ZeroTileSize,

    #[error("tiles must be square, got {width}x{height}")]
    NonSquareTiles { width: u32, height: u32 },

    #[error("unsupported tile layer encoding `{0}`")]
    UnsupportedEncoding(String),

    #[error("level document has no tile layer")]
    MissingLayer,

    #[error("tile cell {index} is not a valid gid: `{value}`")]
    BadCell { index: usize, value: String },

    #[error("malformed level document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not read level file: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LevelError>;
