//! Error types for tilecache-core.

use thiserror::Error;

/// Error kinds surfaced by the tile caching core.
///
/// `BlankImage` is the one non-fatal variant: it signals that a grid lookup
/// found no tiles for the requested region. Callers that can substitute a
/// blank image should match on it explicitly rather than treat it as a
/// failure.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("lock not acquired within {timeout_secs}s: {lock_path}")]
    LockTimeout { lock_path: String, timeout_secs: f64 },

    #[error("invalid bbox for requested region")]
    InvalidBBox,

    #[error("too many tiles requested: {count} >= limit {limit}")]
    TooManyTiles { count: usize, limit: usize },

    #[error("tile source error: {0}")]
    TileSource(String),

    #[error("invalid source query: {0}")]
    InvalidSourceQuery(String),

    #[error("requested region has no tiles")]
    BlankImage,
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
