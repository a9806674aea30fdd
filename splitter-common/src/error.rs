//! Error types for the tile-splitter toolkit
//!
//! Every library operation returns [`Result`]; the binary wraps these in
//! `anyhow` at the application boundary.

use thiserror::Error;

/// Main error type for tile-splitter operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Density grid does not fit its bounds or shift
    #[error("Invalid density grid: {0}")]
    InvalidGrid(String),

    /// A tile violates its invariants (cached count, bounds)
    #[error("Invalid tile {tile}: {reason}")]
    InvalidTile { tile: String, reason: String },

    /// No usable tiling could be found
    #[error("Split failed: {0}")]
    SplitFailed(String),

    /// A solver worker panicked or could not be started
    #[error("Solver crashed: {0}")]
    SolverCrashed(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn invalid_grid(message: impl Into<String>) -> Self {
        Self::InvalidGrid(message.into())
    }

    pub fn split_failed(message: impl Into<String>) -> Self {
        Self::SplitFailed(message.into())
    }

    pub fn invalid_tile(tile: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidTile {
            tile: tile.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience result type for tile-splitter operations
pub type Result<T> = std::result::Result<T, Error>;
