//! Store error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or saving a dataset.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No dataset exists at the given path.
    #[error("dataset not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but is not a valid dataset.
    #[error("malformed dataset {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    /// Reading or writing the dataset failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns `true` if retrying with a different path could help.
    pub fn is_missing(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
