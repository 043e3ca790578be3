//! Error types for the diff crate.

use apisurf_filter::FilterError;

/// Errors that can occur while setting up or reporting a comparison.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The surface filter restricting a side could not be built.
    #[error("invalid surface filter: {0}")]
    Filter(#[from] FilterError),

    /// A report could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DiffError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
