use thiserror::Error;

/// Errors produced while building or editing a codebase.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("duplicate {kind} {key}")]
    DuplicateItem { kind: &'static str, key: String },

    #[error("{child} cannot be placed inside {parent}")]
    InvalidParent { parent: String, child: &'static str },

    #[error("expected a {expected} item, got {actual}")]
    KindMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("replacement for {existing} has a different signature key {replacement}")]
    KeyMismatch { existing: String, replacement: String },

    #[error("invalid annotation {text:?}: {reason}")]
    InvalidAnnotation { text: String, reason: String },

    #[error("codebase already holds {0} items, no item id left")]
    CapacityExceeded(usize),
}

/// Convenience alias for model results.
pub type ModelResult<T> = Result<T, ModelError>;
