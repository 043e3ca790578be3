use thiserror::Error;

/// Invalid file format configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("unknown signature format version {0:?}")]
    UnknownVersion(String),

    #[error("unknown format property {0:?}")]
    UnknownProperty(String),

    #[error("invalid value {value:?} for format property {key}")]
    InvalidValue { key: String, value: String },

    #[error("{property}=yes requires {requires}=yes")]
    Conflict {
        property: &'static str,
        requires: &'static str,
    },

    #[error("format properties can only be overridden for version 5.0, not {version}")]
    OverridesNotSupported { version: String },
}

pub type FormatResult<T> = Result<T, FormatError>;

/// Errors reading or parsing signature files.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("{file}: missing signature format header")]
    MissingHeader { file: String },

    #[error("{file}: unknown signature format version {version:?}")]
    UnknownVersion { file: String, version: String },

    #[error("{file}:{line}:{column}: {message}")]
    Syntax {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("{file}: format properties are only allowed in 5.0 headers, found one in a {version} header")]
    PropertyNotSupported { file: String, version: String },

    #[error("invalid file format: {0}")]
    Format(#[from] FormatError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SignatureResult<T> = Result<T, SignatureError>;
