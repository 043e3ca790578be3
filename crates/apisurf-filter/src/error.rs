/// Errors raised while building filters from configuration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilterError {
    /// An annotation pattern could not be parsed.
    #[error("invalid annotation pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// An exclude entry names no attributes, so it would exclude every use.
    #[error("exclude pattern for {name} must specify at least one attribute")]
    ExcludeWithoutAttributes { name: String },

    /// Excludes for an annotation were given without any include.
    #[error("{name} has exclude patterns but no include pattern")]
    ExcludeWithoutInclude { name: String },
}

impl FilterError {
    pub fn pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias for filter construction results.
pub type FilterResult<T> = Result<T, FilterError>;
