//! API surface comparison for apisurf.
//!
//! Aligns two codebases declaration by declaration and reports what was
//! added, removed, or kept to a [`ComparisonVisitor`]. The comparator
//! itself never filters; visitors decide which events matter.
//!
//! # Key Types
//!
//! - [`compare_codebases`] / [`ComparisonVisitor`] -- Tree alignment and its event sink
//! - [`ChangeCollector`] / [`ApiDiff`] / [`ApiChange`] -- Structured change report
//! - [`CompatibilityChecker`] / [`Issue`] -- Compatibility policy over the same events
//! - [`SignatureDiff`] -- Line-level diff of rendered signature files

pub mod collector;
pub mod compat;
pub mod comparator;
pub mod error;
pub mod text_diff;

pub use collector::{
    describe_differences, diff_codebases, ApiChange, ApiDiff, ChangeCollector, Difference, ItemRef,
    SideFilter,
};
pub use compat::{CompatibilityChecker, CompatibilityConfig, Issue, IssueKind, Severity};
pub use comparator::{compare_codebases, ComparisonVisitor};
pub use error::{DiffError, DiffResult};
pub use text_diff::{diff_signature_text, DiffHunk, DiffLine, SignatureDiff};
