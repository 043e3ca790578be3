//! Surface selection for apisurf.
//!
//! Decides which items of a [`Codebase`](apisurf_types::Codebase) belong in
//! an output surface (emit) and which may be mentioned by it (reference).
//! Rules are [`ItemPredicate`] combinators built from a [`FilterConfig`];
//! [`ApiTraversal`] walks a codebase in canonical order applying them.
//!
//! # Key Types
//!
//! - [`FilterConfig`] / [`SurfacePredicates`] -- Surface rules and the predicates built from them
//! - [`ApiTraversal`] / [`ApiVisitor`] -- Filtered walk in canonical order
//! - [`SurfaceTags`] -- Emit and reference decisions stored beside a codebase, so one
//!   shared tree can be tagged for several surfaces at once (the CLI reports its counts)
//!
//! ```rust
//! use apisurf_filter::{FilterConfig, SurfacePredicates};
//! use apisurf_types::Codebase;
//!
//! let mut codebase = Codebase::new();
//! let pkg = codebase.ensure_package("com.example").unwrap();
//! let predicates = SurfacePredicates::from_config(&FilterConfig::default()).unwrap();
//! assert!(predicates.emit.test(codebase.view(pkg)));
//! ```

pub mod annotation;
pub mod config;
pub mod error;
pub mod predicate;
pub mod tags;
pub mod traversal;

pub use annotation::{AnnotationFilter, AnnotationFilterBuilder, AnnotationFilterEntry, Polarity};
pub use config::{FilterConfig, PackageFilter, Surface};
pub use error::{FilterError, FilterResult};
pub use predicate::{
    ItemPredicate, NoRequiredOverrides, OverridePolicy, RequiredOverrides, SurfacePredicates,
};
pub use tags::SurfaceTags;
pub use traversal::{ApiTraversal, ApiVisitor};
