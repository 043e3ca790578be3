//! Signature files for apisurf.
//!
//! A signature file is the plain-text form of an API surface: one
//! declaration per line, grouped by package and class, preceded by a
//! header naming the [`FileFormat`] it was written with. This crate reads
//! and writes them and composes delta files over base files.
//!
//! # Key Types
//!
//! - [`FileFormat`] -- Format version plus its property overrides
//! - [`SignatureWriter`] -- Renders the emitted part of a codebase
//! - [`SignatureParser`] -- Loads one or more files into a codebase
//! - [`SignatureInput`] -- A file to load, marked current or base
//!
//! Writing then parsing reproduces the tree as the format can represent
//! it; [`FileFormat::normalize`] computes that image.

pub mod error;
pub mod format;
pub mod parser;
mod tokenizer;
pub mod writer;

pub use error::{FormatError, FormatResult, SignatureError, SignatureResult};
pub use format::{FileFormat, FileFormatBuilder, FormatSettings, FormatVersion, NullnessStyle};
pub use parser::{SignatureInput, SignatureParser};
pub use writer::{HeaderMode, SignatureWriter, WriterOptions};
