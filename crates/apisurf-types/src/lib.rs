//! Item model for apisurf.
//!
//! This crate provides the tree an API surface is represented as: packages,
//! classes, and their members, held in one arena per snapshot. Every other
//! apisurf crate depends on `apisurf-types`.
//!
//! # Key Types
//!
//! - [`Codebase`] -- Arena owning every item of one API snapshot
//! - [`Item`] -- A node: shared [`ItemCommon`] fields plus an [`ItemKind`] payload
//! - [`ItemView`] -- Borrowed handle for walking the tree
//! - [`SignatureKey`] -- Identity used to align items across snapshots
//! - [`TypeRef`] -- Type text with top-level nullness
//! - [`Annotation`] -- Annotation occurrence in source form
//! - [`ItemPatch`] -- Batched edits applied by [`Codebase::patch`]

pub mod annotation;
pub mod codebase;
pub mod error;
pub mod item;
pub mod key;
pub mod modifiers;
pub mod order;
pub mod overloads;
pub mod types;

pub use annotation::{Annotation, AnnotationAttribute, AttributeValue};
pub use codebase::{member_key, Codebase, ItemPatch, ItemView, CONSTRUCTOR_KEY_NAME};
pub use error::{ModelError, ModelResult};
pub use item::{
    CallableData, ClassData, ClassKind, DefaultValue, FieldData, Item, ItemCommon, ItemId,
    ItemKind, ItemKindTag, MemberGroup, PackageData, Parameter, PropertyData,
};
pub use key::SignatureKey;
pub use modifiers::{Modifier, Modifiers, Visibility};
pub use order::{compare_siblings, MethodOrder};
pub use overloads::constructor_overloads;
pub use types::{Nullability, TypeRef};
