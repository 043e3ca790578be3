use std::fmt;

use serde::{Deserialize, Serialize};

/// Nullness of a type reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nullability {
    NonNull,
    Nullable,
    /// Nullness is not declared (Java "platform" type).
    Platform,
}

const PRIMITIVES: &[&str] = &[
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void",
];

/// A reference to a type as it appears in a declaration.
///
/// `text` is the type without its top-level nullness marker, e.g.
/// `java.util.List<java.lang.String>` or `int[]`. Generic arguments are kept
/// verbatim; only the outermost nullness is modelled.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    text: String,
    nullability: Nullability,
}

impl TypeRef {
    /// A type with undeclared nullness (non-null for primitives).
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let nullability = if is_primitive(&text) {
            Nullability::NonNull
        } else {
            Nullability::Platform
        };
        Self { text, nullability }
    }

    pub fn nullable(text: impl Into<String>) -> Self {
        Self::new(text).with_nullability(Nullability::Nullable)
    }

    pub fn non_null(text: impl Into<String>) -> Self {
        Self::new(text).with_nullability(Nullability::NonNull)
    }

    /// Replace the nullness. Primitive types stay non-null.
    #[must_use]
    pub fn with_nullability(mut self, nullability: Nullability) -> Self {
        if !self.is_primitive() {
            self.nullability = nullability;
        }
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn nullability(&self) -> Nullability {
        self.nullability
    }

    pub fn is_primitive(&self) -> bool {
        is_primitive(&self.text)
    }

    pub fn is_varargs(&self) -> bool {
        self.text.ends_with("...")
    }

    /// The erased form used for signature identity.
    ///
    /// Generic arguments, whitespace, and nullness markers are dropped and a
    /// varargs `...` becomes `[]`.
    pub fn erased(&self) -> String {
        erase(&self.text)
    }

    /// The Kotlin-style nullness suffix for this type.
    pub fn kotlin_suffix(&self) -> &'static str {
        if self.is_primitive() {
            return "";
        }
        match self.nullability {
            Nullability::NonNull => "",
            Nullability::Nullable => "?",
            Nullability::Platform => "!",
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.text, self.kotlin_suffix())
    }
}

/// Returns `true` for Java primitive type names (including `void`).
pub fn is_primitive(text: &str) -> bool {
    PRIMITIVES.contains(&text)
}

/// Erase a type text; see [`TypeRef::erased`].
pub fn erase(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            '?' | '!' => {}
            c if c.is_whitespace() => {}
            c => out.push(c),
        }
    }
    match out.strip_suffix("...") {
        Some(base) => format!("{base}[]"),
        None => out,
    }
}
