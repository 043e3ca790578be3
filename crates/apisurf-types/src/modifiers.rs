use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared visibility of an item.
///
/// Ordered from least to most visible, so `a < b` means `a` is more
/// restrictive than `b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    PackagePrivate,
    Protected,
    Public,
}

impl Visibility {
    /// The source keyword, or `None` for package-private.
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            Self::Public => Some("public"),
            Self::Protected => Some("protected"),
            Self::Private => Some("private"),
            Self::PackagePrivate => None,
        }
    }

    /// Parse a visibility keyword.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "public" => Some(Self::Public),
            "protected" => Some(Self::Protected),
            "private" => Some(Self::Private),
            _ => None,
        }
    }

    /// Returns `true` for visibilities that are part of an API surface.
    pub fn is_api_visible(&self) -> bool {
        matches!(self, Self::Public | Self::Protected)
    }
}

/// A single modifier flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Abstract,
    Default,
    Static,
    Final,
    Transient,
    Volatile,
    Synchronized,
    Native,
    Deprecated,
}

impl Modifier {
    /// Every modifier, in the order they are written in a declaration.
    ///
    /// `Deprecated` comes last; depending on the file format it is written
    /// either as a keyword or as an annotation, so writers handle it apart.
    pub const ALL: [Modifier; 9] = [
        Modifier::Abstract,
        Modifier::Default,
        Modifier::Static,
        Modifier::Final,
        Modifier::Transient,
        Modifier::Volatile,
        Modifier::Synchronized,
        Modifier::Native,
        Modifier::Deprecated,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// The keyword for this modifier.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Abstract => "abstract",
            Self::Default => "default",
            Self::Static => "static",
            Self::Final => "final",
            Self::Transient => "transient",
            Self::Volatile => "volatile",
            Self::Synchronized => "synchronized",
            Self::Native => "native",
            Self::Deprecated => "deprecated",
        }
    }

    /// Parse a modifier keyword.
    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.keyword() == word)
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// An immutable set of modifiers.
///
/// Editing produces a new set (`with`/`without`); the set held by an item is
/// only ever swapped as a whole.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers(u16);

impl Modifiers {
    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns `true` if `modifier` is in the set.
    pub fn contains(self, modifier: Modifier) -> bool {
        self.0 & modifier.bit() != 0
    }

    /// A copy of this set with `modifier` added.
    #[must_use]
    pub fn with(self, modifier: Modifier) -> Self {
        Self(self.0 | modifier.bit())
    }

    /// A copy of this set with `modifier` removed.
    #[must_use]
    pub fn without(self, modifier: Modifier) -> Self {
        Self(self.0 & !modifier.bit())
    }

    /// Returns `true` if no modifier is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The modifiers in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Modifier> {
        Modifier::ALL.into_iter().filter(move |m| self.contains(*m))
    }

    pub fn is_static(self) -> bool {
        self.contains(Modifier::Static)
    }

    pub fn is_final(self) -> bool {
        self.contains(Modifier::Final)
    }

    pub fn is_abstract(self) -> bool {
        self.contains(Modifier::Abstract)
    }

    pub fn is_deprecated(self) -> bool {
        self.contains(Modifier::Deprecated)
    }
}

impl FromIterator<Modifier> for Modifiers {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Debug for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
