//! Item definitions: the shared record plus one variant per item kind.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::annotation::Annotation;
use crate::key::SignatureKey;
use crate::modifiers::{Modifiers, Visibility};
use crate::types::TypeRef;

/// Index of an item inside its [`Codebase`](crate::Codebase).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub(crate) u32);

impl ItemId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fields shared by every item kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCommon {
    /// Simple name (the qualified name for packages).
    pub name: String,
    pub visibility: Visibility,
    pub modifiers: Modifiers,
    pub annotations: Vec<Annotation>,
    /// Excluded from the current API.
    pub hidden: bool,
    /// Removed from the API but still tracked for removed-API reporting.
    pub removed: bool,
    /// Part of the surface this tree was loaded as (see delta composition).
    pub emit: bool,
    /// Shown regardless of show-annotation filters.
    pub show_unconditionally: bool,
}

impl ItemCommon {
    pub fn new(name: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            name: name.into(),
            visibility,
            modifiers: Modifiers::empty(),
            annotations: Vec::new(),
            hidden: false,
            removed: false,
            emit: true,
            show_unconditionally: false,
        }
    }

    /// A public item.
    pub fn public(name: impl Into<String>) -> Self {
        Self::new(name, Visibility::Public)
    }

    #[must_use]
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    #[must_use]
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn removed(mut self) -> Self {
        self.removed = true;
        self
    }
}

/// Kind of class declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    Class,
    Interface,
    AnnotationType,
    Enum,
}

impl ClassKind {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Interface => "interface",
            Self::AnnotationType => "@interface",
            Self::Enum => "enum",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "class" => Some(Self::Class),
            "interface" => Some(Self::Interface),
            "@interface" => Some(Self::AnnotationType),
            "enum" => Some(Self::Enum),
            _ => None,
        }
    }

    /// Interfaces and annotation types list their supertypes after `extends`.
    pub fn is_interface_like(self) -> bool {
        matches!(self, Self::Interface | Self::AnnotationType)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageData {
    pub qualified_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassData {
    pub kind: ClassKind,
    pub qualified_name: String,
    /// Verbatim type parameter list including brackets, e.g. `<T extends Foo>`.
    pub type_parameters: Option<String>,
    pub super_class: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
}

impl ClassData {
    pub fn new(kind: ClassKind, qualified_name: impl Into<String>) -> Self {
        Self {
            kind,
            qualified_name: qualified_name.into(),
            type_parameters: None,
            super_class: None,
            interfaces: Vec::new(),
        }
    }
}

/// Default value of a parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    Absent,
    /// The parameter has a default whose expression is not known.
    Unknown,
    Expression(String),
}

impl DefaultValue {
    /// A known default expression. The literal `null` is what an unknown
    /// default is written as, so it maps to [`DefaultValue::Unknown`].
    pub fn expression(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim() == "null" {
            Self::Unknown
        } else {
            Self::Expression(text)
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Public name, when the declaration exposes one.
    pub name: Option<String>,
    pub ty: TypeRef,
    pub annotations: Vec<Annotation>,
    pub default: DefaultValue,
}

impl Parameter {
    pub fn new(ty: TypeRef) -> Self {
        Self {
            name: None,
            ty,
            annotations: Vec::new(),
            default: DefaultValue::Absent,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = default;
        self
    }
}

/// Constructor and method payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallableData {
    pub type_parameters: Option<String>,
    /// `None` for constructors.
    pub return_type: Option<TypeRef>,
    pub parameters: Vec<Parameter>,
    pub throws: Vec<String>,
    /// `default` value of an annotation element.
    pub annotation_default: Option<String>,
}

impl CallableData {
    pub fn constructor(parameters: Vec<Parameter>) -> Self {
        Self {
            parameters,
            ..Self::default()
        }
    }

    pub fn method(return_type: TypeRef, parameters: Vec<Parameter>) -> Self {
        Self {
            return_type: Some(return_type),
            parameters,
            ..Self::default()
        }
    }

    /// Erased parameter types, as used by signature keys.
    pub fn erased_parameters(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.ty.erased()).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldData {
    pub ty: TypeRef,
    /// Constant value expression.
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyData {
    pub ty: TypeRef,
}

/// Kind-specific payload of an item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Package(PackageData),
    Class(ClassData),
    Constructor(CallableData),
    Method(CallableData),
    Field(FieldData),
    EnumConstant(FieldData),
    Property(PropertyData),
}

impl ItemKind {
    pub fn tag(&self) -> ItemKindTag {
        match self {
            Self::Package(_) => ItemKindTag::Package,
            Self::Class(_) => ItemKindTag::Class,
            Self::Constructor(_) => ItemKindTag::Constructor,
            Self::Method(_) => ItemKindTag::Method,
            Self::Field(_) => ItemKindTag::Field,
            Self::EnumConstant(_) => ItemKindTag::EnumConstant,
            Self::Property(_) => ItemKindTag::Property,
        }
    }

    pub fn as_class(&self) -> Option<&ClassData> {
        match self {
            Self::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&CallableData> {
        match self {
            Self::Constructor(c) | Self::Method(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldData> {
        match self {
            Self::Field(f) | Self::EnumConstant(f) => Some(f),
            _ => None,
        }
    }

    /// The declared type of a method (return type), field, or property.
    pub fn declared_type(&self) -> Option<&TypeRef> {
        match self {
            Self::Method(c) => c.return_type.as_ref(),
            Self::Field(f) | Self::EnumConstant(f) => Some(&f.ty),
            Self::Property(p) => Some(&p.ty),
            _ => None,
        }
    }
}

/// Discriminant of [`ItemKind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKindTag {
    Package,
    Class,
    Constructor,
    Method,
    Field,
    EnumConstant,
    Property,
}

impl ItemKindTag {
    /// The keyword used for this kind in signature files.
    pub fn label(self) -> &'static str {
        match self {
            Self::Package => "package",
            Self::Class => "class",
            Self::Constructor => "ctor",
            Self::Method => "method",
            Self::Field => "field",
            Self::EnumConstant => "enum_constant",
            Self::Property => "property",
        }
    }

    pub fn is_member(self) -> bool {
        !matches!(self, Self::Package | Self::Class)
    }

    pub fn is_callable(self) -> bool {
        matches!(self, Self::Constructor | Self::Method)
    }

    /// Sibling group members are aligned and deduplicated within.
    ///
    /// Fields and enum constants share a namespace.
    pub fn member_group(self) -> MemberGroup {
        match self {
            Self::Constructor => MemberGroup::Constructors,
            Self::Method => MemberGroup::Methods,
            Self::Property => MemberGroup::Properties,
            Self::Field | Self::EnumConstant => MemberGroup::Fields,
            Self::Package | Self::Class => MemberGroup::Classes,
        }
    }
}

impl fmt::Display for ItemKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Groups of siblings, in the order they appear inside a class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberGroup {
    Constructors,
    Methods,
    Properties,
    Fields,
    Classes,
}

/// A node of the API tree.
#[derive(Clone, Debug)]
pub struct Item {
    pub(crate) id: ItemId,
    pub(crate) parent: Option<ItemId>,
    pub(crate) children: Vec<ItemId>,
    pub(crate) key: SignatureKey,
    pub common: ItemCommon,
    pub kind: ItemKind,
}

impl Item {
    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    pub fn children(&self) -> &[ItemId] {
        &self.children
    }

    pub fn key(&self) -> &SignatureKey {
        &self.key
    }

    pub fn tag(&self) -> ItemKindTag {
        self.kind.tag()
    }

    pub fn name(&self) -> &str {
        &self.common.name
    }
}
