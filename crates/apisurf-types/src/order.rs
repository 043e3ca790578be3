//! Canonical sibling ordering.
//!
//! Both the signature writer and the comparator rely on siblings being
//! ordered the same way, so the rules live in one place.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::item::{Item, ItemKind, ItemKindTag, MemberGroup};

/// Ordering of constructors and methods within a class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodOrder {
    /// By name, then erased parameter types.
    #[default]
    Signature,
    /// Declaration order is kept.
    Source,
}

impl MethodOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Signature => "signature",
            Self::Source => "source",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "signature" => Some(Self::Signature),
            "source" => Some(Self::Source),
            _ => None,
        }
    }
}

/// Position of an item among its siblings: member group first, then enum
/// constants ahead of plain fields.
pub fn sibling_rank(item: &Item) -> (MemberGroup, u8) {
    let tag = item.tag();
    let sub = match tag {
        ItemKindTag::EnumConstant => 0,
        ItemKindTag::Field => 1,
        _ => 0,
    };
    (tag.member_group(), sub)
}

/// Total order over siblings. Returns `Equal` for callables under
/// [`MethodOrder::Source`], so a stable sort keeps declaration order.
pub fn compare_siblings(a: &Item, b: &Item, order: MethodOrder) -> Ordering {
    sibling_rank(a).cmp(&sibling_rank(b)).then_with(|| match (&a.kind, &b.kind) {
        (ItemKind::Class(x), ItemKind::Class(y)) => x.qualified_name.cmp(&y.qualified_name),
        (ItemKind::Package(x), ItemKind::Package(y)) => x.qualified_name.cmp(&y.qualified_name),
        (ItemKind::Constructor(_) | ItemKind::Method(_), _) => match order {
            MethodOrder::Signature => a.key().cmp_local(b.key()),
            MethodOrder::Source => Ordering::Equal,
        },
        _ => a.name().cmp(b.name()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CallableData, ClassData, ClassKind, Codebase, FieldData, ItemCommon, TypeRef};

    #[test]
    fn parse_roundtrip() {
        for order in [MethodOrder::Signature, MethodOrder::Source] {
            assert_eq!(MethodOrder::parse(order.as_str()), Some(order));
        }
        assert_eq!(MethodOrder::parse("alphabetical"), None);
    }

    #[test]
    fn enum_constants_precede_fields_and_methods_precede_both() {
        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("p").unwrap();
        let cls = cb
            .add_class(pkg, ItemCommon::public("E"), ClassData::new(ClassKind::Enum, "p.E"))
            .unwrap();
        let field = cb
            .add_member(
                cls,
                ItemCommon::public("A"),
                ItemKind::Field(FieldData { ty: TypeRef::new("int"), value: None }),
            )
            .unwrap();
        let constant = cb
            .add_member(
                cls,
                ItemCommon::public("Z"),
                ItemKind::EnumConstant(FieldData { ty: TypeRef::new("p.E"), value: None }),
            )
            .unwrap();
        let method = cb
            .add_member(
                cls,
                ItemCommon::public("values"),
                ItemKind::Method(CallableData::method(TypeRef::new("p.E[]"), vec![])),
            )
            .unwrap();

        let sig = MethodOrder::Signature;
        assert_eq!(compare_siblings(&cb[constant], &cb[field], sig), Ordering::Less);
        assert_eq!(compare_siblings(&cb[method], &cb[constant], sig), Ordering::Less);
    }
}
