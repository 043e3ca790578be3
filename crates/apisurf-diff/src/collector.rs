//! Change reports built from comparison events.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;

use apisurf_filter::ItemPredicate;
use apisurf_types::{
    Codebase, DefaultValue, ItemKind, ItemKindTag, ItemView, Modifier, Nullability, TypeRef,
    Visibility,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::comparator::{compare_codebases, ComparisonVisitor};
use crate::error::DiffResult;

/// Identifies an item in a report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub kind: ItemKindTag,
    /// Signature key, e.g. `pkg.Foo#bar(int)`.
    pub key: String,
}

impl ItemRef {
    pub fn of(item: ItemView<'_>) -> Self {
        Self {
            kind: item.tag(),
            key: item.key().to_string(),
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.key)
    }
}

/// One difference between two aligned declarations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Difference {
    Visibility { old: Visibility, new: Visibility },
    ModifierAdded { modifier: Modifier },
    ModifierRemoved { modifier: Modifier },
    ClassKind { old: String, new: String },
    TypeParameters { old: Option<String>, new: Option<String> },
    /// Field, property, or method return type text.
    Type { old: String, new: String },
    Nullness { old: Nullability, new: Nullability },
    ParameterType { index: usize, old: String, new: String },
    ParameterNullness { index: usize, old: Nullability, new: Nullability },
    ParameterName { index: usize, old: Option<String>, new: Option<String> },
    DefaultValue { index: usize, old: DefaultValue, new: DefaultValue },
    AnnotationAdded { annotation: String },
    AnnotationRemoved { annotation: String },
    Superclass { old: Option<String>, new: Option<String> },
    InterfaceAdded { interface: String },
    InterfaceRemoved { interface: String },
    ThrowsAdded { exception: String },
    ThrowsRemoved { exception: String },
    /// Field constant value or annotation method default.
    Value { old: Option<String>, new: Option<String> },
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "<none>".to_string());
        match self {
            Self::Visibility { old, new } => write!(
                f,
                "visibility {} -> {}",
                old.keyword().unwrap_or("package-private"),
                new.keyword().unwrap_or("package-private")
            ),
            Self::ModifierAdded { modifier } => write!(f, "added modifier {modifier}"),
            Self::ModifierRemoved { modifier } => write!(f, "removed modifier {modifier}"),
            Self::ClassKind { old, new } => write!(f, "kind {old} -> {new}"),
            Self::TypeParameters { old, new } => write!(f, "type parameters {} -> {}", opt(old), opt(new)),
            Self::Type { old, new } => write!(f, "type {old} -> {new}"),
            Self::Nullness { old, new } => write!(f, "nullness {old:?} -> {new:?}"),
            Self::ParameterType { index, old, new } => write!(f, "parameter {index} type {old} -> {new}"),
            Self::ParameterNullness { index, old, new } => {
                write!(f, "parameter {index} nullness {old:?} -> {new:?}")
            }
            Self::ParameterName { index, old, new } => {
                write!(f, "parameter {index} name {} -> {}", opt(old), opt(new))
            }
            Self::DefaultValue { index, old, new } => {
                write!(f, "parameter {index} default {old:?} -> {new:?}")
            }
            Self::AnnotationAdded { annotation } => write!(f, "added annotation {annotation}"),
            Self::AnnotationRemoved { annotation } => write!(f, "removed annotation {annotation}"),
            Self::Superclass { old, new } => write!(f, "superclass {} -> {}", opt(old), opt(new)),
            Self::InterfaceAdded { interface } => write!(f, "added interface {interface}"),
            Self::InterfaceRemoved { interface } => write!(f, "removed interface {interface}"),
            Self::ThrowsAdded { exception } => write!(f, "added throws {exception}"),
            Self::ThrowsRemoved { exception } => write!(f, "removed throws {exception}"),
            Self::Value { old, new } => write!(f, "value {} -> {}", opt(old), opt(new)),
        }
    }
}

fn set_differences<'a, T: Ord + 'a>(
    old: impl IntoIterator<Item = &'a T>,
    new: impl IntoIterator<Item = &'a T>,
) -> (Vec<&'a T>, Vec<&'a T>) {
    let old: BTreeSet<&T> = old.into_iter().collect();
    let new: BTreeSet<&T> = new.into_iter().collect();
    let added = new.difference(&old).copied().collect();
    let removed = old.difference(&new).copied().collect();
    (added, removed)
}

/// Every difference between two aligned declarations, in a fixed order:
/// shared fields first, then the kind-specific payload.
pub fn describe_differences(old: ItemView<'_>, new: ItemView<'_>) -> Vec<Difference> {
    let mut out = Vec::new();
    let (oc, nc) = (old.common(), new.common());

    if oc.visibility != nc.visibility {
        out.push(Difference::Visibility {
            old: oc.visibility,
            new: nc.visibility,
        });
    }
    for modifier in Modifier::ALL {
        match (oc.modifiers.contains(modifier), nc.modifiers.contains(modifier)) {
            (false, true) => out.push(Difference::ModifierAdded { modifier }),
            (true, false) => out.push(Difference::ModifierRemoved { modifier }),
            _ => {}
        }
    }
    let old_annotations: Vec<String> = oc.annotations.iter().map(|a| a.to_source()).collect();
    let new_annotations: Vec<String> = nc.annotations.iter().map(|a| a.to_source()).collect();
    let (added, removed) = set_differences(&old_annotations, &new_annotations);
    out.extend(added.into_iter().map(|a| Difference::AnnotationAdded {
        annotation: a.clone(),
    }));
    out.extend(removed.into_iter().map(|a| Difference::AnnotationRemoved {
        annotation: a.clone(),
    }));

    match (old.kind(), new.kind()) {
        (ItemKind::Class(o), ItemKind::Class(n)) => {
            if o.kind != n.kind {
                out.push(Difference::ClassKind {
                    old: o.kind.keyword().to_string(),
                    new: n.kind.keyword().to_string(),
                });
            }
            if o.type_parameters != n.type_parameters {
                out.push(Difference::TypeParameters {
                    old: o.type_parameters.clone(),
                    new: n.type_parameters.clone(),
                });
            }
            let old_super = o.super_class.as_ref().map(|t| t.text().to_string());
            let new_super = n.super_class.as_ref().map(|t| t.text().to_string());
            if old_super != new_super {
                out.push(Difference::Superclass {
                    old: old_super,
                    new: new_super,
                });
            }
            let old_ifaces: Vec<String> = o.interfaces.iter().map(|t| t.text().to_string()).collect();
            let new_ifaces: Vec<String> = n.interfaces.iter().map(|t| t.text().to_string()).collect();
            let (added, removed) = set_differences(&old_ifaces, &new_ifaces);
            out.extend(added.into_iter().map(|i| Difference::InterfaceAdded {
                interface: i.clone(),
            }));
            out.extend(removed.into_iter().map(|i| Difference::InterfaceRemoved {
                interface: i.clone(),
            }));
        }
        (ItemKind::Constructor(o), ItemKind::Constructor(n)) | (ItemKind::Method(o), ItemKind::Method(n)) => {
            if o.type_parameters != n.type_parameters {
                out.push(Difference::TypeParameters {
                    old: o.type_parameters.clone(),
                    new: n.type_parameters.clone(),
                });
            }
            if let (Some(ot), Some(nt)) = (&o.return_type, &n.return_type) {
                if ot.text() != nt.text() {
                    out.push(Difference::Type {
                        old: ot.text().to_string(),
                        new: nt.text().to_string(),
                    });
                }
                if ot.nullability() != nt.nullability() {
                    out.push(Difference::Nullness {
                        old: ot.nullability(),
                        new: nt.nullability(),
                    });
                }
            }
            for (index, (op, np)) in o.parameters.iter().zip(&n.parameters).enumerate() {
                if op.ty.text() != np.ty.text() {
                    out.push(Difference::ParameterType {
                        index,
                        old: op.ty.text().to_string(),
                        new: np.ty.text().to_string(),
                    });
                }
                if op.ty.nullability() != np.ty.nullability() {
                    out.push(Difference::ParameterNullness {
                        index,
                        old: op.ty.nullability(),
                        new: np.ty.nullability(),
                    });
                }
                if op.name != np.name {
                    out.push(Difference::ParameterName {
                        index,
                        old: op.name.clone(),
                        new: np.name.clone(),
                    });
                }
                if op.default != np.default {
                    out.push(Difference::DefaultValue {
                        index,
                        old: op.default.clone(),
                        new: np.default.clone(),
                    });
                }
            }
            let (added, removed) = set_differences(&o.throws, &n.throws);
            out.extend(added.into_iter().map(|e| Difference::ThrowsAdded {
                exception: e.clone(),
            }));
            out.extend(removed.into_iter().map(|e| Difference::ThrowsRemoved {
                exception: e.clone(),
            }));
            if o.annotation_default != n.annotation_default {
                out.push(Difference::Value {
                    old: o.annotation_default.clone(),
                    new: n.annotation_default.clone(),
                });
            }
        }
        (ItemKind::Field(o), ItemKind::Field(n)) | (ItemKind::EnumConstant(o), ItemKind::EnumConstant(n)) => {
            push_type_differences(&mut out, &o.ty, &n.ty);
            if o.value != n.value {
                out.push(Difference::Value {
                    old: o.value.clone(),
                    new: n.value.clone(),
                });
            }
        }
        (ItemKind::Property(o), ItemKind::Property(n)) => push_type_differences(&mut out, &o.ty, &n.ty),
        (o, n) if o.tag() != n.tag() => out.push(Difference::ClassKind {
            old: o.tag().label().to_string(),
            new: n.tag().label().to_string(),
        }),
        _ => {}
    }
    out
}

fn push_type_differences(out: &mut Vec<Difference>, old: &TypeRef, new: &TypeRef) {
    if old.text() != new.text() {
        out.push(Difference::Type {
            old: old.text().to_string(),
            new: new.text().to_string(),
        });
    }
    if old.nullability() != new.nullability() {
        out.push(Difference::Nullness {
            old: old.nullability(),
            new: new.nullability(),
        });
    }
}

/// One entry of an [`ApiDiff`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ApiChange {
    Added { item: ItemRef },
    Removed { item: ItemRef },
    Changed { item: ItemRef, differences: Vec<Difference> },
}

impl ApiChange {
    pub fn item(&self) -> &ItemRef {
        match self {
            Self::Added { item } | Self::Removed { item } | Self::Changed { item, .. } => item,
        }
    }
}

impl fmt::Display for ApiChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { item } => write!(f, "added {item}"),
            Self::Removed { item } => write!(f, "removed {item}"),
            Self::Changed { item, differences } => {
                let details: Vec<String> = differences.iter().map(ToString::to_string).collect();
                write!(f, "changed {item}: {}", details.join("; "))
            }
        }
    }
}

/// The changes between two API surfaces, in comparison order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDiff {
    pub changes: Vec<ApiChange>,
}

impl ApiDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the surfaces are identical.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn added(&self) -> impl Iterator<Item = &ItemRef> {
        self.changes.iter().filter_map(|c| match c {
            ApiChange::Added { item } => Some(item),
            _ => None,
        })
    }

    pub fn removed(&self) -> impl Iterator<Item = &ItemRef> {
        self.changes.iter().filter_map(|c| match c {
            ApiChange::Removed { item } => Some(item),
            _ => None,
        })
    }

    pub fn changed(&self) -> impl Iterator<Item = &ApiChange> {
        self.changes
            .iter()
            .filter(|c| matches!(c, ApiChange::Changed { .. }))
    }

    pub fn to_json(&self) -> DiffResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Restricts each side of a comparison to the items a predicate accepts.
///
/// A pair where only one side is accepted is reported as an addition or a
/// removal of that side.
#[derive(Clone, Debug, Default)]
pub struct SideFilter {
    pub old: Option<ItemPredicate>,
    pub new: Option<ItemPredicate>,
}

/// What a filtered comparison event amounts to.
pub(crate) enum Event<'o, 'n> {
    Compare(ItemView<'o>, ItemView<'n>),
    Added(ItemView<'n>),
    Removed(ItemView<'o>),
    Skip,
}

impl SideFilter {
    pub fn new(old: ItemPredicate, new: ItemPredicate) -> Self {
        Self {
            old: Some(old),
            new: Some(new),
        }
    }

    fn accepts(predicate: &Option<ItemPredicate>, item: ItemView<'_>) -> bool {
        predicate.as_ref().map_or(true, |p| p.test(item))
    }

    pub(crate) fn compare<'o, 'n>(&self, old: ItemView<'o>, new: ItemView<'n>) -> Event<'o, 'n> {
        match (Self::accepts(&self.old, old), Self::accepts(&self.new, new)) {
            (true, true) => Event::Compare(old, new),
            (true, false) => Event::Removed(old),
            (false, true) => Event::Added(new),
            (false, false) => Event::Skip,
        }
    }

    pub(crate) fn added<'o, 'n>(&self, new: ItemView<'n>) -> Event<'o, 'n> {
        if Self::accepts(&self.new, new) {
            Event::Added(new)
        } else {
            Event::Skip
        }
    }

    pub(crate) fn removed<'o, 'n>(&self, old: ItemView<'o>) -> Event<'o, 'n> {
        if Self::accepts(&self.old, old) {
            Event::Removed(old)
        } else {
            Event::Skip
        }
    }
}

/// Collects comparison events into an [`ApiDiff`].
///
/// Pairs without differences are left out.
#[derive(Clone, Debug, Default)]
pub struct ChangeCollector {
    filter: SideFilter,
    recurse: bool,
    diff: ApiDiff,
}

impl ChangeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_filter(mut self, filter: SideFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Also list the contents of added and removed packages and classes.
    #[must_use]
    pub fn recursive(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    pub fn into_diff(self) -> ApiDiff {
        self.diff
    }

    fn record(&mut self, event: Event<'_, '_>) {
        let change = match event {
            Event::Compare(old, new) => {
                let differences = describe_differences(old, new);
                if differences.is_empty() {
                    return;
                }
                ApiChange::Changed {
                    item: ItemRef::of(new),
                    differences,
                }
            }
            Event::Added(new) => ApiChange::Added {
                item: ItemRef::of(new),
            },
            Event::Removed(old) => ApiChange::Removed {
                item: ItemRef::of(old),
            },
            Event::Skip => return,
        };
        self.diff.changes.push(change);
    }
}

impl ComparisonVisitor for ChangeCollector {
    type Error = Infallible;

    fn compare(&mut self, old: ItemView<'_>, new: ItemView<'_>) -> Result<(), Infallible> {
        let event = self.filter.compare(old, new);
        self.record(event);
        Ok(())
    }

    fn added(&mut self, new: ItemView<'_>) -> Result<(), Infallible> {
        let event = self.filter.added(new);
        self.record(event);
        Ok(())
    }

    fn removed(&mut self, old: ItemView<'_>) -> Result<(), Infallible> {
        let event = self.filter.removed(old);
        self.record(event);
        Ok(())
    }

    fn recurse_into_added(&self) -> bool {
        self.recurse
    }

    fn recurse_into_removed(&self) -> bool {
        self.recurse
    }
}

/// Compare two codebases and collect every change.
pub fn diff_codebases(old: &Codebase, new: &Codebase) -> ApiDiff {
    let mut collector = ChangeCollector::new();
    match compare_codebases(old, new, &mut collector) {
        Ok(()) => {}
        Err(never) => match never {},
    }
    let diff = collector.into_diff();
    debug!(changes = diff.len(), "collected api changes");
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use apisurf_filter::Surface;
    use apisurf_types::{
        Annotation, CallableData, ClassData, ClassKind, FieldData, ItemCommon, ItemId, ItemPatch,
        Parameter,
    };

    fn class(cb: &mut Codebase, qualified: &str) -> ItemId {
        let (package, simple) = qualified.rsplit_once('.').unwrap();
        let pkg = cb.ensure_package(package).unwrap();
        cb.add_class(pkg, ItemCommon::public(simple), ClassData::new(ClassKind::Class, qualified))
            .unwrap()
    }

    fn method(cb: &mut Codebase, class: ItemId, name: &str, ret: TypeRef, params: Vec<Parameter>) -> ItemId {
        cb.add_member(class, ItemCommon::public(name), ItemKind::Method(CallableData::method(ret, params)))
            .unwrap()
    }

    fn method_named(cb: &Codebase, class: &str, name: &str) -> ItemId {
        let class = cb.find_class(class).unwrap();
        cb.view(class).methods().find(|m| m.name() == name).unwrap().id()
    }

    #[test]
    fn added_method_is_the_only_change() {
        let mut v1 = Codebase::new();
        let foo = class(&mut v1, "pkg.Foo");
        method(&mut v1, foo, "bar", TypeRef::new("void"), vec![]);
        let mut v2 = v1.clone();
        let foo2 = v2.find_class("pkg.Foo").unwrap();
        method(&mut v2, foo2, "baz", TypeRef::new("void"), vec![]);

        let diff = diff_codebases(&v1, &v2);
        assert_eq!(
            diff.changes,
            vec![ApiChange::Added {
                item: ItemRef {
                    kind: ItemKindTag::Method,
                    key: "pkg.Foo#baz()".into(),
                },
            }]
        );
        assert_eq!(diff.changes[0].to_string(), "added method pkg.Foo#baz()");
    }

    #[test]
    fn differences_are_described() {
        let mut old = Codebase::new();
        let c = class(&mut old, "p.C");
        let old_m = method(
            &mut old,
            c,
            "m",
            TypeRef::non_null("java.lang.String"),
            vec![Parameter::new(TypeRef::nullable("java.lang.Object")).named("o")],
        );
        old.patch(old_m, &ItemPatch::new().add_modifier(Modifier::Final));

        let mut new = Codebase::new();
        let c = class(&mut new, "p.C");
        let m = new
            .add_member(
                c,
                ItemCommon::public("m"),
                ItemKind::Method(CallableData {
                    throws: vec!["java.io.IOException".into()],
                    ..CallableData::method(
                        TypeRef::nullable("java.lang.String"),
                        vec![Parameter::new(TypeRef::non_null("java.lang.Object")).named("other")],
                    )
                }),
            )
            .unwrap();
        new.patch(
            m,
            &ItemPatch::new()
                .visibility(Visibility::Protected)
                .add_annotation(Annotation::new("p.Experimental")),
        );

        let diffs = describe_differences(old.view(old_m), new.view(m));
        assert_eq!(
            diffs,
            vec![
                Difference::Visibility {
                    old: Visibility::Public,
                    new: Visibility::Protected
                },
                Difference::ModifierRemoved {
                    modifier: Modifier::Final
                },
                Difference::AnnotationAdded {
                    annotation: "@p.Experimental".into()
                },
                Difference::Nullness {
                    old: Nullability::NonNull,
                    new: Nullability::Nullable
                },
                Difference::ParameterNullness {
                    index: 0,
                    old: Nullability::Nullable,
                    new: Nullability::NonNull
                },
                Difference::ParameterName {
                    index: 0,
                    old: Some("o".into()),
                    new: Some("other".into())
                },
                Difference::ThrowsAdded {
                    exception: "java.io.IOException".into()
                },
            ]
        );
    }

    #[test]
    fn field_values_and_types() {
        let mut old = Codebase::new();
        let c = class(&mut old, "p.C");
        let f = old
            .add_member(
                c,
                ItemCommon::public("X"),
                ItemKind::Field(FieldData {
                    ty: TypeRef::new("int"),
                    value: Some("1".into()),
                }),
            )
            .unwrap();
        let mut new = Codebase::new();
        let c2 = class(&mut new, "p.C");
        let f2 = new
            .add_member(
                c2,
                ItemCommon::public("X"),
                ItemKind::Field(FieldData {
                    ty: TypeRef::new("long"),
                    value: Some("2".into()),
                }),
            )
            .unwrap();
        assert_eq!(
            describe_differences(old.view(f), new.view(f2)),
            vec![
                Difference::Type {
                    old: "int".into(),
                    new: "long".into()
                },
                Difference::Value {
                    old: Some("1".into()),
                    new: Some("2".into())
                },
            ]
        );
    }

    #[test]
    fn side_filters_turn_hidden_pairs_into_additions() {
        let mut old = Codebase::new();
        let c = class(&mut old, "p.C");
        let m = method(&mut old, c, "m", TypeRef::new("void"), vec![]);
        old.patch(m, &ItemPatch::new().hidden(true));
        let mut new = old.clone();
        let m2 = method_named(&new, "p.C", "m");
        new.patch(m2, &ItemPatch::new().hidden(false));

        let visible = ItemPredicate::SurfaceVisible(Surface::Public);
        let mut collector =
            ChangeCollector::new().with_filter(SideFilter::new(visible.clone(), visible));
        compare_codebases(&old, &new, &mut collector).unwrap();
        let diff = collector.into_diff();
        assert_eq!(diff.added().map(|i| i.key.as_str()).collect::<Vec<_>>(), vec!["p.C#m()"]);
        assert_eq!(diff.removed().count(), 0);
    }

    #[test]
    fn reports_serialize_to_json() {
        let diff = ApiDiff {
            changes: vec![
                ApiChange::Removed {
                    item: ItemRef {
                        kind: ItemKindTag::Class,
                        key: "p.Gone".into(),
                    },
                },
                ApiChange::Changed {
                    item: ItemRef {
                        kind: ItemKindTag::Field,
                        key: "p.C#X".into(),
                    },
                    differences: vec![Difference::ModifierAdded {
                        modifier: Modifier::Final,
                    }],
                },
            ],
        };
        let json = diff.to_json().unwrap();
        assert!(json.contains(r#""change": "removed""#));
        assert!(json.contains(r#""kind": "modifier_added""#));
        let back: ApiDiff = serde_json::from_str(&json).unwrap();
        assert_eq!(back, diff);
    }
}
