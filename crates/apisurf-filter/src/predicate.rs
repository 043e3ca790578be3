//! Item predicates.
//!
//! Emission and reference rules are expressed as a small combinator tree so
//! each rule can be tested on its own and composed per surface.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use apisurf_types::{ItemKindTag, ItemView, MethodOrder, TypeRef};

use crate::annotation::AnnotationFilter;
use crate::config::{FilterConfig, PackageFilter, Surface};
use crate::error::FilterResult;

// ---------------------------------------------------------------------------
// Override policy
// ---------------------------------------------------------------------------

/// Decides which overriding methods must be kept even when the method they
/// override is already part of the output.
pub trait OverridePolicy: Send + Sync + fmt::Debug {
    fn is_required_override(&self, method: ItemView<'_>) -> bool;
}

/// No override is required; every matching override is elided.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRequiredOverrides;

impl OverridePolicy for NoRequiredOverrides {
    fn is_required_override(&self, _method: ItemView<'_>) -> bool {
        false
    }
}

/// An explicit set of required overrides, keyed as `owner#name(params)`.
#[derive(Clone, Debug, Default)]
pub struct RequiredOverrides {
    keys: HashSet<String>,
}

impl RequiredOverrides {
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>) {
        self.keys.insert(key.into());
    }
}

impl OverridePolicy for RequiredOverrides {
    fn is_required_override(&self, method: ItemView<'_>) -> bool {
        self.keys.contains(&method.key().to_string())
    }
}

// ---------------------------------------------------------------------------
// ItemPredicate
// ---------------------------------------------------------------------------

/// A rule over items.
#[derive(Clone, Debug)]
pub enum ItemPredicate {
    Always,
    Never,
    Not(Box<ItemPredicate>),
    /// All hold (true when empty).
    And(Vec<ItemPredicate>),
    /// Any holds (false when empty).
    Or(Vec<ItemPredicate>),
    /// The item belongs to the surface: effectively visible, plus the
    /// surface's hidden/removed rule.
    SurfaceVisible(Surface),
    /// The item may be referenced from the surface: like `SurfaceVisible`
    /// but the removed state does not matter.
    Referenceable(Surface),
    /// The containing package passes the filter.
    PackageIncluded(PackageFilter),
    /// The item or an enclosing item is shown regardless of annotations.
    ShownUnconditionally,
    /// The item or an enclosing class or package carries a matched
    /// annotation.
    MatchesAnnotation(AnnotationFilter),
    /// The item or an enclosing item carries a matched hide annotation.
    HiddenByAnnotation(AnnotationFilter),
    /// The item came from the current layer of a delta-composed tree.
    EmitFlag,
    /// The item is a method overriding an ancestor method with the same
    /// signature key, erased return type and visibility that `inner`
    /// accepts, and the policy does not require it.
    OverrideElided {
        inner: Box<ItemPredicate>,
        required: Arc<dyn OverridePolicy>,
    },
}

impl ItemPredicate {
    pub fn test(&self, item: ItemView<'_>) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Not(inner) => !inner.test(item),
            Self::And(all) => all.iter().all(|p| p.test(item)),
            Self::Or(any) => any.iter().any(|p| p.test(item)),
            Self::SurfaceVisible(surface) => {
                effectively_visible(item)
                    && match surface {
                        Surface::Public => !effectively_hidden(item) && !effectively_removed(item),
                        Surface::Removed => effectively_removed(item),
                        Surface::All => true,
                    }
            }
            Self::Referenceable(surface) => {
                effectively_visible(item)
                    && match surface {
                        Surface::Public => !effectively_hidden(item),
                        Surface::Removed | Surface::All => true,
                    }
            }
            Self::PackageIncluded(filter) => item
                .containing_package()
                .is_some_and(|p| filter.matches(&p.qualified_name())),
            Self::ShownUnconditionally => in_scope(item).any(|v| v.common().show_unconditionally),
            Self::MatchesAnnotation(filter) | Self::HiddenByAnnotation(filter) => {
                in_scope(item).any(|v| filter.matches_any(&v.common().annotations))
            }
            Self::EmitFlag => item.common().emit,
            Self::OverrideElided { inner, required } => {
                item.tag() == ItemKindTag::Method
                    && !item.common().modifiers.is_static()
                    && !required.is_required_override(item)
                    && overrides_accepted(item, inner)
            }
        }
    }

    /// Conjunction, flattening nested `And`s.
    #[must_use]
    pub fn and(self, other: ItemPredicate) -> Self {
        match self {
            Self::Always => other,
            Self::And(mut all) => {
                all.push(other);
                Self::And(all)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Disjunction, flattening nested `Or`s.
    #[must_use]
    pub fn or(self, other: ItemPredicate) -> Self {
        match self {
            Self::Never => other,
            Self::Or(mut any) => {
                any.push(other);
                Self::Or(any)
            }
            first => Self::Or(vec![first, other]),
        }
    }
}

impl std::ops::Not for ItemPredicate {
    type Output = ItemPredicate;

    fn not(self) -> ItemPredicate {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }
}

/// The item followed by its enclosing items.
fn in_scope<'a>(item: ItemView<'a>) -> impl Iterator<Item = ItemView<'a>> {
    std::iter::once(item).chain(item.ancestors())
}

/// The item and every enclosing class have API visibility.
fn effectively_visible(item: ItemView<'_>) -> bool {
    in_scope(item)
        .filter(|v| v.tag() != ItemKindTag::Package)
        .all(|v| v.common().visibility.is_api_visible())
}

fn effectively_hidden(item: ItemView<'_>) -> bool {
    in_scope(item).any(|v| v.common().hidden)
}

fn effectively_removed(item: ItemView<'_>) -> bool {
    in_scope(item).any(|v| v.common().removed)
}

fn supertypes<'a>(class: ItemView<'a>) -> impl Iterator<Item = ItemView<'a>> {
    class.super_class().into_iter().chain(class.interfaces())
}

fn overrides_accepted(method: ItemView<'_>, inner: &ItemPredicate) -> bool {
    let Some(class) = method.containing_class() else {
        return false;
    };
    let return_type = method.kind().declared_type().map(TypeRef::erased);
    let visibility = method.common().visibility;

    let mut visited = HashSet::from([class.id()]);
    let mut queue: VecDeque<ItemView<'_>> = supertypes(class).collect();
    while let Some(ancestor) = queue.pop_front() {
        if !visited.insert(ancestor.id()) {
            continue;
        }
        let matched = ancestor.methods().any(|m| {
            m.key().same_local(method.key())
                && m.common().visibility == visibility
                && m.kind().declared_type().map(TypeRef::erased) == return_type
                && inner.test(m)
        });
        if matched {
            return true;
        }
        queue.extend(supertypes(ancestor));
    }
    false
}

// ---------------------------------------------------------------------------
// SurfacePredicates
// ---------------------------------------------------------------------------

/// The predicates one surface extraction runs with.
#[derive(Clone, Debug)]
pub struct SurfacePredicates {
    /// Items written to the surface.
    pub emit: ItemPredicate,
    /// Items the surface may mention. Every emitted item is referenceable.
    pub reference: ItemPredicate,
    /// Overrides left out because the overridden method is referenceable.
    pub elide: ItemPredicate,
    pub method_order: MethodOrder,
    pub include_empty_outer_classes: bool,
}

impl SurfacePredicates {
    /// Build from configuration, with required overrides taken from
    /// `config.required_overrides`.
    pub fn from_config(config: &FilterConfig) -> FilterResult<Self> {
        let policy: Arc<dyn OverridePolicy> = if config.required_overrides.is_empty() {
            Arc::new(NoRequiredOverrides)
        } else {
            Arc::new(RequiredOverrides::new(config.required_overrides.iter().cloned()))
        };
        Self::with_override_policy(config, policy)
    }

    pub fn with_override_policy(
        config: &FilterConfig,
        required: Arc<dyn OverridePolicy>,
    ) -> FilterResult<Self> {
        let show = AnnotationFilter::from_patterns(config.show_annotations.iter().map(String::as_str))?;
        let hide = AnnotationFilter::from_patterns(config.hide_annotations.iter().map(String::as_str))?;

        let mut scope = ItemPredicate::Always;
        if !config.packages.is_empty() {
            scope = scope.and(ItemPredicate::PackageIncluded(config.packages.clone()));
        }
        if !hide.is_empty() {
            scope = scope.and(!ItemPredicate::HiddenByAnnotation(hide));
        }

        let shown = if show.is_empty() || config.show_unannotated {
            ItemPredicate::Always
        } else {
            ItemPredicate::ShownUnconditionally.or(ItemPredicate::MatchesAnnotation(show))
        };

        let emit = ItemPredicate::SurfaceVisible(config.surface)
            .and(scope.clone())
            .and(shown);
        let reference = ItemPredicate::Referenceable(config.surface).and(scope);
        let elide = ItemPredicate::OverrideElided {
            inner: Box::new(reference.clone()),
            required,
        };

        Ok(Self {
            emit,
            reference,
            elide,
            method_order: config.method_order,
            include_empty_outer_classes: config.include_empty_outer_classes,
        })
    }

    /// Emit everything visible, without elision.
    pub fn everything() -> Self {
        Self {
            emit: ItemPredicate::SurfaceVisible(Surface::All),
            reference: ItemPredicate::Referenceable(Surface::All),
            elide: ItemPredicate::Never,
            method_order: MethodOrder::Signature,
            include_empty_outer_classes: false,
        }
    }

    /// Restrict emission to items of the current layer.
    #[must_use]
    pub fn only_current(mut self) -> Self {
        self.emit = self.emit.and(ItemPredicate::EmitFlag);
        self
    }

    /// What a writer emits: emittable and not elided.
    pub fn emit_filter(&self) -> ItemPredicate {
        self.emit.clone().and(!self.elide.clone())
    }
}

impl Default for SurfacePredicates {
    fn default() -> Self {
        Self::everything()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apisurf_types::{
        Annotation, CallableData, ClassData, ClassKind, Codebase, ItemCommon, ItemId, ItemKind,
        ItemPatch, Parameter, Visibility,
    };
    use proptest::prelude::*;

    fn method(cb: &mut Codebase, class: ItemId, name: &str, ret: &str) -> ItemId {
        cb.add_member(
            class,
            ItemCommon::public(name),
            ItemKind::Method(CallableData::method(
                TypeRef::new(ret),
                vec![Parameter::new(TypeRef::new("int"))],
            )),
        )
        .unwrap()
    }

    fn class(cb: &mut Codebase, parent: ItemId, name: &str, kind: ClassKind, supers: &[&str]) -> ItemId {
        let mut data = ClassData::new(kind, format!("p.{name}"));
        match kind {
            ClassKind::Class => {
                data.super_class = supers.first().map(|s| TypeRef::new(format!("p.{s}")));
                data.interfaces = supers.iter().skip(1).map(|s| TypeRef::new(format!("p.{s}"))).collect();
            }
            _ => data.interfaces = supers.iter().map(|s| TypeRef::new(format!("p.{s}"))).collect(),
        }
        cb.add_class(parent, ItemCommon::public(name), data).unwrap()
    }

    fn public() -> SurfacePredicates {
        SurfacePredicates::from_config(&FilterConfig::default()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Combinators
    // -----------------------------------------------------------------------

    #[test]
    fn combinator_identities() {
        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("p").unwrap();
        let view = cb.view(pkg);
        assert!(ItemPredicate::And(vec![]).test(view));
        assert!(!ItemPredicate::Or(vec![]).test(view));
        assert!((!ItemPredicate::Never).test(view));
        assert!(matches!(!!ItemPredicate::Always, ItemPredicate::Always));
        assert!(ItemPredicate::Never.or(ItemPredicate::Always).test(view));
        assert!(!ItemPredicate::Always.and(ItemPredicate::Never).test(view));
    }

    // -----------------------------------------------------------------------
    // Surface rules
    // -----------------------------------------------------------------------

    #[test]
    fn surfaces_split_on_hidden_and_removed() {
        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("p").unwrap();
        let c = class(&mut cb, pkg, "C", ClassKind::Class, &[]);
        let plain = method(&mut cb, c, "plain", "void");
        let removed = method(&mut cb, c, "gone", "void");
        let hidden = method(&mut cb, c, "secret", "void");
        cb.patch(removed, &ItemPatch::new().removed(true));
        cb.patch(hidden, &ItemPatch::new().hidden(true));

        let public = ItemPredicate::SurfaceVisible(Surface::Public);
        let removed_surface = ItemPredicate::SurfaceVisible(Surface::Removed);
        let all = ItemPredicate::SurfaceVisible(Surface::All);

        assert!(public.test(cb.view(plain)));
        assert!(!public.test(cb.view(removed)));
        assert!(!public.test(cb.view(hidden)));
        assert!(removed_surface.test(cb.view(removed)));
        assert!(!removed_surface.test(cb.view(plain)));
        assert!(all.test(cb.view(hidden)));

        assert!(ItemPredicate::Referenceable(Surface::Public).test(cb.view(removed)));
        assert!(!ItemPredicate::Referenceable(Surface::Public).test(cb.view(hidden)));
    }

    #[test]
    fn visibility_is_inherited_from_enclosing_classes() {
        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("p").unwrap();
        let c = class(&mut cb, pkg, "C", ClassKind::Class, &[]);
        cb.patch(c, &ItemPatch::new().visibility(Visibility::PackagePrivate));
        let m = method(&mut cb, c, "m", "void");
        assert!(!ItemPredicate::SurfaceVisible(Surface::All).test(cb.view(m)));
    }

    #[test]
    fn show_annotations_apply_through_enclosing_items() {
        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("p").unwrap();
        let shown = class(&mut cb, pkg, "Shown", ClassKind::Class, &[]);
        cb.patch(shown, &ItemPatch::new().add_annotation(Annotation::new("p.SystemApi")));
        let inside = method(&mut cb, shown, "m", "void");
        let other = class(&mut cb, pkg, "Other", ClassKind::Class, &[]);
        let outside = method(&mut cb, other, "m", "void");
        let forced = method(&mut cb, other, "forced", "void");
        cb.patch(forced, &ItemPatch::new().show_unconditionally(true));

        let config = FilterConfig {
            show_annotations: vec!["p.SystemApi".into()],
            ..FilterConfig::default()
        };
        let preds = SurfacePredicates::from_config(&config).unwrap();
        assert!(preds.emit.test(cb.view(inside)));
        assert!(!preds.emit.test(cb.view(outside)));
        assert!(preds.emit.test(cb.view(forced)));
        // Not shown, but still referenceable.
        assert!(preds.reference.test(cb.view(outside)));
    }

    #[test]
    fn hide_annotations_and_packages_restrict_both_predicates() {
        let mut cb = Codebase::new();
        let keep = cb.ensure_package("p").unwrap();
        let drop = cb.ensure_package("p.internal").unwrap();
        let c = class(&mut cb, keep, "C", ClassKind::Class, &[]);
        let hidden = method(&mut cb, c, "h", "void");
        cb.patch(hidden, &ItemPatch::new().add_annotation(Annotation::new("p.Hide")));
        let d = cb
            .add_class(drop, ItemCommon::public("D"), ClassData::new(ClassKind::Class, "p.internal.D"))
            .unwrap();

        let config = FilterConfig {
            hide_annotations: vec!["p.Hide".into()],
            packages: PackageFilter {
                include: vec![],
                exclude: vec!["p.internal".into()],
            },
            ..FilterConfig::default()
        };
        let preds = SurfacePredicates::from_config(&config).unwrap();
        assert!(preds.emit.test(cb.view(c)));
        assert!(!preds.emit.test(cb.view(hidden)));
        assert!(!preds.reference.test(cb.view(hidden)));
        assert!(!preds.reference.test(cb.view(d)));
    }

    #[test]
    fn emit_flag_restricts_to_current_layer() {
        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("p").unwrap();
        let c = class(&mut cb, pkg, "C", ClassKind::Class, &[]);
        cb.patch(c, &ItemPatch::new().emit(false));
        let preds = public().only_current();
        assert!(!preds.emit.test(cb.view(c)));
        assert!(public().emit.test(cb.view(c)));
    }

    // -----------------------------------------------------------------------
    // Override elision
    // -----------------------------------------------------------------------

    #[test]
    fn override_of_referenced_method_is_elided() {
        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("p").unwrap();
        let base = class(&mut cb, pkg, "Base", ClassKind::Class, &[]);
        method(&mut cb, base, "run", "void");
        let derived = class(&mut cb, pkg, "Derived", ClassKind::Class, &["Base"]);
        let over = method(&mut cb, derived, "run", "void");
        let other_ret = method(&mut cb, derived, "run2", "void");

        let preds = public();
        assert!(preds.elide.test(cb.view(over)));
        assert!(!preds.emit_filter().test(cb.view(over)));
        assert!(!preds.elide.test(cb.view(other_ret)));
    }

    #[test]
    fn override_differing_in_return_or_visibility_is_kept() {
        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("p").unwrap();
        let base = class(&mut cb, pkg, "Base", ClassKind::Class, &[]);
        method(&mut cb, base, "get", "java.lang.Object");
        let protected = method(&mut cb, base, "open", "void");
        cb.patch(protected, &ItemPatch::new().visibility(Visibility::Protected));
        let derived = class(&mut cb, pkg, "Derived", ClassKind::Class, &["Base"]);
        let covariant = method(&mut cb, derived, "get", "java.lang.String");
        let widened = method(&mut cb, derived, "open", "void");

        let preds = public();
        assert!(!preds.elide.test(cb.view(covariant)));
        assert!(!preds.elide.test(cb.view(widened)));
    }

    #[test]
    fn override_of_hidden_method_is_kept() {
        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("p").unwrap();
        let base = class(&mut cb, pkg, "Base", ClassKind::Class, &[]);
        cb.patch(base, &ItemPatch::new().hidden(true));
        method(&mut cb, base, "run", "void");
        let derived = class(&mut cb, pkg, "Derived", ClassKind::Class, &["Base"]);
        let over = method(&mut cb, derived, "run", "void");
        assert!(!public().elide.test(cb.view(over)));
    }

    #[test]
    fn interface_methods_are_searched_transitively() {
        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("p").unwrap();
        let root = class(&mut cb, pkg, "Root", ClassKind::Interface, &[]);
        method(&mut cb, root, "close", "void");
        class(&mut cb, pkg, "Mid", ClassKind::Interface, &["Root"]);
        let imp = class(&mut cb, pkg, "Impl", ClassKind::Class, &["Object", "Mid"]);
        let over = method(&mut cb, imp, "close", "void");
        assert!(public().elide.test(cb.view(over)));
    }

    #[test]
    fn cyclic_hierarchies_terminate() {
        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("p").unwrap();
        class(&mut cb, pkg, "A", ClassKind::Interface, &["B"]);
        let b = class(&mut cb, pkg, "B", ClassKind::Interface, &["A"]);
        let m = method(&mut cb, b, "m", "void");
        assert!(!public().elide.test(cb.view(m)));
    }

    #[test]
    fn required_overrides_are_kept() {
        let mut cb = Codebase::new();
        let pkg = cb.ensure_package("p").unwrap();
        let base = class(&mut cb, pkg, "Base", ClassKind::Class, &[]);
        method(&mut cb, base, "run", "void");
        let derived = class(&mut cb, pkg, "Derived", ClassKind::Class, &["Base"]);
        let over = method(&mut cb, derived, "run", "void");

        let config = FilterConfig {
            required_overrides: vec!["p.Derived#run(int)".into()],
            ..FilterConfig::default()
        };
        let preds = SurfacePredicates::from_config(&config).unwrap();
        assert!(!preds.elide.test(cb.view(over)));
        assert!(preds.emit_filter().test(cb.view(over)));
    }

    #[test]
    fn invalid_patterns_fail_construction() {
        let config = FilterConfig {
            show_annotations: vec!["!p.Foo".into()],
            ..FilterConfig::default()
        };
        assert!(SurfacePredicates::from_config(&config).is_err());
    }

    // -----------------------------------------------------------------------
    // Monotonicity: emit implies reference
    // -----------------------------------------------------------------------

    type Flags = (u8, bool, bool, bool, bool, bool);

    fn flagged(cb: &mut Codebase, id: ItemId, (vis, hidden, removed, shown, hide, forced): Flags) {
        let visibility = [
            Visibility::Private,
            Visibility::PackagePrivate,
            Visibility::Protected,
            Visibility::Public,
        ][vis as usize % 4];
        let mut patch = ItemPatch::new()
            .visibility(visibility)
            .hidden(hidden)
            .removed(removed)
            .show_unconditionally(forced);
        if shown {
            patch = patch.add_annotation(Annotation::new("p.Show"));
        }
        if hide {
            patch = patch.add_annotation(Annotation::new("p.Hide"));
        }
        cb.patch(id, &patch);
    }

    fn flags() -> impl Strategy<Value = Flags> {
        (0u8..4, any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>())
    }

    proptest! {
        #[test]
        fn emit_implies_reference(
            outer in flags(),
            nested in flags(),
            members in proptest::collection::vec(flags(), 0..8),
            surface in prop_oneof![Just(Surface::Public), Just(Surface::Removed), Just(Surface::All)],
            show in any::<bool>(),
            hide in any::<bool>(),
        ) {
            let mut cb = Codebase::new();
            let pkg = cb.ensure_package("p").unwrap();
            let c = class(&mut cb, pkg, "C", ClassKind::Class, &[]);
            flagged(&mut cb, c, outer);
            let n = cb
                .add_class(c, ItemCommon::public("N"), ClassData::new(ClassKind::Class, "p.C.N"))
                .unwrap();
            flagged(&mut cb, n, nested);
            for (i, f) in members.into_iter().enumerate() {
                let owner = if i % 2 == 0 { c } else { n };
                let m = method(&mut cb, owner, &format!("m{i}"), "void");
                flagged(&mut cb, m, f);
            }

            let config = FilterConfig {
                surface,
                show_annotations: if show { vec!["p.Show".into()] } else { vec![] },
                hide_annotations: if hide { vec!["p.Hide".into()] } else { vec![] },
                ..FilterConfig::default()
            };
            let preds = SurfacePredicates::from_config(&config).unwrap();
            let emit = preds.emit_filter();
            for view in cb.items() {
                if emit.test(view) || preds.emit.test(view) {
                    prop_assert!(preds.reference.test(view), "{:?}", view);
                }
            }
        }
    }
}
