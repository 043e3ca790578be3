//! Filtered, ordered walk over a codebase.

use std::collections::HashMap;

use apisurf_types::{compare_siblings, Codebase, ItemId, ItemKindTag, ItemView, MethodOrder};
use tracing::debug;

use crate::predicate::{ItemPredicate, SurfacePredicates};

/// Callbacks invoked by [`ApiTraversal`]. Every hook defaults to doing
/// nothing.
#[allow(unused_variables)]
pub trait ApiVisitor {
    fn visit_package_start(&mut self, package: ItemView<'_>) {}
    fn visit_package_end(&mut self, package: ItemView<'_>) {}
    fn visit_class_start(&mut self, class: ItemView<'_>) {}
    fn visit_class_end(&mut self, class: ItemView<'_>) {}
    fn visit_constructor(&mut self, constructor: ItemView<'_>) {}
    fn visit_method(&mut self, method: ItemView<'_>) {}
    fn visit_field(&mut self, field: ItemView<'_>) {}
    fn visit_enum_constant(&mut self, constant: ItemView<'_>) {}
    fn visit_property(&mut self, property: ItemView<'_>) {}
}

/// Walks packages and classes in canonical order, visiting what the filter
/// accepts.
///
/// Classes are visited flat (nested classes after their outer class, all
/// sorted by qualified name). A class is visited when it passes the filter
/// or has a member that does. An outer class whose only selected content is
/// nested classes is visited as an empty shell only with
/// `include_empty_outer_classes`. Packages are opened on their first
/// visited class.
#[derive(Clone, Debug)]
pub struct ApiTraversal {
    filter: ItemPredicate,
    method_order: MethodOrder,
    include_empty_outer_classes: bool,
}

impl ApiTraversal {
    /// Walk with the emit filter of `predicates`.
    pub fn new(predicates: &SurfacePredicates) -> Self {
        Self {
            filter: predicates.emit_filter(),
            method_order: predicates.method_order,
            include_empty_outer_classes: predicates.include_empty_outer_classes,
        }
    }

    pub fn with_filter(filter: ItemPredicate, method_order: MethodOrder) -> Self {
        Self {
            filter,
            method_order,
            include_empty_outer_classes: false,
        }
    }

    #[must_use]
    pub fn include_empty_outer_classes(mut self, include: bool) -> Self {
        self.include_empty_outer_classes = include;
        self
    }

    pub fn walk<V: ApiVisitor + ?Sized>(&self, codebase: &Codebase, visitor: &mut V) {
        let order = self.method_order;
        let mut packages: Vec<ItemView<'_>> = codebase.packages().collect();
        packages.sort_by(|a, b| compare_siblings(a.item(), b.item(), order));

        let mut qualifies = HashMap::new();
        let mut visited_classes = 0usize;
        for package in packages {
            let mut classes: Vec<ItemView<'_>> = codebase
                .classes_in(package.id())
                .into_iter()
                .map(|id| codebase.view(id))
                .collect();
            classes.sort_by(|a, b| compare_siblings(a.item(), b.item(), order));

            let mut opened = false;
            for class in classes {
                let members = self.members(class);
                let visit = self.filter.test(class)
                    || !members.is_empty()
                    || (self.include_empty_outer_classes
                        && class
                            .nested_classes()
                            .any(|n| self.qualifies(n, &mut qualifies)));
                if !visit {
                    continue;
                }
                if !opened {
                    visitor.visit_package_start(package);
                    opened = true;
                }
                visited_classes += 1;
                visitor.visit_class_start(class);
                for member in members {
                    match member.tag() {
                        ItemKindTag::Constructor => visitor.visit_constructor(member),
                        ItemKindTag::Method => visitor.visit_method(member),
                        ItemKindTag::Field => visitor.visit_field(member),
                        ItemKindTag::EnumConstant => visitor.visit_enum_constant(member),
                        ItemKindTag::Property => visitor.visit_property(member),
                        ItemKindTag::Package | ItemKindTag::Class => {}
                    }
                }
                visitor.visit_class_end(class);
            }
            if opened {
                visitor.visit_package_end(package);
            }
        }
        debug!(classes = visited_classes, "traversal finished");
    }

    /// Selected members of `class`, in canonical order.
    pub fn members<'a>(&self, class: ItemView<'a>) -> Vec<ItemView<'a>> {
        let mut members: Vec<ItemView<'a>> = class
            .children()
            .filter(|c| c.tag().is_member() && self.filter.test(*c))
            .collect();
        members.sort_by(|a, b| compare_siblings(a.item(), b.item(), self.method_order));
        members
    }

    /// The class, one of its members, or a nested class passes the filter.
    fn qualifies(&self, class: ItemView<'_>, memo: &mut HashMap<ItemId, bool>) -> bool {
        if let Some(&known) = memo.get(&class.id()) {
            return known;
        }
        let result = self.filter.test(class)
            || class
                .children()
                .any(|c| c.tag().is_member() && self.filter.test(c))
            || class.nested_classes().any(|n| self.qualifies(n, memo));
        memo.insert(class.id(), result);
        result
    }
}
