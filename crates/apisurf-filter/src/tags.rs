use std::collections::HashSet;

use apisurf_types::{Codebase, ItemId};
use tracing::debug;

use crate::predicate::SurfacePredicates;

/// Emit and reference decisions for every item of one codebase.
///
/// Decisions are computed once and kept outside the tree, so the same
/// codebase can be tagged for several surfaces.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SurfaceTags {
    emitted: HashSet<ItemId>,
    referenced: HashSet<ItemId>,
}

impl SurfaceTags {
    pub fn compute(codebase: &Codebase, predicates: &SurfacePredicates) -> Self {
        let emit = predicates.emit_filter();
        let mut tags = Self::default();
        for view in codebase.items() {
            if emit.test(view) {
                tags.emitted.insert(view.id());
            }
            if predicates.reference.test(view) {
                tags.referenced.insert(view.id());
            }
        }
        debug!(
            items = codebase.len(),
            emitted = tags.emitted.len(),
            referenced = tags.referenced.len(),
            "computed surface tags"
        );
        tags
    }

    pub fn is_emitted(&self, id: ItemId) -> bool {
        self.emitted.contains(&id)
    }

    pub fn is_referenced(&self, id: ItemId) -> bool {
        self.referenced.contains(&id)
    }

    pub fn emitted_count(&self) -> usize {
        self.emitted.len()
    }

    pub fn referenced_count(&self) -> usize {
        self.referenced.len()
    }
}
