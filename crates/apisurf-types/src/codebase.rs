//! The item arena.
//!
//! A [`Codebase`] owns every item of one API snapshot. Items reference each
//! other by [`ItemId`]; callers get borrowed [`ItemView`] handles to walk the
//! tree.

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

use tracing::debug;

use crate::annotation::Annotation;
use crate::error::{ModelError, ModelResult};
use crate::item::{
    ClassData, Item, ItemCommon, ItemId, ItemKind, ItemKindTag, MemberGroup, PackageData,
};
use crate::key::SignatureKey;
use crate::modifiers::{Modifier, Visibility};
use crate::order::{compare_siblings, MethodOrder};
use crate::overloads::constructor_overloads;

/// Name used for constructors in signature keys.
pub const CONSTRUCTOR_KEY_NAME: &str = "<init>";

/// Compute the key a member of `owner` gets on insertion.
pub fn member_key(owner: &str, name: &str, kind: &ItemKind) -> SignatureKey {
    match kind {
        ItemKind::Constructor(c) => {
            SignatureKey::member(owner, CONSTRUCTOR_KEY_NAME, Some(c.erased_parameters()))
        }
        ItemKind::Method(c) => SignatureKey::member(owner, name, Some(c.erased_parameters())),
        _ => SignatureKey::member(owner, name, None),
    }
}

/// One API snapshot.
#[derive(Clone, Debug, Default)]
pub struct Codebase {
    description: String,
    items: Vec<Item>,
    packages: Vec<ItemId>,
    package_index: HashMap<String, ItemId>,
    class_index: HashMap<String, ItemId>,
}

impl Codebase {
    pub fn new() -> Self {
        Self::default()
    }

    /// A codebase labelled for log and error messages.
    pub fn with_description(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Number of items of every kind.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id.index())
    }

    pub fn view(&self, id: ItemId) -> ItemView<'_> {
        ItemView { codebase: self, id }
    }

    /// Top-level packages in their current order.
    pub fn package_ids(&self) -> &[ItemId] {
        &self.packages
    }

    pub fn packages(&self) -> impl Iterator<Item = ItemView<'_>> + '_ {
        self.packages.iter().map(move |&id| self.view(id))
    }

    /// Every item, in insertion order.
    pub fn items(&self) -> impl Iterator<Item = ItemView<'_>> + '_ {
        self.items.iter().map(move |item| self.view(item.id))
    }

    pub fn find_package(&self, qualified_name: &str) -> Option<ItemId> {
        self.package_index.get(qualified_name).copied()
    }

    pub fn find_class(&self, qualified_name: &str) -> Option<ItemId> {
        self.class_index.get(qualified_name).copied()
    }

    /// Every class of `package` including nested ones, outer before inner.
    pub fn classes_in(&self, package: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut stack: Vec<ItemId> = self[package]
            .children
            .iter()
            .rev()
            .copied()
            .filter(|&c| self[c].tag() == ItemKindTag::Class)
            .collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(
                self[id]
                    .children
                    .iter()
                    .rev()
                    .copied()
                    .filter(|&c| self[c].tag() == ItemKindTag::Class),
            );
        }
        out
    }

    /// Direct children of `parent` with the given kind.
    pub fn members(&self, parent: ItemId, tag: ItemKindTag) -> Vec<ItemId> {
        self[parent]
            .children
            .iter()
            .copied()
            .filter(|&c| self[c].tag() == tag)
            .collect()
    }

    /// A child of `parent` in the same member group with the same local key.
    pub fn find_member(&self, parent: ItemId, group: MemberGroup, key: &SignatureKey) -> Option<ItemId> {
        self[parent].children.iter().copied().find(|&c| {
            let child = &self[c];
            child.tag().member_group() == group && child.key.same_local(key)
        })
    }

    /// The id the next pushed item will receive.
    fn next_id(&self) -> ModelResult<ItemId> {
        u32::try_from(self.items.len())
            .map(ItemId)
            .map_err(|_| ModelError::CapacityExceeded(self.items.len()))
    }

    fn push(&mut self, parent: Option<ItemId>, key: SignatureKey, common: ItemCommon, kind: ItemKind) -> ModelResult<ItemId> {
        let id = self.next_id()?;
        self.items.push(Item {
            id,
            parent,
            children: Vec::new(),
            key,
            common,
            kind,
        });
        if let Some(parent) = parent {
            self.items[parent.index()].children.push(id);
        }
        Ok(id)
    }

    /// Add a top-level package. `common.name` is the qualified name.
    pub fn add_package(&mut self, common: ItemCommon) -> ModelResult<ItemId> {
        let name = common.name.clone();
        if self.package_index.contains_key(&name) {
            return Err(ModelError::DuplicateItem {
                kind: "package",
                key: name,
            });
        }
        let key = SignatureKey::named(&name);
        let kind = ItemKind::Package(PackageData {
            qualified_name: name.clone(),
        });
        let id = self.push(None, key, common, kind)?;
        self.packages.push(id);
        self.package_index.insert(name, id);
        Ok(id)
    }

    /// The package named `qualified_name`, created public when missing.
    pub fn ensure_package(&mut self, qualified_name: &str) -> ModelResult<ItemId> {
        match self.find_package(qualified_name) {
            Some(id) => Ok(id),
            None => self.add_package(ItemCommon::public(qualified_name)),
        }
    }

    /// Add a class to a package or, as a nested class, to another class.
    pub fn add_class(&mut self, parent: ItemId, common: ItemCommon, data: ClassData) -> ModelResult<ItemId> {
        let parent_tag = self[parent].tag();
        if !matches!(parent_tag, ItemKindTag::Package | ItemKindTag::Class) {
            return Err(ModelError::InvalidParent {
                parent: self.view(parent).describe(),
                child: ItemKindTag::Class.label(),
            });
        }
        if self.class_index.contains_key(&data.qualified_name) {
            return Err(ModelError::DuplicateItem {
                kind: "class",
                key: data.qualified_name,
            });
        }
        let qualified_name = data.qualified_name.clone();
        let key = SignatureKey::named(&qualified_name);
        let id = self.push(Some(parent), key, common, ItemKind::Class(data))?;
        self.class_index.insert(qualified_name, id);
        Ok(id)
    }

    /// Add a constructor, method, field, enum constant, or property.
    pub fn add_member(&mut self, class: ItemId, common: ItemCommon, kind: ItemKind) -> ModelResult<ItemId> {
        let tag = kind.tag();
        if !tag.is_member() {
            return Err(ModelError::KindMismatch {
                expected: "member",
                actual: tag.label(),
            });
        }
        let owner = match &self[class].kind {
            ItemKind::Class(data) => data.qualified_name.clone(),
            _ => {
                return Err(ModelError::InvalidParent {
                    parent: self.view(class).describe(),
                    child: tag.label(),
                })
            }
        };
        let key = member_key(&owner, &common.name, &kind);
        if self.find_member(class, tag.member_group(), &key).is_some() {
            return Err(ModelError::DuplicateItem {
                kind: tag.label(),
                key: key.to_string(),
            });
        }
        self.push(Some(class), key, common, kind)
    }

    /// Apply `patch` to the item. The new shared fields replace the old ones
    /// in a single assignment.
    pub fn patch(&mut self, id: ItemId, patch: &ItemPatch) {
        let next = patch.apply(&self.items[id.index()].common);
        self.items[id.index()].common = next;
    }

    /// Replace an item's definition, keeping its place and children.
    ///
    /// The replacement must have the same kind and signature key.
    pub fn replace(&mut self, id: ItemId, common: ItemCommon, kind: ItemKind) -> ModelResult<()> {
        let existing = &self[id];
        if existing.tag() != kind.tag() {
            return Err(ModelError::KindMismatch {
                expected: existing.tag().label(),
                actual: kind.tag().label(),
            });
        }
        let key = match (&kind, existing.parent) {
            (ItemKind::Package(p), _) => SignatureKey::named(&p.qualified_name),
            (ItemKind::Class(c), _) => SignatureKey::named(&c.qualified_name),
            (_, Some(parent)) => {
                let owner = self.view(parent).qualified_name();
                member_key(&owner, &common.name, &kind)
            }
            (_, None) => existing.key.clone(),
        };
        if key != existing.key {
            return Err(ModelError::KeyMismatch {
                existing: existing.key.to_string(),
                replacement: key.to_string(),
            });
        }
        let item = &mut self.items[id.index()];
        item.common = common;
        item.kind = kind;
        Ok(())
    }

    /// Put packages and every sibling list into canonical order.
    pub fn sort_canonical(&mut self, order: MethodOrder) {
        let items = &self.items;
        self.packages
            .sort_by(|a, b| compare_siblings(&items[a.index()], &items[b.index()], order));
        for idx in 0..self.items.len() {
            let mut children = std::mem::take(&mut self.items[idx].children);
            children.sort_by(|a, b| {
                compare_siblings(&self.items[a.index()], &self.items[b.index()], order)
            });
            self.items[idx].children = children;
        }
    }

    /// Add the constructor overloads implied by defaulted parameters that
    /// are not declared yet. Returns how many were added.
    pub fn expand_constructor_overloads(&mut self) -> usize {
        let classes: Vec<ItemId> = self
            .items
            .iter()
            .filter(|i| i.tag() == ItemKindTag::Class)
            .map(|i| i.id)
            .collect();

        let mut added = 0;
        for class in classes {
            let declared: Vec<(ItemCommon, ItemKind)> = self
                .members(class, ItemKindTag::Constructor)
                .into_iter()
                .map(|c| (self[c].common.clone(), self[c].kind.clone()))
                .collect();
            for (common, kind) in declared {
                let ItemKind::Constructor(data) = kind else {
                    continue;
                };
                for overload in constructor_overloads(&data) {
                    if self
                        .add_member(class, common.clone(), ItemKind::Constructor(overload))
                        .is_ok()
                    {
                        added += 1;
                    }
                }
            }
        }
        debug!(added, "expanded constructor overloads");
        added
    }

    fn subtree_eq(&self, id: ItemId, other: &Codebase, other_id: ItemId) -> bool {
        let (a, b) = (&self[id], &other[other_id]);
        a.common == b.common
            && a.kind == b.kind
            && a.children.len() == b.children.len()
            && a
                .children
                .iter()
                .zip(&b.children)
                .all(|(&x, &y)| self.subtree_eq(x, other, y))
    }
}

impl Index<ItemId> for Codebase {
    type Output = Item;

    fn index(&self, id: ItemId) -> &Item {
        &self.items[id.index()]
    }
}

/// Structural equality: same packages, items, and sibling order. Arena ids
/// and the description are ignored.
impl PartialEq for Codebase {
    fn eq(&self, other: &Self) -> bool {
        self.packages.len() == other.packages.len()
            && self
                .packages
                .iter()
                .zip(&other.packages)
                .all(|(&a, &b)| self.subtree_eq(a, other, b))
    }
}

/// Edits to an item's shared fields, applied together by [`Codebase::patch`].
#[derive(Clone, Debug, Default)]
pub struct ItemPatch {
    visibility: Option<Visibility>,
    add_modifiers: Vec<Modifier>,
    remove_modifiers: Vec<Modifier>,
    add_annotations: Vec<Annotation>,
    remove_annotations: Vec<String>,
    hidden: Option<bool>,
    removed: Option<bool>,
    emit: Option<bool>,
    show_unconditionally: Option<bool>,
}

impl ItemPatch {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    #[must_use]
    pub fn add_modifier(mut self, modifier: Modifier) -> Self {
        self.add_modifiers.push(modifier);
        self
    }

    #[must_use]
    pub fn remove_modifier(mut self, modifier: Modifier) -> Self {
        self.remove_modifiers.push(modifier);
        self
    }

    /// Add an annotation, replacing any with the same qualified name.
    #[must_use]
    pub fn add_annotation(mut self, annotation: Annotation) -> Self {
        self.add_annotations.push(annotation);
        self
    }

    #[must_use]
    pub fn remove_annotation(mut self, qualified_name: impl Into<String>) -> Self {
        self.remove_annotations.push(qualified_name.into());
        self
    }

    #[must_use]
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    #[must_use]
    pub fn removed(mut self, removed: bool) -> Self {
        self.removed = Some(removed);
        self
    }

    #[must_use]
    pub fn emit(mut self, emit: bool) -> Self {
        self.emit = Some(emit);
        self
    }

    #[must_use]
    pub fn show_unconditionally(mut self, show: bool) -> Self {
        self.show_unconditionally = Some(show);
        self
    }

    /// The shared fields `common` would have after this patch.
    pub fn apply(&self, common: &ItemCommon) -> ItemCommon {
        let mut next = common.clone();
        if let Some(v) = self.visibility {
            next.visibility = v;
        }
        next.modifiers = self
            .remove_modifiers
            .iter()
            .fold(next.modifiers, |m, r| m.without(*r));
        next.modifiers = self
            .add_modifiers
            .iter()
            .fold(next.modifiers, |m, a| m.with(*a));
        next.annotations.retain(|a| {
            !self.remove_annotations.contains(&a.qualified_name)
                && !self
                    .add_annotations
                    .iter()
                    .any(|n| n.qualified_name == a.qualified_name)
        });
        next.annotations.extend(self.add_annotations.iter().cloned());
        if let Some(h) = self.hidden {
            next.hidden = h;
        }
        if let Some(r) = self.removed {
            next.removed = r;
        }
        if let Some(e) = self.emit {
            next.emit = e;
        }
        if let Some(s) = self.show_unconditionally {
            next.show_unconditionally = s;
        }
        next
    }
}

/// A borrowed handle on one item of a codebase.
#[derive(Clone, Copy)]
pub struct ItemView<'a> {
    codebase: &'a Codebase,
    id: ItemId,
}

impl<'a> ItemView<'a> {
    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn codebase(&self) -> &'a Codebase {
        self.codebase
    }

    pub fn item(&self) -> &'a Item {
        &self.codebase[self.id]
    }

    pub fn common(&self) -> &'a ItemCommon {
        &self.item().common
    }

    pub fn kind(&self) -> &'a ItemKind {
        &self.item().kind
    }

    pub fn tag(&self) -> ItemKindTag {
        self.item().tag()
    }

    pub fn key(&self) -> &'a SignatureKey {
        &self.item().key
    }

    pub fn name(&self) -> &'a str {
        &self.item().common.name
    }

    pub fn parent(&self) -> Option<ItemView<'a>> {
        self.item().parent.map(|p| self.codebase.view(p))
    }

    pub fn children(&self) -> impl Iterator<Item = ItemView<'a>> + 'a {
        let codebase = self.codebase;
        self.item().children.iter().map(move |&id| codebase.view(id))
    }

    /// Enclosing items, innermost first.
    pub fn ancestors(&self) -> impl Iterator<Item = ItemView<'a>> + 'a {
        std::iter::successors(self.parent(), |v| v.parent())
    }

    /// The nearest enclosing class.
    pub fn containing_class(&self) -> Option<ItemView<'a>> {
        self.ancestors().find(|a| a.tag() == ItemKindTag::Class)
    }

    pub fn containing_package(&self) -> Option<ItemView<'a>> {
        if self.tag() == ItemKindTag::Package {
            return Some(*self);
        }
        self.ancestors().find(|a| a.tag() == ItemKindTag::Package)
    }

    pub fn qualified_name(&self) -> String {
        match self.kind() {
            ItemKind::Package(p) => p.qualified_name.clone(),
            ItemKind::Class(c) => c.qualified_name.clone(),
            _ => match self.parent() {
                Some(parent) => format!("{}.{}", parent.qualified_name(), self.name()),
                None => self.name().to_string(),
            },
        }
    }

    pub fn as_class(&self) -> Option<&'a ClassData> {
        self.kind().as_class()
    }

    /// Direct children of the given kind.
    pub fn members(&self, tag: ItemKindTag) -> impl Iterator<Item = ItemView<'a>> + 'a {
        self.children().filter(move |c| c.tag() == tag)
    }

    pub fn constructors(&self) -> impl Iterator<Item = ItemView<'a>> + 'a {
        self.members(ItemKindTag::Constructor)
    }

    pub fn methods(&self) -> impl Iterator<Item = ItemView<'a>> + 'a {
        self.members(ItemKindTag::Method)
    }

    /// Fields and enum constants.
    pub fn fields(&self) -> impl Iterator<Item = ItemView<'a>> + 'a {
        self.children()
            .filter(|c| c.tag().member_group() == MemberGroup::Fields)
    }

    pub fn properties(&self) -> impl Iterator<Item = ItemView<'a>> + 'a {
        self.members(ItemKindTag::Property)
    }

    pub fn nested_classes(&self) -> impl Iterator<Item = ItemView<'a>> + 'a {
        self.members(ItemKindTag::Class)
    }

    /// The superclass, when it is defined in this codebase.
    pub fn super_class(&self) -> Option<ItemView<'a>> {
        let ty = self.as_class()?.super_class.as_ref()?;
        self.codebase
            .find_class(&ty.erased())
            .map(|id| self.codebase.view(id))
    }

    /// Implemented (or extended) interfaces defined in this codebase.
    pub fn interfaces(&self) -> Vec<ItemView<'a>> {
        let Some(data) = self.as_class() else {
            return Vec::new();
        };
        data.interfaces
            .iter()
            .filter_map(|ty| self.codebase.find_class(&ty.erased()))
            .map(|id| self.codebase.view(id))
            .collect()
    }

    /// Kind label and key, e.g. `method pkg.Foo#bar(int)`.
    pub fn describe(&self) -> String {
        format!("{} {}", self.tag().label(), self.key())
    }
}

impl fmt::Debug for ItemView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl PartialEq for ItemView<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.codebase, other.codebase) && self.id == other.id
    }
}
