//! Structural comparison of two codebases.
//!
//! Both trees are aligned level by level with a sorted merge-join: packages
//! and classes by qualified name, members by signature key within their
//! group. Keys use erased parameter types, so declarations that differ only
//! in nullness or annotations line up and are reported as a `compare` pair.
//! The comparator reports every item; filtering is up to the visitor.

use std::cmp::Ordering;

use apisurf_types::{Codebase, ItemView, MemberGroup};
use tracing::debug;

/// Receives the events of [`compare_codebases`].
///
/// Any error returned from a callback stops the walk and is handed back to
/// the caller unchanged.
pub trait ComparisonVisitor {
    type Error;

    /// An item present on both sides.
    fn compare(&mut self, old: ItemView<'_>, new: ItemView<'_>) -> Result<(), Self::Error>;

    /// An item only present in the new codebase.
    fn added(&mut self, new: ItemView<'_>) -> Result<(), Self::Error>;

    /// An item only present in the old codebase.
    fn removed(&mut self, old: ItemView<'_>) -> Result<(), Self::Error>;

    /// Also report the classes and members of added packages and classes.
    fn recurse_into_added(&self) -> bool {
        false
    }

    /// Also report the classes and members of removed packages and classes.
    fn recurse_into_removed(&self) -> bool {
        false
    }
}

/// Members are aligned group by group, in this order.
const MEMBER_GROUPS: [MemberGroup; 4] = [
    MemberGroup::Constructors,
    MemberGroup::Methods,
    MemberGroup::Fields,
    MemberGroup::Properties,
];

enum Aligned<'o, 'n> {
    Both(ItemView<'o>, ItemView<'n>),
    Removed(ItemView<'o>),
    Added(ItemView<'n>),
}

fn align<'o, 'n>(mut old: Vec<ItemView<'o>>, mut new: Vec<ItemView<'n>>) -> Vec<Aligned<'o, 'n>> {
    old.sort_by(|a, b| a.key().cmp_local(b.key()));
    new.sort_by(|a, b| a.key().cmp_local(b.key()));

    let mut out = Vec::with_capacity(old.len().max(new.len()));
    let (mut i, mut j) = (0, 0);
    while i < old.len() && j < new.len() {
        match old[i].key().cmp_local(new[j].key()) {
            Ordering::Less => {
                out.push(Aligned::Removed(old[i]));
                i += 1;
            }
            Ordering::Greater => {
                out.push(Aligned::Added(new[j]));
                j += 1;
            }
            Ordering::Equal => {
                out.push(Aligned::Both(old[i], new[j]));
                i += 1;
                j += 1;
            }
        }
    }
    out.extend(old[i..].iter().map(|&o| Aligned::Removed(o)));
    out.extend(new[j..].iter().map(|&n| Aligned::Added(n)));
    out
}

fn classes_of<'a>(codebase: &'a Codebase, package: ItemView<'a>) -> Vec<ItemView<'a>> {
    codebase
        .classes_in(package.id())
        .into_iter()
        .map(|id| codebase.view(id))
        .collect()
}

fn members_of(class: ItemView<'_>, group: MemberGroup) -> Vec<ItemView<'_>> {
    class
        .children()
        .filter(|c| c.tag().is_member() && c.tag().member_group() == group)
        .collect()
}

/// Align `old` with `new` and report every pair, addition and removal to
/// `visitor`.
///
/// Classes are compared flat per package, nested classes included, so a
/// nested class is matched by its qualified name wherever it sits.
pub fn compare_codebases<V>(old: &Codebase, new: &Codebase, visitor: &mut V) -> Result<(), V::Error>
where
    V: ComparisonVisitor + ?Sized,
{
    let mut walk = Walk {
        old,
        new,
        visitor,
        events: 0,
    };
    for pair in align(old.packages().collect(), new.packages().collect()) {
        match pair {
            Aligned::Both(o, n) => {
                walk.compare(o, n)?;
                walk.classes(o, n)?;
            }
            Aligned::Removed(o) => walk.removed_package(o)?,
            Aligned::Added(n) => walk.added_package(n)?,
        }
    }
    debug!(
        old = old.description(),
        new = new.description(),
        events = walk.events,
        "compared codebases"
    );
    Ok(())
}

struct Walk<'a, V: ?Sized> {
    old: &'a Codebase,
    new: &'a Codebase,
    visitor: &'a mut V,
    events: usize,
}

impl<V: ComparisonVisitor + ?Sized> Walk<'_, V> {
    fn compare(&mut self, old: ItemView<'_>, new: ItemView<'_>) -> Result<(), V::Error> {
        self.events += 1;
        self.visitor.compare(old, new)
    }

    fn added(&mut self, new: ItemView<'_>) -> Result<(), V::Error> {
        self.events += 1;
        self.visitor.added(new)
    }

    fn removed(&mut self, old: ItemView<'_>) -> Result<(), V::Error> {
        self.events += 1;
        self.visitor.removed(old)
    }

    fn classes(&mut self, old: ItemView<'_>, new: ItemView<'_>) -> Result<(), V::Error> {
        let pairs = align(classes_of(self.old, old), classes_of(self.new, new));
        for pair in pairs {
            match pair {
                Aligned::Both(o, n) => {
                    self.compare(o, n)?;
                    self.members(o, n)?;
                }
                Aligned::Removed(o) => self.removed_class(o)?,
                Aligned::Added(n) => self.added_class(n)?,
            }
        }
        Ok(())
    }

    fn members(&mut self, old: ItemView<'_>, new: ItemView<'_>) -> Result<(), V::Error> {
        for group in MEMBER_GROUPS {
            for pair in align(members_of(old, group), members_of(new, group)) {
                match pair {
                    Aligned::Both(o, n) => self.compare(o, n)?,
                    Aligned::Removed(o) => self.removed(o)?,
                    Aligned::Added(n) => self.added(n)?,
                }
            }
        }
        Ok(())
    }

    fn added_package(&mut self, package: ItemView<'_>) -> Result<(), V::Error> {
        self.added(package)?;
        if self.visitor.recurse_into_added() {
            for class in classes_of(self.new, package) {
                self.added_class(class)?;
            }
        }
        Ok(())
    }

    fn removed_package(&mut self, package: ItemView<'_>) -> Result<(), V::Error> {
        self.removed(package)?;
        if self.visitor.recurse_into_removed() {
            for class in classes_of(self.old, package) {
                self.removed_class(class)?;
            }
        }
        Ok(())
    }

    fn added_class(&mut self, class: ItemView<'_>) -> Result<(), V::Error> {
        self.added(class)?;
        if self.visitor.recurse_into_added() {
            for group in MEMBER_GROUPS {
                let mut members = members_of(class, group);
                members.sort_by(|a, b| a.key().cmp_local(b.key()));
                for member in members {
                    self.added(member)?;
                }
            }
        }
        Ok(())
    }

    fn removed_class(&mut self, class: ItemView<'_>) -> Result<(), V::Error> {
        self.removed(class)?;
        if self.visitor.recurse_into_removed() {
            for group in MEMBER_GROUPS {
                let mut members = members_of(class, group);
                members.sort_by(|a, b| a.key().cmp_local(b.key()));
                for member in members {
                    self.removed(member)?;
                }
            }
        }
        Ok(())
    }
}
