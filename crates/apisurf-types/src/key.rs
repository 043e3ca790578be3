use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Identity of an item across snapshots.
///
/// Built once when the item enters a codebase: the owner's qualified name,
/// the item name and, for callables, the erased parameter types. Nullness
/// and annotations never take part, so two declarations differing only in
/// those still align.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SignatureKey {
    owner: Option<Arc<str>>,
    name: Arc<str>,
    params: Option<Arc<[Arc<str>]>>,
}

impl SignatureKey {
    /// Key for a package or a class (by qualified name).
    pub fn named(qualified_name: &str) -> Self {
        Self {
            owner: None,
            name: Arc::from(qualified_name),
            params: None,
        }
    }

    /// Key for a member of `owner`. `params` is `Some` for callables.
    pub fn member(owner: &str, name: &str, params: Option<Vec<String>>) -> Self {
        Self {
            owner: Some(Arc::from(owner)),
            name: Arc::from(name),
            params: params.map(|ps| ps.into_iter().map(Arc::from).collect()),
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Erased parameter types, for callables.
    pub fn params(&self) -> Option<&[Arc<str>]> {
        self.params.as_deref()
    }

    /// Compare ignoring the owner: name first, then parameter lists.
    ///
    /// This is the order siblings are aligned in.
    pub fn cmp_local(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.params.cmp(&other.params))
    }

    /// Returns `true` when both keys have the same name and parameters.
    pub fn same_local(&self, other: &Self) -> bool {
        self.cmp_local(other) == Ordering::Equal
    }
}

impl PartialOrd for SignatureKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SignatureKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_local(other)
            .then_with(|| self.owner.cmp(&other.owner))
    }
}

impl fmt::Display for SignatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(owner) = &self.owner {
            write!(f, "{owner}#")?;
        }
        f.write_str(&self.name)?;
        if let Some(params) = &self.params {
            let joined: Vec<&str> = params.iter().map(|p| &**p).collect();
            write!(f, "({})", joined.join(","))?;
        }
        Ok(())
    }
}
