//! Compatibility checking between an old and a new API surface.
//!
//! [`CompatibilityChecker`] turns comparison events into [`Issue`]s. Each
//! [`IssueKind`] carries a default [`Severity`], which a
//! [`CompatibilityConfig`] may override.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;

use apisurf_filter::{FilterConfig, SurfacePredicates};
use apisurf_types::{
    CallableData, Codebase, ItemKind, ItemKindTag, ItemView, Modifier, Nullability, Visibility,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::collector::{Event, ItemRef, SideFilter};
use crate::comparator::{compare_codebases, ComparisonVisitor};
use crate::error::DiffResult;

/// How much an issue matters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Not reported.
    Hidden,
    Info,
    Warning,
    /// Fails the check.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hidden => "hidden",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// Kinds of incompatible change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    RemovedPackage,
    RemovedClass,
    RemovedMethod,
    RemovedField,
    ReducedVisibility,
    AddedFinal,
    AddedAbstract,
    ChangedStatic,
    ChangedType,
    ChangedReturnType,
    /// Nullness tightened: a return became nullable or a parameter non-null.
    InvalidNullConversion,
    /// An abstract method appeared in an existing class or interface.
    AddedAbstractMethod,
    AddedThrows,
}

impl IssueKind {
    pub const ALL: [IssueKind; 13] = [
        Self::RemovedPackage,
        Self::RemovedClass,
        Self::RemovedMethod,
        Self::RemovedField,
        Self::ReducedVisibility,
        Self::AddedFinal,
        Self::AddedAbstract,
        Self::ChangedStatic,
        Self::ChangedType,
        Self::ChangedReturnType,
        Self::InvalidNullConversion,
        Self::AddedAbstractMethod,
        Self::AddedThrows,
    ];

    pub fn default_severity(self) -> Severity {
        match self {
            Self::InvalidNullConversion | Self::AddedThrows => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::RemovedPackage => "removed_package",
            Self::RemovedClass => "removed_class",
            Self::RemovedMethod => "removed_method",
            Self::RemovedField => "removed_field",
            Self::ReducedVisibility => "reduced_visibility",
            Self::AddedFinal => "added_final",
            Self::AddedAbstract => "added_abstract",
            Self::ChangedStatic => "changed_static",
            Self::ChangedType => "changed_type",
            Self::ChangedReturnType => "changed_return_type",
            Self::InvalidNullConversion => "invalid_null_conversion",
            Self::AddedAbstractMethod => "added_abstract_method",
            Self::AddedThrows => "added_throws",
        }
    }

    fn for_removed(tag: ItemKindTag) -> Self {
        match tag {
            ItemKindTag::Package => Self::RemovedPackage,
            ItemKindTag::Class => Self::RemovedClass,
            ItemKindTag::Constructor | ItemKindTag::Method => Self::RemovedMethod,
            ItemKindTag::Field | ItemKindTag::EnumConstant | ItemKindTag::Property => {
                Self::RemovedField
            }
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Severity overrides per issue kind.
///
/// ```toml
/// [severity]
/// added_throws = "error"
/// removed_field = "hidden"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatibilityConfig {
    pub severity: BTreeMap<IssueKind, Severity>,
}

impl CompatibilityConfig {
    pub fn severity_of(&self, kind: IssueKind) -> Severity {
        self.severity
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_severity())
    }

    #[must_use]
    pub fn with_severity(mut self, kind: IssueKind, severity: Severity) -> Self {
        self.severity.insert(kind, severity);
        self
    }
}

/// One compatibility finding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub item: ItemRef,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.severity, self.message, self.kind)
    }
}

/// Checks that a new surface can replace an old one.
///
/// Items rejected by the side filter do not exist for the check, so an
/// item that leaves the surface is reported as removed.
#[derive(Clone, Debug, Default)]
pub struct CompatibilityChecker {
    config: CompatibilityConfig,
    filter: SideFilter,
    issues: Vec<Issue>,
}

impl CompatibilityChecker {
    pub fn new(config: CompatibilityConfig) -> Self {
        Self {
            config,
            filter: SideFilter::default(),
            issues: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: SideFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Restrict both sides to the surface `filter` emits.
    pub fn from_config(filter: &FilterConfig, config: CompatibilityConfig) -> DiffResult<Self> {
        let emit = SurfacePredicates::from_config(filter)?.emit;
        Ok(Self::new(config).with_filter(SideFilter::new(emit.clone(), emit)))
    }

    /// Run the check and return the issues found.
    pub fn check(mut self, old: &Codebase, new: &Codebase) -> Vec<Issue> {
        match compare_codebases(old, new, &mut self) {
            Ok(()) => {}
            Err(never) => match never {},
        }
        info!(
            issues = self.issues.len(),
            errors = self.error_count(),
            "compatibility check finished"
        );
        self.issues
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    fn report(&mut self, kind: IssueKind, item: ItemView<'_>, message: String) {
        let severity = self.config.severity_of(kind);
        if severity == Severity::Hidden {
            debug!(%kind, item = %item.key(), "issue hidden by configuration");
            return;
        }
        self.issues.push(Issue {
            kind,
            severity,
            item: ItemRef::of(item),
            message,
        });
    }

    fn on_removed(&mut self, old: ItemView<'_>) {
        let kind = IssueKind::for_removed(old.tag());
        self.report(kind, old, format!("removed {} {}", old.tag(), old.key()));
    }

    fn on_added(&mut self, new: ItemView<'_>) {
        if new.tag() != ItemKindTag::Method || !is_abstract_method(new) {
            return;
        }
        let Some(class) = new.containing_class() else {
            return;
        };
        self.report(
            IssueKind::AddedAbstractMethod,
            new,
            format!("added abstract method {} to existing {}", new.key(), class.qualified_name()),
        );
    }

    fn on_compare(&mut self, old: ItemView<'_>, new: ItemView<'_>) {
        let (oc, nc) = (old.common(), new.common());
        let what = format!("{} {}", new.tag(), new.key());

        if nc.visibility < oc.visibility {
            let shown = |v: Visibility| v.keyword().unwrap_or("package-private");
            self.report(
                IssueKind::ReducedVisibility,
                new,
                format!("{what} reduced visibility from {} to {}", shown(oc.visibility), shown(nc.visibility)),
            );
        }

        let added = |m: Modifier| !oc.modifiers.contains(m) && nc.modifiers.contains(m);
        if added(Modifier::Final) && !in_final_class(old) {
            self.report(IssueKind::AddedFinal, new, format!("{what} became final"));
        }
        if added(Modifier::Abstract) {
            self.report(IssueKind::AddedAbstract, new, format!("{what} became abstract"));
        }
        if oc.modifiers.is_static() != nc.modifiers.is_static() {
            let now = if nc.modifiers.is_static() { "static" } else { "non-static" };
            self.report(IssueKind::ChangedStatic, new, format!("{what} became {now}"));
        }

        match (old.kind(), new.kind()) {
            (ItemKind::Method(o), ItemKind::Method(n)) => {
                if let (Some(ot), Some(nt)) = (&o.return_type, &n.return_type) {
                    if ot.text() != nt.text() {
                        self.report(
                            IssueKind::ChangedReturnType,
                            new,
                            format!("{what} changed return type from {} to {}", ot.text(), nt.text()),
                        );
                    }
                    if tightened(ot.nullability(), nt.nullability(), Nullability::Nullable) {
                        self.report(
                            IssueKind::InvalidNullConversion,
                            new,
                            format!("{what} return type became nullable"),
                        );
                    }
                }
                self.check_callable(new, &what, o, n);
            }
            (ItemKind::Constructor(o), ItemKind::Constructor(n)) => self.check_callable(new, &what, o, n),
            (ItemKind::Field(o), ItemKind::Field(n))
            | (ItemKind::EnumConstant(o), ItemKind::EnumConstant(n)) => {
                if o.ty.text() != n.ty.text() {
                    self.report(
                        IssueKind::ChangedType,
                        new,
                        format!("{what} changed type from {} to {}", o.ty.text(), n.ty.text()),
                    );
                }
            }
            (ItemKind::Property(o), ItemKind::Property(n)) => {
                if o.ty.text() != n.ty.text() {
                    self.report(
                        IssueKind::ChangedType,
                        new,
                        format!("{what} changed type from {} to {}", o.ty.text(), n.ty.text()),
                    );
                }
            }
            _ => {}
        }
    }

    fn check_callable(
        &mut self,
        new: ItemView<'_>,
        what: &str,
        old: &CallableData,
        current: &CallableData,
    ) {
        for (index, (op, np)) in old.parameters.iter().zip(&current.parameters).enumerate() {
            if tightened(op.ty.nullability(), np.ty.nullability(), Nullability::NonNull) {
                self.report(
                    IssueKind::InvalidNullConversion,
                    new,
                    format!("{what} parameter {index} became non-null"),
                );
            }
        }
        for exception in &current.throws {
            if !old.throws.contains(exception) {
                self.report(
                    IssueKind::AddedThrows,
                    new,
                    format!("{what} added throws {exception}"),
                );
            }
        }
    }
}

/// A move between the two declared states, in the direction of `toward`.
/// Platform nullness is never tightened.
fn tightened(old: Nullability, new: Nullability, toward: Nullability) -> bool {
    let away = match toward {
        Nullability::Nullable => Nullability::NonNull,
        _ => Nullability::Nullable,
    };
    old == away && new == toward
}

fn in_final_class(item: ItemView<'_>) -> bool {
    item.tag().is_callable()
        && item
            .containing_class()
            .is_some_and(|class| class.common().modifiers.is_final())
}

/// Abstract, or an interface method without a body.
fn is_abstract_method(method: ItemView<'_>) -> bool {
    let modifiers = method.common().modifiers;
    if modifiers.is_abstract() {
        return true;
    }
    let in_interface = method
        .containing_class()
        .and_then(|class| class.as_class())
        .is_some_and(|class| class.kind.is_interface_like());
    in_interface && !modifiers.is_static() && !modifiers.contains(Modifier::Default)
}

impl ComparisonVisitor for CompatibilityChecker {
    type Error = Infallible;

    fn compare(&mut self, old: ItemView<'_>, new: ItemView<'_>) -> Result<(), Infallible> {
        match self.filter.compare(old, new) {
            Event::Compare(old, new) => self.on_compare(old, new),
            Event::Removed(old) => self.on_removed(old),
            Event::Added(new) => self.on_added(new),
            Event::Skip => {}
        }
        Ok(())
    }

    fn added(&mut self, new: ItemView<'_>) -> Result<(), Infallible> {
        if let Event::Added(new) = self.filter.added(new) {
            self.on_added(new);
        }
        Ok(())
    }

    fn removed(&mut self, old: ItemView<'_>) -> Result<(), Infallible> {
        if let Event::Removed(old) = self.filter.removed(old) {
            self.on_removed(old);
        }
        Ok(())
    }
}
