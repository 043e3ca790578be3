use apisurf_types::MethodOrder;
use serde::{Deserialize, Serialize};

/// Which slice of the API a filter selects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// Visible items that are neither hidden nor removed.
    #[default]
    Public,
    /// Visible items marked removed.
    Removed,
    /// Every visible item.
    All,
}

impl Surface {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Removed => "removed",
            Self::All => "all",
        }
    }
}

/// Package name prefixes to include or exclude.
///
/// A prefix matches the package itself and its sub-packages: `android`
/// matches `android.view` but not `androidx`. Excludes win over includes;
/// an empty include list includes everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl PackageFilter {
    pub fn matches(&self, package: &str) -> bool {
        let hit = |prefix: &String| {
            package == prefix
                || package
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        };
        if self.exclude.iter().any(hit) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(hit)
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// Configuration of one surface extraction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub surface: Surface,
    /// Annotation patterns selecting what is shown. Empty shows everything.
    pub show_annotations: Vec<String>,
    /// Annotation patterns whose items are hidden.
    pub hide_annotations: Vec<String>,
    pub packages: PackageFilter,
    /// Also show items not carrying a show annotation.
    pub show_unannotated: bool,
    /// Write outer classes that only exist to hold selected nested classes.
    pub include_empty_outer_classes: bool,
    pub method_order: MethodOrder,
    /// Methods (`owner#name(params)`) that must stay in the output even
    /// when they override an emitted method.
    pub required_overrides: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            surface: Surface::Public,
            show_annotations: Vec::new(),
            hide_annotations: Vec::new(),
            packages: PackageFilter::default(),
            show_unannotated: false,
            include_empty_outer_classes: false,
            method_order: MethodOrder::Signature,
            required_overrides: Vec::new(),
        }
    }
}

impl FilterConfig {
    /// Configuration for the given surface with everything else defaulted.
    pub fn for_surface(surface: Surface) -> Self {
        Self {
            surface,
            ..Default::default()
        }
    }
}
