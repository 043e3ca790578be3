use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use apisurf_diff::CompatibilityConfig;
use apisurf_filter::FilterConfig;
use apisurf_signature::{FormatSettings, WriterOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "apisurf.toml";

/// Everything a command can be configured with.
///
/// ```toml
/// [filter]
/// surface = "public"
/// hide_annotations = ["androidx.annotation.RestrictTo"]
///
/// [format]
/// version = "5.0"
///
/// [compat.severity]
/// added_throws = "error"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub filter: FilterConfig,
    pub writer: WriterOptions,
    pub format: FormatSettings,
    pub compat: CompatibilityConfig,
}

impl ToolConfig {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load `explicit`, or the default file when it exists, or defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apisurf_diff::{IssueKind, Severity};
    use apisurf_filter::Surface;
    use apisurf_signature::{FormatVersion, HeaderMode};

    #[test]
    fn empty_config_is_default() {
        assert_eq!(ToolConfig::from_toml("").unwrap(), ToolConfig::default());
    }

    #[test]
    fn sections_compose() {
        let config = ToolConfig::from_toml(
            r#"
            [filter]
            surface = "removed"
            show_annotations = ["android.annotation.SystemApi"]

            [writer]
            header = "if_non_empty"

            [format]
            version = "5.0"

            [format.properties]
            concise-default-values = "no"

            [compat.severity]
            removed_field = "warning"
            "#,
        )
        .unwrap();
        assert_eq!(config.filter.surface, Surface::Removed);
        assert_eq!(config.filter.show_annotations, vec!["android.annotation.SystemApi"]);
        assert_eq!(config.writer.header, HeaderMode::IfNonEmpty);
        assert!(config.writer.expand_constructor_overloads);
        assert_eq!(config.format.version, FormatVersion::V5);
        assert!(!config.format.resolve().unwrap().concise_default_values());
        assert_eq!(config.compat.severity_of(IssueKind::RemovedField), Severity::Warning);
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool.toml");
        fs::write(&path, "[format]\nversion = \"2.0\"\n").unwrap();
        let config = ToolConfig::load(Some(&path)).unwrap();
        assert_eq!(config.format.version, FormatVersion::V2);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ToolConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn unknown_severity_is_rejected() {
        assert!(ToolConfig::from_toml("[compat.severity]\nremoved_field = \"fatal\"\n").is_err());
    }
}
