use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use apisurf_diff::{
    compare_codebases, diff_signature_text, ApiChange, ChangeCollector, CompatibilityChecker, Issue,
    Severity, SideFilter,
};
use apisurf_filter::{FilterConfig, SurfacePredicates, SurfaceTags};
use apisurf_signature::{
    FileFormat, FormatSettings, FormatVersion, SignatureInput, SignatureParser, SignatureWriter,
};
use apisurf_types::Codebase;
use colored::Colorize;
use tracing::info;

use crate::cli::*;
use crate::config::ToolConfig;

pub fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = ToolConfig::load(cli.config.as_deref())?;
    let format = cli.format;
    let output = match cli.command {
        Command::Convert(args) => cmd_convert(&args, &config, format)?,
        Command::Diff(args) => cmd_diff(&args, &config, format)?,
        Command::CheckCompat(args) => {
            let (report, failed) = cmd_check_compat(&args, &config, format)?;
            print!("{report}");
            return Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS });
        }
        Command::Merge(args) => cmd_merge(&args, &config, format)?,
        Command::Formats => cmd_formats(format)?,
    };
    print!("{output}");
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parse `base` files as wider layers, then `current` files.
///
/// Headerless files are read as format 1.0.
fn load_layers(base: &[PathBuf], current: &[PathBuf]) -> anyhow::Result<Codebase> {
    let mut inputs = Vec::with_capacity(base.len() + current.len());
    for (paths, is_current) in [(base, false), (current, true)] {
        for path in paths {
            let input = SignatureInput::from_path(path, is_current)
                .with_context(|| format!("failed to read {}", path.display()))?;
            inputs.push(input);
        }
    }
    let codebase = SignatureParser::with_fallback(FileFormat::V1)
        .parse_layers(&inputs)
        .context("failed to parse signature files")?;
    Ok(codebase)
}

fn output_format(settings: &FormatSettings, requested: Option<&str>) -> anyhow::Result<FileFormat> {
    let mut settings = settings.clone();
    if let Some(version) = requested {
        settings.version = version
            .parse::<FormatVersion>()
            .with_context(|| format!("unknown signature format {version}"))?;
    }
    Ok(settings.resolve()?)
}

fn filter_config(config: &ToolConfig, surface: Option<SurfaceArg>) -> FilterConfig {
    let mut filter = config.filter.clone();
    if let Some(surface) = surface {
        filter.surface = surface.into();
    }
    filter
}

fn write_output(path: &Path, text: &str) -> anyhow::Result<()> {
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

fn written_summary(path: &Path, text: &str, tags: &SurfaceTags, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "output": path.display().to_string(),
                "lines": text.lines().count(),
                "emitted": tags.emitted_count(),
                "referenced": tags.referenced_count(),
            });
            format!("{}\n", serde_json::to_string_pretty(&summary)?)
        }
        OutputFormat::Text => format!(
            "{} Wrote {} ({} lines, {} items emitted)\n",
            "✓".green().bold(),
            path.display().to_string().bold(),
            text.lines().count(),
            tags.emitted_count()
        ),
    })
}

/// Render `codebase` and tag it with the same predicates.
fn write_surface(
    codebase: &Codebase,
    file_format: FileFormat,
    config: &ToolConfig,
    predicates: &SurfacePredicates,
) -> (String, SurfaceTags) {
    let text = SignatureWriter::new(file_format, config.writer.clone()).write(codebase, predicates);
    let tags = SurfaceTags::compute(codebase, predicates);
    (text, tags)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_convert(args: &ConvertArgs, config: &ToolConfig, format: OutputFormat) -> anyhow::Result<String> {
    let codebase = load_layers(&args.base, &args.files)?;
    let file_format = output_format(&config.format, args.signature_format.as_deref())?;
    let mut predicates = SurfacePredicates::from_config(&filter_config(config, args.surface))?;
    if !args.base.is_empty() {
        predicates = predicates.only_current();
    }
    let (text, tags) = write_surface(&codebase, file_format, config, &predicates);
    info!(
        format = %file_format,
        bytes = text.len(),
        emitted = tags.emitted_count(),
        referenced = tags.referenced_count(),
        "converted signature files"
    );

    match &args.output {
        Some(path) => {
            write_output(path, &text)?;
            written_summary(path, &text, &tags, format)
        }
        None => Ok(text),
    }
}

fn cmd_merge(args: &MergeArgs, config: &ToolConfig, format: OutputFormat) -> anyhow::Result<String> {
    let codebase = load_layers(&args.base, std::slice::from_ref(&args.current))?;
    let file_format = match args.signature_format.as_deref() {
        Some(version) => output_format(&config.format, Some(version))?,
        None => {
            let text = fs::read_to_string(&args.current)
                .with_context(|| format!("failed to read {}", args.current.display()))?;
            SignatureParser::with_fallback(FileFormat::V1)
                .read_format(&args.current.display().to_string(), &text)?
        }
    };
    let predicates = SurfacePredicates::from_config(&config.filter)?;
    let (text, tags) = write_surface(&codebase, file_format, config, &predicates);
    write_output(&args.output, &text)?;
    written_summary(&args.output, &text, &tags, format)
}

fn cmd_diff(args: &DiffArgs, config: &ToolConfig, format: OutputFormat) -> anyhow::Result<String> {
    let old = load_layers(&args.old_base, std::slice::from_ref(&args.old))?;
    let new = load_layers(&args.new_base, std::slice::from_ref(&args.new))?;
    let predicates = SurfacePredicates::from_config(&filter_config(config, args.surface))?;

    if args.text {
        let writer = SignatureWriter::new(config.format.resolve()?, config.writer.clone());
        let diff = diff_signature_text(&writer.write(&old, &predicates), &writer.write(&new, &predicates));
        return Ok(match format {
            OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(&diff)?),
            OutputFormat::Text => {
                let unified = diff.to_unified(
                    &args.old.display().to_string(),
                    &args.new.display().to_string(),
                );
                let mut out = String::new();
                for line in unified.lines() {
                    let colored = if line.starts_with("@@") {
                        line.cyan().to_string()
                    } else if line.starts_with("---") || line.starts_with("+++") {
                        line.bold().to_string()
                    } else if line.starts_with('+') {
                        line.green().to_string()
                    } else if line.starts_with('-') {
                        line.red().to_string()
                    } else {
                        line.to_string()
                    };
                    out.push_str(&colored);
                    out.push('\n');
                }
                if diff.is_empty() {
                    out.push_str("No changes.\n");
                }
                out
            }
        });
    }

    let emit = predicates.emit;
    let mut collector = ChangeCollector::new()
        .with_filter(SideFilter::new(emit.clone(), emit))
        .recursive(args.recursive);
    match compare_codebases(&old, &new, &mut collector) {
        Ok(()) => {}
        Err(never) => match never {},
    }
    let diff = collector.into_diff();

    Ok(match format {
        OutputFormat::Json => format!("{}\n", diff.to_json()?),
        OutputFormat::Text => {
            if diff.is_empty() {
                return Ok("No changes.\n".to_string());
            }
            let mut out = String::new();
            for change in &diff.changes {
                let line = match change {
                    ApiChange::Added { item } => format!("{} {item}", "+".green().bold()),
                    ApiChange::Removed { item } => format!("{} {item}", "-".red().bold()),
                    ApiChange::Changed { item, differences } => {
                        let mut block = format!("{} {item}", "~".yellow().bold());
                        for difference in differences {
                            block.push_str(&format!("\n    {difference}"));
                        }
                        block
                    }
                };
                out.push_str(&line);
                out.push('\n');
            }
            out.push_str(&format!(
                "{} added, {} removed, {} changed\n",
                diff.added().count(),
                diff.removed().count(),
                diff.changed().count()
            ));
            out
        }
    })
}

/// Returns the report and whether an error-severity issue was found.
fn cmd_check_compat(
    args: &CheckCompatArgs,
    config: &ToolConfig,
    format: OutputFormat,
) -> anyhow::Result<(String, bool)> {
    let old = load_layers(&args.old_base, std::slice::from_ref(&args.old))?;
    let new = load_layers(&args.new_base, std::slice::from_ref(&args.new))?;
    let checker = CompatibilityChecker::from_config(&filter_config(config, args.surface), config.compat.clone())?;
    let issues = checker.check(&old, &new);
    let failed = issues.iter().any(|i| i.severity == Severity::Error);

    let report = match format {
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(&issues)?),
        OutputFormat::Text => render_issues(&issues),
    };
    Ok((report, failed))
}

fn render_issues(issues: &[Issue]) -> String {
    if issues.is_empty() {
        return format!("{} No compatibility issues.\n", "✓".green().bold());
    }
    let mut out = String::new();
    for issue in issues {
        let severity = match issue.severity {
            Severity::Error => issue.severity.to_string().red().bold(),
            Severity::Warning => issue.severity.to_string().yellow().bold(),
            _ => issue.severity.to_string().normal(),
        };
        out.push_str(&format!("{severity}: {} [{}]\n", issue.message, issue.kind.to_string().dimmed()));
    }
    let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
    out.push_str(&format!("{} issues, {} errors\n", issues.len(), errors));
    out
}

fn cmd_formats(format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => {
            let formats: serde_json::Map<String, serde_json::Value> = FormatVersion::ALL
                .iter()
                .map(|version| {
                    let properties: serde_json::Map<String, serde_json::Value> = FileFormat::defaults(*version)
                        .properties()
                        .into_iter()
                        .map(|(key, value)| (key.to_string(), serde_json::Value::String(value)))
                        .collect();
                    (version.to_string(), serde_json::Value::Object(properties))
                })
                .collect();
            format!("{}\n", serde_json::to_string_pretty(&formats)?)
        }
        OutputFormat::Text => {
            let mut out = String::new();
            for version in FormatVersion::ALL {
                let marker = if version == FormatVersion::default() { " (default)" } else { "" };
                out.push_str(&format!("{}{}\n", version.to_string().bold(), marker));
                for (key, value) in FileFormat::defaults(version).properties() {
                    out.push_str(&format!("  {key}={value}\n"));
                }
            }
            out
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "// Signature format: 4.0\n\
                        package p {\n\
                        \x20 public class C {\n\
                        \x20   method public void a();\n\
                        \x20   method public int b();\n\
                        \x20 }\n\
                        }\n";

    const DELTA: &str = "// Signature format: 4.0\n\
                         package p {\n\
                         \x20 public class C {\n\
                         \x20   method public void c();\n\
                         \x20 }\n\
                         }\n";

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn convert_writes_only_the_delta_over_a_base() {
        plain();
        let dir = tempfile::tempdir().unwrap();
        let base = write(dir.path(), "base.txt", BASE);
        let delta = write(dir.path(), "delta.txt", DELTA);
        let args = ConvertArgs {
            files: vec![delta],
            base: vec![base],
            signature_format: Some("v4".into()),
            surface: None,
            output: None,
        };
        let text = cmd_convert(&args, &ToolConfig::default(), OutputFormat::Text).unwrap();
        assert!(text.starts_with("// Signature format: 4.0\n"));
        assert!(text.contains("method public void c();"));
        assert!(!text.contains("a();"));
    }

    #[test]
    fn convert_to_a_file_in_another_format() {
        plain();
        let dir = tempfile::tempdir().unwrap();
        let input = write(dir.path(), "api.txt", BASE);
        let out = dir.path().join("out.txt");
        let args = ConvertArgs {
            files: vec![input],
            base: vec![],
            signature_format: Some("5.0".into()),
            surface: None,
            output: Some(out.clone()),
        };
        let summary = cmd_convert(&args, &ToolConfig::default(), OutputFormat::Json).unwrap();
        let summary: serde_json::Value = serde_json::from_str(&summary).unwrap();
        assert_eq!(summary["output"], out.display().to_string());
        // package, class and two methods
        assert_eq!(summary["emitted"], 4);
        assert_eq!(summary["referenced"], 4);
        let written = fs::read_to_string(&out).unwrap();
        assert!(written.starts_with("// Signature format: 5.0\n"));
        assert!(written.contains("method public int b();"));
    }

    #[test]
    fn merge_rewrites_the_union() {
        plain();
        let dir = tempfile::tempdir().unwrap();
        let base = write(dir.path(), "base.txt", BASE);
        let delta = write(dir.path(), "delta.txt", DELTA);
        let out = dir.path().join("merged.txt");
        let args = MergeArgs {
            base: vec![base],
            current: delta,
            output: out.clone(),
            signature_format: None,
        };
        let summary = cmd_merge(&args, &ToolConfig::default(), OutputFormat::Text).unwrap();
        assert!(summary.contains("Wrote"));
        assert!(summary.contains("5 items emitted"), "{summary}");
        let merged = fs::read_to_string(&out).unwrap();
        for method in ["a();", "b();", "c();"] {
            assert!(merged.contains(method), "{method} missing from {merged}");
        }
    }

    #[test]
    fn diff_lists_changes() {
        plain();
        let dir = tempfile::tempdir().unwrap();
        let old = write(dir.path(), "old.txt", BASE);
        let new = write(dir.path(), "new.txt", &BASE.replace("void a()", "long a()"));
        let args = DiffArgs {
            old,
            new,
            old_base: vec![],
            new_base: vec![],
            text: false,
            recursive: false,
            surface: None,
        };
        let text = cmd_diff(&args, &ToolConfig::default(), OutputFormat::Text).unwrap();
        assert!(text.contains("~ method p.C#a()"), "{text}");
        assert!(text.contains("type void -> long"));
        assert!(text.ends_with("0 added, 0 removed, 1 changed\n"));

        let json = cmd_diff(&args, &ToolConfig::default(), OutputFormat::Json).unwrap();
        let report: apisurf_diff::ApiDiff = serde_json::from_str(&json).unwrap();
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn text_diff_of_identical_files() {
        plain();
        let dir = tempfile::tempdir().unwrap();
        let old = write(dir.path(), "old.txt", BASE);
        let args = DiffArgs {
            old: old.clone(),
            new: old,
            old_base: vec![],
            new_base: vec![],
            text: true,
            recursive: false,
            surface: None,
        };
        assert_eq!(
            cmd_diff(&args, &ToolConfig::default(), OutputFormat::Text).unwrap(),
            "No changes.\n"
        );
    }

    #[test]
    fn text_diff_shows_changed_lines() {
        plain();
        let dir = tempfile::tempdir().unwrap();
        let old = write(dir.path(), "old.txt", BASE);
        let new = write(dir.path(), "new.txt", DELTA);
        let args = DiffArgs {
            old,
            new,
            old_base: vec![],
            new_base: vec![],
            text: true,
            recursive: false,
            surface: None,
        };
        let text = cmd_diff(&args, &ToolConfig::default(), OutputFormat::Text).unwrap();
        assert!(text.contains("-    method public void a();"), "{text}");
        assert!(text.contains("+    method public void c();"));
    }

    #[test]
    fn check_compat_fails_on_removed_api() {
        plain();
        let dir = tempfile::tempdir().unwrap();
        let old = write(dir.path(), "old.txt", BASE);
        let new = write(dir.path(), "new.txt", DELTA);
        let args = CheckCompatArgs {
            old: old.clone(),
            new,
            old_base: vec![],
            new_base: vec![],
            surface: None,
        };
        let (report, failed) = cmd_check_compat(&args, &ToolConfig::default(), OutputFormat::Text).unwrap();
        assert!(failed);
        assert!(report.contains("error: removed method p.C#a()"), "{report}");
        assert!(report.contains("removed method p.C#b()"));

        let same = CheckCompatArgs {
            old: old.clone(),
            new: old,
            old_base: vec![],
            new_base: vec![],
            surface: None,
        };
        let (report, failed) = cmd_check_compat(&same, &ToolConfig::default(), OutputFormat::Text).unwrap();
        assert!(!failed);
        assert!(report.contains("No compatibility issues."));
    }

    #[test]
    fn configured_severity_can_pass_the_check() {
        let dir = tempfile::tempdir().unwrap();
        let old = write(dir.path(), "old.txt", BASE);
        let new = write(dir.path(), "new.txt", DELTA);
        let config = ToolConfig::from_toml("[compat.severity]\nremoved_method = \"warning\"\n").unwrap();
        let args = CheckCompatArgs {
            old,
            new,
            old_base: vec![],
            new_base: vec![],
            surface: None,
        };
        let (report, failed) = cmd_check_compat(&args, &config, OutputFormat::Json).unwrap();
        assert!(!failed);
        let issues: Vec<Issue> = serde_json::from_str(&report).unwrap();
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.severity == Severity::Warning));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let broken = write(dir.path(), "broken.txt", "// Signature format: 4.0\npackage p {\n  public class {\n");
        let err = load_layers(&[], &[broken]).unwrap_err();
        assert!(format!("{err:#}").contains("broken.txt"), "{err:#}");
    }

    #[test]
    fn formats_lists_every_version() {
        plain();
        let text = cmd_formats(OutputFormat::Text).unwrap();
        assert!(text.contains("4.0 (default)"));
        assert!(text.contains("1.0"));
        let json: serde_json::Value = serde_json::from_str(&cmd_formats(OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["3.0"]["kotlin-style-nulls"], "yes");
        assert_eq!(json["2.0"]["kotlin-style-nulls"], "no");
    }
}
