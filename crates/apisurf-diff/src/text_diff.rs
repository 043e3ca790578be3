//! Line-level diff of rendered signature files.
//!
//! Uses the `similar` crate (Myers diff algorithm) to produce hunks with
//! three lines of context, the form reviewers see for API changes.

use std::fmt::Write as _;

use serde::Serialize;
use similar::{ChangeTag, TextDiff};

/// Number of unchanged lines kept around each change.
const CONTEXT_LINES: usize = 3;

/// The result of diffing two signature texts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SignatureDiff {
    pub hunks: Vec<DiffHunk>,
    pub old_lines: usize,
    pub new_lines: usize,
}

impl SignatureDiff {
    /// Returns `true` if the two texts are identical.
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    pub fn additions(&self) -> usize {
        self.lines()
            .filter(|l| matches!(l, DiffLine::Added(_)))
            .count()
    }

    pub fn deletions(&self) -> usize {
        self.lines()
            .filter(|l| matches!(l, DiffLine::Removed(_)))
            .count()
    }

    fn lines(&self) -> impl Iterator<Item = &DiffLine> {
        self.hunks.iter().flat_map(|h| &h.lines)
    }

    /// Render in unified diff format with `old_name` and `new_name` as
    /// the file labels. Empty when the texts are identical.
    pub fn to_unified(&self, old_name: &str, new_name: &str) -> String {
        let mut out = String::new();
        if self.is_empty() {
            return out;
        }
        let _ = writeln!(out, "--- {old_name}");
        let _ = writeln!(out, "+++ {new_name}");
        for hunk in &self.hunks {
            let _ = writeln!(
                out,
                "@@ -{},{} +{},{} @@",
                hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count
            );
            for line in &hunk.lines {
                let _ = writeln!(out, "{line}");
            }
        }
        out
    }
}

/// A contiguous region of changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiffHunk {
    /// 1-based start line in the old text.
    pub old_start: usize,
    pub old_count: usize,
    /// 1-based start line in the new text.
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

/// A single line in a hunk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "text", rename_all = "snake_case")]
pub enum DiffLine {
    Context(String),
    Added(String),
    Removed(String),
}

impl std::fmt::Display for DiffLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Context(text) => write!(f, " {text}"),
            Self::Added(text) => write!(f, "+{text}"),
            Self::Removed(text) => write!(f, "-{text}"),
        }
    }
}

/// Compute a line-by-line diff between two signature texts.
pub fn diff_signature_text(old: &str, new: &str) -> SignatureDiff {
    let old_lines = old.lines().count();
    let new_lines = new.lines().count();
    if old == new {
        return SignatureDiff {
            hunks: Vec::new(),
            old_lines,
            new_lines,
        };
    }

    let text_diff = TextDiff::from_lines(old, new);
    let mut hunks = Vec::new();

    for group in text_diff.grouped_ops(CONTEXT_LINES) {
        let Some(first) = group.first() else {
            continue;
        };
        let mut hunk = DiffHunk {
            old_start: first.old_range().start + 1,
            old_count: 0,
            new_start: first.new_range().start + 1,
            new_count: 0,
            lines: Vec::new(),
        };

        for op in &group {
            for change in text_diff.iter_changes(op) {
                let text = change.value().trim_end_matches('\n').to_string();
                match change.tag() {
                    ChangeTag::Equal => {
                        hunk.lines.push(DiffLine::Context(text));
                        hunk.old_count += 1;
                        hunk.new_count += 1;
                    }
                    ChangeTag::Delete => {
                        hunk.lines.push(DiffLine::Removed(text));
                        hunk.old_count += 1;
                    }
                    ChangeTag::Insert => {
                        hunk.lines.push(DiffLine::Added(text));
                        hunk.new_count += 1;
                    }
                }
            }
        }
        // An empty side is numbered by the line before it.
        if hunk.old_count == 0 {
            hunk.old_start -= 1;
        }
        if hunk.new_count == 0 {
            hunk.new_start -= 1;
        }
        hunks.push(hunk);
    }

    SignatureDiff {
        hunks,
        old_lines,
        new_lines,
    }
}
