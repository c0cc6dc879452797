//! Line diffs for change previews.
//!
//! Two flavors: a position-aligned comparison used for pending changes, and
//! a minimal diff (via `similar`) used when browsing commit history. Both
//! only report additions and deletions.

use std::fmt;

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

/// A single diff operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffOp {
    Delete,
    Add,
}

impl DiffOp {
    /// The operation seen from the other side.
    pub fn inverse(self) -> Self {
        match self {
            Self::Add => Self::Delete,
            Self::Delete => Self::Add,
        }
    }

    pub fn sign(self) -> char {
        match self {
            Self::Add => '+',
            Self::Delete => '-',
        }
    }
}

/// One added or deleted line.
///
/// `line_number` is 1-based, counted on the side the line belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffLine {
    pub op: DiffOp,
    pub line: String,
    pub line_number: usize,
}

impl DiffLine {
    pub fn add(line: impl Into<String>, line_number: usize) -> Self {
        Self {
            op: DiffOp::Add,
            line: line.into(),
            line_number,
        }
    }

    pub fn delete(line: impl Into<String>, line_number: usize) -> Self {
        Self {
            op: DiffOp::Delete,
            line: line.into(),
            line_number,
        }
    }
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op.sign(), self.line)
    }
}

/// Position-aligned line comparison.
///
/// Line `i` of `old` is only ever compared with line `i` of `new`; there is
/// no alignment, so an inserted line shows every following line as changed.
pub fn line_diff(old: &str, new: &str) -> Vec<DiffLine> {
    let old_lines: Vec<&str> = old.split('\n').collect();
    let new_lines: Vec<&str> = new.split('\n').collect();
    let len = old_lines.len().max(new_lines.len());

    let mut out = Vec::new();
    for i in 0..len {
        match (old_lines.get(i), new_lines.get(i)) {
            (Some(o), Some(n)) if o == n => {}
            (Some(o), Some(n)) => {
                out.push(DiffLine::delete(*o, i + 1));
                out.push(DiffLine::add(*n, i + 1));
            }
            (None, Some(n)) => out.push(DiffLine::add(*n, i + 1)),
            (Some(o), None) => out.push(DiffLine::delete(*o, i + 1)),
            (None, None) => {}
        }
    }
    out
}

/// Minimal line diff; equal lines are omitted.
pub fn minimal_diff(old: &str, new: &str) -> Vec<DiffLine> {
    let diff = TextDiff::from_lines(old, new);

    diff.iter_all_changes()
        .filter_map(|change| {
            let line = change.value().trim_end_matches('\n').trim_end_matches('\r');
            match change.tag() {
                ChangeTag::Equal => None,
                ChangeTag::Delete => Some(DiffLine::delete(line, change.old_index()? + 1)),
                ChangeTag::Insert => Some(DiffLine::add(line, change.new_index()? + 1)),
            }
        })
        .collect()
}

/// Every line of `text` as one operation, for whole-file additions and deletions.
pub fn whole_file(text: &str, op: DiffOp) -> Vec<DiffLine> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n')
        .enumerate()
        .map(|(i, line)| DiffLine {
            op,
            line: line.to_string(),
            line_number: i + 1,
        })
        .collect()
}

/// The first entries of a diff plus how many were cut.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffPreview {
    pub lines: Vec<DiffLine>,
    pub remaining: usize,
}

impl DiffPreview {
    pub fn truncate(mut lines: Vec<DiffLine>, limit: usize) -> Self {
        let remaining = lines.len().saturating_sub(limit);
        lines.truncate(limit);
        Self { lines, remaining }
    }

    pub fn is_truncated(&self) -> bool {
        self.remaining > 0
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.remaining == 0
    }
}

impl fmt::Display for DiffPreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        if self.remaining > 0 {
            writeln!(f, "... {} more lines", self.remaining)?;
        }
        Ok(())
    }
}
