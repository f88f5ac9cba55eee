//! Line changes and the range mapping derived from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::diff::backend::DiffBackend;
use crate::diff::myers::{OpKind, Operation};
use crate::error::CovdiffError;
use crate::Result;

/// A changed region between two versions, using 1-based inclusive lines.
///
/// `original_end_line == 0` marks a pure insertion after
/// `original_start_line`; `modified_end_line == 0` marks a pure deletion
/// after `modified_start_line`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChange {
    #[serde(rename = "originalStartLineNumber")]
    pub original_start_line: usize,
    #[serde(rename = "originalEndLineNumber")]
    pub original_end_line: usize,
    #[serde(rename = "modifiedStartLineNumber")]
    pub modified_start_line: usize,
    #[serde(rename = "modifiedEndLineNumber")]
    pub modified_end_line: usize,
}

/// Line changes of one file together with the line counts they refer to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChanges {
    pub old_line_count: usize,
    pub new_line_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<LineChange>,
}

impl LineChanges {
    pub fn new(old_line_count: usize, new_line_count: usize, changes: Vec<LineChange>) -> Self {
        Self {
            old_line_count,
            new_line_count,
            changes,
        }
    }

    /// Walk the range mapping of these changes
    pub fn for_each<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(&LineRange),
    {
        for_each_line_mapping(
            &self.changes,
            self.old_line_count,
            self.new_line_count,
            f,
        )
    }
}

/// Classification of a mapped line range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeKind {
    Unchanged,
    Updated,
    Inserted,
    Deleted,
}

/// A 1-based half-open pair of line ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRange {
    pub old_start: usize,
    pub old_end: usize,
    pub new_start: usize,
    pub new_end: usize,
    pub kind: RangeKind,
}

impl LineRange {
    pub fn old_len(&self) -> usize {
        self.old_end - self.old_start
    }

    pub fn new_len(&self) -> usize {
        self.new_end - self.new_start
    }

    pub fn is_empty(&self) -> bool {
        self.old_len() == 0 && self.new_len() == 0
    }
}

/// Convert an edit script into line changes.
///
/// A `Delete` immediately followed by an `Insert` forms one updated change.
pub fn line_changes(ops: &[Operation]) -> Vec<LineChange> {
    let mut changes = Vec::new();
    let mut i = 0;
    while i < ops.len() {
        let op = &ops[i];
        match op.kind {
            OpKind::Equal => {}
            OpKind::Delete => {
                let paired = ops
                    .get(i + 1)
                    .filter(|next| next.kind == OpKind::Insert);
                match paired {
                    Some(ins) => {
                        changes.push(LineChange {
                            original_start_line: op.old.start + 1,
                            original_end_line: op.old.end,
                            modified_start_line: ins.new.start + 1,
                            modified_end_line: ins.new.end,
                        });
                        i += 1;
                    }
                    None => changes.push(LineChange {
                        original_start_line: op.old.start + 1,
                        original_end_line: op.old.end,
                        modified_start_line: op.new.start,
                        modified_end_line: 0,
                    }),
                }
            }
            OpKind::Insert => changes.push(LineChange {
                original_start_line: op.old.start,
                original_end_line: 0,
                modified_start_line: op.new.start + 1,
                modified_end_line: op.new.end,
            }),
        }
        i += 1;
    }
    changes
}

/// Enumerate the full mapping between two versions.
///
/// Every change is preceded by the unchanged range leading up to it (which
/// may be empty), and a final unchanged range runs to the end of both
/// files. Ranges are 1-based half-open and together cover `[1, old_count]`
/// and `[1, new_count]` without gaps.
pub fn for_each_line_mapping<F>(
    changes: &[LineChange],
    old_count: usize,
    new_count: usize,
    mut f: F,
) -> Result<()>
where
    F: FnMut(&LineRange),
{
    let mut old_start = 1;
    let mut new_start = 1;

    for i in 0..=changes.len() {
        let (old_end, new_end, old_next, new_next, kind) = match changes.get(i) {
            None => (old_count + 1, new_count + 1, 0, 0, RangeKind::Unchanged),
            Some(change) => {
                let mut kind = RangeKind::Updated;
                let mut old_end = change.original_start_line;
                let mut old_next = change.original_end_line + 1;
                if change.original_end_line == 0 {
                    old_end += 1;
                    old_next = old_end;
                    kind = RangeKind::Inserted;
                }
                let mut new_end = change.modified_start_line;
                let mut new_next = change.modified_end_line + 1;
                if change.modified_end_line == 0 {
                    new_end += 1;
                    new_next = new_end;
                    kind = RangeKind::Deleted;
                }
                (old_end, new_end, old_next, new_next, kind)
            }
        };

        if old_end < old_start || new_end < new_start {
            return Err(CovdiffError::LineChangeOrder {
                old_line: old_end,
                new_line: new_end,
            });
        }
        if old_end - old_start != new_end - new_start {
            return Err(CovdiffError::RangeMismatch {
                old_start,
                old_end,
                new_start,
                new_end,
            });
        }
        f(&LineRange {
            old_start,
            old_end,
            new_start,
            new_end,
            kind: RangeKind::Unchanged,
        });

        if i == changes.len() {
            break;
        }
        if old_next < old_end || new_next < new_end {
            return Err(CovdiffError::LineChangeOrder {
                old_line: old_end,
                new_line: new_end,
            });
        }
        f(&LineRange {
            old_start: old_end,
            old_end: old_next,
            new_start: new_end,
            new_end: new_next,
            kind,
        });
        old_start = old_next;
        new_start = new_next;
    }
    Ok(())
}

/// Split text into `\n`-separated units without a trailing empty unit
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

/// Range mapping between two unit sequences, with empty unchanged gaps dropped
pub fn range_mapping<S: AsRef<str>>(
    backend: &dyn DiffBackend,
    old: &[S],
    new: &[S],
) -> Result<Vec<LineRange>> {
    let old: Vec<&str> = old.iter().map(|s| s.as_ref()).collect();
    let new: Vec<&str> = new.iter().map(|s| s.as_ref()).collect();
    let changes = backend.line_changes(&old, &new)?;
    ranges_of(&changes, old.len(), new.len())
}

/// Range mapping of already computed line changes, with empty unchanged gaps dropped
pub fn ranges_of(
    changes: &[LineChange],
    old_count: usize,
    new_count: usize,
) -> Result<Vec<LineRange>> {
    let mut ranges = Vec::new();
    for_each_line_mapping(changes, old_count, new_count, |range| {
        if range.kind != RangeKind::Unchanged || !range.is_empty() {
            ranges.push(*range);
        }
    })?;
    Ok(ranges)
}

/// New unit index to old unit index, both 0-based, for unchanged units
pub type BlockMapping = BTreeMap<usize, usize>;

/// Map every unit that survived unchanged from `old` to `new`
pub fn block_mapping<S: AsRef<str>>(
    backend: &dyn DiffBackend,
    old: &[S],
    new: &[S],
) -> Result<BlockMapping> {
    let old: Vec<&str> = old.iter().map(|s| s.as_ref()).collect();
    let new: Vec<&str> = new.iter().map(|s| s.as_ref()).collect();
    let changes = backend.line_changes(&old, &new)?;
    unchanged_lines(&changes, old.len(), new.len())
}

/// 0-based new line to 0-based old line, for every line inside an unchanged range
pub fn unchanged_lines(
    changes: &[LineChange],
    old_count: usize,
    new_count: usize,
) -> Result<BlockMapping> {
    let mut mapping = BlockMapping::new();
    for_each_line_mapping(changes, old_count, new_count, |range| {
        if range.kind == RangeKind::Unchanged {
            for offset in 0..range.new_len() {
                mapping.insert(range.new_start + offset - 1, range.old_start + offset - 1);
            }
        }
    })?;
    Ok(mapping)
}
