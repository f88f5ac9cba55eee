//! Carry line data of an older revision over to the current one.
//!
//! `changes` supplies the change detail (and line changes for modified
//! files) of every current file; `old` holds the line data recorded against
//! the older revision.

use tracing::debug;

use crate::annotation::{
    AnnotationType, FileAnnotation, LineAnnotation, LineNum, ProjectAnnotation,
};
use crate::diff::RangeKind;
use crate::Result;

/// Which ranges of a modified file take over old line data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarryOptions {
    /// Map unchanged files and unchanged ranges line by line
    pub include_unchanged: bool,
    /// Give every line of an updated range the data of the whole old range
    pub include_changed: bool,
    /// Map the common prefix of an updated range line by line.
    /// Ignored when `include_changed` is set.
    pub changed_as_mapping: bool,
    /// Skip lines the base knows to be outside any block
    pub exclude_non_block_lines: bool,
}

impl Default for CarryOptions {
    fn default() -> Self {
        Self {
            include_unchanged: true,
            include_changed: true,
            changed_as_mapping: false,
            exclude_non_block_lines: true,
        }
    }
}

impl CarryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only lines whose content is known to be identical
    pub fn unchanged_only() -> Self {
        Self {
            include_changed: false,
            ..Self::default()
        }
    }

    /// Only updated ranges
    pub fn changed_only() -> Self {
        Self {
            include_unchanged: false,
            ..Self::default()
        }
    }

    pub fn include_unchanged(mut self, include: bool) -> Self {
        self.include_unchanged = include;
        self
    }

    pub fn include_changed(mut self, include: bool) -> Self {
        self.include_changed = include;
        self
    }

    pub fn changed_as_mapping(mut self, enable: bool) -> Self {
        self.changed_as_mapping = enable;
        self
    }

    pub fn exclude_non_block_lines(mut self, exclude: bool) -> Self {
        self.exclude_non_block_lines = exclude;
        self
    }
}

/// Union the exec labels of old lines into the lines they map to
pub fn carry_exec_labels(
    base: &mut ProjectAnnotation,
    changes: &ProjectAnnotation,
    old: &ProjectAnnotation,
    options: CarryOptions,
) -> Result<()> {
    changes.require("carry_exec_labels", &[AnnotationType::ChangeDetail])?;
    map_lines(base, changes, old, options, |dst, src| {
        dst.exec_labels.extend(src.exec_labels.iter().cloned());
    })?;
    base.set(AnnotationType::LineExecLabels);
    Ok(())
}

/// Keep remarks of unchanged lines, unless the line already has one
pub fn carry_remarks(
    base: &mut ProjectAnnotation,
    changes: &ProjectAnnotation,
    old: &ProjectAnnotation,
) -> Result<()> {
    changes.require("carry_remarks", &[AnnotationType::ChangeDetail])?;
    let options = CarryOptions::unchanged_only().exclude_non_block_lines(false);
    map_lines(base, changes, old, options, |dst, src| {
        if dst.remark.is_none() {
            dst.remark = src.remark.clone();
        }
    })?;
    base.set(AnnotationType::LineRemark);
    Ok(())
}

fn map_lines<F>(
    base: &mut ProjectAnnotation,
    changes: &ProjectAnnotation,
    old: &ProjectAnnotation,
    options: CarryOptions,
    mut merge: F,
) -> Result<()>
where
    F: FnMut(&mut LineAnnotation, &LineAnnotation),
{
    for (path, change_file) in &changes.files {
        let Some(detail) = &change_file.change_detail else {
            continue;
        };
        if detail.is_new || detail.deleted {
            continue;
        }
        let old_path = detail.renamed_from.as_deref().unwrap_or(path);
        let Some(old_file) = old.files.get(old_path) else {
            continue;
        };
        let base_file = base.file_mut(path);

        if !detail.content_changed {
            if options.include_unchanged {
                for (n, line) in &old_file.lines {
                    merge(base_file.line_mut(*n), line);
                }
            }
            continue;
        }

        let Some(line_changes) = &change_file.line_changes else {
            continue;
        };

        // (new line, old range start, old range end), old range half-open
        let mut pairs: Vec<(usize, usize, usize)> = Vec::new();
        line_changes.for_each(|range| match range.kind {
            RangeKind::Unchanged if options.include_unchanged => {
                for i in 0..range.new_len() {
                    let o = range.old_start + i;
                    pairs.push((range.new_start + i, o, o + 1));
                }
            }
            RangeKind::Updated if options.include_changed => {
                for n in range.new_start..range.new_end {
                    pairs.push((n, range.old_start, range.old_end));
                }
            }
            RangeKind::Updated if options.changed_as_mapping => {
                for i in 0..range.new_len().min(range.old_len()) {
                    let o = range.old_start + i;
                    pairs.push((range.new_start + i, o, o + 1));
                }
            }
            _ => {}
        })?;

        let mut mapped = 0usize;
        for (n, old_start, old_end) in pairs {
            let n = n as LineNum;
            if !should_include(base_file, n, options.exclude_non_block_lines) {
                continue;
            }
            for o in old_start..old_end {
                if let Some(src) = old_file.lines.get(&(o as LineNum)) {
                    merge(base_file.line_mut(n), src);
                    mapped += 1;
                }
            }
        }
        debug!(file = %path, from = %old_path, mapped, "carried old line data");
    }
    Ok(())
}

/// Unknown lines are always included
fn should_include(file: &FileAnnotation, line: LineNum, exclude_non_block_lines: bool) -> bool {
    match file.lines.get(&line) {
        Some(data) => !exclude_non_block_lines || data.block_id.is_some(),
        None => true,
    }
}
