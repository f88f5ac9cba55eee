//! Line level derivations: owning block and function, exec labels,
//! change state and coverability.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::annotation::{AnnotationType, FileAnnotation, LineNum, ProjectAnnotation};
use crate::blocks::{Block, BlockId};
use crate::diff::RangeKind;
use crate::Result;

/// Which of two overlapping ranges keeps a shared line.
///
/// Ranges are registered in descending [`Block`] order, so `Later` hands a
/// shared line to the range that starts first and `Earlier` to the one
/// nested inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precedence {
    /// The range registered first keeps the line
    Earlier,
    /// The range registered last takes the line over
    Later,
}

/// Assign every line covered by one of `ranges` to a single range id
fn assign_lines<'a, I>(ranges: I, precedence: Precedence) -> BTreeMap<LineNum, BlockId>
where
    I: IntoIterator<Item = (&'a BlockId, Block)>,
{
    let mut sorted: Vec<(&BlockId, Block)> = ranges.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));

    let mut owner: BTreeMap<LineNum, BlockId> = BTreeMap::new();
    for (id, block) in sorted {
        for line in block.lines() {
            match precedence {
                Precedence::Earlier => {
                    owner.entry(line).or_insert_with(|| id.clone());
                }
                Precedence::Later => {
                    owner.insert(line, id.clone());
                }
            }
        }
    }
    owner
}

pub fn block_id_for_line(p: &mut ProjectAnnotation) -> Result<()> {
    block_id_for_line_with(p, Precedence::Later)
}

/// Give every line spanned by a block that block's id
pub fn block_id_for_line_with(p: &mut ProjectAnnotation, precedence: Precedence) -> Result<()> {
    p.require("block_id_for_line", &[AnnotationType::Blocks])?;
    for file in p.files.values_mut() {
        let owner = assign_lines(
            file.blocks.iter().map(|(id, b)| (id, b.block)),
            precedence,
        );
        for (line, id) in owner {
            file.line_mut(line).block_id = Some(id);
        }
    }
    p.set(AnnotationType::LineBlockId);
    Ok(())
}

pub fn func_id_for_line(p: &mut ProjectAnnotation) -> Result<()> {
    func_id_for_line_with(p, Precedence::Earlier)
}

/// Give every line spanned by a function that function's id
pub fn func_id_for_line_with(p: &mut ProjectAnnotation, precedence: Precedence) -> Result<()> {
    p.require("func_id_for_line", &[AnnotationType::FileFuncs])?;
    for file in p.files.values_mut() {
        let owner = assign_lines(
            file.funcs.iter().map(|(id, f)| (id, f.block)),
            precedence,
        );
        for (line, id) in owner {
            file.line_mut(line).func_id = Some(id);
        }
    }
    p.set(AnnotationType::LineFuncId);
    Ok(())
}

/// Copy the exec labels of each block onto the lines it owns
pub fn exec_labels_block_to_line(p: &mut ProjectAnnotation) -> Result<()> {
    p.require(
        "exec_labels_block_to_line",
        &[AnnotationType::Blocks, AnnotationType::LineBlockId],
    )?;
    for file in p.files.values_mut() {
        let blocks = &file.blocks;
        for line in file.lines.values_mut() {
            let Some(block) = line.block_id.as_ref().and_then(|id| blocks.get(id)) else {
                continue;
            };
            line.exec_labels.extend(block.exec_labels.iter().cloned());
        }
    }
    p.set(AnnotationType::LineExecLabels);
    Ok(())
}

/// Recompute `changed` and `old_line` of every line from the file's line changes.
///
/// Files without line changes end up with no changed lines.
pub fn changed_for_line_from_changes(p: &mut ProjectAnnotation) -> Result<()> {
    p.require("changed_for_line_from_changes", &[AnnotationType::LineChanges])?;
    for (path, file) in p.files.iter_mut() {
        for line in file.lines.values_mut() {
            line.changed = false;
        }
        let FileAnnotation {
            lines,
            line_changes,
            ..
        } = file;
        let Some(changes) = line_changes.as_ref() else {
            continue;
        };
        let mut changed = 0usize;
        changes.for_each(|range| match range.kind {
            RangeKind::Updated | RangeKind::Inserted => {
                for n in range.new_start..range.new_end {
                    lines.entry(n as LineNum).or_default().changed = true;
                    changed += 1;
                }
            }
            RangeKind::Unchanged => {
                for (offset, n) in (range.new_start..range.new_end).enumerate() {
                    lines.entry(n as LineNum).or_default().old_line =
                        Some((range.old_start + offset) as LineNum);
                }
            }
            RangeKind::Deleted => {}
        })?;
        debug!(file = %path, changed, "marked changed lines");
    }
    p.set(AnnotationType::LineChanged);
    p.set(AnnotationType::LineOldLine);
    Ok(())
}

/// A function is changed when any of its lines is
pub fn changed_line_to_func(p: &mut ProjectAnnotation) -> Result<()> {
    p.require(
        "changed_line_to_func",
        &[AnnotationType::LineFuncId, AnnotationType::LineChanged],
    )?;
    for file in p.files.values_mut() {
        for func in file.funcs.values_mut() {
            func.changed = false;
        }
        for line in file.lines.values() {
            if !line.changed {
                continue;
            }
            if let Some(func) = line.func_id.as_ref().and_then(|id| file.funcs.get_mut(id)) {
                func.changed = true;
            }
        }
    }
    p.set(AnnotationType::FuncChanged);
    Ok(())
}

/// Lines that can never count towards coverage: blank lines, lines outside
/// any block and lines excluded by a comment or remark
pub fn uncoverable_for_line(p: &mut ProjectAnnotation) -> Result<()> {
    p.require("uncoverable_for_line", &[AnnotationType::LineBlockId])?;
    for file in p.files.values_mut() {
        for line in file.lines.values_mut() {
            line.uncoverable = line.empty
                || line.block_id.is_none()
                || line.code_excluded()
                || line.remark_excluded();
        }
    }
    p.set(AnnotationType::LineUncoverable);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{BlockAnnotation, FuncAnnotation};
    use crate::diff::{LineChange, LineChanges};
    use crate::error::CovdiffError;

    fn with_blocks(blocks: &[Block]) -> ProjectAnnotation {
        let mut p = ProjectAnnotation::with_types(&[AnnotationType::Blocks]);
        let file = p.file_mut("a.go");
        for b in blocks {
            file.blocks.insert(b.id(), BlockAnnotation::new(*b));
        }
        p
    }

    #[test]
    fn test_block_id_requires_blocks() {
        let mut p = ProjectAnnotation::new();
        match block_id_for_line(&mut p).unwrap_err() {
            CovdiffError::MissingAnnotations { missing, .. } => assert_eq!(missing, vec!["blocks"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_head_line_belongs_to_preceding_block() {
        // `if cond {` on line 3 ends one block and opens the next
        let head = Block::new(1, 10, 3, 11);
        let body = Block::new(3, 11, 5, 3);
        let mut p = with_blocks(&[body, head]);
        block_id_for_line(&mut p).unwrap();

        let file = &p.files["a.go"];
        assert_eq!(file.lines[&1].block_id, Some(head.id()));
        assert_eq!(file.lines[&3].block_id, Some(head.id()));
        assert_eq!(file.lines[&4].block_id, Some(body.id()));
        assert_eq!(file.lines[&5].block_id, Some(body.id()));
        assert!(p.has(AnnotationType::LineBlockId));
    }

    #[test]
    fn test_nested_block_keeps_shared_line_when_asked() {
        let head = Block::new(1, 10, 3, 11);
        let body = Block::new(3, 11, 5, 3);
        let mut p = with_blocks(&[head, body]);
        block_id_for_line_with(&mut p, Precedence::Earlier).unwrap();
        assert_eq!(p.files["a.go"].lines[&3].block_id, Some(body.id()));
    }

    #[test]
    fn test_block_order_is_numeric_not_lexical() {
        // "10:..." sorts before "9:..." as a string
        let a = Block::new(9, 1, 10, 2);
        let b = Block::new(10, 2, 11, 1);
        let mut p = with_blocks(&[b, a]);
        block_id_for_line(&mut p).unwrap();
        assert_eq!(p.files["a.go"].lines[&10].block_id, Some(a.id()));
        assert_eq!(p.files["a.go"].lines[&11].block_id, Some(b.id()));
    }

    #[test]
    fn test_closure_owns_its_lines() {
        let mut p = ProjectAnnotation::with_types(&[AnnotationType::FileFuncs]);
        let outer = Block::new(1, 1, 10, 2);
        let closure = Block::new(4, 7, 6, 3);
        let file = p.file_mut("a.go");
        file.funcs.insert(outer.id(), FuncAnnotation::new(outer));
        file.funcs.insert(closure.id(), FuncAnnotation::new(closure));

        func_id_for_line(&mut p).unwrap();
        let lines = &p.files["a.go"].lines;
        for line in 4..=6 {
            assert_eq!(lines[&line].func_id, Some(closure.id()), "line {line}");
        }
        assert_eq!(lines[&3].func_id, Some(outer.id()));
        assert_eq!(lines[&8].func_id, Some(outer.id()));

        func_id_for_line_with(&mut p, Precedence::Later).unwrap();
        assert_eq!(p.files["a.go"].lines[&5].func_id, Some(outer.id()));
    }

    #[test]
    fn test_exec_labels_flow_to_lines() {
        let block = Block::new(2, 1, 3, 2);
        let mut p = with_blocks(&[block]);
        p.file_mut("a.go")
            .blocks
            .get_mut(&block.id())
            .unwrap()
            .exec_labels
            .insert("".into());

        let err = exec_labels_block_to_line(&mut p).unwrap_err();
        assert!(matches!(err, CovdiffError::MissingAnnotations { .. }));

        block_id_for_line(&mut p).unwrap();
        exec_labels_block_to_line(&mut p).unwrap();
        assert!(p.files["a.go"].lines[&3].exec_labels.contains(""));
    }

    #[test]
    fn test_changed_lines_from_changes() {
        let mut p = ProjectAnnotation::with_types(&[AnnotationType::LineChanges]);
        let file = p.file_mut("a.go");
        file.line_mut(1).changed = true;
        file.line_changes = Some(LineChanges::new(
            3,
            4,
            vec![LineChange {
                original_start_line: 2,
                original_end_line: 2,
                modified_start_line: 2,
                modified_end_line: 3,
            }],
        ));
        changed_for_line_from_changes(&mut p).unwrap();

        let lines = &p.files["a.go"].lines;
        assert!(!lines[&1].changed);
        assert_eq!(lines[&1].old_line, Some(1));
        assert!(lines[&2].changed && lines[&3].changed);
        assert_eq!(lines[&4].old_line, Some(3));
        assert!(p.has(AnnotationType::LineOldLine));
    }

    #[test]
    fn test_changed_line_marks_func() {
        let mut p = ProjectAnnotation::with_types(&[
            AnnotationType::LineFuncId,
            AnnotationType::LineChanged,
        ]);
        let f = Block::new(1, 1, 3, 2);
        let g = Block::new(5, 1, 7, 2);
        let file = p.file_mut("a.go");
        file.funcs.insert(f.id(), FuncAnnotation::new(f));
        file.funcs.insert(g.id(), FuncAnnotation::new(g));
        let line = file.line_mut(2);
        line.func_id = Some(f.id());
        line.changed = true;
        file.line_mut(6).func_id = Some(g.id());

        changed_line_to_func(&mut p).unwrap();
        let funcs = &p.files["a.go"].funcs;
        assert!(funcs[&f.id()].changed);
        assert!(!funcs[&g.id()].changed);
    }

    #[test]
    fn test_uncoverable_lines() {
        let block = Block::new(1, 1, 3, 2);
        let mut p = with_blocks(&[block]);
        let file = p.file_mut("a.go");
        file.line_mut(2).empty = true;
        file.line_mut(5);
        block_id_for_line(&mut p).unwrap();
        uncoverable_for_line(&mut p).unwrap();

        let lines = &p.files["a.go"].lines;
        assert!(!lines[&1].uncoverable);
        assert!(lines[&2].uncoverable);
        assert!(lines[&5].uncoverable);
    }
}
