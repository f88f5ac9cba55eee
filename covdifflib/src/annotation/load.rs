//! Loaders that turn raw inputs into single-kind project annotations.
//!
//! Each loader returns a [`ProjectAnnotation`] declaring exactly the kinds
//! it filled in, ready to be combined with
//! [`merge_annotations_into`](crate::annotation::merge_annotations_into).

use std::collections::BTreeMap;

use tracing::debug;

use crate::annotation::comments::{func_comments, line_comments};
use crate::annotation::model::{
    BlockAnnotation, ChangeDetail, CommentLabel, FuncAnnotation, LineNum, ProjectAnnotation,
};
use crate::annotation::types::AnnotationType;
use crate::blocks::{Block, FuncInfo};
use crate::diff::{split_lines, DiffBackend, LineChanges};
use crate::source::profile::Profile;
use crate::Result;

/// How profile blocks become annotations
#[derive(Debug, Clone, Default)]
pub struct ProfileLoadOptions {
    /// Exec label recorded for blocks with a positive count
    pub label: String,
    /// Prefix removed from profile file names, such as a module path
    pub strip_prefix: Option<String>,
}

impl ProfileLoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        self.strip_prefix = Some(prefix);
        self
    }

    fn map_path<'a>(&self, file: &'a str) -> &'a str {
        self.strip_prefix
            .as_deref()
            .and_then(|p| file.strip_prefix(p))
            .unwrap_or(file)
    }
}

/// Blocks of a profile, with the configured exec label on every executed block
pub fn from_profile(profile: &Profile, options: &ProfileLoadOptions) -> ProjectAnnotation {
    let mut project = ProjectAnnotation::with_types(&[AnnotationType::Blocks]);
    for pb in &profile.blocks {
        let file = project.file_mut(options.map_path(&pb.file));
        let block = file
            .blocks
            .entry(pb.block.id())
            .or_insert_with(|| BlockAnnotation::new(pb.block));
        if pb.count > 0 {
            block.exec_labels.insert(options.label.clone());
        }
    }
    debug!(
        files = project.files.len(),
        label = %options.label,
        "loaded profile blocks"
    );
    project
}

/// Statically extracted blocks of one file, without any execution
pub fn from_blocks(path: &str, blocks: &[Block]) -> ProjectAnnotation {
    let mut project = ProjectAnnotation::with_types(&[AnnotationType::Blocks]);
    let file = project.file_mut(path);
    for block in blocks {
        file.blocks
            .entry(block.id())
            .or_insert_with(|| BlockAnnotation::new(*block));
    }
    project
}

fn func_annotation(info: &FuncInfo) -> FuncAnnotation {
    FuncAnnotation {
        name: info.name.clone(),
        owner_type: info.owner_type.clone(),
        closure: info.closure,
        ..FuncAnnotation::new(info.block)
    }
}

pub fn from_funcs(path: &str, funcs: &[FuncInfo]) -> ProjectAnnotation {
    let mut project = ProjectAnnotation::with_types(&[AnnotationType::FileFuncs]);
    let file = project.file_mut(path);
    for info in funcs {
        file.funcs
            .entry(info.block.id())
            .or_insert_with(|| func_annotation(info));
    }
    project
}

/// Comment directives above each function header
pub fn from_func_comments(path: &str, content: &str, funcs: &[FuncInfo]) -> ProjectAnnotation {
    let mut project = ProjectAnnotation::with_types(&[AnnotationType::FuncCodeComments]);
    let mut comments = func_comments(content, funcs);
    let file = project.file_mut(path);
    for info in funcs {
        if let Some(code) = comments.remove(&info.block.id()) {
            let func = file
                .funcs
                .entry(info.block.id())
                .or_insert_with(|| func_annotation(info));
            func.code = Some(code);
        }
    }
    project
}

/// Trailing comment directives on code lines
pub fn from_line_comments(path: &str, content: &str) -> ProjectAnnotation {
    let mut project = ProjectAnnotation::with_types(&[AnnotationType::LineLabels]);
    let file = project.file_mut(path);
    for (n, code) in line_comments(content) {
        let line = file.line_mut(n);
        if let Some(labels) = code.comments.get(&CommentLabel::Labels) {
            line.labels.extend(labels.values.iter().cloned());
        }
        line.code = Some(code);
    }
    project
}

/// Mark blank and whitespace-only lines
pub fn from_empty_lines(path: &str, content: &str) -> ProjectAnnotation {
    let mut project = ProjectAnnotation::with_types(&[AnnotationType::LineEmpty]);
    let file = project.file_mut(path);
    for (idx, text) in split_lines(content).into_iter().enumerate() {
        if text.trim().is_empty() {
            file.line_mut((idx + 1) as LineNum).empty = true;
        }
    }
    project
}

/// Change details of files, keyed by their path in the new version
pub fn from_change_details(details: &BTreeMap<String, ChangeDetail>) -> ProjectAnnotation {
    let mut project = ProjectAnnotation::with_types(&[AnnotationType::ChangeDetail]);
    for (path, detail) in details {
        project.file_mut(path).change_detail = Some(detail.clone());
    }
    project
}

pub fn from_line_changes(path: &str, changes: LineChanges) -> ProjectAnnotation {
    let mut project = ProjectAnnotation::with_types(&[AnnotationType::LineChanges]);
    project.file_mut(path).line_changes = Some(changes);
    project
}

/// Line changes between two versions of a file.
///
/// Returns `None` when the contents only differ in surrounding whitespace.
pub fn line_changes_between(
    backend: &dyn DiffBackend,
    old: &str,
    new: &str,
) -> Result<Option<LineChanges>> {
    if old.trim() == new.trim() {
        return Ok(None);
    }
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    let changes = backend.line_changes(&old_lines, &new_lines)?;
    Ok(Some(LineChanges::new(
        old_lines.len(),
        new_lines.len(),
        changes,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{LineChange, MyersBackend};

    #[test]
    fn test_profile_blocks_with_exec_labels() {
        let profile = Profile::parse(
            "mode: set\n\
             example.com/mod/pkg/a.go:1.1,3.2 1 1\n\
             example.com/mod/pkg/a.go:4.1,5.2 1 0\n",
        )
        .unwrap();
        let options = ProfileLoadOptions::new()
            .label("smoke")
            .strip_prefix("example.com/mod");
        let project = from_profile(&profile, &options);

        assert!(project.has(AnnotationType::Blocks));
        let file = &project.files["pkg/a.go"];
        assert_eq!(file.blocks.len(), 2);
        let first = &file.blocks[&Block::new(1, 1, 3, 2).id()];
        assert!(first.exec_labels.contains("smoke"));
        let second = &file.blocks[&Block::new(4, 1, 5, 2).id()];
        assert!(second.exec_labels.is_empty());
    }

    #[test]
    fn test_default_label_is_empty_string() {
        let profile = Profile::parse("mode: count\na.go:1.1,2.2 1 7\n").unwrap();
        let project = from_profile(&profile, &ProfileLoadOptions::new());
        let block = &project.files["a.go"].blocks[&Block::new(1, 1, 2, 2).id()];
        assert!(block.exec_labels.contains(""));
    }

    #[test]
    fn test_empty_lines() {
        let project = from_empty_lines("a.go", "package a\n\n  \t\nfunc f() {}\n");
        let file = &project.files["a.go"];
        let empty: Vec<_> = file.lines.keys().copied().collect();
        assert_eq!(empty, vec![2, 3]);
    }

    #[test]
    fn test_func_comments_load() {
        let content = "package a\n// nocov\nfunc F() {\n}\nfunc G() {\n}\n";
        let funcs = vec![
            FuncInfo {
                block: Block::new(3, 1, 4, 2),
                name: "F".into(),
                owner_type: None,
                closure: false,
            },
            FuncInfo {
                block: Block::new(5, 1, 6, 2),
                name: "G".into(),
                owner_type: None,
                closure: false,
            },
        ];
        let project = from_func_comments("a.go", content, &funcs);
        let file = &project.files["a.go"];
        assert_eq!(file.funcs.len(), 1);
        let f = &file.funcs[&Block::new(3, 1, 4, 2).id()];
        assert_eq!(f.name, "F");
        assert!(f.code.as_ref().unwrap().has_exclusion_comment());
    }

    #[test]
    fn test_line_comment_labels() {
        let project = from_line_comments("a.go", "x := 1 // labels: fast, slow\n");
        let line = &project.files["a.go"].lines[&1];
        assert_eq!(line.labels.len(), 2);
        assert!(!line.code_excluded());
    }

    #[test]
    fn test_line_changes_between() {
        let backend = MyersBackend;
        assert_eq!(
            line_changes_between(&backend, "a\nb\n", "a\nb\n\n").unwrap(),
            None
        );
        let changes = line_changes_between(&backend, "a\nb\nc\n", "a\nx\nc\n")
            .unwrap()
            .unwrap();
        assert_eq!(changes.old_line_count, 3);
        assert_eq!(
            changes.changes,
            vec![LineChange {
                original_start_line: 2,
                original_end_line: 2,
                modified_start_line: 2,
                modified_end_line: 2,
            }]
        );
    }
}
