//! End-to-end annotation of a set of files.
//!
//! Each file is annotated on its own, in parallel: blank lines, blocks and
//! functions from its syntax tree, comment directives, and the line changes
//! against its old content. The per-file results are then merged and the
//! line and function derivations run once over the whole project.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::annotation::{
    load, merge_annotations_into, AnnotationType, ChangeDetail, ProjectAnnotation,
};
use crate::blocks::{collect_funcs, extract_blocks};
use crate::compute;
use crate::diff::DiffBackend;
use crate::error::CovdiffError;
use crate::source::SyntaxFile;
use crate::Result;

/// One file to annotate
#[derive(Debug, Clone, Default)]
pub struct FileInput {
    pub path: String,
    pub content: String,
    /// Syntax tree of `content`. Without one, no blocks or functions are derived.
    pub tree: Option<SyntaxFile>,
    pub change: Option<ChangeDetail>,
    /// Content at the old revision, diffed against `content` when the file changed
    pub old_content: Option<String>,
}

impl FileInput {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn tree(mut self, tree: SyntaxFile) -> Self {
        self.tree = Some(tree);
        self
    }

    pub fn change(mut self, change: ChangeDetail) -> Self {
        self.change = Some(change);
        self
    }

    pub fn old_content(mut self, content: impl Into<String>) -> Self {
        self.old_content = Some(content.into());
        self
    }
}

/// Options for [`annotate`]
#[derive(Debug, Clone, Copy)]
pub struct AnnotateOptions {
    /// Worker threads, 0 for the rayon default
    pub threads: usize,
    /// Register the blocks extracted from syntax trees. Turn off when a
    /// coverage profile supplies the blocks.
    pub tree_blocks: bool,
    /// Run the line and function derivations after merging
    pub derive: bool,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            threads: 0,
            tree_blocks: true,
            derive: true,
        }
    }
}

impl AnnotateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn tree_blocks(mut self, enable: bool) -> Self {
        self.tree_blocks = enable;
        self
    }

    pub fn derive(mut self, enable: bool) -> Self {
        self.derive = enable;
        self
    }
}

pub fn annotate(
    inputs: Vec<FileInput>,
    options: &AnnotateOptions,
    backend: &dyn DiffBackend,
) -> Result<ProjectAnnotation> {
    annotate_with(inputs, Vec::new(), options, backend)
}

/// Like [`annotate`], merging `extra` annotations (such as those loaded
/// from a coverage profile) in before the derivations run.
pub fn annotate_with(
    inputs: Vec<FileInput>,
    extra: Vec<ProjectAnnotation>,
    options: &AnnotateOptions,
    backend: &dyn DiffBackend,
) -> Result<ProjectAnnotation> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads)
        .build()
        .map_err(|e| CovdiffError::WorkerPool(e.to_string()))?;

    let has_changes = inputs.iter().any(|i| i.change.is_some());
    let per_file: Vec<Vec<ProjectAnnotation>> = pool.install(|| {
        inputs
            .par_iter()
            .map(|input| annotate_file(input, options, backend))
            .collect::<Result<_>>()
    })?;

    let mut project = ProjectAnnotation::new();
    merge_annotations_into(&mut project, per_file.iter().flatten());
    merge_annotations_into(&mut project, &extra);
    if has_changes {
        // files without line changes still get their lines marked unchanged
        project.set(AnnotationType::LineChanges);
    }
    info!(files = project.files.len(), "annotated files");

    if options.derive {
        derive(&mut project)?;
    }
    Ok(project)
}

fn annotate_file(
    input: &FileInput,
    options: &AnnotateOptions,
    backend: &dyn DiffBackend,
) -> Result<Vec<ProjectAnnotation>> {
    let path = input.path.as_str();
    let content = input.content.as_str();
    let mut out = vec![
        load::from_empty_lines(path, content),
        load::from_line_comments(path, content),
    ];

    if let Some(tree) = &input.tree {
        if options.tree_blocks {
            out.push(load::from_blocks(path, &extract_blocks(tree, content)?));
        }
        let funcs = collect_funcs(tree, content);
        out.push(load::from_funcs(path, &funcs));
        out.push(load::from_func_comments(path, content, &funcs));
    }

    let mut change = input.change.clone();
    let content_changed = change.as_ref().map_or(true, |c| c.content_changed && !c.is_new);
    if let (Some(old), true) = (&input.old_content, content_changed) {
        match load::line_changes_between(backend, old, content)? {
            Some(changes) => {
                debug!(file = path, "content changed");
                change.get_or_insert_with(ChangeDetail::modified);
                out.push(load::from_line_changes(path, changes));
            }
            None => {
                change.get_or_insert_with(ChangeDetail::default);
            }
        }
    }
    if let Some(detail) = change {
        out.push(load::from_change_details(&BTreeMap::from([(
            path.to_string(),
            detail,
        )])));
    }
    Ok(out)
}

/// Run every derivation whose inputs are present
pub fn derive(p: &mut ProjectAnnotation) -> Result<()> {
    use AnnotationType::*;

    if p.has(Blocks) {
        compute::block_id_for_line(p)?;
        compute::exec_labels_block_to_line(p)?;
    }
    if p.has(FileFuncs) {
        compute::func_id_for_line(p)?;
    }
    if p.has(FuncCodeComments) && p.has(FileFuncs) {
        compute::labels_from_comments(p)?;
    }
    if p.has(LineChanges) {
        compute::changed_for_line_from_changes(p)?;
    }
    if p.has(LineChanged) && p.has(LineFuncId) {
        compute::changed_line_to_func(p)?;
    }
    if p.has(FuncCodeComments) {
        compute::code_excluded_for_func(p)?;
    }
    if p.has(FuncCodeExcluded) && p.has(LineFuncId) {
        compute::code_excluded_func_to_line(p)?;
    }
    if p.has(LineBlockId) {
        compute::uncoverable_for_line(p)?;
    }
    Ok(())
}
