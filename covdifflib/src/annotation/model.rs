//! Annotation data model.
//!
//! Everything is keyed by ordered maps so that serialized output never
//! depends on hash iteration order. Empty collections, `None` and `false`
//! are skipped when serializing.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::annotation::types::{AnnotationType, AnnotationTypes};
use crate::blocks::{Block, BlockId, FuncId};
use crate::diff::LineChanges;
use crate::Result;

/// 1-based line number
pub type LineNum = u32;

fn is_false(b: &bool) -> bool {
    !*b
}

/// A recognized source comment property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentLabel {
    Labels,
    Unreachable,
    NoCov,
    Deprecated,
}

impl CommentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentLabel::Labels => "labels",
            CommentLabel::Unreachable => "unreachable",
            CommentLabel::NoCov => "nocov",
            CommentLabel::Deprecated => "deprecated",
        }
    }

    /// Whether the property carries comma-separated values
    pub fn takes_values(&self) -> bool {
        matches!(self, CommentLabel::Labels)
    }

    /// Whether the property removes code from coverage
    pub fn excludes(&self) -> bool {
        matches!(
            self,
            CommentLabel::Unreachable | CommentLabel::NoCov | CommentLabel::Deprecated
        )
    }
}

impl fmt::Display for CommentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentLabel {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "labels" => Ok(CommentLabel::Labels),
            "unreachable" => Ok(CommentLabel::Unreachable),
            "nocov" => Ok(CommentLabel::NoCov),
            "deprecated" => Ok(CommentLabel::Deprecated),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeComment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl CodeComment {
    pub fn merge(&mut self, other: &CodeComment) {
        if self.author.is_empty() || (!other.author.is_empty() && other.author < self.author) {
            self.author = other.author.clone();
        }
        self.values.extend(other.values.iter().cloned());
        self.values.sort();
        self.values.dedup();
    }
}

/// Exclusion state and parsed comments of a line or function
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeAnnotation {
    #[serde(default, skip_serializing_if = "is_false")]
    pub excluded: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub comments: BTreeMap<CommentLabel, CodeComment>,
}

impl CodeAnnotation {
    pub fn merge(&mut self, other: &CodeAnnotation) {
        self.excluded |= other.excluded;
        for (label, comment) in &other.comments {
            self.comments
                .entry(*label)
                .and_modify(|c| c.merge(comment))
                .or_insert_with(|| comment.clone());
        }
    }

    /// Whether any comment property excludes the code
    pub fn has_exclusion_comment(&self) -> bool {
        self.comments.keys().any(|l| l.excludes())
    }
}

/// A manual override attached to a line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remark {
    #[serde(default, skip_serializing_if = "is_false")]
    pub excluded: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineAnnotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<BlockId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func_id: Option<FuncId>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub changed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_line: Option<LineNum>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub empty: bool,
    /// Labels authored by hand, usually through comments
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub labels: BTreeSet<String>,
    /// Labels with at least one recorded execution
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub exec_labels: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub coverage_labels: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub uncoverable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<Remark>,
}

impl LineAnnotation {
    /// OR-merge `other` into this line. Ids and the old line keep the
    /// first value seen.
    pub fn merge(&mut self, other: &LineAnnotation) {
        self.changed |= other.changed;
        self.empty |= other.empty;
        self.uncoverable |= other.uncoverable;
        if self.block_id.is_none() {
            self.block_id = other.block_id.clone();
        }
        if self.func_id.is_none() {
            self.func_id = other.func_id.clone();
        }
        if self.old_line.is_none() {
            self.old_line = other.old_line;
        }
        self.labels.extend(other.labels.iter().cloned());
        self.exec_labels.extend(other.exec_labels.iter().cloned());
        merge_flags(&mut self.coverage_labels, &other.coverage_labels);
        merge_code(&mut self.code, &other.code);
        if self.remark.is_none() {
            self.remark = other.remark.clone();
        }
    }

    pub fn code_excluded(&self) -> bool {
        self.code.as_ref().is_some_and(|c| c.excluded)
    }

    pub fn remark_excluded(&self) -> bool {
        self.remark.as_ref().is_some_and(|r| r.excluded)
    }

    pub fn is_default(&self) -> bool {
        *self == LineAnnotation::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockAnnotation {
    pub block: Block,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub exec_labels: BTreeSet<String>,
}

impl BlockAnnotation {
    pub fn new(block: Block) -> Self {
        Self {
            block,
            exec_labels: BTreeSet::new(),
        }
    }

    pub fn merge(&mut self, other: &BlockAnnotation) {
        self.exec_labels.extend(other.exec_labels.iter().cloned());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuncAnnotation {
    pub block: Block,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_type: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub closure: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub changed: bool,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub labels: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub exec_labels: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub coverage_labels: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeAnnotation>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub first_line_excluded: bool,
}

impl FuncAnnotation {
    pub fn new(block: Block) -> Self {
        Self {
            block,
            ..Default::default()
        }
    }

    pub fn merge(&mut self, other: &FuncAnnotation) {
        if self.name.is_empty() {
            self.name = other.name.clone();
        }
        if self.owner_type.is_none() {
            self.owner_type = other.owner_type.clone();
        }
        self.closure |= other.closure;
        self.changed |= other.changed;
        self.first_line_excluded |= other.first_line_excluded;
        self.labels.extend(other.labels.iter().cloned());
        self.exec_labels.extend(other.exec_labels.iter().cloned());
        merge_flags(&mut self.coverage_labels, &other.coverage_labels);
        merge_code(&mut self.code, &other.code);
    }

    pub fn code_excluded(&self) -> bool {
        self.code.as_ref().is_some_and(|c| c.excluded)
    }
}

fn merge_flags(dst: &mut BTreeMap<String, bool>, src: &BTreeMap<String, bool>) {
    for (label, value) in src {
        *dst.entry(label.clone()).or_default() |= *value;
    }
}

fn merge_code(dst: &mut Option<CodeAnnotation>, src: &Option<CodeAnnotation>) {
    match (dst.as_mut(), src) {
        (Some(d), Some(s)) => d.merge(s),
        (None, Some(s)) => *dst = Some(s.clone()),
        (_, None) => {}
    }
}

/// How a file changed between the compared versions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDetail {
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_new: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed_from: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub content_changed: bool,
}

impl ChangeDetail {
    pub fn new_file() -> Self {
        Self {
            is_new: true,
            content_changed: true,
            ..Default::default()
        }
    }

    pub fn modified() -> Self {
        Self {
            content_changed: true,
            ..Default::default()
        }
    }

    pub fn renamed(from: impl Into<String>, content_changed: bool) -> Self {
        Self {
            renamed_from: Some(from.into()),
            content_changed,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnnotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_detail: Option<ChangeDetail>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub lines: BTreeMap<LineNum, LineAnnotation>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<BlockId, BlockAnnotation>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub funcs: BTreeMap<FuncId, FuncAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_changes: Option<LineChanges>,
}

impl FileAnnotation {
    pub fn line_mut(&mut self, line: LineNum) -> &mut LineAnnotation {
        self.lines.entry(line).or_default()
    }

    /// Whether the whole file counts as changed
    pub fn is_new(&self) -> bool {
        self.change_detail.as_ref().is_some_and(|d| d.is_new)
    }

    pub fn merge(&mut self, other: &FileAnnotation) {
        if self.change_detail.is_none() {
            self.change_detail = other.change_detail.clone();
        }
        if self.line_changes.is_none() {
            self.line_changes = other.line_changes.clone();
        }
        for (n, line) in &other.lines {
            self.lines
                .entry(*n)
                .and_modify(|l| l.merge(line))
                .or_insert_with(|| line.clone());
        }
        for (id, block) in &other.blocks {
            self.blocks
                .entry(id.clone())
                .and_modify(|b| b.merge(block))
                .or_insert_with(|| block.clone());
        }
        for (id, func) in &other.funcs {
            self.funcs
                .entry(id.clone())
                .and_modify(|f| f.merge(func))
                .or_insert_with(|| func.clone());
        }
    }

    pub fn simplify(&mut self) {
        self.lines.retain(|_, line| !line.is_default());
    }

    pub fn is_default(&self) -> bool {
        *self == FileAnnotation::default()
    }
}

/// Annotations of every file in a project, plus the kinds computed so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectAnnotation {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, FileAnnotation>,
    #[serde(default, skip_serializing_if = "AnnotationTypes::is_empty")]
    pub types: AnnotationTypes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl ProjectAnnotation {
    pub fn new() -> Self {
        Self::default()
    }

    /// An annotation that declares the given kinds as present
    pub fn with_types(types: &[AnnotationType]) -> Self {
        Self {
            types: types.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn file_mut(&mut self, path: &str) -> &mut FileAnnotation {
        self.files.entry(path.to_string()).or_default()
    }

    pub fn has(&self, t: AnnotationType) -> bool {
        self.types.has(t)
    }

    pub fn set(&mut self, t: AnnotationType) {
        self.types.insert(t);
    }

    pub fn require(&self, operation: &str, required: &[AnnotationType]) -> Result<()> {
        self.types.require(operation, required)
    }

    /// Drop default line entries and files that carry nothing
    pub fn simplify(&mut self) {
        for file in self.files.values_mut() {
            file.simplify();
        }
        self.files.retain(|_, file| !file.is_default());
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
