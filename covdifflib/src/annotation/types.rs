//! The set of annotation kinds already computed on a project.
//!
//! Every derivation names the kinds it needs with [`AnnotationTypes::require`]
//! and records the kind it produced with [`AnnotationTypes::insert`]. The set
//! is the only thing that orders pipeline stages.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CovdiffError;
use crate::Result;

/// A derived or loaded annotation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationType {
    Blocks,
    ChangeDetail,
    LineEmpty,
    LineBlockId,
    LineFuncId,
    LineChanges,
    LineChanged,
    LineOldLine,
    LineLabels,
    LineExecLabels,
    LineCoverageLabels,
    LineUncoverable,
    LineCodeExcluded,
    LineRemark,
    #[serde(rename = "funcs")]
    FileFuncs,
    FuncLabels,
    FuncExecLabels,
    FuncCoverageLabels,
    FuncChanged,
    FuncCodeComments,
    FuncCodeExcluded,
}

impl AnnotationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationType::Blocks => "blocks",
            AnnotationType::ChangeDetail => "change_detail",
            AnnotationType::LineEmpty => "line_empty",
            AnnotationType::LineBlockId => "line_block_id",
            AnnotationType::LineFuncId => "line_func_id",
            AnnotationType::LineChanges => "line_changes",
            AnnotationType::LineChanged => "line_changed",
            AnnotationType::LineOldLine => "line_old_line",
            AnnotationType::LineLabels => "line_labels",
            AnnotationType::LineExecLabels => "line_exec_labels",
            AnnotationType::LineCoverageLabels => "line_coverage_labels",
            AnnotationType::LineUncoverable => "line_uncoverable",
            AnnotationType::LineCodeExcluded => "line_code_excluded",
            AnnotationType::LineRemark => "line_remark",
            AnnotationType::FileFuncs => "funcs",
            AnnotationType::FuncLabels => "func_labels",
            AnnotationType::FuncExecLabels => "func_exec_labels",
            AnnotationType::FuncCoverageLabels => "func_coverage_labels",
            AnnotationType::FuncChanged => "func_changed",
            AnnotationType::FuncCodeComments => "func_code_comments",
            AnnotationType::FuncCodeExcluded => "func_code_excluded",
        }
    }
}

impl fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationTypes(BTreeSet<AnnotationType>);

impl AnnotationTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, t: AnnotationType) -> bool {
        self.0.contains(&t)
    }

    pub fn insert(&mut self, t: AnnotationType) {
        self.0.insert(t);
    }

    pub fn remove(&mut self, t: AnnotationType) {
        self.0.remove(&t);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = AnnotationType> + '_ {
        self.0.iter().copied()
    }

    pub fn union_with(&mut self, other: &AnnotationTypes) {
        self.0.extend(other.0.iter().copied());
    }

    /// Fail with every kind from `required` that is not present yet
    pub fn require(&self, operation: &str, required: &[AnnotationType]) -> Result<()> {
        let missing: Vec<String> = required
            .iter()
            .filter(|t| !self.has(**t))
            .map(|t| t.as_str().to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CovdiffError::MissingAnnotations {
                operation: operation.to_string(),
                missing,
            })
        }
    }
}

impl FromIterator<AnnotationType> for AnnotationTypes {
    fn from_iter<I: IntoIterator<Item = AnnotationType>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
