//! Per-label coverage summaries.
//!
//! [`summarize`] first runs whatever derivations the project is still
//! missing, in dependency order, then counts covered lines (and functions)
//! per label over the whole tree and over the changed part of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::annotation::{AnnotationType, FileAnnotation, LineAnnotation, ProjectAnnotation};
use crate::compute::{self, LabelOptions};
use crate::Result;

/// Unit a [`Detail`] was counted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Line,
    Func,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncoveredItem {
    pub file: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub func: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub covered: u64,
    pub total: u64,
    /// `covered / total` rounded to 4 decimals, 1.0 for an empty item
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncovered_list: Option<Vec<UncoveredItem>>,
}

impl Item {
    fn record(&mut self, covered: bool, uncovered: Option<&UncoveredItem>) {
        self.total += 1;
        if covered {
            self.covered += 1;
        } else if let Some(item) = uncovered {
            self.uncovered_list
                .get_or_insert_with(Vec::new)
                .push(item.clone());
        }
    }

    fn update_value(&mut self) {
        self.value = ratio(self.covered, self.total);
    }
}

/// Coverage of the whole tree and of its changed part
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detail {
    pub total: Item,
    pub incremental: Item,
}

impl Detail {
    fn record(&mut self, covered: bool, changed: bool, uncovered: Option<UncoveredItem>) {
        let uncovered = uncovered.as_ref();
        self.total.record(covered, uncovered);
        if changed {
            self.incremental.record(covered, uncovered);
        }
    }

    fn update_values(&mut self) {
        self.total.update_value();
        self.incremental.update_value();
    }
}

/// Summary of one label. `detail` is the line detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub detail: Detail,
    pub details: BTreeMap<Granularity, Detail>,
}

/// Options for [`summarize`]
#[derive(Debug, Clone, Default)]
pub struct SummaryOptions {
    pub labels: LabelOptions,
    /// Skip function level derivations and counts
    pub disable_func: bool,
    /// Collect the uncovered lines and functions of every item
    pub need_uncovered_list: bool,
}

impl SummaryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(mut self, labels: LabelOptions) -> Self {
        self.labels = labels;
        self
    }

    pub fn disable_func(mut self, disable: bool) -> Self {
        self.disable_func = disable;
        self
    }

    pub fn need_uncovered_list(mut self, need: bool) -> Self {
        self.need_uncovered_list = need;
        self
    }
}

fn ratio(covered: u64, total: u64) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (covered as f64 / total as f64 * 10000.0).round() / 10000.0
}

/// Summaries keyed by label, or by its display name when one is configured.
///
/// Lines that are uncoverable, code-excluded or excluded by a remark are not
/// counted, neither are excluded functions.
pub fn summarize(
    p: &mut ProjectAnnotation,
    options: &SummaryOptions,
) -> Result<BTreeMap<String, Summary>> {
    prepare(p, options)?;

    let lines = line_details(p, options.need_uncovered_list);
    let mut funcs = if options.disable_func {
        BTreeMap::new()
    } else {
        func_details(p, options.need_uncovered_list)
    };

    let mut summaries = BTreeMap::new();
    for (label, mut line_detail) in lines {
        line_detail.update_values();
        let name = options
            .labels
            .get(&label)
            .and_then(|o| o.display_name.clone())
            .unwrap_or_else(|| label.clone());
        let mut details = BTreeMap::from([(Granularity::Line, line_detail.clone())]);
        if let Some(mut func_detail) = funcs.remove(&label) {
            func_detail.update_values();
            details.insert(Granularity::Func, func_detail);
        }
        summaries.insert(
            name,
            Summary {
                detail: line_detail,
                details,
            },
        );
    }
    info!(labels = summaries.len(), "summarized coverage");
    Ok(summaries)
}

/// Run each missing derivation the counts depend on
fn prepare(p: &mut ProjectAnnotation, options: &SummaryOptions) -> Result<()> {
    use AnnotationType::*;

    if !p.has(LineBlockId) && p.has(Blocks) {
        compute::block_id_for_line(p)?;
    }
    if !p.has(LineFuncId) && p.has(FileFuncs) {
        compute::func_id_for_line(p)?;
    }
    if !p.has(LineChanged) && p.has(LineChanges) {
        compute::changed_for_line_from_changes(p)?;
    }
    if !p.has(FuncChanged) && p.has(LineChanged) && p.has(LineFuncId) {
        compute::changed_line_to_func(p)?;
    }

    if !p.has(LineCoverageLabels) {
        if !p.has(LineExecLabels) && p.has(Blocks) {
            compute::exec_labels_block_to_line(p)?;
        }
        compute::coverage_labels_for_line(p, &options.labels)?;
    }
    if !options.disable_func && p.has(FileFuncs) && !p.has(FuncCoverageLabels) {
        compute::labels_line_to_func(p)?;
    }

    if !p.has(LineUncoverable) {
        compute::uncoverable_for_line(p)?;
    }
    if !options.disable_func {
        if !p.has(FuncCodeExcluded) && p.has(FuncCodeComments) {
            compute::code_excluded_for_func(p)?;
        }
        if !p.has(LineCodeExcluded) && p.has(FuncCodeExcluded) && p.has(LineFuncId) {
            compute::code_excluded_func_to_line(p)?;
        }
    }
    Ok(())
}

fn line_skipped(line: &LineAnnotation) -> bool {
    line.uncoverable || line.code_excluded() || line.remark_excluded()
}

fn line_changed(file: &FileAnnotation, line: &LineAnnotation) -> bool {
    file.is_new() || line.changed
}

fn line_details(p: &ProjectAnnotation, need_uncovered: bool) -> BTreeMap<String, Detail> {
    let mut details: BTreeMap<String, Detail> = BTreeMap::new();
    for (path, file) in &p.files {
        for (n, line) in &file.lines {
            if line_skipped(line) {
                continue;
            }
            let changed = line_changed(file, line);
            for (label, covered) in &line.coverage_labels {
                let uncovered = (need_uncovered && !covered).then(|| UncoveredItem {
                    file: path.clone(),
                    line: *n,
                    func: String::new(),
                });
                details
                    .entry(label.clone())
                    .or_default()
                    .record(*covered, changed, uncovered);
            }
        }
    }
    details
}

fn func_details(p: &ProjectAnnotation, need_uncovered: bool) -> BTreeMap<String, Detail> {
    let has_changes = p.has(AnnotationType::ChangeDetail);
    let mut details: BTreeMap<String, Detail> = BTreeMap::new();
    for (path, file) in &p.files {
        for func in file.funcs.values() {
            if func.code_excluded() || func.first_line_excluded {
                debug!(file = %path, func = %func.name, "skipping excluded function");
                continue;
            }
            let changed = has_changes && (file.is_new() || func.changed);
            for (label, covered) in &func.coverage_labels {
                let uncovered = (need_uncovered && !covered).then(|| UncoveredItem {
                    file: path.clone(),
                    line: func.block.start_line,
                    func: func.name.clone(),
                });
                details
                    .entry(label.clone())
                    .or_default()
                    .record(*covered, changed, uncovered);
            }
        }
    }
    details
}
