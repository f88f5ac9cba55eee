//! Labels: manual marks, executions and the per-label coverage flags
//! derived from them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::annotation::{AnnotationType, CommentLabel, ProjectAnnotation};
use crate::blocks::FuncId;
use crate::Result;

/// How a label decides whether a line was executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Only executions under the label itself (or its aliases) count
    #[default]
    Exact,
    /// An execution under any label counts
    Any,
}

/// Per-label configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelOption {
    /// Name used in summaries instead of the label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Labels that stand in for this one, both as marks and as executions
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub aliases: BTreeSet<String>,
    pub match_mode: MatchMode,
}

impl LabelOption {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into());
        self
    }

    pub fn match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }
}

/// Label configuration keyed by label name
pub type LabelOptions = BTreeMap<String, LabelOption>;

fn has_mark(labels: &BTreeSet<String>, label: &str, option: Option<&LabelOption>) -> bool {
    if label.is_empty() {
        return true;
    }
    match option {
        Some(opt) if !opt.aliases.is_empty() => opt.aliases.iter().any(|a| labels.contains(a)),
        _ => labels.contains(label),
    }
}

fn has_exec(exec_labels: &BTreeSet<String>, label: &str, option: Option<&LabelOption>) -> bool {
    match option {
        Some(opt) if opt.match_mode == MatchMode::Any => !exec_labels.is_empty(),
        Some(opt) if !opt.aliases.is_empty() => {
            opt.aliases.iter().any(|a| exec_labels.contains(a))
        }
        _ => exec_labels.contains(label),
    }
}

/// Every label a coverage flag may be computed for: the default label, every
/// manual mark on a line and every configured label
fn label_universe(p: &ProjectAnnotation, options: &LabelOptions) -> BTreeSet<String> {
    let mut labels: BTreeSet<String> = BTreeSet::new();
    labels.insert(String::new());
    for file in p.files.values() {
        for line in file.lines.values() {
            labels.extend(line.labels.iter().filter(|l| !l.is_empty()).cloned());
        }
    }
    labels.extend(options.keys().cloned());
    labels
}

/// Set `coverage_labels[L]` on every line marked for `L`, true when the
/// line was executed under `L`
pub fn coverage_labels_for_line(p: &mut ProjectAnnotation, options: &LabelOptions) -> Result<()> {
    p.require("coverage_labels_for_line", &[AnnotationType::LineExecLabels])?;
    let universe = label_universe(p, options);
    for file in p.files.values_mut() {
        for line in file.lines.values_mut() {
            for label in &universe {
                let option = options.get(label);
                if has_mark(&line.labels, label, option) {
                    let executed = has_exec(&line.exec_labels, label, option);
                    line.coverage_labels.insert(label.clone(), executed);
                }
            }
        }
    }
    p.set(AnnotationType::LineCoverageLabels);
    Ok(())
}

/// Union labels and exec labels, and OR coverage flags, of each function's lines
pub fn labels_line_to_func(p: &mut ProjectAnnotation) -> Result<()> {
    p.require(
        "labels_line_to_func",
        &[
            AnnotationType::LineFuncId,
            AnnotationType::LineExecLabels,
            AnnotationType::LineCoverageLabels,
        ],
    )?;
    for file in p.files.values_mut() {
        for line in file.lines.values() {
            let Some(func) = line.func_id.as_ref().and_then(|id| file.funcs.get_mut(id)) else {
                continue;
            };
            func.labels.extend(line.labels.iter().cloned());
            func.exec_labels.extend(line.exec_labels.iter().cloned());
            for (label, covered) in &line.coverage_labels {
                *func.coverage_labels.entry(label.clone()).or_default() |= *covered;
            }
        }
    }
    p.set(AnnotationType::FuncLabels);
    p.set(AnnotationType::FuncExecLabels);
    p.set(AnnotationType::FuncCoverageLabels);
    Ok(())
}

/// Copy `labels` directives above a function onto the function and every
/// line it spans
pub fn labels_from_comments(p: &mut ProjectAnnotation) -> Result<()> {
    p.require(
        "labels_from_comments",
        &[AnnotationType::FuncCodeComments, AnnotationType::FileFuncs],
    )?;
    for file in p.files.values_mut() {
        let marked: Vec<(FuncId, Vec<String>)> = file
            .funcs
            .iter()
            .filter_map(|(id, func)| {
                let comment = func.code.as_ref()?.comments.get(&CommentLabel::Labels)?;
                Some((id.clone(), comment.values.clone()))
            })
            .collect();
        for (id, values) in marked {
            let Some(func) = file.funcs.get_mut(&id) else {
                continue;
            };
            func.labels.extend(values.iter().cloned());
            let block = func.block;
            for n in block.lines() {
                file.line_mut(n).labels.extend(values.iter().cloned());
            }
        }
    }
    p.set(AnnotationType::LineLabels);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{CodeAnnotation, CodeComment, FuncAnnotation, LineAnnotation};
    use crate::blocks::Block;
    use proptest::prelude::*;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn project(lines: Vec<LineAnnotation>) -> ProjectAnnotation {
        let mut p = ProjectAnnotation::with_types(&[AnnotationType::LineExecLabels]);
        let file = p.file_mut("a.go");
        for (i, line) in lines.into_iter().enumerate() {
            file.lines.insert(i as u32 + 1, line);
        }
        p
    }

    #[test]
    fn test_default_label_always_marked() {
        let mut p = project(vec![
            LineAnnotation {
                exec_labels: set(&[""]),
                ..Default::default()
            },
            LineAnnotation::default(),
        ]);
        coverage_labels_for_line(&mut p, &LabelOptions::new()).unwrap();
        let lines = &p.files["a.go"].lines;
        assert_eq!(lines[&1].coverage_labels, BTreeMap::from([(String::new(), true)]));
        assert_eq!(lines[&2].coverage_labels, BTreeMap::from([(String::new(), false)]));
    }

    #[test]
    fn test_marked_label_needs_matching_execution() {
        let mut p = project(vec![
            LineAnnotation {
                labels: set(&["smoke"]),
                exec_labels: set(&["smoke"]),
                ..Default::default()
            },
            LineAnnotation {
                labels: set(&["smoke"]),
                exec_labels: set(&["nightly"]),
                ..Default::default()
            },
            LineAnnotation {
                exec_labels: set(&["smoke"]),
                ..Default::default()
            },
        ]);
        coverage_labels_for_line(&mut p, &LabelOptions::new()).unwrap();
        let lines = &p.files["a.go"].lines;
        assert_eq!(lines[&1].coverage_labels.get("smoke"), Some(&true));
        assert_eq!(lines[&2].coverage_labels.get("smoke"), Some(&false));
        assert_eq!(lines[&3].coverage_labels.get("smoke"), None);
    }

    #[test]
    fn test_any_match_mode_and_aliases() {
        let mut options = LabelOptions::new();
        options.insert("any".into(), LabelOption::new().match_mode(MatchMode::Any));
        options.insert("rc".into(), LabelOption::new().alias("release").alias("staging"));

        let mut p = project(vec![
            LineAnnotation {
                labels: set(&["any"]),
                exec_labels: set(&["whatever"]),
                ..Default::default()
            },
            LineAnnotation {
                labels: set(&["staging"]),
                exec_labels: set(&["release"]),
                ..Default::default()
            },
            LineAnnotation {
                labels: set(&["rc"]),
                exec_labels: set(&["rc"]),
                ..Default::default()
            },
        ]);
        coverage_labels_for_line(&mut p, &options).unwrap();
        let lines = &p.files["a.go"].lines;
        assert_eq!(lines[&1].coverage_labels.get("any"), Some(&true));
        assert_eq!(lines[&2].coverage_labels.get("rc"), Some(&true));
        // with aliases configured the label itself is no longer a mark
        assert_eq!(lines[&3].coverage_labels.get("rc"), None);
    }

    #[test]
    fn test_label_options_from_json() {
        let options: LabelOptions = serde_json::from_str(
            r#"{"rc": {"displayName": "Release", "aliases": ["release"]}, "any": {"matchMode": "any"}}"#,
        )
        .unwrap();
        assert_eq!(options["rc"].display_name.as_deref(), Some("Release"));
        assert_eq!(options["any"].match_mode, MatchMode::Any);
        assert_eq!(options["rc"].match_mode, MatchMode::Exact);
    }

    #[test]
    fn test_labels_line_to_func() {
        let f = Block::new(1, 1, 3, 2);
        let mut p = ProjectAnnotation::with_types(&[
            AnnotationType::LineFuncId,
            AnnotationType::LineExecLabels,
            AnnotationType::LineCoverageLabels,
        ]);
        let file = p.file_mut("a.go");
        file.funcs.insert(f.id(), FuncAnnotation::new(f));
        file.lines.insert(
            1,
            LineAnnotation {
                func_id: Some(f.id()),
                exec_labels: set(&["x"]),
                coverage_labels: [(String::new(), false)].into(),
                ..Default::default()
            },
        );
        file.lines.insert(
            2,
            LineAnnotation {
                func_id: Some(f.id()),
                labels: set(&["y"]),
                coverage_labels: [(String::new(), true)].into(),
                ..Default::default()
            },
        );
        labels_line_to_func(&mut p).unwrap();

        let func = &p.files["a.go"].funcs[&f.id()];
        assert_eq!(func.exec_labels, set(&["x"]));
        assert_eq!(func.labels, set(&["y"]));
        assert!(func.coverage_labels[""]);
        assert!(p.has(AnnotationType::FuncCoverageLabels));
    }

    #[test]
    fn test_labels_from_func_comments() {
        let f = Block::new(2, 1, 4, 2);
        let mut p = ProjectAnnotation::with_types(&[
            AnnotationType::FileFuncs,
            AnnotationType::FuncCodeComments,
        ]);
        let mut func = FuncAnnotation::new(f);
        let mut code = CodeAnnotation::default();
        code.comments.insert(
            CommentLabel::Labels,
            CodeComment {
                author: String::new(),
                values: vec!["smoke".into()],
            },
        );
        func.code = Some(code);
        p.file_mut("a.go").funcs.insert(f.id(), func);

        labels_from_comments(&mut p).unwrap();
        let file = &p.files["a.go"];
        assert_eq!(file.lines.len(), 3);
        assert!(file.lines.values().all(|l| l.labels.contains("smoke")));
        assert!(file.funcs[&f.id()].labels.contains("smoke"));
    }

    fn arb_labels() -> impl Strategy<Value = BTreeSet<String>> {
        prop::collection::btree_set("[a-c]", 0..3)
    }

    proptest! {
        #[test]
        fn prop_adding_exec_label_never_uncovers(
            marks in arb_labels(),
            execs in arb_labels(),
            extra in "[a-d]",
        ) {
            let before_line = LineAnnotation {
                labels: marks.clone(),
                exec_labels: execs.clone(),
                ..Default::default()
            };
            let mut after_line = before_line.clone();
            after_line.exec_labels.insert(extra.clone());

            let mut before = project(vec![before_line]);
            let mut after = project(vec![after_line]);
            coverage_labels_for_line(&mut before, &LabelOptions::new()).unwrap();
            coverage_labels_for_line(&mut after, &LabelOptions::new()).unwrap();

            let b = &before.files["a.go"].lines[&1].coverage_labels;
            let a = &after.files["a.go"].lines[&1].coverage_labels;
            for (label, covered) in b {
                if *covered {
                    prop_assert_eq!(a.get(label), Some(&true));
                }
                if *label != extra {
                    prop_assert_eq!(a.get(label), Some(covered));
                }
            }
        }
    }
}
