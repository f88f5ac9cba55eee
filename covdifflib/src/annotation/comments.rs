//! Coverage directives written as source comments.
//!
//! ```text
//! // labels(alice): smoke, nightly
//! // nocov: generated code
//! // unreachable
//! ```
//!
//! A directive needs at least one blank after `//`. Only `labels` takes
//! comma-separated values; the text after the colon of other properties is
//! a free-form reason and is dropped.

use std::collections::BTreeMap;

use crate::annotation::model::{CodeAnnotation, CodeComment, CommentLabel, LineNum};
use crate::blocks::{FuncId, FuncInfo};

/// A parsed directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub label: CommentLabel,
    pub author: String,
    pub values: Vec<String>,
}

/// Parse the text that follows `//`
pub fn parse_directive(text: &str) -> Option<Directive> {
    if !text.starts_with([' ', '\t']) {
        return None;
    }
    let line = text.trim();

    let paren = line.find('(');
    let colon = line.find(':');
    let space = line.find(' ');

    let mut author = String::new();
    if let Some(p) = paren {
        if colon.map_or(true, |c| p < c) {
            let rest = match colon {
                Some(c) => &line[p + 1..c],
                None => &line[p + 1..],
            };
            if let Some(close) = rest.find(')') {
                author = rest[..close].trim().to_string();
            }
        }
    }

    let prop_end = [paren, colon, space]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(line.len());
    let label: CommentLabel = line[..prop_end].trim().to_lowercase().parse().ok()?;

    let values = match colon {
        Some(c) if label.takes_values() => line[c + 1..]
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    Some(Directive {
        label,
        author,
        values,
    })
}

fn add_directive(code: &mut CodeAnnotation, d: Directive) {
    code.comments
        .entry(d.label)
        .or_default()
        .merge(&CodeComment {
            author: d.author,
            values: d.values,
        });
}

/// Directives in the `//` comment run directly above each function header.
///
/// Functions without directives are left out.
pub fn func_comments(content: &str, funcs: &[FuncInfo]) -> BTreeMap<FuncId, CodeAnnotation> {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut result = BTreeMap::new();

    for func in funcs {
        let header = func.block.start_line as usize;
        let mut code = CodeAnnotation::default();
        // header is 1-based, so header - 2 is the line just above it
        for idx in (0..header.saturating_sub(1)).rev() {
            let Some(text) = lines.get(idx).map(|l| l.trim()) else {
                continue;
            };
            let Some(body) = text.strip_prefix("//") else {
                break;
            };
            if let Some(d) = parse_directive(body) {
                add_directive(&mut code, d);
            }
        }
        if !code.comments.is_empty() {
            result.insert(func.block.id(), code);
        }
    }
    result
}

/// Directives in trailing comments after code on the same line
pub fn line_comments(content: &str) -> BTreeMap<LineNum, CodeAnnotation> {
    let mut result = BTreeMap::new();
    for (idx, line) in content.split('\n').enumerate() {
        let Some(pos) = line.find("//") else {
            continue;
        };
        if line[..pos].trim().is_empty() {
            continue;
        }
        if let Some(d) = parse_directive(&line[pos + 2..]) {
            let code: &mut CodeAnnotation = result.entry((idx + 1) as LineNum).or_default();
            add_directive(code, d);
        }
    }
    for code in result.values_mut() {
        code.excluded = code.has_exclusion_comment();
    }
    result
}
