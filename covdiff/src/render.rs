//! Table rendering for CLI output

use std::collections::BTreeMap;

use console::Style;
use covdifflib::diff::{LineRange, RangeKind};
use covdifflib::summary::{Granularity, Item, Summary};

const NAME_WIDTH: usize = 24;
const CELL_WIDTH: usize = 18;

/// Truncate a name to fit within max_len, adding ".." prefix if needed
fn truncate_name(name: &str, max_len: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() > max_len {
        let tail: String = chars[chars.len() - (max_len - 2)..].iter().collect();
        format!("..{}", tail)
    } else {
        name.to_string()
    }
}

fn label_name(label: &str) -> &str {
    if label.is_empty() {
        "(all)"
    } else {
        label
    }
}

fn value_style(value: f64) -> Style {
    if value >= 0.8 {
        Style::new().green()
    } else if value >= 0.5 {
        Style::new().yellow()
    } else {
        Style::new().red()
    }
}

/// `covered/total (pct%)`, padded and colored by percentage
fn format_item(item: &Item) -> String {
    let text = format!(
        "{}/{} ({:.2}%)",
        item.covered,
        item.total,
        item.value * 100.0
    );
    let padded = format!("{:>width$}", text, width = CELL_WIDTH);
    value_style(item.value).apply_to(padded).to_string()
}

fn header(columns: &[&str]) -> String {
    let bold = Style::new().bold();
    let mut out = format!("{:<width$}", "Label", width = NAME_WIDTH);
    for column in columns {
        out.push_str(&format!(" {:>width$}", column, width = CELL_WIDTH));
    }
    let separator = "-".repeat(NAME_WIDTH + (CELL_WIDTH + 1) * columns.len());
    format!("{}\n{}\n", bold.apply_to(out), separator)
}

/// One row per label with line (and function, when present) coverage
pub fn render_summary(summaries: &BTreeMap<String, Summary>, show_uncovered: bool) -> String {
    let with_funcs = summaries
        .values()
        .any(|s| s.details.contains_key(&Granularity::Func));
    let mut columns = vec!["Lines", "Changed lines"];
    if with_funcs {
        columns.extend(["Funcs", "Changed funcs"]);
    }

    let mut out = header(&columns);
    for (label, summary) in summaries {
        let name = truncate_name(label_name(label), NAME_WIDTH - 2);
        out.push_str(&format!("{:<width$}", name, width = NAME_WIDTH));
        out.push_str(&format!(" {}", format_item(&summary.detail.total)));
        out.push_str(&format!(" {}", format_item(&summary.detail.incremental)));
        if let Some(func) = summary.details.get(&Granularity::Func) {
            out.push_str(&format!(" {}", format_item(&func.total)));
            out.push_str(&format!(" {}", format_item(&func.incremental)));
        }
        out.push('\n');
    }

    if show_uncovered {
        let dim = Style::new().dim();
        for (label, summary) in summaries {
            let Some(list) = &summary.detail.incremental.uncovered_list else {
                continue;
            };
            out.push_str(&format!(
                "\nUncovered changed lines for {}:\n",
                Style::new().bold().apply_to(label_name(label))
            ));
            for item in list {
                let location = format!("{}:{}", item.file, item.line);
                out.push_str(&format!("  {}\n", dim.apply_to(location)));
            }
        }
    }
    out
}

fn kind_style(kind: RangeKind) -> Style {
    match kind {
        RangeKind::Unchanged => Style::new().dim(),
        RangeKind::Updated => Style::new().yellow(),
        RangeKind::Inserted => Style::new().green(),
        RangeKind::Deleted => Style::new().red(),
    }
}

fn kind_name(kind: RangeKind) -> &'static str {
    match kind {
        RangeKind::Unchanged => "unchanged",
        RangeKind::Updated => "updated",
        RangeKind::Inserted => "inserted",
        RangeKind::Deleted => "deleted",
    }
}

/// Half-open 1-based range as an inclusive span, `-` when empty
fn span(start: usize, end: usize) -> String {
    match end.saturating_sub(start) {
        0 => "-".to_string(),
        1 => start.to_string(),
        _ => format!("{}-{}", start, end - 1),
    }
}

/// One row per range of a line mapping
pub fn render_ranges(ranges: &[LineRange]) -> String {
    let bold = Style::new().bold();
    let mut out = format!(
        "{}\n{}\n",
        bold.apply_to(format!("{:<10} {:>12} {:>12}", "Kind", "Old", "New")),
        "-".repeat(36)
    );
    for range in ranges {
        let kind = format!("{:<10}", kind_name(range.kind));
        out.push_str(&format!(
            "{} {:>12} {:>12}\n",
            kind_style(range.kind).apply_to(kind),
            span(range.old_start, range.old_end),
            span(range.new_start, range.new_end)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("short", 10), "short");
        assert_eq!(truncate_name("a/very/long/path.go", 10), "../path.go");
    }

    #[test]
    fn test_span() {
        assert_eq!(span(3, 3), "-");
        assert_eq!(span(3, 4), "3");
        assert_eq!(span(3, 6), "3-5");
    }
}
