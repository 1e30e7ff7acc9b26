//! Human-readable and JSON rendering of reconciliation and key reports.

use std::{borrow::Cow, fmt::Write as _};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::{
    cli::ReportFormat,
    diff::RowComparison,
    keys::{KeyCheck, KeyReport},
    normalize::NormalizedValue,
    reconcile::{ReconciliationResult, ValueOverlap},
};

const NONE: &str = "(none)";
const VALUE_SAMPLE: usize = 10;

/// Renders `result` in `format`, followed by any requested value overlaps.
/// `limit` caps the number of differing rows printed by the table format;
/// JSON output always carries the full result.
pub fn render(
    result: &ReconciliationResult,
    overlaps: &[ValueOverlap],
    format: ReportFormat,
    limit: Option<usize>,
) -> Result<String> {
    match format {
        ReportFormat::Json if overlaps.is_empty() => to_json(result),
        ReportFormat::Json => {
            #[derive(Serialize)]
            struct CompareOutput<'a> {
                #[serde(flatten)]
                result: &'a ReconciliationResult,
                value_overlap: &'a [ValueOverlap],
            }
            to_json(&CompareOutput {
                result,
                value_overlap: overlaps,
            })
        }
        ReportFormat::Table => {
            let mut out = render_result_table(result, limit);
            for overlap in overlaps {
                write_value_overlap(&mut out, overlap);
            }
            Ok(out)
        }
    }
}

pub fn render_keys(
    report: &KeyReport,
    check: Option<&KeyCheck>,
    format: ReportFormat,
) -> Result<String> {
    match format {
        ReportFormat::Json => {
            #[derive(Serialize)]
            struct KeysOutput<'a> {
                #[serde(flatten)]
                report: &'a KeyReport,
                #[serde(skip_serializing_if = "Option::is_none")]
                check: Option<&'a KeyCheck>,
            }
            to_json(&KeysOutput { report, check })
        }
        ReportFormat::Table => Ok(render_keys_table(report, check)),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    let mut json = serde_json::to_string_pretty(value).context("Serializing report to JSON")?;
    json.push('\n');
    Ok(json)
}

fn render_result_table(result: &ReconciliationResult, limit: Option<usize>) -> String {
    let mut out = String::new();
    let key_names = result
        .strategy
        .fields()
        .iter()
        .map(|k| {
            if k.left == k.right {
                k.left.clone()
            } else {
                format!("{}={}", k.left, k.right)
            }
        })
        .collect::<Vec<_>>();
    if key_names.is_empty() || result.strategy.is_content_hash() {
        let _ = writeln!(out, "Matched by: {}", result.strategy.describe());
    } else {
        let _ = writeln!(
            out,
            "Matched by: {} ({})",
            result.strategy.describe(),
            key_names.join(", ")
        );
    }
    let _ = writeln!(
        out,
        "Rows: left {}, right {}",
        result.left_rows, result.right_rows
    );
    let _ = writeln!(
        out,
        "Matched: {}  Identical: {}  Differing: {}  Filtered: {}",
        result.matched,
        result.identical.len(),
        result.differing.len(),
        result.filtered
    );
    let _ = writeln!(
        out,
        "Left only: {}  Right only: {}",
        result.left_only, result.right_only
    );
    write_row_list(&mut out, "Left-only rows", &result.left_only_rows, limit);
    write_row_list(&mut out, "Right-only rows", &result.right_only_rows, limit);
    if result.surplus_left_duplicates > 0 || result.surplus_right_duplicates > 0 {
        let _ = writeln!(
            out,
            "Surplus duplicates: left {}, right {}",
            result.surplus_left_duplicates, result.surplus_right_duplicates
        );
    }

    out.push('\n');
    let mapping_rows = result
        .mapping
        .pairs()
        .iter()
        .map(|p| vec![p.left.clone(), p.right.clone(), format!("{:.2}", p.score)])
        .collect::<Vec<_>>();
    out.push_str(&grid(&["left", "right", "score"], &mapping_rows));
    let _ = writeln!(out, "Left-only fields: {}", list_or_none(&result.left_only_fields));
    let _ = writeln!(out, "Right-only fields: {}", list_or_none(&result.right_only_fields));

    if result.differing.is_empty() {
        return out;
    }
    let shown = limit.unwrap_or(usize::MAX).min(result.differing.len());
    for comparison in &result.differing[..shown] {
        out.push('\n');
        write_comparison(&mut out, comparison);
    }
    if shown < result.differing.len() {
        let _ = writeln!(
            out,
            "\n... {} more differing row(s) not shown",
            result.differing.len() - shown
        );
    }
    out
}

/// Lists 1-based row numbers, capped at `limit` entries.
fn write_row_list(out: &mut String, label: &str, rows: &[usize], limit: Option<usize>) {
    if rows.is_empty() {
        return;
    }
    let shown = limit.unwrap_or(usize::MAX).min(rows.len());
    let mut numbers = rows[..shown]
        .iter()
        .map(|idx| (idx + 1).to_string())
        .collect::<Vec<_>>();
    if shown < rows.len() {
        numbers.push(format!("... (+{})", rows.len() - shown));
    }
    let _ = writeln!(out, "{label}: {}", numbers.join(", "));
}

fn write_comparison(out: &mut String, comparison: &RowComparison) {
    let placement = match (comparison.left_row, comparison.right_row) {
        (Some(_), None) => " (left only)".to_string(),
        (None, Some(_)) => " (right only)".to_string(),
        _ => String::new(),
    };
    let _ = writeln!(
        out,
        "[{}]{} similarity {:.2} ({}/{} fields equal)",
        comparison.identity,
        placement,
        comparison.similarity,
        comparison.equal_count,
        comparison.compared_count
    );
    let rows = comparison
        .differences()
        .map(|d| vec![d.field.clone(), d.left.to_string(), d.right.to_string()])
        .collect::<Vec<_>>();
    if !rows.is_empty() {
        out.push_str(&grid(&["field", "left", "right"], &rows));
    }
}

fn write_value_overlap(out: &mut String, overlap: &ValueOverlap) {
    let name = if overlap.field == overlap.right_field {
        overlap.field.clone()
    } else {
        format!("{}={}", overlap.field, overlap.right_field)
    };
    let _ = writeln!(
        out,
        "\nValues of {name}: {} common, {} left only, {} right only",
        overlap.total_common,
        overlap.left_only.len(),
        overlap.right_only.len()
    );
    write_value_sample(out, "common", &overlap.common);
    write_value_sample(out, "left only", &overlap.left_only);
    write_value_sample(out, "right only", &overlap.right_only);
}

fn write_value_sample(out: &mut String, label: &str, values: &[NormalizedValue]) {
    if values.is_empty() {
        return;
    }
    let mut shown = values
        .iter()
        .take(VALUE_SAMPLE)
        .map(|value| sanitize_cell(&value.to_string()).into_owned())
        .collect::<Vec<_>>();
    if values.len() > VALUE_SAMPLE {
        shown.push(format!("... (+{})", values.len() - VALUE_SAMPLE));
    }
    let _ = writeln!(out, "  {label}: {}", shown.join(", "));
}

fn render_keys_table(report: &KeyReport, check: Option<&KeyCheck>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Rows: {}", report.rows);
    out.push('\n');
    let stats = report
        .column_stats
        .iter()
        .map(|s| {
            vec![
                s.column.clone(),
                s.unique_count.to_string(),
                s.empty_count.to_string(),
                s.duplicate_count.to_string(),
                format!("{:.2}", s.uniqueness_ratio),
            ]
        })
        .collect::<Vec<_>>();
    out.push_str(&grid(
        &["column", "unique", "empty", "duplicates", "ratio"],
        &stats,
    ));
    out.push('\n');
    let _ = writeln!(out, "Single-column keys: {}", list_or_none(&report.single_keys));
    let composite = report
        .composite_keys
        .iter()
        .map(|key| format!("({})", key.join(", ")))
        .collect::<Vec<_>>();
    let _ = writeln!(out, "Composite keys: {}", list_or_none(&composite));

    if let Some(check) = check {
        let verdict = if check.is_key() {
            "usable key".to_string()
        } else {
            let mut reasons = Vec::new();
            if check.columns.is_empty() {
                reasons.push("no known columns");
            } else if !check.unique {
                reasons.push("not unique");
            }
            if check.has_empty {
                reasons.push("has empty values");
            }
            format!("not a key: {}", reasons.join(", "))
        };
        let _ = writeln!(out, "Check [{}]: {verdict}", check.columns.join(", "));
        if !check.unknown.is_empty() {
            let _ = writeln!(out, "Unknown columns: {}", check.unknown.join(", "));
        }
    }
    out
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        NONE.to_string()
    } else {
        items.join(", ")
    }
}

/// Column-aligned text grid: header, dashed rule, then rows. Trailing padding
/// is trimmed from every line.
fn grid(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(&sanitize_cell(cell)));
        }
    }
    let widths = widths.into_iter().map(|w| w.max(3)).collect::<Vec<_>>();

    let mut out = String::new();
    let headers = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    let _ = writeln!(out, "{}", grid_line(&headers, &widths));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(out, "{}", grid_line(&rule, &widths));
    for row in rows {
        let _ = writeln!(out, "{}", grid_line(row, &widths));
    }
    out
}

fn grid_line(cells: &[String], widths: &[usize]) -> String {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let cell = sanitize_cell(cell);
            let pad = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI escape, e.g. \x1b[31m
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
