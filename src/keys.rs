//! Candidate primary-key discovery for a single table.
//!
//! A column set is a usable key when its combined normalized values never
//! repeat and never contain an empty component. Uniqueness is judged with the
//! same [`Normalizer`] the reconciler uses, so a key reported here behaves the
//! same way when passed to `compare --key`.

use std::collections::HashSet;

use anyhow::{Context, Result, anyhow};
use itertools::Itertools;
use log::info;
use serde::Serialize;

use crate::{
    cli::KeysArgs,
    data::Table,
    identity::{IdentityKey, key_parts},
    io_utils,
    normalize::Normalizer,
    report,
};

pub const DEFAULT_MAX_KEY_COLUMNS: usize = 3;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ColumnStats {
    pub column: String,
    pub total_rows: usize,
    /// Distinct non-empty values.
    pub unique_count: usize,
    pub empty_count: usize,
    /// Rows repeating an earlier value, empties included.
    pub duplicate_count: usize,
    pub uniqueness_ratio: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KeyReport {
    pub rows: usize,
    pub column_stats: Vec<ColumnStats>,
    pub single_keys: Vec<String>,
    pub composite_keys: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KeyCheck {
    pub columns: Vec<String>,
    pub unknown: Vec<String>,
    pub unique: bool,
    pub has_empty: bool,
}

impl KeyCheck {
    pub fn is_key(&self) -> bool {
        !self.columns.is_empty() && self.unique && !self.has_empty
    }
}

pub fn column_stats(table: &Table, column: &str, normalizer: &Normalizer) -> ColumnStats {
    let mut seen = HashSet::new();
    let mut non_empty = HashSet::new();
    let mut empty_count = 0usize;
    for record in table.records() {
        let value = normalizer.normalize_field(record.get(column));
        if value.is_empty() {
            empty_count += 1;
        } else {
            non_empty.insert(value.canonical());
        }
        seen.insert(value.canonical());
    }
    let total_rows = table.len();
    ColumnStats {
        column: column.to_string(),
        total_rows,
        unique_count: non_empty.len(),
        empty_count,
        duplicate_count: total_rows - seen.len(),
        uniqueness_ratio: if total_rows == 0 {
            0.0
        } else {
            non_empty.len() as f64 / total_rows as f64
        },
    }
}

fn is_unique(table: &Table, columns: &[&str], normalizer: &Normalizer) -> bool {
    let mut seen = HashSet::with_capacity(table.len());
    table.records().iter().all(|record| {
        seen.insert(IdentityKey::from_parts(key_parts(
            record,
            columns.iter().copied(),
            normalizer,
        )))
    })
}

fn has_empty(table: &Table, columns: &[&str], normalizer: &Normalizer) -> bool {
    table.records().iter().any(|record| {
        columns
            .iter()
            .any(|c| normalizer.normalize_field(record.get(c)).is_empty())
    })
}

pub fn analyze(table: &Table, max_columns: usize, normalizer: &Normalizer) -> KeyReport {
    let columns = table.field_names();
    let column_stats = columns
        .iter()
        .map(|c| column_stats(table, c, normalizer))
        .collect::<Vec<_>>();

    let mut single_keys = Vec::new();
    let mut composite_keys: Vec<Vec<String>> = Vec::new();
    if !table.is_empty() {
        single_keys = column_stats
            .iter()
            .filter(|s| s.duplicate_count == 0 && s.empty_count == 0)
            .map(|s| s.column.clone())
            .collect();

        for width in 2..=max_columns.min(columns.len()) {
            for combo in columns.iter().map(String::as_str).combinations(width) {
                let contains_known = single_keys.iter().any(|k| combo.contains(&k.as_str()))
                    || composite_keys
                        .iter()
                        .any(|key| key.iter().all(|k| combo.contains(&k.as_str())));
                if contains_known {
                    continue;
                }
                if is_unique(table, &combo, normalizer) && !has_empty(table, &combo, normalizer) {
                    composite_keys.push(combo.iter().map(|c| c.to_string()).collect());
                }
            }
        }
    }

    KeyReport {
        rows: table.len(),
        column_stats,
        single_keys,
        composite_keys,
    }
}

pub fn check(table: &Table, columns: &[String], normalizer: &Normalizer) -> KeyCheck {
    let (known, unknown): (Vec<&String>, Vec<&String>) =
        columns.iter().partition(|c| table.has_field(c));
    let known = known.into_iter().map(String::as_str).collect::<Vec<_>>();
    KeyCheck {
        columns: known.iter().map(|c| c.to_string()).collect(),
        unknown: unknown.into_iter().cloned().collect(),
        unique: !known.is_empty() && is_unique(table, &known, normalizer),
        has_empty: has_empty(table, &known, normalizer),
    }
}

pub fn execute(args: &KeysArgs) -> Result<()> {
    if args.max_columns == 0 {
        return Err(anyhow!("--max-columns must be at least 1"));
    }
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Searching '{}' for key columns (up to {} column(s) per key)",
        args.input.display(),
        args.max_columns
    );
    let table = io_utils::load_table(&args.input, delimiter, encoding)?;
    let normalizer = Normalizer::default();

    let key_report = analyze(&table, args.max_columns, &normalizer);
    let key_check = if args.check.is_empty() {
        None
    } else {
        Some(check(&table, &args.check, &normalizer))
    };
    let rendered = report::render_keys(&key_report, key_check.as_ref(), args.format)
        .context("Rendering key report")?;
    io_utils::write_output(None, &rendered)?;
    info!(
        "Found {} single-column and {} composite key(s)",
        key_report.single_keys.len(),
        key_report.composite_keys.len()
    );
    Ok(())
}
