//! Reconciliation coordinator.
//!
//! [`reconcile`] aligns the two schemas, chooses how rows are identified,
//! pairs rows, diffs each pair and folds everything into a
//! [`ReconciliationResult`]. It is a pure function of its inputs: both tables
//! are borrowed read-only and the result owns everything it reports.
//!
//! Known limitations carried as policy:
//!
//! - field matching is greedy in left field order unless
//!   [`FieldMatchStrategy::BestFirst`](crate::field_match::FieldMatchStrategy)
//!   is configured;
//! - when a key occurs several times on a side only the first record of each
//!   side is diffed; surplus duplicates are counted but neither diffed nor
//!   reported as unmatched, unless `diff_all_duplicates` is set.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::Serialize;

use crate::{
    config::ReconConfig,
    data::Table,
    diff::{RowComparison, RowIdentity, diff_rows},
    error::{ReconError, Result, Side},
    field_match::{FieldMapping, FieldPair, match_fields},
    identity::{self, IdentityKey, KeyField, KeyStrategy},
    normalize::{NormalizedValue, Normalizer},
};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReconciliationResult {
    pub strategy: KeyStrategy,
    pub mapping: FieldMapping,
    pub common_fields: Vec<String>,
    pub left_only_fields: Vec<String>,
    pub right_only_fields: Vec<String>,
    /// Fields actually diffed, by left name; key fields are absent when excluded.
    pub compared_fields: Vec<String>,
    pub left_rows: usize,
    pub right_rows: usize,
    pub matched: usize,
    pub left_only: usize,
    pub right_only: usize,
    pub left_only_rows: Vec<usize>,
    pub right_only_rows: Vec<usize>,
    /// Same-key rows beyond the first `min(|A|, |B|)` of each group.
    pub surplus_left_duplicates: usize,
    pub surplus_right_duplicates: usize,
    pub differing: Vec<RowComparison>,
    pub identical: Vec<RowIdentity>,
    /// Differing rows dropped for falling below `min_similarity_ratio`.
    pub filtered: usize,
}

impl ReconciliationResult {
    pub fn is_clean(&self) -> bool {
        self.left_only == 0
            && self.right_only == 0
            && self.differing.is_empty()
            && self.filtered == 0
    }

    fn empty(strategy: KeyStrategy, schema: SchemaOverlap, left: &Table, right: &Table) -> Self {
        Self {
            strategy,
            compared_fields: schema.common_names(),
            common_fields: schema.common_names(),
            mapping: schema.mapping,
            left_only_fields: schema.left_only,
            right_only_fields: schema.right_only,
            left_rows: left.len(),
            right_rows: right.len(),
            matched: 0,
            left_only: 0,
            right_only: 0,
            left_only_rows: Vec::new(),
            right_only_rows: Vec::new(),
            surplus_left_duplicates: 0,
            surplus_right_duplicates: 0,
            differing: Vec::new(),
            identical: Vec::new(),
            filtered: 0,
        }
    }
}

struct SchemaOverlap {
    mapping: FieldMapping,
    left_only: Vec<String>,
    right_only: Vec<String>,
}

impl SchemaOverlap {
    fn common_names(&self) -> Vec<String> {
        self.mapping
            .pairs()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }
}

fn align_schemas(left: &Table, right: &Table, config: &ReconConfig) -> SchemaOverlap {
    let left_fields = left.field_names();
    let right_fields = right.field_names();
    let mapping = match_fields(
        &left_fields,
        &right_fields,
        config.similarity_threshold,
        config.field_matching,
    );
    let left_only = left_fields
        .iter()
        .filter(|f| mapping.right_for(f).is_none())
        .cloned()
        .collect();
    let right_only = right_fields
        .iter()
        .filter(|f| mapping.left_for(f).is_none())
        .cloned()
        .collect();
    SchemaOverlap {
        mapping,
        left_only,
        right_only,
    }
}

pub fn reconcile(
    left: &Table,
    right: &Table,
    config: &ReconConfig,
) -> Result<ReconciliationResult> {
    config.validate()?;
    check_row_limit(left, Side::Left, config.max_rows)?;
    check_row_limit(right, Side::Right, config.max_rows)?;

    let normalizer = config.normalizer();
    let schema = align_schemas(left, right, config);
    debug!(
        "Aligned {} field(s); left-only {:?}, right-only {:?}",
        schema.mapping.len(),
        schema.left_only,
        schema.right_only
    );

    // Declared columns count, so header-only tables are checked too.
    if let Some(keys) = config.explicit_keys() {
        validate_keys(left, right, keys)?;
    }

    if left.is_empty() || right.is_empty() {
        return reconcile_empty(left, right, config, &normalizer, schema);
    }

    if schema.mapping.is_empty() {
        return Err(ReconError::Schema {
            left: left.field_names(),
            right: right.field_names(),
            threshold: config.similarity_threshold,
        });
    }

    let result = if config.ignore_order {
        reconcile_by_identity(left, right, config, &normalizer, schema)
    } else {
        reconcile_by_position(left, right, config, &normalizer, schema)
    };

    info!(
        "Reconciled {} vs {} row(s) by {}: {} matched, {} identical, {} differing, \
         {} left-only, {} right-only",
        result.left_rows,
        result.right_rows,
        result.strategy.describe(),
        result.matched,
        result.identical.len(),
        result.differing.len(),
        result.left_only,
        result.right_only
    );
    Ok(result)
}

fn check_row_limit(table: &Table, side: Side, limit: Option<usize>) -> Result<()> {
    match limit {
        Some(limit) if table.len() > limit => Err(ReconError::TooManyRows {
            side,
            rows: table.len(),
            limit,
        }),
        _ => Ok(()),
    }
}

fn validate_keys(left: &Table, right: &Table, keys: &[KeyField]) -> Result<()> {
    for key in keys {
        if !left.has_field(&key.left) {
            return Err(ReconError::Key {
                field: key.left.clone(),
                side: Side::Left,
            });
        }
        if !right.has_field(&key.right) {
            return Err(ReconError::Key {
                field: key.right.clone(),
                side: Side::Right,
            });
        }
    }
    Ok(())
}

/// One table has no rows: everything in the other is unmatched. Ordered mode
/// still walks every position so each row shows up as a one-sided difference.
fn reconcile_empty(
    left: &Table,
    right: &Table,
    config: &ReconConfig,
    normalizer: &Normalizer,
    schema: SchemaOverlap,
) -> Result<ReconciliationResult> {
    if !config.allow_empty_input {
        let side = if left.is_empty() { Side::Left } else { Side::Right };
        return Err(ReconError::EmptyInput { side });
    }
    if !config.ignore_order {
        return Ok(reconcile_by_position(left, right, config, normalizer, schema));
    }
    let strategy = if let Some(keys) = config.explicit_keys() {
        KeyStrategy::Explicit(keys.to_vec())
    } else {
        KeyStrategy::ContentHash(schema.mapping.pairs().iter().map(KeyField::from).collect())
    };
    let mut result = ReconciliationResult::empty(strategy, schema, left, right);
    result.left_only = left.len();
    result.right_only = right.len();
    result.left_only_rows = (0..left.len()).collect();
    result.right_only_rows = (0..right.len()).collect();
    info!(
        "Reconciled {} vs {} row(s): one side is empty, nothing to pair",
        left.len(),
        right.len()
    );
    Ok(result)
}

/// Common field pairs that take part in the per-field diff.
fn compared_pairs(
    mapping: &FieldMapping,
    strategy: &KeyStrategy,
    config: &ReconConfig,
) -> Vec<FieldPair> {
    let excluded = |pair: &FieldPair| {
        config.exclude_key_fields
            && !strategy.is_content_hash()
            && strategy
                .fields()
                .iter()
                .any(|k| k.left == pair.left || k.right == pair.right)
    };
    mapping
        .pairs()
        .iter()
        .filter(|pair| !excluded(pair))
        .cloned()
        .collect()
}

fn identity_label(
    left: &Table,
    row: usize,
    key: IdentityKey,
    strategy: &KeyStrategy,
    normalizer: &Normalizer,
) -> String {
    if strategy.is_content_hash() {
        return format!("#{}", &key.to_string()[..12]);
    }
    let Some(record) = left.record(row) else {
        return key.to_string();
    };
    strategy
        .fields()
        .iter()
        .map(|field| match record.get(&field.left) {
            Some(value) => format!("{}={}", field.left, normalizer.normalize(value)),
            None => format!("{}=<missing>", field.left),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn reconcile_by_identity(
    left: &Table,
    right: &Table,
    config: &ReconConfig,
    normalizer: &Normalizer,
    schema: SchemaOverlap,
) -> ReconciliationResult {
    let resolution = identity::resolve(
        left,
        right,
        schema.mapping.pairs(),
        config.explicit_keys(),
        normalizer,
    );
    info!(
        "Matching rows by {} ({})",
        resolution.strategy.describe(),
        resolution
            .strategy
            .fields()
            .iter()
            .map(|k| k.left.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    let pairs = compared_pairs(&schema.mapping, &resolution.strategy, config);
    let pairing = resolution.pair();

    let mut result =
        ReconciliationResult::empty(resolution.strategy.clone(), schema, left, right);
    result.compared_fields = pairs.iter().map(|p| p.name().to_string()).collect();
    result.matched = pairing.matched_pairs();
    result.left_only = pairing.left_only.len();
    result.right_only = pairing.right_only.len();

    for group in &pairing.matched {
        result.surplus_left_duplicates += group.surplus_left();
        result.surplus_right_duplicates += group.surplus_right();
        let diffed = if config.diff_all_duplicates {
            group.pair_count()
        } else {
            1
        };
        for (&l, &r) in group.left.iter().zip(group.right).take(diffed) {
            let identity = RowIdentity::Key {
                key: group.key,
                label: identity_label(left, l, group.key, &resolution.strategy, normalizer),
            };
            let comparison = diff_rows(
                identity,
                left.record(l).map(|rec| (l, rec)),
                right.record(r).map(|rec| (r, rec)),
                &pairs,
                normalizer,
            );
            record_comparison(&mut result, comparison, config);
        }
    }

    result.left_only_rows = pairing.left_only;
    result.right_only_rows = pairing.right_only;
    result
}

fn reconcile_by_position(
    left: &Table,
    right: &Table,
    config: &ReconConfig,
    normalizer: &Normalizer,
    schema: SchemaOverlap,
) -> ReconciliationResult {
    let pairs = compared_pairs(&schema.mapping, &KeyStrategy::Positional, config);
    let mut result = ReconciliationResult::empty(KeyStrategy::Positional, schema, left, right);
    result.compared_fields = pairs.iter().map(|p| p.name().to_string()).collect();

    for index in 0..left.len().max(right.len()) {
        let l = left.record(index).map(|rec| (index, rec));
        let r = right.record(index).map(|rec| (index, rec));
        match (l, r) {
            (Some(_), Some(_)) => result.matched += 1,
            (Some(_), None) => {
                result.left_only += 1;
                result.left_only_rows.push(index);
            }
            (None, Some(_)) => {
                result.right_only += 1;
                result.right_only_rows.push(index);
            }
            (None, None) => unreachable!("index below the longer table length"),
        }
        let comparison = diff_rows(RowIdentity::Position { index }, l, r, &pairs, normalizer);
        record_comparison(&mut result, comparison, config);
    }
    result
}

fn record_comparison(
    result: &mut ReconciliationResult,
    comparison: RowComparison,
    config: &ReconConfig,
) {
    if comparison.identical {
        result.identical.push(comparison.identity);
    } else if comparison.is_one_sided() || comparison.similarity >= config.min_similarity_ratio {
        result.differing.push(comparison);
    } else {
        result.filtered += 1;
    }
}

/// Distinct non-empty values of one aligned field, split by the table that
/// holds them. Values compare by normalized form; numeric tolerance is not
/// applied.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValueOverlap {
    pub field: String,
    pub right_field: String,
    pub total_common: usize,
    pub common: Vec<NormalizedValue>,
    pub left_only: Vec<NormalizedValue>,
    pub right_only: Vec<NormalizedValue>,
}

/// Compares the value sets of `pair` across both tables, over all rows.
pub fn value_overlap(
    left: &Table,
    right: &Table,
    pair: &FieldPair,
    normalizer: &Normalizer,
) -> ValueOverlap {
    let left_values = distinct_values(left, &pair.left, normalizer);
    let mut right_values = distinct_values(right, &pair.right, normalizer);
    let mut common = Vec::new();
    let mut left_only = Vec::new();
    for (canonical, value) in left_values {
        if right_values.remove(&canonical).is_some() {
            common.push(value);
        } else {
            left_only.push(value);
        }
    }
    debug!(
        "Value overlap for {} <-> {}: {} common",
        pair.left,
        pair.right,
        common.len()
    );
    ValueOverlap {
        field: pair.left.clone(),
        right_field: pair.right.clone(),
        total_common: common.len(),
        common,
        left_only,
        right_only: right_values.into_values().collect(),
    }
}

fn distinct_values(
    table: &Table,
    field: &str,
    normalizer: &Normalizer,
) -> BTreeMap<String, NormalizedValue> {
    table
        .records()
        .iter()
        .map(|record| normalizer.normalize_field(record.get(field)))
        .filter(|value| !value.is_empty())
        .map(|value| (value.canonical(), value))
        .collect()
}
