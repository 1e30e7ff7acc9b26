use anyhow::{Context, Result, anyhow};
use log::{debug, info};

use crate::{
    cli::CompareArgs,
    config::ReconConfig,
    data::Table,
    io_utils, printable_delimiter,
    reconcile::{ReconciliationResult, ValueOverlap, reconcile, value_overlap},
    report,
};

/// Builds the effective configuration: the YAML file (if any) first, then
/// every flag the user actually passed on top of it.
pub fn build_config(args: &CompareArgs) -> Result<ReconConfig> {
    let mut config = match &args.config {
        Some(path) => ReconConfig::load(path)?,
        None => ReconConfig::default(),
    };
    if !args.keys.is_empty() {
        config.key_fields = Some(args.keys.clone());
    }
    if args.ordered {
        config.ignore_order = false;
    }
    if args.raw_values {
        config.normalize_values = false;
    }
    if let Some(threshold) = args.field_threshold {
        config.similarity_threshold = threshold;
    }
    if let Some(tolerance) = args.tolerance {
        config.value_tolerance = tolerance;
    }
    if let Some(ratio) = args.min_similarity {
        config.min_similarity_ratio = ratio;
    }
    if args.exclude_keys {
        config.exclude_key_fields = true;
    }
    if let Some(strategy) = args.field_matching {
        config.field_matching = strategy;
    }
    if args.all_duplicates {
        config.diff_all_duplicates = true;
    }
    if args.reject_empty {
        config.allow_empty_input = false;
    }
    if args.max_rows.is_some() {
        config.max_rows = args.max_rows;
    }
    config.validate().context("Invalid reconciliation options")?;
    Ok(config)
}

pub fn execute(args: &CompareArgs) -> Result<()> {
    let config = build_config(args)?;
    debug!("Effective configuration: {config:?}");

    let left_delimiter = io_utils::resolve_input_delimiter(&args.left, args.delimiter);
    let right_delimiter = io_utils::resolve_input_delimiter(&args.right, args.delimiter);
    let left_encoding = io_utils::resolve_encoding(args.left_encoding.as_deref())?;
    let right_encoding = io_utils::resolve_encoding(args.right_encoding.as_deref())?;
    info!(
        "Comparing '{}' (delimiter '{}') with '{}' (delimiter '{}')",
        args.left.display(),
        printable_delimiter(left_delimiter),
        args.right.display(),
        printable_delimiter(right_delimiter)
    );

    let left = io_utils::load_table(&args.left, left_delimiter, left_encoding)?;
    let right = io_utils::load_table(&args.right, right_delimiter, right_encoding)?;
    let result = reconcile(&left, &right, &config)
        .with_context(|| format!("Reconciling {:?} against {:?}", args.left, args.right))?;

    let overlaps = value_overlaps(args, &config, &left, &right, &result)?;
    let rendered = report::render(&result, &overlaps, args.format, args.limit)?;
    io_utils::write_output(args.output.as_deref(), &rendered)?;
    if let Some(path) = &args.output {
        info!("Report written to {path:?}");
    }
    Ok(())
}

/// Resolves every `--values` field against the aligned schema. Either the
/// left or the right name of a common field is accepted.
fn value_overlaps(
    args: &CompareArgs,
    config: &ReconConfig,
    left: &Table,
    right: &Table,
    result: &ReconciliationResult,
) -> Result<Vec<ValueOverlap>> {
    let normalizer = config.normalizer();
    args.values
        .iter()
        .map(|name| {
            let pair = result.mapping.pair_named(name).ok_or_else(|| {
                anyhow!(
                    "Field '{name}' is not aligned between the inputs; common fields: {}",
                    result.common_fields.join(", ")
                )
            })?;
            Ok(value_overlap(left, right, pair, &normalizer))
        })
        .collect()
}
