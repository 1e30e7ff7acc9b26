//! Reconciliation options and their YAML representation.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ReconError, Result},
    field_match::{DEFAULT_SIMILARITY_THRESHOLD, FieldMatchStrategy},
    identity::KeyField,
    normalize::{DEFAULT_TOLERANCE, Normalizer},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReconConfig {
    /// Key columns as `left`/`right` name pairs; auto-detected when absent.
    pub key_fields: Option<Vec<KeyField>>,
    /// Match rows by identity (true) or by position (false).
    pub ignore_order: bool,
    pub normalize_values: bool,
    /// Minimum field-name similarity for two columns to be aligned.
    pub similarity_threshold: f64,
    /// Absolute tolerance for numeric equality.
    pub value_tolerance: f64,
    /// Differing rows below this similarity are left out of the report.
    pub min_similarity_ratio: f64,
    /// Drop key columns from the per-field comparison.
    pub exclude_key_fields: bool,
    pub field_matching: FieldMatchStrategy,
    /// Diff every positional duplicate pair instead of only the first.
    pub diff_all_duplicates: bool,
    pub allow_empty_input: bool,
    pub max_rows: Option<usize>,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            key_fields: None,
            ignore_order: true,
            normalize_values: true,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            value_tolerance: DEFAULT_TOLERANCE,
            min_similarity_ratio: 0.0,
            exclude_key_fields: false,
            field_matching: FieldMatchStrategy::Greedy,
            diff_all_duplicates: false,
            allow_empty_input: true,
            max_rows: None,
        }
    }
}

impl ReconConfig {
    pub fn with_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<KeyField>,
    {
        self.key_fields = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn load(path: &Path) -> AnyResult<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: ReconConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        config
            .validate()
            .with_context(|| format!("Validating config {path:?}"))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_unit_range("similarity_threshold", self.similarity_threshold)?;
        check_unit_range("min_similarity_ratio", self.min_similarity_ratio)?;
        if !(self.value_tolerance >= 0.0 && self.value_tolerance.is_finite()) {
            return Err(ReconError::InvalidConfig(format!(
                "value_tolerance must be a finite non-negative number, got {}",
                self.value_tolerance
            )));
        }
        if let Some(keys) = &self.key_fields
            && let Some(bad) = keys
                .iter()
                .find(|k| k.left.trim().is_empty() || k.right.trim().is_empty())
        {
            return Err(ReconError::InvalidConfig(format!(
                "key field names cannot be blank ({:?} = {:?})",
                bad.left, bad.right
            )));
        }
        Ok(())
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.value_tolerance, self.normalize_values)
    }

    pub fn explicit_keys(&self) -> Option<&[KeyField]> {
        self.key_fields
            .as_deref()
            .filter(|keys| !keys.is_empty())
    }
}

fn check_unit_range(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ReconError::InvalidConfig(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}
