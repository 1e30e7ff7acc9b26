use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{field_match::FieldMatchStrategy, identity::KeyField, keys::DEFAULT_MAX_KEY_COLUMNS};

#[derive(Debug, Parser)]
#[command(author, version, about = "Reconcile two CSV tables field by field", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compare two CSV files and report matched, missing and differing rows
    Compare(CompareArgs),
    /// Find single and composite columns that uniquely identify rows
    Keys(KeysArgs),
}

#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Left-hand (reference) CSV file, or '-' for stdin
    #[arg(short = 'l', long = "left")]
    pub left: PathBuf,
    /// Right-hand CSV file, or '-' for stdin
    #[arg(short = 'r', long = "right")]
    pub right: PathBuf,
    /// Key field used to match rows; `name` or `left_name=right_name` (repeatable)
    #[arg(short = 'k', long = "key", action = clap::ArgAction::Append)]
    pub keys: Vec<KeyField>,
    /// Pair rows by position instead of by key
    #[arg(long)]
    pub ordered: bool,
    /// Compare text exactly, without trimming or case folding
    #[arg(long = "raw-values")]
    pub raw_values: bool,
    /// Minimum field-name similarity for two columns to be aligned (0..1)
    #[arg(long = "field-threshold")]
    pub field_threshold: Option<f64>,
    /// Absolute tolerance for numeric equality
    #[arg(long)]
    pub tolerance: Option<f64>,
    /// Hide differing rows whose similarity is below this ratio (0..1)
    #[arg(long = "min-similarity")]
    pub min_similarity: Option<f64>,
    /// Leave key fields out of the per-field comparison
    #[arg(long = "exclude-keys")]
    pub exclude_keys: bool,
    /// Field-name matching strategy
    #[arg(long = "field-matching")]
    pub field_matching: Option<FieldMatchStrategy>,
    /// Diff every duplicate-key pair instead of only the first
    #[arg(long = "all-duplicates")]
    pub all_duplicates: bool,
    /// Fail when either input has no rows
    #[arg(long = "reject-empty")]
    pub reject_empty: bool,
    /// Refuse inputs with more rows than this
    #[arg(long = "max-rows")]
    pub max_rows: Option<usize>,
    /// YAML file with reconciliation options; flags override its values
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// CSV delimiter character for both inputs (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the left file (detected from utf-8 and gbk when omitted)
    #[arg(long = "left-encoding")]
    pub left_encoding: Option<String>,
    /// Character encoding of the right file (detected from utf-8 and gbk when omitted)
    #[arg(long = "right-encoding")]
    pub right_encoding: Option<String>,
    /// Report the common and one-sided values of this aligned field (repeatable)
    #[arg(long = "values", action = clap::ArgAction::Append)]
    pub values: Vec<String>,
    /// Report format
    #[arg(long, default_value = "table")]
    pub format: ReportFormat,
    /// Maximum number of differing rows to print in table format
    #[arg(long)]
    pub limit: Option<usize>,
    /// Write the report here instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct KeysArgs {
    /// Input CSV file to analyze, or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Widest column combination to try for composite keys
    #[arg(long = "max-columns", default_value_t = DEFAULT_MAX_KEY_COLUMNS)]
    pub max_columns: usize,
    /// Check whether this comma-separated column set is a usable key
    #[arg(long = "check", value_delimiter = ',')]
    pub check: Vec<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (detected from utf-8 and gbk when omitted)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Report format
    #[arg(long, default_value = "table")]
    pub format: ReportFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum ReportFormat {
    #[default]
    Table,
    Json,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
