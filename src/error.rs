use std::fmt;

use thiserror::Error;

/// Which input table an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Structural failures that abort a reconciliation. Per-value parse problems
/// never surface here; the normalizer falls back to text instead.
#[derive(Debug, Error, PartialEq)]
pub enum ReconError {
    #[error(
        "No common fields: nothing in [{}] matches [{}] at similarity >= {threshold}",
        .left.join(", "),
        .right.join(", ")
    )]
    Schema {
        left: Vec<String>,
        right: Vec<String>,
        threshold: f64,
    },
    #[error("Key field '{field}' not found in {side} table")]
    Key { field: String, side: Side },
    #[error("The {side} table has no rows")]
    EmptyInput { side: Side },
    #[error("The {side} table has {rows} row(s), above the configured limit of {limit}")]
    TooManyRows { side: Side, rows: usize, limit: usize },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ReconError>;
