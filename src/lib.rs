pub mod cli;
pub mod compare;
pub mod config;
pub mod data;
pub mod diff;
pub mod error;
pub mod field_match;
pub mod identity;
pub mod io_utils;
pub mod keys;
pub mod normalize;
pub mod reconcile;
pub mod report;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

pub use crate::{
    config::ReconConfig,
    data::{Record, Table, Value},
    error::{ReconError, Side},
    field_match::{FieldMapping, FieldMatchStrategy, FieldPair, match_fields},
    identity::{IdentityKey, KeyField, KeyStrategy},
    normalize::{NormalizedValue, Normalizer},
    reconcile::{ReconciliationResult, ValueOverlap, reconcile, value_overlap},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_recon", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Compare(args) => compare::execute(&args),
        Commands::Keys(args) => keys::execute(&args),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
