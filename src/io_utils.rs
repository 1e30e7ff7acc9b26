//! File I/O for the CLI: CSV loading, encoding and delimiter resolution, and
//! report output.
//!
//! The reconciliation engine never touches the filesystem; everything that
//! reads or writes goes through here.
//!
//! - **Delimiter resolution**: `.tsv` → tab, anything else → comma, with
//!   manual override.
//! - **Encoding**: input decoding via `encoding_rs`. Without an explicit
//!   label the first of UTF-8 and GBK that decodes cleanly wins.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, GBK, UTF_8};
use itertools::Itertools;
use log::{debug, info};

use crate::data::{Record, Table, Value};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

/// `None` means "detect": see [`detect_encoding`].
pub fn resolve_encoding(label: Option<&str>) -> Result<Option<&'static Encoding>> {
    label
        .map(|value| {
            Encoding::for_label(value.trim().as_bytes())
                .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
        })
        .transpose()
}

/// Encodings tried in order when none is given. The `gb2312` label maps onto
/// GBK and a UTF-8 BOM is stripped during decoding, so these two cover it.
fn fallback_encodings() -> [&'static Encoding; 2] {
    [UTF_8, GBK]
}

/// First fallback encoding that decodes `bytes` without errors.
pub fn detect_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    fallback_encodings()
        .into_iter()
        .find(|encoding| !encoding.decode_with_bom_removal(bytes).1)
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader<R: Read>(reader: R, delimiter: u8) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(reader)
}

/// Reads the whole input, from stdin for `-`.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    let mut reader: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .with_context(|| format!("Reading input {path:?}"))?;
    Ok(bytes)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    // Strips a BOM matching `encoding`; a UTF-8 BOM on a header cell would
    // otherwise become part of the first column name.
    let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Reads a headered CSV into a [`Table`]. Header names are trimmed and must
/// be unique. Empty cells become [`Value::Null`] and everything else stays
/// text for the normalizer to interpret.
pub fn read_table<R: Read>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Table> {
    let headers = decode_record(reader.byte_headers()?, encoding)?
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();
    if let Some(duplicate) = headers.iter().duplicates().next() {
        return Err(anyhow!("Duplicate column name '{duplicate}' in header"));
    }
    let mut records = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        let decoded = decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {}", row_idx + 2))?;
        records.push(Record::from_pairs(headers.iter().cloned().zip(
            decoded.into_iter().map(|cell| {
                if cell.is_empty() {
                    Value::Null
                } else {
                    Value::Text(cell)
                }
            }),
        )));
    }
    Ok(Table::new(headers, records))
}

pub fn load_table(
    path: &Path,
    delimiter: u8,
    encoding: Option<&'static Encoding>,
) -> Result<Table> {
    let bytes = read_input(path)?;
    let encoding = match encoding {
        Some(encoding) => encoding,
        None => detect_encoding(&bytes).ok_or_else(|| {
            anyhow!(
                "Unable to decode {path:?} as {}; pass an explicit encoding",
                fallback_encodings().iter().map(|e| e.name()).join(" or ")
            )
        })?,
    };
    info!("Reading {:?} with encoding {}", path, encoding.name());
    let mut reader = open_csv_reader(bytes.as_slice(), delimiter);
    let table = read_table(&mut reader, encoding)
        .with_context(|| format!("Loading table from {path:?}"))?;
    debug!(
        "Loaded {} row(s) x {} column(s) from {:?}",
        table.len(),
        table.columns().len(),
        path
    );
    Ok(table)
}

pub fn write_output(path: Option<&Path>, contents: &str) -> Result<()> {
    let mut writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout().lock()),
    };
    writer
        .write_all(contents.as_bytes())
        .context("Writing report")?;
    writer.flush().context("Flushing report")
}
