//! CSV row encryption: the flat, positional sibling of [`crate::encode::encode_row`].
//!
//! A CSV data file carries no field names, so cells line up 1:1 with a flat
//! (no `record`, no `repeated`) schema by position rather than by key. Every
//! cell arrives as text and is coerced to the column's declared type before
//! the same per-column encryption dispatch [`crate::encode::encode_leaf`]
//! uses for JSON rows.

use rand_core::RngCore;
use serde_json::Value;

use ebq_schema::{rewrite_schema, ColumnDescriptor, ColumnType, EbqError, Mode};

use crate::encode::encode_leaf;
use crate::keys::TableKeys;

/// Load-time options that change how a CSV stream is read rather than how a
/// row is encrypted.
#[derive(Debug, Clone)]
pub struct CsvLoadOptions {
    /// Rows read off the front of the file and passed through to
    /// [`CsvLoadResult::skipped_rows`] unencrypted instead of being encoded.
    pub skip_leading_rows: usize,
    /// `false` is rejected outright: quoted newlines inside a CSV cell are
    /// always honored, so refusing to allow them is not a supported mode.
    pub allow_quoted_newlines: bool,
}

impl Default for CsvLoadOptions {
    fn default() -> Self {
        CsvLoadOptions { skip_leading_rows: 0, allow_quoted_newlines: true }
    }
}

pub struct CsvLoadResult {
    /// The wire header: `schema` rewritten and flattened, in column order.
    pub header: Vec<String>,
    /// The first `skip_leading_rows` rows, verbatim and unencrypted.
    pub skipped_rows: Vec<Vec<String>>,
    /// Every remaining row, encrypted cell-by-cell.
    pub rows: Vec<Vec<String>>,
}

/// Reads `input` as Excel-dialect CSV, encrypts every row after the leading
/// skip, and returns both the skipped rows and the encrypted ones so a
/// caller can stitch them back into one output file in order.
pub fn encode_csv_data<R: std::io::Read>(
    schema: &[ColumnDescriptor],
    input: R,
    keys: &TableKeys,
    rng: &mut dyn RngCore,
    options: &CsvLoadOptions,
) -> Result<CsvLoadResult, EbqError> {
    if !options.allow_quoted_newlines {
        return Err(EbqError::Format("ebq cannot be configured to not allow quoted newlines".to_string()));
    }
    for col in schema {
        if col.mode == Mode::Repeated || col.ty == ColumnType::Record {
            return Err(EbqError::Format(format!("{}: CSV rows do not support repeated or record fields", col.name)));
        }
    }

    let header = rewrite_schema(schema).into_iter().map(|c| c.name).collect();

    let mut reader = csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(input);
    let mut records = reader.records();

    let mut skipped_rows = Vec::with_capacity(options.skip_leading_rows);
    for _ in 0..options.skip_leading_rows {
        match records.next() {
            Some(record) => skipped_rows.push(record.map_err(|e| EbqError::Format(e.to_string()))?.iter().map(str::to_string).collect()),
            None => break,
        }
    }

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(|e| EbqError::Format(e.to_string()))?;
        let cells: Vec<&str> = record.iter().collect();
        rows.push(encode_csv_row(schema, &cells, keys, rng)?);
    }

    Ok(CsvLoadResult { header, skipped_rows, rows })
}

/// Encrypts one already-split CSV row. `cells` must have exactly one entry
/// per entry of `schema`; the returned row may be longer, since
/// `probabilistic_searchwords` fans a single cell out into two wire columns.
pub fn encode_csv_row(schema: &[ColumnDescriptor], cells: &[&str], keys: &TableKeys, rng: &mut dyn RngCore) -> Result<Vec<String>, EbqError> {
    if cells.len() != schema.len() {
        return Err(EbqError::Format(format!("row has {} fields, schema declares {}", cells.len(), schema.len())));
    }

    let mut out = Vec::new();
    for (col, &cell) in schema.iter().zip(cells) {
        let value = csv_cell_to_value(col, cell)?;
        if value.is_null() {
            if col.mode == Mode::Required {
                return Err(EbqError::Format(format!("{}: required field is missing", col.name)));
            }
            out.extend(rewrite_schema(std::slice::from_ref(col)).into_iter().map(|_| String::new()));
            continue;
        }
        for (_, encoded) in encode_leaf(col, &value, keys, rng)? {
            out.push(value_to_csv_cell(&encoded));
        }
    }
    Ok(out)
}

fn csv_cell_to_value(col: &ColumnDescriptor, cell: &str) -> Result<Value, EbqError> {
    if cell.is_empty() {
        return Ok(Value::Null);
    }
    match col.ty {
        ColumnType::Integer => cell.trim().parse::<i64>().map(Value::from).map_err(|_| EbqError::Format(format!("{}: expected an integer cell, got {cell:?}", col.name))),
        ColumnType::Float => cell.trim().parse::<f64>().map(Value::from).map_err(|_| EbqError::Format(format!("{}: expected a numeric cell, got {cell:?}", col.name))),
        ColumnType::String | ColumnType::Timestamp => Ok(Value::String(cell.to_string())),
        ColumnType::Record => unreachable!("validated: CSV schemas carry no record columns"),
    }
}

fn value_to_csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
