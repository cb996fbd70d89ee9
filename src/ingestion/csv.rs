//! CSV ingestion implementation.

use std::path::Path;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{RawTable, Value};

/// Delimiters tried when none is given, in order of preference on ties.
const CANDIDATE_DELIMITERS: [u8; 3] = [b';', b',', b'\t'];

/// Ingest a delimited text file into a [`RawTable`].
///
/// Rules:
///
/// - The first line is the header; duplicate labels are kept as-is.
/// - If `delimiter` is `None` it is detected from the header line (`;`, `,` or tab).
/// - Files that are not valid UTF-8 are decoded as Latin-1 (common for spreadsheet exports).
/// - Column types are inferred like a dataframe reader (see [`ingest_csv_from_reader`]).
pub fn ingest_csv_from_path(
    path: impl AsRef<Path>,
    delimiter: Option<u8>,
) -> IngestionResult<RawTable> {
    let bytes = std::fs::read(path)?;
    let text = decode_text(bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(text));

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());
    ingest_csv_from_reader(&mut rdr)
}

/// Ingest CSV data from an existing CSV reader.
///
/// Rows shorter than the header read as empty cells; cells beyond the header width are
/// ignored. A column whose non-empty cells all parse as integers becomes integer, else float if
/// they all parse as floats, else text. Empty cells are [`Value::Null`].
pub fn ingest_csv_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
) -> IngestionResult<RawTable> {
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(IngestionError::EmptySource {
            message: "csv has no header row".to_string(),
        });
    }
    let width = headers.len();

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let row = (0..width)
            .map(|idx| record.get(idx).unwrap_or("").trim().to_owned())
            .collect();
        raw_rows.push(row);
    }

    let kinds: Vec<ColumnKind> = (0..width)
        .map(|idx| infer_column_kind(raw_rows.iter().map(|r| r[idx].as_str())))
        .collect();

    let rows = raw_rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(kinds.iter())
                .map(|(raw, kind)| parse_cell(raw, *kind))
                .collect()
        })
        .collect();

    Ok(RawTable::new(headers, rows))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Text,
}

fn infer_column_kind<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnKind {
    let mut kind = ColumnKind::Int;
    for cell in cells.filter(|c| !c.is_empty()) {
        if kind == ColumnKind::Int && cell.parse::<i64>().is_err() {
            kind = ColumnKind::Float;
        }
        if kind == ColumnKind::Float && cell.parse::<f64>().is_err() {
            return ColumnKind::Text;
        }
    }
    kind
}

fn parse_cell(raw: String, kind: ColumnKind) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    match kind {
        ColumnKind::Int => raw.parse::<i64>().map(Value::Int64).unwrap_or(Value::Utf8(raw)),
        ColumnKind::Float => raw.parse::<f64>().map(Value::Float64).unwrap_or(Value::Utf8(raw)),
        ColumnKind::Text => Value::Utf8(raw),
    }
}

/// Pick the candidate delimiter occurring most often on the first line.
fn detect_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or("");
    let mut best = b',';
    let mut best_count = 0;
    for d in CANDIDATE_DELIMITERS {
        let count = first_line.bytes().filter(|b| *b == d).count();
        if count > best_count {
            best = d;
            best_count = count;
        }
    }
    best
}

fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    }
}
