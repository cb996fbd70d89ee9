#![cfg(feature = "excel")]

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::{IngestionError, IngestionResult};
use crate::normalize::coerce::excel_serial_to_date;
use crate::types::{RawTable, Value};

/// Ingest one sheet of an Excel document (`.xlsx`, `.xls`, `.ods`, etc.) into a [`RawTable`].
///
/// Behavior:
/// - Picks `sheet_name` if provided; otherwise uses the first sheet in the workbook
/// - Detects the first non-empty row as the header row
/// - Keeps every column, including unlabeled and repeated ones
/// - Integral numbers become integers; date cells become ISO `YYYY-MM-DD` text
pub fn ingest_excel_from_path(
    path: impl AsRef<Path>,
    sheet_name: Option<&str>,
) -> IngestionResult<RawTable> {
    let mut workbook = open_workbook_auto(path)?;

    let sheet = match sheet_name {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| IngestionError::EmptySource {
                message: "workbook has no sheets".to_string(),
            })?,
    };

    let range = workbook.worksheet_range(&sheet)?;
    sheet_to_raw_table(&range).map_err(|e| wrap_err_with_sheet(&sheet, e))
}

fn wrap_err_with_sheet(sheet: &str, err: IngestionError) -> IngestionError {
    match err {
        IngestionError::EmptySource { message } => IngestionError::EmptySource {
            message: format!("sheet '{sheet}': {message}"),
        },
        other => other,
    }
}

fn sheet_to_raw_table(range: &calamine::Range<Data>) -> IngestionResult<RawTable> {
    let mut rows = range.rows().skip_while(|row| row.iter().all(is_blank));

    let header_row = rows.next().ok_or_else(|| IngestionError::EmptySource {
        message: "sheet has no non-empty rows (no header row found)".to_string(),
    })?;
    let headers: Vec<String> = header_row.iter().map(cell_to_header_string).collect();

    let body = rows
        .map(|row| {
            (0..headers.len())
                .map(|idx| row.get(idx).map(convert_cell).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Ok(RawTable::new(headers, body))
}

fn is_blank(c: &Data) -> bool {
    match c {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => match convert_cell(other) {
            Value::Utf8(s) => s,
            v => v.to_text().unwrap_or_default(),
        },
    }
}

fn convert_cell(c: &Data) -> Value {
    match c {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::Utf8(s.clone()),
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                Value::Int64(*f as i64)
            } else {
                Value::Float64(*f)
            }
        }
        Data::Bool(b) => Value::Utf8(b.to_string()),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64().trunc() as i64)
            .map(|d| Value::Utf8(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        Data::DateTimeIso(s) => Value::Utf8(s.clone()),
        Data::DurationIso(s) => Value::Utf8(s.clone()),
    }
}
