//! Type coercion of resolved columns.
//!
//! Coercion never fails. Unparseable numbers become 0 / 0.0, unparseable dates become null,
//! and free text is normalized. Cells that were empty in the source stay [`Cell::Empty`] until
//! the sanitizer has made its structural decisions (empty rows/columns), after which they take
//! the same defaults.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};

use crate::types::{CanonicalField, FieldKind, RawTable, Value};

use super::resolver::ColumnResolution;
use super::text::{normalize_label, normalize_text};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%d/%m/%y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// A coerced cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// The source cell was empty.
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
    /// A non-empty source cell coerced to a date; `None` if it was not a date.
    Date(Option<NaiveDate>),
}

impl Cell {
    /// `true` when the cell carries no value (empty source or not-a-date).
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Empty | Cell::Date(None))
    }

    /// Text cast used by the subtotal filter, `None` for nulls.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Cell::Empty | Cell::Date(None) => None,
            Cell::Int(v) => Some(v.to_string()),
            Cell::Float(v) => Some(format!("{v:?}")),
            Cell::Text(s) => Some(s.clone()),
            Cell::Date(Some(d)) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }
}

/// Where a coerced column goes in the canonical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnTarget {
    Field(CanonicalField),
    /// Unmapped passthrough column, kept under its (deduplicated) source label. A label that
    /// normalizes to a canonical field name gets the next free `_n` suffix.
    Extra(String),
}

/// Column-resolved, typed table handed to the sanitizer.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercedTable {
    pub columns: Vec<ColumnTarget>,
    pub rows: Vec<Vec<Cell>>,
}

/// Coerce every column of `raw` according to `resolutions` (one per column).
///
/// The date column is coerced first, then numeric columns, then text and passthrough columns.
pub fn coerce_table(raw: &RawTable, resolutions: &[ColumnResolution]) -> CoercedTable {
    let mut taken: HashSet<String> = resolutions.iter().map(|r| r.raw_label.clone()).collect();
    let columns: Vec<ColumnTarget> = resolutions
        .iter()
        .map(|r| match r.field {
            Some(f) => ColumnTarget::Field(f),
            None => ColumnTarget::Extra(passthrough_label(&r.raw_label, &mut taken)),
        })
        .collect();

    let mut order: Vec<usize> = (0..columns.len()).collect();
    order.sort_by_key(|&idx| coercion_rank(&columns[idx]));

    let mut coerced: Vec<Vec<Cell>> = vec![Vec::new(); columns.len()];
    for idx in order {
        coerced[idx] = raw
            .column(idx)
            .map(|v| coerce_cell(&columns[idx], v))
            .collect();
    }

    let rows = (0..raw.row_count())
        .map(|row| coerced.iter().map(|col| col[row].clone()).collect())
        .collect();

    CoercedTable { columns, rows }
}

fn passthrough_label(label: &str, taken: &mut HashSet<String>) -> String {
    if CanonicalField::from_name(&normalize_label(label)).is_none() {
        return label.to_string();
    }
    let renamed = (1..)
        .map(|n| format!("{label}_{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| format!("{label}_extra"));
    tracing::debug!(column = %label, renamed = %renamed, "passthrough label collides with a canonical name");
    taken.insert(renamed.clone());
    renamed
}

fn coercion_rank(target: &ColumnTarget) -> u8 {
    match target {
        ColumnTarget::Field(f) => match f.kind() {
            FieldKind::Date => 0,
            FieldKind::Integer | FieldKind::Float => 1,
            FieldKind::Text => 2,
        },
        ColumnTarget::Extra(_) => 3,
    }
}

/// Coerce one source cell for `target`.
pub fn coerce_cell(target: &ColumnTarget, value: &Value) -> Cell {
    let Some(text) = value.to_text() else {
        return Cell::Empty;
    };
    let field = match target {
        ColumnTarget::Extra(_) => return Cell::Text(text.trim().to_string()),
        ColumnTarget::Field(f) => *f,
    };

    match field.kind() {
        FieldKind::Date => Cell::Date(coerce_date(value)),
        FieldKind::Integer => {
            let v = coerce_integer(value);
            match field {
                CanonicalField::StockActuel | CanonicalField::StockMin => Cell::Int(v.max(0)),
                _ => Cell::Int(v),
            }
        }
        FieldKind::Float => Cell::Float(coerce_float(value)),
        FieldKind::Text => Cell::Text(normalize_text(&text)),
    }
}

/// Numeric cells are spreadsheet serial days from 1899-12-30 (truncated); text goes through
/// [`parse_date_text`]. Anything else is `None`.
pub fn coerce_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Int64(days) => excel_serial_to_date(*days),
        Value::Float64(days) if days.is_finite() => excel_serial_to_date(days.trunc() as i64),
        Value::Utf8(s) => parse_date_text(s),
        _ => None,
    }
}

/// Convert a spreadsheet serial day count (epoch 1899-12-30) to a date.
///
/// ```
/// use chrono::NaiveDate;
/// use pharmacy_audit::normalize::coerce::excel_serial_to_date;
///
/// assert_eq!(excel_serial_to_date(44197), NaiveDate::from_ymd_opt(2021, 1, 1));
/// ```
pub fn excel_serial_to_date(days: i64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(TimeDelta::try_days(days)?)
}

/// Parse a date string in the common ISO and day-first layouts.
///
/// Also accepts full timestamps (time is dropped), RFC 3339, and month/year expiry notation
/// (`03/2026` → 2026-03-01).
pub fn parse_date_text(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    parse_month_year(s)
}

fn parse_month_year(s: &str) -> Option<NaiveDate> {
    let (month, year) = s.split_once('/')?;
    if month.is_empty() || month.len() > 2 || year.len() != 4 {
        return None;
    }
    let month: u32 = month.parse().ok()?;
    let year: i32 = year.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Integer coercion: numbers truncate, strings parse as integer or float, otherwise 0.
pub fn coerce_integer(value: &Value) -> i64 {
    match value {
        Value::Int64(v) => *v,
        Value::Float64(v) if v.is_finite() => v.trunc() as i64,
        Value::Utf8(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().unwrap_or_else(|| match parse_number(s) {
                Some(f) if f.is_finite() => f.trunc() as i64,
                _ => 0,
            })
        }
        _ => 0,
    }
}

/// Float coercion: numbers pass through, strings parse, otherwise 0.0.
pub fn coerce_float(value: &Value) -> f64 {
    let v = match value {
        Value::Int64(v) => *v as f64,
        Value::Float64(v) => *v,
        Value::Utf8(s) => parse_number(s.trim()).unwrap_or(0.0),
        Value::Null => 0.0,
    };
    if v.is_finite() { v } else { 0.0 }
}

/// Parse a number written with either a decimal point or a single decimal comma (`4,25`).
fn parse_number(s: &str) -> Option<f64> {
    if let Ok(v) = s.parse::<f64>() {
        return Some(v);
    }
    if s.contains('.') || s.matches(',').count() != 1 {
        return None;
    }
    s.replacen(',', ".", 1).parse().ok()
}
