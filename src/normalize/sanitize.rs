//! Structural cleanup and deduplication of a coerced table.

use std::collections::HashSet;

use serde::Serialize;

use crate::types::{CanonicalField, CanonicalRecord, CanonicalTable};

use super::coerce::{Cell, CoercedTable, ColumnTarget};

/// Substring (case-insensitive) that marks subtotal/footer rows.
const TOTAL_MARKER: &str = "total";

/// What the sanitizer removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SanitizeStats {
    pub empty_columns_dropped: usize,
    pub empty_rows_dropped: usize,
    pub total_rows_dropped: usize,
    pub duplicates_dropped: usize,
}

/// Run the cleanup steps in order and materialize the canonical table:
///
/// 1. drop columns with no non-null cell,
/// 2. drop rows with no non-null cell,
/// 3. drop rows where any cell contains "total" (any case),
/// 4. keep only the first record per `code_cip`,
/// 5. fill remaining nulls with field defaults and text sentinels.
///
/// Presence (`present_fields`, `extra_columns`) is taken from the surviving rows only.
pub fn sanitize(table: CoercedTable) -> (CanonicalTable, SanitizeStats) {
    let mut stats = SanitizeStats::default();
    let CoercedTable { columns, rows } = table;

    let keep_cols: Vec<usize> = (0..columns.len())
        .filter(|&c| rows.iter().any(|r| !r[c].is_null()))
        .collect();
    stats.empty_columns_dropped = columns.len() - keep_cols.len();
    let columns: Vec<ColumnTarget> = keep_cols.iter().map(|&c| columns[c].clone()).collect();
    let rows: Vec<Vec<Cell>> = rows
        .into_iter()
        .map(|r| keep_cols.iter().map(|&c| r[c].clone()).collect())
        .collect();

    let before = rows.len();
    let rows: Vec<Vec<Cell>> = rows
        .into_iter()
        .filter(|r| r.iter().any(|c| !c.is_null()))
        .collect();
    stats.empty_rows_dropped = before - rows.len();

    let before = rows.len();
    let rows: Vec<Vec<Cell>> = rows.into_iter().filter(|r| !is_total_row(r)).collect();
    stats.total_rows_dropped = before - rows.len();

    let rows = match columns
        .iter()
        .position(|c| *c == ColumnTarget::Field(CanonicalField::CodeCip))
    {
        Some(cip_idx) => {
            let before = rows.len();
            let mut seen = HashSet::new();
            let rows: Vec<Vec<Cell>> = rows
                .into_iter()
                .filter(|r| seen.insert(cip_key(&r[cip_idx])))
                .collect();
            stats.duplicates_dropped = before - rows.len();
            rows
        }
        None => rows,
    };

    // Row drops can leave a column with no value at all; it is then neither present nor kept.
    let live: Vec<usize> = (0..columns.len())
        .filter(|&c| rows.iter().any(|r| !r[c].is_null()))
        .collect();
    let columns: Vec<ColumnTarget> = live.iter().map(|&c| columns[c].clone()).collect();
    let rows: Vec<Vec<Cell>> = rows
        .into_iter()
        .map(|r| live.iter().map(|&c| r[c].clone()).collect())
        .collect();

    let mut present_fields: Vec<CanonicalField> = columns
        .iter()
        .filter_map(|c| match c {
            ColumnTarget::Field(f) => Some(*f),
            ColumnTarget::Extra(_) => None,
        })
        .collect();
    present_fields.sort();
    let extra_columns: Vec<String> = columns
        .iter()
        .filter_map(|c| match c {
            ColumnTarget::Extra(label) => Some(label.clone()),
            ColumnTarget::Field(_) => None,
        })
        .collect();

    let records = rows
        .into_iter()
        .map(|r| build_record(&columns, r))
        .collect();

    (
        CanonicalTable {
            present_fields,
            extra_columns,
            records,
        },
        stats,
    )
}

fn is_total_row(row: &[Cell]) -> bool {
    row.iter()
        .filter_map(Cell::to_text)
        .any(|t| t.to_lowercase().contains(TOTAL_MARKER))
}

/// Dedup key for the product code; an empty cell counts as the default 0.
fn cip_key(cell: &Cell) -> i64 {
    match cell {
        Cell::Int(v) => *v,
        _ => 0,
    }
}

fn build_record(columns: &[ColumnTarget], row: Vec<Cell>) -> CanonicalRecord {
    let mut record = CanonicalRecord::default();
    for (target, cell) in columns.iter().zip(row) {
        match target {
            ColumnTarget::Extra(_) => record.extras.push(cell.to_text()),
            ColumnTarget::Field(field) => apply_field(&mut record, *field, cell),
        }
    }
    record
}

fn apply_field(record: &mut CanonicalRecord, field: CanonicalField, cell: Cell) {
    match field {
        CanonicalField::CodeCip => record.code_cip = int_or_zero(cell),
        CanonicalField::StockActuel => record.stock_actuel = int_or_zero(cell),
        CanonicalField::StockMin => record.stock_min = int_or_zero(cell),
        CanonicalField::PrixAchatHt => record.prix_achat_ht = float_or_zero(cell),
        CanonicalField::PrixVenteTtc => record.prix_vente_ttc = float_or_zero(cell),
        CanonicalField::DatePeremption => {
            record.date_peremption = match cell {
                Cell::Date(d) => d,
                _ => None,
            }
        }
        CanonicalField::Designation => set_text(&mut record.designation, cell),
        CanonicalField::Categorie => set_text(&mut record.categorie, cell),
        CanonicalField::Fournisseur => set_text(&mut record.fournisseur, cell),
        CanonicalField::EmplacementRayon => set_text(&mut record.emplacement_rayon, cell),
    }
}

fn int_or_zero(cell: Cell) -> i64 {
    match cell {
        Cell::Int(v) => v,
        _ => 0,
    }
}

fn float_or_zero(cell: Cell) -> f64 {
    match cell {
        Cell::Float(v) => v,
        _ => 0.0,
    }
}

/// Replace the sentinel already in `slot` when the cell carries text.
fn set_text(slot: &mut String, cell: Cell) {
    if let Cell::Text(s) = cell {
        *slot = s;
    }
}
