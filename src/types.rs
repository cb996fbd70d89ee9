//! Core data model: the untyped [`RawTable`] produced by ingestion and the typed
//! [`CanonicalTable`] produced by [`crate::normalize`].

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single untyped cell as read from a source file.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// Returns `true` for [`Value::Null`] and for strings that are blank after trimming.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Utf8(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Returns `true` for numeric cells.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int64(_) | Value::Float64(_))
    }

    /// String cast of the cell, `None` when empty.
    ///
    /// Floats always keep a fractional part (`5.0`, not `5`) so that a float column never looks
    /// like a pure-integer column to content sniffing.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Int64(v) => Some(v.to_string()),
            Value::Float64(v) => Some(format!("{v:?}")),
            Value::Utf8(s) if s.trim().is_empty() => None,
            Value::Utf8(s) => Some(s.clone()),
        }
    }
}

/// In-memory table exactly as read from the source.
///
/// Headers are positional and may repeat; rows may be shorter than the header (missing cells
/// read as [`Value::Null`]).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    /// Column labels in source order.
    pub headers: Vec<String>,
    /// Row-major cell storage.
    pub rows: Vec<Vec<Value>>,
}

impl RawTable {
    /// Create a raw table from headers and rows.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { headers, rows }
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns (header length).
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Cell at (`row`, `col`), [`Value::Null`] when the row is ragged.
    pub fn cell(&self, row: usize, col: usize) -> &Value {
        static NULL: Value = Value::Null;
        self.rows.get(row).and_then(|r| r.get(col)).unwrap_or(&NULL)
    }

    /// Iterate every cell of column `col` in row order.
    pub fn column(&self, col: usize) -> impl Iterator<Item = &Value> + '_ {
        (0..self.rows.len()).map(move |row| self.cell(row, col))
    }
}

/// Semantic type of a [`CanonicalField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Truncated integer, defaults to 0.
    Integer,
    /// Float, defaults to 0.0.
    Float,
    /// Trimmed, lowercased, diacritic-free text; defaults to a sentinel.
    Text,
    /// Calendar date, defaults to null.
    Date,
}

/// The fixed set of fields every downstream rule depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    CodeCip,
    Designation,
    Categorie,
    Fournisseur,
    EmplacementRayon,
    StockActuel,
    StockMin,
    PrixAchatHt,
    PrixVenteTtc,
    DatePeremption,
}

impl CanonicalField {
    /// All fields, in canonical column order.
    pub const ALL: [CanonicalField; 10] = [
        CanonicalField::CodeCip,
        CanonicalField::Designation,
        CanonicalField::Categorie,
        CanonicalField::Fournisseur,
        CanonicalField::EmplacementRayon,
        CanonicalField::StockActuel,
        CanonicalField::StockMin,
        CanonicalField::PrixAchatHt,
        CanonicalField::PrixVenteTtc,
        CanonicalField::DatePeremption,
    ];

    /// Column name of the field in the canonical table.
    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::CodeCip => "code_cip",
            CanonicalField::Designation => "designation",
            CanonicalField::Categorie => "categorie",
            CanonicalField::Fournisseur => "fournisseur",
            CanonicalField::EmplacementRayon => "emplacement_rayon",
            CanonicalField::StockActuel => "stock_actuel",
            CanonicalField::StockMin => "stock_min",
            CanonicalField::PrixAchatHt => "prix_achat_ht",
            CanonicalField::PrixVenteTtc => "prix_vente_ttc",
            CanonicalField::DatePeremption => "date_peremption",
        }
    }

    /// Look a field up by its canonical column name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Semantic type the field is coerced to.
    pub fn kind(self) -> FieldKind {
        match self {
            CanonicalField::CodeCip | CanonicalField::StockActuel | CanonicalField::StockMin => {
                FieldKind::Integer
            }
            CanonicalField::PrixAchatHt | CanonicalField::PrixVenteTtc => FieldKind::Float,
            CanonicalField::DatePeremption => FieldKind::Date,
            CanonicalField::Designation
            | CanonicalField::Categorie
            | CanonicalField::Fournisseur
            | CanonicalField::EmplacementRayon => FieldKind::Text,
        }
    }

    /// Sentinel used for missing free-text values, `None` for non-text fields.
    pub fn text_sentinel(self) -> Option<&'static str> {
        match self {
            CanonicalField::Designation => Some("non_specifie"),
            CanonicalField::Categorie => Some("inconnue"),
            CanonicalField::Fournisseur => Some("inconnu"),
            CanonicalField::EmplacementRayon => Some("non_renseigne"),
            _ => None,
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One product line of the canonical table.
///
/// Every field is always populated: fields absent from the source hold their default (0, 0.0,
/// the text sentinel, or `None` for the date). Use [`CanonicalTable::has`] to know whether a
/// field actually came from the source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub code_cip: i64,
    pub designation: String,
    pub categorie: String,
    pub fournisseur: String,
    pub emplacement_rayon: String,
    pub stock_actuel: i64,
    pub stock_min: i64,
    pub prix_achat_ht: f64,
    pub prix_vente_ttc: f64,
    pub date_peremption: Option<NaiveDate>,
    /// Passthrough cells for [`CanonicalTable::extra_columns`], same order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extras: Vec<Option<String>>,
}

impl Default for CanonicalRecord {
    fn default() -> Self {
        Self {
            code_cip: 0,
            designation: "non_specifie".to_string(),
            categorie: "inconnue".to_string(),
            fournisseur: "inconnu".to_string(),
            emplacement_rayon: "non_renseigne".to_string(),
            stock_actuel: 0,
            stock_min: 0,
            prix_achat_ht: 0.0,
            prix_vente_ttc: 0.0,
            date_peremption: None,
            extras: Vec::new(),
        }
    }
}

impl CanonicalRecord {
    /// The value of `field` as an untyped cell (dates render as ISO `YYYY-MM-DD`).
    pub fn value_of(&self, field: CanonicalField) -> Value {
        match field {
            CanonicalField::CodeCip => Value::Int64(self.code_cip),
            CanonicalField::Designation => Value::Utf8(self.designation.clone()),
            CanonicalField::Categorie => Value::Utf8(self.categorie.clone()),
            CanonicalField::Fournisseur => Value::Utf8(self.fournisseur.clone()),
            CanonicalField::EmplacementRayon => Value::Utf8(self.emplacement_rayon.clone()),
            CanonicalField::StockActuel => Value::Int64(self.stock_actuel),
            CanonicalField::StockMin => Value::Int64(self.stock_min),
            CanonicalField::PrixAchatHt => Value::Float64(self.prix_achat_ht),
            CanonicalField::PrixVenteTtc => Value::Float64(self.prix_vente_ttc),
            CanonicalField::DatePeremption => self
                .date_peremption
                .map(|d| Value::Utf8(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null),
        }
    }

    /// Unit margin (sale price minus purchase price).
    pub fn margin(&self) -> f64 {
        self.prix_vente_ttc - self.prix_achat_ht
    }

    /// Stock rotation proxy: current stock over minimum stock (a minimum of 0 counts as 1).
    pub fn rotation(&self) -> f64 {
        let min = if self.stock_min == 0 { 1 } else { self.stock_min };
        self.stock_actuel as f64 / min as f64
    }
}

/// Normalized inventory table.
///
/// Record order is source order minus dropped rows. No two records share a `code_cip` when
/// that field is present.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CanonicalTable {
    /// Canonical fields that were resolved from the source, in canonical order.
    pub present_fields: Vec<CanonicalField>,
    /// Labels of source columns that did not map to any canonical field.
    pub extra_columns: Vec<String>,
    /// Records in ingestion order.
    pub records: Vec<CanonicalRecord>,
}

impl CanonicalTable {
    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if the table has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `true` if `field` was resolved from the source.
    pub fn has(&self, field: CanonicalField) -> bool {
        self.present_fields.contains(&field)
    }

    /// `true` if every field in `fields` was resolved from the source.
    pub fn has_all(&self, fields: &[CanonicalField]) -> bool {
        fields.iter().all(|f| self.has(*f))
    }

    /// Indices of records for which `predicate` returns `true`, in table order.
    pub fn filter_indices<F>(&self, mut predicate: F) -> Vec<usize>
    where
        F: FnMut(&CanonicalRecord) -> bool,
    {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| predicate(r))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Render the table back into a [`RawTable`] with canonical labels.
    ///
    /// Only present fields and passthrough columns are emitted, so normalizing the result
    /// yields this table again.
    pub fn to_raw_table(&self) -> RawTable {
        let headers = self
            .present_fields
            .iter()
            .map(|f| f.name().to_string())
            .chain(self.extra_columns.iter().cloned())
            .collect();

        let rows = self
            .records
            .iter()
            .map(|r| {
                self.present_fields
                    .iter()
                    .map(|f| r.value_of(*f))
                    .chain(
                        r.extras
                            .iter()
                            .map(|e| e.clone().map(Value::Utf8).unwrap_or(Value::Null)),
                    )
                    .collect()
            })
            .collect();

        RawTable::new(headers, rows)
    }

    /// Serialize the table as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_text_keeps_fraction() {
        assert_eq!(Value::Float64(5.0).to_text().as_deref(), Some("5.0"));
        assert_eq!(Value::Float64(12.5).to_text().as_deref(), Some("12.5"));
        assert_eq!(Value::Int64(5).to_text().as_deref(), Some("5"));
        assert_eq!(Value::Utf8("  ".to_string()).to_text(), None);
        assert_eq!(Value::Null.to_text(), None);
    }

    #[test]
    fn ragged_rows_read_as_null() {
        let t = RawTable::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![Value::Int64(1)]],
        );
        assert_eq!(t.cell(0, 0), &Value::Int64(1));
        assert_eq!(t.cell(0, 1), &Value::Null);
        assert_eq!(t.cell(5, 0), &Value::Null);
        assert_eq!(t.column(1).count(), 1);
    }

    #[test]
    fn field_names_round_trip() {
        for f in CanonicalField::ALL {
            assert_eq!(CanonicalField::from_name(f.name()), Some(f));
        }
        assert_eq!(CanonicalField::from_name("qte"), None);
    }

    #[test]
    fn rotation_treats_zero_minimum_as_one() {
        let r = CanonicalRecord {
            stock_actuel: 6,
            stock_min: 0,
            ..Default::default()
        };
        assert_eq!(r.rotation(), 6.0);

        let r = CanonicalRecord {
            stock_actuel: 6,
            stock_min: 12,
            ..Default::default()
        };
        assert_eq!(r.rotation(), 0.5);
    }

    #[test]
    fn to_raw_table_emits_present_fields_and_extras() {
        let table = CanonicalTable {
            present_fields: vec![CanonicalField::CodeCip, CanonicalField::DatePeremption],
            extra_columns: vec!["Remarque".to_string()],
            records: vec![CanonicalRecord {
                code_cip: 3400123456789,
                date_peremption: NaiveDate::from_ymd_opt(2021, 1, 1),
                extras: vec![None],
                ..Default::default()
            }],
        };

        let raw = table.to_raw_table();
        assert_eq!(raw.headers, vec!["code_cip", "date_peremption", "Remarque"]);
        assert_eq!(
            raw.rows[0],
            vec![
                Value::Int64(3400123456789),
                Value::Utf8("2021-01-01".to_string()),
                Value::Null,
            ]
        );
    }
}
