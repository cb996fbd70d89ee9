//! Schema normalization: raw spreadsheet table → [`CanonicalTable`].
//!
//! The pipeline runs in a fixed order, and the order matters:
//!
//! 1. duplicate raw labels are disambiguated ([`resolver::dedupe_labels`]),
//! 2. columns are resolved by alias, then by content sniffing ([`resolver::resolve_columns`]).
//!    Sniffing must see the untyped source strings, so it runs before any coercion,
//! 3. resolved columns are coerced to their semantic types ([`coerce::coerce_table`]),
//! 4. the typed table is cleaned and deduplicated ([`sanitize::sanitize`]). The subtotal filter
//!    sees coerced text, so sanitization runs last.
//!
//! Normalization is pure and never fails: malformed cells degrade to documented defaults and an
//! empty result is a valid table.
//!
//! ```rust
//! use pharmacy_audit::config::NormalizerConfig;
//! use pharmacy_audit::normalize::normalize_table;
//! use pharmacy_audit::types::{RawTable, Value};
//!
//! let raw = RawTable::new(
//!     vec!["Qté".into(), "PA HT".into(), "PV TTC".into(), "DLC".into(), "CIP".into()],
//!     vec![vec![
//!         Value::Int64(5),
//!         Value::Float64(10.0),
//!         Value::Float64(8.0),
//!         Value::Int64(44197),
//!         Value::Utf8("3400123456789".into()),
//!     ]],
//! );
//! let out = normalize_table(&raw, &NormalizerConfig::default());
//! let r = &out.table.records[0];
//! assert_eq!(r.stock_actuel, 5);
//! assert_eq!(r.code_cip, 3400123456789);
//! assert_eq!(r.date_peremption.unwrap().to_string(), "2021-01-01");
//! ```

pub mod coerce;
pub mod resolver;
pub mod sanitize;
pub mod text;

use serde::Serialize;

use crate::config::NormalizerConfig;
use crate::types::{CanonicalTable, RawTable};

pub use resolver::{ColumnResolution, ResolutionMethod};
pub use sanitize::SanitizeStats;

/// Per-run account of what normalization did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizationSummary {
    /// One entry per source column, in source order.
    pub resolutions: Vec<ColumnResolution>,
    pub rows_in: usize,
    pub rows_out: usize,
    #[serde(flatten)]
    pub dropped: SanitizeStats,
}

impl NormalizationSummary {
    /// Source labels that did not map to a canonical field.
    pub fn unmapped_labels(&self) -> impl Iterator<Item = &str> {
        self.resolutions
            .iter()
            .filter(|r| r.field.is_none())
            .map(|r| r.raw_label.as_str())
    }
}

/// Output of [`normalize_table`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Normalized {
    pub table: CanonicalTable,
    pub summary: NormalizationSummary,
}

/// Normalize a raw table into the canonical schema.
pub fn normalize_table(raw: &RawTable, config: &NormalizerConfig) -> Normalized {
    let labelled = RawTable::new(resolver::dedupe_labels(&raw.headers), raw.rows.clone());

    let resolutions = resolver::resolve_columns(&labelled, config);
    for r in &resolutions {
        match r.field {
            Some(field) => tracing::debug!(column = %r.raw_label, %field, method = ?r.method, "column resolved"),
            None => tracing::debug!(column = %r.raw_label, "column unmapped; kept as passthrough"),
        }
    }

    let coerced = coerce::coerce_table(&labelled, &resolutions);
    let (table, dropped) = sanitize::sanitize(coerced);

    let summary = NormalizationSummary {
        resolutions,
        rows_in: raw.row_count(),
        rows_out: table.len(),
        dropped,
    };
    tracing::info!(
        rows_in = summary.rows_in,
        rows_out = summary.rows_out,
        empty_columns = dropped.empty_columns_dropped,
        empty_rows = dropped.empty_rows_dropped,
        total_rows = dropped.total_rows_dropped,
        duplicates = dropped.duplicates_dropped,
        "normalized inventory table"
    );

    Normalized { table, summary }
}
