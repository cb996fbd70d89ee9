//! `pharmacy-audit` loads pharmacy stock exports of unknown layout, normalizes them into a fixed
//! canonical schema, and derives alerts, KPIs, per-product risk scores and a text report.
//!
//! The primary entrypoints are [`pipeline::audit_path`] (file in, report out) and
//! [`normalize::normalize_table`] (raw table in, [`types::CanonicalTable`] out).
//!
//! ## What you can ingest
//!
//! **File formats (auto-detected by extension):**
//!
//! - **Delimited text**: `.csv`, `.txt` (delimiter detected among `;`, `,` and tab), `.tsv`
//! - **Excel/workbooks** (Cargo feature `excel`, on by default): `.xlsx`, `.xls`, `.xlsm`,
//!   `.xlsb`, `.ods`
//!
//! Ingestion keeps labels and cells as found ([`types::RawTable`]); all interpretation happens in
//! [`normalize`].
//!
//! ## Canonical schema
//!
//! Columns are mapped onto [`types::CanonicalField`] by label alias first, then by content
//! sniffing. Unmapped columns are carried along as passthrough text. Cells are coerced to the
//! field's type and malformed values degrade to defaults (`0`, `0.0`, a text sentinel, or no
//! date) instead of failing. Subtotal rows and duplicate product codes are dropped.
//!
//! ## Quick example
//!
//! ```no_run
//! use pharmacy_audit::config::{AnalysisConfig, NormalizerConfig};
//! use pharmacy_audit::ingestion::IngestionOptions;
//! use pharmacy_audit::pipeline::audit_path;
//!
//! # fn main() -> Result<(), pharmacy_audit::IngestionError> {
//! let outcome = audit_path(
//!     "stock.csv",
//!     &IngestionOptions::default(),
//!     &NormalizerConfig::default(),
//!     &AnalysisConfig::default(),
//!     chrono::Local::now().naive_local(),
//! )?;
//! println!("{}", outcome.report);
//! # Ok(())
//! # }
//! ```
//!
//! ## Normalizing an in-memory table
//!
//! ```rust
//! use pharmacy_audit::config::NormalizerConfig;
//! use pharmacy_audit::normalize::normalize_table;
//! use pharmacy_audit::types::{CanonicalField, RawTable, Value};
//!
//! let raw = RawTable::new(
//!     vec!["qte".into(), "Désignation".into()],
//!     vec![
//!         vec![Value::Int64(3), Value::Utf8("Doliprane 500".into())],
//!         vec![Value::Int64(9), Value::Utf8("TOTAL".into())],
//!     ],
//! );
//! let out = normalize_table(&raw, &NormalizerConfig::default());
//! assert_eq!(out.table.len(), 1);
//! assert!(out.table.has(CanonicalField::StockActuel));
//! assert_eq!(out.table.records[0].designation, "doliprane 500");
//! ```
//!
//! ## Batch execution
//!
//! [`execution::BatchEngine`] audits many files in parallel on a rayon pool, with metrics and an
//! observer hook.

pub mod analysis;
pub mod config;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod types;

pub use error::{IngestionError, IngestionResult};
