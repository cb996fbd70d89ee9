//! Rule engines over a normalized [`crate::types::CanonicalTable`].
//!
//! Every engine is a pure function of the table and an [`crate::config::AnalysisConfig`].
//! Rules check [`crate::types::CanonicalTable::has`] before reading a field: a rule whose
//! inputs were not present in the source simply does not fire.

pub mod alerts;
pub mod kpis;
pub mod risk;

use serde::Serialize;

pub use alerts::{generate_alerts, AlertEntry, AlertKind, AlertReport};
pub use kpis::{compute_kpis, Kpis, RotationEntry};
pub use risk::{assess_risk, recommendations_for, RiskAssessment, RiskContext, RiskEntry, RiskTier};

/// One bucket of a distribution (category, supplier, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountEntry {
    pub label: String,
    pub count: usize,
}

/// Count occurrences of each label.
///
/// Buckets are ordered by descending count; ties keep the order of first appearance.
pub(crate) fn count_by<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<CountEntry> {
    let mut out: Vec<CountEntry> = Vec::new();
    for label in labels {
        match out.iter_mut().find(|e| e.label == label) {
            Some(e) => e.count += 1,
            None => out.push(CountEntry {
                label: label.to_string(),
                count: 1,
            }),
        }
    }
    // Stable sort keeps first-appearance order among equal counts.
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}
