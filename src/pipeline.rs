//! One-call audit: ingest → normalize → analyze → render.

use std::path::Path;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::analysis::{assess_risk, compute_kpis, generate_alerts, AlertReport, Kpis, RiskAssessment};
use crate::config::{AnalysisConfig, NormalizerConfig};
use crate::error::IngestionResult;
use crate::ingestion::{ingest_from_path, IngestionOptions};
use crate::normalize::{normalize_table, Normalized};
use crate::report::render_report;
use crate::types::RawTable;

/// Everything produced by one audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditOutcome {
    pub normalized: Normalized,
    pub alerts: AlertReport,
    pub kpis: Kpis,
    pub risk: RiskAssessment,
    /// Rendered text report.
    pub report: String,
}

/// Audit an already-loaded table.
///
/// Never fails: normalization and the rule engines degrade instead of erroring.
pub fn audit_table(
    raw: &RawTable,
    normalizer: &NormalizerConfig,
    analysis: &AnalysisConfig,
    generated_at: NaiveDateTime,
) -> AuditOutcome {
    let normalized = normalize_table(raw, normalizer);
    let table = &normalized.table;

    let alerts = generate_alerts(table, analysis);
    let kpis = compute_kpis(table, analysis);
    let risk = assess_risk(table, analysis);
    let report = render_report(&alerts, &kpis, &risk, generated_at);

    tracing::debug!(
        records = table.len(),
        alerts = alerts.total(),
        urgent = risk.urgent,
        "audit complete"
    );

    AuditOutcome {
        normalized,
        alerts,
        kpis,
        risk,
        report,
    }
}

/// Ingest `path` and audit it. Ingestion errors are returned unchanged.
pub fn audit_path(
    path: impl AsRef<Path>,
    options: &IngestionOptions,
    normalizer: &NormalizerConfig,
    analysis: &AnalysisConfig,
    generated_at: NaiveDateTime,
) -> IngestionResult<AuditOutcome> {
    let raw = ingest_from_path(path, options)?;
    Ok(audit_table(&raw, normalizer, analysis, generated_at))
}
