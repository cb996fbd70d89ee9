//! Alert engine: per-rule lists of flagged records.

use std::collections::HashMap;

use chrono::TimeDelta;
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::types::{CanonicalField, CanonicalRecord, CanonicalTable};

use super::{count_by, CountEntry};

/// Kinds of stock alerts, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Expiry date before the reference date.
    Perimes,
    /// Expiry date within the expiry window.
    BientotPerimes,
    /// Zero stock.
    Ruptures,
    /// Stock at or below its minimum.
    StockCritique,
    /// Sale price below purchase price.
    PrixAnormal,
    /// Product code shared by more than one record.
    CipDuplique,
    /// High stock close to expiry (first-expired-first-out risk).
    FefoRisque,
}

impl AlertKind {
    pub const ALL: [AlertKind; 7] = [
        AlertKind::Perimes,
        AlertKind::BientotPerimes,
        AlertKind::Ruptures,
        AlertKind::StockCritique,
        AlertKind::PrixAnormal,
        AlertKind::CipDuplique,
        AlertKind::FefoRisque,
    ];

    /// Human-readable label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            AlertKind::Perimes => "Périmés",
            AlertKind::BientotPerimes => "Bientôt périmés",
            AlertKind::Ruptures => "Ruptures",
            AlertKind::StockCritique => "Stock critique",
            AlertKind::PrixAnormal => "Prix anormal",
            AlertKind::CipDuplique => "CIP dupliqué",
            AlertKind::FefoRisque => "Risque FEFO",
        }
    }

    /// Fields that must be present in the table for the rule to fire.
    pub fn required_fields(self) -> &'static [CanonicalField] {
        match self {
            AlertKind::Perimes | AlertKind::BientotPerimes => &[CanonicalField::DatePeremption],
            AlertKind::Ruptures => &[CanonicalField::StockActuel],
            AlertKind::StockCritique => &[CanonicalField::StockActuel, CanonicalField::StockMin],
            AlertKind::PrixAnormal => &[CanonicalField::PrixAchatHt, CanonicalField::PrixVenteTtc],
            AlertKind::CipDuplique => &[CanonicalField::CodeCip],
            AlertKind::FefoRisque => &[
                CanonicalField::DatePeremption,
                CanonicalField::StockActuel,
                CanonicalField::StockMin,
            ],
        }
    }
}

/// Records flagged by one rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEntry {
    pub kind: AlertKind,
    /// `false` when the rule's fields were absent and it was skipped.
    pub evaluated: bool,
    /// Indices into [`CanonicalTable::records`], in table order.
    pub records: Vec<usize>,
}

/// Output of [`generate_alerts`]: one entry per [`AlertKind`], in [`AlertKind::ALL`] order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertReport {
    pub entries: Vec<AlertEntry>,
}

impl AlertReport {
    /// Indices of the records flagged by `kind`.
    pub fn records(&self, kind: AlertKind) -> &[usize] {
        self.entries
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.records.as_slice())
            .unwrap_or(&[])
    }

    /// Number of records flagged by `kind`.
    pub fn count(&self, kind: AlertKind) -> usize {
        self.records(kind).len()
    }

    /// Total number of flags across every rule (a record may count more than once).
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.records.len()).sum()
    }

    /// Category breakdown of the records flagged by `kind`.
    ///
    /// Empty when the table carries no category column.
    pub fn by_category(&self, kind: AlertKind, table: &CanonicalTable) -> Vec<CountEntry> {
        if !table.has(CanonicalField::Categorie) {
            return Vec::new();
        }
        count_by(
            self.records(kind)
                .iter()
                .filter_map(|idx| table.records.get(*idx))
                .map(|r| r.categorie.as_str()),
        )
    }
}

/// Evaluate every alert rule over `table`.
pub fn generate_alerts(table: &CanonicalTable, config: &AnalysisConfig) -> AlertReport {
    let duplicated_codes = duplicated_codes(table);

    let entries = AlertKind::ALL
        .into_iter()
        .map(|kind| {
            if !table.has_all(kind.required_fields()) {
                return AlertEntry {
                    kind,
                    evaluated: false,
                    records: Vec::new(),
                };
            }
            let records = table.filter_indices(|r| match kind {
                AlertKind::CipDuplique => duplicated_codes.get(&r.code_cip).is_some_and(|n| *n > 1),
                _ => fires(kind, r, config),
            });
            AlertEntry {
                kind,
                evaluated: true,
                records,
            }
        })
        .collect();

    AlertReport { entries }
}

fn fires(kind: AlertKind, r: &CanonicalRecord, config: &AnalysisConfig) -> bool {
    match kind {
        AlertKind::Perimes => is_expired(r, config),
        AlertKind::BientotPerimes => is_expiring_soon(r, config),
        AlertKind::Ruptures => r.stock_actuel == 0,
        AlertKind::StockCritique => r.stock_actuel <= r.stock_min,
        AlertKind::PrixAnormal => r.prix_vente_ttc < r.prix_achat_ht,
        AlertKind::FefoRisque => is_expiring_soon(r, config) && is_overstocked(r, config),
        AlertKind::CipDuplique => false,
    }
}

fn duplicated_codes(table: &CanonicalTable) -> HashMap<i64, usize> {
    let mut counts = HashMap::new();
    for r in &table.records {
        *counts.entry(r.code_cip).or_insert(0) += 1;
    }
    counts
}

/// `true` if the record's expiry date is strictly before the reference date.
pub(crate) fn is_expired(r: &CanonicalRecord, config: &AnalysisConfig) -> bool {
    r.date_peremption.is_some_and(|d| d < config.today)
}

/// `true` if the expiry date falls within `[today, today + window]`.
pub(crate) fn is_expiring_soon(r: &CanonicalRecord, config: &AnalysisConfig) -> bool {
    let horizon = TimeDelta::try_days(config.expiry_window_days)
        .and_then(|w| config.today.checked_add_signed(w))
        .unwrap_or(config.today);
    r.date_peremption
        .is_some_and(|d| d >= config.today && d <= horizon)
}

/// `true` if stock exceeds the FEFO multiple of the minimum (a minimum of 0 counts as 1).
pub(crate) fn is_overstocked(r: &CanonicalRecord, config: &AnalysisConfig) -> bool {
    let min = r.stock_min.max(1) as f64;
    r.stock_actuel as f64 > config.fefo_stock_multiplier * min
}
