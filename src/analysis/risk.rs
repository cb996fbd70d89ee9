//! Per-record composite risk score and recommendations.
//!
//! The score is the sum of the [`crate::config::RiskWeights`] of every rule that fires,
//! clipped to `0..=100`. Rules only fire when their fields are present in the table.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::types::{CanonicalField, CanonicalRecord, CanonicalTable};

use super::alerts::{is_expired, is_expiring_soon, is_overstocked};

const MAX_SCORE: u32 = 100;

/// Recommendation tier derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    ActionUrgente,
    Surveillance,
    RisqueFaible,
}

impl RiskTier {
    /// Tier for `score` under the thresholds of `config`.
    pub fn for_score(score: u32, config: &AnalysisConfig) -> Self {
        if score >= config.urgent_at {
            RiskTier::ActionUrgente
        } else if score >= config.watch_at {
            RiskTier::Surveillance
        } else {
            RiskTier::RisqueFaible
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskTier::ActionUrgente => "Action urgente",
            RiskTier::Surveillance => "Surveillance",
            RiskTier::RisqueFaible => "Risque faible",
        }
    }
}

/// Precomputed inputs of [`recommendations_for`] besides the record itself.
#[derive(Debug, Clone, Copy)]
pub struct RiskContext<'a> {
    pub config: &'a AnalysisConfig,
    /// Fields present in the source table.
    pub present: &'a [CanonicalField],
    pub rotation: f64,
    pub margin: f64,
    /// Share of the table's records coming from the record's supplier, `0.0` if unknown.
    pub supplier_share: f64,
}

impl RiskContext<'_> {
    fn has(&self, fields: &[CanonicalField]) -> bool {
        fields.iter().all(|f| self.present.contains(f))
    }
}

/// Score, tier and explanations for one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskEntry {
    pub index: usize,
    pub code_cip: i64,
    pub designation: String,
    pub score: u32,
    pub tier: RiskTier,
    /// One line per rule that contributed to the score.
    pub justifications: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Output of [`assess_risk`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RiskAssessment {
    pub entries: Vec<RiskEntry>,
    /// Mean score, `0.0` for an empty table.
    pub mean_score: f64,
    pub urgent: usize,
    pub watch: usize,
    pub low: usize,
}

impl RiskAssessment {
    /// Entries at `tier`, in table order.
    pub fn in_tier(&self, tier: RiskTier) -> impl Iterator<Item = &RiskEntry> + '_ {
        self.entries.iter().filter(move |e| e.tier == tier)
    }
}

/// Score every record of `table`.
pub fn assess_risk(table: &CanonicalTable, config: &AnalysisConfig) -> RiskAssessment {
    let shares = supplier_shares(table);

    let entries: Vec<RiskEntry> = table
        .records
        .iter()
        .enumerate()
        .map(|(index, r)| {
            let ctx = RiskContext {
                config,
                present: &table.present_fields,
                rotation: r.rotation(),
                margin: r.margin(),
                supplier_share: shares.get(r.fournisseur.as_str()).copied().unwrap_or(0.0),
            };
            let (score, justifications) = score_record(r, &ctx);
            RiskEntry {
                index,
                code_cip: r.code_cip,
                designation: r.designation.clone(),
                score,
                tier: RiskTier::for_score(score, config),
                justifications,
                recommendations: recommendations_for(r, &ctx),
            }
        })
        .collect();

    let mean_score = if entries.is_empty() {
        0.0
    } else {
        entries.iter().map(|e| f64::from(e.score)).sum::<f64>() / entries.len() as f64
    };
    let tally = |tier: RiskTier| entries.iter().filter(|e| e.tier == tier).count();

    RiskAssessment {
        mean_score,
        urgent: tally(RiskTier::ActionUrgente),
        watch: tally(RiskTier::Surveillance),
        low: tally(RiskTier::RisqueFaible),
        entries,
    }
}

/// Share of records per known supplier.
///
/// Empty when the supplier column is absent or fewer than two known suppliers appear.
fn supplier_shares(table: &CanonicalTable) -> HashMap<&str, f64> {
    if !table.has(CanonicalField::Fournisseur) || table.is_empty() {
        return HashMap::new();
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let unknown = CanonicalField::Fournisseur.text_sentinel();
    for r in &table.records {
        if Some(r.fournisseur.as_str()) != unknown {
            *counts.entry(r.fournisseur.as_str()).or_insert(0) += 1;
        }
    }
    if counts.len() < 2 {
        return HashMap::new();
    }
    let total = table.len() as f64;
    counts
        .into_iter()
        .map(|(k, n)| (k, n as f64 / total))
        .collect()
}

fn score_record(r: &CanonicalRecord, ctx: &RiskContext<'_>) -> (u32, Vec<String>) {
    let w = &ctx.config.weights;
    let mut score = 0u32;
    let mut why = Vec::new();

    if ctx.has(&[CanonicalField::StockActuel]) && r.stock_actuel == 0 {
        score = score.saturating_add(w.out_of_stock);
        why.push(format!("Rupture de stock (+{})", w.out_of_stock));
    }
    if ctx.has(&[CanonicalField::StockActuel, CanonicalField::StockMin])
        && r.stock_actuel <= r.stock_min
    {
        score = score.saturating_add(w.below_minimum);
        why.push(format!(
            "Stock {} au niveau ou sous le minimum {} (+{})",
            r.stock_actuel, r.stock_min, w.below_minimum
        ));
    }
    if ctx.has(&[CanonicalField::PrixVenteTtc])
        && r.prix_vente_ttc > ctx.config.high_price_threshold
    {
        score = score.saturating_add(w.high_price);
        why.push(format!(
            "Prix de vente élevé {:.2} € (+{})",
            r.prix_vente_ttc, w.high_price
        ));
    }
    if ctx.has(&[CanonicalField::DatePeremption]) {
        if is_expired(r, ctx.config) {
            score = score.saturating_add(w.expired);
            why.push(format!("Produit périmé (+{})", w.expired));
        } else if is_expiring_soon(r, ctx.config) {
            score = score.saturating_add(w.expiring_soon);
            why.push(format!(
                "Péremption sous {} jours (+{})",
                ctx.config.expiry_window_days, w.expiring_soon
            ));
        }
    }
    if ctx.has(&[CanonicalField::PrixAchatHt, CanonicalField::PrixVenteTtc]) && ctx.margin < 0.0 {
        score = score.saturating_add(w.negative_margin);
        why.push(format!("Marge négative {:.2} € (+{})", ctx.margin, w.negative_margin));
    }
    if ctx.supplier_share > ctx.config.supplier_concentration_threshold {
        score = score.saturating_add(w.supplier_concentration);
        why.push(format!(
            "Fournisseur concentré ({:.0} % des références) (+{})",
            ctx.supplier_share * 100.0,
            w.supplier_concentration
        ));
    }

    (score.min(MAX_SCORE), why)
}

/// Advisory actions for one record.
///
/// Pure function of the record and its precomputed context; returns an empty list when no
/// action is needed.
pub fn recommendations_for(record: &CanonicalRecord, ctx: &RiskContext<'_>) -> Vec<String> {
    let cfg = ctx.config;
    let mut out = Vec::new();

    if ctx.has(&[CanonicalField::StockActuel]) && record.stock_actuel == 0 {
        out.push("Réapprovisionner en urgence".to_string());
    } else if ctx.has(&[CanonicalField::StockActuel, CanonicalField::StockMin])
        && record.stock_actuel <= record.stock_min
    {
        out.push("Commander pour repasser au-dessus du stock minimum".to_string());
    }

    if ctx.has(&[CanonicalField::DatePeremption]) {
        if is_expired(record, cfg) {
            out.push("Retirer du rayon et déclarer la destruction".to_string());
        } else if is_expiring_soon(record, cfg) {
            out.push("Écouler en priorité (FEFO)".to_string());
            if ctx.has(&[CanonicalField::StockActuel, CanonicalField::StockMin])
                && is_overstocked(record, cfg)
            {
                out.push("Suspendre les commandes : stock élevé proche de la péremption".to_string());
            }
        }
    }

    if ctx.has(&[CanonicalField::PrixAchatHt, CanonicalField::PrixVenteTtc]) && ctx.margin < 0.0 {
        out.push("Revoir le prix de vente : produit vendu à perte".to_string());
    }

    if ctx.has(&[CanonicalField::StockActuel, CanonicalField::StockMin])
        && ctx.rotation < cfg.dormant_rotation_threshold
        && record.stock_actuel > cfg.dormant_stock_threshold
    {
        out.push("Produit dormant : limiter les réassorts".to_string());
    }

    if ctx.supplier_share > cfg.supplier_concentration_threshold {
        out.push("Diversifier les fournisseurs".to_string());
    }

    out
}
