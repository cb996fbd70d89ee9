//! Plain-text audit report.

use chrono::NaiveDateTime;

use crate::analysis::{AlertKind, AlertReport, Kpis, RiskAssessment};

const RULE: &str = "--------------------------------";
const FOOTER_RULE: &str = "================================";

const GENERAL_ADVICE: [&str; 4] = [
    "Vérifier les produits périmés",
    "Prioriser l'écoulement des produits chers",
    "Réapprovisionner les ruptures",
    "Surveiller les produits dormants",
];

/// Render the fixed-section audit report.
///
/// The output only depends on its arguments, so the same inputs and `generated_at` always
/// produce the same text.
pub fn render_report(
    alerts: &AlertReport,
    kpis: &Kpis,
    risk: &RiskAssessment,
    generated_at: NaiveDateTime,
) -> String {
    let mut lines: Vec<String> = vec![
        "===============================".into(),
        "   RAPPORT D'ANALYSE PHARMACIE".into(),
        "===============================".into(),
        format!("Généré le : {}", generated_at.format("%d/%m/%Y %H:%M")),
    ];

    section(&mut lines, "1) Synthèse des alertes");
    for kind in AlertKind::ALL {
        lines.push(format!("- {} : {} produit(s)", kind.label(), alerts.count(kind)));
    }

    section(&mut lines, "2) Indicateurs clés (KPIs)");
    lines.push(format!("- Valeur totale du stock : {:.2} €", kpis.valeur_stock));
    lines.push(format!("- Valeur du stock à la vente : {:.2} €", kpis.valeur_stock_vente));
    lines.push(format!("- Marge brute moyenne : {:.2} €", kpis.marge_moyenne));
    lines.push(format!("- Produits dormants : {}", kpis.dormants.len()));
    lines.push(format!("- Top produits chers : {}", kpis.top_chers.len()));
    if let Some(top) = kpis.repartition_categories.first() {
        lines.push(format!("- Catégorie principale : {} ({})", top.label, top.count));
    }
    if let Some(top) = kpis.repartition_fournisseurs.first() {
        lines.push(format!("- Fournisseur principal : {} ({})", top.label, top.count));
    }

    section(&mut lines, "3) Analyse du risque global");
    lines.push(format!("- Score moyen : {:.1}/100", risk.mean_score));
    lines.push(format!("- Risque élevé : {}", risk.urgent));
    lines.push(format!("- Risque moyen : {}", risk.watch));
    lines.push(format!("- Risque faible : {}", risk.low));

    section(&mut lines, "4) Recommandations générales");
    lines.extend(GENERAL_ADVICE.iter().map(|advice| format!("- {advice}")));

    lines.extend([
        String::new(),
        FOOTER_RULE.into(),
        "Fin du rapport".into(),
        FOOTER_RULE.into(),
    ]);

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn section(lines: &mut Vec<String>, title: &str) {
    lines.extend([String::new(), RULE.into(), title.into(), RULE.into()]);
}
