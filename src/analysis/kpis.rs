//! Key performance indicators of the stock.

use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::types::{CanonicalField, CanonicalTable};

use super::{count_by, CountEntry};

/// Rotation of one record (stock over minimum stock).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RotationEntry {
    pub index: usize,
    pub designation: String,
    pub rotation: f64,
}

/// Output of [`compute_kpis`].
///
/// Indicators whose inputs are absent from the table are zero or empty.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Kpis {
    /// Σ purchase price × stock.
    pub valeur_stock: f64,
    /// Σ sale price × stock.
    pub valeur_stock_vente: f64,
    /// Mean unit margin (sale minus purchase price).
    pub marge_moyenne: f64,
    pub rotation: Vec<RotationEntry>,
    /// Well-stocked records with a low rotation.
    pub dormants: Vec<usize>,
    /// Most expensive records by purchase price, highest first.
    pub top_chers: Vec<usize>,
    pub repartition_categories: Vec<CountEntry>,
    pub repartition_fournisseurs: Vec<CountEntry>,
}

/// Compute every KPI over `table`.
pub fn compute_kpis(table: &CanonicalTable, config: &AnalysisConfig) -> Kpis {
    let has_stock = table.has(CanonicalField::StockActuel);
    let has_pa = table.has(CanonicalField::PrixAchatHt);
    let has_pv = table.has(CanonicalField::PrixVenteTtc);
    let has_rotation = table.has_all(&[CanonicalField::StockActuel, CanonicalField::StockMin]);

    let valeur_stock = if has_stock && has_pa {
        table
            .records
            .iter()
            .map(|r| r.prix_achat_ht * r.stock_actuel as f64)
            .sum()
    } else {
        0.0
    };

    let valeur_stock_vente = if has_stock && has_pv {
        table
            .records
            .iter()
            .map(|r| r.prix_vente_ttc * r.stock_actuel as f64)
            .sum()
    } else {
        0.0
    };

    let marge_moyenne = if has_pa && has_pv && !table.is_empty() {
        table.records.iter().map(|r| r.margin()).sum::<f64>() / table.len() as f64
    } else {
        0.0
    };

    let rotation = if has_rotation {
        table
            .records
            .iter()
            .enumerate()
            .map(|(index, r)| RotationEntry {
                index,
                designation: r.designation.clone(),
                rotation: r.rotation(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let dormants = if has_rotation {
        table.filter_indices(|r| {
            r.rotation() < config.dormant_rotation_threshold
                && r.stock_actuel > config.dormant_stock_threshold
        })
    } else {
        Vec::new()
    };

    let top_chers = if has_pa {
        let mut idx: Vec<usize> = (0..table.len()).collect();
        idx.sort_by(|a, b| {
            table.records[*b]
                .prix_achat_ht
                .total_cmp(&table.records[*a].prix_achat_ht)
        });
        idx.truncate(config.top_n);
        idx
    } else {
        Vec::new()
    };

    let repartition_categories = if table.has(CanonicalField::Categorie) {
        count_by(table.records.iter().map(|r| r.categorie.as_str()))
    } else {
        Vec::new()
    };

    let repartition_fournisseurs = if table.has(CanonicalField::Fournisseur) {
        count_by(table.records.iter().map(|r| r.fournisseur.as_str()))
    } else {
        Vec::new()
    };

    Kpis {
        valeur_stock,
        valeur_stock_vente,
        marge_moyenne,
        rotation,
        dormants,
        top_chers,
        repartition_categories,
        repartition_fournisseurs,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::types::CanonicalRecord;

    fn cfg() -> AnalysisConfig {
        AnalysisConfig::with_today(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
    }

    fn rec(stock: i64, min: i64, pa: f64, pv: f64) -> CanonicalRecord {
        CanonicalRecord {
            stock_actuel: stock,
            stock_min: min,
            prix_achat_ht: pa,
            prix_vente_ttc: pv,
            ..Default::default()
        }
    }

    fn full_table(records: Vec<CanonicalRecord>) -> CanonicalTable {
        CanonicalTable {
            present_fields: CanonicalField::ALL.to_vec(),
            extra_columns: Vec::new(),
            records,
        }
    }

    #[test]
    fn stock_values_and_margin() {
        let t = full_table(vec![rec(2, 1, 10.0, 12.0), rec(3, 1, 4.0, 5.0)]);
        let k = compute_kpis(&t, &cfg());
        assert_eq!(k.valeur_stock, 32.0);
        assert_eq!(k.valeur_stock_vente, 39.0);
        assert_eq!(k.marge_moyenne, 1.5);
    }

    #[test]
    fn dormant_products_have_high_stock_and_low_rotation() {
        let t = full_table(vec![
            rec(25, 60, 1.0, 2.0),
            rec(25, 10, 1.0, 2.0),
            rec(10, 40, 1.0, 2.0),
        ]);
        let k = compute_kpis(&t, &cfg());
        assert_eq!(k.dormants, vec![0]);
        assert_eq!(k.rotation.len(), 3);
        assert_eq!(k.rotation[1].rotation, 2.5);
    }

    #[test]
    fn top_chers_sorts_by_purchase_price_and_truncates() {
        let t = full_table(vec![
            rec(1, 1, 5.0, 6.0),
            rec(1, 1, 50.0, 60.0),
            rec(1, 1, 5.0, 6.0),
            rec(1, 1, 20.0, 25.0),
        ]);
        let mut c = cfg();
        c.top_n = 3;
        let k = compute_kpis(&t, &c);
        assert_eq!(k.top_chers, vec![1, 3, 0]);
    }

    #[test]
    fn absent_fields_yield_empty_kpis() {
        let t = CanonicalTable {
            present_fields: vec![CanonicalField::Designation],
            extra_columns: Vec::new(),
            records: vec![rec(5, 1, 10.0, 12.0)],
        };
        let k = compute_kpis(&t, &cfg());
        assert_eq!(k, Kpis::default());
    }

    #[test]
    fn empty_table_has_zero_margin() {
        let k = compute_kpis(&full_table(Vec::new()), &cfg());
        assert_eq!(k.marge_moyenne, 0.0);
        assert!(k.top_chers.is_empty());
    }
}
