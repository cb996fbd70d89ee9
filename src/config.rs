//! Injected, read-only configuration for normalization and analysis.
//!
//! Nothing here is process-wide state: callers build a [`NormalizerConfig`] /
//! [`AnalysisConfig`] (usually via [`Default`]) and pass it by reference, so tests and
//! concurrent requests can use different alias sets or thresholds side by side.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, IngestionResult};
use crate::normalize::text::normalize_label;
use crate::types::CanonicalField;

/// Default pattern for content-sniffing product codes: 7 to 13 digits.
pub const DEFAULT_CIP_PATTERN: &str = r"^\d{7,13}$";

const BUILTIN_ALIASES: &[(&str, CanonicalField)] = &[
    ("stock", CanonicalField::StockActuel),
    ("qte", CanonicalField::StockActuel),
    ("quantite", CanonicalField::StockActuel),
    ("stock_physique", CanonicalField::StockActuel),
    ("min", CanonicalField::StockMin),
    ("seuil", CanonicalField::StockMin),
    ("stock_minimum", CanonicalField::StockMin),
    ("prix_achat", CanonicalField::PrixAchatHt),
    ("pa_ht", CanonicalField::PrixAchatHt),
    ("pa", CanonicalField::PrixAchatHt),
    ("prix_vente", CanonicalField::PrixVenteTtc),
    ("pv_ttc", CanonicalField::PrixVenteTtc),
    ("pv", CanonicalField::PrixVenteTtc),
    ("peremption", CanonicalField::DatePeremption),
    ("date_exp", CanonicalField::DatePeremption),
    ("exp", CanonicalField::DatePeremption),
    ("dlc", CanonicalField::DatePeremption),
    ("rayon", CanonicalField::EmplacementRayon),
    ("emplacement", CanonicalField::EmplacementRayon),
    ("localisation", CanonicalField::EmplacementRayon),
    ("cip", CanonicalField::CodeCip),
    ("code", CanonicalField::CodeCip),
    ("cip13", CanonicalField::CodeCip),
    ("libelle", CanonicalField::Designation),
    ("produit", CanonicalField::Designation),
    ("famille", CanonicalField::Categorie),
    ("labo", CanonicalField::Fournisseur),
    ("laboratoire", CanonicalField::Fournisseur),
];

/// Static mapping from normalized raw labels to canonical fields.
///
/// Keys are always stored normalized (see [`normalize_label`]), so `insert("Qté", ..)` and a
/// lookup of `"qte"` agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, CanonicalField>", into = "BTreeMap<String, CanonicalField>")]
pub struct AliasTable {
    entries: BTreeMap<String, CanonicalField>,
}

impl AliasTable {
    /// An alias table with no entries.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add (or replace) an alias. The label is normalized before insertion.
    pub fn insert(&mut self, label: &str, field: CanonicalField) {
        self.entries.insert(normalize_label(label), field);
    }

    /// Look up an already-normalized label.
    pub fn get(&self, normalized_label: &str) -> Option<CanonicalField> {
        self.entries.get(normalized_label).copied()
    }

    /// Number of aliases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the table has no aliases.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for (label, field) in BUILTIN_ALIASES {
            table.insert(label, *field);
        }
        table
    }
}

impl From<BTreeMap<String, CanonicalField>> for AliasTable {
    fn from(map: BTreeMap<String, CanonicalField>) -> Self {
        let mut table = Self::empty();
        for (label, field) in map {
            table.insert(&label, field);
        }
        table
    }
}

impl From<AliasTable> for BTreeMap<String, CanonicalField> {
    fn from(table: AliasTable) -> Self {
        table.entries
    }
}

/// Minimum match counts for content sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SniffThresholds {
    /// Matches needed for the pattern rules (code, date, price, stock).
    pub pattern_min_matches: usize,
    /// Matches needed for the substring rules (category, supplier).
    pub substring_min_matches: usize,
}

impl Default for SniffThresholds {
    fn default() -> Self {
        Self {
            pattern_min_matches: 6,
            substring_min_matches: 4,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct NormalizerConfigFile {
    aliases: AliasTable,
    thresholds: SniffThresholds,
    cip_pattern: String,
}

impl Default for NormalizerConfigFile {
    fn default() -> Self {
        Self {
            aliases: AliasTable::default(),
            thresholds: SniffThresholds::default(),
            cip_pattern: DEFAULT_CIP_PATTERN.to_string(),
        }
    }
}

/// Configuration of the schema-normalization pipeline.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Label aliases consulted before content sniffing.
    pub aliases: AliasTable,
    /// Content-sniffing thresholds.
    pub thresholds: SniffThresholds,
    cip_regex: Regex,
}

impl NormalizerConfig {
    /// Build a configuration, validating the thresholds and compiling `cip_pattern`.
    pub fn new(
        aliases: AliasTable,
        thresholds: SniffThresholds,
        cip_pattern: &str,
    ) -> IngestionResult<Self> {
        if thresholds.pattern_min_matches == 0 || thresholds.substring_min_matches == 0 {
            return Err(IngestionError::Config {
                message: "sniff thresholds must be >= 1".to_string(),
            });
        }
        let cip_regex = Regex::new(cip_pattern).map_err(|e| IngestionError::Config {
            message: format!("invalid cip_pattern '{cip_pattern}': {e}"),
        })?;
        Ok(Self {
            aliases,
            thresholds,
            cip_regex,
        })
    }

    /// Parse a JSON document; omitted keys keep their defaults.
    ///
    /// A provided `aliases` object replaces the built-in table entirely.
    pub fn from_json_str(json: &str) -> IngestionResult<Self> {
        let file: NormalizerConfigFile = serde_json::from_str(json)?;
        Self::new(file.aliases, file.thresholds, &file.cip_pattern)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_json_path(path: impl AsRef<Path>) -> IngestionResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Compiled product-code pattern.
    pub fn cip_regex(&self) -> &Regex {
        &self.cip_regex
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            aliases: AliasTable::default(),
            thresholds: SniffThresholds::default(),
            cip_regex: Regex::new(DEFAULT_CIP_PATTERN).expect("valid cip regex"),
        }
    }
}

/// Additive weights of the risk rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub out_of_stock: u32,
    pub below_minimum: u32,
    pub high_price: u32,
    pub expired: u32,
    pub expiring_soon: u32,
    pub negative_margin: u32,
    pub supplier_concentration: u32,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            out_of_stock: 40,
            below_minimum: 20,
            high_price: 20,
            expired: 20,
            expiring_soon: 10,
            negative_margin: 10,
            supplier_concentration: 10,
        }
    }
}

/// Thresholds for the alert, KPI and risk engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Reference date for expiry rules.
    pub today: NaiveDate,
    /// Days ahead of `today` that count as "expiring soon".
    pub expiry_window_days: i64,
    /// Rotation below which a well-stocked product is dormant.
    pub dormant_rotation_threshold: f64,
    /// Stock above which a slow product is dormant.
    pub dormant_stock_threshold: i64,
    /// Size of the most-expensive list.
    pub top_n: usize,
    /// Stock multiple of the minimum that makes a near-expiry product a FEFO risk.
    pub fefo_stock_multiplier: f64,
    /// Sale price above which a product is high-value.
    pub high_price_threshold: f64,
    /// Share of records above which a supplier is over-concentrated.
    pub supplier_concentration_threshold: f64,
    pub weights: RiskWeights,
    /// Score from which the recommendation is "Action urgente".
    pub urgent_at: u32,
    /// Score from which the recommendation is "Surveillance".
    pub watch_at: u32,
}

impl AnalysisConfig {
    /// Defaults with an explicit reference date.
    pub fn with_today(today: NaiveDate) -> Self {
        Self {
            today,
            ..Self::default()
        }
    }

    /// Parse a JSON document; omitted keys keep their defaults.
    pub fn from_json_str(json: &str) -> IngestionResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            today: chrono::Local::now().date_naive(),
            expiry_window_days: 90,
            dormant_rotation_threshold: 0.5,
            dormant_stock_threshold: 20,
            top_n: 10,
            fefo_stock_multiplier: 2.0,
            high_price_threshold: 50.0,
            supplier_concentration_threshold: 0.5,
            weights: RiskWeights::default(),
            urgent_at: 70,
            watch_at: 40,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_aliases_cover_required_labels() {
        let t = AliasTable::default();
        assert_eq!(t.get("qte"), Some(CanonicalField::StockActuel));
        assert_eq!(t.get("pa_ht"), Some(CanonicalField::PrixAchatHt));
        assert_eq!(t.get("dlc"), Some(CanonicalField::DatePeremption));
        assert_eq!(t.get("quantité"), None, "keys are stored normalized");
        assert_eq!(t.get("quantite"), Some(CanonicalField::StockActuel));
    }

    #[test]
    fn insert_normalizes_label() {
        let mut t = AliasTable::empty();
        t.insert("  Réf. Produit ", CanonicalField::CodeCip);
        assert_eq!(t.get("ref_produit"), Some(CanonicalField::CodeCip));
    }

    #[test]
    fn json_aliases_replace_builtin_table() {
        let cfg = NormalizerConfig::from_json_str(r#"{"aliases": {"Réf": "code_cip"}}"#).unwrap();
        assert_eq!(cfg.aliases.len(), 1);
        assert_eq!(cfg.aliases.get("ref"), Some(CanonicalField::CodeCip));
        assert_eq!(cfg.thresholds, SniffThresholds::default());
    }

    #[test]
    fn json_thresholds_overlay_defaults() {
        let cfg =
            NormalizerConfig::from_json_str(r#"{"thresholds": {"pattern_min_matches": 2}}"#).unwrap();
        assert_eq!(cfg.thresholds.pattern_min_matches, 2);
        assert_eq!(cfg.thresholds.substring_min_matches, 4);
        assert_eq!(cfg.aliases, AliasTable::default());
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let err = NormalizerConfig::from_json_str(r#"{"cip_pattern": "("}"#).unwrap_err();
        assert!(err.to_string().contains("invalid cip_pattern"));
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let thresholds = SniffThresholds {
            pattern_min_matches: 0,
            substring_min_matches: 4,
        };
        let err =
            NormalizerConfig::new(AliasTable::default(), thresholds, DEFAULT_CIP_PATTERN).unwrap_err();
        assert!(matches!(err, IngestionError::Config { .. }));
    }

    #[test]
    fn analysis_config_json_keeps_defaults() {
        let cfg = AnalysisConfig::from_json_str(r#"{"today": "2024-06-01", "top_n": 3}"#).unwrap();
        assert_eq!(cfg.today, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(cfg.top_n, 3);
        assert_eq!(cfg.expiry_window_days, 90);
        assert_eq!(cfg.weights, RiskWeights::default());
    }
}
