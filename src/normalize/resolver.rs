//! Column resolution: raw labels → canonical fields.
//!
//! Resolution runs in two passes over the (already label-deduplicated) columns:
//!
//! 1. **Alias pass.** The normalized label is looked up as a canonical field name, then in the
//!    [`AliasTable`](crate::config::AliasTable). The first column to claim a field keeps it;
//!    later alias hits for the same field stay unmapped.
//! 2. **Sniffing pass.** Every column left unresolved is classified from its string-cast cell
//!    values. Sniffing never takes a field claimed by an alias. When several sniffed columns
//!    target the same field, the last one wins and the earlier ones become unmapped.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::NormalizerConfig;
use crate::types::{CanonicalField, RawTable};

use super::coerce::parse_date_text;
use super::text::normalize_label;

/// How a column ended up with its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// Label matched a canonical name or an alias.
    Alias,
    /// Cell content matched a sniffing rule.
    Sniffed,
    /// Kept as a passthrough column.
    Unmapped,
}

/// Resolution outcome for one source column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnResolution {
    /// Source label after duplicate-label disambiguation.
    pub raw_label: String,
    /// Target field, `None` when unmapped.
    pub field: Option<CanonicalField>,
    pub method: ResolutionMethod,
}

impl ColumnResolution {
    fn unmapped(raw_label: &str) -> Self {
        Self {
            raw_label: raw_label.to_string(),
            field: None,
            method: ResolutionMethod::Unmapped,
        }
    }
}

/// Disambiguate repeated labels: the first occurrence keeps the bare (trimmed) label, later
/// ones get `_1`, `_2`, ... in order of appearance.
pub fn dedupe_labels(headers: &[String]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    headers
        .iter()
        .map(|h| {
            let base = h.trim();
            let n = *seen.entry(base).and_modify(|n| *n += 1).or_insert(0);
            if n == 0 {
                base.to_string()
            } else {
                format!("{base}_{n}")
            }
        })
        .collect()
}

/// Resolve every column of `table` (whose headers must already be deduplicated).
///
/// Returns one [`ColumnResolution`] per column, in column order.
pub fn resolve_columns(table: &RawTable, config: &NormalizerConfig) -> Vec<ColumnResolution> {
    let mut out: Vec<ColumnResolution> = table
        .headers
        .iter()
        .map(|h| ColumnResolution::unmapped(h))
        .collect();
    let mut alias_claims: HashMap<CanonicalField, usize> = HashMap::new();

    for (idx, label) in table.headers.iter().enumerate() {
        let key = normalize_label(label);
        let Some(field) = CanonicalField::from_name(&key).or_else(|| config.aliases.get(&key))
        else {
            continue;
        };
        if alias_claims.contains_key(&field) {
            tracing::debug!(column = %label, %field, "alias target already claimed; column left unmapped");
            // Mark as handled so sniffing does not look at it again.
            out[idx].method = ResolutionMethod::Alias;
            continue;
        }
        alias_claims.insert(field, idx);
        out[idx].field = Some(field);
        out[idx].method = ResolutionMethod::Alias;
    }

    let mut sniff_claims: HashMap<CanonicalField, usize> = HashMap::new();
    for (idx, label) in table.headers.iter().enumerate() {
        if out[idx].method != ResolutionMethod::Unmapped {
            continue;
        }
        let samples: Vec<String> = table.column(idx).filter_map(|v| v.to_text()).collect();
        let Some(field) = sniff_column(&normalize_label(label), &samples, config) else {
            continue;
        };
        if alias_claims.contains_key(&field) {
            tracing::debug!(column = %label, %field, "sniffed field already claimed by alias");
            continue;
        }
        if let Some(prev) = sniff_claims.insert(field, idx) {
            tracing::debug!(
                column = %label,
                previous = %table.headers[prev],
                %field,
                "later sniffed column takes the field"
            );
            out[prev].field = None;
            out[prev].method = ResolutionMethod::Unmapped;
        }
        out[idx].field = Some(field);
        out[idx].method = ResolutionMethod::Sniffed;
    }

    // Alias duplicates were marked `Alias` with no field only to skip sniffing.
    for r in &mut out {
        if r.field.is_none() {
            r.method = ResolutionMethod::Unmapped;
        }
    }
    out
}

/// Classify a column from its string-cast, non-empty values.
///
/// Rules are tried in order and the first that fires wins. `label` is the normalized label,
/// used to split price and stock columns. Columns with fewer values than the thresholds never
/// match.
pub fn sniff_column(
    label: &str,
    samples: &[String],
    config: &NormalizerConfig,
) -> Option<CanonicalField> {
    let min = config.thresholds.pattern_min_matches;
    let min_sub = config.thresholds.substring_min_matches;
    let count = |pred: &dyn Fn(&str) -> bool| samples.iter().filter(|s| pred(s.as_str())).count();

    if count(&|s: &str| config.cip_regex().is_match(s)) >= min {
        return Some(CanonicalField::CodeCip);
    }
    if count(&|s: &str| parse_date_text(s).is_some()) >= min {
        return Some(CanonicalField::DatePeremption);
    }
    if count(&is_decimal) >= min {
        if label.contains("vente") {
            return Some(CanonicalField::PrixVenteTtc);
        }
        if label.contains("achat") {
            return Some(CanonicalField::PrixAchatHt);
        }
    }
    if count(&is_integer) >= min {
        if label.contains("min") {
            return Some(CanonicalField::StockMin);
        }
        return Some(CanonicalField::StockActuel);
    }
    if count(&|s: &str| s.contains("anti")) >= min_sub {
        return Some(CanonicalField::Categorie);
    }
    if count(&|s: &str| s.contains("laboratoire")) >= min_sub {
        return Some(CanonicalField::Fournisseur);
    }
    None
}

/// Digits with at most one decimal point.
fn is_decimal(s: &str) -> bool {
    let mut dots = 0;
    let mut digits = 0;
    for c in s.chars() {
        match c {
            '.' => dots += 1,
            c if c.is_ascii_digit() => digits += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

fn is_integer(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AliasTable, SniffThresholds, DEFAULT_CIP_PATTERN};
    use crate::types::Value;

    fn labels(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn text_column(header: &str, values: &[&str]) -> RawTable {
        RawTable::new(
            vec![header.to_string()],
            values.iter().map(|v| vec![Value::Utf8(v.to_string())]).collect(),
        )
    }

    fn field_of(table: &RawTable) -> Option<CanonicalField> {
        resolve_columns(table, &NormalizerConfig::default())[0].field
    }

    #[test]
    fn dedupe_labels_suffixes_repeats_in_order() {
        let out = dedupe_labels(&labels(&["Stock", "PA", " Stock ", "Stock", "PA"]));
        assert_eq!(out, labels(&["Stock", "PA", "Stock_1", "Stock_2", "PA_1"]));
    }

    #[test]
    fn alias_hits_resolve_directly() {
        let table = RawTable::new(labels(&["Qté", "PA HT", "pv_ttc", "DLC", "stock_min"]), vec![]);
        let res = resolve_columns(&table, &NormalizerConfig::default());
        let fields: Vec<_> = res.iter().map(|r| r.field).collect();
        assert_eq!(
            fields,
            vec![
                Some(CanonicalField::StockActuel),
                Some(CanonicalField::PrixAchatHt),
                Some(CanonicalField::PrixVenteTtc),
                Some(CanonicalField::DatePeremption),
                Some(CanonicalField::StockMin),
            ]
        );
        assert!(res.iter().all(|r| r.method == ResolutionMethod::Alias));
    }

    #[test]
    fn first_alias_keeps_the_field() {
        let table = RawTable::new(labels(&["PA", "Prix achat"]), vec![]);
        let res = resolve_columns(&table, &NormalizerConfig::default());
        assert_eq!(res[0].field, Some(CanonicalField::PrixAchatHt));
        assert_eq!(res[1].field, None);
        assert_eq!(res[1].method, ResolutionMethod::Unmapped);
    }

    #[test]
    fn sniffs_cip_codes() {
        let t = text_column(
            "ref",
            &["3400930000011", "3400930000028", "3400930000035", "3400930000042", "3400930000059", "3400930000066"],
        );
        assert_eq!(field_of(&t), Some(CanonicalField::CodeCip));
    }

    #[test]
    fn five_matches_are_not_enough() {
        let t = text_column(
            "ref",
            &["3400930000011", "3400930000028", "3400930000035", "3400930000042", "3400930000059"],
        );
        assert_eq!(field_of(&t), None);
    }

    #[test]
    fn sniffs_dates() {
        let t = text_column(
            "fin validite",
            &["2025-01-31", "31/12/2024", "2025-06-30", "01/2026", "2024-11-15", "2025-02-28"],
        );
        assert_eq!(field_of(&t), Some(CanonicalField::DatePeremption));
    }

    #[test]
    fn sniffs_prices_from_label_hint() {
        let values = ["12.5", "3.2", "8", "10.99", "4.5", "7.25"];
        assert_eq!(field_of(&text_column("Tarif vente", &values)), Some(CanonicalField::PrixVenteTtc));
        assert_eq!(field_of(&text_column("Coût d'achat", &values)), Some(CanonicalField::PrixAchatHt));
        assert_eq!(field_of(&text_column("tarif", &values)), None);
    }

    #[test]
    fn sniffs_integers_as_stock() {
        let values = ["1", "20", "3", "0", "15", "8"];
        assert_eq!(field_of(&text_column("Niveau mini", &values)), Some(CanonicalField::StockMin));
        assert_eq!(field_of(&text_column("Dispo", &values)), Some(CanonicalField::StockActuel));
    }

    #[test]
    fn sniffs_category_and_supplier_substrings() {
        let cats = ["antibiotique", "antalgique", "antiseptique", "antihistaminique", "anti-inflammatoire"];
        assert_eq!(field_of(&text_column("classe", &cats)), Some(CanonicalField::Categorie));

        let sups = ["laboratoire a", "laboratoire b", "laboratoire c", "laboratoire d"];
        assert_eq!(field_of(&text_column("origine", &sups)), Some(CanonicalField::Fournisseur));
    }

    #[test]
    fn sniffing_never_overrides_an_alias() {
        let mut rows = Vec::new();
        for i in 0..6 {
            rows.push(vec![Value::Int64(i), Value::Int64(i * 2)]);
        }
        let table = RawTable::new(labels(&["Qte", "Dispo"]), rows);
        let res = resolve_columns(&table, &NormalizerConfig::default());
        assert_eq!(res[0].field, Some(CanonicalField::StockActuel));
        assert_eq!(res[1].field, None);
    }

    #[test]
    fn last_sniffed_column_wins() {
        let mut rows = Vec::new();
        for i in 0..6 {
            rows.push(vec![Value::Int64(i), Value::Int64(i * 2)]);
        }
        let table = RawTable::new(labels(&["Dispo", "Reste"]), rows);
        let res = resolve_columns(&table, &NormalizerConfig::default());
        assert_eq!(res[0].field, None);
        assert_eq!(res[0].method, ResolutionMethod::Unmapped);
        assert_eq!(res[1].field, Some(CanonicalField::StockActuel));
        assert_eq!(res[1].method, ResolutionMethod::Sniffed);
    }

    #[test]
    fn injected_alias_table_replaces_builtins() {
        let mut aliases = AliasTable::empty();
        aliases.insert("Réf", CanonicalField::CodeCip);
        let config =
            NormalizerConfig::new(aliases, SniffThresholds::default(), DEFAULT_CIP_PATTERN).unwrap();
        let table = RawTable::new(labels(&["Réf", "Qte"]), vec![]);
        let res = resolve_columns(&table, &config);
        assert_eq!(res[0].field, Some(CanonicalField::CodeCip));
        assert_eq!(res[1].field, None);
    }

    #[test]
    fn decimal_and_integer_shapes() {
        assert!(is_decimal("12.5"));
        assert!(is_decimal("12"));
        assert!(!is_decimal("1.2.3"));
        assert!(!is_decimal("."));
        assert!(!is_decimal("12,5"));
        assert!(is_integer("007"));
        assert!(!is_integer("5.0"));
        assert!(!is_integer(""));
    }
}
