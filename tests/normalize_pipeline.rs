use chrono::NaiveDate;

use pharmacy_audit::analysis::{assess_risk, compute_kpis, generate_alerts, AlertKind, RiskTier};
use pharmacy_audit::config::{AliasTable, AnalysisConfig, NormalizerConfig};
use pharmacy_audit::ingestion::csv::ingest_csv_from_path;
use pharmacy_audit::normalize::{normalize_table, ResolutionMethod};
use pharmacy_audit::types::{CanonicalField, RawTable, Value};

fn s(v: &str) -> Value {
    Value::Utf8(v.to_string())
}

fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

fn analysis() -> AnalysisConfig {
    AnalysisConfig::with_today(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
}

#[test]
fn end_to_end_scenario_flags_price_anomaly() {
    let raw = RawTable::new(
        vec!["Qté".into(), "PA HT".into(), "PV TTC".into(), "DLC".into(), "CIP".into()],
        vec![vec![
            Value::Int64(5),
            Value::Float64(10.0),
            Value::Float64(8.0),
            Value::Int64(44197),
            s("3400123456789"),
        ]],
    );

    let out = normalize_table(&raw, &NormalizerConfig::default());
    assert_eq!(out.table.len(), 1);
    let r = &out.table.records[0];
    assert_eq!(r.stock_actuel, 5);
    assert_eq!(r.prix_achat_ht, 10.0);
    assert_eq!(r.prix_vente_ttc, 8.0);
    assert_eq!(r.date_peremption, ymd(2021, 1, 1));
    assert_eq!(r.code_cip, 3400123456789);

    let alerts = generate_alerts(&out.table, &analysis());
    assert_eq!(alerts.records(AlertKind::PrixAnormal), &[0]);
}

#[test]
fn fixed_aliases_always_resolve() {
    let raw = RawTable::new(
        vec!["qte".into(), "pa_ht".into()],
        vec![vec![Value::Int64(1), Value::Float64(2.0)]],
    );
    let out = normalize_table(&raw, &NormalizerConfig::default());
    let fields: Vec<_> = out.summary.resolutions.iter().map(|r| r.field).collect();
    assert_eq!(
        fields,
        vec![Some(CanonicalField::StockActuel), Some(CanonicalField::PrixAchatHt)]
    );
    assert!(out
        .summary
        .resolutions
        .iter()
        .all(|r| r.method == ResolutionMethod::Alias));
}

#[test]
fn french_export_is_cleaned_and_deduplicated() {
    let raw = ingest_csv_from_path("tests/fixtures/stock_export.csv", None).unwrap();
    let out = normalize_table(&raw, &NormalizerConfig::default());

    assert_eq!(out.summary.rows_in, 7);
    assert_eq!(out.summary.dropped.empty_rows_dropped, 1);
    assert_eq!(out.summary.dropped.total_rows_dropped, 1);
    assert_eq!(out.summary.dropped.duplicates_dropped, 1);
    assert_eq!(out.summary.rows_out, 4);
    assert_eq!(out.summary.unmapped_labels().collect::<Vec<_>>(), vec!["Remarque"]);

    let t = &out.table;
    assert!(t.has_all(&CanonicalField::ALL));
    assert_eq!(t.extra_columns, vec!["Remarque"]);

    let names: Vec<&str> = t.records.iter().map(|r| r.designation.as_str()).collect();
    assert_eq!(
        names,
        vec!["doliprane 500mg", "amoxicilline 1g", "ibuprofene 400", "vaccin grippe"]
    );
    // First occurrence of the duplicated code survives.
    assert_eq!(t.records[1].stock_actuel, 45);
    assert_eq!(t.records[2].categorie, "anti-inflammatoire");
    assert_eq!(t.records[0].date_peremption, ymd(2025, 3, 15));
    assert_eq!(t.records[1].date_peremption, ymd(2024, 7, 10));
    assert_eq!(t.records[3].date_peremption, ymd(2025, 1, 1));
    assert_eq!(t.records[2].extras, vec![Some("promo".to_string())]);
    assert_eq!(t.records[0].extras, vec![None]);

    let mut codes: Vec<i64> = t.records.iter().map(|r| r.code_cip).collect();
    codes.sort_unstable();
    codes.dedup();
    assert_eq!(codes.len(), t.len());
}

#[test]
fn french_export_alerts_kpis_and_risk() {
    let raw = ingest_csv_from_path("tests/fixtures/stock_export.csv", None).unwrap();
    let table = normalize_table(&raw, &NormalizerConfig::default()).table;
    let cfg = analysis();

    let alerts = generate_alerts(&table, &cfg);
    assert_eq!(alerts.records(AlertKind::Perimes), &[2]);
    assert_eq!(alerts.records(AlertKind::BientotPerimes), &[1]);
    assert_eq!(alerts.records(AlertKind::Ruptures), &[0]);
    assert_eq!(alerts.records(AlertKind::StockCritique), &[0, 2]);
    assert_eq!(alerts.records(AlertKind::PrixAnormal), &[2]);
    assert!(alerts.records(AlertKind::CipDuplique).is_empty());
    assert_eq!(alerts.records(AlertKind::FefoRisque), &[1]);

    let kpis = compute_kpis(&table, &cfg);
    assert!((kpis.valeur_stock - 1968.0).abs() < 1e-9);
    assert_eq!(kpis.top_chers, vec![3, 1, 2, 0]);
    assert!(kpis.dormants.is_empty());
    assert_eq!(kpis.repartition_categories.len(), 4);
    assert_eq!(kpis.repartition_fournisseurs[0].label, "sanofi");
    assert_eq!(kpis.repartition_fournisseurs[0].count, 2);

    let risk = assess_risk(&table, &cfg);
    let scores: Vec<u32> = risk.entries.iter().map(|e| e.score).collect();
    assert_eq!(scores, vec![60, 10, 50, 20]);
    assert_eq!(risk.entries[0].tier, RiskTier::Surveillance);
    assert_eq!(risk.mean_score, 35.0);
    assert_eq!((risk.urgent, risk.watch, risk.low), (0, 2, 2));
}

#[test]
fn normalizing_a_canonical_table_is_idempotent() {
    let raw = ingest_csv_from_path("tests/fixtures/stock_export.csv", None).unwrap();
    let config = NormalizerConfig::default();
    let first = normalize_table(&raw, &config).table;
    let second = normalize_table(&first.to_raw_table(), &config).table;
    assert_eq!(first, second);
}

#[test]
fn passthrough_column_named_like_a_field_is_renamed_and_stable() {
    let raw = RawTable::new(
        vec!["Qte".into(), "stock_actuel".into(), "designation".into()],
        vec![vec![Value::Int64(4), Value::Int64(9), s("a")]],
    );
    let config = NormalizerConfig::default();
    let first = normalize_table(&raw, &config).table;
    assert_eq!(first.records[0].stock_actuel, 4);
    assert_eq!(first.extra_columns, vec!["stock_actuel_1"]);
    assert_eq!(first.records[0].extras, vec![Some("9".to_string())]);

    let second = normalize_table(&first.to_raw_table(), &config).table;
    assert_eq!(first, second);
}

#[test]
fn fields_only_seen_on_dropped_rows_are_not_present() {
    let raw = RawTable::new(
        vec!["designation".into(), "dlc".into()],
        vec![vec![s("a"), Value::Null], vec![s("TOTAL"), Value::Int64(44197)]],
    );
    let config = NormalizerConfig::default();
    let first = normalize_table(&raw, &config).table;
    assert_eq!(first.present_fields, vec![CanonicalField::Designation]);
    assert!(!first.has(CanonicalField::DatePeremption));

    let second = normalize_table(&first.to_raw_table(), &config).table;
    assert_eq!(first, second);
}

#[test]
fn decimal_comma_prices_are_read() {
    let raw = RawTable::new(
        vec!["PA HT".into(), "PV TTC".into()],
        vec![vec![s("3,50"), s("6,90")]],
    );
    let out = normalize_table(&raw, &NormalizerConfig::default());
    assert_eq!(out.table.records[0].prix_achat_ht, 3.5);
    assert_eq!(out.table.records[0].prix_vente_ttc, 6.9);
}

#[test]
fn total_rows_are_removed_in_any_case_and_column() {
    let raw = RawTable::new(
        vec!["designation".into(), "note".into()],
        vec![
            vec![s("Doliprane"), Value::Null],
            vec![s("Spasfon"), s("Sous-Total rayon B")],
            vec![s("TOTAL GENERAL"), Value::Null],
        ],
    );
    let out = normalize_table(&raw, &NormalizerConfig::default());
    assert_eq!(out.table.len(), 1);
    assert_eq!(out.table.records[0].designation, "doliprane");
    assert_eq!(out.summary.dropped.total_rows_dropped, 2);
}

#[test]
fn date_coercion_never_fails() {
    let raw = RawTable::new(
        vec!["date_peremption".into(), "designation".into()],
        vec![
            vec![Value::Int64(44197), s("a")],
            vec![s("not a date"), s("b")],
        ],
    );
    let out = normalize_table(&raw, &NormalizerConfig::default());
    assert_eq!(out.table.records[0].date_peremption, ymd(2021, 1, 1));
    assert_eq!(out.table.records[1].date_peremption, None);
}

#[test]
fn unlabeled_columns_are_sniffed_from_content() {
    let raw = ingest_csv_from_path("tests/fixtures/unlabeled.csv", None).unwrap();
    let out = normalize_table(&raw, &NormalizerConfig::default());

    let fields: Vec<_> = out.summary.resolutions.iter().map(|r| r.field).collect();
    assert_eq!(
        fields,
        vec![
            Some(CanonicalField::CodeCip),
            Some(CanonicalField::DatePeremption),
            Some(CanonicalField::StockActuel),
            Some(CanonicalField::Categorie),
            Some(CanonicalField::Fournisseur),
            Some(CanonicalField::PrixVenteTtc),
        ]
    );
    assert!(out
        .summary
        .resolutions
        .iter()
        .all(|r| r.method == ResolutionMethod::Sniffed));
    assert_eq!(out.table.records[0].date_peremption, ymd(2025, 1, 31));
    assert_eq!(out.table.records[4].prix_vente_ttc, 15.0);
}

#[test]
fn short_columns_never_trigger_sniffing() {
    let raw = RawTable::new(
        vec!["Col 1".into()],
        (0..5).map(|i| vec![Value::Int64(3400930000011 + i)]).collect(),
    );
    let out = normalize_table(&raw, &NormalizerConfig::default());
    assert_eq!(out.summary.resolutions[0].field, None);
    assert_eq!(out.table.extra_columns, vec!["Col 1"]);
    assert!(out.table.present_fields.is_empty());
}

#[test]
fn injected_alias_table_replaces_builtins() {
    let mut aliases = AliasTable::empty();
    aliases.insert("Réf. produit", CanonicalField::CodeCip);
    let config = NormalizerConfig::new(
        aliases,
        Default::default(),
        pharmacy_audit::config::DEFAULT_CIP_PATTERN,
    )
    .unwrap();

    let raw = RawTable::new(
        vec!["Réf produit".into(), "qte".into()],
        vec![vec![Value::Int64(42), Value::Int64(3)]],
    );
    let out = normalize_table(&raw, &config);
    assert_eq!(out.summary.resolutions[0].field, Some(CanonicalField::CodeCip));
    // "qte" is not an alias in this table.
    assert_eq!(out.summary.resolutions[1].field, None);
}

#[test]
fn risk_scores_stay_within_bounds() {
    let raw = ingest_csv_from_path("tests/fixtures/stock_export.csv", None).unwrap();
    let table = normalize_table(&raw, &NormalizerConfig::default()).table;
    let mut cfg = analysis();
    cfg.weights.out_of_stock = 500;

    let risk = assess_risk(&table, &cfg);
    assert!(risk.entries.iter().all(|e| e.score <= 100));
    assert_eq!(risk.entries[0].score, 100);
    assert_eq!(risk.entries[0].tier, RiskTier::ActionUrgente);
}
