use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::NaiveDate;

use pharmacy_audit::config::{AnalysisConfig, NormalizerConfig};
use pharmacy_audit::ingestion::{ingest_from_path, IngestionFormat, IngestionOptions};
use pharmacy_audit::pipeline::audit_path;
use pharmacy_audit::types::Value;
use pharmacy_audit::IngestionError;

fn tmp_file(ext: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("pharmacy-audit-unified-{nanos}.{ext}"))
}

#[test]
fn unified_csv_by_extension() {
    let raw = ingest_from_path("tests/fixtures/stock_export.csv", &IngestionOptions::default()).unwrap();
    assert_eq!(raw.row_count(), 7);
}

#[test]
fn unified_tsv_defaults_to_tab_delimiter() {
    let raw = ingest_from_path("tests/fixtures/latin1_tab.tsv", &IngestionOptions::default()).unwrap();
    assert_eq!(raw.column_count(), 3);
    assert_eq!(raw.rows[0][0], Value::Int64(3400930000011));
}

#[test]
fn unified_forced_format_ignores_extension() {
    let path = tmp_file("export");
    std::fs::write(&path, "qte;designation\n3;doliprane\n").unwrap();

    let err = ingest_from_path(&path, &IngestionOptions::default()).unwrap_err();
    assert!(matches!(err, IngestionError::UnsupportedFormat { .. }));

    let opts = IngestionOptions {
        format: Some(IngestionFormat::Csv),
        ..Default::default()
    };
    let raw = ingest_from_path(&path, &opts).unwrap();
    assert_eq!(raw.headers, vec!["qte", "designation"]);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn unified_explicit_delimiter_wins() {
    let path = tmp_file("csv");
    std::fs::write(&path, "qte|designation;x\n3|doliprane;y\n").unwrap();

    let opts = IngestionOptions {
        delimiter: Some(b'|'),
        ..Default::default()
    };
    let raw = ingest_from_path(&path, &opts).unwrap();
    assert_eq!(raw.headers, vec!["qte", "designation;x"]);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn audit_path_renders_report_for_fixture() {
    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let outcome = audit_path(
        "tests/fixtures/stock_export.csv",
        &IngestionOptions::default(),
        &NormalizerConfig::default(),
        &AnalysisConfig::with_today(today),
        today.and_hms_opt(10, 30, 0).unwrap(),
    )
    .unwrap();

    assert_eq!(outcome.normalized.table.len(), 4);
    let report = &outcome.report;
    assert!(report.contains("Généré le : 01/06/2024 10:30"));
    assert!(report.contains("- Ruptures : 1 produit(s)"));
    assert!(report.contains("- Stock critique : 2 produit(s)"));
    assert!(report.contains("- Valeur totale du stock : 1968.00 €"));
    assert!(report.contains("- Score moyen : 35.0/100"));
    assert!(report.trim_end().ends_with("================================"));
}

#[test]
fn audit_path_surfaces_ingestion_errors() {
    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let err = audit_path(
        "tests/fixtures/stock.unknown",
        &IngestionOptions::default(),
        &NormalizerConfig::default(),
        &AnalysisConfig::with_today(today),
        today.and_hms_opt(0, 0, 0).unwrap(),
    )
    .unwrap_err();
    assert!(matches!(err, IngestionError::UnsupportedFormat { .. }));
}

#[cfg(feature = "excel_test_writer")]
#[test]
fn unified_excel_by_extension() {
    use pharmacy_audit::ingestion::SheetSelection;
    use rust_xlsxwriter::Workbook;

    let path = tmp_file("xlsx");
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name("Inventaire").unwrap();
    ws.write_string(0, 0, "qte").unwrap();
    ws.write_number(1, 0, 4).unwrap();
    wb.save(&path).unwrap();

    let raw = ingest_from_path(&path, &IngestionOptions::default()).unwrap();
    assert_eq!(raw.rows, vec![vec![Value::Int64(4)]]);

    let opts = IngestionOptions {
        sheet: SheetSelection::Named("Inventaire".to_string()),
        ..Default::default()
    };
    assert_eq!(ingest_from_path(&path, &opts).unwrap().row_count(), 1);

    let _ = std::fs::remove_file(&path);
}
