use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use pharmacy_audit::config::{AnalysisConfig, NormalizerConfig};
use pharmacy_audit::execution::{BatchEngine, BatchOptions, TracingExecutionObserver};
use pharmacy_audit::ingestion::{
    IngestionFormat, IngestionOptions, IngestionRequest, SheetSelection, TracingObserver,
};

#[derive(Debug, Parser)]
#[command(name = "pharmacy-audit")]
#[command(about = "Normalize pharmacy stock exports and print an audit report")]
struct Cli {
    /// Stock files to audit (.csv, .tsv, .txt, .xlsx, .xls, .ods, ...).
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Workbook sheet to read (defaults to the first sheet).
    #[arg(long)]
    sheet: Option<String>,

    /// JSON file with optional `normalizer` and `analysis` sections.
    #[arg(long, env = "PHARMACY_AUDIT_CONFIG")]
    config: Option<PathBuf>,

    /// Reference date for expiry rules (YYYY-MM-DD, defaults to today).
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Force the input format instead of using the file extension.
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Print the canonical table as JSON instead of the report.
    #[arg(long)]
    json: bool,

    /// Worker threads for multi-file runs.
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Excel,
}

impl From<FormatArg> for IngestionFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Csv => IngestionFormat::Csv,
            FormatArg::Excel => IngestionFormat::Excel,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    normalizer: Option<serde_json::Value>,
    analysis: Option<serde_json::Value>,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<(NormalizerConfig, AnalysisConfig)> {
    let Some(path) = path else {
        return Ok((NormalizerConfig::default(), AnalysisConfig::default()));
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let file: ConfigFile = serde_json::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;

    let normalizer = match file.normalizer {
        Some(v) => NormalizerConfig::from_json_str(&v.to_string())?,
        None => NormalizerConfig::default(),
    };
    let analysis = match file.analysis {
        Some(v) => AnalysisConfig::from_json_str(&v.to_string())?,
        None => AnalysisConfig::default(),
    };
    Ok((normalizer, analysis))
}

fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn"))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (normalizer, mut analysis) = load_config(cli.config.as_deref())?;
    if let Some(today) = cli.today {
        analysis.today = today;
    }

    let options = IngestionOptions {
        format: cli.format.map(Into::into),
        sheet: cli.sheet.map(SheetSelection::Named).unwrap_or_default(),
        observer: Some(Arc::new(TracingObserver)),
        ..Default::default()
    };
    let requests: Vec<IngestionRequest> = cli
        .paths
        .iter()
        .map(|p| IngestionRequest {
            path: p.clone(),
            options: options.clone(),
        })
        .collect();

    let engine = BatchEngine::new(BatchOptions {
        num_threads: cli.threads,
    })?
    .with_observer(Arc::new(TracingExecutionObserver));

    let generated_at = chrono::Local::now().naive_local();
    let results = engine.run(&requests, &normalizer, &analysis, generated_at);

    let mut failures = 0usize;
    for (req, result) in requests.iter().zip(results) {
        match result {
            Ok(outcome) => {
                if cli.json {
                    println!("{}", outcome.normalized.table.to_json()?);
                } else {
                    if requests.len() > 1 {
                        println!("## {}", req.path.display());
                    }
                    print!("{}", outcome.report);
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("error: {}: {e}", req.path.display());
            }
        }
    }

    if failures > 0 {
        bail!("{failures} file(s) could not be audited");
    }
    Ok(())
}
