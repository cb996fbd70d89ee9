use thiserror::Error;

/// Convenience result type for ingestion and configuration operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Error type returned by ingestion and configuration loading.
///
/// Normalization and analysis never fail: malformed cells degrade to documented defaults and
/// missing canonical columns simply disable the rules that need them. Only the shape of the
/// input (unreadable file, unknown format, bad configuration) is reported through this enum.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "excel")]
    /// Excel ingestion error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// CSV ingestion error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The input format cannot be determined or is not compiled in.
    #[error("unsupported format: {message}")]
    UnsupportedFormat { message: String },

    /// The source has no header row (empty file or empty sheet).
    #[error("empty source: {message}")]
    EmptySource { message: String },

    /// A configuration value is invalid (bad pattern, zero threshold, ...).
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// A configuration document is not valid JSON for the expected shape.
    #[error("configuration json error: {0}")]
    ConfigJson(#[from] serde_json::Error),
}
