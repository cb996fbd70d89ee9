//! Batch execution of independent audits with configurable parallelism.
//!
//! This module sits "above" [`crate::pipeline`] and provides:
//!
//! - Parallel execution of many audit requests on a dedicated rayon pool
//! - Real-time metrics + observer hooks for monitoring
//!
//! Requests share nothing but the read-only configurations, so no coordination is needed beyond
//! the metrics counters.

mod observer;

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;

use crate::config::{AnalysisConfig, NormalizerConfig};
use crate::error::{IngestionError, IngestionResult};
use crate::ingestion::IngestionRequest;
use crate::pipeline::{audit_path, AuditOutcome};

pub use observer::{
    ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver,
    TracingExecutionObserver,
};

/// Configuration for the [`BatchEngine`].
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Number of worker threads used by the engine.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
}

/// Runs audit requests in parallel.
pub struct BatchEngine {
    pool: ThreadPool,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl BatchEngine {
    /// Create a new engine with the given options.
    ///
    /// Fails with [`IngestionError::Config`] if `num_threads == Some(0)` or the pool cannot be
    /// built.
    pub fn new(opts: BatchOptions) -> IngestionResult<Self> {
        if opts.num_threads == Some(0) {
            return Err(IngestionError::Config {
                message: "num_threads must be > 0 when set".to_string(),
            });
        }

        let n_threads = opts
            .num_threads
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
            .max(1);

        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()
            .map_err(|e| IngestionError::Config {
                message: format!("failed to build rayon thread pool: {e}"),
            })?;

        Ok(Self {
            pool,
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        })
    }

    /// Attach an observer for execution events (metrics/logging).
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Audit every request; results are returned in request order.
    ///
    /// A failing request does not stop the others.
    pub fn run(
        &self,
        requests: &[IngestionRequest],
        normalizer: &NormalizerConfig,
        analysis: &AnalysisConfig,
        generated_at: NaiveDateTime,
    ) -> Vec<IngestionResult<AuditOutcome>> {
        self.pool
            .install(|| self.run_impl(requests, normalizer, analysis, generated_at))
    }

    fn run_impl(
        &self,
        requests: &[IngestionRequest],
        normalizer: &NormalizerConfig,
        analysis: &AnalysisConfig,
        generated_at: NaiveDateTime,
    ) -> Vec<IngestionResult<AuditOutcome>> {
        let start = Instant::now();
        self.metrics.begin_run();
        self.emit(ExecutionEvent::RunStarted {
            requests: requests.len(),
        });

        let results: Vec<IngestionResult<AuditOutcome>> = requests
            .par_iter()
            .enumerate()
            .map(|(index, req)| {
                self.metrics.on_request_start();
                self.emit(ExecutionEvent::RequestStarted {
                    index,
                    path: req.path.clone(),
                });

                let result = audit_path(&req.path, &req.options, normalizer, analysis, generated_at);

                match &result {
                    Ok(outcome) => {
                        let rows_in = outcome.normalized.summary.rows_in;
                        let rows_out = outcome.normalized.summary.rows_out;
                        self.metrics.on_request_success(rows_in, rows_out);
                        self.emit(ExecutionEvent::RequestFinished {
                            index,
                            rows_in,
                            rows_out,
                        });
                    }
                    Err(e) => {
                        self.metrics.on_request_failure();
                        self.emit(ExecutionEvent::RequestFailed {
                            index,
                            error: e.to_string(),
                        });
                    }
                }
                result
            })
            .collect();

        self.metrics.end_run(start.elapsed());
        self.emit(ExecutionEvent::RunFinished {
            elapsed: start.elapsed(),
            metrics: self.metrics.snapshot(),
        });

        results
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}
