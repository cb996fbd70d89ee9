use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Execution events emitted by the batch engine.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted { requests: usize },
    RequestStarted { index: usize, path: PathBuf },
    RequestFinished { index: usize, rows_in: usize, rows_out: usize },
    RequestFailed { index: usize, error: String },
    RunFinished {
        elapsed: Duration,
        metrics: ExecutionMetricsSnapshot,
    },
}

/// Observer hook for execution events.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// Forwards execution events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingExecutionObserver;

impl ExecutionObserver for TracingExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::RunStarted { requests } => {
                tracing::info!(requests, "batch started");
            }
            ExecutionEvent::RequestStarted { index, path } => {
                tracing::debug!(index, path = %path.display(), "audit started");
            }
            ExecutionEvent::RequestFinished {
                index,
                rows_in,
                rows_out,
            } => {
                tracing::debug!(index, rows_in, rows_out, "audit finished");
            }
            ExecutionEvent::RequestFailed { index, error } => {
                tracing::warn!(index, %error, "audit failed");
            }
            ExecutionEvent::RunFinished { elapsed, metrics } => {
                tracing::info!(?elapsed, %metrics, "batch finished");
            }
        }
    }
}

/// Real-time metrics for a batch run.
///
/// The engine updates these counters during execution; callers can snapshot them at any time.
pub struct ExecutionMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    requests_started: AtomicU64,
    requests_finished: AtomicU64,
    requests_failed: AtomicU64,
    rows_ingested: AtomicU64,
    rows_kept: AtomicU64,

    active_requests: AtomicUsize,
    max_active_requests: AtomicUsize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            run_id: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
            requests_started: AtomicU64::new(0),
            requests_finished: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            rows_ingested: AtomicU64::new(0),
            rows_kept: AtomicU64::new(0),
            active_requests: AtomicUsize::new(0),
            max_active_requests: AtomicUsize::new(0),
        }
    }

    pub fn begin_run(&self) {
        let _ = self.run_id.fetch_add(1, Ordering::SeqCst);

        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.requests_started.store(0, Ordering::SeqCst);
        self.requests_finished.store(0, Ordering::SeqCst);
        self.requests_failed.store(0, Ordering::SeqCst);
        self.rows_ingested.store(0, Ordering::SeqCst);
        self.rows_kept.store(0, Ordering::SeqCst);
        self.active_requests.store(0, Ordering::SeqCst);
        self.max_active_requests.store(0, Ordering::SeqCst);
    }

    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns
            .store(elapsed.as_nanos().min(u64::MAX as u128) as u64, Ordering::SeqCst);
    }

    pub fn on_request_start(&self) {
        let _ = self.requests_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_requests.fetch_add(1, Ordering::SeqCst) + 1;
        update_max_usize(&self.max_active_requests, now);
    }

    /// A request completed; `rows_in` source rows were read and `rows_out` survived
    /// normalization.
    pub fn on_request_success(&self, rows_in: usize, rows_out: usize) {
        let _ = self.requests_finished.fetch_add(1, Ordering::SeqCst);
        let _ = self.rows_ingested.fetch_add(rows_in as u64, Ordering::SeqCst);
        let _ = self.rows_kept.fetch_add(rows_out as u64, Ordering::SeqCst);
        let _ = self.active_requests.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn on_request_failure(&self) {
        let _ = self.requests_failed.fetch_add(1, Ordering::SeqCst);
        let _ = self.active_requests.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = if elapsed_ns > 0 {
            Some(Duration::from_nanos(elapsed_ns))
        } else {
            None
        };

        ExecutionMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed,
            requests_started: self.requests_started.load(Ordering::SeqCst),
            requests_finished: self.requests_finished.load(Ordering::SeqCst),
            requests_failed: self.requests_failed.load(Ordering::SeqCst),
            rows_ingested: self.rows_ingested.load(Ordering::SeqCst),
            rows_kept: self.rows_kept.load(Ordering::SeqCst),
            max_active_requests: self.max_active_requests.load(Ordering::SeqCst),
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn update_max_usize(dst: &AtomicUsize, now: usize) {
    let _ = dst.fetch_max(now, Ordering::SeqCst);
}

/// Immutable snapshot of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub requests_started: u64,
    pub requests_finished: u64,
    pub requests_failed: u64,
    pub rows_ingested: u64,
    pub rows_kept: u64,
    pub max_active_requests: usize,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, requests={}/{} (failed {}), rows={}/{}, max_active_requests={}, elapsed={:?}",
            self.run_id,
            self.requests_finished,
            self.requests_started,
            self.requests_failed,
            self.rows_kept,
            self.rows_ingested,
            self.max_active_requests,
            self.elapsed
        )
    }
}
