use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct PipelineMetrics {
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
    chunks_embedded: AtomicU64,
    last_chunk_count: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful run and the number of chunks it embedded.
    pub fn record_run(&self, chunk_count: u64) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        self.chunks_embedded
            .fetch_add(chunk_count, Ordering::Relaxed);
        self.last_chunk_count.store(chunk_count, Ordering::Relaxed);
    }

    /// Record a run that aborted before producing a result.
    pub fn record_failure(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let runs_completed = self.runs_completed.load(Ordering::Relaxed);
        MetricsSnapshot {
            runs_completed,
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            chunks_embedded: self.chunks_embedded.load(Ordering::Relaxed),
            last_chunk_count: (runs_completed > 0)
                .then(|| self.last_chunk_count.load(Ordering::Relaxed)),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of runs that produced a visualization since startup.
    pub runs_completed: u64,
    /// Number of runs aborted by a component failure.
    pub runs_failed: u64,
    /// Total chunk count embedded across completed runs.
    pub chunks_embedded: u64,
    /// Chunk count of the most recent completed run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_chunk_count: Option<u64>,
}
