//! Purge Metrics
//!
//! Thread-safe counters describing event retention activity.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tracing::info;

use crate::purge::{PurgeAction, PurgeOutcome};

#[derive(Debug, Clone, Default)]
pub struct PurgeMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Completed purge cycles
    cycles_run: AtomicUsize,
    /// Streams for which a retention decision was attempted
    streams_evaluated: AtomicUsize,
    /// Streams that received an age-bounded delete
    streams_purged_by_age: AtomicUsize,
    /// Streams that were emptied completely
    streams_purged_entirely: AtomicUsize,
    /// Streams left alone because a cap was not reached
    streams_skipped: AtomicUsize,
    /// Streams whose decision failed
    stream_failures: AtomicUsize,
    /// Total cycle duration in milliseconds
    total_duration_ms: AtomicU64,
}

impl PurgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self, duration_ms: u64) {
        self.inner.cycles_run.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_duration_ms
            .fetch_add(duration_ms, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: &PurgeOutcome) {
        self.inner.streams_evaluated.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            PurgeOutcome::Skipped(_) => &self.inner.streams_skipped,
            PurgeOutcome::Purged(PurgeAction::OlderThan { .. }) => {
                &self.inner.streams_purged_by_age
            }
            PurgeOutcome::Purged(PurgeAction::All) => &self.inner.streams_purged_entirely,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.inner.streams_evaluated.fetch_add(1, Ordering::Relaxed);
        self.inner.stream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycles_run(&self) -> usize {
        self.inner.cycles_run.load(Ordering::Relaxed)
    }

    pub fn streams_evaluated(&self) -> usize {
        self.inner.streams_evaluated.load(Ordering::Relaxed)
    }

    pub fn streams_purged(&self) -> usize {
        self.inner.streams_purged_by_age.load(Ordering::Relaxed)
            + self.inner.streams_purged_entirely.load(Ordering::Relaxed)
    }

    pub fn streams_skipped(&self) -> usize {
        self.inner.streams_skipped.load(Ordering::Relaxed)
    }

    pub fn stream_failures(&self) -> usize {
        self.inner.stream_failures.load(Ordering::Relaxed)
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.inner.total_duration_ms.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> PurgeMetricsSummary {
        PurgeMetricsSummary {
            cycles_run: self.cycles_run(),
            streams_evaluated: self.streams_evaluated(),
            streams_purged_by_age: self.inner.streams_purged_by_age.load(Ordering::Relaxed),
            streams_purged_entirely: self.inner.streams_purged_entirely.load(Ordering::Relaxed),
            streams_skipped: self.streams_skipped(),
            stream_failures: self.stream_failures(),
            avg_cycle_duration_ms: match self.cycles_run() {
                0 => 0.0,
                cycles => self.total_duration_ms() as f64 / cycles as f64,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurgeMetricsSummary {
    pub cycles_run: usize,
    pub streams_evaluated: usize,
    pub streams_purged_by_age: usize,
    pub streams_purged_entirely: usize,
    pub streams_skipped: usize,
    pub stream_failures: usize,
    pub avg_cycle_duration_ms: f64,
}

impl PurgeMetricsSummary {
    pub fn log(&self) {
        info!(
            cycles_run = self.cycles_run,
            streams_evaluated = self.streams_evaluated,
            streams_purged_by_age = self.streams_purged_by_age,
            streams_purged_entirely = self.streams_purged_entirely,
            streams_skipped = self.streams_skipped,
            stream_failures = self.stream_failures,
            avg_cycle_duration_ms = format!("{:.2}", self.avg_cycle_duration_ms),
            "Event retention metrics summary"
        );
    }
}
