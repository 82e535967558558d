//! Two-pass purge cycle.
//!
//! Pass 1 walks every auto event of every active device and purges its
//! stream with the auto event's own policy, culling the channels it claims
//! from the cycle's working snapshot. Pass 2 purges whatever streams are
//! left in the snapshot with the configured default policy.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::RetentionConfig;
use common::model::{Device, DeviceInfo, RetentionPolicy};
use regex::Regex;
use tracing::{debug, info, warn};

use super::strategy::{PurgeOutcome, handle_event_retention};
use crate::cache::{DeviceInfoCache, DeviceStore};
use crate::metrics::PurgeMetrics;
use crate::storage::EventStore;

/// Counts of per-stream decisions within one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub evaluated: usize,
    pub purged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PassReport {
    fn record(&mut self, outcome: &PurgeOutcome) {
        self.evaluated += 1;
        match outcome {
            PurgeOutcome::Skipped(_) => self.skipped += 1,
            PurgeOutcome::Purged(_) => self.purged += 1,
        }
    }

    fn record_failure(&mut self) {
        self.evaluated += 1;
        self.failed += 1;
    }
}

/// Result of one complete purge cycle.
#[derive(Debug, Clone)]
pub struct PurgeCycleReport {
    pub cycle_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub auto_event_pass: PassReport,
    pub default_pass: PassReport,
}

impl PurgeCycleReport {
    pub fn streams_evaluated(&self) -> usize {
        self.auto_event_pass.evaluated + self.default_pass.evaluated
    }

    pub fn streams_failed(&self) -> usize {
        self.auto_event_pass.failed + self.default_pass.failed
    }

    pub fn duration_ms(&self) -> u64 {
        (self.completed_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

/// Working snapshot of the Device-Info Cache for a single cycle.
///
/// Entries are consumed as auto events claim them; the snapshot is thrown
/// away at the end of the cycle.
#[derive(Debug, Default)]
pub struct EventPurgeExecutor {
    device_infos: HashMap<i64, DeviceInfo>,
}

impl EventPurgeExecutor {
    pub fn new(device_infos: HashMap<i64, DeviceInfo>) -> Self {
        Self { device_infos }
    }

    pub fn remaining(&self) -> &HashMap<i64, DeviceInfo> {
        &self.device_infos
    }

    /// Removes every channel whose device name matches `device_pattern` and
    /// whose source name matches `source_pattern`. Matching is an unanchored
    /// regex search, so `"Device"` also claims `"DeviceA"`.
    ///
    /// An invalid pattern removes nothing. Returns the number of channels
    /// removed.
    pub fn cull_matching_device_infos(
        &mut self,
        device_pattern: &str,
        source_pattern: &str,
    ) -> usize {
        let patterns = (Regex::new(device_pattern), Regex::new(source_pattern));
        let (device_regex, source_regex) = match patterns {
            (Ok(device_regex), Ok(source_regex)) => (device_regex, source_regex),
            (Err(e), _) | (_, Err(e)) => {
                warn!(
                    device_name = %device_pattern,
                    source_name = %source_pattern,
                    error = %e,
                    "Auto event does not form a valid pattern, no device info culled"
                );
                return 0;
            }
        };

        let before = self.device_infos.len();
        self.device_infos.retain(|_, info| {
            !(device_regex.is_match(&info.device_name) && source_regex.is_match(&info.source_name))
        });
        before - self.device_infos.len()
    }

    /// Distinct streams among the remaining channels, in a stable order.
    pub fn remaining_streams(&self) -> BTreeSet<(String, String)> {
        self.device_infos
            .values()
            .map(|info| (info.device_name.clone(), info.source_name.clone()))
            .collect()
    }
}

/// Runs purge cycles against the event store.
pub struct EventPurger {
    store: Arc<dyn EventStore>,
    device_infos: Arc<dyn DeviceInfoCache>,
    devices: Arc<dyn DeviceStore>,
    config: RetentionConfig,
    metrics: PurgeMetrics,
}

impl EventPurger {
    pub fn new(
        store: Arc<dyn EventStore>,
        device_infos: Arc<dyn DeviceInfoCache>,
        devices: Arc<dyn DeviceStore>,
        config: RetentionConfig,
        metrics: PurgeMetrics,
    ) -> Self {
        Self {
            store,
            device_infos,
            devices,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    pub fn metrics(&self) -> &PurgeMetrics {
        &self.metrics
    }

    /// Runs one full cycle. Per-stream failures are logged and counted, never
    /// returned.
    pub async fn purge_events(&self) -> PurgeCycleReport {
        let started_at = Utc::now();
        let cycle_id = format!("purge_{}", started_at.timestamp_millis());

        // Both snapshots are taken up front, later changes wait for the next cycle.
        let devices = self.devices.devices();
        let mut executor = EventPurgeExecutor::new(self.device_infos.clone_with_source_name());
        let defaults = self.config.default_policy();

        info!(
            cycle_id = %cycle_id,
            devices = devices.len(),
            device_infos = executor.remaining().len(),
            "Starting event purge cycle"
        );

        let auto_event_pass = self
            .purge_by_auto_events(&mut executor, &devices, &defaults)
            .await;
        let default_pass = self.purge_by_device_infos(&executor, &defaults).await;

        let completed_at = Utc::now();
        let report = PurgeCycleReport {
            cycle_id,
            started_at,
            completed_at,
            auto_event_pass,
            default_pass,
        };
        self.metrics.record_cycle(report.duration_ms());

        info!(
            cycle_id = %report.cycle_id,
            streams_evaluated = report.streams_evaluated(),
            auto_event_purged = report.auto_event_pass.purged,
            default_purged = report.default_pass.purged,
            streams_failed = report.streams_failed(),
            duration_ms = report.duration_ms(),
            "Event purge cycle completed"
        );

        report
    }

    async fn purge_by_auto_events(
        &self,
        executor: &mut EventPurgeExecutor,
        devices: &HashMap<String, Device>,
        defaults: &RetentionPolicy,
    ) -> PassReport {
        let mut report = PassReport::default();

        for device in devices.values() {
            for auto_event in &device.auto_events {
                let policy = auto_event.retention.with_defaults(defaults);
                let culled =
                    executor.cull_matching_device_infos(&device.name, &auto_event.source_name);
                debug!(
                    device_name = %device.name,
                    source_name = %auto_event.source_name,
                    culled,
                    policy = %policy,
                    "Purging events by auto event"
                );
                self.purge_stream(&device.name, &auto_event.source_name, &policy, &mut report)
                    .await;
            }
        }

        report
    }

    async fn purge_by_device_infos(
        &self,
        executor: &EventPurgeExecutor,
        defaults: &RetentionPolicy,
    ) -> PassReport {
        let mut report = PassReport::default();

        for (device_name, source_name) in executor.remaining_streams() {
            debug!(
                device_name = %device_name,
                source_name = %source_name,
                policy = %defaults,
                "Purging events by default policy"
            );
            self.purge_stream(&device_name, &source_name, defaults, &mut report)
                .await;
        }

        report
    }

    async fn purge_stream(
        &self,
        device_name: &str,
        source_name: &str,
        policy: &RetentionPolicy,
        report: &mut PassReport,
    ) {
        match handle_event_retention(self.store.as_ref(), device_name, source_name, policy).await {
            Ok(outcome) => {
                report.record(&outcome);
                self.metrics.record_outcome(&outcome);
            }
            Err(e) => {
                warn!(
                    device_name = %device_name,
                    source_name = %source_name,
                    error = %e,
                    "Failed to purge events"
                );
                report.record_failure();
                self.metrics.record_failure();
            }
        }
    }
}
