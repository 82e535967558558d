//! Per-stream retention decision.
//!
//! ```text
//! Gate ──(count < maxCap)──────────────────────────▶ Skip
//!  │
//!  ▼
//! Evaluate ──(bad duration)────────────────────────▶ Fatal
//!  ├─(duration > 0)─▶ TimeBased
//!  │                   ├─ minCap ≤ 0: delete older than duration
//!  │                   └─ minCap > 0: offset lookup within duration,
//!  │                                  not found ───▶ Skip
//!  └─(otherwise)───▶ CountBased
//!                      ├─ minCap ≤ 0: delete the whole stream
//!                      └─ minCap > 0: offset lookup,
//!                                     not found ───▶ Skip
//! ```
//!
//! Both offset lookups turn "keep the `minCap` newest events" into an age
//! cutoff the store can run as a single delete.

use std::time::Duration;

use common::model::RetentionPolicy;
use common::parse_duration_with_day;
use tracing::debug;

use crate::error::RetentionError;
use crate::storage::{EventStore, StoreError, now_nanos};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The high watermark has not been reached.
    BelowMaxCap { count: u64, max_cap: i64 },
    /// The stream does not hold more than `min_cap` qualifying events.
    BelowMinCap { min_cap: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeAction {
    /// Events older than `age_nanos` were deleted.
    OlderThan { age_nanos: i64 },
    /// Every event of the stream was deleted.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOutcome {
    Skipped(SkipReason),
    Purged(PurgeAction),
}

/// Applies `policy` to the stream `(device_name, source_name)`.
///
/// `policy` must already carry the configured defaults for unset fields.
pub async fn handle_event_retention(
    store: &dyn EventStore,
    device_name: &str,
    source_name: &str,
    policy: &RetentionPolicy,
) -> Result<PurgeOutcome, RetentionError> {
    if policy.max_cap > 0 {
        // Bounded count: only needs to know whether the watermark is reached.
        let max_cap = policy.max_cap as u64;
        let count = store
            .count_by_device_and_source_limited(device_name, source_name, max_cap)
            .await
            .map_err(RetentionError::storage(device_name, source_name, "count events"))?;
        if count < max_cap {
            debug!(
                device_name = %device_name,
                source_name = %source_name,
                count,
                max_cap = policy.max_cap,
                "Skip event retention, max capacity not reached"
            );
            return Ok(PurgeOutcome::Skipped(SkipReason::BelowMaxCap {
                count,
                max_cap: policy.max_cap,
            }));
        }
    }

    let duration = parse_duration_with_day(&policy.duration).map_err(|source| {
        RetentionError::InvalidDuration {
            device_name: device_name.to_string(),
            source_name: source_name.to_string(),
            duration: policy.duration.clone(),
            source,
        }
    })?;

    debug!(
        device_name = %device_name,
        source_name = %source_name,
        max_cap = policy.max_cap,
        min_cap = policy.min_cap,
        duration = %policy.duration,
        "Executing event retention"
    );

    if duration > Duration::ZERO {
        time_based_retention(store, device_name, source_name, policy.min_cap, duration).await
    } else {
        count_based_retention(store, device_name, source_name, policy.min_cap).await
    }
}

async fn time_based_retention(
    store: &dyn EventStore,
    device_name: &str,
    source_name: &str,
    min_cap: i64,
    duration: Duration,
) -> Result<PurgeOutcome, RetentionError> {
    let duration_nanos = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);

    if min_cap <= 0 {
        debug!(
            device_name = %device_name,
            source_name = %source_name,
            duration = ?duration,
            "MinCap disabled, purging events by duration"
        );
        store
            .delete_by_age_and_device_and_source(duration_nanos, device_name, source_name)
            .await
            .map_err(RetentionError::storage(device_name, source_name, "delete events by age"))?;
        return Ok(PurgeOutcome::Purged(PurgeAction::OlderThan {
            age_nanos: duration_nanos,
        }));
    }

    let lookup = store
        .latest_by_device_and_source_with_age_and_offset(
            device_name,
            source_name,
            duration_nanos,
            min_cap as u64,
        )
        .await;
    purge_older_than_found(store, device_name, source_name, min_cap, lookup).await
}

/// Deletes the whole stream when `min_cap` is disabled. This has no age
/// bound at all, unlike the time-based equivalent.
async fn count_based_retention(
    store: &dyn EventStore,
    device_name: &str,
    source_name: &str,
    min_cap: i64,
) -> Result<PurgeOutcome, RetentionError> {
    if min_cap <= 0 {
        debug!(
            device_name = %device_name,
            source_name = %source_name,
            "MinCap disabled, purging every event of the stream"
        );
        store
            .delete_by_device_and_source(device_name, source_name)
            .await
            .map_err(RetentionError::storage(device_name, source_name, "delete events"))?;
        return Ok(PurgeOutcome::Purged(PurgeAction::All));
    }

    let lookup = store
        .latest_by_device_and_source_with_offset(device_name, source_name, min_cap as u64)
        .await;
    purge_older_than_found(store, device_name, source_name, min_cap, lookup).await
}

async fn purge_older_than_found(
    store: &dyn EventStore,
    device_name: &str,
    source_name: &str,
    min_cap: i64,
    lookup: Result<common::model::Event, StoreError>,
) -> Result<PurgeOutcome, RetentionError> {
    let event = match lookup {
        Ok(event) => event,
        Err(StoreError::NotFound { .. }) => {
            debug!(
                device_name = %device_name,
                source_name = %source_name,
                min_cap,
                "Skip event retention, stream holds no more than minCap events"
            );
            return Ok(PurgeOutcome::Skipped(SkipReason::BelowMinCap { min_cap }));
        }
        Err(e) => {
            return Err(RetentionError::storage(
                device_name,
                source_name,
                "look up event at minCap offset",
            )(e));
        }
    };

    let age_nanos = now_nanos().saturating_sub(event.origin);
    debug!(
        device_name = %device_name,
        source_name = %source_name,
        min_cap,
        age_nanos,
        "Purging events older than the minCap boundary"
    );
    store
        .delete_by_age_and_device_and_source(age_nanos, device_name, source_name)
        .await
        .map_err(RetentionError::storage(device_name, source_name, "delete events by age"))?;

    Ok(PurgeOutcome::Purged(PurgeAction::OlderThan { age_nanos }))
}
