//! Event retention engine.
//!
//! Keeps the event store bounded by periodically purging old events per
//! stream (a `(device name, source name)` pair) while honouring the floor
//! and high watermark of each stream's retention policy.
//!
//! ## Architecture
//!
//! - `cache`: the Device-Info Cache (deduplicated reading channels) and the
//!   Active-Device Store (devices with their auto event policies)
//! - `directory`: applies device add/update/delete notifications to the store
//! - `storage`: the gateway trait the engine deletes through, plus an
//!   in-memory implementation
//! - `purge`: the per-stream strategy decision and the two-pass executor
//! - `scheduler`: the cancellable background loop driving purge cycles
//! - `metrics`: counters describing purge activity

pub mod cache;
pub mod directory;
pub mod error;
pub mod metrics;
pub mod purge;
pub mod scheduler;
pub mod storage;

pub use cache::{
    DeviceInfoCache, DeviceStore, LocalDeviceInfoCache, LocalDeviceStore, seed_device_info_cache,
};
pub use directory::{DeviceAction, DeviceChange, DirectoryHandler};
pub use error::RetentionError;
pub use metrics::{PurgeMetrics, PurgeMetricsSummary};
pub use purge::{
    EventPurgeExecutor, EventPurger, PassReport, PurgeAction, PurgeCycleReport, PurgeOutcome,
    SkipReason, handle_event_retention,
};
pub use scheduler::PurgeScheduler;
pub use storage::{EventStore, InMemoryEventStore, StoreError, StoreResult};
