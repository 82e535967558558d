//! Storage gateway consumed by the retention engine.
//!
//! Every operation except [`EventStore::delete_by_device_name`] and
//! [`EventStore::device_infos`] is scoped to a single stream. Ages are signed
//! nanosecond offsets from the store's current time: "older than `age`"
//! means `origin < now - age`.

pub mod memory;
#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use chrono::Utc;
use common::model::{DeviceInfo, Event};
use thiserror::Error;

pub use memory::InMemoryEventStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested event does not exist. Offset lookups report this when
    /// a stream holds too little history.
    #[error("no event found for device '{device_name}', source '{source_name}'")]
    NotFound {
        device_name: String,
        source_name: String,
    },

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Number of events in the stream, counting no further than `limit`.
    async fn count_by_device_and_source_limited(
        &self,
        device_name: &str,
        source_name: &str,
        limit: u64,
    ) -> StoreResult<u64>;

    /// Deletes the stream's events (and their readings) older than `age_nanos`.
    async fn delete_by_age_and_device_and_source(
        &self,
        age_nanos: i64,
        device_name: &str,
        source_name: &str,
    ) -> StoreResult<()>;

    /// Deletes every event of the stream.
    async fn delete_by_device_and_source(
        &self,
        device_name: &str,
        source_name: &str,
    ) -> StoreResult<()>;

    /// Among the stream's events no older than `age_nanos`, ordered newest
    /// first, the one at position `offset`.
    async fn latest_by_device_and_source_with_age_and_offset(
        &self,
        device_name: &str,
        source_name: &str,
        age_nanos: i64,
        offset: u64,
    ) -> StoreResult<Event>;

    /// Among all of the stream's events, ordered newest first, the one at
    /// position `offset`.
    async fn latest_by_device_and_source_with_offset(
        &self,
        device_name: &str,
        source_name: &str,
        offset: u64,
    ) -> StoreResult<Event>;

    /// Deletes every event of a device regardless of source.
    async fn delete_by_device_name(&self, device_name: &str) -> StoreResult<()>;

    /// All persisted channel descriptors, used to seed the Device-Info Cache.
    async fn device_infos(&self) -> StoreResult<Vec<DeviceInfo>>;
}

/// Current wall-clock time in nanoseconds since the Unix epoch.
pub fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}
