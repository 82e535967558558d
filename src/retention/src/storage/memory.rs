use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use async_trait::async_trait;
use common::model::{DeviceInfo, Event};
use parking_lot::RwLock;
use tracing::debug;

use super::{EventStore, StoreError, StoreResult, now_nanos};
use crate::cache::DeviceInfoCache;

#[derive(Debug, Clone)]
struct StoredEvent {
    event: Event,
    /// Channel id of each reading, in reading order.
    device_info_ids: Vec<i64>,
}

/// Event store kept entirely in process memory.
///
/// Ingestion goes through [`InMemoryEventStore::add_event`], which resolves
/// each reading's channel through the shared Device-Info Cache and persists
/// a new channel row whenever the cache has not seen the descriptor yet.
pub struct InMemoryEventStore {
    events: RwLock<Vec<StoredEvent>>,
    device_info_rows: RwLock<BTreeMap<i64, DeviceInfo>>,
    device_info_cache: Arc<dyn DeviceInfoCache>,
    next_device_info_id: AtomicI64,
    next_event_id: AtomicU64,
}

impl InMemoryEventStore {
    pub fn new(device_info_cache: Arc<dyn DeviceInfoCache>) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            device_info_rows: RwLock::new(BTreeMap::new()),
            device_info_cache,
            next_device_info_id: AtomicI64::new(1),
            next_event_id: AtomicU64::new(1),
        }
    }

    /// Persists `event`, assigning ids to the event and its readings.
    pub fn add_event(&self, mut event: Event) -> Event {
        if event.id.is_empty() {
            event.id = self.next_event_id.fetch_add(1, Ordering::Relaxed).to_string();
        }

        let mut device_info_ids = Vec::with_capacity(event.readings.len());
        for (index, reading) in event.readings.iter_mut().enumerate() {
            if reading.id.is_empty() {
                reading.id = format!("{}-{}", event.id, index);
            }
            let info = reading.device_info(&event.source_name);
            device_info_ids.push(self.device_info_id(info));
        }

        self.events.write().push(StoredEvent {
            event: event.clone(),
            device_info_ids,
        });
        event
    }

    /// Id of the channel `info` belongs to, creating the channel when needed.
    fn device_info_id(&self, mut info: DeviceInfo) -> i64 {
        loop {
            if let Some(id) = self.device_info_cache.get_id(&info) {
                return id;
            }

            info.id = self.next_device_info_id.fetch_add(1, Ordering::Relaxed);
            if self.device_info_cache.add(info.clone()) {
                self.device_info_rows.write().insert(info.id, info.clone());
                return info.id;
            }
            // Another ingestion registered the descriptor first, or the id
            // is already taken. Look again.
        }
    }

    pub fn event_count(&self) -> usize {
        self.events.read().len()
    }

    pub fn reading_count(&self) -> usize {
        self.events
            .read()
            .iter()
            .map(|stored| stored.event.readings.len())
            .sum()
    }

    /// Number of stored readings recorded against one channel.
    pub fn reading_count_by_device_info(&self, device_info_id: i64) -> usize {
        self.events
            .read()
            .iter()
            .flat_map(|stored| stored.device_info_ids.iter())
            .filter(|id| **id == device_info_id)
            .count()
    }

    /// Events of one stream, newest first.
    pub fn events_by_device_and_source(&self, device_name: &str, source_name: &str) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .events
            .read()
            .iter()
            .filter(|stored| in_stream(&stored.event, device_name, source_name))
            .map(|stored| stored.event.clone())
            .collect();
        events.sort_by(|a, b| b.origin.cmp(&a.origin));
        events
    }

    fn nth_newest(
        &self,
        device_name: &str,
        source_name: &str,
        min_origin: Option<i64>,
        offset: u64,
    ) -> StoreResult<Event> {
        let mut events: Vec<Event> = self
            .events
            .read()
            .iter()
            .filter(|stored| in_stream(&stored.event, device_name, source_name))
            .filter(|stored| min_origin.is_none_or(|min| stored.event.origin >= min))
            .map(|stored| stored.event.clone())
            .collect();
        events.sort_by(|a, b| b.origin.cmp(&a.origin));

        usize::try_from(offset)
            .ok()
            .and_then(|offset| events.into_iter().nth(offset))
            .ok_or_else(|| StoreError::NotFound {
                device_name: device_name.to_string(),
                source_name: source_name.to_string(),
            })
    }

    fn delete_where(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        let mut events = self.events.write();
        let before = events.len();
        events.retain(|stored| !predicate(&stored.event));
        before - events.len()
    }
}

fn in_stream(event: &Event, device_name: &str, source_name: &str) -> bool {
    event.device_name == device_name && event.source_name == source_name
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn count_by_device_and_source_limited(
        &self,
        device_name: &str,
        source_name: &str,
        limit: u64,
    ) -> StoreResult<u64> {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let count = self
            .events
            .read()
            .iter()
            .filter(|stored| in_stream(&stored.event, device_name, source_name))
            .take(limit)
            .count();
        Ok(count as u64)
    }

    async fn delete_by_age_and_device_and_source(
        &self,
        age_nanos: i64,
        device_name: &str,
        source_name: &str,
    ) -> StoreResult<()> {
        let cutoff = now_nanos().saturating_sub(age_nanos);
        let deleted = self.delete_where(|event| {
            in_stream(event, device_name, source_name) && event.origin < cutoff
        });
        debug!(
            device_name = %device_name,
            source_name = %source_name,
            cutoff,
            deleted,
            "Deleted events by age"
        );
        Ok(())
    }

    async fn delete_by_device_and_source(
        &self,
        device_name: &str,
        source_name: &str,
    ) -> StoreResult<()> {
        let deleted = self.delete_where(|event| in_stream(event, device_name, source_name));
        debug!(
            device_name = %device_name,
            source_name = %source_name,
            deleted,
            "Deleted all events of stream"
        );
        Ok(())
    }

    async fn latest_by_device_and_source_with_age_and_offset(
        &self,
        device_name: &str,
        source_name: &str,
        age_nanos: i64,
        offset: u64,
    ) -> StoreResult<Event> {
        let min_origin = now_nanos().saturating_sub(age_nanos);
        self.nth_newest(device_name, source_name, Some(min_origin), offset)
    }

    async fn latest_by_device_and_source_with_offset(
        &self,
        device_name: &str,
        source_name: &str,
        offset: u64,
    ) -> StoreResult<Event> {
        self.nth_newest(device_name, source_name, None, offset)
    }

    async fn delete_by_device_name(&self, device_name: &str) -> StoreResult<()> {
        let deleted = self.delete_where(|event| event.device_name == device_name);
        self.device_info_rows
            .write()
            .retain(|_, info| info.device_name != device_name);
        debug!(device_name = %device_name, deleted, "Deleted all events of device");
        Ok(())
    }

    async fn device_infos(&self) -> StoreResult<Vec<DeviceInfo>> {
        Ok(self.device_info_rows.read().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalDeviceInfoCache;

    const SECOND: i64 = 1_000_000_000;

    fn store() -> (Arc<LocalDeviceInfoCache>, InMemoryEventStore) {
        let cache = Arc::new(LocalDeviceInfoCache::default());
        let store = InMemoryEventStore::new(cache.clone());
        (cache, store)
    }

    fn event(device: &str, source: &str, seconds_ago: i64) -> Event {
        Event::new(device, source, now_nanos() - seconds_ago * SECOND)
            .with_simple_reading("temperature", "Float64", "21.5")
    }

    #[tokio::test]
    async fn ingestion_registers_each_channel_once() {
        let (cache, store) = store();
        let first = store.add_event(event("dev", "src", 1));
        store.add_event(event("dev", "src", 2));

        assert_eq!(cache.len(), 1);
        assert_eq!(store.device_infos().await.unwrap().len(), 1);

        let id = cache
            .get_id(&first.readings[0].device_info(&first.source_name))
            .unwrap();
        assert_eq!(store.reading_count_by_device_info(id), 2);
        assert_eq!(store.reading_count(), 2);
    }

    #[tokio::test]
    async fn ingestion_skips_ids_taken_in_cache() {
        let (cache, store) = store();
        cache.add(DeviceInfo {
            id: 1,
            device_name: "seeded".into(),
            source_name: "src".into(),
            ..Default::default()
        });

        let stored = store.add_event(event("dev", "src", 1));
        let id = cache
            .get_id(&stored.readings[0].device_info("src"))
            .unwrap();
        assert_eq!(id, 2);
    }

    #[tokio::test]
    async fn limited_count_stops_at_limit() {
        let (_, store) = store();
        for i in 0..5 {
            store.add_event(event("dev", "src", i));
        }
        store.add_event(event("dev", "other", 0));

        let count = store
            .count_by_device_and_source_limited("dev", "src", 3)
            .await
            .unwrap();
        assert_eq!(count, 3);
        let count = store
            .count_by_device_and_source_limited("dev", "src", 100)
            .await
            .unwrap();
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn offset_lookup_orders_newest_first() {
        let (_, store) = store();
        for seconds_ago in [30, 10, 20] {
            store.add_event(event("dev", "src", seconds_ago));
        }

        let newest = store
            .latest_by_device_and_source_with_offset("dev", "src", 0)
            .await
            .unwrap();
        let second = store
            .latest_by_device_and_source_with_offset("dev", "src", 1)
            .await
            .unwrap();
        assert!(newest.origin > second.origin);

        let missing = store
            .latest_by_device_and_source_with_offset("dev", "src", 3)
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn age_bounded_offset_lookup_ignores_old_events() {
        let (_, store) = store();
        store.add_event(event("dev", "src", 5));
        store.add_event(event("dev", "src", 3600));

        let within = store
            .latest_by_device_and_source_with_age_and_offset("dev", "src", 60 * SECOND, 0)
            .await
            .unwrap();
        assert!(now_nanos() - within.origin < 60 * SECOND);

        let beyond = store
            .latest_by_device_and_source_with_age_and_offset("dev", "src", 60 * SECOND, 1)
            .await;
        assert!(matches!(beyond, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn delete_by_age_keeps_recent_events() {
        let (_, store) = store();
        store.add_event(event("dev", "src", 5));
        store.add_event(event("dev", "src", 3600));
        store.add_event(event("dev", "other", 3600));

        store
            .delete_by_age_and_device_and_source(60 * SECOND, "dev", "src")
            .await
            .unwrap();

        assert_eq!(store.events_by_device_and_source("dev", "src").len(), 1);
        assert_eq!(store.events_by_device_and_source("dev", "other").len(), 1);
    }

    #[tokio::test]
    async fn delete_by_device_drops_events_and_channel_rows() {
        let (_, store) = store();
        store.add_event(event("dev", "a", 1));
        store.add_event(event("dev", "b", 1));
        store.add_event(event("keep", "a", 1));

        store.delete_by_device_name("dev").await.unwrap();

        assert_eq!(store.event_count(), 1);
        let rows = store.device_infos().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].device_name, "keep");
    }
}
