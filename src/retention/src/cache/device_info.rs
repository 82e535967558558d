use std::collections::HashMap;

use common::model::DeviceInfo;
use parking_lot::RwLock;
use tracing::debug;

use crate::storage::{EventStore, StoreResult};

/// Deduplicating directory of reading channels.
pub trait DeviceInfoCache: Send + Sync {
    /// Surrogate id of the channel matching `info`'s descriptor fields.
    fn get_id(&self, info: &DeviceInfo) -> Option<i64>;

    /// Copy of every channel that carries a source name, keyed by id.
    fn clone_with_source_name(&self) -> HashMap<i64, DeviceInfo>;

    /// Inserts `info` unless its digest or its id is already known.
    /// Returns whether the entry was inserted.
    fn add(&self, info: DeviceInfo) -> bool;

    /// Drops the channel matching `info`'s descriptor fields, if any.
    fn remove(&self, info: &DeviceInfo);

    /// Every channel of one device, with or without a source name.
    fn device_infos_by_device(&self, device_name: &str) -> Vec<DeviceInfo>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
struct DeviceInfoMaps {
    ids_by_key: HashMap<String, i64>,
    infos_by_id: HashMap<i64, DeviceInfo>,
}

#[derive(Debug, Default)]
pub struct LocalDeviceInfoCache {
    maps: RwLock<DeviceInfoMaps>,
}

impl LocalDeviceInfoCache {
    /// Builds the cache from persisted rows. Duplicates are dropped the same
    /// way [`DeviceInfoCache::add`] drops them.
    pub fn new(infos: impl IntoIterator<Item = DeviceInfo>) -> Self {
        let cache = Self::default();
        for info in infos {
            cache.add(info);
        }
        cache
    }
}

impl DeviceInfoCache for LocalDeviceInfoCache {
    fn get_id(&self, info: &DeviceInfo) -> Option<i64> {
        let key = info.key();
        self.maps.read().ids_by_key.get(&key).copied()
    }

    fn clone_with_source_name(&self) -> HashMap<i64, DeviceInfo> {
        self.maps
            .read()
            .infos_by_id
            .iter()
            .filter(|(_, info)| info.has_source_name())
            .map(|(id, info)| (*id, info.clone()))
            .collect()
    }

    fn add(&self, info: DeviceInfo) -> bool {
        let key = info.key();
        let mut maps = self.maps.write();

        if let Some(existing) = maps.ids_by_key.get(&key) {
            debug!(
                id = info.id,
                existing_id = *existing,
                device_name = %info.device_name,
                source_name = %info.source_name,
                "Device info already cached, ignoring"
            );
            return false;
        }
        if maps.infos_by_id.contains_key(&info.id) {
            debug!(
                id = info.id,
                device_name = %info.device_name,
                "Device info id already in use, ignoring"
            );
            return false;
        }

        maps.ids_by_key.insert(key, info.id);
        maps.infos_by_id.insert(info.id, info);
        true
    }

    fn remove(&self, info: &DeviceInfo) {
        let key = info.key();
        let mut maps = self.maps.write();
        if let Some(id) = maps.ids_by_key.remove(&key) {
            maps.infos_by_id.remove(&id);
        }
    }

    fn device_infos_by_device(&self, device_name: &str) -> Vec<DeviceInfo> {
        self.maps
            .read()
            .infos_by_id
            .values()
            .filter(|info| info.device_name == device_name)
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.maps.read().infos_by_id.len()
    }
}

/// Loads every channel row persisted in `store` into `cache`, so ids handed
/// out before a restart keep resolving. Returns how many rows were inserted.
pub async fn seed_device_info_cache(
    cache: &dyn DeviceInfoCache,
    store: &dyn EventStore,
) -> StoreResult<usize> {
    let rows = store.device_infos().await?;
    let total = rows.len();
    let inserted = rows.into_iter().filter(|info| cache.add(info.clone())).count();
    debug!(rows = total, inserted, "Seeded device info cache");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mock::MockEventStore;
    use std::sync::Arc;

    fn info(id: i64, device: &str, source: &str, resource: &str) -> DeviceInfo {
        DeviceInfo {
            id,
            device_name: device.into(),
            profile_name: "profile".into(),
            source_name: source.into(),
            resource_name: resource.into(),
            value_type: "Float32".into(),
            ..Default::default()
        }
    }

    #[test]
    fn identical_descriptors_share_one_entry() {
        let cache = LocalDeviceInfoCache::default();
        let first = info(1, "dev", "src", "temp");
        let second = info(1, "dev", "src", "temp");

        assert!(cache.add(first.clone()));
        assert!(!cache.add(second.clone()));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_id(&first), cache.get_id(&second));
        assert_eq!(cache.get_id(&first), Some(1));
    }

    #[test]
    fn first_write_wins_on_equal_digest() {
        let cache = LocalDeviceInfoCache::default();
        cache.add(info(1, "dev", "src", "temp"));
        cache.add(info(2, "dev", "src", "temp"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_id(&info(0, "dev", "src", "temp")), Some(1));
    }

    #[test]
    fn add_ignores_reused_id() {
        let cache = LocalDeviceInfoCache::default();
        cache.add(info(1, "dev", "src", "temp"));
        assert!(!cache.add(info(1, "dev", "src", "humidity")));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_id(&info(0, "dev", "src", "humidity")), None);
    }

    #[test]
    fn remove_clears_both_maps() {
        let cache = LocalDeviceInfoCache::default();
        let entry = info(5, "dev", "src", "temp");
        cache.add(entry.clone());

        // the caller may not know the id, the digest is enough
        cache.remove(&info(0, "dev", "src", "temp"));
        assert_eq!(cache.get_id(&entry), None);
        assert!(cache.is_empty());

        // the freed id can be reused
        assert!(cache.add(info(5, "dev", "src", "pressure")));
    }

    #[test]
    fn remove_missing_entry_is_noop() {
        let cache = LocalDeviceInfoCache::new([info(1, "dev", "src", "temp")]);
        cache.remove(&info(0, "other", "src", "temp"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clone_skips_entries_without_source() {
        let cache = LocalDeviceInfoCache::new([
            info(1, "dev", "src", "temp"),
            info(2, "dev", "", "legacy"),
        ]);

        let snapshot = cache.clone_with_source_name();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key(&1));

        // every entry is still visible per device
        assert_eq!(cache.device_infos_by_device("dev").len(), 2);
    }

    #[test]
    fn snapshot_is_detached_from_cache() {
        let cache = LocalDeviceInfoCache::new([info(1, "dev", "src", "temp")]);
        let mut snapshot = cache.clone_with_source_name();
        snapshot.clear();
        cache.add(info(2, "dev", "src", "humidity"));

        assert!(snapshot.is_empty());
        assert_eq!(cache.clone_with_source_name().len(), 2);
    }

    #[test]
    fn concurrent_duplicate_adds_keep_one_entry() {
        let cache = Arc::new(LocalDeviceInfoCache::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.add(info(i, "dev", "src", "temp")))
            })
            .collect();

        let inserted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|inserted| *inserted)
            .count();

        assert_eq!(inserted, 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn seeding_loads_persisted_rows() {
        let store = MockEventStore {
            device_infos: vec![
                info(1, "dev", "src", "temp"),
                info(2, "dev", "", "legacy"),
                info(3, "dev", "src", "temp"),
            ],
            ..Default::default()
        };
        let cache = LocalDeviceInfoCache::default();

        let inserted = seed_device_info_cache(&cache, &store).await.unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(cache.get_id(&info(0, "dev", "src", "temp")), Some(1));
        assert_eq!(cache.get_id(&info(0, "dev", "", "legacy")), Some(2));
    }
}
