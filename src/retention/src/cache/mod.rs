//! In-process caches shared between ingestion, the device directory feed
//! and the purge loop. Each cache guards its state with its own lock and no
//! operation holds more than one of them.

pub mod device_info;
pub mod device_store;

pub use device_info::{DeviceInfoCache, LocalDeviceInfoCache, seed_device_info_cache};
pub use device_store::{DeviceStore, LocalDeviceStore};
