use std::collections::HashMap;

use common::model::Device;
use parking_lot::RwLock;

/// Active devices and their auto event retention policies, kept current by
/// the device directory feed.
pub trait DeviceStore: Send + Sync {
    fn contains(&self, name: &str) -> bool;

    /// Inserts `device` unless a device with the same name exists.
    /// Returns whether it was inserted.
    fn add(&self, device: Device) -> bool;

    /// Returns whether a device was removed.
    fn remove(&self, name: &str) -> bool;

    fn remove_all(&self);

    /// Independent copy of every device.
    fn devices(&self) -> HashMap<String, Device>;
}

#[derive(Debug, Default)]
pub struct LocalDeviceStore {
    devices: RwLock<HashMap<String, Device>>,
}

impl LocalDeviceStore {
    pub fn new(devices: impl IntoIterator<Item = Device>) -> Self {
        let store = Self::default();
        for device in devices {
            store.add(device);
        }
        store
    }
}

impl DeviceStore for LocalDeviceStore {
    fn contains(&self, name: &str) -> bool {
        self.devices.read().contains_key(name)
    }

    fn add(&self, device: Device) -> bool {
        let mut devices = self.devices.write();
        if devices.contains_key(&device.name) {
            return false;
        }
        devices.insert(device.name.clone(), device);
        true
    }

    fn remove(&self, name: &str) -> bool {
        self.devices.write().remove(name).is_some()
    }

    fn remove_all(&self) {
        self.devices.write().clear();
    }

    fn devices(&self) -> HashMap<String, Device> {
        // Device owns all of its data, so clone() is a deep copy.
        self.devices.read().clone()
    }
}
