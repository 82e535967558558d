//! Device directory feed.
//!
//! Keeps the Active-Device Store in step with add, update and delete
//! notifications from the metadata directory, and optionally drops a deleted
//! device's events.

use std::sync::Arc;

use common::model::Device;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{DeviceInfoCache, DeviceStore};
use crate::storage::EventStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceAction {
    Add,
    Update,
    Delete,
}

/// One notification from the device directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceChange {
    pub action: DeviceAction,
    pub device: Device,
}

impl DeviceChange {
    pub fn add(device: Device) -> Self {
        Self {
            action: DeviceAction::Add,
            device,
        }
    }

    pub fn update(device: Device) -> Self {
        Self {
            action: DeviceAction::Update,
            device,
        }
    }

    pub fn delete(device: Device) -> Self {
        Self {
            action: DeviceAction::Delete,
            device,
        }
    }
}

pub struct DirectoryHandler {
    devices: Arc<dyn DeviceStore>,
    device_infos: Arc<dyn DeviceInfoCache>,
    store: Arc<dyn EventStore>,
    purge_on_delete: bool,
}

impl DirectoryHandler {
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        device_infos: Arc<dyn DeviceInfoCache>,
        store: Arc<dyn EventStore>,
        purge_on_delete: bool,
    ) -> Self {
        Self {
            devices,
            device_infos,
            store,
            purge_on_delete,
        }
    }

    pub async fn apply(&self, change: DeviceChange) {
        let device = change.device;
        match change.action {
            DeviceAction::Add => {
                if !self.devices.add(device.clone()) {
                    debug!(device_name = %device.name, "Device already active, add ignored");
                    return;
                }
                info!(
                    device_name = %device.name,
                    auto_events = device.auto_events.len(),
                    "Device added"
                );
            }
            DeviceAction::Update => {
                self.devices.remove(&device.name);
                let name = device.name.clone();
                let auto_events = device.auto_events.len();
                self.devices.add(device);
                info!(device_name = %name, auto_events, "Device updated");
            }
            DeviceAction::Delete => {
                if self.purge_on_delete {
                    self.purge_device(&device.name).await;
                }
                self.devices.remove(&device.name);
                info!(device_name = %device.name, "Device removed");
            }
        }
    }

    /// Drops every event of the device and forgets its channels. A failing
    /// delete leaves the channels cached so the next cycle still sees them.
    async fn purge_device(&self, device_name: &str) {
        if let Err(e) = self.store.delete_by_device_name(device_name).await {
            warn!(
                device_name = %device_name,
                error = %e,
                "Failed to delete events of removed device"
            );
            return;
        }

        let infos = self.device_infos.device_infos_by_device(device_name);
        for info in &infos {
            self.device_infos.remove(info);
        }
        debug!(
            device_name = %device_name,
            device_infos = infos.len(),
            "Deleted events of removed device"
        );
    }

    /// Applies changes until `changes` ends or `cancel` fires.
    pub async fn run<S>(&self, changes: S, cancel: CancellationToken)
    where
        S: Stream<Item = DeviceChange>,
    {
        tokio::pin!(changes);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                change = changes.next() => match change {
                    Some(change) => self.apply(change).await,
                    None => break,
                },
            }
        }
        debug!("Device directory feed stopped");
    }
}
