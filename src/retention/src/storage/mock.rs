use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use common::model::{DeviceInfo, Event};
use tokio::sync::Mutex;

use super::{EventStore, StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Count {
        device_name: String,
        source_name: String,
        limit: u64,
    },
    DeleteByAge {
        age_nanos: i64,
        device_name: String,
        source_name: String,
    },
    DeleteStream {
        device_name: String,
        source_name: String,
    },
    LatestWithAge {
        device_name: String,
        source_name: String,
        age_nanos: i64,
        offset: u64,
    },
    Latest {
        device_name: String,
        source_name: String,
        offset: u64,
    },
    DeleteDevice {
        device_name: String,
    },
}

impl StoreCall {
    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            StoreCall::DeleteByAge { .. }
                | StoreCall::DeleteStream { .. }
                | StoreCall::DeleteDevice { .. }
        )
    }

    pub fn stream(&self) -> Option<(&str, &str)> {
        match self {
            StoreCall::Count {
                device_name,
                source_name,
                ..
            }
            | StoreCall::DeleteByAge {
                device_name,
                source_name,
                ..
            }
            | StoreCall::DeleteStream {
                device_name,
                source_name,
            }
            | StoreCall::LatestWithAge {
                device_name,
                source_name,
                ..
            }
            | StoreCall::Latest {
                device_name,
                source_name,
                ..
            } => Some((device_name, source_name)),
            StoreCall::DeleteDevice { .. } => None,
        }
    }
}

/// Runs before a call is recorded, with the number of calls seen so far.
pub type CallHook = Arc<dyn Fn(usize) + Send + Sync>;

/// Recording gateway double. Every stream reports `count` events and
/// offset lookups return an event with `latest_origin`, or `NotFound` when
/// unset. Calls for a device in `failing_devices` fail with a backend error.
#[derive(Clone, Default)]
pub struct MockEventStore {
    pub calls: Arc<Mutex<Vec<StoreCall>>>,
    pub count: u64,
    pub latest_origin: Option<i64>,
    pub failing_devices: HashSet<String>,
    pub device_infos: Vec<DeviceInfo>,
    pub on_call: Option<CallHook>,
}

impl MockEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    pub fn with_latest_origin(mut self, origin: i64) -> Self {
        self.latest_origin = Some(origin);
        self
    }

    pub fn on_call(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_call = Some(Arc::new(hook));
        self
    }

    pub fn failing_for(mut self, device_name: &str) -> Self {
        self.failing_devices.insert(device_name.to_string());
        self
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().await.clone()
    }

    pub async fn delete_calls(&self) -> Vec<StoreCall> {
        self.calls()
            .await
            .into_iter()
            .filter(StoreCall::is_delete)
            .collect()
    }

    async fn record(&self, device_name: &str, call: StoreCall) -> StoreResult<()> {
        let mut calls = self.calls.lock().await;
        if let Some(hook) = &self.on_call {
            hook(calls.len());
        }
        calls.push(call);
        drop(calls);
        if self.failing_devices.contains(device_name) {
            return Err(StoreError::Backend(format!("{device_name} unavailable")));
        }
        Ok(())
    }

    fn latest(&self, device_name: &str, source_name: &str) -> StoreResult<Event> {
        match self.latest_origin {
            Some(origin) => Ok(Event::new(device_name, source_name, origin)),
            None => Err(StoreError::NotFound {
                device_name: device_name.to_string(),
                source_name: source_name.to_string(),
            }),
        }
    }
}

#[async_trait]
impl EventStore for MockEventStore {
    async fn count_by_device_and_source_limited(
        &self,
        device_name: &str,
        source_name: &str,
        limit: u64,
    ) -> StoreResult<u64> {
        self.record(
            device_name,
            StoreCall::Count {
                device_name: device_name.to_string(),
                source_name: source_name.to_string(),
                limit,
            },
        )
        .await?;
        Ok(self.count.min(limit))
    }

    async fn delete_by_age_and_device_and_source(
        &self,
        age_nanos: i64,
        device_name: &str,
        source_name: &str,
    ) -> StoreResult<()> {
        self.record(
            device_name,
            StoreCall::DeleteByAge {
                age_nanos,
                device_name: device_name.to_string(),
                source_name: source_name.to_string(),
            },
        )
        .await
    }

    async fn delete_by_device_and_source(
        &self,
        device_name: &str,
        source_name: &str,
    ) -> StoreResult<()> {
        self.record(
            device_name,
            StoreCall::DeleteStream {
                device_name: device_name.to_string(),
                source_name: source_name.to_string(),
            },
        )
        .await
    }

    async fn latest_by_device_and_source_with_age_and_offset(
        &self,
        device_name: &str,
        source_name: &str,
        age_nanos: i64,
        offset: u64,
    ) -> StoreResult<Event> {
        self.record(
            device_name,
            StoreCall::LatestWithAge {
                device_name: device_name.to_string(),
                source_name: source_name.to_string(),
                age_nanos,
                offset,
            },
        )
        .await?;
        self.latest(device_name, source_name)
    }

    async fn latest_by_device_and_source_with_offset(
        &self,
        device_name: &str,
        source_name: &str,
        offset: u64,
    ) -> StoreResult<Event> {
        self.record(
            device_name,
            StoreCall::Latest {
                device_name: device_name.to_string(),
                source_name: source_name.to_string(),
                offset,
            },
        )
        .await?;
        self.latest(device_name, source_name)
    }

    async fn delete_by_device_name(&self, device_name: &str) -> StoreResult<()> {
        self.record(
            device_name,
            StoreCall::DeleteDevice {
                device_name: device_name.to_string(),
            },
        )
        .await
    }

    async fn device_infos(&self) -> StoreResult<Vec<DeviceInfo>> {
        Ok(self.device_infos.clone())
    }
}
