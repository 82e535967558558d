use serde::{Deserialize, Serialize};

use super::{DeviceInfo, Tags};

/// Payload of a single reading. Decoding the value is left to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum ReadingValue {
    Simple(String),
    Binary(Vec<u8>),
    Object(serde_json::Value),
}

impl Default for ReadingValue {
    fn default() -> Self {
        ReadingValue::Simple(String::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    #[serde(default)]
    pub id: String,
    /// Nanoseconds since the Unix epoch.
    pub origin: i64,
    pub device_name: String,
    pub resource_name: String,
    #[serde(default)]
    pub profile_name: String,
    #[serde(default)]
    pub value_type: String,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub value: ReadingValue,
    #[serde(default)]
    pub tags: Tags,
}

impl Reading {
    /// The channel descriptor this reading belongs to. The id is left at zero
    /// for the storage layer to assign.
    pub fn device_info(&self, source_name: &str) -> DeviceInfo {
        DeviceInfo {
            id: 0,
            device_name: self.device_name.clone(),
            profile_name: self.profile_name.clone(),
            source_name: source_name.to_string(),
            resource_name: self.resource_name.clone(),
            value_type: self.value_type.clone(),
            units: self.units.clone(),
            media_type: self.media_type.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// A time-stamped group of readings produced by one source of one device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: String,
    pub device_name: String,
    #[serde(default)]
    pub profile_name: String,
    #[serde(default)]
    pub source_name: String,
    /// Nanoseconds since the Unix epoch.
    pub origin: i64,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub readings: Vec<Reading>,
}

impl Event {
    pub fn new(
        device_name: impl Into<String>,
        source_name: impl Into<String>,
        origin: i64,
    ) -> Self {
        Self {
            device_name: device_name.into(),
            source_name: source_name.into(),
            origin,
            ..Default::default()
        }
    }

    /// Adds a simple reading for `resource_name`, inheriting device, profile
    /// and origin from the event.
    pub fn with_simple_reading(
        mut self,
        resource_name: impl Into<String>,
        value_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.readings.push(Reading {
            origin: self.origin,
            device_name: self.device_name.clone(),
            profile_name: self.profile_name.clone(),
            resource_name: resource_name.into(),
            value_type: value_type.into(),
            value: ReadingValue::Simple(value.into()),
            ..Default::default()
        });
        self
    }
}
