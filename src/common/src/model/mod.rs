//! Data model shared by the ingestion side and the retention engine.

pub mod device;
pub mod device_info;
pub mod event;

pub use device::{AdminState, AutoEvent, Device, RetentionPolicy};
pub use device_info::DeviceInfo;
pub use event::{Event, Reading, ReadingValue};

/// Free-form tags attached to events, readings and channel descriptors.
///
/// A `BTreeMap` keeps the serialized form canonical, which the channel
/// digest relies on.
pub type Tags = std::collections::BTreeMap<String, serde_json::Value>;
