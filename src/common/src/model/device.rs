use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Administrative state of a device as reported by the metadata directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdminState {
    Locked,
    #[default]
    Unlocked,
}

/// Retention bounds for the events of one auto event source.
///
/// A zero `max_cap`/`min_cap` or an empty `duration` means "not set" and is
/// replaced by the configured default before evaluation, see
/// [`RetentionPolicy::with_defaults`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    /// High watermark. Non-positive disables the count gate.
    #[serde(default)]
    pub max_cap: i64,
    /// Number of most recent events that always survive a purge.
    /// Non-positive disables the floor.
    #[serde(default)]
    pub min_cap: i64,
    /// Age cutoff such as `"72h"` or `"3d"`. Empty or zero selects
    /// count-based retention.
    #[serde(default)]
    pub duration: String,
}

impl RetentionPolicy {
    pub fn new(max_cap: i64, min_cap: i64, duration: impl Into<String>) -> Self {
        Self {
            max_cap,
            min_cap,
            duration: duration.into(),
        }
    }

    /// Returns a copy with every unset field taken from `defaults`.
    pub fn with_defaults(&self, defaults: &RetentionPolicy) -> RetentionPolicy {
        RetentionPolicy {
            max_cap: if self.max_cap == 0 {
                defaults.max_cap
            } else {
                self.max_cap
            },
            min_cap: if self.min_cap == 0 {
                defaults.min_cap
            } else {
                self.min_cap
            },
            duration: if self.duration.is_empty() {
                defaults.duration.clone()
            } else {
                self.duration.clone()
            },
        }
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "maxCap={}, minCap={}, duration='{}'",
            self.max_cap, self.min_cap, self.duration
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoEvent {
    pub source_name: String,
    #[serde(default)]
    pub interval: String,
    #[serde(default)]
    pub on_change: bool,
    #[serde(default)]
    pub on_change_threshold: f64,
    #[serde(default)]
    pub retention: RetentionPolicy,
}

impl AutoEvent {
    pub fn new(source_name: impl Into<String>, retention: RetentionPolicy) -> Self {
        Self {
            source_name: source_name.into(),
            retention,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub name: String,
    #[serde(default)]
    pub admin_state: AdminState,
    #[serde(default)]
    pub profile_name: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub auto_events: Vec<AutoEvent>,
}

impl Device {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_auto_event(mut self, auto_event: AutoEvent) -> Self {
        self.auto_events.push(auto_event);
        self
    }
}
