use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::duration::{DurationParseError, parse_duration_with_day};
use crate::model::RetentionPolicy;

pub const CONFIG_FILE: &str = "eventkeeper.toml";
pub const ENV_PREFIX: &str = "EVENTKEEPER__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid duration for '{field}': {source}")]
    InvalidDuration {
        field: &'static str,
        #[source]
        source: DurationParseError,
    },
}

/// Event retention settings.
///
/// Durations stay strings here: they may carry a day unit and a
/// non-positive `interval` is a legal way of switching retention off.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Time between purge cycles. Zero or negative disables retention.
    ///
    /// Env: EVENTKEEPER__RETENTION__INTERVAL
    pub interval: String,
    /// High watermark applied when an auto event leaves `maxCap` unset.
    ///
    /// Env: EVENTKEEPER__RETENTION__DEFAULT_MAX_CAP
    pub default_max_cap: i64,
    /// Floor applied when an auto event leaves `minCap` unset.
    ///
    /// Env: EVENTKEEPER__RETENTION__DEFAULT_MIN_CAP
    pub default_min_cap: i64,
    /// Age cutoff applied when an auto event leaves `duration` unset.
    ///
    /// Env: EVENTKEEPER__RETENTION__DEFAULT_DURATION
    pub default_duration: String,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            interval: "30s".to_string(),
            default_max_cap: -1,
            default_min_cap: 1,
            default_duration: "168h".to_string(),
        }
    }
}

impl RetentionConfig {
    /// The policy used for every stream not claimed by an auto event, and
    /// to fill unset auto event fields.
    pub fn default_policy(&self) -> RetentionPolicy {
        RetentionPolicy::new(
            self.default_max_cap,
            self.default_min_cap,
            self.default_duration.clone(),
        )
    }

    pub fn interval(&self) -> Result<Duration, DurationParseError> {
        parse_duration_with_day(&self.interval)
    }

    pub fn default_duration(&self) -> Result<Duration, DurationParseError> {
        parse_duration_with_day(&self.default_duration)
    }
}

/// Reaction to changes announced by the device directory.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Delete all events of a device when the directory removes it.
    ///
    /// Env: EVENTKEEPER__DIRECTORY__PURGE_ON_DELETE
    #[serde(default)]
    pub purge_on_delete: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    pub retention: RetentionConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
}

impl Configuration {
    /// Defaults, overlaid by `eventkeeper.toml` and `EVENTKEEPER__*` variables.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(CONFIG_FILE))
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(path))
    }

    fn figment(file: figment::providers::Data<Toml>) -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    /// Checks that every duration string parses.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retention
            .interval()
            .map_err(|source| ConfigError::InvalidDuration {
                field: "retention.interval",
                source,
            })?;
        self.retention
            .default_duration()
            .map_err(|source| ConfigError::InvalidDuration {
                field: "retention.default_duration",
                source,
            })?;
        Ok(())
    }
}
