use common::DurationParseError;
use thiserror::Error;

use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum RetentionError {
    /// The retention interval could not be parsed. Affects the whole engine.
    #[error("retention interval parse failed: {0}")]
    ConfigInvalid(#[source] DurationParseError),

    /// A stream's retention duration could not be parsed. Affects that
    /// stream only.
    #[error(
        "retention duration '{duration}' parse failed for device '{device_name}', source '{source_name}'"
    )]
    InvalidDuration {
        device_name: String,
        source_name: String,
        duration: String,
        #[source]
        source: DurationParseError,
    },

    #[error("failed to {operation} for device '{device_name}', source '{source_name}'")]
    Storage {
        device_name: String,
        source_name: String,
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl RetentionError {
    pub(crate) fn storage(
        device_name: &str,
        source_name: &str,
        operation: &'static str,
    ) -> impl FnOnce(StoreError) -> RetentionError {
        let device_name = device_name.to_string();
        let source_name = source_name.to_string();
        move |source| RetentionError::Storage {
            device_name,
            source_name,
            operation,
            source,
        }
    }
}
