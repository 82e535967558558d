pub mod cli;
pub mod config;
pub mod duration;
pub mod model;

pub use config::{Configuration, DirectoryConfig, RetentionConfig};
pub use duration::{DurationParseError, parse_duration_with_day};
