//! Event purging: the per-stream retention decision and the cycle that
//! applies it to every stream.

pub mod executor;
pub mod strategy;

pub use executor::{EventPurgeExecutor, EventPurger, PassReport, PurgeCycleReport};
pub use strategy::{PurgeAction, PurgeOutcome, SkipReason, handle_event_retention};
