use std::sync::{Arc, Once};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::RetentionError;
use crate::purge::{EventPurger, PurgeCycleReport};

/// Drives purge cycles from a single background task.
///
/// The wait for the next cycle starts only once the previous cycle has
/// finished, so cycles never overlap and a slow store stretches the period
/// instead of queueing work.
pub struct PurgeScheduler {
    purger: Arc<EventPurger>,
    started: Once,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PurgeScheduler {
    pub fn new(purger: Arc<EventPurger>) -> Self {
        Self {
            purger,
            started: Once::new(),
            handle: Mutex::new(None),
        }
    }

    /// Starts the purge loop. Only the first successful call spawns it; the
    /// loop exits when `cancel` fires.
    ///
    /// A non-positive interval leaves retention disabled and still returns
    /// `Ok`. An unparseable interval is reported and nothing is started.
    pub fn start(&self, cancel: CancellationToken) -> Result<(), RetentionError> {
        let config = self.purger.config();
        let interval = config.interval().map_err(|e| {
            error!(interval = %config.interval, error = %e, "Invalid event retention interval");
            RetentionError::ConfigInvalid(e)
        })?;

        if interval.is_zero() {
            info!(interval = %config.interval, "Event retention disabled");
            return Ok(());
        }

        self.started.call_once(|| {
            info!(
                interval = ?interval,
                default_policy = %config.default_policy(),
                "Starting event retention loop"
            );
            let handle = tokio::spawn(purge_loop(self.purger.clone(), interval, cancel));
            *self.handle.lock() = Some(handle);
        });

        Ok(())
    }

    /// Runs one cycle on the caller's task, outside the loop.
    pub async fn run_once(&self) -> PurgeCycleReport {
        self.purger.purge_events().await
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Hands out the loop's task so a caller can wait for it to exit.
    pub fn take_handle(&self) -> Option<JoinHandle<()>> {
        self.handle.lock().take()
    }
}

async fn purge_loop(purger: Arc<EventPurger>, interval: Duration, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                purger.purge_events().await;
            }
        }
    }

    info!("Event retention loop stopped");
    purger.metrics().summary().log();
}
