//! Background snapshot refresh for cached mode.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::collector::SharedCollector;

/// Periodically republishes the collector snapshot.
///
/// The first refresh runs immediately. A failed refresh leaves the previous
/// snapshot in place until the next period.
pub struct SnapshotRefresher {
    collector: SharedCollector,
    period: Duration,
}

impl SnapshotRefresher {
    /// Create a refresher with the given period.
    pub fn new(collector: SharedCollector, period: Duration) -> Self {
        Self { collector, period }
    }

    /// Run until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period_secs = self.period.as_secs(), "Snapshot refresher started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.collector.refresh().await {
                        Ok(observations) => {
                            debug!(observations, "Snapshot refreshed");
                        }
                        // The collector has already logged the fetch error.
                        Err(_) => {
                            debug!("Keeping previous snapshot");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Snapshot refresher stopped");
    }
}
