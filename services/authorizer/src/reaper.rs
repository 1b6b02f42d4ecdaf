//! Expiry reaper: deletes policies whose end time has passed.
//!
//! Expired policies are already ignored by decisions; the sweep only keeps
//! the tables from growing. One sweep runs at startup, then one per interval.
use crate::clock::Clock;
use crate::store::{AuthorizationStore, StoreResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct ExpiryReaper {
    store: Arc<dyn AuthorizationStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl ExpiryReaper {
    pub fn new(
        store: Arc<dyn AuthorizationStore>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            interval,
        }
    }

    /// Delete every policy expired as of now.
    pub async fn sweep(&self) -> StoreResult<u64> {
        let now = self.clock.now_micros();
        let deleted = self.store.delete_expired_policies(now).await?;
        metrics::counter!("warden_policies_expired_total").increment(deleted);
        if deleted > 0 {
            tracing::info!(deleted, "expired policies removed");
        } else {
            tracing::debug!("no expired policies");
        }
        Ok(deleted)
    }

    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    // The first tick completes immediately.
                    _ = ticker.tick() => {
                        if let Err(err) = self.sweep().await {
                            tracing::warn!(error = %err, "expiry sweep failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("expiry reaper stopped");
        })
    }
}
