//! Sync scheduling
//!
//! A timer loop re-triggers full runs at the configured interval. The read
//! path calls [`SyncScheduler::trigger_if_stale`], which spawns a run in the
//! background and returns immediately.

use crate::services::sync_orchestrator::{SyncOrchestrator, SyncOutcome, SyncRequest};
use crate::state::CatalogState;
use chrono::{DateTime, Utc};
use listcat_common::time as catalog_time;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Delay before the first scheduled run, honoring the time since the last sync
fn initial_delay(last_sync: Option<DateTime<Utc>>, interval: Duration) -> Duration {
    match last_sync.and_then(catalog_time::age_of) {
        None => Duration::ZERO,
        Some(elapsed) if elapsed >= interval => Duration::ZERO,
        Some(elapsed) => interval - elapsed,
    }
}

#[derive(Clone)]
pub struct SyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    state: Arc<CatalogState>,
    interval: Duration,
}

impl SyncScheduler {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        state: Arc<CatalogState>,
        interval: Duration,
    ) -> Self {
        Self {
            orchestrator,
            state,
            interval,
        }
    }

    /// Timer loop; runs until `cancel` fires
    ///
    /// A stale or never-synced cache gets its first run immediately.
    pub async fn run(&self, cancel: CancellationToken) {
        let last_sync = *self.state.last_sync.read().await;
        let delay = initial_delay(last_sync, self.interval);
        info!(
            interval_secs = self.interval.as_secs(),
            first_run_in_secs = delay.as_secs(),
            "Sync scheduler started"
        );

        let mut ticker = time::interval_at(Instant::now() + delay, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Sync scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let outcome = self.orchestrator.run(SyncRequest::full()).await;
                    debug!(?outcome, "Scheduled sync finished");
                }
            }
        }
    }

    /// Spawn a run without waiting for it
    pub fn trigger(&self, request: SyncRequest) -> JoinHandle<SyncOutcome> {
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move { orchestrator.run(request).await })
    }

    /// Spawn a full run if the cache is older than the interval
    ///
    /// Returns true when a run was spawned. Never waits on the run itself.
    pub async fn trigger_if_stale(&self) -> bool {
        if self.state.gate.is_active() {
            return false;
        }
        let last_sync = *self.state.last_sync.read().await;
        if !catalog_time::is_stale(last_sync, self.interval) {
            return false;
        }
        debug!("Catalog stale, triggering background sync");
        drop(self.trigger(SyncRequest::full()));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_delay() {
        let interval = Duration::from_secs(3600);
        assert_eq!(initial_delay(None, interval), Duration::ZERO);

        let long_ago = Utc::now() - chrono::Duration::hours(2);
        assert_eq!(initial_delay(Some(long_ago), interval), Duration::ZERO);

        let recent = Utc::now() - chrono::Duration::minutes(10);
        let delay = initial_delay(Some(recent), interval);
        assert!(delay > Duration::from_secs(49 * 60));
        assert!(delay <= Duration::from_secs(50 * 60));
    }
}
