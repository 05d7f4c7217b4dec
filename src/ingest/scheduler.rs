// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ingest::types::TrendingSource;
use crate::store::ItemStore;

/// Fixed polling cadence.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Copy, Debug)]
pub struct IngestSchedulerCfg {
    pub interval: Duration,
}

impl Default for IngestSchedulerCfg {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
        }
    }
}

/// Running background ingest task. Dropping the handle ends the loop at its
/// next wake-up; [`IngestScheduler::stop`] also waits for it to finish.
pub struct IngestScheduler {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl IngestScheduler {
    /// Spawn the loop. The first cycle runs immediately, then once per interval.
    pub fn start(
        cfg: IngestSchedulerCfg,
        source: Arc<dyn TrendingSource>,
        store: Arc<dyn ItemStore>,
    ) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cfg.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(target: "ingest", interval_secs = cfg.interval.as_secs(), "ingest scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.changed() => break,
                }
                // an in-flight cycle is finished before the stop signal is seen
                if let Err(e) = crate::ingest::run_cycle(source.as_ref(), store.as_ref()).await {
                    tracing::debug!(target: "ingest", error = %e, "waiting for next tick");
                }
                if *stop_rx.borrow() {
                    break;
                }
            }
            tracing::info!(target: "ingest", "ingest scheduler stopped");
        });

        Self { stop_tx, join }
    }

    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    /// Signal the loop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.join.await {
            tracing::warn!(target: "ingest", error = %e, "ingest scheduler task ended abnormally");
        }
    }
}
