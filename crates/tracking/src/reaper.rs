use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::engine::TrackingEngine;
use crate::provider::{Directory, TrackStore};

/// Controls the background stale session sweep.
pub struct ReaperHandle {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Signal the sweep loop to stop and wait for it to finish.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(err) = self.task.await {
            warn!(error = %err, "session reaper task ended abnormally");
        }
    }
}

/// Spawn the periodic sweep that ends sessions gone silent for longer than
/// the configured timeout. Runs until the handle is shut down; a failing
/// sweep is logged and retried on the next tick.
pub fn spawn<D: Directory, S: TrackStore>(engine: TrackingEngine<D, S>) -> ReaperHandle {
    let shutdown = Arc::new(Notify::new());
    let interval = engine.config().reaper_interval;

    info!(
        interval_secs = interval.as_secs(),
        timeout_secs = engine.config().session_timeout.num_seconds(),
        "session reaper started"
    );

    let task = tokio::spawn({
        let shutdown = Arc::clone(&shutdown);
        async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // skip the immediate first tick
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;

                    () = shutdown.notified() => {
                        info!("session reaper shutting down");
                        break;
                    }

                    _ = ticker.tick() => {
                        let reaped = engine.reap_stale(Utc::now()).await;
                        if !reaped.is_empty() {
                            info!(count = reaped.len(), "stale session sweep ended sessions");
                        }
                    }
                }
            }
        }
    });

    ReaperHandle { shutdown, task }
}
