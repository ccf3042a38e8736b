//! Background sync service
//!
//! Runs the pipeline on a fixed interval as one long-lived cooperative
//! task. An unhandled sync error is logged and retried after a backoff;
//! the loop never terminates on error, only on the stop signal.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};

use crate::pipeline::{Cancelled, SyncPipeline};

/// Wait after a failed sync before trying again.
const ERROR_BACKOFF: Duration = Duration::from_secs(60);

pub struct SyncService {
    pipeline: SyncPipeline,
    interval: Duration,
    stop: watch::Sender<bool>,
}

impl SyncService {
    pub fn new(pipeline: SyncPipeline, interval: Duration) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            pipeline,
            interval,
            stop,
        }
    }

    pub fn pipeline(&self) -> &SyncPipeline {
        &self.pipeline
    }

    /// Signal the loop to stop. The in-flight phase finishes its current
    /// unit of work before the signal is observed.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Run until stopped. Syncs immediately, then on every interval tick.
    pub async fn run(&self) -> Result<()> {
        let mut cancel = self.stop.subscribe();
        info!(
            "background sync service started (interval {}s)",
            self.interval.as_secs()
        );

        loop {
            if *cancel.borrow() {
                break;
            }
            let wait = match self.pipeline.run(&cancel).await {
                Ok(report) => {
                    info!(
                        "background sync done: {} games, wrote={}",
                        report.total_games, report.merge.wrote
                    );
                    self.interval
                }
                Err(e) if e.is::<Cancelled>() => {
                    info!("background sync cancelled");
                    break;
                }
                Err(e) => {
                    error!("background sync failed: {e:#}, retrying in {ERROR_BACKOFF:?}");
                    ERROR_BACKOFF
                }
            };
            if wait_or_stop(&mut cancel, wait).await {
                break;
            }
        }

        info!("background sync service stopped");
        Ok(())
    }
}

/// Sleep for `duration`, returning early with `true` if stop is signalled
/// (or the service handle is gone).
async fn wait_or_stop(cancel: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        changed = cancel.changed() => changed.is_err() || *cancel.borrow(),
    }
}
