//! Background persistence: restore the primary store from the snapshot file
//! on startup, then keep the snapshot current: periodically on a ticker, or
//! only at shutdown when the service snapshots synchronously on every write.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::storage::{FileStorage, Storage};

pub struct PersistenceWorker {
    primary: Arc<dyn Storage>,
    snapshot: Arc<FileStorage>,
    /// `None` means synchronous mode: no ticker, one final snapshot on
    /// shutdown.
    interval: Option<Duration>,
}

impl PersistenceWorker {
    pub fn new(
        primary: Arc<dyn Storage>,
        snapshot: Arc<FileStorage>,
        interval: Option<Duration>,
    ) -> Self {
        Self {
            primary,
            snapshot,
            interval,
        }
    }

    /// Load every snapshotted sample into the primary store. Any failure
    /// aborts startup.
    pub async fn restore(&self) -> anyhow::Result<()> {
        let samples = self.snapshot.list().await?;
        let count = samples.len();
        for sample in samples {
            self.primary.save(&sample).await?;
        }
        tracing::info!(count, "restored metrics from snapshot");
        Ok(())
    }

    /// Run until cancellation. A snapshot failure terminates the worker with
    /// that error; the final snapshot always runs before returning.
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        if let Some(period) = self.interval {
            let mut tick = interval_at(Instant::now() + period, period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => self.snapshot_all().await?,
                }
            }
        } else {
            cancel.cancelled().await;
        }

        self.snapshot_all().await?;
        tracing::info!("final snapshot written");
        Ok(())
    }

    pub(crate) async fn snapshot_all(&self) -> anyhow::Result<()> {
        let samples = self.primary.list().await?;
        for sample in &samples {
            self.snapshot.save(sample).await?;
        }
        Ok(())
    }
}
