//! Fan-in and batching between the pollers and the sender pool.

use std::time::Duration;

use metrod_core::MetricSample;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

/// Forward one poller stream into the shared sample channel. Arrival order
/// is preserved per input; the forwarder exits when its input closes, when
/// the batcher goes away, or on cancellation.
pub(crate) async fn forward(
    mut rx: mpsc::Receiver<MetricSample>,
    tx: mpsc::Sender<MetricSample>,
    cancel: CancellationToken,
) {
    while let Some(sample) = rx.recv().await {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            res = tx.send(sample) => {
                if res.is_err() {
                    return;
                }
            }
        }
    }
}

/// Accumulate samples between report ticks. On each tick the buffer is
/// detached by copy and handed to the sender pool as one job; on shutdown
/// (cancellation or upstream closure) the remainder is flushed one last time
/// and the job channel closes behind us.
pub(crate) async fn run_batcher(
    mut rx: mpsc::Receiver<MetricSample>,
    job_tx: mpsc::Sender<Vec<MetricSample>>,
    report_interval: Duration,
    cancel: CancellationToken,
) {
    let mut buffer: Vec<MetricSample> = Vec::new();
    let mut tick = interval_at(Instant::now() + report_interval, report_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            maybe = rx.recv() => match maybe {
                Some(sample) => buffer.push(sample),
                None => break,
            },
            _ = tick.tick() => flush(&mut buffer, &job_tx).await,
        }
    }

    // Final flush: the workers are still draining the job channel, so this
    // handoff completes even under cancellation.
    flush(&mut buffer, &job_tx).await;
}

async fn flush(buffer: &mut Vec<MetricSample>, job_tx: &mpsc::Sender<Vec<MetricSample>>) {
    if buffer.is_empty() {
        return;
    }
    let batch = buffer.clone();
    buffer.clear();
    if job_tx.send(batch).await.is_err() {
        tracing::warn!("sender pool gone, dropping batch");
    }
}
