//! Tick-driven sample producers.
//!
//! Each poller owns its interval and emits into a dedicated channel; every
//! send races the cancellation token so shutdown never leaves a producer
//! blocked on a full pipe.

use std::time::Duration;

use metrod_core::MetricSample;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::stats::{RuntimeSampler, SystemSampler};

pub(crate) const POLL_COUNT: &str = "PollCount";

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut tick = interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tick
}

/// Send one sample, abandoning it if cancellation fires first. Returns false
/// when the poller should stop (cancelled or pipeline gone).
async fn send_or_cancelled(
    tx: &mpsc::Sender<MetricSample>,
    cancel: &CancellationToken,
    sample: MetricSample,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        res = tx.send(sample) => res.is_ok(),
    }
}

/// Emits one `PollCount` counter increment per poll tick. Accumulation is
/// entirely the server's job.
pub(crate) async fn run_counter_poller(
    period: Duration,
    tx: mpsc::Sender<MetricSample>,
    cancel: CancellationToken,
) {
    let mut tick = ticker(period);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tick.tick() => {}
        }
        if !send_or_cancelled(&tx, &cancel, MetricSample::counter(POLL_COUNT, 1)).await {
            return;
        }
    }
}

/// Emits the fixed allocator-statistics gauge set plus `RandomValue` on
/// every poll tick.
pub(crate) async fn run_runtime_poller(
    period: Duration,
    tx: mpsc::Sender<MetricSample>,
    cancel: CancellationToken,
) {
    let mut sampler = RuntimeSampler::new();
    let mut tick = ticker(period);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tick.tick() => {}
        }
        for sample in sampler.sample() {
            if !send_or_cancelled(&tx, &cancel, sample).await {
                return;
            }
        }
    }
}

/// Emits `TotalMemory`, `FreeMemory` and per-CPU utilization gauges on every
/// poll tick. Samples are best-effort; a tick that yields nothing is skipped
/// silently.
pub(crate) async fn run_system_poller(
    period: Duration,
    tx: mpsc::Sender<MetricSample>,
    cancel: CancellationToken,
) {
    let mut sampler = SystemSampler::new();
    let mut tick = ticker(period);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tick.tick() => {}
        }
        for sample in sampler.sample() {
            if !send_or_cancelled(&tx, &cancel, sample).await {
                return;
            }
        }
    }
}
