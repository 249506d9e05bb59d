//! Bounded sender pool pulling batch jobs from a shared channel.

use std::sync::Arc;

use metrod_core::MetricSample;
use tokio::sync::{Mutex, mpsc};

use crate::transport::{Transport, TransportError};

pub(crate) type SharedJobs = Arc<Mutex<mpsc::Receiver<Vec<MetricSample>>>>;
pub(crate) type LastError = Arc<Mutex<Option<TransportError>>>;

/// One sender worker: pull a job, ship it, record failures. Workers drain
/// the channel until it closes, finishing whatever batch is in flight, so a
/// final flush on shutdown is always delivered (or its error captured).
pub(crate) async fn run_sender(
    worker_idx: usize,
    jobs: SharedJobs,
    transport: Arc<dyn Transport>,
    last_error: LastError,
) {
    loop {
        let job = {
            let mut jobs = jobs.lock().await;
            jobs.recv().await
        };
        let Some(batch) = job else {
            return;
        };

        match transport.update(&batch).await {
            Ok(()) => {
                tracing::debug!(worker = worker_idx, samples = batch.len(), "batch delivered");
            }
            Err(err) => {
                tracing::warn!(worker = worker_idx, error = %err, "batch delivery failed");
                // Last error wins; the agent reports it at shutdown.
                *last_error.lock().await = Some(err);
            }
        }
    }
}
