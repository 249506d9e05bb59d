//! Pipeline wiring: pollers → fan-in → batcher → sender pool.

use std::sync::Arc;

use metrod_core::MetricSample;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::api::{AgentConfig, AgentHandle};
use crate::transport::Transport;
use crate::{dispatch, pipeline, poller};

const SAMPLE_CHANNEL_CAPACITY: usize = 256;
const POLLER_CHANNEL_CAPACITY: usize = 64;

pub(crate) fn start_agent(
    config: AgentConfig,
    transport: Arc<dyn Transport>,
) -> anyhow::Result<AgentHandle> {
    if config.workers == 0 {
        anyhow::bail!("sender pool size must be at least 1");
    }
    if config.poll_interval.is_zero() {
        anyhow::bail!("poll interval must be positive");
    }
    if config.report_interval.is_zero() {
        anyhow::bail!("report interval must be positive");
    }

    let cancel = CancellationToken::new();
    let join = tokio::spawn(run_pipeline(config, transport, cancel.clone()));
    Ok(AgentHandle { cancel, join })
}

async fn run_pipeline(
    config: AgentConfig,
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let (sample_tx, sample_rx) = mpsc::channel::<MetricSample>(SAMPLE_CHANNEL_CAPACITY);

    let mut pollers = JoinSet::new();
    let mut forwarders = JoinSet::new();

    {
        let (tx, rx) = mpsc::channel(POLLER_CHANNEL_CAPACITY);
        pollers.spawn(poller::run_counter_poller(
            config.poll_interval,
            tx,
            cancel.clone(),
        ));
        forwarders.spawn(pipeline::forward(rx, sample_tx.clone(), cancel.clone()));
    }
    {
        let (tx, rx) = mpsc::channel(POLLER_CHANNEL_CAPACITY);
        pollers.spawn(poller::run_runtime_poller(
            config.poll_interval,
            tx,
            cancel.clone(),
        ));
        forwarders.spawn(pipeline::forward(rx, sample_tx.clone(), cancel.clone()));
    }
    {
        let (tx, rx) = mpsc::channel(POLLER_CHANNEL_CAPACITY);
        pollers.spawn(poller::run_system_poller(
            config.poll_interval,
            tx,
            cancel.clone(),
        ));
        forwarders.spawn(pipeline::forward(rx, sample_tx.clone(), cancel.clone()));
    }
    // The batcher's input closes once every forwarder is done.
    drop(sample_tx);

    let (job_tx, job_rx) = mpsc::channel::<Vec<MetricSample>>(config.workers);
    let batcher = tokio::spawn(pipeline::run_batcher(
        sample_rx,
        job_tx,
        config.report_interval,
        cancel.clone(),
    ));

    let job_rx: dispatch::SharedJobs = Arc::new(Mutex::new(job_rx));
    let last_error: dispatch::LastError = Arc::new(Mutex::new(None));
    let mut workers = JoinSet::new();
    for worker_idx in 0..config.workers {
        workers.spawn(dispatch::run_sender(
            worker_idx,
            job_rx.clone(),
            transport.clone(),
            last_error.clone(),
        ));
    }

    tracing::info!(workers = config.workers, "collection pipeline started");

    while pollers.join_next().await.is_some() {}
    while forwarders.join_next().await.is_some() {}
    if batcher.await.is_err() {
        // Ignore: the job channel is closed either way.
    }
    while workers.join_next().await.is_some() {}

    tracing::info!("collection pipeline drained");

    let mut last_error = last_error.lock().await;
    match last_error.take() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}
