//! Public API types for the in-process metrics collection engine.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::transport::Transport;

/// Configuration for the in-process collection pipeline.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Server base URL (e.g. `http://localhost:8080`).
    pub server_url: Url,

    /// How often the pollers sample metrics.
    pub poll_interval: Duration,

    /// How often accumulated samples are detached into a batch and handed to
    /// the sender pool.
    pub report_interval: Duration,

    /// Number of sender workers shipping batches concurrently. Must be at
    /// least 1.
    pub workers: usize,

    /// Integrity key for the `HashSHA256` request header. `None` disables
    /// signing.
    pub key: Option<String>,

    /// Local address advertised in `X-Real-IP`. `None` omits the header.
    pub client_ip: Option<IpAddr>,
}

/// Handle to a running collection pipeline.
pub struct AgentHandle {
    pub(crate) cancel: CancellationToken,
    pub(crate) join: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl AgentHandle {
    /// Request a graceful shutdown: tickers stop, the current buffer is
    /// flushed as a final batch, and sender workers drain in-flight jobs.
    pub fn request_stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the pipeline to drain, returning the captured delivery error
    /// if any batch failed.
    pub async fn wait(self) -> anyhow::Result<()> {
        match self.join.await {
            Ok(res) => res,
            Err(err) => Err(anyhow::anyhow!("agent task join error: {err}")),
        }
    }
}

/// Start the collection pipeline, delivering batches through `transport`.
///
/// Fails up front on a non-positive interval or an empty sender pool.
pub fn start_agent(
    config: AgentConfig,
    transport: Arc<dyn Transport>,
) -> anyhow::Result<AgentHandle> {
    crate::engine::start_agent(config, transport)
}
