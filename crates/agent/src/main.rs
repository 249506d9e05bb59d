mod cli;
mod shutdown;

use std::sync::Arc;

use metrod_agent_engine::{HttpSender, start_agent};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = cli::load()?;
    tracing::info!(
        server = %config.server_url,
        poll_s = config.poll_interval.as_secs(),
        report_s = config.report_interval.as_secs(),
        workers = config.workers,
        signed = config.key.is_some(),
        "starting agent"
    );

    let transport = Arc::new(HttpSender::new(&config)?);
    let agent = start_agent(config, transport)?;

    let mut signals = shutdown::Signals::new()?;
    signals.recv().await;
    tracing::info!("shutdown signal received, draining pipeline");
    agent.request_stop();

    agent.wait().await?;
    tracing::info!("agent stopped");
    Ok(())
}
