use std::net::IpAddr;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use reqwest::Url;

use metrod_agent_engine::AgentConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "metrod-agent", version, about = "metrod metrics collection agent")]
pub struct Cli {
    /// Server base URL.
    #[arg(short = 'a', long, default_value = "http://localhost:8080")]
    pub address: String,

    /// Seconds between metric samples.
    #[arg(short = 'p', long, default_value_t = 2)]
    pub poll_interval: u64,

    /// Seconds between shipped batches.
    #[arg(short = 'r', long, default_value_t = 10)]
    pub report_interval: u64,

    /// Integrity key for request signing; empty disables.
    #[arg(short = 'k', long, default_value = "")]
    pub key: String,

    /// Number of concurrent sender workers.
    #[arg(short = 'l', long, default_value_t = 1)]
    pub rate_limit: usize,
}

/// Parse flags, then apply environment overrides (the environment wins over
/// flags, which is the inverse of clap's own precedence) and validate.
pub fn load() -> anyhow::Result<AgentConfig> {
    let mut cli = Cli::parse();
    apply_env(&mut cli, |name| std::env::var(name).ok())?;
    cli.into_config()
}

fn apply_env(cli: &mut Cli, get: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
    if let Some(v) = get("ADDRESS") {
        cli.address = v;
    }
    if let Some(v) = get("POLL_INTERVAL") {
        cli.poll_interval = v
            .parse()
            .with_context(|| format!("invalid POLL_INTERVAL {v:?}"))?;
    }
    if let Some(v) = get("REPORT_INTERVAL") {
        cli.report_interval = v
            .parse()
            .with_context(|| format!("invalid REPORT_INTERVAL {v:?}"))?;
    }
    if let Some(v) = get("KEY") {
        cli.key = v;
    }
    if let Some(v) = get("RATE_LIMIT") {
        cli.rate_limit = v
            .parse()
            .with_context(|| format!("invalid RATE_LIMIT {v:?}"))?;
    }
    Ok(())
}

impl Cli {
    fn into_config(self) -> anyhow::Result<AgentConfig> {
        if self.poll_interval == 0 {
            anyhow::bail!("poll interval must be greater than zero");
        }
        if self.report_interval == 0 {
            anyhow::bail!("report interval must be greater than zero");
        }
        if self.rate_limit == 0 {
            anyhow::bail!("rate limit must be at least 1");
        }

        let server_url = Url::parse(&self.address)
            .with_context(|| format!("invalid server address {:?}", self.address))?;
        match server_url.scheme() {
            "http" | "https" => {}
            "grpc" => anyhow::bail!("grpc transport is not implemented"),
            other => anyhow::bail!("unsupported server url scheme {other:?}"),
        }

        let key = Some(self.key).filter(|k| !k.is_empty());
        let client_ip = preferred_outbound_ip(&server_url);

        Ok(AgentConfig {
            server_url,
            poll_interval: Duration::from_secs(self.poll_interval),
            report_interval: Duration::from_secs(self.report_interval),
            workers: self.rate_limit,
            key,
            client_ip,
        })
    }
}

/// The local address the OS would route toward the server, advertised in
/// `X-Real-IP`. A UDP connect resolves routing without sending a packet.
fn preferred_outbound_ip(server: &Url) -> Option<IpAddr> {
    let host = server.host_str()?;
    let port = server.port_or_known_default().unwrap_or(80);
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect((host, port)).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}
