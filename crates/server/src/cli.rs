use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use ipnet::IpNet;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    /// Snapshot period. `None` means synchronous mode: every write is made
    /// durable before its response.
    pub store_interval: Option<Duration>,
    pub file_path: Option<PathBuf>,
    pub restore: bool,
    pub database_dsn: Option<String>,
    pub key: Option<String>,
    pub trusted_subnet: Option<IpNet>,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "metrod-server", version, about = "metrod metrics ingest server")]
pub struct Cli {
    /// Listen address.
    #[arg(short = 'a', long, default_value = "localhost:8080")]
    pub address: String,

    /// Snapshot period in seconds; 0 snapshots synchronously on every write.
    #[arg(short = 'i', long = "interval", default_value_t = 300)]
    pub store_interval: u64,

    /// Snapshot file path; empty disables file persistence.
    #[arg(short = 'f', long = "file", default_value = "metrics.json")]
    pub file_storage_path: String,

    /// Restore metrics from the snapshot at startup.
    #[arg(short = 'r', long, default_value_t = true, action = clap::ArgAction::Set)]
    pub restore: bool,

    /// PostgreSQL DSN; empty keeps the in-memory store.
    #[arg(short = 'd', long = "database-dsn", default_value = "")]
    pub database_dsn: String,

    /// Integrity key for body digests; empty disables.
    #[arg(short = 'k', long, default_value = "")]
    pub key: String,

    /// Trusted subnet (CIDR) for `X-Real-IP`; empty admits everyone.
    #[arg(short = 't', long = "trusted-subnet", default_value = "")]
    pub trusted_subnet: String,
}

/// Parse flags, then apply environment overrides (the environment wins over
/// flags) and validate.
pub fn load() -> anyhow::Result<ServerConfig> {
    let mut cli = Cli::parse();
    apply_env(&mut cli, |name| std::env::var(name).ok())?;
    cli.into_config()
}

fn apply_env(cli: &mut Cli, get: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
    if let Some(v) = get("ADDRESS") {
        cli.address = v;
    }
    if let Some(v) = get("STORE_INTERVAL") {
        cli.store_interval = v
            .parse()
            .with_context(|| format!("invalid STORE_INTERVAL {v:?}"))?;
    }
    if let Some(v) = get("FILE_STORAGE_PATH") {
        cli.file_storage_path = v;
    }
    if let Some(v) = get("RESTORE") {
        cli.restore = v.parse().with_context(|| format!("invalid RESTORE {v:?}"))?;
    }
    if let Some(v) = get("DATABASE_DSN") {
        cli.database_dsn = v;
    }
    if let Some(v) = get("KEY") {
        cli.key = v;
    }
    if let Some(v) = get("TRUSTED_SUBNET") {
        cli.trusted_subnet = v;
    }
    Ok(())
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let trusted_subnet = if self.trusted_subnet.is_empty() {
            None
        } else {
            Some(
                self.trusted_subnet
                    .parse::<IpNet>()
                    .with_context(|| format!("invalid trusted subnet {:?}", self.trusted_subnet))?,
            )
        };

        Ok(ServerConfig {
            address: self.address,
            store_interval: (self.store_interval > 0)
                .then(|| Duration::from_secs(self.store_interval)),
            file_path: Some(self.file_storage_path)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            restore: self.restore,
            database_dsn: Some(self.database_dsn).filter(|d| !d.is_empty()),
            key: Some(self.key).filter(|k| !k.is_empty()),
            trusted_subnet,
        })
    }
}
