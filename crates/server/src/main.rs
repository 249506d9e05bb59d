mod app;
mod cli;
mod handlers;
mod middleware;
mod persist;
mod service;
mod shutdown;
mod storage;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::app::AppState;
use crate::persist::PersistenceWorker;
use crate::service::MetricsService;
use crate::storage::{FileStorage, MemoryStorage, PgStorage, Storage};

/// How long in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = cli::load()?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        let mut signals = shutdown::Signals::new()?;
        tokio::spawn(async move {
            signals.recv().await;
            tracing::info!("shutdown signal received");
            cancel.cancel();
        });
    }

    let primary: Arc<dyn Storage> = match &config.database_dsn {
        Some(dsn) => Arc::new(PgStorage::connect(dsn).await.context("connect database")?),
        None => Arc::new(MemoryStorage::default()),
    };

    let mut sync_snapshot = None;
    let mut persist = None;
    if let Some(path) = &config.file_path {
        let snapshot = Arc::new(FileStorage::new(path));
        let worker =
            PersistenceWorker::new(primary.clone(), snapshot.clone(), config.store_interval);
        if config.restore {
            worker.restore().await.context("restore snapshot")?;
        }
        if config.store_interval.is_none() {
            // Synchronous mode: the service appends to the snapshot on every
            // write; the worker only handles restore and the final snapshot.
            sync_snapshot = Some(snapshot);
        }
        persist = Some(tokio::spawn(worker.run(cancel.clone())));
    }

    let service = Arc::new(MetricsService::new(primary, sync_snapshot));
    let state = AppState {
        service,
        key: config.key.clone(),
        trusted_subnet: config.trusted_subnet,
    };
    let router = app::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("bind {}", config.address))?;
    tracing::info!(address = %config.address, "server listening");

    let serve_cancel = cancel.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(serve_cancel.cancelled_owned())
            .await
    });

    let served: anyhow::Result<()> = tokio::select! {
        res = &mut server => flatten_serve(res),
        _ = cancel.cancelled() => {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
                Ok(res) => flatten_serve(res),
                Err(_) => {
                    tracing::warn!("grace period elapsed, closing listener");
                    server.abort();
                    Ok(())
                }
            }
        }
    };
    // Wake the persistence worker even when the server stopped on its own.
    cancel.cancel();

    if let Some(task) = persist {
        task.await.context("persistence worker join")??;
    }
    served?;

    tracing::info!("server stopped");
    Ok(())
}

fn flatten_serve(
    res: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> anyhow::Result<()> {
    res.context("server task join")?.context("serve")
}
