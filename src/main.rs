//! Opportunity aggregator — binary entrypoint.
//! Boots the ingest scheduler and the Axum ops surface (health, admin
//! triggers, Prometheus metrics).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use opportunity_aggregator::api;
use opportunity_aggregator::config::AppConfig;
use opportunity_aggregator::ingest::coordinator::Coordinator;
use opportunity_aggregator::ingest::scheduler::spawn_cycle_scheduler;
use opportunity_aggregator::ingest::snapshot::DirSnapshotSink;
use opportunity_aggregator::ingest::sources::build_sources;
use opportunity_aggregator::metrics::Metrics;
use opportunity_aggregator::store::Store;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default()?;

    if let Some(parent) = cfg.store.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating store directory {}", parent.display()))?;
        }
    }
    let store = Arc::new(Store::open(&cfg.store.path)?);

    let sources = build_sources(&cfg)?;
    tracing::info!(sources = sources.len(), "source roster ready");

    let mut coordinator = Coordinator::new(
        sources,
        Arc::clone(&store),
        Duration::from_secs(cfg.schedule.extract_timeout_secs),
    );
    if cfg.snapshots.enabled {
        coordinator =
            coordinator.with_snapshots(Arc::new(DirSnapshotSink::new(cfg.snapshots.dir.clone())));
    }
    let coordinator = Arc::new(coordinator);

    let metrics = Metrics::init(cfg.schedule.interval_secs);
    spawn_cycle_scheduler(Arc::clone(&coordinator), cfg.schedule.interval_secs);

    let router =
        api::create_router(Arc::clone(&coordinator), Arc::clone(&store)).merge(metrics.router());

    let port: u16 = std::env::var("HTTP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "shutdown signal listener failed");
    }
}
