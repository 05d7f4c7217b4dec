//! Trendlens — Binary Entrypoint
//! Connects the store, starts the ingest scheduler and serves the read API
//! until Ctrl-C, then stops the scheduler and releases the store.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trendlens::config::{AppConfig, StoreBackend};
use trendlens::ingest::reddit::RedditClient;
use trendlens::ingest::scheduler::{IngestScheduler, IngestSchedulerCfg};
use trendlens::ingest::types::TrendingSource;
use trendlens::metrics::Metrics;
use trendlens::store::{ItemStore, MemoryStore, MongoStore};

/// `LOG_FORMAT=json` switches to structured json lines.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trendlens=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

async fn connect_store(cfg: &AppConfig) -> Result<Arc<dyn ItemStore>> {
    match cfg.store_backend {
        StoreBackend::Mongo => {
            let store = MongoStore::connect(&cfg.mongo_uri, &cfg.mongo_db, &cfg.mongo_collection)
                .await
                .context("connecting to MongoDB")?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store, data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed");
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env();
    cfg.validate()?;

    let metrics = Metrics::init()?;
    let store = connect_store(&cfg).await?;
    let source: Arc<dyn TrendingSource> =
        Arc::new(RedditClient::new(cfg.reddit.clone()).context("building reddit client")?);

    let scheduler = IngestScheduler::start(
        IngestSchedulerCfg::default(),
        source.clone(),
        store.clone(),
    );

    let state = trendlens::api::AppState::new(store.clone(), source);
    let app = trendlens::router(state, Some(cfg.cors_origin.as_str())).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    tracing::info!(addr = cfg.bind_addr.as_str(), "server is running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    scheduler.stop().await;
    store.close().await;
    Ok(())
}
