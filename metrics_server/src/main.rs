//! Deploy Metrics Server: team deployment statistics over an embedded store.
//!
//! Startup: open the DuckDB file, ensure the schema, bulk-load raw facts,
//! start the aggregation scheduler, then serve the read-only metrics API
//! until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::sync::watch;

use deploy_metrics::config::MetricsConfig;
use deploy_metrics::routes::{self, MetricsRouterState};
use deploy_metrics::services::aggregation_service::AggregationEngine;
use deploy_metrics::services::load_service::{self, LoadSource};
use deploy_metrics::services::scheduler;
use deploy_metrics::store::{MetricsStore, StoreOptions};
use deploy_metrics::schema;

#[derive(Parser)]
#[command(name = "deploy-metrics", about = "Team deployment metrics service")]
struct Cli {
    /// Server port
    #[arg(short, long, env = "METRICS_PORT", default_value = "8080")]
    port: u16,

    /// DuckDB store file
    #[arg(long, env = "METRICS_DB_PATH", default_value = "metrics.db")]
    database: PathBuf,

    /// Directory holding deployments.csv, incidents.csv, pull_requests.csv
    #[arg(long, env = "METRICS_DATA_DIR", default_value = "example-data")]
    data_dir: PathBuf,

    /// Keep existing raw data instead of reloading it at startup
    #[arg(long)]
    skip_load: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    }

    let cli = Cli::parse();
    let config = MetricsConfig::from_env();

    tracing::info!("Starting Deploy Metrics Server...");

    // Store + schema: failures here are fatal
    let store = MetricsStore::open(&cli.database, StoreOptions::from(&config))
        .map_err(|e| anyhow::anyhow!("Failed to open DuckDB: {e}"))?;
    tracing::info!(location = %store.location(), "Store ready");
    schema::initialize(&store)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize schema: {e}"))?;

    // Raw data: failures leave whatever is already in the store
    if cli.skip_load {
        tracing::info!("Skipping raw data load");
    } else if let Err(e) =
        load_service::replace_all(&store, LoadSource::CsvDir(cli.data_dir.clone())).await
    {
        tracing::warn!("Failed to load raw data, serving existing contents: {e}");
    }

    // Aggregation scheduler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine = AggregationEngine::new(store.clone(), config.aggregation_timeout());
    let scheduler_handle = scheduler::spawn_scheduler(
        engine,
        config.aggregation_interval(),
        config.aggregate_on_startup,
        shutdown_rx,
    );

    // Initialize metrics
    deploy_metrics::metrics::init_metrics();

    let app = routes::app(
        MetricsRouterState {
            store: store.clone(),
        },
        config.request_timeout(),
    );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!("Deploy Metrics Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Stopping aggregation scheduler...");
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        tracing::warn!("Aggregation scheduler ended abnormally: {e}");
    }

    store
        .close()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to close DuckDB: {e}"))?;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
