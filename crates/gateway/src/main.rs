//! Quire API Gateway
//!
//! HTTP front for the content API.
//! Handles:
//! - Request binding and validation
//! - Routing to the post, section and tag operations
//! - Scheduling orphan tag sweeps after post mutations
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;
mod routes;

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use quire_common::{
    config::{AppConfig, ObservabilityConfig},
    db::DbPool,
    metrics::{self, LATENCY_BUCKETS},
    tags::OrphanSweeper,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub sweeper: Option<OrphanSweeper>,
}

impl AppState {
    /// Queue an orphan tag sweep; call only after the mutating transaction committed
    pub fn schedule_sweep(&self) {
        if let Some(ref sweeper) = self.sweeper {
            sweeper.schedule();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config.observability);

    info!(
        version = quire_common::VERSION,
        service = %config.observability.service_name,
        "Starting Quire API Gateway"
    );

    let config = Arc::new(config);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                LATENCY_BUCKETS,
            )?
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.migrate().await?;
    }

    let (sweeper, sweeper_handle) = if config.sweeper.enabled {
        let (sweeper, handle) = OrphanSweeper::spawn(db.clone());
        (Some(sweeper), Some(handle))
    } else {
        tracing::warn!("Orphan tag sweeper disabled, unused tags will accumulate");
        (None, None)
    };

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        sweeper,
    };

    // Build the router
    let app = routes::create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // the router (and with it every sweeper handle) is gone; let the last sweep finish
    if let Some(handle) = sweeper_handle {
        if tokio::time::timeout(config.shutdown_timeout(), handle).await.is_err() {
            tracing::warn!("Orphan sweeper did not finish before shutdown timeout");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().with_current_span(true).init();
    } else {
        builder.init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
