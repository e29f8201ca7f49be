//! Bomsync Variant Sync Service
//!
//! Receives BOM lifecycle hooks and keeps the BOMs of variant items in step
//! with their template BOM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post},
    serve, Router,
};
use bomsync_database::{initialize_database, PostgresPool, SessionFactory};
use bomsync_utils::{init_logging, AppConfig};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

mod handlers;
mod metrics;
mod middleware;
mod report;
mod synchronizer;

use handlers::*;
use metrics::SyncMetrics;
use middleware::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration ({}), using defaults", e);
        AppConfig::default()
    });

    init_logging(&config.logging)?;
    info!(profile = ?config.sync.profile, "Starting Bomsync Variant Sync Service");

    let db_config = bomsync_database::DatabaseConfig {
        postgres_url: config.database.postgres_url.clone(),
        max_connections: config.database.max_connections,
        connection_timeout: Duration::from_secs(config.database.connection_timeout_seconds),
        run_migrations: config.database.run_migrations,
    };
    let postgres_pool = initialize_database(&db_config)
        .await
        .context("Failed to initialize database")?;
    info!("Database connection established");

    let state = AppState {
        sessions: Arc::new(postgres_pool.clone()),
        postgres_pool: Some(postgres_pool),
        config: config.clone(),
        metrics: SyncMetrics::new()?,
    };
    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Variant Sync Service listening on {}", addr);

    serve(listener, app).await?;

    Ok(())
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionFactory>,
    /// `None` when `sessions` is not backed by PostgreSQL
    pub postgres_pool: Option<PostgresPool>,
    pub config: AppConfig,
    pub metrics: SyncMetrics,
}

pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/hooks/bom", post(bom_hook))
        .route("/boms/:name/sync", post(sync_stored_bom));

    Router::new()
        .route("/health", get(health_check))
        .route("/health/detailed", get(detailed_health_check))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST])
                        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
                )
                .layer(TimeoutLayer::new(Duration::from_secs(
                    state.config.server.timeout_seconds,
                )))
                .layer(DefaultBodyLimit::max(state.config.server.max_request_size))
                .layer(axum::middleware::from_fn(request_id_middleware)),
        )
        .with_state(state)
}
