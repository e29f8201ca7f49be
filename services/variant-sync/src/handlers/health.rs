use axum::{extract::State, response::Json};
use bomsync_database::postgres_health_check;
use serde_json::{json, Value};

use crate::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "bomsync-variant-sync",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn detailed_health_check(State(state): State<AppState>) -> Json<Value> {
    let postgres_status = match &state.postgres_pool {
        Some(pool) => match postgres_health_check(pool).await {
            Ok(_) => json!({"status": "healthy", "message": "Connected"}),
            Err(e) => json!({"status": "unhealthy", "message": e.to_string()}),
        },
        None => json!({"status": "healthy", "message": "In-memory store"}),
    };

    let status = if postgres_status["status"] == "healthy" {
        "healthy"
    } else {
        "degraded"
    };

    Json(json!({
        "status": status,
        "service": "bomsync-variant-sync",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "sync_profile": state.config.sync.profile,
        "checks": {
            "postgres": postgres_status
        }
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}
