use std::time::Instant;

use axum::{
    extract::{Path, State},
    response::Json,
};
use bomsync_models::Bom;
use bomsync_utils::BomSyncResult;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ApiError;
use crate::report::SyncOutcome;
use crate::synchronizer::{HookEvent, VariantBomSynchronizer};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BomHookRequest {
    pub event: HookEvent,
    pub doc: Bom,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncResponse {
    pub status: String,
    pub outcome: SyncOutcome,
}

/// Document lifecycle hook for BOMs
pub async fn bom_hook(
    State(state): State<AppState>,
    Json(request): Json<BomHookRequest>,
) -> Result<Json<SyncResponse>, ApiError> {
    info!(bom = %request.doc.name, event = ?request.event, "BOM hook received");
    let started = Instant::now();

    let session = state.sessions.session();
    let result = VariantBomSynchronizer::new(&*session, &state.config.sync)
        .on_bom_event(&request.doc, request.event)
        .await;

    respond(&state, result, started)
}

/// Re-syncs the variants of a template BOM already in storage
pub async fn sync_stored_bom(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SyncResponse>, ApiError> {
    info!(bom = %name, "Manual variant sync requested");
    let started = Instant::now();

    let session = state.sessions.session();
    let result = VariantBomSynchronizer::new(&*session, &state.config.sync)
        .sync_stored_template(&name)
        .await;

    respond(&state, result, started)
}

fn respond(
    state: &AppState,
    result: BomSyncResult<SyncOutcome>,
    started: Instant,
) -> Result<Json<SyncResponse>, ApiError> {
    let elapsed = started.elapsed().as_secs_f64();

    match result {
        Ok(outcome) => {
            state.metrics.observe_outcome(&outcome, elapsed);
            Ok(Json(SyncResponse {
                status: "ok".to_string(),
                outcome,
            }))
        }
        Err(e) => {
            state.metrics.observe_error(e.is_blocking(), elapsed);
            Err(ApiError(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use bomsync_database::InMemoryBomRepository;
    use bomsync_models::{BomItem, DocStatus, Item, ItemVariantAttribute};
    use bomsync_utils::{AppConfig, ErrorResponse};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::metrics::SyncMetrics;
    use crate::{create_app, AppState};

    fn line(code: &str, qty: f64, rate: f64) -> BomItem {
        let mut line = BomItem::new(code, qty, rate);
        line.uom = Some("Nos".to_string());
        line
    }

    async fn seeded_store() -> Arc<InMemoryBomRepository> {
        let store = InMemoryBomRepository::new();
        store.put_item(Item::template("SHIRT")).await;
        store
            .put_item(Item::variant(
                "SHIRT-S",
                "SHIRT",
                vec![ItemVariantAttribute::new("Size", "S")],
            ))
            .await;
        store.put_item(Item::stock("FABRIC")).await;

        let mut variant_bom = Bom::new("BOM-SHIRT-S-001", "SHIRT-S");
        variant_bom.docstatus = DocStatus::Submitted;
        variant_bom.items = vec![line("FABRIC", 3.0, 8.0)];
        store.put_bom(variant_bom).await;
        Arc::new(store)
    }

    fn app(store: Arc<InMemoryBomRepository>) -> Router {
        create_app(AppState {
            sessions: store,
            postgres_pool: None,
            config: AppConfig::default(),
            metrics: SyncMetrics::new().unwrap(),
        })
    }

    fn template() -> Bom {
        let mut bom = Bom::new("BOM-SHIRT-001", "SHIRT");
        bom.items = vec![line("FABRIC", 2.0, 10.0), line("THREAD", 1.0, 0.1)];
        bom
    }

    async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_before_save_hook_syncs_variants() {
        let store = seeded_store().await;

        let (status, body) = post(
            app(store.clone()),
            "/api/v1/hooks/bom",
            json!({ "event": "before_save", "doc": template() }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let response: SyncResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.status, "ok");
        assert_eq!(response.outcome.synced, vec!["BOM-SHIRT-S-001"]);

        let synced = store.committed_bom("BOM-SHIRT-S-001").await.unwrap();
        let codes: Vec<_> = synced.items.iter().map(|l| l.item_code.as_str()).collect();
        assert_eq!(codes, vec!["FABRIC", "THREAD"]);
        assert_eq!((synced.items[0].qty, synced.items[0].rate), (3.0, 8.0));
    }

    #[tokio::test]
    async fn test_blocking_error_maps_to_expectation_failed() {
        let store = seeded_store().await;
        store.put_item(Item::template("PANTS")).await;
        let mut doc = template();
        doc.name = "BOM-PANTS-001".to_string();
        doc.item = "PANTS".to_string();

        let (status, body) = post(
            app(store),
            "/api/v1/hooks/bom",
            json!({ "event": "before_save", "doc": doc }),
        )
        .await;

        assert_eq!(status, StatusCode::EXPECTATION_FAILED);
        let error: ErrorResponse = serde_json::from_value(body).unwrap();
        assert_eq!(error.code, "SYNC_BLOCKED");
        assert!(error.title.is_some());
        assert_eq!(error.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_document_is_a_bad_request() {
        let store = seeded_store().await;
        let mut doc = template();
        doc.items[0].item_code = String::new();

        let (status, body) = post(
            app(store),
            "/api/v1/hooks/bom",
            json!({ "event": "before_save", "doc": doc }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_manual_sync_of_stored_template() {
        let store = seeded_store().await;
        store.put_bom(template()).await;

        let (status, body) = post(app(store.clone()), "/api/v1/boms/BOM-SHIRT-001/sync", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"]["synced"][0], "BOM-SHIRT-S-001");

        let (status, body) = post(app(store), "/api/v1/boms/BOM-UNKNOWN/sync", json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let store = seeded_store().await;

        let response = app(store)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("x-request-id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-request-id"], "req-42");
    }
}
