use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::ingest::coordinator::{Coordinator, SourceStatus, SourceTrigger, TriggerOutcome};
use crate::store::{Store, TableCounts};

#[derive(Clone)]
pub struct AppState {
    coordinator: Arc<Coordinator>,
    store: Arc<Store>,
}

pub fn create_router(coordinator: Arc<Coordinator>, store: Arc<Store>) -> Router {
    let state = AppState { coordinator, store };

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/admin/runs", get(admin_runs))
        .route("/admin/stats", get(admin_stats))
        .route("/admin/run", post(admin_run_cycle))
        .route("/admin/run/{source}", post(admin_run_source))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn admin_runs(State(state): State<AppState>) -> Json<Vec<SourceStatus>> {
    Json(state.coordinator.statuses())
}

async fn admin_stats(State(state): State<AppState>) -> Result<Json<TableCounts>, StatusCode> {
    match state.store.counts() {
        Ok(counts) => Ok(Json(counts)),
        Err(err) => {
            tracing::error!(error = %err, "stats query failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Kick off a full cycle in the background; 202 with what each source
/// slot said.
async fn admin_run_cycle(State(state): State<AppState>) -> (StatusCode, Json<Vec<SourceTrigger>>) {
    (StatusCode::ACCEPTED, Json(state.coordinator.trigger_cycle()))
}

#[derive(serde::Serialize)]
struct TriggerResp {
    source: String,
    outcome: TriggerOutcome,
}

async fn admin_run_source(State(state): State<AppState>, Path(source): Path<String>) -> Response {
    match state.coordinator.trigger_source(&source) {
        Some(outcome) => {
            (StatusCode::ACCEPTED, Json(TriggerResp { source, outcome })).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            format!("unknown source '{source}'"),
        )
            .into_response(),
    }
}
