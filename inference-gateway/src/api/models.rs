//! Model inspection and hot-swap endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use gateway_common::{LoadModelRequest, ModelList};
use serde::Serialize;
use serde_json::{json, Value};

use super::not_found;
use crate::error::Result;
use crate::state::AppState;

/// Build the routes that live at the server root.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/props", get(props).fallback(not_found))
        .route("/load", post(load_model).fallback(not_found))
        .route("/unload", post(unload_model).fallback(not_found))
}

/// Build the routes nested under `/v1`.
pub fn v1_router() -> Router<Arc<AppState>> {
    Router::new().route("/models", get(list_models).fallback(not_found))
}

#[derive(Debug, Serialize)]
struct PropsResponse {
    model: String,
    model_path: Option<String>,
    loaded: bool,
}

/// GET /props - Describe the served model.
async fn props(State(state): State<Arc<AppState>>) -> Json<PropsResponse> {
    let loaded = state.worker.loaded_model();
    Json(PropsResponse {
        model: state.model_alias().to_string(),
        loaded: loaded.is_some(),
        model_path: loaded.map(|m| m.path),
    })
}

/// GET /v1/models - List the loaded model, if any.
async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    let ids = state
        .worker
        .loaded_model()
        .map(|_| state.model_alias().to_string());
    Json(ModelList::new(ids))
}

/// POST /load - Swap in the model at the given path.
///
/// Queued behind any pending generation, so it never overlaps one.
async fn load_model(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>> {
    let request: LoadModelRequest = serde_json::from_slice(&body)?;
    state.worker.load(&request.model).await?;

    Ok(Json(json!({ "status": "ok", "model": request.model })))
}

/// POST /unload - Release the current model.
async fn unload_model(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let unloaded = state.worker.unload().await?;
    Ok(Json(json!({ "status": "ok", "unloaded": unloaded })))
}
