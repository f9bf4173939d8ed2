//! HTTP API of the gateway.

pub mod completions;
pub mod generate;
pub mod health;
pub mod models;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;

use crate::logging::request_trace_layer;
use crate::state::AppState;

/// Build the full gateway router.
///
/// Unknown paths, and known paths hit with the wrong method, get an empty
/// 404.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health).fallback(not_found))
        .merge(generate::router())
        .merge(models::router())
        .nest(
            "/v1",
            Router::new()
                .merge(completions::router())
                .merge(models::v1_router()),
        )
        .fallback(not_found)
        .layer(request_trace_layer())
        .with_state(state)
}

pub(crate) async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
