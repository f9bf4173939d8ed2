//! Native generation endpoint.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::routing::post;
use axum::{Json, Router};
use gateway_common::{GenerationRequest, GenerationResponse};
use tower_http::set_header::SetResponseHeaderLayer;

use super::not_found;
use crate::error::{Error, Result};
use crate::state::AppState;

/// Build the generate router.
///
/// Responses of this route, errors included, carry
/// `Access-Control-Allow-Origin: *`. `/health` does not.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/generate",
        post(generate)
            .layer(SetResponseHeaderLayer::overriding(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ))
            .fallback(not_found),
    )
}

/// POST /api/generate - Generate text with the loaded model.
///
/// Answers 200 "Model not loaded" when there is no model. Body reading and
/// parsing are done by hand so that shape errors, oversized bodies included,
/// surface as `{"error": ...}` with 500.
async fn generate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<Json<GenerationResponse>> {
    if !headers.contains_key(header::CONTENT_LENGTH) {
        return Err(Error::MissingContentLength);
    }

    let request: GenerationRequest = serde_json::from_slice(&body?)?;
    tracing::debug!(
        max_tokens = request.max_tokens,
        temperature = request.temperature,
        "Generate request"
    );

    let response = match state.worker.generate(request).await? {
        Some(text) => GenerationResponse::new(&text, state.model_alias()),
        None => GenerationResponse::model_not_loaded(),
    };

    Ok(Json(response))
}
