//! Text completions endpoint (OpenAI-compatible).

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use gateway_common::{CompletionRequest, CompletionResponse, GenerationRequest};

use super::not_found;
use crate::error::{Error, Result};
use crate::state::AppState;

/// Build the completions router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/completions", post(completions).fallback(not_found))
}

/// POST /v1/completions - OpenAI-compatible text completion.
///
/// Runs on the same worker queue as `/api/generate`. Fields the gateway
/// does not know are ignored.
async fn completions(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<CompletionResponse>> {
    let request: CompletionRequest = serde_json::from_slice(&body)?;

    if let Some(ref model) = request.model {
        tracing::debug!("Completion request names model {}, serving the loaded one", model);
    }

    let mut generation = GenerationRequest::new(request.prompt);
    if let Some(max_tokens) = request.max_tokens {
        generation.max_tokens = max_tokens;
    }
    if let Some(temperature) = request.temperature {
        generation.temperature = temperature;
    }

    let text = state
        .worker
        .generate(generation)
        .await?
        .ok_or(Error::ModelNotLoaded)?;

    Ok(Json(CompletionResponse::new(
        state.model_alias().to_string(),
        text.trim().to_string(),
    )))
}
