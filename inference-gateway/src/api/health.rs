//! Health check endpoint.

use axum::Json;
use gateway_common::HealthStatus;

/// GET /health - Liveness only; does not look at the model.
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus::ok())
}
