//! Native generation API types (`/api/generate`).

use serde::{Deserialize, Serialize};

/// Model name reported when the gateway has nothing loaded.
pub const DEFAULT_MODEL_ALIAS: &str = "tinyllama";

/// Response text returned instead of a generation when no model is loaded.
pub const MODEL_NOT_LOADED: &str = "Model not loaded";

/// Stop sequences applied to every generation.
pub const DEFAULT_STOP_SEQUENCES: [&str; 3] = ["\n", "User:", "Assistant:"];

/// Body of `POST /api/generate`.
///
/// Every field is optional on the wire. `max_tokens` and `temperature` are
/// handed to the model as-is, without range checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Not read from the wire; always the fixed stop list.
    #[serde(skip, default = "default_stop_sequences")]
    pub stop_sequences: Vec<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            stop_sequences: default_stop_sequences(),
        }
    }
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self::new("")
    }
}

fn default_max_tokens() -> i32 {
    100
}

fn default_temperature() -> f32 {
    0.8
}

fn default_stop_sequences() -> Vec<String> {
    DEFAULT_STOP_SEQUENCES.iter().map(|s| s.to_string()).collect()
}

/// Successful reply of `POST /api/generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub response: String,
    pub model: String,
    pub created: i64,
}

impl GenerationResponse {
    /// Build a response, trimming the generated text and stamping `created` now.
    pub fn new(text: &str, model: impl Into<String>) -> Self {
        Self {
            response: text.trim().to_string(),
            model: model.into(),
            created: chrono::Utc::now().timestamp(),
        }
    }

    /// Degraded reply used while no model is loaded.
    pub fn model_not_loaded() -> Self {
        Self::new(MODEL_NOT_LOADED, DEFAULT_MODEL_ALIAS)
    }
}

/// Liveness status reported by `GET /health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Ok,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthState,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: HealthState::Ok,
        }
    }
}

/// Error body returned by the gateway on handler failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

impl ErrorPayload {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_request_defaults() {
        let req: GenerationRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.prompt, "");
        assert_eq!(req.max_tokens, 100);
        assert_eq!(req.temperature, 0.8);
        assert_eq!(req.stop_sequences, vec!["\n", "User:", "Assistant:"]);
    }

    #[test]
    fn test_generation_request_ignores_wire_stop_sequences() {
        let json = r#"{"prompt": "Hi", "stop_sequences": ["STOP"], "max_tokens": -1}"#;
        let req: GenerationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.prompt, "Hi");
        assert_eq!(req.max_tokens, -1);
        assert_eq!(req.stop_sequences.len(), 3);
    }

    #[test]
    fn test_generation_request_rejects_wrong_types() {
        let result = serde_json::from_str::<GenerationRequest>(r#"{"max_tokens": "lots"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_generation_response_trims_text() {
        let response = GenerationResponse::new("  \n Hello there \n", "tinyllama");
        assert_eq!(response.response, "Hello there");
        assert_eq!(response.model, "tinyllama");
        assert!((chrono::Utc::now().timestamp() - response.created).abs() <= 2);
    }

    #[test]
    fn test_model_not_loaded_response() {
        let response = GenerationResponse::model_not_loaded();
        assert_eq!(response.response, "Model not loaded");
        assert_eq!(response.model, "tinyllama");
    }

    #[test]
    fn test_health_status_json() {
        let json = serde_json::to_value(HealthStatus::ok()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "ok"}));
    }
}
