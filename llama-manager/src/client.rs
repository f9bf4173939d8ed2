//! Retrying HTTP client for a llama gateway or llama.cpp server.

use std::env;

use gateway_common::ChatMessage;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Environment variable overriding the server base URL.
pub const SERVER_URL_ENV: &str = "LLAMA_CPP_SERVER";

/// Base URL used when [`SERVER_URL_ENV`] is not set.
pub const DEFAULT_SERVER_URL: &str = "http://llama-cpp:8080";

/// Client for the control and completion endpoints of a llama server.
///
/// Every operation is wrapped in the client's [`RetryPolicy`]. Only
/// [`LlamaManager::health`] hides failures; everything else returns the
/// error of the last attempt.
pub struct LlamaManager {
    http_client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl LlamaManager {
    pub fn new(base_url: &str) -> Self {
        Self::with_policy(base_url, RetryPolicy::default())
    }

    pub fn with_policy(base_url: &str, policy: RetryPolicy) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
        }
    }

    /// Client for the server named by `LLAMA_CPP_SERVER`, or the default.
    pub fn from_env() -> Self {
        Self::new(&resolve_base_url(env::var(SERVER_URL_ENV).ok()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GET /health, reduced to up/down. Never fails.
    pub async fn health(&self) -> bool {
        match self.request(Method::GET, "/health", None).await {
            Ok((status, _)) => status == StatusCode::OK,
            Err(e) => {
                tracing::debug!("Health check failed: {}", e);
                false
            }
        }
    }

    /// GET /props - Server properties.
    pub async fn props(&self) -> Result<Value> {
        self.request_json(Method::GET, "/props", None).await
    }

    /// GET /v1/models - Loaded models (OpenAI-compatible).
    pub async fn models(&self) -> Result<Value> {
        self.request_json(Method::GET, "/v1/models", None).await
    }

    /// POST /load - Load the model at `model_path`.
    pub async fn load_model(&self, model_path: &str) -> Result<Value> {
        let payload = json!({ "model": model_path });
        self.request_json(Method::POST, "/load", Some(&payload)).await
    }

    /// POST /unload - Unload the current model.
    pub async fn unload_model(&self) -> Result<Value> {
        self.request_json(Method::POST, "/unload", None).await
    }

    /// POST /v1/completions - Text completion (OpenAI-compatible).
    ///
    /// `options` are merged into the payload unchecked; the server decides
    /// which fields it accepts.
    pub async fn completion(&self, prompt: &str, options: Map<String, Value>) -> Result<Value> {
        let mut base = Map::new();
        base.insert("prompt".to_string(), Value::String(prompt.to_string()));
        let payload = merge_payload(base, options);
        self.request_json(Method::POST, "/v1/completions", Some(&payload))
            .await
    }

    /// POST /v1/chat/completions - Chat completion (OpenAI-compatible).
    pub async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        options: Map<String, Value>,
    ) -> Result<Value> {
        let mut base = Map::new();
        base.insert("messages".to_string(), json!(messages));
        let payload = merge_payload(base, options);
        self.request_json(Method::POST, "/v1/chat/completions", Some(&payload))
            .await
    }

    async fn request_json(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let (_, bytes) = self.request(method, endpoint, body).await?;
        serde_json::from_slice(&bytes).map_err(Error::Decode)
    }

    /// Send one logical request, retrying transport errors and non-2xx
    /// statuses per the policy.
    ///
    /// The body is read inside the attempt, so a response that stalls after
    /// its headers times out and is retried like any other failure.
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Vec<u8>)> {
        let url = format!("{}{}", self.base_url, endpoint);

        self.policy
            .run(endpoint, |_attempt| {
                let mut builder = self
                    .http_client
                    .request(method.clone(), &url)
                    .timeout(self.policy.timeout_per_attempt);
                if let Some(body) = body {
                    builder = builder.json(body);
                }

                async move {
                    let response = builder.send().await?;
                    let status = response.status();
                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::Status { status, body });
                    }
                    let bytes = response.bytes().await?;
                    Ok::<_, Error>((status, bytes.to_vec()))
                }
            })
            .await
    }
}

/// Pick the base URL from an optional override.
pub fn resolve_base_url(override_url: Option<String>) -> String {
    override_url
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
}

/// Overlay `options` on `base`; an option with a base key wins.
fn merge_payload(mut base: Map<String, Value>, options: Map<String, Value>) -> Value {
    base.extend(options);
    Value::Object(base)
}
