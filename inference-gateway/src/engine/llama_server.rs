//! llama.cpp backed model invoker.
//!
//! Each loaded model runs in its own llama-server subprocess bound to a free
//! loopback port. The invoker owns the process and talks to its native
//! `/completion` endpoint with a blocking HTTP client; it is only ever used
//! from the model worker thread.

use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use gateway_common::GenerationRequest;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{ModelInvoker, ModelLoader};
use crate::config::ModelConfig;
use crate::error::{Error, Result};

// Constants for polling intervals
const HEALTH_CHECK_INTERVAL_MS: u64 = 200;
const HEALTH_CHECK_TIMEOUT_SECS: u64 = 2;
const EXIT_POLL_INTERVAL_MS: u64 = 100;

/// Starts llama-server processes for model files.
pub struct LlamaServerLoader {
    config: ModelConfig,
}

impl LlamaServerLoader {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    /// Build the llama-server command line for `model_path` on `port`.
    fn command(&self, model_path: &str, port: u16) -> Command {
        let mut cmd = Command::new(&self.config.server_binary);
        cmd.args(&self.config.server_args)
            .arg("-m")
            .arg(model_path)
            .arg("--host")
            .arg("127.0.0.1")
            .arg("--port")
            .arg(port.to_string())
            .arg("-c")
            .arg(self.config.context_size.to_string())
            .arg("-t")
            .arg(self.config.threads.to_string());

        if let Some(layers) = self.config.gpu_layers {
            cmd.arg("-ngl").arg(layers.to_string());
        }

        cmd.args(&self.config.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(if self.config.log_server_output {
                Stdio::inherit()
            } else {
                Stdio::null()
            });
        cmd
    }
}

impl ModelLoader for LlamaServerLoader {
    fn load(&self, path: &str) -> Result<Box<dyn ModelInvoker>> {
        let port = allocate_port()?;
        let child = self.command(path, port).spawn().map_err(|e| {
            Error::LoadFailed(format!(
                "Failed to start {}: {}",
                self.config.server_binary, e
            ))
        })?;
        tracing::debug!("Spawned llama-server for {} on port {}", path, port);

        let http_client = Client::builder()
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .build()
            .map_err(|e| Error::LoadFailed(e.to_string()))?;

        // From here on, Drop takes care of the child if startup fails.
        let mut invoker = LlamaServerInvoker {
            model_path: path.to_string(),
            port,
            process: Some(child),
            http_client,
            shutdown_timeout: Duration::from_secs(self.config.shutdown_timeout_secs),
        };
        invoker.wait_for_ready(Duration::from_secs(self.config.startup_timeout_secs))?;

        Ok(Box::new(invoker))
    }
}

/// Ask the OS for a free loopback port.
fn allocate_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|e| Error::LoadFailed(format!("Failed to bind for port allocation: {}", e)))?;
    let port = listener
        .local_addr()
        .map_err(|e| Error::LoadFailed(format!("Failed to get local addr: {}", e)))?
        .port();
    Ok(port)
}

/// Request body for llama-server's `/completion` endpoint.
#[derive(Debug, Serialize)]
struct ServerCompletionRequest<'a> {
    prompt: &'a str,
    n_predict: i32,
    temperature: f32,
    stop: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ServerCompletionResponse {
    content: String,
}

/// A running llama-server process serving one model.
pub struct LlamaServerInvoker {
    model_path: String,
    port: u16,
    process: Option<Child>,
    http_client: Client,
    shutdown_timeout: Duration,
}

impl LlamaServerInvoker {
    fn url(&self, endpoint: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, endpoint)
    }

    /// Check if the server process is still alive.
    fn is_process_alive(&mut self) -> bool {
        match self.process.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Poll `/health` until the server answers 200.
    fn wait_for_ready(&mut self, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        let health_url = self.url("/health");

        loop {
            if start.elapsed() > timeout {
                return Err(Error::LoadFailed(format!(
                    "llama-server startup timeout for {} after {:?}",
                    self.model_path,
                    start.elapsed()
                )));
            }

            if !self.is_process_alive() {
                return Err(Error::LoadFailed(format!(
                    "llama-server process died during startup for {}",
                    self.model_path
                )));
            }

            let probe = self
                .http_client
                .get(&health_url)
                .timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS))
                .send();
            if let Ok(resp) = probe {
                if resp.status().is_success() {
                    tracing::info!(
                        "llama-server ready for {} on port {} ({:?})",
                        self.model_path,
                        self.port,
                        start.elapsed()
                    );
                    return Ok(());
                }
            }

            thread::sleep(Duration::from_millis(HEALTH_CHECK_INTERVAL_MS));
        }
    }

    /// Terminate the server process, gracefully first.
    fn terminate(&mut self) {
        let Some(mut child) = self.process.take() else {
            return;
        };

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let _ = kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM);
        }

        let start = Instant::now();
        while start.elapsed() < self.shutdown_timeout {
            match child.try_wait() {
                Ok(Some(status)) => {
                    tracing::debug!(
                        "llama-server for {} exited with {}",
                        self.model_path,
                        status
                    );
                    return;
                }
                Ok(None) => thread::sleep(Duration::from_millis(EXIT_POLL_INTERVAL_MS)),
                Err(e) => {
                    tracing::warn!("Error waiting for llama-server {}: {}", self.model_path, e);
                    break;
                }
            }
        }

        tracing::warn!(
            "llama-server {} didn't stop gracefully, killing",
            self.model_path
        );
        let _ = child.kill();
        let _ = child.wait();
    }
}

impl ModelInvoker for LlamaServerInvoker {
    fn generate(&mut self, request: &GenerationRequest) -> Result<String> {
        if !self.is_process_alive() {
            return Err(Error::InferenceFailed(format!(
                "llama-server for {} is not running",
                self.model_path
            )));
        }

        let body = ServerCompletionRequest {
            prompt: &request.prompt,
            n_predict: request.max_tokens,
            temperature: request.temperature,
            stop: &request.stop_sequences,
        };

        let response = self
            .http_client
            .post(self.url("/completion"))
            .json(&body)
            .send()
            .map_err(|e| Error::InferenceFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::InferenceFailed(format!("{}: {}", status, body)));
        }

        let completion: ServerCompletionResponse = response
            .json()
            .map_err(|e| Error::InferenceFailed(e.to_string()))?;

        Ok(completion.content)
    }
}

impl Drop for LlamaServerInvoker {
    fn drop(&mut self) {
        self.terminate();
    }
}
