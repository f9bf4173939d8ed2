//! Configuration for the inference gateway.

use clap::Parser;
use config::{Config as ConfigLoader, ConfigError, Environment, File};
use gateway_common::DEFAULT_MODEL_ALIAS;
use serde::Deserialize;

/// Command line flags. Every flag is optional and overrides the file and
/// environment configuration when present.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "llama-gateway", version, about = "Serve a local model over HTTP")]
pub struct Cli {
    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,
    /// Port to bind to
    #[arg(long)]
    pub port: Option<u16>,
    /// Path to the model file loaded at startup
    #[arg(long)]
    pub model: Option<String>,
    /// Number of CPU threads used by the model server
    #[arg(long)]
    pub threads: Option<u32>,
    /// Context size
    #[arg(long = "ctx-size")]
    pub ctx_size: Option<u32>,
    /// Path to a configuration file (defaults to ./config.toml if present)
    #[arg(long, env = "GATEWAY_CONFIG")]
    pub config: Option<String>,
}

/// Main configuration structure for the gateway.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Model and llama-server settings.
///
/// The model itself runs in a llama-server subprocess owned by the
/// generation worker; these fields describe how that process is started.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Model file loaded before the listener binds. None starts the gateway
    /// without a model.
    #[serde(default)]
    pub path: Option<String>,
    /// Name reported in the `model` field of responses.
    #[serde(default = "default_alias")]
    pub alias: String,
    /// Path to the llama-server binary or wrapper command.
    #[serde(default = "default_server_binary")]
    pub server_binary: String,
    /// Extra arguments inserted BEFORE the model args, for wrapper commands.
    #[serde(default)]
    pub server_args: Vec<String>,
    /// Context window size (-c flag).
    #[serde(default = "default_context_size")]
    pub context_size: u32,
    /// CPU threads (-t flag).
    #[serde(default = "default_threads")]
    pub threads: u32,
    /// Number of layers to offload to GPU (-ngl flag).
    #[serde(default)]
    pub gpu_layers: Option<u32>,
    /// Extra arguments appended AFTER the standard llama-server flags.
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
    /// Upper bound for a single generation call.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Forward llama-server stderr to our stderr (default: false).
    #[serde(default)]
    pub log_server_output: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: None,
            alias: default_alias(),
            server_binary: default_server_binary(),
            server_args: Vec::new(),
            context_size: default_context_size(),
            threads: default_threads(),
            gpu_layers: None,
            extra_args: Vec::new(),
            startup_timeout_secs: default_startup_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_secs: default_request_timeout(),
            log_server_output: false,
        }
    }
}

/// Generation worker settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Jobs that may wait for the worker before senders are held back.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_depth: default_queue_depth(),
        }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_alias() -> String {
    DEFAULT_MODEL_ALIAS.to_string()
}
fn default_server_binary() -> String {
    "llama-server".to_string()
}
fn default_context_size() -> u32 {
    2048
}
fn default_threads() -> u32 {
    4
}
fn default_startup_timeout() -> u64 {
    120
}
fn default_shutdown_timeout() -> u64 {
    10
}
fn default_request_timeout() -> u64 {
    600
}
fn default_queue_depth() -> usize {
    64
}

impl Config {
    /// Load configuration from file, environment variables and flags.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Command line flags
    /// 2. Environment variables (GATEWAY__SECTION__KEY format)
    /// 3. The file named by `--config`, or config.toml if present
    /// 4. Built-in defaults
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match cli.config.as_deref() {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name("config").required(false),
        };

        let config = ConfigLoader::builder()
            .set_default("api.host", default_host())?
            .set_default("api.port", default_port() as i64)?
            .set_default("model.alias", default_alias())?
            .set_default("worker.queue_depth", default_queue_depth() as i64)?
            .add_source(file)
            .add_source(
                Environment::with_prefix("GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("api.host", cli.host.clone())?
            .set_override_option("api.port", cli.port.map(i64::from))?
            .set_override_option("model.path", cli.model.clone())?
            .set_override_option("model.threads", cli.threads.map(i64::from))?
            .set_override_option("model.context_size", cli.ctx_size.map(i64::from))?
            .build()?;

        config.try_deserialize()
    }

    /// Address the HTTP listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
