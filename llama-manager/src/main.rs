//! llama-manager command line interface.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use llama_manager::LlamaManager;

/// Token budget used by the `completion` command.
const COMPLETION_MAX_TOKENS: u32 = 100;

#[derive(Debug, Parser)]
#[command(
    name = "llama-manager",
    version,
    about = "Manage a llama server over HTTP",
    after_help = "The server URL is taken from LLAMA_CPP_SERVER (default http://llama-cpp:8080)."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check server health (exit 0 when up, 1 when down)
    Health,
    /// Get server properties
    Props,
    /// List loaded models
    Models,
    /// Load model
    Load {
        /// Path of the model file
        path: String,
    },
    /// Unload model
    Unload,
    /// Generate completion
    Completion {
        /// Prompt words, joined with spaces
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs (including retry notices) go to stderr; stdout carries only JSON.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let manager = LlamaManager::from_env();
    tracing::debug!("Using server {}", manager.base_url());

    match run(&manager, cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    manager: &LlamaManager,
    command: Command,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let result = match command {
        Command::Health => {
            let healthy = manager.health().await;
            print_json(&json!({ "healthy": healthy }))?;
            return Ok(if healthy {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }
        Command::Props => manager.props().await?,
        Command::Models => manager.models().await?,
        Command::Load { path } => manager.load_model(&path).await?,
        Command::Unload => manager.unload_model().await?,
        Command::Completion { prompt } => {
            let mut options = Map::new();
            options.insert("max_tokens".to_string(), json!(COMPLETION_MAX_TOKENS));
            manager.completion(&prompt.join(" "), options).await?
        }
    };

    print_json(&result)?;
    Ok(ExitCode::SUCCESS)
}

fn print_json(value: &Value) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
