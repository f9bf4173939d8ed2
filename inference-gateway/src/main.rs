//! Llama Gateway binary.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use inference_gateway::{api, AppState, Cli, Config, LlamaServerLoader, ModelWorker};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(&cli).map_err(|e| {
        format!(
            "Failed to load configuration: {}. \
             Check config.toml or the GATEWAY__SECTION__KEY environment variables.",
            e
        )
    })?;

    let loader = Arc::new(LlamaServerLoader::new(config.model.clone()));
    let worker = ModelWorker::spawn(loader, config.worker.queue_depth)?;

    // The model is loaded before the listener binds; failure is fatal.
    match config.model.path {
        Some(ref path) => worker
            .load(path)
            .await
            .map_err(|e| format!("Failed to load model {}: {}", path, e))?,
        None => tracing::warn!(
            "No model configured, /api/generate answers \"Model not loaded\" until POST /load"
        ),
    }

    let state = Arc::new(AppState::new(config.clone(), worker.clone()));
    let app = api::router(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Llama gateway listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("API endpoint: POST http://{}/api/generate", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down server...");
    worker.unload().await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
