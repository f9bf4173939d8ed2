//! Llama Gateway - serves one local model over HTTP.
//!
//! HTTP handlers never touch the model directly: every generation, load and
//! unload is queued on a single [`engine::ModelWorker`] thread, so at most
//! one of them runs at any time.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod state;

pub use config::{Cli, Config};
pub use engine::{LlamaServerLoader, ModelInvoker, ModelLoader, ModelWorker};
pub use error::{Error, Result};
pub use state::AppState;
