//! Model invocation layer.
//!
//! The gateway treats a model as an opaque, synchronous capability behind
//! [`ModelInvoker`]. Invokers are produced by a [`ModelLoader`] and owned
//! exclusively by the [`ModelWorker`] thread, which runs every job that
//! touches them one at a time.

mod llama_server;
mod worker;

pub use llama_server::{LlamaServerInvoker, LlamaServerLoader};
pub use worker::{LoadedModel, ModelWorker};

use gateway_common::GenerationRequest;

use crate::error::Result;

/// A loaded model that turns a prompt into text.
///
/// Calls block for the whole generation. Implementations need not be
/// reentrant: the worker never calls `generate` concurrently.
pub trait ModelInvoker: Send {
    /// Generate text for `request.prompt`, honouring its token budget,
    /// temperature and stop sequences. The returned text is untrimmed.
    fn generate(&mut self, request: &GenerationRequest) -> Result<String>;
}

/// Produces invokers from model file paths.
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &str) -> Result<Box<dyn ModelInvoker>>;
}
