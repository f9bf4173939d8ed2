//! Shared application state.

use crate::config::Config;
use crate::engine::ModelWorker;

/// Shared application state passed to all handlers.
///
/// The model itself is not reachable from here; handlers submit jobs to
/// the worker, which owns it.
pub struct AppState {
    pub config: Config,
    pub worker: ModelWorker,
}

impl AppState {
    pub fn new(config: Config, worker: ModelWorker) -> Self {
        Self { config, worker }
    }

    /// Name reported in the `model` field of responses.
    pub fn model_alias(&self) -> &str {
        &self.config.model.alias
    }
}
