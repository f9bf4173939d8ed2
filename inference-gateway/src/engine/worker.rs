//! Single-consumer generation worker.
//!
//! All jobs that touch the model (generate, load, unload) are queued on one
//! channel and executed in order by a dedicated OS thread that owns the
//! invoker. HTTP handlers only ever talk to the [`ModelWorker`] handle.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use gateway_common::GenerationRequest;
use tokio::sync::{mpsc, oneshot, watch};

use super::{ModelInvoker, ModelLoader};
use crate::error::{Error, Result};

/// Model currently owned by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModel {
    pub path: String,
}

enum Job {
    Generate {
        request: GenerationRequest,
        reply: oneshot::Sender<Result<Option<String>>>,
    },
    Load {
        path: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Unload {
        reply: oneshot::Sender<bool>,
    },
}

/// Handle to the generation worker. Cheap to clone.
#[derive(Clone)]
pub struct ModelWorker {
    jobs: mpsc::Sender<Job>,
    loaded: watch::Receiver<Option<LoadedModel>>,
}

impl ModelWorker {
    /// Start the worker thread with no model loaded.
    pub fn spawn(loader: Arc<dyn ModelLoader>, queue_depth: usize) -> std::io::Result<Self> {
        let (jobs_tx, jobs_rx) = mpsc::channel(queue_depth.max(1));
        let (loaded_tx, loaded_rx) = watch::channel(None);

        let worker = WorkerLoop {
            loader,
            invoker: None,
            loaded: loaded_tx,
        };
        thread::Builder::new()
            .name("model-worker".to_string())
            .spawn(move || worker.run(jobs_rx))?;

        Ok(Self {
            jobs: jobs_tx,
            loaded: loaded_rx,
        })
    }

    /// Queue a generation. Returns `Ok(None)` when no model is loaded.
    pub async fn generate(&self, request: GenerationRequest) -> Result<Option<String>> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Generate { request, reply }).await?;
        rx.await.map_err(|_| Error::WorkerUnavailable)?
    }

    /// Replace the current model with the one at `path`.
    ///
    /// The old model is released before the new one loads, so a failed load
    /// leaves the gateway without a model.
    pub async fn load(&self, path: &str) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Load {
            path: path.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| Error::WorkerUnavailable)?
    }

    /// Release the current model. Returns whether one was loaded.
    pub async fn unload(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::Unload { reply }).await?;
        rx.await.map_err(|_| Error::WorkerUnavailable)
    }

    /// The model loaded right now. Does not wait behind queued jobs.
    pub fn loaded_model(&self) -> Option<LoadedModel> {
        self.loaded.borrow().clone()
    }

    async fn submit(&self, job: Job) -> Result<()> {
        self.jobs
            .send(job)
            .await
            .map_err(|_| Error::WorkerUnavailable)
    }
}

struct WorkerLoop {
    loader: Arc<dyn ModelLoader>,
    invoker: Option<Box<dyn ModelInvoker>>,
    loaded: watch::Sender<Option<LoadedModel>>,
}

impl WorkerLoop {
    fn run(mut self, mut jobs: mpsc::Receiver<Job>) {
        tracing::debug!("Model worker started");

        while let Some(job) = jobs.blocking_recv() {
            match job {
                Job::Generate { request, reply } => {
                    let result = self.generate(&request);
                    if reply.send(result).is_err() {
                        tracing::debug!("Caller went away during generation, result discarded");
                    }
                }
                Job::Load { path, reply } => {
                    let _ = reply.send(self.load(path));
                }
                Job::Unload { reply } => {
                    let _ = reply.send(self.unload());
                }
            }
        }

        tracing::debug!("Model worker stopped");
    }

    fn generate(&mut self, request: &GenerationRequest) -> Result<Option<String>> {
        let Some(invoker) = self.invoker.as_mut() else {
            return Ok(None);
        };

        let start = Instant::now();
        match panic::catch_unwind(AssertUnwindSafe(|| invoker.generate(request))) {
            Ok(result) => {
                let text = result?;
                tracing::debug!(
                    prompt_chars = request.prompt.len(),
                    duration_ms = %start.elapsed().as_millis(),
                    "Generation finished"
                );
                Ok(Some(text))
            }
            Err(_) => {
                // The invoker may be left in any state; drop it.
                tracing::error!("Model invoker panicked, unloading model");
                self.invoker = None;
                self.loaded.send_replace(None);
                Err(Error::InferenceFailed("model invoker panicked".to_string()))
            }
        }
    }

    fn load(&mut self, path: String) -> Result<()> {
        if self.unload() {
            tracing::info!("Released previous model before loading {}", path);
        }

        tracing::info!("Loading model: {}", path);
        let start = Instant::now();
        let invoker = match panic::catch_unwind(AssertUnwindSafe(|| self.loader.load(&path))) {
            Ok(result) => result?,
            Err(_) => {
                tracing::error!("Model loader panicked while loading {}", path);
                return Err(Error::LoadFailed(format!("loader panicked for {}", path)));
            }
        };
        self.invoker = Some(invoker);
        tracing::info!("Model loaded successfully: {} ({:?})", path, start.elapsed());
        self.loaded.send_replace(Some(LoadedModel { path }));
        Ok(())
    }

    fn unload(&mut self) -> bool {
        self.loaded.send_replace(None);
        match self.invoker.take() {
            Some(invoker) => {
                drop(invoker);
                tracing::info!("Model unloaded");
                true
            }
            None => false,
        }
    }
}
