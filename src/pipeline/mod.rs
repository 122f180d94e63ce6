//! Recognition pipeline.
//!
//! Drives one image at a time through a lazily created OCR engine and
//! publishes progress, result text and errors through a watch channel.
//!
//! State per pipeline:
//! - `Uninitialized` until an engine handle exists
//! - `Ready` while a handle exists and no call is running
//! - `Busy` while a recognition or an engine start-up runs
//!
//! Only one recognition may run at a time; an overlapping call fails fast
//! with `PipelineError::Busy` rather than queueing.

mod progress;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{watch, Mutex};

use crate::config::Config;
use crate::ocr::{
    create_backend, EngineHandle, EngineOptions, OcrBackend, OcrError, OcrResult, ProgressLogger,
};
use crate::payload::ImagePayload;

pub use progress::{
    ProgressState, DONE_LABEL, IDLE_LABEL, INITIAL_LABEL, PROCESSING_LABEL, STARTING_LABEL,
};

/// Errors surfaced by the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The engine or its model data failed to load.
    #[error("OCR engine failed to initialize: {0}")]
    EngineInit(#[source] OcrError),

    /// A single recognition failed; the engine remains usable.
    #[error("Recognition failed: {0}")]
    Recognition(#[source] OcrError),

    /// Another recognition is still running.
    #[error("A recognition is already in progress")]
    Busy,
}

/// Lifecycle state of the pipeline's engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    #[default]
    Uninitialized,
    Ready,
    Busy,
}

/// Everything an observer needs to render the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineSnapshot {
    pub state: PipelineState,
    pub progress: ProgressState,
    /// Most recent recognized text, or empty.
    pub text: String,
    /// Most recent failure, cleared when the next call starts.
    pub error: Option<String>,
}

type Slot = Option<Box<dyn EngineHandle>>;

/// Stateful wrapper around one lazily created engine handle.
pub struct RecognitionPipeline {
    backend: Arc<dyn OcrBackend>,
    options: EngineOptions,
    timeout: Option<Duration>,
    slot: Mutex<Slot>,
    status: Arc<watch::Sender<PipelineSnapshot>>,
    /// Bumped whenever an engine is abandoned; its progress events are dropped from then on.
    generation: Arc<AtomicU64>,
}

impl RecognitionPipeline {
    /// Create a pipeline. No engine is started until one is needed.
    pub fn new(backend: Arc<dyn OcrBackend>, options: EngineOptions) -> Self {
        let (status, _) = watch::channel(PipelineSnapshot::default());
        Self {
            backend,
            options,
            timeout: None,
            slot: Mutex::new(None),
            status: Arc::new(status),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a pipeline for the backend, language and timeout in `config`.
    pub fn from_config(config: &Config) -> Result<Self, OcrError> {
        let options = config.engine_options();
        let backend = create_backend(&config.ocr.backend, &options)?;
        let timeout = Duration::from_secs(config.ocr.timeout_secs);
        Ok(Self::new(backend, options).with_timeout(Some(timeout)))
    }

    /// Abandon recognitions that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn backend(&self) -> &dyn OcrBackend {
        self.backend.as_ref()
    }

    /// Watch every change to the pipeline's observable state.
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.status.subscribe()
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> PipelineState {
        self.status.borrow().state
    }

    pub fn progress(&self) -> ProgressState {
        self.status.borrow().progress.clone()
    }

    pub fn result_text(&self) -> String {
        self.status.borrow().text.clone()
    }

    /// Start the engine if it is not running yet. Idempotent.
    ///
    /// Callers choose when to pay the start-up cost: eagerly (at start-up)
    /// or lazily (on first use, which `recognize` does by itself).
    pub async fn ensure_ready(&self) -> Result<(), PipelineError> {
        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            return Ok(());
        }

        self.status.send_modify(|s| s.state = PipelineState::Busy);
        let guard = BusyGuard::new(self, "engine start-up");

        match self.create_engine().await {
            Ok(engine) => {
                *slot = Some(engine);
                guard.complete(|s| s.state = PipelineState::Ready);
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.abandon_engine();
                guard.complete(|s| {
                    s.state = PipelineState::Uninitialized;
                    s.error = Some(message);
                });
                Err(e)
            }
        }
    }

    /// Recognize text in one image.
    ///
    /// Resets progress, starts the engine if needed and waits for the
    /// engine to finish. On success the result text is replaced; on
    /// failure it is left untouched and the error is recorded.
    pub async fn recognize(&self, image: &ImagePayload) -> Result<OcrResult, PipelineError> {
        let mut slot = self.slot.try_lock().map_err(|_| {
            tracing::debug!("Rejecting recognition: pipeline busy");
            PipelineError::Busy
        })?;

        self.status.send_modify(|s| {
            s.state = PipelineState::Busy;
            s.progress = ProgressState::starting();
            s.error = None;
        });
        let guard = BusyGuard::new(self, "recognition");

        let mut engine = match slot.take() {
            Some(engine) => engine,
            None => match self.create_engine().await {
                Ok(engine) => engine,
                Err(e) => {
                    let message = e.to_string();
                    self.abandon_engine();
                    guard.complete(|s| {
                        s.state = PipelineState::Uninitialized;
                        s.error = Some(message);
                    });
                    return Err(e);
                }
            },
        };

        tracing::debug!("Recognizing {} byte {} image", image.len(), image.mime());
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, engine.recognize(image))
                .await
                .map_err(|_| limit),
            None => Ok(engine.recognize(image).await),
        };

        match outcome {
            Ok(Ok(result)) => {
                *slot = Some(engine);
                tracing::info!(
                    "Recognized {} characters with {} in {}ms",
                    result.text.chars().count(),
                    result.backend,
                    result.processing_time_ms
                );
                let text = result.text.clone();
                guard.complete(|s| {
                    s.state = PipelineState::Ready;
                    s.text = text;
                });
                Ok(result)
            }
            Ok(Err(e)) => {
                *slot = Some(engine);
                let err = PipelineError::Recognition(e);
                tracing::warn!("{}", err);
                let message = err.to_string();
                guard.complete(|s| {
                    s.state = PipelineState::Ready;
                    s.error = Some(message);
                });
                Err(err)
            }
            Err(limit) => {
                // The engine may still be mid-call; start over with a fresh one
                self.abandon_engine();
                engine.terminate().await;
                let err = PipelineError::Recognition(OcrError::OcrFailed(format!(
                    "timed out after {}s",
                    limit.as_secs_f64()
                )));
                tracing::warn!("{}", err);
                let message = err.to_string();
                guard.complete(|s| {
                    s.state = PipelineState::Uninitialized;
                    s.error = Some(message);
                });
                Err(err)
            }
        }
    }

    /// Release the engine. Idempotent; waits for a running recognition.
    pub async fn teardown(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(engine) = slot.take() {
            tracing::info!("Terminating {} engine", self.backend.backend_type());
            self.abandon_engine();
            engine.terminate().await;
        }
        self.status.send_modify(|s| {
            s.state = PipelineState::Uninitialized;
            s.progress.indeterminate = false;
        });
    }

    async fn create_engine(&self) -> Result<Box<dyn EngineHandle>, PipelineError> {
        tracing::info!(
            "Initializing {} engine (language {})",
            self.backend.backend_type(),
            self.options.language
        );
        self.status.send_modify(|s| s.progress.indeterminate = true);

        self.backend
            .create_engine(&self.options, self.progress_logger())
            .await
            .map_err(|e| {
                tracing::error!("OCR engine failed to initialize: {}", e);
                PipelineError::EngineInit(e)
            })
    }

    /// Callback handed to the engine; folds its events into the snapshot.
    ///
    /// Events are only applied while a call is running and only for the
    /// engine generation the logger was created for.
    fn progress_logger(&self) -> ProgressLogger {
        let status = self.status.clone();
        let generation = self.generation.clone();
        let created_for = generation.load(Ordering::SeqCst);
        ProgressLogger::new(move |event| {
            status.send_if_modified(|s| {
                if generation.load(Ordering::SeqCst) != created_for
                    || s.state != PipelineState::Busy
                {
                    tracing::debug!(?event, "Dropping progress from inactive engine");
                    return false;
                }
                tracing::trace!(?event, "engine progress");
                s.progress.apply(&event)
            });
        })
    }

    /// Disown the current engine's progress logger.
    fn abandon_engine(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for RecognitionPipeline {
    fn drop(&mut self) {
        self.abandon_engine();
        if self.slot.get_mut().take().is_some() {
            tracing::debug!("Released {} engine on drop", self.backend.backend_type());
        }
    }
}

/// Restores a consistent state if a busy future is dropped mid-call.
///
/// The engine handle is owned by the dropped future at that point and is
/// released with it, so the pipeline falls back to `Uninitialized` and
/// stops listening to that engine.
struct BusyGuard {
    status: Arc<watch::Sender<PipelineSnapshot>>,
    generation: Arc<AtomicU64>,
    operation: &'static str,
    armed: bool,
}

impl BusyGuard {
    fn new(pipeline: &RecognitionPipeline, operation: &'static str) -> Self {
        Self {
            status: pipeline.status.clone(),
            generation: pipeline.generation.clone(),
            operation,
            armed: true,
        }
    }

    fn complete(mut self, f: impl FnOnce(&mut PipelineSnapshot)) {
        self.armed = false;
        self.status.send_modify(|s| {
            s.progress.indeterminate = false;
            f(s);
        });
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("{} cancelled before completion", self.operation);
            self.generation.fetch_add(1, Ordering::SeqCst);
            let message = format!("{} was cancelled", self.operation);
            self.status.send_modify(|s| {
                s.state = PipelineState::Uninitialized;
                s.progress.indeterminate = false;
                s.error = Some(message);
            });
        }
    }
}
