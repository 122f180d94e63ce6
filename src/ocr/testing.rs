//! Scripted OCR engine for unit tests.
//!
//! "Recognizes" a payload by echoing its bytes as text. Payloads that are
//! empty or start with `corrupt` are rejected the way a real engine would.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::backend::{
    EngineHandle, EngineOptions, OcrBackend, OcrBackendType, OcrError, OcrResult, ProgressEvent,
    ProgressLogger,
};
use crate::payload::ImagePayload;

#[derive(Default)]
pub(crate) struct ScriptState {
    created: AtomicUsize,
    terminated: AtomicUsize,
    released: AtomicUsize,
    fail_init: AtomicBool,
    delay_ms: AtomicU64,
    init_delay_ms: AtomicU64,
    linger_ms: AtomicU64,
    events: Mutex<Vec<ProgressEvent>>,
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedBackend {
    state: Arc<ScriptState>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engines constructed so far.
    pub fn created(&self) -> usize {
        self.state.created.load(Ordering::SeqCst)
    }

    /// Engines explicitly terminated.
    pub fn terminated(&self) -> usize {
        self.state.terminated.load(Ordering::SeqCst)
    }

    /// Engines dropped, whether terminated or not.
    pub fn released(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    pub fn fail_init(&self, fail: bool) {
        self.state.fail_init.store(fail, Ordering::SeqCst);
    }

    /// Hold every recognition for `delay` before answering.
    pub fn delay(&self, delay: Duration) {
        self.state
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Hold every engine construction for `delay`.
    pub fn init_delay(&self, delay: Duration) {
        self.state
            .init_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Run each recognition on a blocking worker that reports 0.3, sleeps
    /// for `linger` and then reports 1.0, even if the call was abandoned.
    pub fn linger(&self, linger: Duration) {
        self.state
            .linger_ms
            .store(linger.as_millis() as u64, Ordering::SeqCst);
    }

    /// Progress events emitted before each answer.
    pub fn emit(&self, events: Vec<ProgressEvent>) {
        *self.state.events.lock().unwrap() = events;
    }
}

#[async_trait]
impl OcrBackend for ScriptedBackend {
    fn backend_type(&self) -> OcrBackendType {
        OcrBackendType::Custom
    }

    fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        "Scripted engine is always available".to_string()
    }

    async fn create_engine(
        &self,
        _options: &EngineOptions,
        logger: ProgressLogger,
    ) -> Result<Box<dyn EngineHandle>, OcrError> {
        logger.log(ProgressEvent::status("loading scripted engine"));
        let init_delay = self.state.init_delay_ms.load(Ordering::SeqCst);
        if init_delay > 0 {
            tokio::time::sleep(Duration::from_millis(init_delay)).await;
        }
        if self.state.fail_init.load(Ordering::SeqCst) {
            return Err(OcrError::ModelNotFound("scripted model missing".to_string()));
        }
        self.state.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedEngine {
            state: self.state.clone(),
            logger,
        }))
    }
}

struct ScriptedEngine {
    state: Arc<ScriptState>,
    logger: ProgressLogger,
}

#[async_trait]
impl EngineHandle for ScriptedEngine {
    async fn recognize(&mut self, image: &ImagePayload) -> Result<OcrResult, OcrError> {
        let events = self.state.events.lock().unwrap().clone();
        for event in events {
            self.logger.log(event);
        }

        let linger = self.state.linger_ms.load(Ordering::SeqCst);
        if linger > 0 {
            let logger = self.logger.clone();
            let worker = tokio::task::spawn_blocking(move || {
                logger.log(ProgressEvent::new("recognizing text", 0.3));
                std::thread::sleep(Duration::from_millis(linger));
                logger.log(ProgressEvent::new("recognizing text", 1.0));
            });
            let _ = worker.await;
        }

        let delay = self.state.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if image.is_empty() {
            return Err(OcrError::ImageError("empty image payload".to_string()));
        }
        if image.bytes().starts_with(b"corrupt") {
            return Err(OcrError::OcrFailed("corrupt image".to_string()));
        }

        self.logger.log(ProgressEvent::new("recognizing text", 1.0));
        Ok(OcrResult {
            text: format!("{}\n", String::from_utf8_lossy(image.bytes())),
            confidence: Some(0.9),
            backend: OcrBackendType::Custom,
            processing_time_ms: 0,
        })
    }

    async fn terminate(self: Box<Self>) {
        self.state.terminated.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for ScriptedEngine {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}
