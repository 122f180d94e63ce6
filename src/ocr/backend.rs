//! OCR engine boundary.
//!
//! A backend knows how to construct an engine; an engine handle owns the
//! loaded engine resources and recognizes one image at a time:
//! - `OcrBackend::create_engine` loads language/model data and returns a handle
//! - `EngineHandle::recognize` runs OCR on one image payload
//! - `EngineHandle::terminate` releases the engine
//!
//! Engines report progress through a `ProgressLogger` registered at creation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;

use crate::payload::ImagePayload;

/// Errors from OCR backends.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("Unknown OCR backend: {0}")]
    UnknownBackend(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(String),
}

/// Result of OCR processing.
#[derive(Debug, Clone)]
pub struct OcrResult {
    /// Recognized text content (may be empty).
    pub text: String,
    /// Confidence score (0.0 - 1.0), if available.
    pub confidence: Option<f32>,
    /// Which backend produced this result.
    pub backend: OcrBackendType,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

impl OcrResult {
    /// Build a result from text, stamping the elapsed time since `start`.
    pub fn timed(text: String, backend: OcrBackendType, start: Instant) -> Self {
        Self {
            text,
            confidence: None,
            backend,
            processing_time_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Available OCR backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OcrBackendType {
    /// Tesseract OCR via command-line.
    Tesseract,
    /// Pure Rust OCR engine (ocrs crate).
    Ocrs,
    /// Engine supplied by the embedding application (tests, custom engines).
    Custom,
}

impl OcrBackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrBackendType::Tesseract => "tesseract",
            OcrBackendType::Ocrs => "ocrs",
            OcrBackendType::Custom => "custom",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tesseract" => Some(OcrBackendType::Tesseract),
            "ocrs" => Some(OcrBackendType::Ocrs),
            _ => None,
        }
    }
}

impl std::fmt::Display for OcrBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A progress message emitted by an engine.
///
/// Mirrors what engines actually report: a status line, a completion
/// fraction, or both. Messages without a fraction are informational only.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Engine-defined status, e.g. "recognizing text".
    pub status: Option<String>,
    /// Completion of the current engine step, nominally in [0, 1].
    pub progress: Option<f64>,
}

impl ProgressEvent {
    /// A status update carrying a completion fraction.
    pub fn new(status: impl Into<String>, progress: f64) -> Self {
        Self {
            status: Some(status.into()),
            progress: Some(progress),
        }
    }

    /// A completion fraction with no status text.
    pub fn fraction(progress: f64) -> Self {
        Self {
            status: None,
            progress: Some(progress),
        }
    }

    /// A status line with no completion fraction.
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            progress: None,
        }
    }
}

/// Callback registered with an engine at creation time.
///
/// Cloneable so engines can hand it to blocking workers. Events are
/// delivered synchronously, in the order the engine emits them.
#[derive(Clone)]
pub struct ProgressLogger(Arc<dyn Fn(ProgressEvent) + Send + Sync>);

impl ProgressLogger {
    pub fn new(f: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// A logger that discards every event.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn log(&self, event: ProgressEvent) {
        (self.0)(event)
    }
}

impl std::fmt::Debug for ProgressLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProgressLogger")
    }
}

/// Options an engine is created with.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Language for OCR (e.g., "eng", "chi_sim", "eng+deu").
    pub language: String,
    /// Number of worker threads the engine may use.
    pub workers: usize,
    /// Path to model files (for backends that need them).
    pub model_path: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            workers: 1,
            model_path: None,
        }
    }
}

/// Trait for OCR backends (engine factories).
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Get the backend type.
    fn backend_type(&self) -> OcrBackendType;

    /// Check if this backend is available (dependencies installed, models present).
    fn is_available(&self) -> bool;

    /// Get a description of what's needed to make this backend available.
    fn availability_hint(&self) -> String;

    /// Construct an engine, loading whatever language/model data it needs.
    ///
    /// `logger` receives progress for the whole lifetime of the handle,
    /// including while the engine is being constructed.
    async fn create_engine(
        &self,
        options: &EngineOptions,
        logger: ProgressLogger,
    ) -> Result<Box<dyn EngineHandle>, OcrError>;
}

/// A live, initialized OCR engine.
#[async_trait]
pub trait EngineHandle: Send {
    /// Recognize text in one image. Suspends until the engine finishes.
    async fn recognize(&mut self, image: &ImagePayload) -> Result<OcrResult, OcrError>;

    /// Release the engine's resources.
    async fn terminate(self: Box<Self>);
}
