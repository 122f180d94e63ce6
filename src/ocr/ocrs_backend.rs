//! OCRS OCR backend implementation.
//!
//! Uses the ocrs crate for pure-Rust OCR without external dependencies.
//! This is a lightweight, CPU-based OCR engine that only reads Latin script;
//! the configured language is ignored.
//!
//! Models are automatically downloaded on first use from:
//! https://ocrs-models.s3-accelerate.amazonaws.com/

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::backend::{
    EngineHandle, EngineOptions, OcrBackend, OcrBackendType, OcrError, OcrResult, ProgressEvent,
    ProgressLogger,
};
use super::model_utils::{ensure_models_present, model_availability_hint, ModelDirConfig, ModelSpec};
use crate::payload::ImagePayload;

/// Model directory configuration for OCRS.
const MODEL_CONFIG: ModelDirConfig = ModelDirConfig {
    subdir: "ocrs",
    required_files: &["text-detection.rten", "text-recognition.rten"],
};

const DETECTION_MODEL: ModelSpec = ModelSpec {
    url: "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten",
    filename: "text-detection.rten",
    size_hint: "2.5 MB",
};

const RECOGNITION_MODEL: ModelSpec = ModelSpec {
    url: "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten",
    filename: "text-recognition.rten",
    size_hint: "10 MB",
};

/// OCRS OCR backend (pure Rust).
#[derive(Default)]
pub struct OcrsBackend {
    model_path: Option<PathBuf>,
}

impl OcrsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look for models in a specific directory first.
    pub fn with_model_path(model_path: Option<PathBuf>) -> Self {
        Self { model_path }
    }
}

/// Load both models and build an engine. Blocking.
fn load_engine(model_path: Option<&PathBuf>, logger: &ProgressLogger) -> Result<ocrs::OcrEngine, OcrError> {
    logger.log(ProgressEvent::status("locating models"));
    let model_dir = ensure_models_present(
        model_path,
        &MODEL_CONFIG,
        &[&DETECTION_MODEL, &RECOGNITION_MODEL],
    )?;

    logger.log(ProgressEvent::status("loading detection model"));
    let detection_model = rten::Model::load_file(model_dir.join(DETECTION_MODEL.filename))
        .map_err(|e| OcrError::ModelNotFound(format!("Failed to load detection model: {}", e)))?;

    logger.log(ProgressEvent::status("loading recognition model"));
    let recognition_model = rten::Model::load_file(model_dir.join(RECOGNITION_MODEL.filename))
        .map_err(|e| OcrError::ModelNotFound(format!("Failed to load recognition model: {}", e)))?;

    ocrs::OcrEngine::new(ocrs::OcrEngineParams {
        detection_model: Some(detection_model),
        recognition_model: Some(recognition_model),
        ..Default::default()
    })
    .map_err(|e| OcrError::OcrFailed(format!("Failed to create OCR engine: {}", e)))
}

/// Run the staged ocrs pipeline, reporting each stage. Blocking.
fn run_ocrs(engine: &ocrs::OcrEngine, bytes: &[u8], logger: &ProgressLogger) -> Result<String, OcrError> {
    logger.log(ProgressEvent::new("decoding image", 0.0));
    let img = image::load_from_memory(bytes)
        .map_err(|e| OcrError::ImageError(format!("Failed to decode image: {}", e)))?
        .into_rgb8();
    let (width, height) = img.dimensions();

    let source = ocrs::ImageSource::from_bytes(img.as_raw(), (width, height))
        .map_err(|e| OcrError::ImageError(format!("Failed to convert image: {}", e)))?;
    let input = engine
        .prepare_input(source)
        .map_err(|e| OcrError::OcrFailed(format!("Failed to prepare input: {}", e)))?;

    logger.log(ProgressEvent::new("detecting text", 0.25));
    let words = engine
        .detect_words(&input)
        .map_err(|e| OcrError::OcrFailed(format!("Text detection failed: {}", e)))?;

    logger.log(ProgressEvent::new("analyzing layout", 0.5));
    let lines = engine.find_text_lines(&input, &words);

    logger.log(ProgressEvent::new("recognizing text", 0.75));
    let recognized = engine
        .recognize_text(&input, &lines)
        .map_err(|e| OcrError::OcrFailed(format!("Text recognition failed: {}", e)))?;

    let text = recognized
        .iter()
        .flatten()
        .map(|line| line.to_string())
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    logger.log(ProgressEvent::new("recognizing text", 1.0));
    Ok(text)
}

#[async_trait]
impl OcrBackend for OcrsBackend {
    fn backend_type(&self) -> OcrBackendType {
        OcrBackendType::Ocrs
    }

    fn is_available(&self) -> bool {
        // Always available - models will be auto-downloaded on first use
        true
    }

    fn availability_hint(&self) -> String {
        model_availability_hint(self.model_path.as_ref(), &MODEL_CONFIG, "OCRS", "12 MB")
    }

    async fn create_engine(
        &self,
        options: &EngineOptions,
        logger: ProgressLogger,
    ) -> Result<Box<dyn EngineHandle>, OcrError> {
        let model_path = options.model_path.clone().or_else(|| self.model_path.clone());
        let init_logger = logger.clone();

        let engine = tokio::task::spawn_blocking(move || load_engine(model_path.as_ref(), &init_logger))
            .await
            .map_err(|e| OcrError::OcrFailed(format!("OCRS engine task failed: {}", e)))??;

        Ok(Box::new(OcrsEngine {
            engine: Arc::new(engine),
            logger,
        }))
    }
}

/// Loaded ocrs models, shared with blocking recognition tasks.
struct OcrsEngine {
    engine: Arc<ocrs::OcrEngine>,
    logger: ProgressLogger,
}

#[async_trait]
impl EngineHandle for OcrsEngine {
    async fn recognize(&mut self, image: &ImagePayload) -> Result<OcrResult, OcrError> {
        if image.is_empty() {
            return Err(OcrError::ImageError("empty image payload".to_string()));
        }

        let start = Instant::now();
        let engine = self.engine.clone();
        let logger = self.logger.clone();
        let image = image.clone();

        let text = tokio::task::spawn_blocking(move || run_ocrs(&engine, image.bytes(), &logger))
            .await
            .map_err(|e| OcrError::OcrFailed(format!("OCRS task failed: {}", e)))??;

        Ok(OcrResult::timed(text, OcrBackendType::Ocrs, start))
    }

    async fn terminate(self: Box<Self>) {
        tracing::debug!("Releasing OCRS models");
    }
}
