//! Tesseract OCR backend implementation.
//!
//! Uses Tesseract OCR via command-line for text extraction.
//! This is the traditional, widely-available OCR option.

use std::collections::HashSet;
use std::io::Write;
use std::time::Instant;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;

use super::backend::{
    EngineHandle, EngineOptions, OcrBackend, OcrBackendType, OcrError, OcrResult, ProgressEvent,
    ProgressLogger,
};
use super::model_utils::check_binary;
use crate::payload::ImagePayload;

const RECOGNIZING: &str = "recognizing text";

/// Tesseract OCR backend.
pub struct TesseractBackend {
    binary: String,
}

impl TesseractBackend {
    /// Create a backend that runs `tesseract` from PATH.
    pub fn new() -> Self {
        Self::with_binary("tesseract")
    }

    /// Create a backend that runs a specific tesseract executable.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// List the language models tesseract has installed.
    async fn installed_languages(&self) -> Result<HashSet<String>, OcrError> {
        let output = Command::new(&self.binary)
            .arg("--list-langs")
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::OcrFailed(format!(
                "tesseract --list-langs failed: {}",
                stderr
            )));
        }

        // Older releases print the list on stderr
        let mut listing = String::from_utf8_lossy(&output.stdout).to_string();
        listing.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(parse_language_list(&listing))
    }

    fn spawn_error(&self, e: std::io::Error) -> OcrError {
        if e.kind() == std::io::ErrorKind::NotFound {
            OcrError::BackendNotAvailable(format!(
                "{} not found (install tesseract-ocr)",
                self.binary
            ))
        } else {
            OcrError::Io(e)
        }
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `tesseract --list-langs` output into language codes.
fn parse_language_list(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of"))
        .filter(|line| !line.contains(' '))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl OcrBackend for TesseractBackend {
    fn backend_type(&self) -> OcrBackendType {
        OcrBackendType::Tesseract
    }

    fn is_available(&self) -> bool {
        check_binary(&self.binary)
    }

    fn availability_hint(&self) -> String {
        if !check_binary(&self.binary) {
            "Tesseract not installed. Install with: apt install tesseract-ocr".to_string()
        } else {
            "Tesseract is available".to_string()
        }
    }

    async fn create_engine(
        &self,
        options: &EngineOptions,
        logger: ProgressLogger,
    ) -> Result<Box<dyn EngineHandle>, OcrError> {
        logger.log(ProgressEvent::status("loading tesseract core"));
        if !self.is_available() {
            return Err(OcrError::BackendNotAvailable(self.availability_hint()));
        }

        logger.log(ProgressEvent::status("loading language traineddata"));
        let installed = self.installed_languages().await?;
        for lang in options.language.split('+') {
            if !installed.contains(lang) {
                return Err(OcrError::ModelNotFound(format!(
                    "tesseract language data '{}' is not installed (apt install tesseract-ocr-{})",
                    lang, lang
                )));
            }
        }

        let scratch = TempDir::new()?;
        tracing::debug!(
            "Tesseract engine ready (language {}, {} workers)",
            options.language,
            options.workers
        );
        logger.log(ProgressEvent::status("initialized api"));

        Ok(Box::new(TesseractEngine {
            binary: self.binary.clone(),
            language: options.language.clone(),
            workers: options.workers.max(1),
            logger,
            scratch,
        }))
    }
}

/// A configured tesseract invocation plus its scratch directory.
struct TesseractEngine {
    binary: String,
    language: String,
    workers: usize,
    logger: ProgressLogger,
    scratch: TempDir,
}

impl TesseractEngine {
    /// Write the payload where tesseract can read it.
    fn stage_image(&self, image: &ImagePayload) -> Result<tempfile::NamedTempFile, OcrError> {
        let mut file = tempfile::Builder::new()
            .prefix("image-")
            .suffix(&format!(".{}", image.extension()))
            .tempfile_in(self.scratch.path())?;
        file.write_all(image.bytes())?;
        file.flush()?;
        Ok(file)
    }
}

#[async_trait]
impl EngineHandle for TesseractEngine {
    async fn recognize(&mut self, image: &ImagePayload) -> Result<OcrResult, OcrError> {
        if image.is_empty() {
            return Err(OcrError::ImageError("empty image payload".to_string()));
        }

        let start = Instant::now();
        self.logger.log(ProgressEvent::new(RECOGNIZING, 0.0));

        let staged = self.stage_image(image)?;
        let output = Command::new(&self.binary)
            .arg(staged.path())
            .arg("stdout")
            .args(["-l", &self.language])
            .env("OMP_THREAD_LIMIT", self.workers.to_string())
            .kill_on_drop(true)
            .output()
            .await;

        let text = match output {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).to_string()
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(OcrError::OcrFailed(format!(
                    "tesseract failed: {}",
                    stderr.trim()
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OcrError::BackendNotAvailable(
                    "tesseract not found (install tesseract-ocr)".to_string(),
                ));
            }
            Err(e) => return Err(OcrError::Io(e)),
        };

        self.logger.log(ProgressEvent::new(RECOGNIZING, 1.0));
        Ok(OcrResult::timed(text, OcrBackendType::Tesseract, start))
    }

    async fn terminate(self: Box<Self>) {
        let engine = *self;
        tracing::debug!("Terminating tesseract engine");
        if let Err(e) = engine.scratch.close() {
            tracing::warn!("Failed to remove tesseract scratch directory: {}", e);
        }
    }
}
