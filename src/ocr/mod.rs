//! OCR engines.
//!
//! Recognizes text in images using:
//! - Tesseract OCR via its command-line tool (default)
//! - OCRS for pure-Rust OCR (feature: ocr-ocrs)
//!
//! Backends are engine factories; the recognition pipeline owns the engine
//! handle a backend produces.

mod backend;
mod model_utils;
mod tesseract;

#[cfg(feature = "ocr-ocrs")]
mod ocrs_backend;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

pub use backend::{
    EngineHandle, EngineOptions, OcrBackend, OcrBackendType, OcrError, OcrResult, ProgressEvent,
    ProgressLogger,
};
pub use tesseract::TesseractBackend;

#[cfg(feature = "ocr-ocrs")]
pub use ocrs_backend::OcrsBackend;

/// Names accepted by `create_backend`, in preference order.
pub const BACKEND_NAMES: &[&str] = &["tesseract", "ocrs"];

/// Create a backend by name.
pub fn create_backend(name: &str, options: &EngineOptions) -> Result<Arc<dyn OcrBackend>, OcrError> {
    match OcrBackendType::from_name(name) {
        Some(OcrBackendType::Tesseract) => Ok(Arc::new(TesseractBackend::new())),
        #[cfg(feature = "ocr-ocrs")]
        Some(OcrBackendType::Ocrs) => Ok(Arc::new(OcrsBackend::with_model_path(
            options.model_path.clone(),
        ))),
        #[cfg(not(feature = "ocr-ocrs"))]
        Some(OcrBackendType::Ocrs) => {
            let _ = options;
            Err(OcrError::BackendNotAvailable(
                "ocrs not compiled (enable the ocr-ocrs feature)".to_string(),
            ))
        }
        _ => Err(OcrError::UnknownBackend(name.to_string())),
    }
}
