//! Textlift - extract text from images.
//!
//! The core is [`pipeline::RecognitionPipeline`]: it starts an OCR engine
//! on demand, runs one recognition at a time and publishes progress for
//! front-ends to render.

pub mod cli;
pub mod config;
pub mod ocr;
pub mod payload;
pub mod pipeline;
pub mod server;
pub mod upload;

pub use config::Config;
pub use ocr::{EngineHandle, EngineOptions, OcrBackend, OcrError, OcrResult, ProgressEvent, ProgressLogger};
pub use payload::ImagePayload;
pub use pipeline::{PipelineError, PipelineSnapshot, PipelineState, ProgressState, RecognitionPipeline};
pub use upload::{UploadError, UploadPolicy};
