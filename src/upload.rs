//! Admission rules for user-selected images.
//!
//! These are UI-level affordances: the pipeline accepts any payload, but
//! the CLI and web front-end only hand it images that pass this policy.

use std::path::Path;

use thiserror::Error;

use crate::config::UploadConfig;
use crate::payload::ImagePayload;

/// Reasons a selected file is refused.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No image data provided")]
    Empty,

    #[error("Image is {size} bytes, larger than the {max} byte limit")]
    TooLarge { size: u64, max: u64 },

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Accepted MIME types and the advisory size ceiling.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    accept: Vec<String>,
    max_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}

impl UploadPolicy {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            accept: config
                .accept
                .iter()
                .map(|m| normalize_mime(m))
                .collect(),
            max_bytes: config.max_bytes,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn accepted_types(&self) -> &[String] {
        &self.accept
    }

    /// Whether a MIME type is on the accept list.
    pub fn accepts(&self, mime: &str) -> bool {
        let mime = normalize_mime(mime);
        self.accept.iter().any(|m| *m == mime)
    }

    /// Validate selected bytes and turn them into a payload.
    ///
    /// `declared` is the type reported by the client (Content-Type header,
    /// file extension). Recognizable content must itself be an accepted
    /// type; unrecognizable content is let through on the declared type so
    /// the engine can report what is wrong with it.
    pub fn admit(&self, declared: Option<&str>, bytes: Vec<u8>) -> Result<ImagePayload, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        self.check_size(bytes.len() as u64)?;

        let declared = declared.map(normalize_mime).filter(|m| !m.is_empty());
        if let Some(ref mime) = declared {
            if !self.accepts(mime) {
                return Err(UploadError::UnsupportedType(mime.clone()));
            }
        }

        let sniffed = ImagePayload::sniff(&bytes);
        if let Some(mime) = sniffed {
            if !self.accepts(mime) {
                return Err(UploadError::UnsupportedType(mime.to_string()));
            }
        }

        let mime = match (declared, sniffed) {
            (Some(declared), _) => declared,
            (None, Some(sniffed)) => sniffed.to_string(),
            (None, None) => {
                return Err(UploadError::UnsupportedType("unknown".to_string()));
            }
        };

        if sniffed.is_none() {
            tracing::debug!("Content of declared {} image not recognized, admitting anyway", mime);
        }

        Ok(ImagePayload::new(mime, bytes))
    }

    /// Read and admit a file, taking the declared type from its extension.
    pub async fn admit_path(&self, path: &Path) -> Result<ImagePayload, UploadError> {
        let metadata = tokio::fs::metadata(path).await?;
        self.check_size(metadata.len())?;

        let bytes = tokio::fs::read(path).await?;
        let declared = mime_guess::from_path(path).first_raw();
        self.admit(declared, bytes)
    }

    fn check_size(&self, size: u64) -> Result<(), UploadError> {
        if size > self.max_bytes {
            return Err(UploadError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }
        Ok(())
    }
}

/// Lowercase a MIME type and drop any parameters (`; charset=...`).
fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}
