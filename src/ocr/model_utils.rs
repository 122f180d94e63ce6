//! Shared utilities for OCR backends.
//!
//! Provides common functionality for:
//! - Checking for CLI tool availability
//! - Locating and downloading engine models

// Model helpers are only used when the ocr-ocrs feature is enabled
#![cfg_attr(not(feature = "ocr-ocrs"), allow(dead_code))]

use std::path::{Path, PathBuf};
use std::process::Command;

use super::backend::OcrError;

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Model file specification for downloading.
pub struct ModelSpec {
    /// URL to download from.
    pub url: &'static str,
    /// Filename to save as.
    pub filename: &'static str,
    /// Human-readable size for progress messages.
    pub size_hint: &'static str,
}

/// Configuration for model directory management.
pub struct ModelDirConfig {
    /// Subdirectory name under data_dir (e.g., "ocrs").
    pub subdir: &'static str,
    /// Required model files to check for presence.
    pub required_files: &'static [&'static str],
}

impl ModelDirConfig {
    /// Get the default model directory for this backend.
    pub fn default_dir(&self) -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("textlift")
            .join(self.subdir)
    }

    /// Get standard candidate directories to search for models.
    pub fn candidate_dirs(&self) -> Vec<PathBuf> {
        [
            Some(self.default_dir()),
            dirs::data_dir().map(|d| d.join(self.subdir).join("models")),
            dirs::home_dir().map(|d| d.join(format!(".{}", self.subdir))),
            Some(PathBuf::from(format!("/usr/share/{}/models", self.subdir))),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Check if a directory contains all required model files.
    pub fn has_required_files(&self, dir: &Path) -> bool {
        self.required_files
            .iter()
            .all(|file| dir.join(file).exists())
    }
}

/// Find model directory by checking the configured path first, then standard locations.
pub fn find_model_dir(config_path: Option<&PathBuf>, model_config: &ModelDirConfig) -> Option<PathBuf> {
    if let Some(path) = config_path {
        if model_config.has_required_files(path) {
            return Some(path.clone());
        }
    }

    model_config
        .candidate_dirs()
        .into_iter()
        .find(|dir| model_config.has_required_files(dir))
}

/// Download a file from a URL to a local path using curl, falling back to wget.
pub fn download_file(url: &str, dest: &Path) -> Result<(), OcrError> {
    let status = Command::new("curl")
        .args(["-fsSL", "-o"])
        .arg(dest)
        .arg(url)
        .status();

    let status = match status {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Command::new("wget")
            .args(["-q", "-O"])
            .arg(dest)
            .arg(url)
            .status()
            .map_err(|_| {
                OcrError::BackendNotAvailable(
                    "Neither curl nor wget found. Install one to download models.".to_string(),
                )
            })?,
        Err(e) => return Err(OcrError::Io(e)),
        Ok(status) => status,
    };

    if status.success() {
        Ok(())
    } else {
        let _ = std::fs::remove_file(dest);
        Err(OcrError::ModelNotFound(format!("Failed to download {}", url)))
    }
}

/// Ensure models are present, downloading them into the configured (or
/// default) directory if necessary. Blocking; call from a blocking task.
pub fn ensure_models_present(
    config_path: Option<&PathBuf>,
    model_config: &ModelDirConfig,
    model_specs: &[&ModelSpec],
) -> Result<PathBuf, OcrError> {
    if let Some(dir) = find_model_dir(config_path, model_config) {
        return Ok(dir);
    }

    let model_dir = config_path
        .cloned()
        .unwrap_or_else(|| model_config.default_dir());
    std::fs::create_dir_all(&model_dir)?;

    for spec in model_specs {
        let dest = model_dir.join(spec.filename);
        if !dest.exists() {
            tracing::info!("Downloading {} (~{})", spec.filename, spec.size_hint);
            download_file(spec.url, &dest)?;
        }
    }

    Ok(model_dir)
}

/// Describe where models were found, or what will be downloaded.
pub fn model_availability_hint(
    config_path: Option<&PathBuf>,
    model_config: &ModelDirConfig,
    name: &str,
    total_size: &str,
) -> String {
    match find_model_dir(config_path, model_config) {
        Some(dir) => format!("{} models found in {}", name, dir.display()),
        None => format!(
            "{} models (~{}) will be downloaded to {} on first use",
            name,
            total_size,
            model_config.default_dir().display()
        ),
    }
}
