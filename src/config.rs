//! Configuration management for textlift using the prefer crate.
//!
//! `prefer` discovers a `textlift.{toml,yaml,json}` file in the standard
//! locations; the file itself is parsed with serde. Environment variables
//! override the file for the settings people most often switch per run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ocr::EngineOptions;

/// Default advisory upload ceiling (5 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// OCR engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Backend name: "tesseract" or "ocrs".
    pub backend: String,
    /// Language model(s) to load, in the engine's notation.
    pub language: String,
    /// Worker threads the engine may use.
    pub workers: usize,
    /// Model directory for backends that need downloaded models.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    /// Start the engine when the server starts instead of on first use.
    pub eager_init: bool,
    /// Per-call recognition timeout in seconds (0 = no timeout).
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: "tesseract".to_string(),
            language: "eng".to_string(),
            workers: 1,
            model_path: None,
            eager_init: false,
            timeout_secs: 0,
        }
    }
}

/// Upload admission configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Accepted MIME types.
    pub accept: Vec<String>,
    /// Advisory size ceiling in bytes.
    pub max_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            accept: vec![
                "image/png".to_string(),
                "image/jpg".to_string(),
                "image/jpeg".to_string(),
            ],
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Web front-end configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3040,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// File this configuration was read from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Falls back to defaults when no file is found or it cannot be parsed.
    pub async fn load() -> Self {
        let config = match prefer::load("textlift").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("{}, using defaults", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        };
        config.with_env_overrides()
    }

    /// Load configuration from a specific file path.
    /// Supports TOML, YAML and JSON based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let mut config = Self::parse(&contents, ext).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse configuration text in the format named by `ext`.
    pub fn parse(contents: &str, ext: &str) -> Result<Self, String> {
        match ext {
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
            "json" => serde_json::from_str(contents).map_err(|e| e.to_string()),
            _ => toml::from_str(contents).map_err(|e| e.to_string()),
        }
    }

    /// Apply environment variable overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(backend) = env_value("TEXTLIFT_OCR_BACKEND") {
            tracing::debug!("Using TEXTLIFT_OCR_BACKEND from environment: {}", backend);
            self.ocr.backend = backend;
        }
        if let Some(language) = env_value("TEXTLIFT_OCR_LANGUAGE") {
            tracing::debug!("Using TEXTLIFT_OCR_LANGUAGE from environment: {}", language);
            self.ocr.language = language;
        }
        self
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to the config file location (or CWD)
    pub fn resolve_path(&self, path_str: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    /// Engine options derived from the `[ocr]` section.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            language: self.ocr.language.clone(),
            workers: self.ocr.workers.max(1),
            model_path: self.ocr.model_path.as_deref().map(|p| self.resolve_path(p)),
        }
    }

    /// Render as TOML, for `textlift config show`.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Load configuration, honouring an explicit `--config` path.
///
/// An explicit path that cannot be loaded is an error; auto-discovery
/// silently falls back to defaults.
pub async fn load_config(config_path: Option<&Path>) -> Result<Config, ConfigError> {
    match config_path {
        Some(path) => Ok(Config::load_from_path(path).await?.with_env_overrides()),
        None => Ok(Config::load().await),
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
