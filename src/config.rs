use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "recipe-converter";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Stock image shown for recipes that were converted without a photo.
pub const PLACEHOLDER_IMAGE_URL: &str = "/images/recipe-placeholder.jpg";

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "recipe_converter=info"
}

/// Location of the optional JSON settings file.
/// `~/.config/recipe-converter/config.json` on Linux.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("config.json")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Limits applied by the PDF extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfSettings {
    pub max_bytes: u64,
    pub max_pages: usize,
    pub load_timeout_ms: u64,
    pub overall_timeout_ms: u64,
    /// Below this many non-whitespace characters the text layer counts as missing.
    pub min_text_chars: usize,
    pub render_dpi: u32,
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self {
            max_bytes: 8 * 1024 * 1024,
            max_pages: 3,
            load_timeout_ms: 15_000,
            overall_timeout_ms: 60_000,
            min_text_chars: 50,
            render_dpi: 300,
        }
    }
}

impl PdfSettings {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.overall_timeout_ms)
    }
}

/// Settings for the hosted completion API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    /// No key means AI structuring is unavailable and the heuristic parser is used.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Ask for the extended schema (equipment, nutrition, tags...).
    pub detailed: bool,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 90,
            detailed: false,
        }
    }
}

/// Settings for the vision OCR engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub ollama_url: String,
    pub vision_model: String,
    pub timeout_secs: u64,
    pub max_image_bytes: u64,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            vision_model: "llama3.2-vision".to_string(),
            timeout_secs: 120,
            max_image_bytes: 15 * 1024 * 1024,
        }
    }
}

/// Complete converter configuration, threaded explicitly into every component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub pdf: PdfSettings,
    pub ai: AiSettings,
    pub ocr: OcrSettings,
}

impl ConverterConfig {
    /// Load the settings file if it exists, fall back to defaults otherwise,
    /// then apply environment overrides. A broken file is logged and ignored.
    pub fn load_or_default() -> Self {
        let path = config_file_path();
        let mut config = if path.exists() {
            match Self::load_from(&path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unreadable config file");
                    Self::default()
                }
            }
        } else {
            Self::default()
        };
        config.apply_env();
        config
    }

    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `OPENAI_API_KEY` and the `RECIPE_CONVERTER_*` variables.
    pub fn apply_env(&mut self) {
        self.apply_env_overrides(|key| std::env::var(key).ok());
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.ai.api_key = Some(key);
        }
        if let Some(model) = lookup("RECIPE_CONVERTER_AI_MODEL") {
            self.ai.model = model;
        }
        if let Some(url) = lookup("RECIPE_CONVERTER_OLLAMA_URL") {
            self.ocr.ollama_url = url;
        }
    }

    /// Whether AI structuring can be attempted at all.
    pub fn ai_enabled(&self) -> bool {
        self.ai
            .api_key
            .as_ref()
            .is_some_and(|k| !k.trim().is_empty())
    }
}
