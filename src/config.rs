use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::DEFAULT_BASE_URL;
use crate::diagnostics::DEFAULT_CAPACITY;

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_max_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["pdf".to_string(), "txt".to_string(), "docx".to_string()]
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub upload: UploadConfig,
    pub window: WindowConfig,
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default)]
    pub enforce_limits: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            max_bytes: default_max_bytes(),
            allowed_extensions: default_allowed_extensions(),
            enforce_limits: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 900,
            height: 700,
            min_width: 400,
            min_height: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        DiagnosticsConfig {
            capacity: default_capacity(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`. A missing
    /// or broken file falls back to defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::get_config_path(),
        };

        if config_path.exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!(
                        path = %config_path.display(),
                        "Error parsing config: {}. Using defaults.",
                        e
                    ),
                },
                Err(e) => tracing::warn!(
                    path = %config_path.display(),
                    "Error reading config: {}. Using defaults.",
                    e
                ),
            }
        } else if let Some(parent) = config_path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        Config::default()
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_config_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/rag-desk")
        } else {
            PathBuf::from(".")
        }
    }
}
