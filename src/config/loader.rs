//! Configuration loading with multi-layer merge

use super::{DataConfig, LlmConfig, OcrConfig, SessionConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level doctor-ai configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DoctorConfig {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// LLM server
    #[serde(default)]
    pub llm: LlmConfig,

    /// OCR engine
    #[serde(default)]
    pub ocr: OcrConfig,

    /// Data files
    #[serde(default)]
    pub data: DataConfig,

    /// Consent, history and audit settings
    #[serde(default)]
    pub session: SessionConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Request body limit, mostly relevant for uploads
    pub max_upload_bytes: usize,

    /// Directory `index.html` is served from
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            max_upload_bytes: 10 * 1024 * 1024,
            static_dir: ".".into(),
        }
    }
}

impl DoctorConfig {
    /// Load configuration from the standard hierarchy
    ///
    /// Load order (later overrides earlier):
    /// 1. Built-in defaults
    /// 2. ~/.config/doctor-ai/config.toml
    /// 3. .doctor-ai/config.toml (project), or `explicit` when given
    /// 4. OLLAMA_URL / OLLAMA_MODEL / DOCTOR_AI_PORT
    pub fn load(project_dir: Option<&Path>, explicit: Option<&Path>) -> Result<Self> {
        let mut layers = Vec::new();

        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                layers.push(Self::read_layer(&user_config_path)?);
            }
        }

        let project_config_path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let path = project_dir
                    .map(|p| p.join(".doctor-ai/config.toml"))
                    .unwrap_or_else(|| PathBuf::from(".doctor-ai/config.toml"));
                path.exists().then_some(path)
            }
        };

        if let Some(path) = project_config_path {
            layers.push(Self::read_layer(&path)?);
        }

        let mut config = Self::from_layers(layers)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Get the user config path (~/.config/doctor-ai/config.toml)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("doctor-ai/config.toml"))
    }

    fn read_layer(path: &Path) -> Result<toml::Table> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Merge raw layers (later wins, tables merge key by key) and deserialize once
    fn from_layers(layers: Vec<toml::Table>) -> Result<Self> {
        let mut merged = toml::Table::new();
        for layer in layers {
            merge_tables(&mut merged, layer);
        }
        toml::Value::Table(merged)
            .try_into()
            .context("invalid configuration")
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("OLLAMA_URL").filter(|v| !v.is_empty()) {
            self.llm.url = url;
        }
        if let Some(model) = lookup("OLLAMA_MODEL").filter(|v| !v.is_empty()) {
            self.llm.model = model;
        }
        if let Some(port) = lookup("DOCTOR_AI_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
