//! Konfiguration
//!
//! Reihenfolge: eingebaute Defaults, dann optional `config.json` im
//! App-Konfigurationsverzeichnis, zuletzt Umgebungsvariablen.
//!
//! - Windows: `%APPDATA%/haloocom/hexa-call/config/config.json`
//! - macOS: `~/Library/Application Support/in.haloocom.hexa-call/config.json`
//! - Linux: `~/.config/hexa-call/config.json`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://hexaweb.haloocom.in/royal/make-call";
pub const DEFAULT_CAMPAIGN_ID: &str = "Inbound";
pub const DEFAULT_LIST_ID: &str = "1";

pub const ENV_ENDPOINT: &str = "HEXA_CALL_ENDPOINT";
pub const ENV_CAMPAIGN_ID: &str = "HEXA_CALL_CAMPAIGN_ID";
pub const ENV_LIST_ID: &str = "HEXA_CALL_LIST_ID";

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid endpoint URL '{value}': {source}")]
    InvalidUrl {
        value: String,
        source: url::ParseError,
    },

    #[error("Endpoint must use http or https, got '{0}'")]
    UnsupportedScheme(String),
}

// ============================================================================
// APP CONFIG
// ============================================================================

/// Deployment-Parameter für den Call-Placement-Endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub endpoint: Url,
    pub campaign_id: String,
    pub list_id: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            campaign_id: DEFAULT_CAMPAIGN_ID.to_string(),
            list_id: DEFAULT_LIST_ID.to_string(),
        }
    }
}

impl AppConfig {
    /// Lädt Datei (falls vorhanden) und wendet Umgebungsvariablen an
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading config from {:?}", path);
                Self::from_file(&path)?
            }
            _ => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Liest eine JSON-Konfigurationsdatei, fehlende Felder bleiben Default
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Pfad zur optionalen Konfigurationsdatei
    pub fn config_path() -> Option<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("in", "haloocom", "hexa-call")?;
        Some(proj_dirs.config_dir().join("config.json"))
    }

    /// Überschreibt Felder mit gesetzten, nicht-leeren Werten aus `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = lookup(ENV_ENDPOINT) {
            self.endpoint = Url::parse(value.trim())
                .map_err(|source| ConfigError::InvalidUrl { value, source })?;
        }
        if let Some(value) = lookup(ENV_CAMPAIGN_ID) {
            self.campaign_id = value;
        }
        if let Some(value) = lookup(ENV_LIST_ID) {
            self.list_id = value;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.endpoint.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
