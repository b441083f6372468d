//! Application configuration.

use crate::error::{AppError, AppResult};
use alphadesk_core::Feature;
use alphadesk_jobs::ProgressScript;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Remote endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the backend REST gateway (credits + job table).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Full URL of the workflow-engine trigger endpoint.
    #[serde(default = "default_engine_url")]
    pub engine_url: String,
}

fn default_base_url() -> String {
    "http://localhost:8080/api/v1".to_string()
}

fn default_engine_url() -> String {
    "http://localhost:8080/api/v1/engine/trigger".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            engine_url: default_engine_url(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// The authenticated user whose jobs this session sees.
    pub user_id: String,
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Job-table polling cadence for the feed bridge (ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Flash message lifetime (ms).
    #[serde(default = "default_flash_ttl_ms")]
    pub flash_ttl_ms: u64,
    /// Trigger request timeout (ms).
    #[serde(default = "default_trigger_timeout_ms")]
    pub trigger_timeout_ms: u64,
    /// Per-feature progress-script overrides; built-in scripts otherwise.
    #[serde(default)]
    pub scripts: HashMap<Feature, ProgressScript>,
}

fn default_poll_interval_ms() -> u64 {
    1_500
}

fn default_flash_ttl_ms() -> u64 {
    6_000
}

fn default_trigger_timeout_ms() -> u64 {
    120_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_id: "local".to_string(),
            gateway: GatewayConfig::default(),
            poll_interval_ms: default_poll_interval_ms(),
            flash_ttl_ms: default_flash_ttl_ms(),
            trigger_timeout_ms: default_trigger_timeout_ms(),
            scripts: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file.
    pub fn load() -> AppResult<Self> {
        let config_path = std::env::var("ALPHADESK_CONFIG")
            .unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }
}
