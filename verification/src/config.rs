//! Pipeline configuration with TOML file support.

use crate::network::{AllowListError, NetworkAllowList};
use rollcall_crypto::{CryptoError, TemplateCipher};
use rollcall_types::PipelineParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Config(String),
}

/// Configuration for the attendance pipeline.
///
/// Can be loaded from a TOML file via [`PipelineConfig::from_toml_file`]
/// or built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline parameters; any omitted field keeps its default.
    #[serde(default)]
    pub params: PipelineParams,

    /// Hex-encoded 32-byte key for template encryption. Required in
    /// production; [`PipelineConfig::cipher`] rejects a missing key.
    #[serde(default)]
    pub template_key_hex: String,

    /// Networks whose clients count as on campus premises,
    /// e.g. `["10.0.0.0/24", "192.168.1.0/24"]`.
    #[serde(default)]
    pub trusted_networks: Vec<String>,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("PipelineConfig is always serializable to TOML")
    }

    /// Build the template cipher from the configured key.
    pub fn cipher(&self) -> Result<TemplateCipher, CryptoError> {
        TemplateCipher::from_hex(&self.template_key_hex)
    }

    /// Build the trusted-network allow-list.
    pub fn allow_list(&self) -> Result<NetworkAllowList, AllowListError> {
        NetworkAllowList::parse(&self.trusted_networks)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            params: PipelineParams::defaults(),
            template_key_hex: String::new(),
            trusted_networks: Vec::new(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}
