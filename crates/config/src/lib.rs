//! Configuration loading, validation, and management for the tldw agent.
//!
//! Loads configuration from `~/.tldw-agent/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tldw_agent_core::agent::AgentSettings;

/// The root configuration structure.
///
/// Maps directly to `~/.tldw-agent/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// tldw_server connection
    #[serde(default)]
    pub server: ServerConfig,

    /// Agent loop defaults
    #[serde(default)]
    pub agent: AgentDefaults,

    /// Native tool collaborator
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the OpenAI-compatible API (without `/chat/completions`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/api/v1".into()
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaults {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    #[serde(default)]
    pub auto_approve_writes: bool,

    #[serde(default)]
    pub auto_approve_exec: bool,

    #[serde(default = "default_poll_interval_ms")]
    pub approval_poll_interval_ms: u64,

    /// Replaces the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_model() -> String {
    AgentSettings::default().model
}
fn default_max_steps() -> u32 {
    AgentSettings::default().max_steps
}
fn default_poll_interval_ms() -> u64 {
    AgentSettings::default().approval_poll_interval_ms
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_steps: default_max_steps(),
            auto_approve_writes: false,
            auto_approve_exec: false,
            approval_poll_interval_ms: default_poll_interval_ms(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tool execution endpoint; defaults to `{server.base_url}/agent/tools/execute`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.tldw-agent/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `TLDW_API_KEY`
    /// - `TLDW_SERVER_URL`
    /// - `TLDW_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("TLDW_API_KEY").filter(|k| !k.is_empty()) {
            self.server.api_key = Some(key);
        }
        if let Some(url) = lookup("TLDW_SERVER_URL").filter(|u| !u.is_empty()) {
            self.server.base_url = url;
        }
        if let Some(model) = lookup("TLDW_MODEL").filter(|m| !m.is_empty()) {
            self.agent.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tldw-agent")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.server.base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::ValidationError(
                "server.base_url must not be empty".into(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "server.base_url must be an http(s) URL, got '{url}'"
            )));
        }
        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be at least 1".into(),
            ));
        }
        if self.agent.approval_poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "agent.approval_poll_interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The agent settings these defaults describe.
    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            model: self.agent.model.clone(),
            max_steps: self.agent.max_steps,
            auto_approve_writes: self.agent.auto_approve_writes,
            auto_approve_exec: self.agent.auto_approve_exec,
            approval_poll_interval_ms: self.agent.approval_poll_interval_ms,
            system_prompt: self.agent.system_prompt.clone(),
        }
    }

    /// Resolved tool execution endpoint.
    pub fn tools_endpoint(&self) -> String {
        match &self.tools.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!(
                "{}/agent/tools/execute",
                self.server.base_url.trim_end_matches('/')
            ),
        }
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
