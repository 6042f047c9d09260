//! Configuration.
//!
//! Loaded from TOML (`--config`, else `<config dir>/bridgeline/config.toml`),
//! then overridden by environment variables, then by CLI flags.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a pentest assistant. Use tools when needed.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bridge: BridgeConfig,
    pub model: ModelConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub url: String,
    /// Backend server a conversation opens its session on.
    pub server: String,
    pub request_timeout_secs: u64,
    /// Per tool call. Scans can take minutes.
    pub tool_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub host: String,
    pub name: String,
    pub timeout_secs: u64,
    /// Leading system message; empty disables it.
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model round-trips allowed per user turn.
    pub max_iterations: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000".to_string(),
            server: "pentest".to_string(),
            request_timeout_secs: crate::bridge::REQUEST_TIMEOUT.as_secs(),
            tool_timeout_secs: crate::bridge::TOOL_TIMEOUT.as_secs(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            host: crate::provider::DEFAULT_HOST.to_string(),
            name: crate::provider::DEFAULT_MODEL.to_string(),
            timeout_secs: crate::provider::CHAT_TIMEOUT.as_secs(),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: crate::agent::DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Default config file location.
#[must_use]
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("bridgeline").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from(".bridgeline/config.toml"))
}

impl Config {
    /// Load from `path`, or the default location when `None`.
    ///
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_path(), false),
        };

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else if explicit {
            return Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply `BRIDGELINE_*` / `OLLAMA_HOST` overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = set("BRIDGELINE_BRIDGE_URL") {
            self.bridge.url = url;
        }
        if let Some(server) = set("BRIDGELINE_SERVER") {
            self.bridge.server = server;
        }
        if let Some(host) = set("OLLAMA_HOST") {
            self.model.host = normalize_host(&host);
        }
        if let Some(model) = set("BRIDGELINE_MODEL") {
            self.model.name = model;
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("bridge.url", &self.bridge.url), ("model.host", &self.model.host)]
        {
            let parsed = url::Url::parse(value)
                .map_err(|e| Error::Config(format!("{name} '{value}' is not a valid URL: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "{name} must use http or https, got '{}'",
                    parsed.scheme()
                )));
            }
        }

        if self.bridge.server.trim().is_empty() {
            return Err(Error::Config("bridge.server must not be empty".into()));
        }
        if self.model.name.trim().is_empty() {
            return Err(Error::Config("model.name must not be empty".into()));
        }
        for (name, secs) in [
            ("bridge.request_timeout_secs", self.bridge.request_timeout_secs),
            ("bridge.tool_timeout_secs", self.bridge.tool_timeout_secs),
            ("model.timeout_secs", self.model.timeout_secs),
        ] {
            if secs == 0 {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }
        if self.agent.max_iterations == 0 {
            return Err(Error::Config(
                "agent.max_iterations must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.bridge.request_timeout_secs)
    }

    #[must_use]
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.bridge.tool_timeout_secs)
    }

    #[must_use]
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model.timeout_secs)
    }

    #[must_use]
    pub fn system_prompt(&self) -> Option<&str> {
        self.model.system_prompt.as_deref()
    }
}

/// `OLLAMA_HOST` is commonly set without a scheme (`0.0.0.0:11434`).
fn normalize_host(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}
