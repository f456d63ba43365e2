//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub telephony: TelephonyConfig,
    pub ai: AiConfig,
    pub directory: DirectoryConfig,
    pub session: SessionConfig,
}

/// Monitoring API bind address
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Trunk listener bind address
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelephonyConfig {
    pub bind_address: String,
    pub bind_port: u16,
}

/// AI realtime API connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub url: String,
    /// Overridden by VOXBRIDGE_AI_API_KEY when set
    pub api_key: String,
    pub voice: Option<String>,
    pub connect_attempts: u32,
}

/// Business directory backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub base_url: String,
}

/// Per-session timing policy, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub setup_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            bind_port: 9090,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            url: "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview".to_string(),
            api_key: String::new(),
            voice: None,
            connect_attempts: 3,
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            setup_timeout_secs: 10,
            idle_timeout_secs: 120,
        }
    }
}

impl Config {
    /// Load from a TOML file, then apply env overrides
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&text)?;
        config.apply_env();
        Ok(config)
    }

    /// Defaults plus env overrides, for running without a config file
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("VOXBRIDGE_AI_API_KEY") {
            self.ai.api_key = key;
        }
        if let Ok(url) = std::env::var("VOXBRIDGE_DIRECTORY_URL") {
            self.directory.base_url = url;
        }
    }
}
