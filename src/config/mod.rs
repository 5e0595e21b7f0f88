//! Application configuration

pub mod client;

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use client::{ClientConfig, ConfigError};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_STREAM_PATH: &str = "/api/chat/stream";
pub const DEFAULT_HISTORY_PATH: &str = "/api/chat/history";
pub const DEFAULT_PLACEHOLDER: &str = "Just a moment";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Resolved runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub base_url: String,
    pub stream_path: String,
    pub history_path: String,
    /// Bearer token sent with streaming requests
    pub api_token: Option<String>,
    pub connect_timeout_secs: u64,
    /// Overall deadline per request, body included. `None` lets streams run.
    pub request_timeout_secs: Option<u64>,
    /// Text shown in the assistant message until the reply starts
    pub placeholder_text: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            stream_path: DEFAULT_STREAM_PATH.into(),
            history_path: DEFAULT_HISTORY_PATH.into(),
            api_token: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: None,
            placeholder_text: DEFAULT_PLACEHOLDER.into(),
        }
    }
}

impl Config {
    /// Load from `CHAT_CONFIG` if it points at a TOML profile, otherwise
    /// from individual environment variables.
    pub fn load() -> anyhow::Result<Self> {
        match env::var("CHAT_CONFIG") {
            Ok(path) => {
                let profile = ClientConfig::from_file(&PathBuf::from(path))?;
                Ok(profile.into_config()?)
            }
            Err(_) => Self::from_env(),
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            base_url: env::var("CHAT_API_BASE_URL").unwrap_or(defaults.base_url),
            stream_path: defaults.stream_path,
            history_path: defaults.history_path,
            api_token: env::var("CHAT_API_TOKEN").ok().filter(|t| !t.is_empty()),
            connect_timeout_secs: env::var("CHAT_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.connect_timeout_secs),
            request_timeout_secs: env::var("CHAT_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
            placeholder_text: env::var("CHAT_PLACEHOLDER_TEXT")
                .unwrap_or(defaults.placeholder_text),
        })
    }
}
