//! Client profile loaded from a TOML file
//!
//! A profile pins the backend endpoint and the chat presentation defaults:
//!
//! ```toml
//! [api]
//! base_url = "https://shop.example.com"
//! token_env = "SHOP_CHAT_TOKEN"
//!
//! [chat]
//! placeholder_text = "One sec"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    Config, DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HISTORY_PATH,
    DEFAULT_PLACEHOLDER, DEFAULT_STREAM_PATH,
};

/// Root client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend endpoint settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Conversation presentation settings
    #[serde(default)]
    pub chat: ChatConfig,
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.api.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                url
            )));
        }
        for (name, path) in [
            ("api.stream_path", &self.api.stream_path),
            ("api.history_path", &self.api.history_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::Validation(format!(
                    "{} must start with '/', got '{}'",
                    name, path
                )));
            }
        }
        Ok(())
    }

    /// Resolve into runtime settings, reading the token from `api.token_env`
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let api_token = match &self.api.token_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                ConfigError::Validation(format!("Environment variable {} is not set", var))
            })?),
            None => None,
        };

        Ok(Config {
            base_url: self.api.base_url,
            stream_path: self.api.stream_path,
            history_path: self.api.history_path,
            api_token,
            connect_timeout_secs: self.api.connect_timeout_secs,
            request_timeout_secs: self.api.request_timeout_secs,
            placeholder_text: self.chat.placeholder_text,
        })
    }
}

/// Backend endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the bearer token
    #[serde(default)]
    pub token_env: Option<String>,

    #[serde(default = "default_stream_path")]
    pub stream_path: String,

    #[serde(default = "default_history_path")]
    pub history_path: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_stream_path() -> String {
    DEFAULT_STREAM_PATH.to_string()
}

fn default_history_path() -> String {
    DEFAULT_HISTORY_PATH.to_string()
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_env: None,
            stream_path: default_stream_path(),
            history_path: default_history_path(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_placeholder")]
    pub placeholder_text: String,
}

fn default_placeholder() -> String {
    DEFAULT_PLACEHOLDER.to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            placeholder_text: default_placeholder(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONFIG: &str = r#"
[api]
base_url = "https://shop.example.com"
token_env = "ASSISTANT_STREAM_TEST_TOKEN"
history_path = "/v2/history"
request_timeout_secs = 300

[chat]
placeholder_text = "One sec"
"#;

    #[test]
    fn test_parse_config() {
        let config = ClientConfig::from_str(SAMPLE_CONFIG).unwrap();

        assert_eq!(config.api.base_url, "https://shop.example.com");
        assert_eq!(config.api.stream_path, "/api/chat/stream"); // Default
        assert_eq!(config.api.history_path, "/v2/history");
        assert_eq!(config.api.request_timeout_secs, Some(300));
        assert_eq!(config.chat.placeholder_text, "One sec");
    }

    #[test]
    fn test_minimal_config() {
        let config = ClientConfig::from_str("").unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.chat.placeholder_text, "Just a moment");

        let resolved = config.into_config().unwrap();
        assert!(resolved.api_token.is_none());
        assert!(resolved.request_timeout_secs.is_none());
    }

    #[test]
    fn test_validation() {
        let bad_url = "[api]\nbase_url = \"localhost:8000\"\n";
        assert!(matches!(
            ClientConfig::from_str(bad_url),
            Err(ConfigError::Validation(_))
        ));

        let bad_path = "[api]\nstream_path = \"chat\"\n";
        assert!(matches!(
            ClientConfig::from_str(bad_path),
            Err(ConfigError::Validation(_))
        ));

        assert!(matches!(
            ClientConfig::from_str("[api\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_token_env_resolution() {
        std::env::set_var("ASSISTANT_STREAM_TEST_TOKEN", "tok-123");
        let config = ClientConfig::from_str(SAMPLE_CONFIG)
            .unwrap()
            .into_config()
            .unwrap();
        assert_eq!(config.api_token.as_deref(), Some("tok-123"));
        assert_eq!(config.placeholder_text, "One sec");

        let mut missing = ClientConfig::default();
        missing.api.token_env = Some("ASSISTANT_STREAM_TEST_UNSET".into());
        assert!(matches!(missing.into_config(), Err(ConfigError::Validation(_))));
    }
}
