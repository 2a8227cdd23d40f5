use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::ClientError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub environment: Environment,
    /// Backend base URL without a trailing slash
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Directory holding the persisted session; `None` means the platform default
    pub config_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl ClientConfig {
    /// Build a config for an explicit base URL with development defaults.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let mut config = Self::development();
        config.base_url = normalize_base_url(base_url)?;
        Ok(config)
    }

    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("FOLIO_API_URL") {
            match normalize_base_url(&v) {
                Ok(url) => self.base_url = url,
                Err(e) => tracing::warn!("Ignoring FOLIO_API_URL: {}", e),
            }
        }
        if let Ok(v) = env::var("FOLIO_TIMEOUT_SECS") {
            self.timeout_secs = v.parse().unwrap_or(self.timeout_secs);
        }
        if let Ok(v) = env::var("FOLIO_USER_AGENT") {
            self.user_agent = v;
        }
        if let Ok(v) = env::var("FOLIO_CONFIG_DIR") {
            self.config_dir = Some(PathBuf::from(v));
        }

        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Absolute URL for a path relative to the base URL
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn default_user_agent() -> String {
        format!("folio-client/{}", env!("CARGO_PKG_VERSION"))
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            user_agent: Self::default_user_agent(),
            config_dir: None,
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            base_url: "https://staging-api.example.com".to_string(),
            timeout_secs: 20,
            user_agent: Self::default_user_agent(),
            config_dir: None,
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            base_url: "https://api.example.com".to_string(),
            timeout_secs: 15,
            user_agent: Self::default_user_agent(),
            config_dir: None,
        }
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ClientError> {
    let parsed = Url::parse(raw.trim())
        .map_err(|e| ClientError::config(format!("invalid base URL '{}': {}", raw, e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ClientError::config(format!(
                "unsupported URL scheme '{}' in '{}'",
                other, raw
            )))
        }
    }

    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<ClientConfig> = Lazy::new(ClientConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static ClientConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = ClientConfig::development();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.user_agent.starts_with("folio-client/"));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let config = ClientConfig::new("http://127.0.0.1:9000/").unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.endpoint("/me"), "http://127.0.0.1:9000/me");
        assert_eq!(config.endpoint("me"), "http://127.0.0.1:9000/me");
    }

    #[test]
    fn test_base_url_with_prefix_path() {
        let config = ClientConfig::new("https://host.example/api/").unwrap();
        assert_eq!(config.endpoint("/budget/summary"), "https://host.example/api/budget/summary");
    }

    #[test]
    fn test_invalid_base_urls_are_rejected() {
        assert!(matches!(ClientConfig::new("not a url"), Err(ClientError::Config(_))));
        assert!(matches!(ClientConfig::new("ftp://host"), Err(ClientError::Config(_))));
    }
}
