use crate::error::{DomesticatedError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Chat completion endpoint used when none is configured
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Model sent with every completion request
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const ENV_API_URL: &str = "DOMESTICATED_API_URL";
const ENV_MODEL: &str = "DOMESTICATED_MODEL";
const ENV_STORAGE_DIR: &str = "DOMESTICATED_STORAGE_DIR";
const ENV_TIMEOUT_SECS: &str = "DOMESTICATED_TIMEOUT_SECS";

/// Runtime settings for the chat layer
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,

    pub model: String,

    /// Directory holding the key-value store files
    pub storage_dir: PathBuf,

    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            storage_dir: default_storage_dir(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by any `DOMESTICATED_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_API_URL) {
            config.api_url = url;
        }
        if let Some(model) = lookup(ENV_MODEL) {
            config.model = model;
        }
        if let Some(dir) = lookup(ENV_STORAGE_DIR) {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|_| DomesticatedError::InvalidConfig(format!("{} must be whole seconds, got '{}'", ENV_TIMEOUT_SECS, secs)))?;
            config.request_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("domesticated"))
        .unwrap_or_else(|| PathBuf::from(".domesticated"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(config.storage_dir.ends_with("domesticated") || config.storage_dir.ends_with(".domesticated"));
    }

    #[test]
    fn test_builder() {
        let config = Config::new()
            .api_url("http://localhost:9000/v1/chat/completions")
            .model("gpt-4o-mini")
            .storage_dir("/tmp/store")
            .request_timeout(Duration::from_secs(5));

        assert_eq!(config.api_url, "http://localhost:9000/v1/chat/completions");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/store"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_environment_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_MODEL, "gpt-4"),
            (ENV_STORAGE_DIR, "/var/lib/domesticated"),
            (ENV_TIMEOUT_SECS, " 15 "),
        ]
        .into_iter()
        .collect();

        let config = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.storage_dir, PathBuf::from("/var/lib/domesticated"));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_bad_timeout_rejected() {
        let result = Config::from_lookup(|name| (name == ENV_TIMEOUT_SECS).then(|| "soon".to_string()));
        assert!(matches!(result, Err(DomesticatedError::InvalidConfig(_))));
    }
}
