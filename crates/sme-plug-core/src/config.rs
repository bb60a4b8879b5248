use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::provider::Provider;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
/// Pause between the expert and the base call. The backend drops the second
/// of two back-to-back generation requests; remove once that is fixed.
pub const DEFAULT_PACING_MS: u64 = 500;
pub const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Source of the user's own provider keys, consulted on every request.
pub trait CredentialProvider: Send + Sync {
    fn key_for(&self, provider: Provider) -> Option<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub groq_key: Option<String>,
    pub openai_key: Option<String>,
}

impl CredentialProvider for Credentials {
    fn key_for(&self, provider: Provider) -> Option<String> {
        let key = match provider {
            Provider::Groq => self.groq_key.as_ref(),
            Provider::OpenAI => self.openai_key.as_ref(),
        };
        key.filter(|k| !k.trim().is_empty()).cloned()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub base_url: Option<String>,
    pub provider: Option<String>,
    pub groq_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub pacing_ms: Option<u64>,
    pub health_interval_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::Groq.as_str().to_string()),
            ..Self::default()
        }
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(io_err)
    }

    /// Backend base URL: `SMEPLUG_API_URL`, then the file, then the default.
    pub fn base_url(&self) -> String {
        let url = std::env::var("SMEPLUG_API_URL")
            .ok()
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        url.trim_end_matches('/').to_string()
    }

    pub fn provider(&self) -> Option<Provider> {
        self.provider.as_deref().and_then(Provider::from_str)
    }

    /// Keys from the environment take precedence over the config file.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            groq_key: std::env::var("GROQ_API_KEY")
                .ok()
                .or_else(|| self.groq_api_key.clone()),
            openai_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .or_else(|| self.openai_api_key.clone()),
        }
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms.unwrap_or(DEFAULT_PACING_MS))
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(
            self.health_interval_secs
                .unwrap_or(DEFAULT_HEALTH_INTERVAL_SECS)
                .max(1),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("sme-plug"))
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.provider(), Some(Provider::Groq));
        assert_eq!(config.pacing(), Duration::from_millis(500));
        assert_eq!(config.health_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            base_url: Some("https://sme.example.com/api/".to_string()),
            provider: Some("openai".to_string()),
            pacing_ms: Some(750),
            ..Config::new()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.provider(), Some(Provider::OpenAI));
        assert_eq!(loaded.pacing(), Duration::from_millis(750));
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Json { .. })
        ));
    }

    #[test]
    fn test_blank_keys_are_not_sent() {
        let creds = Credentials {
            groq_key: Some("  ".to_string()),
            openai_key: Some("sk-test".to_string()),
        };
        assert_eq!(creds.key_for(Provider::Groq), None);
        assert_eq!(creds.key_for(Provider::OpenAI), Some("sk-test".to_string()));
    }

    #[test]
    fn test_health_interval_is_never_zero() {
        let config = Config {
            health_interval_secs: Some(0),
            ..Config::new()
        };
        assert_eq!(config.health_interval(), Duration::from_secs(1));
    }
}
