use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Environment variable that overrides the configured service URL
pub const API_URL_ENV: &str = "ANALYSEDISS_API_URL";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub api_url: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self { api_url: None }
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::new());
        }

        Self::load_from(&config_path)
    }

    /// Resolve the chat service base URL: environment variable first,
    /// then the config file, then the local default.
    pub fn resolve_api_url(&self) -> String {
        std::env::var(API_URL_ENV)
            .ok()
            .filter(|url| !url.is_empty())
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    fn load_from(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("analysediss").join("config.json"))
    }

    pub fn log_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("analysediss").join("analysediss.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_from_parses_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"api_url": "http://analysediss.internal:9000"}"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(
            loaded.api_url.as_deref(),
            Some("http://analysediss.internal:9000")
        );
    }

    #[test]
    fn load_from_tolerates_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{}").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!(loaded.api_url.is_none());
    }

    #[test]
    fn load_from_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn resolve_api_url_prefers_env_then_file_then_default() {
        std::env::remove_var(API_URL_ENV);

        let config = Config::new();
        assert_eq!(config.resolve_api_url(), DEFAULT_API_URL);

        let config = Config {
            api_url: Some("http://from-file:8000".to_string()),
        };
        assert_eq!(config.resolve_api_url(), "http://from-file:8000");

        std::env::set_var(API_URL_ENV, "http://from-env:8000");
        assert_eq!(config.resolve_api_url(), "http://from-env:8000");
        std::env::remove_var(API_URL_ENV);
    }
}
