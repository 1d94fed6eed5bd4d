use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Per-request timeout in milliseconds.
    pub timeout: u64,
    /// Seconds between rounds.
    pub check_interval: u64,
    pub pages: Vec<Target>,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_api_port() -> u16 { 8080 }

/// One probed endpoint and its health criteria.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Target {
    pub url: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub text_to_include: String,
    /// Slow-response threshold in milliseconds.
    #[serde(default)]
    pub speed: u64,
    #[serde(default)]
    pub request: Option<RequestOverride>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RequestOverride {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: String,
}

pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

impl Target {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Default::default() }
    }

    pub fn expected_status(&self) -> u16 {
        if self.status == 0 { DEFAULT_EXPECTED_STATUS } else { self.status }
    }

    pub fn required_text(&self) -> Option<&str> {
        Some(self.text_to_include.as_str()).filter(|s| !s.is_empty())
    }

    pub fn speed_threshold(&self) -> Option<Duration> {
        (self.speed > 0).then(|| Duration::from_millis(self.speed))
    }
}

impl MonitorConfig {
    /// Reads and validates a config file. `.json` files are parsed as JSON,
    /// anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_yaml(&content)?
        };
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout == 0 {
            return Err(ConfigError::Invalid("timeout must be greater than 0".into()));
        }
        if self.check_interval == 0 {
            return Err(ConfigError::Invalid("check_interval must be greater than 0".into()));
        }
        if self.pages.is_empty() {
            return Err(ConfigError::Invalid("at least one page must be configured".into()));
        }
        if let Some(index) = self.pages.iter().position(|p| p.url.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("page #{} has an empty url", index + 1)));
        }
        Ok(())
    }

    /// The alert endpoint, if alerts are enabled.
    pub fn webhook(&self) -> Option<&str> {
        self.webhook_url.as_deref().filter(|url| !url.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }
}
