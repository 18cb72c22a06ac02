//! Configuration loader and validator for the boarding client.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides `api.base_url`.
pub const API_URL_ENV: &str = "BOARDING_API_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub api: Api,
    pub app: App,
    #[serde(default)]
    pub wizard: Wizard,
}

/// Backend API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Api {
    pub base_url: String,
    /// Timeout for account creation and step saves.
    #[serde(default = "default_save_timeout")]
    pub save_timeout_secs: u64,
    /// Timeout for fetching the open-banking authorization URL.
    #[serde(default = "default_auth_url_timeout")]
    pub auth_url_timeout_secs: u64,
}

/// Local application settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    /// Directory holding the session store.
    pub data_dir: String,
}

/// Boarding wizard timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wizard {
    #[serde(default = "default_identity_delay")]
    pub identity_advance_delay_ms: u64,
    /// `None` waits for the identity provider indefinitely.
    #[serde(default)]
    pub identity_timeout_secs: Option<u64>,
    #[serde(default = "default_debounce")]
    pub lookup_debounce_ms: u64,
}

impl Default for Wizard {
    fn default() -> Self {
        Self {
            identity_advance_delay_ms: default_identity_delay(),
            identity_timeout_secs: None,
            lookup_debounce_ms: default_debounce(),
        }
    }
}

fn default_save_timeout() -> u64 {
    25
}

fn default_auth_url_timeout() -> u64 {
    15
}

fn default_identity_delay() -> u64 {
    1500
}

fn default_debounce() -> u64 {
    400
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// SQLite URL of the session store inside `app.data_dir`.
    pub fn database_url(&self) -> String {
        format!(
            "sqlite://{}/sessions.db",
            self.app.data_dir.trim_end_matches('/')
        )
    }

    pub fn save_timeout(&self) -> Duration {
        Duration::from_secs(self.api.save_timeout_secs)
    }

    pub fn auth_url_timeout(&self) -> Duration {
        Duration::from_secs(self.api.auth_url_timeout_secs)
    }

    pub fn identity_advance_delay(&self) -> Duration {
        Duration::from_millis(self.wizard.identity_advance_delay_ms)
    }

    pub fn identity_timeout(&self) -> Option<Duration> {
        self.wizard.identity_timeout_secs.map(Duration::from_secs)
    }

    pub fn lookup_debounce(&self) -> Duration {
        Duration::from_millis(self.wizard.lookup_debounce_ms)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
/// - `BOARDING_API_URL`, when set, replaces `api.base_url`.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    if let Ok(url) = std::env::var(API_URL_ENV) {
        if !url.trim().is_empty() {
            cfg.api.base_url = url;
        }
    }
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let base = cfg.api.base_url.trim();
    if base.is_empty() {
        return Err(ConfigError::Invalid("api.base_url must be non-empty"));
    }
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(ConfigError::Invalid("api.base_url must be an http(s) URL"));
    }
    if cfg.api.save_timeout_secs == 0 {
        return Err(ConfigError::Invalid("api.save_timeout_secs must be > 0"));
    }
    if cfg.api.auth_url_timeout_secs == 0 {
        return Err(ConfigError::Invalid("api.auth_url_timeout_secs must be > 0"));
    }
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.wizard.identity_timeout_secs == Some(0) {
        return Err(ConfigError::Invalid(
            "wizard.identity_timeout_secs must be > 0 when set",
        ));
    }
    Ok(())
}

/// Returns an example YAML document with every key filled in.
pub fn example() -> &'static str {
    r#"api:
  base_url: "http://localhost:8000"
  save_timeout_secs: 25
  auth_url_timeout_secs: 15

app:
  data_dir: "./data"

wizard:
  identity_advance_delay_ms: 1500
  lookup_debounce_ms: 400
"#
}
