//! Connection settings for the management endpoint.
//!
//! Values are layered: built-in defaults, then the JSON configuration file,
//! then `HAL_*` environment variables. Callers (the CLI) apply their own
//! overrides on top.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use dirs_next::config_dir;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::endpoints::Topology;
use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:9990";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_CONFIG_PATH: &str = "HAL_CONFIG_PATH";
const ENV_MANAGEMENT_URL: &str = "HAL_MANAGEMENT_URL";
const ENV_USERNAME: &str = "HAL_USERNAME";
const ENV_PASSWORD: &str = "HAL_PASSWORD";
const ENV_TIMEOUT_SECS: &str = "HAL_TIMEOUT_SECS";
const ENV_DOMAIN: &str = "HAL_DOMAIN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DispatchConfig {
    /// Base URL of the management interface, e.g. `http://localhost:9990`.
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Transport timeout applied by the HTTP client.
    pub timeout_secs: u64,
    /// `false` when the managed runtime is a multi-server domain.
    pub standalone: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            username: None,
            password: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            standalone: true,
        }
    }
}

impl DispatchConfig {
    /// Loads the configuration file (if present) and applies the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file(&default_config_path())?;
        config.apply_env()?;
        Ok(config)
    }

    /// Reads a configuration file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Overrides fields from `HAL_*` environment variables.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = non_empty_env(ENV_MANAGEMENT_URL) {
            self.base_url = url;
        }
        if let Some(username) = non_empty_env(ENV_USERNAME) {
            self.username = Some(username);
        }
        if let Some(password) = non_empty_env(ENV_PASSWORD) {
            self.password = Some(password);
        }
        if let Some(timeout) = non_empty_env(ENV_TIMEOUT_SECS) {
            self.timeout_secs = timeout.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: ENV_TIMEOUT_SECS,
                value: timeout.clone(),
            })?;
        }
        if let Some(domain) = non_empty_env(ENV_DOMAIN) {
            self.standalone = !matches!(domain.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    pub fn topology(&self) -> Topology {
        if self.standalone { Topology::Standalone } else { Topology::Domain }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.display().to_string(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Path of the configuration file: `HAL_CONFIG_PATH` or `<config dir>/hal/console.json`.
pub fn default_config_path() -> PathBuf {
    if let Some(path) = non_empty_env(ENV_CONFIG_PATH) {
        return expand_tilde(&path);
    }

    config_dir().unwrap_or_else(|| PathBuf::from(".")).join("hal").join("console.json")
}

/// Checks that a base URL is usable for the management interface.
///
/// Only `http` and `https` are accepted and a host is mandatory.
pub fn validate_base_url(base: &str) -> Result<Url, ConfigError> {
    let parsed = Url::parse(base).map_err(|error| ConfigError::InvalidUrl {
        url: base.to_string(),
        reason: error.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            url: base.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::InvalidUrl {
            url: base.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(parsed)
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs_next::home_dir().map(|home| home.join(rest)).unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
