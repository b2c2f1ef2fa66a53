//! Configuration loading for the fightcache client.
//!
//! All fields are required unless explicitly marked optional. The `[cache]`
//! table falls back to the built-in cache policies when absent.

use fightcache_core::CacheConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "FIGHTCACHE_CONFIG";
pub const TOKEN_ENV: &str = "FIGHTCACHE_BEARER_TOKEN";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// GraphQL endpoint, e.g. `https://www.warcraftlogs.com/api/v2/client`.
    pub api_url: String,
    pub auth: AuthConfig,
    pub request_timeout_ms: u64,
    /// Upper bound on event pages fetched for one cache entry.
    pub events_page_limit: u32,
    pub cache: Option<CacheConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub bearer_token: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or FIGHTCACHE_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("Invalid cache config: {0}")]
    Cache(#[from] fightcache_core::ConfigError),
}

impl ClientConfig {
    /// Load from `--config <path>` or `FIGHTCACHE_CONFIG`, then validate.
    ///
    /// A missing `auth.bearer_token` is taken from `FIGHTCACHE_BEARER_TOKEN`
    /// so tokens can stay out of config files.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let mut config = Self::from_path(&path)?;
        if config.auth.bearer_token.is_none() {
            config.auth.bearer_token = std::env::var(TOKEN_ENV).ok();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// The cache section, or the built-in policies.
    pub fn cache_config(&self) -> CacheConfig {
        self.cache.clone().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "api_url",
                reason: "must be an http(s) URL".to_string(),
            });
        }
        match &self.auth.bearer_token {
            None => {
                return Err(ConfigError::InvalidValue {
                    field: "auth.bearer_token",
                    reason: format!("must be provided (or set {})", TOKEN_ENV),
                });
            }
            Some(token) if token.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    field: "auth.bearer_token",
                    reason: "must not be empty".to_string(),
                });
            }
            Some(_) => {}
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.events_page_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "events_page_limit",
                reason: "must be > 0".to_string(),
            });
        }
        if let Some(cache) = &self.cache {
            cache.validate()?;
        }
        Ok(())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV).ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
