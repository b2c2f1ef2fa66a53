//! Client error type.

use fightcache_core::{CacheError, DataDomain, FetchError};

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{domain} is not an event domain")]
    NotAnEventDomain { domain: DataDomain },
    #[error("Invalid auth header: {0}")]
    InvalidHeader(String),
    #[error("Failed to init logging: {0}")]
    Logging(String),
    #[error("Usage: {0}")]
    Usage(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
