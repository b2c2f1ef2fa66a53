//! Error types for cache operations

use crate::{CacheKey, DataDomain, EntryStatus};
use std::fmt;
use thiserror::Error;

/// Failure reported by a fetcher.
///
/// Stored on the cache entry and handed to every subscriber of the key, so
/// it is `Clone` and carries messages rather than source errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {reason}")]
    Network { reason: String },

    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("GraphQL error: {}", messages.join("; "))]
    GraphQl { messages: Vec<String> },

    #[error("Not authorized")]
    Unauthorized,

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("Failed to decode response: {reason}")]
    Decode { reason: String },

    #[error("Fetch cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn network(reason: impl Into<String>) -> Self {
        Self::Network {
            reason: reason.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Operation attempted on a cache entry's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOp {
    Request,
    Supersede,
    Succeed,
    Fail,
}

impl fmt::Display for TransitionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransitionOp::Request => "request",
            TransitionOp::Supersede => "supersede",
            TransitionOp::Succeed => "succeed",
            TransitionOp::Fail => "fail",
        };
        f.write_str(name)
    }
}

/// An operation was applied to an entry in a state that does not allow it.
///
/// This is a programming error, never a runtime condition of correct usage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Illegal transition: {op} on {key} while {from}")]
pub struct TransitionError {
    pub key: CacheKey,
    pub from: EntryStatus,
    pub op: TransitionOp,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config: {reason}")]
    Parse { reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Master error type for the cache layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Transition error: {0}")]
    Transition(#[from] TransitionError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Domain {domain} is already registered with a different payload type")]
    DomainTypeMismatch { domain: DataDomain },
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================
