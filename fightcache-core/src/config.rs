//! Cache configuration
//!
//! Every domain is governed by a [`DomainPolicy`]: how long a successful
//! fetch stays fresh and how much the domain may hold before LRU eviction
//! kicks in. Sizes are whatever the payload's
//! [`CachePayload::estimated_size`](crate::CachePayload::estimated_size)
//! reports, so the byte budget is only as accurate as those estimates.
//!
//! # Example
//!
//! ```
//! use fightcache_core::{CacheConfig, DataDomain, DomainPolicy};
//!
//! let config = CacheConfig::default()
//!     .with_domain_policy(DataDomain::ReportFights, DomainPolicy::new(Some(10_000), 16, 1 << 20));
//! assert_eq!(config.policy_for(DataDomain::ReportFights).max_entries, 16);
//! assert!(config.policy_for(DataDomain::DamageEvents).ttl().is_none());
//! ```

use crate::error::ConfigError;
use crate::DataDomain;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;
const REPORT_FIGHTS_TTL_MS: u64 = 30 * 1000;
const DEFAULT_MAX_ENTRIES: usize = 64;
const DEFAULT_MAX_BYTES: usize = 64 * 1024 * 1024;

/// Freshness and capacity policy for one data domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainPolicy {
    /// Milliseconds a successful fetch stays fresh. `None` never expires.
    #[serde(default)]
    pub ttl_ms: Option<u64>,
    /// Maximum number of entries before LRU eviction.
    pub max_entries: usize,
    /// Maximum summed estimated size in bytes before LRU eviction.
    pub max_bytes: usize,
}

impl DomainPolicy {
    pub fn new(ttl_ms: Option<u64>, max_entries: usize, max_bytes: usize) -> Self {
        Self {
            ttl_ms,
            max_entries,
            max_bytes,
        }
    }

    /// Policy whose entries never go stale.
    pub fn immutable(max_entries: usize, max_bytes: usize) -> Self {
        Self::new(None, max_entries, max_bytes)
    }

    /// TTL as a duration; `None` is infinite.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl_ms = ttl.map(|d| d.as_millis().min(u64::MAX as u128) as u64);
        self
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    pub fn with_max_bytes(mut self, max: usize) -> Self {
        self.max_bytes = max;
        self
    }

    fn validate(&self, scope: &str) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::invalid(
                format!("{}.max_entries", scope),
                "must be > 0",
            ));
        }
        if self.max_bytes == 0 {
            return Err(ConfigError::invalid(
                format!("{}.max_bytes", scope),
                "must be > 0",
            ));
        }
        Ok(())
    }
}

impl Default for DomainPolicy {
    fn default() -> Self {
        Self::new(Some(DEFAULT_TTL_MS), DEFAULT_MAX_ENTRIES, DEFAULT_MAX_BYTES)
    }
}

/// Configuration for a cache session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Policy for domains without an override.
    pub default_policy: DomainPolicy,
    /// Per-domain overrides, keyed by kebab-case domain name.
    pub domains: HashMap<DataDomain, DomainPolicy>,
    /// Panic on illegal state transitions instead of logging and ignoring them.
    pub strict_transitions: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let mut domains = HashMap::new();
        // Live logs keep appending fights.
        domains.insert(
            DataDomain::ReportFights,
            DomainPolicy::default().with_ttl(Some(Duration::from_millis(REPORT_FIGHTS_TTL_MS))),
        );
        for domain in DataDomain::ALL.into_iter().filter(DataDomain::is_event_domain) {
            domains.insert(
                domain,
                DomainPolicy::immutable(DEFAULT_MAX_ENTRIES, DEFAULT_MAX_BYTES),
            );
        }

        Self {
            default_policy: DomainPolicy::default(),
            domains,
            strict_transitions: cfg!(debug_assertions),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy in force for a domain.
    pub fn policy_for(&self, domain: DataDomain) -> &DomainPolicy {
        self.domains.get(&domain).unwrap_or(&self.default_policy)
    }

    pub fn with_default_policy(mut self, policy: DomainPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn with_domain_policy(mut self, domain: DataDomain, policy: DomainPolicy) -> Self {
        self.domains.insert(domain, policy);
        self
    }

    pub fn with_strict_transitions(mut self, strict: bool) -> Self {
        self.strict_transitions = strict;
        self
    }

    /// Reject policies that could never hold an entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.default_policy.validate("default_policy")?;
        for (domain, policy) in &self.domains {
            policy.validate(&format!("domains.{}", domain))?;
        }
        Ok(())
    }

    /// Parse a TOML document.
    ///
    /// ```toml
    /// strict_transitions = false
    ///
    /// [default_policy]
    /// ttl_ms = 60000
    /// max_entries = 32
    /// max_bytes = 16777216
    ///
    /// [domains.damage-events]
    /// max_entries = 8
    /// max_bytes = 33554432
    /// ```
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: CacheConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Defaults overridden by environment variables.
    ///
    /// Environment variables (applied to the default policy):
    /// - `FIGHTCACHE_TTL_MS`: freshness window in ms, or `never`
    /// - `FIGHTCACHE_MAX_ENTRIES`: entry cap per domain
    /// - `FIGHTCACHE_MAX_BYTES`: byte budget per domain
    /// - `FIGHTCACHE_STRICT_TRANSITIONS`: "true" or "false"
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply `FIGHTCACHE_*` overrides from an arbitrary lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("FIGHTCACHE_TTL_MS") {
            self.default_policy.ttl_ms = if raw.trim().eq_ignore_ascii_case("never") {
                None
            } else {
                Some(parse_env("FIGHTCACHE_TTL_MS", &raw)?)
            };
        }
        if let Some(raw) = lookup("FIGHTCACHE_MAX_ENTRIES") {
            self.default_policy.max_entries = parse_env("FIGHTCACHE_MAX_ENTRIES", &raw)?;
        }
        if let Some(raw) = lookup("FIGHTCACHE_MAX_BYTES") {
            self.default_policy.max_bytes = parse_env("FIGHTCACHE_MAX_BYTES", &raw)?;
        }
        if let Some(raw) = lookup("FIGHTCACHE_STRICT_TRANSITIONS") {
            self.strict_transitions = raw.trim().eq_ignore_ascii_case("true");
        }
        self.validate()?;
        Ok(self)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(name, format!("cannot parse {:?}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_per_domain() {
        let config = CacheConfig::default();
        assert_eq!(
            config.policy_for(DataDomain::ReportFights).ttl(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            config.policy_for(DataDomain::MasterData).ttl(),
            Some(Duration::from_secs(300))
        );
        for domain in DataDomain::ALL.into_iter().filter(DataDomain::is_event_domain) {
            assert_eq!(config.policy_for(domain).ttl(), None, "{domain}");
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = CacheConfig::new()
            .with_default_policy(DomainPolicy::new(Some(1_000), 4, 4096))
            .with_domain_policy(DataDomain::CastEvents, DomainPolicy::immutable(2, 1024))
            .with_strict_transitions(false);

        assert_eq!(config.policy_for(DataDomain::PlayerData).max_entries, 4);
        assert_eq!(config.policy_for(DataDomain::CastEvents).max_bytes, 1024);
        assert!(!config.strict_transitions);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = CacheConfig::new().with_domain_policy(
            DataDomain::BuffEvents,
            DomainPolicy::immutable(0, 1024),
        );
        let err = config.validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::invalid("domains.buff-events.max_entries", "must be > 0")
        );
    }

    #[test]
    fn test_from_toml_str() {
        let config = CacheConfig::from_toml_str(
            r#"
            strict_transitions = true

            [default_policy]
            ttl_ms = 60000
            max_entries = 32
            max_bytes = 1048576

            [domains.damage-events]
            max_entries = 8
            max_bytes = 4096
            "#,
        )
        .unwrap();

        assert!(config.strict_transitions);
        assert_eq!(config.default_policy.ttl(), Some(Duration::from_secs(60)));
        let damage = config.policy_for(DataDomain::DamageEvents);
        assert_eq!(damage.ttl(), None);
        assert_eq!(damage.max_entries, 8);
        // Overrides replace the built-in table wholesale.
        assert_eq!(config.policy_for(DataDomain::ReportFights).max_entries, 32);
    }

    #[test]
    fn test_from_toml_str_rejects_unknown_domain() {
        let err = CacheConfig::from_toml_str(
            r#"
            [domains.healing]
            max_entries = 8
            max_bytes = 4096
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = CacheConfig::from_path(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.toml");
        std::fs::write(&path, "strict_transitions = false\n").unwrap();
        let config = CacheConfig::from_path(&path).unwrap();
        assert!(!config.strict_transitions);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FIGHTCACHE_TTL_MS", "never"),
            ("FIGHTCACHE_MAX_ENTRIES", "12"),
            ("FIGHTCACHE_STRICT_TRANSITIONS", "TRUE"),
        ]
        .into_iter()
        .collect();

        let config = CacheConfig::default()
            .with_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.default_policy.ttl(), None);
        assert_eq!(config.default_policy.max_entries, 12);
        assert_eq!(config.default_policy.max_bytes, DEFAULT_MAX_BYTES);
        assert!(config.strict_transitions);
    }

    #[test]
    fn test_env_override_parse_failure() {
        let err = CacheConfig::default()
            .with_overrides(|name| (name == "FIGHTCACHE_MAX_BYTES").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
