//! Staleness policy.

use std::time::Duration;

use fightcache_core::{DomainPolicy, EntryStatus, Timestamp};

use super::entry::CacheEntry;

/// Decides whether an entry must be fetched again before it is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StalenessPolicy {
    /// `None` never expires.
    ttl: Option<Duration>,
}

impl StalenessPolicy {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self { ttl }
    }

    /// Entries never go stale once fetched.
    pub fn never_expires() -> Self {
        Self { ttl: None }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Anything but `Succeeded` is stale. A `Succeeded` entry is stale once
    /// strictly more than the TTL has passed since it was fetched.
    pub fn is_stale<T>(&self, entry: &CacheEntry<T>, now: Timestamp) -> bool {
        if entry.status() != EntryStatus::Succeeded {
            return true;
        }
        match (entry.fetched_at(), self.ttl) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(fetched_at), Some(ttl)) => age(fetched_at, now) > ttl,
        }
    }
}

impl From<&DomainPolicy> for StalenessPolicy {
    fn from(policy: &DomainPolicy) -> Self {
        Self::new(policy.ttl())
    }
}

/// Time since `since`, clamped to zero if the clock went backwards.
pub fn age(since: Timestamp, now: Timestamp) -> Duration {
    now.signed_duration_since(since)
        .to_std()
        .unwrap_or(Duration::ZERO)
}
