//! LRU eviction over a domain table.
//!
//! The budget is soft. Entries with a fetch in flight are never evicted, so
//! a domain where everything is loading may sit above its budget until
//! those fetches settle.

use fightcache_core::{CacheKey, DomainPolicy};
use tracing::{debug, warn};

use super::entry::CacheEntry;
use super::store::DomainTable;

/// Capacity limits for one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub max_entries: usize,
    pub max_bytes: usize,
}

impl Budget {
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            max_entries,
            max_bytes,
        }
    }

    pub fn exceeded_by(&self, entries: usize, bytes: usize) -> bool {
        entries > self.max_entries || bytes > self.max_bytes
    }
}

impl From<&DomainPolicy> for Budget {
    fn from(policy: &DomainPolicy) -> Self {
        Self::new(policy.max_entries, policy.max_bytes)
    }
}

/// Result of one eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionOutcome {
    /// Keys removed, in eviction order.
    pub evicted: Vec<CacheKey>,
    /// Bytes released by the removed entries.
    pub freed_bytes: usize,
    /// Still over budget because nothing left was evictable.
    pub overrun: bool,
}

fn evictable<T>(entry: &CacheEntry<T>) -> bool {
    !entry.status().is_in_flight()
}

impl<T> DomainTable<T> {
    pub fn over_budget(&self) -> bool {
        self.budget.exceeded_by(self.len(), self.total_size())
    }

    /// Evict least-recently-used entries until the domain fits its budget.
    ///
    /// In-flight entries are skipped; the scan moves on to the next key in
    /// recency order.
    pub fn enforce_budget(&mut self) -> EvictionOutcome {
        let mut outcome = EvictionOutcome::default();
        let mut bytes = self.total_size();

        while self.budget.exceeded_by(self.len(), bytes) {
            let victim = self
                .order
                .iter()
                .find(|key| self.entries.get(*key).map_or(true, evictable))
                .cloned();

            let Some(key) = victim else {
                warn!(
                    domain = %self.domain,
                    entries = self.len(),
                    bytes,
                    max_entries = self.budget.max_entries,
                    max_bytes = self.budget.max_bytes,
                    "Cache budget exceeded with every entry in flight"
                );
                outcome.overrun = true;
                break;
            };

            if let Some(entry) = self.remove(&key) {
                bytes = bytes.saturating_sub(entry.estimated_size());
                outcome.freed_bytes += entry.estimated_size();
            }
            debug!(domain = %self.domain, key = %key, "Evicted cache entry");
            outcome.evicted.push(key);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::RequestToken;
    use chrono::{TimeZone, Utc};
    use fightcache_core::{DataDomain, FightId, ReportCode, SubScope, Timestamp};
    use std::sync::Arc;

    fn key(fight: u32) -> CacheKey {
        CacheKey::new(
            ReportCode::new("r"),
            SubScope::Fight(FightId::new(fight)),
            DataDomain::DamageEvents,
        )
    }

    fn now() -> Timestamp {
        Utc.timestamp_opt(0, 0).unwrap()
    }

    fn settled(k: &CacheKey, size: usize) -> CacheEntry<u8> {
        let mut entry = CacheEntry::new(now());
        entry.request(k, RequestToken::new(1)).unwrap();
        entry
            .succeed(k, RequestToken::new(1), Arc::new(0), size, now())
            .unwrap();
        entry
    }

    fn loading(k: &CacheKey) -> CacheEntry<u8> {
        let mut entry = CacheEntry::new(now());
        entry.request(k, RequestToken::new(1)).unwrap();
        entry
    }

    #[test]
    fn test_entry_budget_evicts_oldest() {
        let mut table = DomainTable::new(DataDomain::DamageEvents, Budget::new(2, 1000));
        table.put(&key(1), settled(&key(1), 1), now());
        table.put(&key(2), settled(&key(2), 1), now());
        let outcome = table.put(&key(3), settled(&key(3), 1), now());

        assert_eq!(outcome.evicted, vec![key(1)]);
        assert!(!outcome.overrun);
        assert_eq!(table.keys_by_recency(), vec![key(2), key(3)]);
    }

    #[test]
    fn test_byte_budget_evicts_until_fits() {
        let mut table = DomainTable::new(DataDomain::DamageEvents, Budget::new(10, 100));
        table.put(&key(1), settled(&key(1), 40), now());
        table.put(&key(2), settled(&key(2), 40), now());
        let outcome = table.put(&key(3), settled(&key(3), 90), now());

        assert_eq!(outcome.evicted, vec![key(1), key(2)]);
        assert_eq!(outcome.freed_bytes, 80);
        assert_eq!(table.total_size(), 90);
    }

    #[test]
    fn test_in_flight_head_is_skipped() {
        let mut table = DomainTable::new(DataDomain::DamageEvents, Budget::new(2, 1000));
        table.put(&key(1), loading(&key(1)), now());
        table.put(&key(2), settled(&key(2), 1), now());
        let outcome = table.put(&key(3), settled(&key(3), 1), now());

        assert_eq!(outcome.evicted, vec![key(2)]);
        assert!(table.contains(&key(1)));
    }

    #[test]
    fn test_all_in_flight_overruns() {
        let mut table = DomainTable::new(DataDomain::DamageEvents, Budget::new(1, 1000));
        table.put(&key(1), loading(&key(1)), now());
        let outcome = table.put(&key(2), loading(&key(2)), now());

        assert!(outcome.overrun);
        assert!(outcome.evicted.is_empty());
        assert_eq!(table.len(), 2);
        assert!(table.over_budget());
    }
}
