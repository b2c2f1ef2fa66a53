//! Domain tables and access-order tracking.

use std::collections::{BTreeMap, HashMap};

use fightcache_core::{CacheKey, DataDomain, ReportCode, Timestamp};

use super::entry::CacheEntry;
use super::eviction::{Budget, EvictionOutcome};

/// Recency order of the keys in one domain, least recent first.
///
/// Each touch stamps the key with a fresh sequence number, so moving a key
/// to the tail and finding the head are both logarithmic.
#[derive(Debug, Clone, Default)]
pub struct AccessOrder {
    next_seq: u64,
    by_seq: BTreeMap<u64, CacheKey>,
    by_key: HashMap<CacheKey, u64>,
}

impl AccessOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `key` to the most-recent end, inserting it if absent.
    pub fn touch(&mut self, key: &CacheKey) {
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(old) = self.by_key.insert(key.clone(), seq) {
            self.by_seq.remove(&old);
        }
        self.by_seq.insert(seq, key.clone());
    }

    pub fn remove(&mut self, key: &CacheKey) -> bool {
        match self.by_key.remove(key) {
            Some(seq) => {
                self.by_seq.remove(&seq);
                true
            }
            None => false,
        }
    }

    /// Least recently used key.
    pub fn head(&self) -> Option<&CacheKey> {
        self.by_seq.values().next()
    }

    /// Keys from least to most recently used.
    pub fn iter(&self) -> impl Iterator<Item = &CacheKey> {
        self.by_seq.values()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_seq.clear();
        self.by_key.clear();
    }
}

/// Entries of one data domain plus their access order.
///
/// Every key in `entries` is in `order` and vice versa. All mutation goes
/// through these methods so the two never drift apart.
#[derive(Debug)]
pub struct DomainTable<T> {
    pub(super) domain: DataDomain,
    pub(super) entries: HashMap<CacheKey, CacheEntry<T>>,
    pub(super) order: AccessOrder,
    pub(super) budget: Budget,
}

impl<T> DomainTable<T> {
    pub fn new(domain: DataDomain, budget: Budget) -> Self {
        Self {
            domain,
            entries: HashMap::new(),
            order: AccessOrder::new(),
            budget,
        }
    }

    pub fn domain(&self) -> DataDomain {
        self.domain
    }

    pub fn budget(&self) -> Budget {
        self.budget
    }

    /// Read an entry without side effects.
    pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    pub(crate) fn entry_mut(&mut self, key: &CacheKey) -> Option<&mut CacheEntry<T>> {
        self.entries.get_mut(key)
    }

    /// Existing entry for `key`, or a new `Idle` one placed at the tail.
    pub(crate) fn get_or_insert_idle(
        &mut self,
        key: &CacheKey,
        now: Timestamp,
    ) -> &mut CacheEntry<T> {
        if !self.entries.contains_key(key) {
            self.order.touch(key);
        }
        self.entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(now))
    }

    /// Record a read-hit or write: bump the access stats and move the key to
    /// the tail. Returns false when the key is absent.
    pub fn touch(&mut self, key: &CacheKey, now: Timestamp) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.record_access(now);
                self.order.touch(key);
                true
            }
            None => false,
        }
    }

    /// Upsert an entry, touch it and enforce the budget.
    pub fn put(&mut self, key: &CacheKey, entry: CacheEntry<T>, now: Timestamp) -> EvictionOutcome {
        self.entries.insert(key.clone(), entry);
        self.touch(key, now);
        self.enforce_budget()
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry<T>> {
        self.order.remove(key);
        self.entries.remove(key)
    }

    /// Drop every entry. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.order.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Sum of the entries' estimated sizes.
    pub fn total_size(&self) -> usize {
        self.entries.values().map(CacheEntry::estimated_size).sum()
    }

    pub fn keys_by_recency(&self) -> Vec<CacheKey> {
        self.order.iter().cloned().collect()
    }

    pub fn keys_for_report(&self, report: &ReportCode) -> Vec<CacheKey> {
        self.order
            .iter()
            .filter(|key| key.belongs_to(report))
            .cloned()
            .collect()
    }

    /// Check the table/order bijection and every entry's invariants.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.entries.len() != self.order.len() {
            return Err(format!(
                "{} entries but {} keys in access order",
                self.entries.len(),
                self.order.len()
            ));
        }
        for (key, entry) in &self.entries {
            if !self.order.contains(key) {
                return Err(format!("{} missing from access order", key));
            }
            if key.domain() != self.domain {
                return Err(format!("{} stored in the {} table", key, self.domain));
            }
            entry
                .check_invariants()
                .map_err(|reason| format!("{}: {}", key, reason))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fightcache_core::{FightId, SubScope};

    fn key(report: &str, fight: u32) -> CacheKey {
        CacheKey::new(
            ReportCode::new(report),
            SubScope::Fight(FightId::new(fight)),
            DataDomain::CastEvents,
        )
    }

    fn now() -> Timestamp {
        Utc.timestamp_opt(100, 0).unwrap()
    }

    #[test]
    fn test_access_order_moves_to_tail() {
        let (a, b, c) = (key("r", 1), key("r", 2), key("r", 3));
        let mut order = AccessOrder::new();
        order.touch(&a);
        order.touch(&b);
        order.touch(&c);
        order.touch(&a);

        let keys: Vec<_> = order.iter().cloned().collect();
        assert_eq!(keys, vec![b.clone(), c.clone(), a.clone()]);
        assert_eq!(order.head(), Some(&b));
        assert_eq!(order.len(), 3);

        assert!(order.remove(&b));
        assert!(!order.remove(&b));
        assert_eq!(order.head(), Some(&c));
    }

    #[test]
    fn test_put_touch_remove_keep_bijection() {
        let mut table = DomainTable::<String>::new(DataDomain::CastEvents, Budget::new(10, 1000));
        let (a, b) = (key("r", 1), key("r", 2));

        table.put(&a, CacheEntry::new(now()), now());
        table.put(&b, CacheEntry::new(now()), now());
        assert!(table.touch(&a, now()));
        assert_eq!(table.get(&a).unwrap().access_count(), 2);
        assert_eq!(table.keys_by_recency(), vec![b.clone(), a.clone()]);
        table.check_invariants().unwrap();

        assert!(table.remove(&a).is_some());
        assert!(!table.touch(&a, now()));
        assert_eq!(table.len(), 1);
        table.check_invariants().unwrap();

        assert_eq!(table.clear(), 1);
        assert!(table.is_empty());
        table.check_invariants().unwrap();
    }

    #[test]
    fn test_get_has_no_side_effects() {
        let mut table = DomainTable::<String>::new(DataDomain::CastEvents, Budget::new(10, 1000));
        let (a, b) = (key("r", 1), key("r", 2));
        table.put(&a, CacheEntry::new(now()), now());
        table.put(&b, CacheEntry::new(now()), now());

        assert!(table.get(&a).is_some());
        assert_eq!(table.get(&a).unwrap().access_count(), 1);
        assert_eq!(table.keys_by_recency(), vec![a, b]);
    }

    #[test]
    fn test_keys_for_report() {
        let mut table = DomainTable::<String>::new(DataDomain::CastEvents, Budget::new(10, 1000));
        for k in [key("one", 1), key("two", 1), key("one", 2)] {
            table.put(&k, CacheEntry::new(now()), now());
        }
        let keys = table.keys_for_report(&ReportCode::new("one"));
        assert_eq!(keys, vec![key("one", 1), key("one", 2)]);
    }
}
