//! Per-domain cache statistics.

use serde::Serialize;

/// Counters for one domain since it was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Fresh entries served without a fetch.
    pub hits: u64,
    /// Stale entries served while a refresh started.
    pub stale_hits: u64,
    /// Requests with nothing to serve.
    pub misses: u64,
    /// Requests that joined a fetch already in flight.
    pub joins: u64,
    /// Responses dropped because a newer fetch owned the key.
    pub superseded: u64,
    /// Fetches that failed.
    pub failures: u64,
    /// Entries removed to stay within budget.
    pub evictions: u64,
    /// Entries currently cached.
    pub entry_count: u64,
    /// Sum of the entries' estimated sizes.
    pub estimated_bytes: u64,
}

impl CacheStats {
    /// Share of requests answered with data, fresh or stale (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.stale_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    /// Add another domain's counters into this one.
    pub fn absorb(&mut self, other: &CacheStats) {
        self.hits += other.hits;
        self.stale_hits += other.stale_hits;
        self.misses += other.misses;
        self.joins += other.joins;
        self.superseded += other.superseded;
        self.failures += other.failures;
        self.evictions += other.evictions;
        self.entry_count += other.entry_count;
        self.estimated_bytes += other.estimated_bytes;
    }
}
