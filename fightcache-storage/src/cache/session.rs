//! Session lifecycle.
//!
//! A [`CacheSession`] is constructed when a user session starts and torn
//! down on sign-out. It hands out one [`ResourceCache`] per domain, each with
//! the payload type fixed the first time the domain is registered.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fightcache_core::{
    CacheConfig, CacheError, CachePayload, CacheResult, Clock, DataDomain, SystemClock,
};
use tracing::info;

use super::facade::ResourceCache;
use super::stats::CacheStats;

/// Type-erased handle on one domain's cache.
pub trait DomainControl: Send + Sync {
    fn domain(&self) -> DataDomain;

    /// Drop every entry and cancel every fetch. Returns entries removed.
    fn clear(&self) -> usize;

    fn stats(&self) -> CacheStats;

    fn as_any(&self) -> &dyn Any;
}

impl<T: CachePayload> DomainControl for ResourceCache<T> {
    fn domain(&self) -> DataDomain {
        ResourceCache::domain(self)
    }

    fn clear(&self) -> usize {
        ResourceCache::clear(self)
    }

    fn stats(&self) -> CacheStats {
        ResourceCache::stats(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Every domain cache of one session.
pub struct CacheSession {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    domains: Mutex<HashMap<DataDomain, Arc<dyn DomainControl>>>,
}

impl std::fmt::Debug for CacheSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let domains: Vec<DataDomain> = self.lock().keys().copied().collect();
        f.debug_struct("CacheSession")
            .field("config", &self.config)
            .field("domains", &domains)
            .finish()
    }
}

impl CacheSession {
    /// Validate `config` and start an empty session.
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            domains: Mutex::new(HashMap::new()),
        })
    }

    /// Session on the wall clock.
    pub fn with_system_clock(config: CacheConfig) -> CacheResult<Self> {
        Self::new(config, Arc::new(SystemClock))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DataDomain, Arc<dyn DomainControl>>> {
        self.domains.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// The cache for `domain`, created on first use.
    ///
    /// Fails with [`CacheError::DomainTypeMismatch`] when the domain was
    /// already registered with another payload type.
    pub fn resource<T: CachePayload>(&self, domain: DataDomain) -> CacheResult<ResourceCache<T>> {
        let mut domains = self.lock();
        if let Some(existing) = domains.get(&domain) {
            return existing
                .as_any()
                .downcast_ref::<ResourceCache<T>>()
                .cloned()
                .ok_or(CacheError::DomainTypeMismatch { domain });
        }
        let cache = ResourceCache::<T>::new(domain, &self.config, Arc::clone(&self.clock));
        domains.insert(domain, Arc::new(cache.clone()));
        Ok(cache)
    }

    /// Domains registered so far, in declaration order.
    pub fn domains(&self) -> Vec<DataDomain> {
        let mut domains: Vec<_> = self.lock().keys().copied().collect();
        domains.sort();
        domains
    }

    /// Clear one domain. Returns entries removed; zero if never registered.
    pub fn clear_domain(&self, domain: DataDomain) -> usize {
        let control = self.lock().get(&domain).cloned();
        control.map_or(0, |control| control.clear())
    }

    /// Clear every domain, as on sign-out. Returns entries removed.
    ///
    /// Registered domains stay registered, so handles held by consumers keep
    /// working against the emptied caches.
    pub fn teardown(&self) -> usize {
        let controls: Vec<_> = self.lock().values().cloned().collect();
        let removed: usize = controls.iter().map(|control| control.clear()).sum();
        info!(domains = controls.len(), removed, "Cache session torn down");
        removed
    }

    pub fn stats(&self) -> BTreeMap<DataDomain, CacheStats> {
        let controls: Vec<_> = self.lock().values().cloned().collect();
        controls
            .into_iter()
            .map(|control| (control.domain(), control.stats()))
            .collect()
    }

    /// Counters summed over every domain.
    pub fn total_stats(&self) -> CacheStats {
        self.stats()
            .values()
            .fold(CacheStats::default(), |mut total, stats| {
                total.absorb(stats);
                total
            })
    }
}
