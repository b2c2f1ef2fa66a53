//! Per-domain cache facade.
//!
//! [`ResourceCache<T>`] is the only type consumers touch. It owns one
//! domain's table, coordinator and subscribers behind a single lock. No
//! lock is held across an await: fetches run on spawned tasks and come
//! back through [`ResourceCache::complete`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fightcache_core::{
    CacheConfig, CacheKey, CachePayload, Clock, DataDomain, DomainPolicy, EntryStatus, FetchError,
    Fetcher, ReportCode, SubScope, Timestamp,
};
use tracing::{debug, info, warn};

use super::coordinator::{Acquired, PendingFetch, RequestCoordinator};
use super::entry::{CacheEntry, Completion, RequestToken, TransitionGuard};
use super::eviction::Budget;
use super::freshness::StalenessPolicy;
use super::stats::CacheStats;
use super::store::DomainTable;
use super::subscription::{ResourceState, Subscribers, Subscription};

/// A fetcher shared between the caller and the spawned fetch task.
pub type SharedFetcher<T> = Arc<dyn Fetcher<T>>;

struct DomainState<T> {
    table: DomainTable<T>,
    coordinator: RequestCoordinator<T>,
    subscribers: Subscribers<T>,
    stats: CacheStats,
}

struct Inner<T> {
    domain: DataDomain,
    policy: DomainPolicy,
    staleness: StalenessPolicy,
    guard: TransitionGuard,
    clock: Arc<dyn Clock>,
    state: Mutex<DomainState<T>>,
}

/// Cache for one data domain. Cheap to clone; clones share state.
pub struct ResourceCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ResourceCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for ResourceCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("domain", &self.inner.domain)
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

impl<T: CachePayload> ResourceCache<T> {
    /// Cache for `domain` using the policy `config` assigns to it.
    pub fn new(domain: DataDomain, config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_policy(
            domain,
            config.policy_for(domain).clone(),
            config.strict_transitions,
            clock,
        )
    }

    pub fn with_policy(
        domain: DataDomain,
        policy: DomainPolicy,
        strict_transitions: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = DomainState {
            table: DomainTable::new(domain, Budget::from(&policy)),
            coordinator: RequestCoordinator::new(),
            subscribers: Subscribers::new(),
            stats: CacheStats::default(),
        };
        Self {
            inner: Arc::new(Inner {
                domain,
                staleness: StalenessPolicy::from(&policy),
                policy,
                guard: TransitionGuard::new(strict_transitions),
                clock,
                state: Mutex::new(state),
            }),
        }
    }

    // Every critical section leaves the state consistent before it can
    // panic, so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, DomainState<T>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn domain(&self) -> DataDomain {
        self.inner.domain
    }

    pub fn policy(&self) -> &DomainPolicy {
        &self.inner.policy
    }

    pub fn key(&self, report: &ReportCode, sub_scope: SubScope) -> CacheKey {
        CacheKey::new(report.clone(), sub_scope, self.inner.domain)
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Current state for a context, without touching recency or fetching.
    pub fn peek(&self, report: &ReportCode, sub_scope: SubScope) -> ResourceState<T> {
        self.peek_key(&self.key(report, sub_scope))
    }

    pub fn peek_key(&self, key: &CacheKey) -> ResourceState<T> {
        self.lock()
            .table
            .get(key)
            .map(CacheEntry::state)
            .unwrap_or_default()
    }

    /// Listen to a context without requesting it.
    pub fn observe(&self, report: &ReportCode, sub_scope: SubScope) -> Subscription<T> {
        let key = self.key(report, sub_scope);
        let mut state = self.lock();
        let current = state
            .table
            .get(&key)
            .map(CacheEntry::state)
            .unwrap_or_default();
        state.subscribers.subscribe(&key, current)
    }

    /// Listen to a context and make sure it is loaded.
    ///
    /// The subscription is registered before the request, so it sees the
    /// `Loading`/`Refreshing` transition and everything after it.
    pub fn subscribe(
        &self,
        report: &ReportCode,
        sub_scope: SubScope,
        fetcher: &SharedFetcher<T>,
    ) -> Subscription<T> {
        let subscription = self.observe(report, sub_scope);
        self.request(report, sub_scope, fetcher);
        subscription
    }

    /// Serve a context, starting or joining a fetch when it is missing or
    /// stale. Returns the state as of this call.
    ///
    /// Must run inside a Tokio runtime for the fetch to make progress;
    /// without one the fetch fails immediately.
    pub fn request(
        &self,
        report: &ReportCode,
        sub_scope: SubScope,
        fetcher: &SharedFetcher<T>,
    ) -> ResourceState<T> {
        self.run(&self.key(report, sub_scope), fetcher).0
    }

    /// Data for a context.
    ///
    /// Cached data is returned at once, fresh or stale. Otherwise waits for
    /// the fetch and returns its error if it fails.
    pub async fn fetch(
        &self,
        report: &ReportCode,
        sub_scope: SubScope,
        fetcher: &SharedFetcher<T>,
    ) -> Result<Arc<T>, FetchError> {
        let (state, pending) = self.run(&self.key(report, sub_scope), fetcher);
        if let Some(data) = state.data {
            return Ok(data);
        }
        match pending {
            Some(pending) => pending.wait().await,
            None => Err(state.error.unwrap_or(FetchError::Cancelled)),
        }
    }

    /// Start a new fetch even if one is in flight.
    ///
    /// The running fetch is superseded; its waiters receive this fetch's
    /// result instead.
    pub fn refresh(
        &self,
        report: &ReportCode,
        sub_scope: SubScope,
        fetcher: &SharedFetcher<T>,
    ) -> PendingFetch<T> {
        let key = self.key(report, sub_scope);
        let now = self.inner.clock.now();
        let acquired = self.acquire_locked(&mut self.lock(), &key, now, true);
        self.dispatch(&key, fetcher, acquired)
    }

    fn run(
        &self,
        key: &CacheKey,
        fetcher: &SharedFetcher<T>,
    ) -> (ResourceState<T>, Option<PendingFetch<T>>) {
        let now = self.inner.clock.now();
        let (current, acquired) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            if let Some(hit) = self.serve_fresh(state, key, now) {
                return (hit, None);
            }
            let acquired = self.acquire_locked(state, key, now, false);
            let current = state
                .table
                .get(key)
                .map(CacheEntry::state)
                .unwrap_or_default();
            (current, acquired)
        };
        (current, Some(self.dispatch(key, fetcher, acquired)))
    }

    fn serve_fresh(
        &self,
        state: &mut DomainState<T>,
        key: &CacheKey,
        now: Timestamp,
    ) -> Option<ResourceState<T>> {
        let entry = state.table.get(key)?;
        if self.inner.staleness.is_stale(entry, now) {
            return None;
        }
        let current = entry.state();
        state.table.touch(key, now);
        state.stats.hits += 1;
        debug!(domain = %self.inner.domain, key = %key, "Cache hit");
        Some(current)
    }

    // ========================================================================
    // SINGLE-FLIGHT
    // ========================================================================

    /// The raw single-flight contract.
    ///
    /// Joins the fetch in flight for `key`, or makes the caller the owner of
    /// a new one. Does not consult freshness. An owner must finish with
    /// [`ResourceCache::complete`] using its token.
    pub fn acquire(&self, key: &CacheKey) -> Acquired<T> {
        let now = self.inner.clock.now();
        self.acquire_locked(&mut self.lock(), key, now, false)
    }

    /// Like [`ResourceCache::acquire`], but always makes the caller the owner,
    /// superseding any fetch in flight.
    pub fn supersede(&self, key: &CacheKey) -> Acquired<T> {
        let now = self.inner.clock.now();
        self.acquire_locked(&mut self.lock(), key, now, true)
    }

    fn acquire_locked(
        &self,
        state: &mut DomainState<T>,
        key: &CacheKey,
        now: Timestamp,
        force: bool,
    ) -> Acquired<T> {
        let domain = self.inner.domain;

        if !force {
            if let Some(entry) = state.table.get(key) {
                if entry.status().is_in_flight() {
                    if let Some(pending) = state.coordinator.join(key) {
                        state.stats.joins += 1;
                        debug!(domain = %domain, key = %key, "Joined in-flight fetch");
                        return Acquired::Joined { pending };
                    }
                }
            }
        }

        let (token, pending) = state.coordinator.begin(key);
        let inserted = !state.table.contains(key);
        let entry = state.table.get_or_insert_idle(key, now);
        let from = entry.status();
        let moved = if from.is_in_flight() {
            entry.supersede(key, token).map(|()| from)
        } else {
            entry.request(key, token)
        };
        let Some(to) = self.inner.guard.check(moved) else {
            state.coordinator.cancel(key);
            return Acquired::Joined { pending };
        };
        let published = entry.state();

        if !force {
            match from {
                EntryStatus::Succeeded => {
                    state.table.touch(key, now);
                    state.stats.stale_hits += 1;
                }
                _ => state.stats.misses += 1,
            }
        }
        if to != from {
            state.subscribers.publish(key, published);
        }
        if inserted {
            Self::enforce_budget(state);
        }
        debug!(
            domain = %domain,
            key = %key,
            token = %token,
            from = %from,
            to = %to,
            "Started fetch"
        );
        Acquired::Owner { token, pending }
    }

    fn enforce_budget(state: &mut DomainState<T>) {
        let outcome = state.table.enforce_budget();
        state.stats.evictions += outcome.evicted.len() as u64;
        for key in &outcome.evicted {
            state.subscribers.evict(key);
        }
    }

    fn dispatch(
        &self,
        key: &CacheKey,
        fetcher: &SharedFetcher<T>,
        acquired: Acquired<T>,
    ) -> PendingFetch<T> {
        match acquired {
            Acquired::Owner { token, pending } => {
                self.spawn_fetch(key.clone(), token, Arc::clone(fetcher));
                pending
            }
            Acquired::Joined { pending } => pending,
        }
    }

    fn spawn_fetch(&self, key: CacheKey, token: RequestToken, fetcher: SharedFetcher<T>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(domain = %self.inner.domain, key = %key, "No Tokio runtime to run fetch");
            self.complete(
                &key,
                token,
                Err(FetchError::other("no async runtime available for fetch")),
            );
            return;
        };
        let cache = self.clone();
        runtime.spawn(async move {
            let result = fetcher.fetch(key.report(), key.sub_scope()).await;
            cache.complete(&key, token, result);
        });
    }

    /// Settle the fetch identified by `token`.
    ///
    /// A token that owns neither the entry nor the flight belongs to a
    /// superseded fetch, and the result is dropped. A token that still owns
    /// the flight but not the entry (the entry was invalidated meanwhile)
    /// delivers to the flight's waiters without recreating the entry.
    pub fn complete(
        &self,
        key: &CacheKey,
        token: RequestToken,
        result: Result<T, FetchError>,
    ) -> Completion {
        let now = self.inner.clock.now();
        let domain = self.inner.domain;
        let result = result.map(|data| {
            let size = data.estimated_size();
            (Arc::new(data), size)
        });

        let mut guard = self.lock();
        let state = &mut *guard;

        let owns_entry = state
            .table
            .get(key)
            .is_some_and(|entry| entry.is_current(token));
        let owns_flight = state.coordinator.current_token(key) == Some(token);
        if !owns_entry && !owns_flight {
            state.stats.superseded += 1;
            warn!(domain = %domain, key = %key, token = %token, "Discarding superseded response");
            return Completion::Superseded;
        }

        if let Err(err) = &result {
            state.stats.failures += 1;
            debug!(domain = %domain, key = %key, error = %err, "Fetch failed");
        }

        if owns_entry {
            if let Some(entry) = state.table.entry_mut(key) {
                let moved = match &result {
                    Ok((data, size)) => entry.succeed(key, token, Arc::clone(data), *size, now),
                    Err(err) => entry.fail(key, token, err.clone()),
                };
                if self.inner.guard.check(moved) == Some(Completion::Applied) {
                    let published = entry.state();
                    if result.is_ok() {
                        state.table.touch(key, now);
                    }
                    state.subscribers.publish(key, published);
                    Self::enforce_budget(state);
                }
            }
        }

        if owns_flight {
            state
                .coordinator
                .complete(key, token, result.map(|(data, _)| data));
        }
        Completion::Applied
    }

    // ========================================================================
    // INVALIDATION
    // ========================================================================

    /// Drop the entry for a context and publish `Idle`.
    ///
    /// A fetch in flight keeps running for its waiters but no longer writes
    /// to the cache.
    pub fn invalidate(&self, report: &ReportCode, sub_scope: SubScope) -> bool {
        self.invalidate_key(&self.key(report, sub_scope))
    }

    pub fn invalidate_key(&self, key: &CacheKey) -> bool {
        let mut state = self.lock();
        let removed = state.table.remove(key).is_some();
        if removed {
            state.subscribers.publish(key, ResourceState::idle());
            debug!(domain = %self.inner.domain, key = %key, "Invalidated cache entry");
        }
        removed
    }

    /// Invalidate every sub-scope of one report. Returns the entries removed.
    pub fn invalidate_report(&self, report: &ReportCode) -> usize {
        let mut state = self.lock();
        let keys = state.table.keys_for_report(report);
        for key in &keys {
            state.table.remove(key);
            state.subscribers.publish(key, ResourceState::idle());
        }
        info!(
            domain = %self.inner.domain,
            report = %report,
            removed = keys.len(),
            "Invalidated report"
        );
        keys.len()
    }

    /// Drop every entry and cancel every fetch in flight.
    ///
    /// Waiters receive [`FetchError::Cancelled`] and subscribers see `Idle`.
    /// Returns the number of entries removed.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let removed = state.table.clear();
        let cancelled = state.coordinator.cancel_all();
        state.subscribers.reset_all();
        info!(
            domain = %self.inner.domain,
            removed,
            cancelled,
            "Cleared cache domain"
        );
        removed
    }

    // ========================================================================
    // INTROSPECTION
    // ========================================================================

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entry_count: state.table.len() as u64,
            estimated_bytes: state.table.total_size() as u64,
            ..state.stats
        }
    }

    pub fn len(&self) -> usize {
        self.lock().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().table.is_empty()
    }

    /// Number of fetches in flight.
    pub fn in_flight(&self) -> usize {
        self.lock().coordinator.in_flight()
    }

    /// Number of keys with at least one live subscriber.
    pub fn watched_keys(&self) -> usize {
        self.lock().subscribers.watched_keys()
    }

    /// Cached keys from least to most recently used.
    pub fn keys_by_recency(&self) -> Vec<CacheKey> {
        self.lock().table.keys_by_recency()
    }

    /// Check table, access-order and token invariants.
    pub fn check_invariants(&self) -> Result<(), String> {
        let state = self.lock();
        state.table.check_invariants()?;
        for key in state.table.keys_by_recency() {
            let token = state.table.get(&key).and_then(CacheEntry::inflight_token);
            if let Some(token) = token {
                if state.coordinator.current_token(&key) != Some(token) {
                    return Err(format!("{} owned by {} without a matching flight", key, token));
                }
            }
        }
        Ok(())
    }
}
