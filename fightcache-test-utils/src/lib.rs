//! fightcache Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - Proptest generators for report contexts and domains
//! - Fixture payloads with controllable size
//! - Mock fetchers (static, failing, and gated ones the test resolves by hand)

pub use fightcache_core::{
    CacheConfig, CacheKey, CachePayload, Clock, DataDomain, DomainPolicy, EntryStatus, FetchError,
    Fetcher, FightId, ManualClock, ReportCode, SubScope, Timestamp,
};

use async_trait::async_trait;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};

// ============================================================================
// GENERATORS
// ============================================================================

/// Report codes, including the characters the key encoding uses.
pub fn arb_report_code() -> impl Strategy<Value = ReportCode> {
    "[a-zA-Z0-9]{1,16}|[a-z|:*]{0,6}".prop_map(ReportCode::new)
}

pub fn arb_fight_id() -> impl Strategy<Value = FightId> {
    (0u32..500).prop_map(FightId::new)
}

pub fn arb_sub_scope() -> impl Strategy<Value = SubScope> {
    prop_oneof![
        Just(SubScope::All),
        arb_fight_id().prop_map(SubScope::Fight),
    ]
}

pub fn arb_domain() -> impl Strategy<Value = DataDomain> {
    prop::sample::select(DataDomain::ALL.to_vec())
}

pub fn arb_cache_key() -> impl Strategy<Value = CacheKey> {
    (arb_report_code(), arb_sub_scope(), arb_domain())
        .prop_map(|(report, scope, domain)| CacheKey::new(report, scope, domain))
}

/// Cache keys for fights `0..count` of one report, in one domain.
pub fn fight_keys(report: &str, domain: DataDomain, count: u32) -> Vec<CacheKey> {
    (0..count)
        .map(|id| CacheKey::new(ReportCode::new(report), SubScope::Fight(FightId::new(id)), domain))
        .collect()
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Payload with an explicit size, for budget arithmetic in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPayload {
    pub label: String,
    pub size: usize,
}

impl TestPayload {
    pub fn new(label: impl Into<String>, size: usize) -> Self {
        Self {
            label: label.into(),
            size,
        }
    }

    /// A payload weighing one byte.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self::new(label, 1)
    }
}

impl CachePayload for TestPayload {
    fn estimated_size(&self) -> usize {
        self.size
    }
}

/// Config with one policy applied to every domain.
pub fn uniform_config(policy: DomainPolicy) -> CacheConfig {
    DataDomain::ALL
        .into_iter()
        .fold(CacheConfig::new(), |config, domain| {
            config.with_domain_policy(domain, policy.clone())
        })
        .with_default_policy(policy)
        .with_strict_transitions(true)
}

/// Manual clock paired with an `Arc<dyn Clock>` handle for the cache.
pub fn manual_clock() -> (ManualClock, Arc<dyn Clock>) {
    let clock = ManualClock::at_epoch();
    let handle: Arc<dyn Clock> = Arc::new(clock.clone());
    (clock, handle)
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

// ============================================================================
// MOCK FETCHERS
// ============================================================================

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolves immediately with a clone of a fixed value and counts calls.
#[derive(Debug, Clone)]
pub struct StaticFetcher<T> {
    value: T,
    calls: Arc<AtomicUsize>,
}

impl<T: Clone + Send + Sync + 'static> StaticFetcher<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Fetcher<T> for StaticFetcher<T> {
    async fn fetch(&self, _report: &ReportCode, _sub_scope: SubScope) -> Result<T, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.value.clone())
    }
}

/// Always fails with the given error.
#[derive(Debug, Clone)]
pub struct FailingFetcher {
    error: FetchError,
    calls: Arc<AtomicUsize>,
}

impl FailingFetcher {
    pub fn new(error: FetchError) -> Self {
        Self {
            error,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Send + 'static> Fetcher<T> for FailingFetcher {
    async fn fetch(&self, _report: &ReportCode, _sub_scope: SubScope) -> Result<T, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

type Gate<T> = oneshot::Sender<Result<T, FetchError>>;

/// A fetcher whose calls park until the test resolves them.
///
/// Call `n` (zero-based, in arrival order) is released with
/// [`GatedFetcher::resolve`]. Clones share the same call log, so one handle
/// can go to the cache while the test keeps another.
pub struct GatedFetcher<T> {
    gates: Arc<Mutex<Vec<Option<Gate<T>>>>>,
    requests: Arc<Mutex<Vec<(ReportCode, SubScope)>>>,
    count: Arc<watch::Sender<usize>>,
}

impl<T> Clone for GatedFetcher<T> {
    fn clone(&self) -> Self {
        Self {
            gates: Arc::clone(&self.gates),
            requests: Arc::clone(&self.requests),
            count: Arc::clone(&self.count),
        }
    }
}

impl<T: Send + 'static> Default for GatedFetcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> GatedFetcher<T> {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            gates: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            count: Arc::new(count),
        }
    }

    /// Number of fetches started so far.
    pub fn call_count(&self) -> usize {
        *self.count.borrow()
    }

    /// Contexts of every fetch started so far, in order.
    pub fn requests(&self) -> Vec<(ReportCode, SubScope)> {
        lock(&self.requests).clone()
    }

    /// Wait until at least `n` fetches have started.
    pub async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    /// Release call `index` with `result`.
    ///
    /// Returns false when the call does not exist, was already resolved, or
    /// its caller went away.
    pub fn resolve(&self, index: usize, result: Result<T, FetchError>) -> bool {
        let gate = lock(&self.gates).get_mut(index).and_then(Option::take);
        match gate {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Fetcher<T> for GatedFetcher<T> {
    async fn fetch(&self, report: &ReportCode, sub_scope: SubScope) -> Result<T, FetchError> {
        let (tx, rx) = oneshot::channel();
        lock(&self.gates).push(Some(tx));
        lock(&self.requests).push((report.clone(), sub_scope));
        self.count.send_modify(|count| *count += 1);
        rx.await.unwrap_or(Err(FetchError::Cancelled))
    }
}
