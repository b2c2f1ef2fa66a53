//! Cache entries and their lifecycle.
//!
//! ```text
//!   Idle ──request──▶ Loading ──succeed──▶ Succeeded ──request──▶ Refreshing
//!                      │  ▲                  ▲   ▲                  │    │
//!                 fail │  │ request          │   └─────succeed──────┘    │
//!                      ▼  │                  └──────fail (keeps data)────┘
//!                     Failed
//! ```
//!
//! Every transition that completes a fetch carries the [`RequestToken`] the
//! fetch was started with. A token that no longer matches the entry means a
//! newer fetch has taken over, and the response is reported as
//! [`Completion::Superseded`] without touching the entry.

use std::fmt;
use std::sync::Arc;

use fightcache_core::{CacheKey, EntryStatus, FetchError, Timestamp, TransitionError, TransitionOp};

use super::subscription::ResourceState;

/// Identity of one fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(u64);

impl RequestToken {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a completing fetch did to its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The result was written to the entry.
    Applied,
    /// A newer fetch owns the entry; the result was discarded.
    Superseded,
}

/// One cached value and its bookkeeping.
#[derive(Debug)]
pub struct CacheEntry<T> {
    data: Option<Arc<T>>,
    status: EntryStatus,
    error: Option<FetchError>,
    fetched_at: Option<Timestamp>,
    access_count: u64,
    last_accessed_at: Timestamp,
    created_at: Timestamp,
    estimated_size: usize,
    inflight_token: Option<RequestToken>,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            status: self.status,
            error: self.error.clone(),
            fetched_at: self.fetched_at,
            access_count: self.access_count,
            last_accessed_at: self.last_accessed_at,
            created_at: self.created_at,
            estimated_size: self.estimated_size,
            inflight_token: self.inflight_token,
        }
    }
}

impl<T> CacheEntry<T> {
    /// A fresh `Idle` entry.
    pub fn new(now: Timestamp) -> Self {
        Self {
            data: None,
            status: EntryStatus::Idle,
            error: None,
            fetched_at: None,
            access_count: 0,
            last_accessed_at: now,
            created_at: now,
            estimated_size: 0,
            inflight_token: None,
        }
    }

    pub fn data(&self) -> Option<&Arc<T>> {
        self.data.as_ref()
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    pub fn fetched_at(&self) -> Option<Timestamp> {
        self.fetched_at
    }

    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    pub fn last_accessed_at(&self) -> Timestamp {
        self.last_accessed_at
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn estimated_size(&self) -> usize {
        self.estimated_size
    }

    pub fn inflight_token(&self) -> Option<RequestToken> {
        self.inflight_token
    }

    /// True when `token` is the fetch that currently owns this entry.
    pub fn is_current(&self, token: RequestToken) -> bool {
        self.inflight_token == Some(token)
    }

    /// Start a fetch.
    ///
    /// `Idle`/`Failed` move to `Loading`; `Succeeded` moves to `Refreshing`
    /// and keeps its data readable. Returns the new status.
    pub fn request(
        &mut self,
        key: &CacheKey,
        token: RequestToken,
    ) -> Result<EntryStatus, TransitionError> {
        self.status = match self.status {
            EntryStatus::Idle | EntryStatus::Failed => {
                self.error = None;
                EntryStatus::Loading
            }
            EntryStatus::Succeeded => EntryStatus::Refreshing,
            from @ (EntryStatus::Loading | EntryStatus::Refreshing) => {
                return Err(illegal(key, from, TransitionOp::Request));
            }
        };
        self.inflight_token = Some(token);
        Ok(self.status)
    }

    /// Hand ownership of an in-flight entry to a newer fetch.
    pub fn supersede(
        &mut self,
        key: &CacheKey,
        token: RequestToken,
    ) -> Result<(), TransitionError> {
        if !self.status.is_in_flight() {
            return Err(illegal(key, self.status, TransitionOp::Supersede));
        }
        self.inflight_token = Some(token);
        Ok(())
    }

    /// Record a successful fetch.
    pub fn succeed(
        &mut self,
        key: &CacheKey,
        token: RequestToken,
        data: Arc<T>,
        size: usize,
        now: Timestamp,
    ) -> Result<Completion, TransitionError> {
        if !self.status.is_in_flight() {
            return Err(illegal(key, self.status, TransitionOp::Succeed));
        }
        if !self.is_current(token) {
            return Ok(Completion::Superseded);
        }
        self.data = Some(data);
        self.status = EntryStatus::Succeeded;
        self.error = None;
        self.fetched_at = Some(now);
        self.estimated_size = size;
        self.inflight_token = None;
        Ok(Completion::Applied)
    }

    /// Record a failed fetch.
    ///
    /// A failed first load ends in `Failed`. A failed refresh goes back to
    /// `Succeeded` with the old data and the error attached.
    pub fn fail(
        &mut self,
        key: &CacheKey,
        token: RequestToken,
        error: FetchError,
    ) -> Result<Completion, TransitionError> {
        if !self.status.is_in_flight() {
            return Err(illegal(key, self.status, TransitionOp::Fail));
        }
        if !self.is_current(token) {
            return Ok(Completion::Superseded);
        }
        self.status = match self.status {
            EntryStatus::Refreshing => EntryStatus::Succeeded,
            _ => EntryStatus::Failed,
        };
        self.error = Some(error);
        self.inflight_token = None;
        Ok(Completion::Applied)
    }

    pub(crate) fn record_access(&mut self, now: Timestamp) {
        self.access_count += 1;
        self.last_accessed_at = now;
    }

    /// The consumer-facing view of this entry.
    pub fn state(&self) -> ResourceState<T> {
        ResourceState {
            data: self.data.clone(),
            status: self.status,
            error: self.error.clone(),
            fetched_at: self.fetched_at,
        }
    }

    /// Check the status/data/token invariants.
    pub fn check_invariants(&self) -> Result<(), String> {
        match self.status {
            EntryStatus::Succeeded if self.data.is_none() || self.fetched_at.is_none() => {
                return Err("Succeeded entry without data".to_string());
            }
            EntryStatus::Refreshing if self.data.is_none() => {
                return Err("Refreshing entry without data".to_string());
            }
            EntryStatus::Failed if self.error.is_none() => {
                return Err("Failed entry without error".to_string());
            }
            _ => {}
        }
        if self.status.is_in_flight() != self.inflight_token.is_some() {
            return Err(format!(
                "{} entry with token {:?}",
                self.status, self.inflight_token
            ));
        }
        Ok(())
    }
}

fn illegal(key: &CacheKey, from: EntryStatus, op: TransitionOp) -> TransitionError {
    TransitionError {
        key: key.clone(),
        from,
        op,
    }
}

/// Decides what happens when a transition is illegal.
///
/// Strict guards panic. Lenient guards log the error and skip the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionGuard {
    strict: bool,
}

impl TransitionGuard {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Unwrap a transition result, or handle the illegal transition.
    pub fn check<R>(&self, result: Result<R, TransitionError>) -> Option<R> {
        match result {
            Ok(value) => Some(value),
            Err(err) if self.strict => panic!("{}", err),
            Err(err) => {
                tracing::error!(
                    key = %err.key,
                    from = %err.from,
                    op = %err.op,
                    "Ignoring illegal cache transition"
                );
                None
            }
        }
    }
}
