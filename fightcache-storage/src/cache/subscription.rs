//! Per-key subscriptions.
//!
//! Each key with at least one subscriber owns a `watch` channel. Every state
//! transition of the entry is published to it, so all consumers of a key see
//! the same status and the same `Arc` for the data.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use fightcache_core::{CacheKey, EntryStatus, FetchError, Timestamp};
use tokio::sync::watch;

/// What a consumer sees for one key: `{data, status, error}`.
pub struct ResourceState<T> {
    pub data: Option<Arc<T>>,
    pub status: EntryStatus,
    pub error: Option<FetchError>,
    pub fetched_at: Option<Timestamp>,
}

impl<T> ResourceState<T> {
    /// State of a key nobody has requested yet.
    pub fn idle() -> Self {
        Self {
            data: None,
            status: EntryStatus::Idle,
            error: None,
            fetched_at: None,
        }
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// True while a fetch is running and there is nothing to show yet.
    pub fn is_loading(&self) -> bool {
        self.status == EntryStatus::Loading
    }

    /// Same status, error and data identity.
    pub fn same_as(&self, other: &Self) -> bool {
        let same_data = match (&self.data, &other.data) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_data
            && self.status == other.status
            && self.error == other.error
            && self.fetched_at == other.fetched_at
    }
}

impl<T> Clone for ResourceState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            status: self.status,
            error: self.error.clone(),
            fetched_at: self.fetched_at,
        }
    }
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

impl<T: fmt::Debug> fmt::Debug for ResourceState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceState")
            .field("data", &self.data)
            .field("status", &self.status)
            .field("error", &self.error)
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}

/// Listener registry for one domain.
pub struct Subscribers<T> {
    channels: HashMap<CacheKey, watch::Sender<ResourceState<T>>>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. A key without live listeners starts from
    /// `current`; otherwise the listener joins at the last published state.
    pub fn subscribe(&mut self, key: &CacheKey, current: ResourceState<T>) -> Subscription<T> {
        let rx = match self.channels.get(key) {
            Some(tx) if tx.receiver_count() > 0 => tx.subscribe(),
            _ => {
                let (tx, rx) = watch::channel(current);
                self.channels.insert(key.clone(), tx);
                rx
            }
        };
        Subscription {
            key: key.clone(),
            rx,
        }
    }

    /// Publish a state to everyone watching `key`.
    ///
    /// Channels whose listeners are all gone are dropped instead.
    pub fn publish(&mut self, key: &CacheKey, state: ResourceState<T>) {
        let Some(tx) = self.channels.get(key) else {
            return;
        };
        if tx.receiver_count() == 0 {
            self.channels.remove(key);
            return;
        }
        tx.send_replace(state);
    }

    /// The entry for `key` was evicted.
    ///
    /// Live listeners see `Idle`; a channel nobody listens to is dropped
    /// along with the payload it still holds.
    pub fn evict(&mut self, key: &CacheKey) {
        let Some(tx) = self.channels.get(key) else {
            return;
        };
        if tx.receiver_count() == 0 {
            self.channels.remove(key);
        } else {
            tx.send_replace(ResourceState::idle());
        }
    }

    /// Publish `Idle` to every key.
    pub fn reset_all(&mut self) {
        self.channels.retain(|_, tx| tx.receiver_count() > 0);
        for tx in self.channels.values() {
            tx.send_replace(ResourceState::idle());
        }
    }

    /// Channels held, including ones whose listeners are gone.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of keys with at least one live listener.
    pub fn watched_keys(&self) -> usize {
        self.channels
            .values()
            .filter(|tx| tx.receiver_count() > 0)
            .count()
    }
}

/// A consumer's view of one key.
///
/// Dropping it unsubscribes. The fetch it may have started keeps running for
/// everyone else.
pub struct Subscription<T> {
    key: CacheKey,
    rx: watch::Receiver<ResourceState<T>>,
}

impl<T> Subscription<T> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Latest published state.
    pub fn current(&self) -> ResourceState<T> {
        self.rx.borrow().clone()
    }

    /// Wait for the next published state. `None` once the cache is gone.
    pub async fn changed(&mut self) -> Option<ResourceState<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the key reaches `Succeeded` or `Failed`.
    ///
    /// Returns the last state seen if the cache is dropped first.
    pub async fn settled(&mut self) -> ResourceState<T> {
        let settled = self
            .rx
            .wait_for(|state| state.status.is_settled())
            .await
            .map(|state| state.clone());
        match settled {
            Ok(state) => state,
            Err(_) => self.current(),
        }
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("status", &self.rx.borrow().status)
            .finish()
    }
}
