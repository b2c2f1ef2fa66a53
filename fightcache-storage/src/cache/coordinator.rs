//! Single-flight request coordination.
//!
//! One flight per key. The first caller becomes the owner and gets the
//! [`RequestToken`]; everyone after it gets a [`PendingFetch`] on the same
//! channel. Starting a new flight for a key that already has one swaps the
//! token but keeps the channel, so earlier waiters receive the newer result.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use fightcache_core::{CacheKey, FetchError};
use tokio::sync::watch;

use super::entry::RequestToken;

type Outcome<T> = Option<Result<Arc<T>, FetchError>>;

/// Handle on the result of an in-flight fetch.
pub struct PendingFetch<T> {
    key: CacheKey,
    rx: watch::Receiver<Outcome<T>>,
}

impl<T> Clone for PendingFetch<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> PendingFetch<T> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// The result, if the flight has finished.
    pub fn try_result(&self) -> Option<Result<Arc<T>, FetchError>> {
        self.rx.borrow().clone()
    }

    /// Wait for the flight to finish.
    ///
    /// Fails with [`FetchError::Cancelled`] if the flight is torn down
    /// before it produces a result.
    pub async fn wait(mut self) -> Result<Arc<T>, FetchError> {
        let outcome = match self.rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or(Err(FetchError::Cancelled))
    }
}

impl<T> fmt::Debug for PendingFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingFetch")
            .field("key", &self.key)
            .field("done", &self.rx.borrow().is_some())
            .finish()
    }
}

/// Result of [`RequestCoordinator::acquire`].
#[derive(Debug)]
pub enum Acquired<T> {
    /// The caller must run the fetch and complete it with `token`.
    Owner {
        token: RequestToken,
        pending: PendingFetch<T>,
    },
    /// Someone else is fetching; wait on `pending`.
    Joined { pending: PendingFetch<T> },
}

impl<T> Acquired<T> {
    pub fn is_owner(&self) -> bool {
        matches!(self, Acquired::Owner { .. })
    }

    pub fn token(&self) -> Option<RequestToken> {
        match self {
            Acquired::Owner { token, .. } => Some(*token),
            Acquired::Joined { .. } => None,
        }
    }

    pub fn pending(&self) -> &PendingFetch<T> {
        match self {
            Acquired::Owner { pending, .. } | Acquired::Joined { pending } => pending,
        }
    }

    pub fn into_pending(self) -> PendingFetch<T> {
        match self {
            Acquired::Owner { pending, .. } | Acquired::Joined { pending } => pending,
        }
    }
}

struct Flight<T> {
    token: RequestToken,
    tx: watch::Sender<Outcome<T>>,
}

/// In-flight fetches of one domain, keyed by cache key.
pub struct RequestCoordinator<T> {
    flights: HashMap<CacheKey, Flight<T>>,
    next_token: u64,
}

impl<T> Default for RequestCoordinator<T> {
    fn default() -> Self {
        Self {
            flights: HashMap::new(),
            next_token: 1,
        }
    }
}

impl<T> RequestCoordinator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint(&mut self) -> RequestToken {
        let token = RequestToken::new(self.next_token);
        self.next_token += 1;
        token
    }

    /// Become the owner of a new flight, or join the one in progress.
    pub fn acquire(&mut self, key: &CacheKey) -> Acquired<T> {
        match self.join(key) {
            Some(pending) => Acquired::Joined { pending },
            None => {
                let (token, pending) = self.begin(key);
                Acquired::Owner { token, pending }
            }
        }
    }

    /// Waiter on the flight in progress for `key`, if any.
    pub fn join(&self, key: &CacheKey) -> Option<PendingFetch<T>> {
        self.flights.get(key).map(|flight| PendingFetch {
            key: key.clone(),
            rx: flight.tx.subscribe(),
        })
    }

    /// Start a flight for `key` unconditionally.
    ///
    /// An existing flight is superseded: its token stops being current and
    /// its waiters are carried over to the new one.
    pub fn begin(&mut self, key: &CacheKey) -> (RequestToken, PendingFetch<T>) {
        let token = self.mint();
        let flight = self.flights.entry(key.clone()).or_insert_with(|| Flight {
            token,
            tx: watch::channel(None).0,
        });
        flight.token = token;
        let pending = PendingFetch {
            key: key.clone(),
            rx: flight.tx.subscribe(),
        };
        (token, pending)
    }

    pub fn current_token(&self, key: &CacheKey) -> Option<RequestToken> {
        self.flights.get(key).map(|flight| flight.token)
    }

    /// Deliver a result to the flight's waiters and close it.
    ///
    /// Returns false, delivering nothing, if `token` is not the flight's
    /// current token.
    pub fn complete(
        &mut self,
        key: &CacheKey,
        token: RequestToken,
        result: Result<Arc<T>, FetchError>,
    ) -> bool {
        if self.current_token(key) != Some(token) {
            return false;
        }
        if let Some(flight) = self.flights.remove(key) {
            flight.tx.send_replace(Some(result));
        }
        true
    }

    /// Tear down the flight for `key`; its waiters get `Cancelled`.
    pub fn cancel(&mut self, key: &CacheKey) -> bool {
        match self.flights.remove(key) {
            Some(flight) => {
                flight.tx.send_replace(Some(Err(FetchError::Cancelled)));
                true
            }
            None => false,
        }
    }

    /// Tear down every flight. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.flights.len();
        for (_, flight) in self.flights.drain() {
            flight.tx.send_replace(Some(Err(FetchError::Cancelled)));
        }
        cancelled
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.flights.contains_key(key)
    }

    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fightcache_core::{DataDomain, ReportCode, SubScope};

    fn key() -> CacheKey {
        CacheKey::new(ReportCode::new("r"), SubScope::All, DataDomain::MasterData)
    }

    #[tokio::test]
    async fn test_one_owner_many_joiners() {
        let mut coordinator = RequestCoordinator::<u32>::new();
        let owner = coordinator.acquire(&key());
        let joiners: Vec<_> = (0..4).map(|_| coordinator.acquire(&key())).collect();

        assert!(owner.is_owner());
        assert!(joiners.iter().all(|j| !j.is_owner()));
        assert_eq!(coordinator.in_flight(), 1);

        let token = owner.token().unwrap();
        assert!(coordinator.complete(&key(), token, Ok(Arc::new(7))));
        assert!(!coordinator.is_in_flight(&key()));

        let first = owner.into_pending().wait().await.unwrap();
        for joiner in joiners {
            let value = joiner.into_pending().wait().await.unwrap();
            assert!(Arc::ptr_eq(&first, &value));
        }
    }

    #[tokio::test]
    async fn test_superseded_token_cannot_complete() {
        let mut coordinator = RequestCoordinator::<u32>::new();
        let (old, early_waiter) = coordinator.begin(&key());
        let (new, _) = coordinator.begin(&key());
        assert_ne!(old, new);
        assert_eq!(coordinator.current_token(&key()), Some(new));

        assert!(!coordinator.complete(&key(), old, Ok(Arc::new(1))));
        assert!(early_waiter.try_result().is_none());

        assert!(coordinator.complete(&key(), new, Ok(Arc::new(2))));
        assert_eq!(*early_waiter.wait().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cancel_all_rejects_waiters() {
        let mut coordinator = RequestCoordinator::<u32>::new();
        let pending = coordinator.acquire(&key()).into_pending();
        assert_eq!(coordinator.cancel_all(), 1);
        assert_eq!(pending.wait().await, Err(FetchError::Cancelled));
        assert!(!coordinator.cancel(&key()));
    }

    #[tokio::test]
    async fn test_failure_reaches_joiners() {
        let mut coordinator = RequestCoordinator::<u32>::new();
        let owner = coordinator.acquire(&key());
        let joiner = coordinator.acquire(&key());
        coordinator.complete(
            &key(),
            owner.token().unwrap(),
            Err(FetchError::network("timed out")),
        );
        assert_eq!(
            joiner.into_pending().wait().await,
            Err(FetchError::network("timed out"))
        );
    }
}
