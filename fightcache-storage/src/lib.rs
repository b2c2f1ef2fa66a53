//! fightcache Storage - the in-memory report data cache
//!
//! One [`ResourceCache`] per data domain, each owning a domain table, an
//! access order, a request coordinator and a set of subscribers. A
//! [`CacheSession`] groups the domains of one signed-in session and tears
//! them down together.
//!
//! Nothing here performs I/O. Fetches go through the
//! [`Fetcher`](fightcache_core::Fetcher) the caller supplies.

pub mod cache;

pub use cache::{
    AccessOrder, Acquired, Budget, CacheEntry, CacheSession, CacheStats, Completion,
    DomainControl, DomainTable, EvictionOutcome, PendingFetch, RequestCoordinator, RequestToken,
    ResourceCache, ResourceState, SharedFetcher, StalenessPolicy, Subscribers, Subscription,
    TransitionGuard,
};
