//! Cache layer for report data.
//!
//! Requests flow through the pieces in this order:
//!
//! 1. The facade derives a [`CacheKey`](fightcache_core::CacheKey) for
//!    `(report, sub-scope, domain)`.
//! 2. The [`DomainTable`] is consulted. A fresh `Succeeded` entry is served
//!    straight away and its position in the [`AccessOrder`] is refreshed.
//! 3. Otherwise the [`RequestCoordinator`] either hands out a pending handle
//!    for the fetch already in flight, or mints a [`RequestToken`] and
//!    starts a new one.
//! 4. When the fetch settles, the token is compared against the entry's
//!    current token. Responses from superseded fetches are dropped.
//! 5. The [`CacheEntry`] transitions, the domain's [`Budget`] is enforced
//!    and every [`Subscription`] for the key sees the new state.
//!
//! # Staleness
//!
//! Staleness is explicit. A `Succeeded` entry older than its domain TTL is
//! served as-is while a background refresh runs (`Refreshing`). A failed
//! refresh keeps the last good data and attaches the error beside it.
//!
//! # Example
//!
//! ```ignore
//! let session = CacheSession::new(CacheConfig::default(), Arc::new(SystemClock))?;
//! let fights = session.resource::<ReportFights>(DataDomain::ReportFights)?;
//! let mut sub = fights.subscribe(&report, SubScope::All, &fetcher);
//! let state = sub.settled().await;
//! ```

pub mod coordinator;
pub mod entry;
pub mod eviction;
pub mod facade;
pub mod freshness;
pub mod session;
pub mod stats;
pub mod store;
pub mod subscription;

pub use coordinator::{Acquired, PendingFetch, RequestCoordinator};
pub use entry::{CacheEntry, Completion, RequestToken, TransitionGuard};
pub use eviction::{Budget, EvictionOutcome};
pub use facade::{ResourceCache, SharedFetcher};
pub use freshness::StalenessPolicy;
pub use session::{CacheSession, DomainControl};
pub use stats::CacheStats;
pub use store::{AccessOrder, DomainTable};
pub use subscription::{ResourceState, Subscribers, Subscription};
