//! fightcache core types
//!
//! Pure data and contracts shared by every other crate in the workspace:
//! report identifiers, data domains, cache keys, entry statuses, errors,
//! configuration, the clock abstraction and the fetcher seam. No runtime
//! state lives here.

use chrono::{DateTime, Utc};

pub mod clock;
pub mod config;
pub mod enums;
pub mod error;
pub mod identity;
pub mod key;
pub mod traits;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, DomainPolicy};
pub use enums::{DataDomain, DataDomainParseError, EntryStatus};
pub use error::{CacheError, CacheResult, ConfigError, FetchError, TransitionError, TransitionOp};
pub use identity::{FightId, ReportCode, SubScope};
pub use key::{derive_key, CacheKey};
pub use traits::{fetcher_fn, CachePayload, Fetcher, FnFetcher};
