//! fightcache client
//!
//! The network side of the report cache: a GraphQL transport with bearer
//! auth, typed report payloads, one fetcher per data domain and
//! [`ReportDataCache`], which wires them all to a cache session.

pub mod config;
pub mod error;
pub mod events;
pub mod fetchers;
pub mod graphql;
pub mod model;
pub mod report_cache;

pub use config::{AuthConfig, ClientConfig, ConfigError};
pub use error::{ClientError, ClientResult};
pub use events::EventDataType;
pub use fetchers::{EventsFetcher, MasterDataFetcher, PlayerDataFetcher, ReportFightsFetcher};
pub use graphql::{GraphQlClient, QueryExecutor};
pub use model::{
    Ability, Actor, EventPage, Fight, MasterData, PlayerData, PlayerDetail, ReportFights, Zone,
};
pub use report_cache::ReportDataCache;
