//! Every report domain wired to its fetcher.
//!
//! [`ReportDataCache`] is what an application holds for one signed-in
//! session: a [`CacheSession`] plus one [`ResourceCache`] and fetcher per
//! domain, so consumers only ever name a report and a sub-scope.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use fightcache_core::{DataDomain, FetchError, ReportCode, SubScope};
use fightcache_storage::{
    CacheSession, CacheStats, PendingFetch, ResourceCache, SharedFetcher, Subscription,
};
use tracing::info;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::EventDataType;
use crate::fetchers::{EventsFetcher, MasterDataFetcher, PlayerDataFetcher, ReportFightsFetcher};
use crate::graphql::{GraphQlClient, QueryExecutor};
use crate::model::{EventPage, MasterData, PlayerData, ReportFights};

struct Domain<T> {
    cache: ResourceCache<T>,
    fetcher: SharedFetcher<T>,
}

impl<T> Clone for Domain<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            fetcher: Arc::clone(&self.fetcher),
        }
    }
}

#[derive(Clone)]
pub struct ReportDataCache {
    session: Arc<CacheSession>,
    fights: Domain<ReportFights>,
    master: Domain<MasterData>,
    players: Domain<PlayerData>,
    events: HashMap<DataDomain, Domain<EventPage>>,
}

impl std::fmt::Debug for ReportDataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportDataCache")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl ReportDataCache {
    /// Register every domain on `session`, fetching through `executor`.
    pub fn new(
        session: Arc<CacheSession>,
        executor: Arc<dyn QueryExecutor>,
        events_page_limit: u32,
    ) -> ClientResult<Self> {
        let fights = Domain {
            cache: session.resource::<ReportFights>(DataDomain::ReportFights)?,
            fetcher: Arc::new(ReportFightsFetcher::new(Arc::clone(&executor))) as SharedFetcher<_>,
        };
        let master = Domain {
            cache: session.resource::<MasterData>(DataDomain::MasterData)?,
            fetcher: Arc::new(MasterDataFetcher::new(Arc::clone(&executor))) as SharedFetcher<_>,
        };
        let players = Domain {
            cache: session.resource::<PlayerData>(DataDomain::PlayerData)?,
            fetcher: Arc::new(PlayerDataFetcher::new(Arc::clone(&executor))) as SharedFetcher<_>,
        };

        let mut events = HashMap::new();
        for domain in DataDomain::ALL {
            let Some(data_type) = EventDataType::for_domain(domain) else {
                continue;
            };
            let fetcher = EventsFetcher::new(Arc::clone(&executor), data_type, events_page_limit);
            events.insert(
                domain,
                Domain {
                    cache: session.resource::<EventPage>(domain)?,
                    fetcher: Arc::new(fetcher) as SharedFetcher<_>,
                },
            );
        }

        Ok(Self {
            session,
            fights,
            master,
            players,
            events,
        })
    }

    /// Build the GraphQL client and a wall-clock session from `config`.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let client = GraphQlClient::new(config)?;
        let session = CacheSession::with_system_clock(config.cache_config())?;
        info!(endpoint = %client.endpoint(), "Report data cache ready");
        Self::new(Arc::new(session), Arc::new(client), config.events_page_limit)
    }

    pub fn session(&self) -> &CacheSession {
        &self.session
    }

    fn event_domain(&self, domain: DataDomain) -> ClientResult<&Domain<EventPage>> {
        self.events
            .get(&domain)
            .ok_or(ClientError::NotAnEventDomain { domain })
    }

    // ========================================================================
    // SUBSCRIPTIONS
    // ========================================================================

    /// Subscribe to a report's header and fight list.
    pub fn report_fights(&self, report: &ReportCode) -> Subscription<ReportFights> {
        self.fights
            .cache
            .subscribe(report, SubScope::All, &self.fights.fetcher)
    }

    pub fn master_data(&self, report: &ReportCode) -> Subscription<MasterData> {
        self.master
            .cache
            .subscribe(report, SubScope::All, &self.master.fetcher)
    }

    pub fn player_data(
        &self,
        report: &ReportCode,
        sub_scope: SubScope,
    ) -> Subscription<PlayerData> {
        self.players
            .cache
            .subscribe(report, sub_scope, &self.players.fetcher)
    }

    /// Subscribe to one event domain. Fails for reference domains.
    pub fn events(
        &self,
        domain: DataDomain,
        report: &ReportCode,
        sub_scope: SubScope,
    ) -> ClientResult<Subscription<EventPage>> {
        let events = self.event_domain(domain)?;
        Ok(events.cache.subscribe(report, sub_scope, &events.fetcher))
    }

    // ========================================================================
    // IMPERATIVE READS
    // ========================================================================

    pub async fn fetch_report_fights(
        &self,
        report: &ReportCode,
    ) -> Result<Arc<ReportFights>, FetchError> {
        self.fights
            .cache
            .fetch(report, SubScope::All, &self.fights.fetcher)
            .await
    }

    pub async fn fetch_master_data(
        &self,
        report: &ReportCode,
    ) -> Result<Arc<MasterData>, FetchError> {
        self.master
            .cache
            .fetch(report, SubScope::All, &self.master.fetcher)
            .await
    }

    pub async fn fetch_player_data(
        &self,
        report: &ReportCode,
        sub_scope: SubScope,
    ) -> Result<Arc<PlayerData>, FetchError> {
        self.players
            .cache
            .fetch(report, sub_scope, &self.players.fetcher)
            .await
    }

    pub async fn fetch_events(
        &self,
        domain: DataDomain,
        report: &ReportCode,
        sub_scope: SubScope,
    ) -> ClientResult<Arc<EventPage>> {
        let events = self.event_domain(domain)?;
        Ok(events.cache.fetch(report, sub_scope, &events.fetcher).await?)
    }

    /// Refetch a report's fight list, e.g. while a live log is still growing.
    pub fn refresh_report_fights(&self, report: &ReportCode) -> PendingFetch<ReportFights> {
        self.fights
            .cache
            .refresh(report, SubScope::All, &self.fights.fetcher)
    }

    // ========================================================================
    // DIRECT CACHE ACCESS
    // ========================================================================

    pub fn report_fights_cache(&self) -> &ResourceCache<ReportFights> {
        &self.fights.cache
    }

    pub fn master_data_cache(&self) -> &ResourceCache<MasterData> {
        &self.master.cache
    }

    pub fn player_data_cache(&self) -> &ResourceCache<PlayerData> {
        &self.players.cache
    }

    pub fn events_cache(&self, domain: DataDomain) -> ClientResult<&ResourceCache<EventPage>> {
        Ok(&self.event_domain(domain)?.cache)
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Invalidate every cached context of `report` in every domain.
    pub fn invalidate_report(&self, report: &ReportCode) -> usize {
        let mut removed = self.fights.cache.invalidate_report(report)
            + self.master.cache.invalidate_report(report)
            + self.players.cache.invalidate_report(report);
        for events in self.events.values() {
            removed += events.cache.invalidate_report(report);
        }
        removed
    }

    /// Clear every domain, as on sign-out.
    pub fn teardown(&self) -> usize {
        self.session.teardown()
    }

    pub fn stats(&self) -> BTreeMap<DataDomain, CacheStats> {
        self.session.stats()
    }
}
