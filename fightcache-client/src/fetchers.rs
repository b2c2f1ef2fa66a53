//! One [`Fetcher`] per data domain.
//!
//! Each fetcher builds its query variables from the report context, runs the
//! query through a [`QueryExecutor`] and unwraps `reportData.report`. A null
//! report becomes [`FetchError::NotFound`].

use std::sync::Arc;

use async_trait::async_trait;
use fightcache_core::{FetchError, Fetcher, ReportCode, SubScope};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::events::EventDataType;
use crate::graphql::QueryExecutor;
use crate::model::{EventPage, MasterData, PlayerData, ReportFights};

/// Events returned per page; the API's maximum.
pub const EVENTS_PER_PAGE: u32 = 10_000;

/// End of the window used when a query spans the whole report.
pub const WHOLE_REPORT_END_MS: f64 = 1.0e12;

// ============================================================================
// QUERIES
// ============================================================================

pub const REPORT_FIGHTS_QUERY: &str = r#"
query ReportFights($code: String!, $fightIDs: [Int]) {
  reportData {
    report(code: $code) {
      code
      title
      startTime
      endTime
      zone { id name }
      fights(fightIDs: $fightIDs) {
        id name encounterID startTime endTime kill difficulty fightPercentage
      }
    }
  }
}
"#;

pub const MASTER_DATA_QUERY: &str = r#"
query MasterData($code: String!) {
  reportData {
    report(code: $code) {
      masterData {
        actors { id name type subType server petOwner gameID }
        abilities { gameID name icon type }
      }
    }
  }
}
"#;

pub const PLAYER_DATA_QUERY: &str = r#"
query PlayerData($code: String!, $fightIDs: [Int], $startTime: Float, $endTime: Float) {
  reportData {
    report(code: $code) {
      playerDetails(fightIDs: $fightIDs, startTime: $startTime, endTime: $endTime, includeCombatantInfo: true)
    }
  }
}
"#;

pub const EVENTS_QUERY: &str = r#"
query Events($code: String!, $fightIDs: [Int], $dataType: EventDataType!, $startTime: Float, $endTime: Float, $limit: Int) {
  reportData {
    report(code: $code) {
      events(fightIDs: $fightIDs, dataType: $dataType, startTime: $startTime, endTime: $endTime, limit: $limit) {
        data
        nextPageTimestamp
      }
    }
  }
}
"#;

// ============================================================================
// VARIABLES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportVariables {
    pub code: String,
    #[serde(rename = "fightIDs", skip_serializing_if = "Option::is_none")]
    pub fight_ids: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
}

impl ReportVariables {
    /// Variables for a context. A whole-report scope carries no fight filter
    /// and spans the full report window instead.
    pub fn for_context(report: &ReportCode, sub_scope: SubScope) -> Self {
        match sub_scope.fight() {
            Some(fight) => Self {
                code: report.as_str().to_string(),
                fight_ids: Some(vec![fight.get()]),
                start_time: None,
                end_time: None,
            },
            None => Self {
                code: report.as_str().to_string(),
                fight_ids: None,
                start_time: Some(0.0),
                end_time: Some(WHOLE_REPORT_END_MS),
            },
        }
    }

    fn code_only(report: &ReportCode) -> Self {
        Self {
            code: report.as_str().to_string(),
            fight_ids: None,
            start_time: None,
            end_time: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsVariables {
    #[serde(flatten)]
    pub report: ReportVariables,
    pub data_type: EventDataType,
    pub limit: u32,
}

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportDataResponse<R> {
    report_data: ReportSlot<R>,
}

#[derive(Debug, Deserialize)]
struct ReportSlot<R> {
    report: Option<R>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MasterDataField {
    master_data: Option<MasterData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerDetailsField {
    player_details: PlayerDetailsJson,
}

// `playerDetails` is a JSON scalar wrapping the payload in `data.playerDetails`.
#[derive(Debug, Deserialize)]
struct PlayerDetailsJson {
    data: PlayerDetailsData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerDetailsData {
    player_details: PlayerData,
}

#[derive(Debug, Deserialize)]
struct EventsField {
    events: EventPage,
}

async fn report_query<V, R>(
    executor: &dyn QueryExecutor,
    query: &str,
    variables: &V,
    report: &ReportCode,
) -> Result<R, FetchError>
where
    V: Serialize + Sync,
    R: DeserializeOwned,
{
    let variables =
        serde_json::to_value(variables).map_err(|e| FetchError::other(e.to_string()))?;
    let data = executor.execute(query, variables).await?;
    let response: ReportDataResponse<R> =
        serde_json::from_value(data).map_err(|e| FetchError::decode(e.to_string()))?;
    response.report_data.report.ok_or_else(|| FetchError::NotFound {
        what: format!("report {}", report),
    })
}

// ============================================================================
// FETCHERS
// ============================================================================

/// Report header and fight list. A fight scope narrows the list to that fight.
#[derive(Clone)]
pub struct ReportFightsFetcher {
    executor: Arc<dyn QueryExecutor>,
}

impl ReportFightsFetcher {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Fetcher<ReportFights> for ReportFightsFetcher {
    async fn fetch(
        &self,
        report: &ReportCode,
        sub_scope: SubScope,
    ) -> Result<ReportFights, FetchError> {
        let variables = ReportVariables {
            fight_ids: sub_scope.fight().map(|fight| vec![fight.get()]),
            ..ReportVariables::code_only(report)
        };
        report_query(self.executor.as_ref(), REPORT_FIGHTS_QUERY, &variables, report).await
    }
}

/// Actors and abilities. Master data is report-wide; the sub-scope only
/// selects the cache slot.
#[derive(Clone)]
pub struct MasterDataFetcher {
    executor: Arc<dyn QueryExecutor>,
}

impl MasterDataFetcher {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Fetcher<MasterData> for MasterDataFetcher {
    async fn fetch(
        &self,
        report: &ReportCode,
        _sub_scope: SubScope,
    ) -> Result<MasterData, FetchError> {
        let field: MasterDataField = report_query(
            self.executor.as_ref(),
            MASTER_DATA_QUERY,
            &ReportVariables::code_only(report),
            report,
        )
        .await?;
        field.master_data.ok_or_else(|| FetchError::NotFound {
            what: format!("master data for report {}", report),
        })
    }
}

#[derive(Clone)]
pub struct PlayerDataFetcher {
    executor: Arc<dyn QueryExecutor>,
}

impl PlayerDataFetcher {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Fetcher<PlayerData> for PlayerDataFetcher {
    async fn fetch(
        &self,
        report: &ReportCode,
        sub_scope: SubScope,
    ) -> Result<PlayerData, FetchError> {
        let field: PlayerDetailsField = report_query(
            self.executor.as_ref(),
            PLAYER_DATA_QUERY,
            &ReportVariables::for_context(report, sub_scope),
            report,
        )
        .await?;
        Ok(field.player_details.data.player_details)
    }
}

/// Events of one data type, following `nextPageTimestamp` until the API
/// reports no more pages or `page_limit` pages have been read.
#[derive(Clone)]
pub struct EventsFetcher {
    executor: Arc<dyn QueryExecutor>,
    data_type: EventDataType,
    page_limit: u32,
}

impl EventsFetcher {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        data_type: EventDataType,
        page_limit: u32,
    ) -> Self {
        Self {
            executor,
            data_type,
            page_limit: page_limit.max(1),
        }
    }

    pub fn data_type(&self) -> EventDataType {
        self.data_type
    }
}

#[async_trait]
impl Fetcher<EventPage> for EventsFetcher {
    async fn fetch(
        &self,
        report: &ReportCode,
        sub_scope: SubScope,
    ) -> Result<EventPage, FetchError> {
        let mut variables = EventsVariables {
            report: ReportVariables::for_context(report, sub_scope),
            data_type: self.data_type,
            limit: EVENTS_PER_PAGE,
        };
        let mut events = EventPage::default();
        let mut pages = 0;

        while pages < self.page_limit {
            let field: EventsField =
                report_query(self.executor.as_ref(), EVENTS_QUERY, &variables, report).await?;
            pages += 1;
            events.extend(field.events);

            let Some(next) = events.next_page_timestamp else {
                break;
            };
            if variables.report.start_time.is_some_and(|start| next <= start) {
                return Err(FetchError::decode(format!(
                    "event pagination did not advance past {}",
                    next
                )));
            }
            variables.report.start_time = Some(next);
        }

        if events.is_truncated() {
            warn!(
                report = %report,
                sub_scope = %sub_scope,
                data_type = %self.data_type,
                pages,
                "Event page limit reached"
            );
        }
        debug!(
            report = %report,
            sub_scope = %sub_scope,
            data_type = %self.data_type,
            pages,
            events = events.len(),
            "Fetched events"
        );
        Ok(events)
    }
}
