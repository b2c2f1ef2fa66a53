//! ReportDataCache against a scripted GraphQL executor: query variables,
//! event pagination, error mapping and cross-domain invalidation.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fightcache_client::{ClientError, QueryExecutor, ReportDataCache};
use fightcache_storage::CacheSession;
use fightcache_test_utils::{
    manual_clock, CacheConfig, DataDomain, EntryStatus, FetchError, FightId, ReportCode, SubScope,
};
use serde_json::{json, Value};

// ============================================================================
// HELPERS
// ============================================================================

type Responder = dyn Fn(&str, &Value) -> Result<Value, FetchError> + Send + Sync;

#[derive(Clone)]
struct ScriptedExecutor {
    calls: Arc<Mutex<Vec<(String, Value)>>>,
    respond: Arc<Responder>,
}

impl ScriptedExecutor {
    fn new(
        respond: impl Fn(&str, &Value) -> Result<Value, FetchError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            respond: Arc::new(respond),
        }
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_to(&self, name: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(query, _)| query == name)
            .map(|(_, vars)| vars)
            .collect()
    }
}

fn query_name(query: &str) -> String {
    query
        .trim_start()
        .strip_prefix("query ")
        .and_then(|rest| rest.split('(').next())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, FetchError> {
        let name = query_name(query);
        let out = (self.respond)(&name, &variables);
        self.calls.lock().unwrap().push((name, variables));
        out
    }
}

fn report_response(report: Value) -> Result<Value, FetchError> {
    Ok(json!({ "reportData": { "report": report } }))
}

fn fights_body(code: &str) -> Value {
    json!({
        "code": code,
        "title": "Raid night",
        "startTime": 0,
        "endTime": 1000,
        "fights": [
            { "id": 1, "name": "Ulgrax", "encounterID": 2902, "startTime": 0, "endTime": 500 }
        ]
    })
}

/// Answers every query with a small, valid payload.
fn happy_path(name: &str, vars: &Value) -> Result<Value, FetchError> {
    let code = vars["code"].as_str().unwrap_or_default();
    match name {
        "ReportFights" => report_response(fights_body(code)),
        "MasterData" => report_response(json!({
            "masterData": {
                "actors": [{ "id": 1, "name": "Tankadin", "type": "Player" }],
                "abilities": []
            }
        })),
        "PlayerData" => report_response(json!({
            "playerDetails": { "data": { "playerDetails": {
                "tanks": [{ "id": 1, "name": "Tankadin", "type": "Paladin" }],
                "healers": [],
                "dps": []
            }}}
        })),
        "Events" => report_response(json!({
            "events": { "data": [{ "type": "damage", "amount": 100 }], "nextPageTimestamp": null }
        })),
        other => Err(FetchError::other(format!("unexpected query {}", other))),
    }
}

fn cache_with(executor: &ScriptedExecutor, page_limit: u32) -> ReportDataCache {
    let (_clock, handle) = manual_clock();
    let session =
        CacheSession::new(CacheConfig::default().with_strict_transitions(true), handle).unwrap();
    ReportDataCache::new(Arc::new(session), Arc::new(executor.clone()), page_limit).unwrap()
}

fn report() -> ReportCode {
    ReportCode::new("a1B2c3")
}

fn fight(id: u32) -> SubScope {
    SubScope::Fight(FightId::new(id))
}

// ============================================================================
// REFERENCE DOMAINS
// ============================================================================

#[tokio::test]
async fn report_fights_fetched_once_then_served_from_cache() {
    let executor = ScriptedExecutor::new(happy_path);
    let cache = cache_with(&executor, 5);

    let first = cache.fetch_report_fights(&report()).await.unwrap();
    let second = cache.fetch_report_fights(&report()).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.fights[0].name, "Ulgrax");
    assert_eq!(executor.calls_to("ReportFights").len(), 1);

    let stats = cache.stats()[&DataDomain::ReportFights];
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
}

#[tokio::test]
async fn report_fights_for_whole_report_has_no_fight_filter() {
    let executor = ScriptedExecutor::new(happy_path);
    let cache = cache_with(&executor, 5);

    cache.fetch_report_fights(&report()).await.unwrap();
    assert_eq!(
        executor.calls_to("ReportFights"),
        vec![json!({ "code": "a1B2c3" })]
    );
}

#[tokio::test]
async fn player_details_are_unwrapped() {
    let executor = ScriptedExecutor::new(happy_path);
    let cache = cache_with(&executor, 5);

    let players = cache.fetch_player_data(&report(), fight(2)).await.unwrap();
    assert_eq!(players.tanks[0].class, "Paladin");
    assert_eq!(players.len(), 1);
    assert_eq!(executor.calls_to("PlayerData")[0]["fightIDs"], json!([2]));
}

#[tokio::test]
async fn missing_report_is_not_found() {
    let executor = ScriptedExecutor::new(|_, _| report_response(Value::Null));
    let cache = cache_with(&executor, 5);

    let err = cache.fetch_master_data(&report()).await.unwrap_err();
    assert_eq!(
        err,
        FetchError::NotFound {
            what: "report a1B2c3".to_string()
        }
    );
    let state = cache.master_data_cache().peek(&report(), SubScope::All);
    assert_eq!(state.status, EntryStatus::Failed);
}

#[tokio::test]
async fn graphql_errors_reach_subscribers() {
    let executor = ScriptedExecutor::new(|_, _| {
        Err(FetchError::GraphQl {
            messages: vec!["You do not have permission to view this report.".to_string()],
        })
    });
    let cache = cache_with(&executor, 5);

    let mut sub = cache.report_fights(&report());
    let state = sub.settled().await;
    assert_eq!(state.status, EntryStatus::Failed);
    assert!(matches!(state.error, Some(FetchError::GraphQl { .. })));
}

// ============================================================================
// EVENTS
// ============================================================================

#[tokio::test]
async fn events_follow_pagination_until_exhausted() {
    let executor = ScriptedExecutor::new(|name, vars| {
        assert_eq!(name, "Events");
        let start = vars["startTime"].as_f64();
        let next = match start {
            None => json!(100.0),
            Some(s) if s < 200.0 => json!(200.0),
            Some(_) => Value::Null,
        };
        report_response(json!({
            "events": { "data": [{ "timestamp": start }], "nextPageTimestamp": next }
        }))
    });
    let cache = cache_with(&executor, 10);

    let events = cache
        .fetch_events(DataDomain::CastEvents, &report(), fight(3))
        .await
        .unwrap();
    assert_eq!(events.len(), 3);
    assert!(!events.is_truncated());

    let calls = executor.calls_to("Events");
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0]["dataType"], json!("Casts"));
    assert_eq!(calls[0]["fightIDs"], json!([3]));
    assert!(calls[0].get("startTime").is_none());
    assert_eq!(calls[1]["startTime"], json!(100.0));
    assert_eq!(calls[2]["startTime"], json!(200.0));
}

#[tokio::test]
async fn events_stop_at_page_limit() {
    let executor = ScriptedExecutor::new(|_, vars| {
        let start = vars["startTime"].as_f64().unwrap_or(0.0);
        report_response(json!({
            "events": { "data": [{ "timestamp": start }], "nextPageTimestamp": start + 100.0 }
        }))
    });
    let cache = cache_with(&executor, 2);

    let events = cache
        .fetch_events(DataDomain::DamageEvents, &report(), SubScope::All)
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.is_truncated());
    assert_eq!(executor.calls_to("Events").len(), 2);
}

#[tokio::test]
async fn whole_report_events_span_the_report_window() {
    let executor = ScriptedExecutor::new(happy_path);
    let cache = cache_with(&executor, 5);

    cache
        .fetch_events(DataDomain::DeathEvents, &report(), SubScope::All)
        .await
        .unwrap();
    let vars = &executor.calls_to("Events")[0];
    assert!(vars.get("fightIDs").is_none());
    assert_eq!(vars["startTime"], json!(0.0));
    assert_eq!(vars["dataType"], json!("Deaths"));
}

#[tokio::test]
async fn stalled_pagination_fails() {
    let executor = ScriptedExecutor::new(|_, _| {
        report_response(json!({ "events": { "data": [], "nextPageTimestamp": 0.0 } }))
    });
    let cache = cache_with(&executor, 5);

    let err = cache
        .fetch_events(DataDomain::BuffEvents, &report(), SubScope::All)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Fetch(FetchError::Decode { .. })));
}

#[test]
fn reference_domains_are_not_event_domains() {
    let executor = ScriptedExecutor::new(happy_path);
    let cache = cache_with(&executor, 5);

    let err = cache
        .events(DataDomain::MasterData, &report(), SubScope::All)
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::NotAnEventDomain {
            domain: DataDomain::MasterData
        }
    ));
    assert!(executor.calls().is_empty());
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[tokio::test]
async fn invalidate_report_spans_every_domain() {
    let executor = ScriptedExecutor::new(happy_path);
    let cache = cache_with(&executor, 5);
    let other = ReportCode::new("zz9");

    cache.fetch_report_fights(&report()).await.unwrap();
    cache.fetch_master_data(&report()).await.unwrap();
    cache
        .fetch_events(DataDomain::HealingEvents, &report(), fight(1))
        .await
        .unwrap();
    cache.fetch_report_fights(&other).await.unwrap();

    assert_eq!(cache.invalidate_report(&report()), 3);
    assert_eq!(cache.report_fights_cache().len(), 1);
    assert_eq!(
        cache.report_fights_cache().peek(&other, SubScope::All).status,
        EntryStatus::Succeeded
    );

    cache.fetch_report_fights(&report()).await.unwrap();
    assert_eq!(executor.calls_to("ReportFights").len(), 3);
}

#[tokio::test]
async fn teardown_empties_the_session() {
    let executor = ScriptedExecutor::new(happy_path);
    let cache = cache_with(&executor, 5);

    cache.fetch_report_fights(&report()).await.unwrap();
    cache
        .fetch_events(DataDomain::DamageEvents, &report(), fight(1))
        .await
        .unwrap();

    assert_eq!(cache.teardown(), 2);
    assert_eq!(cache.session().total_stats().entry_count, 0);
    assert_eq!(cache.session().domains().len(), DataDomain::ALL.len());
}
