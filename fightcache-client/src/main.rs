//! fightcache probe: reads a report through the cache twice and prints what
//! the second read was served from.
//!
//! ```text
//! fightcache-probe [--config <path>] <report-code> [fight-id]
//! ```

use fightcache_client::{ClientConfig, ClientError, ReportDataCache};
use fightcache_core::{DataDomain, FightId, ReportCode, SubScope};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str = "fightcache-probe [--config <path>] <report-code> [fight-id]";

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    init_tracing()?;

    let (report, sub_scope) = parse_args(std::env::args().skip(1))?;
    let config = ClientConfig::load()?;
    let cache = ReportDataCache::from_config(&config)?;

    let fights = cache.fetch_report_fights(&report).await?;
    tracing::info!(
        report = %report,
        title = %fights.title,
        fights = fights.fights.len(),
        "Loaded report"
    );
    if let Some(fight) = sub_scope.fight() {
        let events = cache
            .fetch_events(DataDomain::DamageEvents, &report, sub_scope)
            .await?;
        tracing::info!(fight = %fight, events = events.len(), "Loaded damage events");
    }

    // Second pass: served from the cache unless a TTL has already lapsed.
    let again = cache.report_fights(&report).current();
    println!("report-fights {}: {}", report, again.status);
    if sub_scope.fight().is_some() {
        let again = cache
            .events(DataDomain::DamageEvents, &report, sub_scope)?
            .current();
        println!("damage-events {} {}: {}", report, sub_scope, again.status);
    }
    println!("{}", serde_json::to_string_pretty(&cache.stats())?);
    Ok(())
}

fn init_tracing() -> Result<(), ClientError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| ClientError::Logging(e.to_string()))
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<(ReportCode, SubScope), ClientError> {
    let mut positional = Vec::new();
    let mut args = args;
    while let Some(arg) = args.next() {
        if arg == "--config" {
            args.next();
            continue;
        }
        positional.push(arg);
    }

    let mut positional = positional.into_iter();
    let report = positional
        .next()
        .map(ReportCode::new)
        .ok_or_else(|| ClientError::Usage(USAGE.to_string()))?;
    let sub_scope = match positional.next() {
        Some(raw) => {
            let id: u32 = raw
                .parse()
                .map_err(|_| ClientError::Usage(format!("invalid fight id '{}'", raw)))?;
            SubScope::Fight(FightId::new(id))
        }
        None => SubScope::All,
    };
    if positional.next().is_some() {
        return Err(ClientError::Usage(USAGE.to_string()));
    }
    Ok((report, sub_scope))
}
