//! Enum types shared across the cache layer

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// DATA DOMAINS
// ============================================================================

/// One independently cached category of report data.
///
/// Each domain gets its own table, access order and capacity budget, so an
/// eviction or failure in one never touches another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataDomain {
    ReportFights,
    MasterData,
    PlayerData,
    DamageEvents,
    HealingEvents,
    BuffEvents,
    DebuffEvents,
    CastEvents,
    ResourceEvents,
    DeathEvents,
    CombatantInfo,
}

impl DataDomain {
    /// Every domain, reference domains first.
    pub const ALL: [DataDomain; 11] = [
        DataDomain::ReportFights,
        DataDomain::MasterData,
        DataDomain::PlayerData,
        DataDomain::DamageEvents,
        DataDomain::HealingEvents,
        DataDomain::BuffEvents,
        DataDomain::DebuffEvents,
        DataDomain::CastEvents,
        DataDomain::ResourceEvents,
        DataDomain::DeathEvents,
        DataDomain::CombatantInfo,
    ];

    /// Stable kebab-case name used in cache keys and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataDomain::ReportFights => "report-fights",
            DataDomain::MasterData => "master-data",
            DataDomain::PlayerData => "player-data",
            DataDomain::DamageEvents => "damage-events",
            DataDomain::HealingEvents => "healing-events",
            DataDomain::BuffEvents => "buff-events",
            DataDomain::DebuffEvents => "debuff-events",
            DataDomain::CastEvents => "cast-events",
            DataDomain::ResourceEvents => "resource-events",
            DataDomain::DeathEvents => "death-events",
            DataDomain::CombatantInfo => "combatant-info",
        }
    }

    /// Event domains hold combat events, which stop changing once a fight
    /// has been fully ingested.
    pub fn is_event_domain(&self) -> bool {
        !matches!(
            self,
            DataDomain::ReportFights | DataDomain::MasterData | DataDomain::PlayerData
        )
    }
}

impl fmt::Display for DataDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataDomain {
    type Err = DataDomainParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataDomain::ALL
            .iter()
            .copied()
            .find(|domain| domain.as_str() == s)
            .ok_or_else(|| DataDomainParseError(s.to_string()))
    }
}

// Serialized through the kebab-case name so domains work as TOML table keys.
impl Serialize for DataDomain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DataDomain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(de::Error::custom)
    }
}

/// Error when parsing an unknown data domain name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDomainParseError(pub String);

impl fmt::Display for DataDomainParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid data domain: {}", self.0)
    }
}

impl std::error::Error for DataDomainParseError {}

// ============================================================================
// ENTRY LIFECYCLE
// ============================================================================

/// Lifecycle state of one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Created, never requested.
    #[default]
    Idle,
    /// First fetch (or retry after failure) in flight; no data to show.
    Loading,
    /// Last fetch succeeded; data is present.
    Succeeded,
    /// Last first-load fetch failed; no data to show.
    Failed,
    /// Background refresh in flight; previous data still readable.
    Refreshing,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Idle => "Idle",
            EntryStatus::Loading => "Loading",
            EntryStatus::Succeeded => "Succeeded",
            EntryStatus::Failed => "Failed",
            EntryStatus::Refreshing => "Refreshing",
        }
    }

    /// A fetch currently owns the entry.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, EntryStatus::Loading | EntryStatus::Refreshing)
    }

    /// The entry reached a terminal state of its last fetch.
    pub fn is_settled(&self) -> bool {
        matches!(self, EntryStatus::Succeeded | EntryStatus::Failed)
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
