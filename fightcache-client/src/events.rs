//! Mapping between event domains and the API's `EventDataType`.

use std::fmt;

use fightcache_core::DataDomain;
use serde::Serialize;

/// Values of the GraphQL `EventDataType` enum the cache fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventDataType {
    DamageDone,
    Healing,
    Buffs,
    Debuffs,
    Casts,
    Resources,
    Deaths,
    CombatantInfo,
}

impl EventDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventDataType::DamageDone => "DamageDone",
            EventDataType::Healing => "Healing",
            EventDataType::Buffs => "Buffs",
            EventDataType::Debuffs => "Debuffs",
            EventDataType::Casts => "Casts",
            EventDataType::Resources => "Resources",
            EventDataType::Deaths => "Deaths",
            EventDataType::CombatantInfo => "CombatantInfo",
        }
    }

    /// The data type backing an event domain; `None` for reference domains.
    pub fn for_domain(domain: DataDomain) -> Option<Self> {
        let data_type = match domain {
            DataDomain::DamageEvents => EventDataType::DamageDone,
            DataDomain::HealingEvents => EventDataType::Healing,
            DataDomain::BuffEvents => EventDataType::Buffs,
            DataDomain::DebuffEvents => EventDataType::Debuffs,
            DataDomain::CastEvents => EventDataType::Casts,
            DataDomain::ResourceEvents => EventDataType::Resources,
            DataDomain::DeathEvents => EventDataType::Deaths,
            DataDomain::CombatantInfo => EventDataType::CombatantInfo,
            DataDomain::ReportFights | DataDomain::MasterData | DataDomain::PlayerData => {
                return None
            }
        };
        Some(data_type)
    }
}

impl fmt::Display for EventDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
