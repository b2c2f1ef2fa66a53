//! Report payloads as the API returns them.
//!
//! Field names follow the GraphQL schema (camelCase). Every payload reports
//! an estimated size proportional to what it holds so the per-domain byte
//! budget means something.

use std::mem::size_of;

use fightcache_core::CachePayload;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn opt_len(s: &Option<String>) -> usize {
    s.as_deref().map_or(0, str::len)
}

// ============================================================================
// REPORT FIGHTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: u32,
    pub name: String,
}

/// One pull inside a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fight {
    pub id: u32,
    pub name: String,
    #[serde(rename = "encounterID", default)]
    pub encounter_id: u32,
    /// Milliseconds relative to the report start.
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub kill: Option<bool>,
    #[serde(default)]
    pub difficulty: Option<u32>,
    #[serde(default)]
    pub fight_percentage: Option<f64>,
}

impl Fight {
    pub fn duration_ms(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }

    /// Trash pulls carry no encounter.
    pub fn is_boss(&self) -> bool {
        self.encounter_id != 0
    }
}

/// Report header plus its fight list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFights {
    pub code: String,
    pub title: String,
    /// Unix milliseconds.
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub zone: Option<Zone>,
    #[serde(default)]
    pub fights: Vec<Fight>,
}

impl ReportFights {
    pub fn fight(&self, id: u32) -> Option<&Fight> {
        self.fights.iter().find(|fight| fight.id == id)
    }
}

impl CachePayload for ReportFights {
    fn estimated_size(&self) -> usize {
        size_of::<Self>()
            + self.code.len()
            + self.title.len()
            + self.zone.as_ref().map_or(0, |zone| zone.name.len())
            + self
                .fights
                .iter()
                .map(|fight| size_of::<Fight>() + fight.name.len())
                .sum::<usize>()
    }
}

// ============================================================================
// MASTER DATA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: i64,
    pub name: String,
    /// `Player`, `NPC` or `Pet`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub pet_owner: Option<i64>,
    #[serde(rename = "gameID", default)]
    pub game_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ability {
    #[serde(rename = "gameID")]
    pub game_id: i64,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(rename = "type", default)]
    pub school: Option<String>,
}

/// Actors and abilities referenced by a report's events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterData {
    #[serde(default)]
    pub actors: Vec<Actor>,
    #[serde(default)]
    pub abilities: Vec<Ability>,
}

impl MasterData {
    pub fn actor(&self, id: i64) -> Option<&Actor> {
        self.actors.iter().find(|actor| actor.id == id)
    }

    pub fn ability(&self, game_id: i64) -> Option<&Ability> {
        self.abilities.iter().find(|ability| ability.game_id == game_id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter().filter(|actor| actor.kind == "Player")
    }
}

impl CachePayload for MasterData {
    fn estimated_size(&self) -> usize {
        let actors: usize = self
            .actors
            .iter()
            .map(|a| {
                size_of::<Actor>() + a.name.len() + a.kind.len()
                    + opt_len(&a.sub_type)
                    + opt_len(&a.server)
            })
            .sum();
        let abilities: usize = self
            .abilities
            .iter()
            .map(|a| {
                size_of::<Ability>() + a.name.len() + opt_len(&a.icon)
                    + opt_len(&a.school)
            })
            .sum();
        size_of::<Self>() + actors + abilities
    }
}

// ============================================================================
// PLAYER DATA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDetail {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub guid: Option<i64>,
    /// Class name.
    #[serde(rename = "type")]
    pub class: String,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    /// Gear, talents and specialization; shape varies by game version.
    #[serde(default)]
    pub combatant_info: Option<Value>,
}

/// Players of a fight (or the whole report) grouped by role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerData {
    #[serde(default)]
    pub tanks: Vec<PlayerDetail>,
    #[serde(default)]
    pub healers: Vec<PlayerDetail>,
    #[serde(default)]
    pub dps: Vec<PlayerDetail>,
}

impl PlayerData {
    pub fn len(&self) -> usize {
        self.tanks.len() + self.healers.len() + self.dps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> impl Iterator<Item = &PlayerDetail> {
        self.tanks.iter().chain(&self.healers).chain(&self.dps)
    }
}

impl CachePayload for PlayerData {
    fn estimated_size(&self) -> usize {
        size_of::<Self>()
            + self
                .all()
                .map(|p| {
                    size_of::<PlayerDetail>()
                        + p.name.len()
                        + p.class.len()
                        + opt_len(&p.server)
                        + opt_len(&p.icon)
                        + p.combatant_info.as_ref().map_or(0, Value::estimated_size)
                })
                .sum::<usize>()
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Events of one data type, possibly assembled from several API pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    #[serde(default)]
    pub data: Vec<Value>,
    /// Where the next page would start; `None` once exhausted.
    #[serde(default)]
    pub next_page_timestamp: Option<f64>,
}

impl EventPage {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when pagination stopped at the page cap with events left over.
    pub fn is_truncated(&self) -> bool {
        self.next_page_timestamp.is_some()
    }

    /// Append a following page, taking over its continuation timestamp.
    pub fn extend(&mut self, next: EventPage) {
        self.data.extend(next.data);
        self.next_page_timestamp = next.next_page_timestamp;
    }
}

impl CachePayload for EventPage {
    fn estimated_size(&self) -> usize {
        size_of::<Self>() + self.data.estimated_size()
    }
}
