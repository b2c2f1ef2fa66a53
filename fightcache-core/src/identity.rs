//! Identifiers for report contexts and their fight sub-scopes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Code identifying one uploaded combat-log report.
///
/// The report code is the session context every cached value hangs off.
/// Codes are taken verbatim: callers pass canonical (already trimmed) codes
/// and no normalization happens here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportCode(String);

impl ReportCode {
    /// Wrap a report code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Borrow the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ReportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ReportCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ReportCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for ReportCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

/// Fight identifier, unique within one report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FightId(u32);

impl FightId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for FightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FightId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Optional narrowing of a report context.
///
/// `All` is the reserved "whole report" scope. It is a distinct variant, not a
/// magic fight number, so it can never collide with a real fight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubScope {
    /// The whole report, no fight filter.
    #[default]
    All,
    /// A single fight.
    Fight(FightId),
}

impl SubScope {
    /// The fight this scope narrows to, if any.
    pub fn fight(&self) -> Option<FightId> {
        match self {
            SubScope::All => None,
            SubScope::Fight(id) => Some(*id),
        }
    }

    pub fn is_whole_report(&self) -> bool {
        matches!(self, SubScope::All)
    }
}

impl From<Option<FightId>> for SubScope {
    fn from(fight: Option<FightId>) -> Self {
        fight.map_or(SubScope::All, SubScope::Fight)
    }
}

impl From<FightId> for SubScope {
    fn from(fight: FightId) -> Self {
        SubScope::Fight(fight)
    }
}

impl fmt::Display for SubScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubScope::All => f.write_str("all"),
            SubScope::Fight(id) => write!(f, "fight {}", id),
        }
    }
}
