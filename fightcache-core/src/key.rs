//! Cache key derivation.
//!
//! A [`CacheKey`] can only be built from the full (report, sub-scope, domain)
//! triple. The private inner struct means there is no way to hand-assemble a
//! key string that skips a component.
//!
//! # String Format
//!
//! ```text
//! <domain>|<report byte length>:<report code>|<scope>
//!
//! damage-events|6:a1B2c3|f12     fight 12 of report a1B2c3
//! master-data|6:a1B2c3|*         whole report
//! ```
//!
//! The length prefix makes the encoding injective even when a report code
//! contains `|`, `:` or `*`. The whole-report sentinel `*` can never be
//! mistaken for a fight segment, which always starts with `f`.

use crate::{DataDomain, FightId, ReportCode, SubScope};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

const FIELD_SEPARATOR: char = '|';
const LENGTH_MARKER: char = ':';
const WHOLE_REPORT: &str = "*";
const FIGHT_PREFIX: char = 'f';

/// Deterministic key for one (report, sub-scope, domain) triple.
///
/// Cloning is cheap; the parts and their encoding are shared.
#[derive(Clone)]
pub struct CacheKey {
    inner: Arc<KeyInner>,
}

struct KeyInner {
    report: ReportCode,
    sub_scope: SubScope,
    domain: DataDomain,
    encoded: String,
}

impl CacheKey {
    /// Build the key for a report context within a data domain.
    pub fn new(report: ReportCode, sub_scope: SubScope, domain: DataDomain) -> Self {
        let encoded = encode(&report, sub_scope, domain);
        Self {
            inner: Arc::new(KeyInner {
                report,
                sub_scope,
                domain,
                encoded,
            }),
        }
    }

    pub fn report(&self) -> &ReportCode {
        &self.inner.report
    }

    pub fn sub_scope(&self) -> SubScope {
        self.inner.sub_scope
    }

    pub fn domain(&self) -> DataDomain {
        self.inner.domain
    }

    /// The encoded key string.
    pub fn as_str(&self) -> &str {
        &self.inner.encoded
    }

    /// Check whether this key belongs to the given report, in any sub-scope.
    pub fn belongs_to(&self, report: &ReportCode) -> bool {
        &self.inner.report == report
    }

    /// Parse an encoded key string.
    ///
    /// Returns `None` unless the string is exactly what [`CacheKey::new`]
    /// would produce for some triple, so `decode(k.as_str()) == Some(k)`.
    pub fn decode(encoded: &str) -> Option<Self> {
        let (domain, rest) = encoded.split_once(FIELD_SEPARATOR)?;
        let domain: DataDomain = domain.parse().ok()?;

        let (len, rest) = rest.split_once(LENGTH_MARKER)?;
        let len: usize = len.parse().ok()?;
        let report = rest.get(..len)?;
        let scope = rest.get(len..)?.strip_prefix(FIELD_SEPARATOR)?;

        let sub_scope = if scope == WHOLE_REPORT {
            SubScope::All
        } else {
            let id: u32 = scope.strip_prefix(FIGHT_PREFIX)?.parse().ok()?;
            SubScope::Fight(FightId::new(id))
        };

        // Rejects non-canonical spellings such as "f+1" or "f01".
        let key = Self::new(ReportCode::new(report), sub_scope, domain);
        (key.as_str() == encoded).then_some(key)
    }
}

/// Derive the cache key for `(report, fight, domain)`.
///
/// `fight == None` maps to the whole-report scope.
pub fn derive_key(report: &ReportCode, fight: Option<FightId>, domain: DataDomain) -> CacheKey {
    CacheKey::new(report.clone(), SubScope::from(fight), domain)
}

fn encode(report: &ReportCode, sub_scope: SubScope, domain: DataDomain) -> String {
    let code = report.as_str();
    let scope = match sub_scope {
        SubScope::All => WHOLE_REPORT.to_string(),
        SubScope::Fight(id) => format!("{}{}", FIGHT_PREFIX, id.get()),
    };
    format!(
        "{}{}{}{}{}{}{}",
        domain.as_str(),
        FIELD_SEPARATOR,
        code.len(),
        LENGTH_MARKER,
        code,
        FIELD_SEPARATOR,
        scope
    )
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.inner.encoded == other.inner.encoded
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.encoded.hash(state);
    }
}

impl PartialOrd for CacheKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CacheKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.encoded.cmp(&other.inner.encoded)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CacheKey").field(&self.inner.encoded).finish()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(code: &str) -> ReportCode {
        ReportCode::new(code)
    }

    #[test]
    fn test_key_format() {
        let key = derive_key(&report("a1B2c3"), Some(FightId::new(12)), DataDomain::DamageEvents);
        assert_eq!(key.as_str(), "damage-events|6:a1B2c3|f12");

        let whole = derive_key(&report("a1B2c3"), None, DataDomain::MasterData);
        assert_eq!(whole.as_str(), "master-data|6:a1B2c3|*");
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = derive_key(&report("xyz"), Some(FightId::new(1)), DataDomain::BuffEvents);
        let b = derive_key(&report("xyz"), Some(FightId::new(1)), DataDomain::BuffEvents);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), b.as_str());
    }

    #[test]
    fn test_sentinel_never_matches_fight() {
        let whole = derive_key(&report("r"), None, DataDomain::CastEvents);
        let fight_zero = derive_key(&report("r"), Some(FightId::new(0)), DataDomain::CastEvents);
        assert_ne!(whole, fight_zero);
    }

    #[test]
    fn test_separator_in_report_code_does_not_collide() {
        let tricky = CacheKey::new(report("a|f1"), SubScope::All, DataDomain::PlayerData);
        let plain = CacheKey::new(
            report("a"),
            SubScope::Fight(FightId::new(1)),
            DataDomain::PlayerData,
        );
        assert_ne!(tricky, plain);
        assert_eq!(CacheKey::decode(tricky.as_str()), Some(tricky.clone()));
        assert_eq!(CacheKey::decode(plain.as_str()), Some(plain));
    }

    #[test]
    fn test_decode_accessors() {
        let key = derive_key(&report("abc"), Some(FightId::new(9)), DataDomain::DeathEvents);
        let decoded = CacheKey::decode(key.as_str()).expect("decodes");
        assert_eq!(decoded.report(), &report("abc"));
        assert_eq!(decoded.sub_scope(), SubScope::Fight(FightId::new(9)));
        assert_eq!(decoded.domain(), DataDomain::DeathEvents);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(CacheKey::decode("").is_none());
        assert!(CacheKey::decode("nope|3:abc|*").is_none());
        assert!(CacheKey::decode("master-data|4:abc|*").is_none());
        assert!(CacheKey::decode("master-data|3:abc|x1").is_none());
        assert!(CacheKey::decode("master-data|3:abc|f01").is_none());
        assert!(CacheKey::decode("master-data|3:abc|f+1").is_none());
        assert!(CacheKey::decode("master-data|3:abc*").is_none());
    }

    #[test]
    fn test_belongs_to() {
        let key = derive_key(&report("abc"), Some(FightId::new(2)), DataDomain::HealingEvents);
        assert!(key.belongs_to(&report("abc")));
        assert!(!key.belongs_to(&report("abcd")));
    }
}
