//! Property tests for cache key derivation.

use fightcache_core::{derive_key, CacheKey, DataDomain, FightId, ReportCode, SubScope};
use proptest::prelude::*;

fn arb_report() -> impl Strategy<Value = ReportCode> {
    // Separator characters on purpose; keys must stay injective around them.
    "[a-zA-Z0-9|:*f]{0,12}".prop_map(ReportCode::new)
}

fn arb_fight() -> impl Strategy<Value = Option<FightId>> {
    prop::option::of((0u32..200).prop_map(FightId::new))
}

fn arb_domain() -> impl Strategy<Value = DataDomain> {
    prop::sample::select(DataDomain::ALL.to_vec())
}

fn arb_triple() -> impl Strategy<Value = (ReportCode, Option<FightId>, DataDomain)> {
    (arb_report(), arb_fight(), arb_domain())
}

proptest! {
    #[test]
    fn key_is_stable_across_calls((report, fight, domain) in arb_triple()) {
        let first = derive_key(&report, fight, domain);
        let second = derive_key(&report, fight, domain);
        prop_assert_eq!(first.as_str(), second.as_str());
    }

    #[test]
    fn distinct_triples_never_collide(a in arb_triple(), b in arb_triple()) {
        let key_a = derive_key(&a.0, a.1, a.2);
        let key_b = derive_key(&b.0, b.1, b.2);
        prop_assert_eq!(a == b, key_a == key_b);
        prop_assert_eq!(a == b, key_a.as_str() == key_b.as_str());
    }

    #[test]
    fn decode_recovers_the_triple((report, fight, domain) in arb_triple()) {
        let key = derive_key(&report, fight, domain);
        let decoded = CacheKey::decode(key.as_str());
        prop_assert!(decoded.is_some());
        let decoded = decoded.unwrap();
        prop_assert_eq!(decoded.report(), &report);
        prop_assert_eq!(decoded.sub_scope(), SubScope::from(fight));
        prop_assert_eq!(decoded.domain(), domain);
    }

    #[test]
    fn whole_report_and_fight_keys_differ(
        report in arb_report(),
        id in 0u32..200,
        domain in arb_domain(),
    ) {
        let whole = derive_key(&report, None, domain);
        let fight = derive_key(&report, Some(FightId::new(id)), domain);
        prop_assert_ne!(whole, fight);
    }
}
