use std::collections::HashSet;
use crate::cache::RecencyIndex;
use crate::config::PolicyKind;
use crate::record::RecordId;
use crate::replacement_policies::{Access, GenericPolicy, LeastRecentlyUsed, ReplacementPolicy, UniformRandom};
use crate::store::{BackingStore, MemoryStore};
use crate::test::{record, TestResult};

fn ids(index: &RecencyIndex) -> Vec<u64> {
    index.iter().map(|id| id.0).collect()
}

fn connected_store() -> std::result::Result<MemoryStore, crate::Error> {
    let mut store = MemoryStore::new();
    store.connect()?;
    Ok(store)
}

#[test]
fn recency_index_orders_by_last_use() {
    let mut index = RecencyIndex::with_capacity(4);
    for id in 1..=4 {
        index.push_most_recent(RecordId(id));
    }
    assert_eq!(ids(&index), vec![1, 2, 3, 4]);
    assert!(index.touch(RecordId(2)));
    assert!(!index.touch(RecordId(9)));
    assert_eq!(ids(&index), vec![1, 3, 4, 2]);
    assert_eq!(index.least_recent(), Some(RecordId(1)));
    assert_eq!(index.most_recent(), Some(RecordId(2)));

    assert_eq!(index.pop_least_recent(), Some(RecordId(1)));
    assert!(index.remove(RecordId(4)));
    assert!(!index.remove(RecordId(4)));
    assert_eq!(ids(&index), vec![3, 2]);

    // Freed slots are reused
    index.push_most_recent(RecordId(5));
    index.push_most_recent(RecordId(6));
    assert_eq!(ids(&index), vec![3, 2, 5, 6]);
    assert_eq!(index.len(), 4);
    assert!(index.contains(RecordId(5)));
}

#[test]
fn recency_index_push_of_a_member_touches_it() {
    let mut index = RecencyIndex::default();
    index.push_most_recent(RecordId(1));
    index.push_most_recent(RecordId(2));
    index.push_most_recent(RecordId(1));
    assert_eq!(ids(&index), vec![2, 1]);
    assert_eq!(index.len(), 2);
}

#[test]
fn recency_index_empties_cleanly() {
    let mut index = RecencyIndex::default();
    assert_eq!(index.pop_least_recent(), None);
    index.push_most_recent(RecordId(1));
    assert_eq!(index.pop_least_recent(), Some(RecordId(1)));
    assert!(index.is_empty());
    assert_eq!(index.least_recent(), None);
    assert_eq!(index.most_recent(), None);

    index.push_most_recent(RecordId(2));
    index.push_most_recent(RecordId(3));
    index.clear();
    assert!(index.is_empty());
    assert_eq!(ids(&index), Vec::<u64>::new());
}

#[test]
fn lru_evicts_the_least_recently_used_record() -> TestResult {
    let mut store = connected_store()?;
    let mut policy = LeastRecentlyUsed::new(2);
    policy.access(&record(1, "a"), &mut store)?;
    policy.access(&record(2, "a"), &mut store)?;
    policy.access(&record(1, "a"), &mut store)?;
    let access = policy.access(&record(3, "a"), &mut store)?;
    assert_eq!(access, Access::Miss { evicted: Some(RecordId(2)), repaired: false });
    assert!(!store.contains_key(RecordId(2)));
    assert!(store.contains_key(RecordId(1)));
    assert!(store.contains_key(RecordId(3)));
    assert_eq!(ids(policy.index()), vec![1, 3]);
    Ok(())
}

#[test]
fn lru_stays_bounded_and_spares_the_latest_record() -> TestResult {
    // With two slots the previous record is always cached, so evicting by the wrong end picks it
    let mut store = connected_store()?;
    let mut policy = LeastRecentlyUsed::new(2);
    let mut previous: Option<RecordId> = None;
    let mut evictions = 0;
    for step in 0..200u64 {
        let id = (step * step + 3 * step) % 13 + 1;
        let oldest = policy.index().least_recent();
        if let Access::Miss { evicted: Some(victim), .. } = policy.access(&record(id, "a"), &mut store)? {
            assert_ne!(Some(victim), previous, "step {step} evicted the latest record");
            assert_eq!(Some(victim), oldest);
            evictions += 1;
        }
        assert!(policy.cached_len() <= 2);
        assert_eq!(store.len(), policy.cached_len());
        assert_eq!(policy.index().most_recent(), Some(RecordId(id)));
        previous = Some(RecordId(id));
    }
    assert!(evictions > 100);
    Ok(())
}

#[test]
fn lru_restores_an_entry_the_store_lost() -> TestResult {
    let mut store = connected_store()?;
    let mut policy = LeastRecentlyUsed::new(3);
    policy.access(&record(1, "a"), &mut store)?;
    policy.access(&record(2, "b"), &mut store)?;
    assert!(store.evict_external(RecordId(1)));

    let access = policy.access(&record(1, "a"), &mut store)?;
    assert_eq!(access, Access::Hit { repaired: true });
    assert!(store.contains_key(RecordId(1)));
    assert_eq!(policy.cached_len(), 2);
    assert_eq!(policy.access(&record(1, "a"), &mut store)?, Access::Hit { repaired: false });
    Ok(())
}

#[test]
fn random_restores_an_entry_the_store_lost() -> TestResult {
    let mut store = connected_store()?;
    let mut policy = UniformRandom::new(2, Some(1));
    policy.access(&record(1, "a"), &mut store)?;
    store.evict_external(RecordId(1));

    let access = policy.access(&record(1, "a"), &mut store)?;
    assert_eq!(access, Access::Miss { evicted: None, repaired: true });
    assert!(store.contains_key(RecordId(1)));
    assert_eq!(policy.cached(), &[RecordId(1)]);
    assert!(policy.access(&record(1, "a"), &mut store)?.is_hit());
    Ok(())
}

#[test]
fn random_only_evicts_what_it_cached() -> TestResult {
    let mut store = connected_store()?;
    let mut policy = UniformRandom::new(5, Some(9));
    for round in 0..4u64 {
        for id in 1..=30u64 {
            let id = (id * 7 + round) % 30 + 1;
            let before: HashSet<RecordId> = policy.cached().iter().copied().collect();
            let access = policy.access(&record(id, "a"), &mut store)?;
            if let Access::Miss { evicted: Some(victim), .. } = access {
                assert!(before.contains(&victim), "evicted {victim}, which wasn't cached");
                assert!(!store.contains_key(victim));
            }
            assert!(policy.cached_len() <= 5);
            assert_eq!(store.len(), policy.cached_len());
            assert!(store.contains_key(RecordId(id)));
        }
    }
    Ok(())
}

#[test]
fn random_victims_depend_only_on_the_seed() -> TestResult {
    let victims = |seed| -> std::result::Result<Vec<RecordId>, crate::Error> {
        let mut store = connected_store()?;
        let mut policy = UniformRandom::new(3, Some(seed));
        let mut victims = Vec::new();
        for id in 1..=20 {
            if let Access::Miss { evicted: Some(victim), .. } = policy.access(&record(id, "a"), &mut store)? {
                victims.push(victim);
            }
        }
        Ok(victims)
    };
    let first = victims(5)?;
    assert_eq!(first.len(), 17);
    assert_eq!(first, victims(5)?);
    Ok(())
}

#[test]
fn unbounded_never_evicts() -> TestResult {
    let mut store = connected_store()?;
    let mut policy = GenericPolicy::new(PolicyKind::Unbounded, 0, None)?;
    assert_eq!(policy.kind(), PolicyKind::Unbounded);
    for id in 1..=100 {
        assert_eq!(policy.access(&record(id, "a"), &mut store)?, Access::Miss { evicted: None, repaired: false });
    }
    assert_eq!(policy.cached_len(), 100);
    assert_eq!(store.len(), 100);
    assert!(policy.access(&record(50, "a"), &mut store)?.is_hit());
    policy.clear();
    assert_eq!(policy.cached_len(), 0);
    Ok(())
}

#[test]
fn generic_policy_matches_its_kind() -> TestResult {
    for kind in [PolicyKind::LeastRecentlyUsed, PolicyKind::UniformRandom, PolicyKind::Unbounded] {
        assert_eq!(GenericPolicy::new(kind, 3, Some(1))?.kind(), kind);
    }
    assert!(GenericPolicy::new(PolicyKind::LeastRecentlyUsed, 0, None).is_err());
    Ok(())
}

#[test]
fn policies_propagate_store_failures() -> TestResult {
    let mut store = connected_store()?;
    store.set_available(false);
    let mut policy = GenericPolicy::new(PolicyKind::LeastRecentlyUsed, 2, None)?;
    assert!(matches!(policy.access(&record(1, "a"), &mut store), Err(crate::Error::StoreUnavailable(_))));
    Ok(())
}
