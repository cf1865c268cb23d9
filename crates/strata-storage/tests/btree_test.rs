//! B+ tree and access-method integration tests.
//!
//! Drives the index through the shared access-method trait:
//! - Randomized inserts checked against an ordered model
//! - Bulk delete followed by vacuum cleanup
//! - Scans in both directions under bounds
//! - Capability reporting and unsupported operations

use bytes::Bytes;
use rand::Rng;
use std::collections::BTreeSet;
use std::sync::Arc;

use strata_common::page::PageId;
use strata_common::{BTreeConfig, CostParams, StrataError, TierConfig};
use strata_storage::{
    BTreeIndex, Catalog, IndexAccessMethod, IndexDefinition, IndexProperty, ScanBounds,
    ScanDirection, ScanVisibility, TieredIndex, TupleId, UniqueCheck,
};

// =============================================================================
// Helpers
// =============================================================================

fn tid(n: u32) -> TupleId {
    TupleId::new(PageId::new(7, n / 100), (n % 100) as u16)
}

fn scan_all(am: &dyn IndexAccessMethod, direction: ScanDirection) -> Vec<(Vec<u8>, TupleId)> {
    am.begin_scan(ScanBounds::all(), direction, ScanVisibility::LiveOnly)
        .unwrap()
        .map(|item| (item.key.to_vec(), item.tuple_id))
        .collect()
}

// =============================================================================
// Randomized model check
// =============================================================================

#[test]
fn test_random_inserts_match_model() {
    let mut rng = rand::rng();
    let index = BTreeIndex::create(42, BTreeConfig::default()).unwrap();
    let mut model = BTreeSet::new();

    for n in 0..5000u32 {
        // A narrow key space keeps many duplicates in play.
        let len = rng.random_range(1..24usize);
        let fill = rng.random_range(0..40u8);
        let key = vec![fill; len];
        index.insert(&key, tid(n), UniqueCheck::No).unwrap();
        model.insert((key, tid(n)));
    }

    let forward = scan_all(&index, ScanDirection::Forward);
    assert_eq!(forward, model.iter().cloned().collect::<Vec<_>>());

    let mut backward = scan_all(&index, ScanDirection::Backward);
    backward.reverse();
    assert_eq!(backward, forward);

    assert!(index.height() > 1);
    index.verify_control_page().unwrap();
}

#[test]
fn test_bounded_scans() {
    let index = BTreeIndex::create(1, BTreeConfig::default()).unwrap();
    for n in 0..1000u32 {
        index
            .insert(&n.to_be_bytes(), tid(n), UniqueCheck::No)
            .unwrap();
    }

    let lo = 250u32.to_be_bytes();
    let hi = 260u32.to_be_bytes();
    let keys: Vec<Bytes> = index
        .begin_scan(
            ScanBounds::inclusive(Some(&lo), Some(&hi)),
            ScanDirection::Backward,
            ScanVisibility::LiveOnly,
        )
        .unwrap()
        .map(|item| item.key)
        .collect();

    let expected: Vec<Bytes> = (250..=260u32)
        .rev()
        .map(|n| Bytes::copy_from_slice(&n.to_be_bytes()))
        .collect();
    assert_eq!(keys, expected);
}

// =============================================================================
// Maintenance
// =============================================================================

#[test]
fn test_bulk_delete_then_vacuum() {
    let index = BTreeIndex::create(3, BTreeConfig::default()).unwrap();
    for n in 0..2000u32 {
        let key = (n % 50).to_be_bytes();
        index.insert(&key, tid(n), UniqueCheck::No).unwrap();
    }

    let am: &dyn IndexAccessMethod = &index;
    let bulk = am.bulk_delete(&mut |t: TupleId| t.slot_id % 2 == 0).unwrap();
    assert_eq!(bulk.tuples_removed, 1000);
    assert_eq!(bulk.num_index_tuples, 1000);

    let stats = am.vacuum_cleanup(Some(bulk)).unwrap();
    assert_eq!(stats.num_index_tuples, 1000);
    assert!(scan_all(am, ScanDirection::Forward)
        .iter()
        .all(|(_, t)| t.slot_id % 2 == 1));
}

#[test]
fn test_build_empty_resets_tree() {
    let index = BTreeIndex::create(4, BTreeConfig::default()).unwrap();
    for n in 0..500u32 {
        index.insert(&n.to_le_bytes(), tid(n), UniqueCheck::No).unwrap();
    }
    index.build_empty().unwrap();

    assert_eq!(index.height(), 1);
    assert!(scan_all(&index, ScanDirection::Forward).is_empty());
    index.insert(b"again", tid(1), UniqueCheck::Yes).unwrap();
    assert_eq!(index.search(b"again").unwrap(), vec![tid(1)]);
}

#[test]
fn test_cost_estimate_grows_with_selectivity() {
    let index = BTreeIndex::create(5, BTreeConfig::default()).unwrap();
    for n in 0..3000u32 {
        index.insert(&n.to_be_bytes(), tid(n), UniqueCheck::No).unwrap();
    }
    let params = CostParams::default();
    let narrow = index.cost_estimate(0.001, &params).unwrap();
    let wide = index.cost_estimate(0.5, &params).unwrap();
    assert!(narrow.total_cost < wide.total_cost);
    assert!(narrow.startup_cost > 0.0);

    assert!(matches!(
        index.cost_estimate(1.5, &params),
        Err(StrataError::InvalidParameter { .. })
    ));
}

// =============================================================================
// Access-method surface
// =============================================================================

#[test]
fn test_capabilities_of_both_methods() {
    let catalog = Arc::new(Catalog::new(1, 10));
    let table = catalog.create_table("events").unwrap();
    let tiered = TieredIndex::build(
        Arc::clone(&catalog),
        table,
        "events_ts",
        IndexDefinition::new(["ts"]),
        std::iter::empty::<(Bytes, TupleId)>(),
        TierConfig::default(),
    )
    .unwrap();
    let btree = BTreeIndex::create(9, BTreeConfig::default()).unwrap();

    let methods: [&dyn IndexAccessMethod; 2] = [&btree, &tiered];
    assert_eq!(methods[0].name(), "btree");
    assert_eq!(methods[1].name(), "lsm");
    assert!(methods[0].capabilities().can_unique);
    assert!(!methods[1].capabilities().can_unique);
    assert!(!methods[1].capabilities().search_array);

    for am in methods {
        assert_eq!(am.property(IndexProperty::Orderable), Some(true));
        assert!(am.can_return(0));
        assert!(matches!(
            am.begin_parallel_scan(ScanBounds::all(), 4),
            Err(StrataError::Unsupported { .. })
        ));
    }
}

#[test]
fn test_mark_position_unsupported() {
    let index = BTreeIndex::create(11, BTreeConfig::default()).unwrap();
    index.insert(b"a", tid(1), UniqueCheck::No).unwrap();
    let mut scan = index
        .begin_scan(ScanBounds::all(), ScanDirection::Forward, ScanVisibility::LiveOnly)
        .unwrap();

    let err = index.mark_position(&mut scan).unwrap_err();
    assert!(err.to_string().contains("mark_position"));
    assert!(index.restore_position(&mut scan).is_err());
}

#[test]
fn test_kill_hint_hides_entry_from_live_scans() {
    let config = BTreeConfig {
        deduplicate: false,
        ..BTreeConfig::default()
    };
    let index = BTreeIndex::create(12, config).unwrap();
    for n in 0..10u32 {
        index.insert(&[n as u8], tid(n), UniqueCheck::No).unwrap();
    }

    let mut scan = index
        .begin_scan(ScanBounds::point(&[3]), ScanDirection::Forward, ScanVisibility::LiveOnly)
        .unwrap();
    assert!(scan.next().is_some());
    assert!(scan.kill_current().unwrap());
    scan.end();

    assert!(index.search(&[3]).unwrap().is_empty());
    let all = index.scan_entries(ScanVisibility::Any).unwrap();
    assert_eq!(all.len(), 10);
}
