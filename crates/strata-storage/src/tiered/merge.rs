//! Draining level-0 into level-1.

use crate::btree::{LeafEntry, ScanVisibility, ENTRY_POSTING_FLAG, ENTRY_SIZE_MASK};
use crate::catalog::{IndexEntry, TableEntry};
use crate::lock::LockMode;
use std::time::Duration;
use strata_common::{Result, StrataError};

/// Counters of one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Stored level-0 entries visited.
    pub entries_visited: u64,
    /// Posting entries split into single-reference entries.
    pub postings_decomposed: u64,
    /// Row references inserted into level-1.
    pub rows_merged: u64,
    /// Row references level-1 already held, left by an earlier failed merge.
    pub already_present: u64,
}

/// Splits a posting entry into one single-reference entry per row reference.
///
/// Each result keeps the key and the non-format bits of the original info
/// tag; the posting bit is cleared and the size bits describe the single form.
pub fn decompose_posting(entry: &LeafEntry) -> Vec<LeafEntry> {
    entry
        .tids()
        .iter()
        .map(|tid| {
            let single = LeafEntry::from_parts(entry.key.clone(), 0, vec![*tid]);
            let size = single.encoded_len() as u16 & ENTRY_SIZE_MASK;
            let info = (entry.info() & !(ENTRY_SIZE_MASK | ENTRY_POSTING_FLAG)) | size;
            LeafEntry::from_parts(entry.key.clone(), info, vec![*tid])
        })
        .collect()
}

/// Copies every entry physically present in level-0 into level-1.
///
/// Level-0 is read in ascending order with dead hints ignored, since it is
/// about to be discarded. Level-0 is left untouched. Entries level-1 already
/// holds are skipped, so a merge interrupted by an error can be run again.
pub(crate) fn merge_level0(
    level0: &IndexEntry,
    table: &TableEntry,
    level1: &IndexEntry,
    timeout: Duration,
) -> Result<MergeStats> {
    let _level0_lock = level0.lock.acquire(LockMode::ShareUpdateExclusive, timeout)?;
    let _table_lock = table.lock.acquire(LockMode::AccessShare, timeout)?;
    let _level1_lock = level1.lock.acquire(LockMode::ShareUpdateExclusive, timeout)?;

    let entries = level0.tree().scan_entries(ScanVisibility::Any)?;
    tracing::info!(
        level0 = %level0.id,
        level1 = %level1.id,
        entries = entries.len(),
        "merge started"
    );

    let mut stats = MergeStats::default();
    for entry in &entries {
        stats.entries_visited += 1;
        if entry.is_posting() {
            stats.postings_decomposed += 1;
            for single in decompose_posting(entry) {
                insert_merged(level1, &single, &mut stats)?;
            }
        } else {
            insert_merged(level1, entry, &mut stats)?;
        }
    }

    tracing::info!(
        level0 = %level0.id,
        level1 = %level1.id,
        rows = stats.rows_merged,
        postings = stats.postings_decomposed,
        skipped = stats.already_present,
        "merge finished"
    );
    Ok(stats)
}

fn insert_merged(level1: &IndexEntry, entry: &LeafEntry, stats: &mut MergeStats) -> Result<()> {
    match level1.tree().insert_entry(entry) {
        Ok(()) => {
            stats.rows_merged += 1;
            Ok(())
        }
        Err(StrataError::DuplicateEntry { .. }) => {
            stats.already_present += 1;
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::am::UniqueCheck;
    use crate::catalog::{Catalog, IndexDefinition};
    use crate::tuple::TupleId;
    use bytes::Bytes;
    use std::sync::Arc;
    use strata_common::page::PageId;

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn tid(n: u32) -> TupleId {
        TupleId::new(PageId::new(5, n), 1)
    }

    fn setup() -> (Catalog, Arc<TableEntry>, Arc<IndexEntry>, Arc<IndexEntry>) {
        let catalog = Catalog::new(1, 10);
        let table_id = catalog.create_table("t").unwrap();
        let level0 = catalog
            .create_index(table_id, "t_idx", IndexDefinition::new(["k"]), std::iter::empty())
            .unwrap();
        let level1 = catalog
            .create_index_like(table_id, level0.id, "t_idx_lev1")
            .unwrap();
        let table = catalog.table(table_id).unwrap();
        (catalog, table, level0, level1)
    }

    #[test]
    fn test_decompose_posting() {
        let posting = LeafEntry::posting(Bytes::from_static(b"key"), vec![tid(3), tid(1), tid(2)]);
        assert!(posting.is_posting());

        let singles = decompose_posting(&posting);
        assert_eq!(singles.len(), 3);
        for (single, expected) in singles.iter().zip([tid(1), tid(2), tid(3)]) {
            assert!(single.validate());
            assert!(!single.is_posting());
            assert_eq!(single.key, posting.key);
            assert_eq!(single.tids(), &[expected]);
            assert_eq!(single.tagged_size(), 2 + 3 + 2 + TupleId::SIZE);
        }
    }

    #[test]
    fn test_decompose_keeps_dead_hint() {
        let mut posting = LeafEntry::posting(Bytes::from_static(b"k"), vec![tid(1), tid(2)]);
        posting.set_dead(true);
        let singles = decompose_posting(&posting);
        assert!(singles.iter().all(|s| s.is_dead() && s.validate()));
    }

    #[test]
    fn test_merge_moves_everything_in_order() {
        let (_catalog, table, level0, level1) = setup();
        level1.tree().insert(b"b", tid(100), UniqueCheck::No).unwrap();
        level0.tree().insert(b"c", tid(1), UniqueCheck::No).unwrap();
        level0.tree().insert(b"a", tid(2), UniqueCheck::No).unwrap();
        for n in 10..15 {
            level0.tree().insert(b"d", tid(n), UniqueCheck::No).unwrap();
        }

        let stats = merge_level0(&level0, &table, &level1, TIMEOUT).unwrap();
        assert_eq!(stats.entries_visited, 3);
        assert_eq!(stats.postings_decomposed, 1);
        assert_eq!(stats.rows_merged, 7);

        let keys: Vec<Bytes> = level1
            .tree()
            .scan_entries(ScanVisibility::Any)
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys.first().map(|k| k.as_ref()), Some(&b"a"[..]));
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(level1.tree().search(b"d").unwrap(), (10..15).map(tid).collect::<Vec<_>>());

        // Level-0 is untouched until truncated.
        assert_eq!(level0.tree().stats().unwrap().num_index_tuples, 7);
    }

    #[test]
    fn test_merge_includes_dead_entries() {
        let (_catalog, table, level0, level1) = setup();
        level0.tree().insert(b"x", tid(1), UniqueCheck::No).unwrap();
        assert!(level0.tree().kill_entry(b"x", tid(1)).unwrap());

        merge_level0(&level0, &table, &level1, TIMEOUT).unwrap();
        assert_eq!(level1.tree().search(b"x").unwrap(), vec![tid(1)]);
    }

    #[test]
    fn test_merge_rerun_skips_present_rows() {
        let (_catalog, table, level0, level1) = setup();
        level0.tree().insert(b"x", tid(1), UniqueCheck::No).unwrap();
        level0.tree().insert(b"y", tid(2), UniqueCheck::No).unwrap();

        merge_level0(&level0, &table, &level1, TIMEOUT).unwrap();
        let again = merge_level0(&level0, &table, &level1, TIMEOUT).unwrap();
        assert_eq!(again.rows_merged, 0);
        assert_eq!(again.already_present, 2);
        assert_eq!(level1.tree().stats().unwrap().num_index_tuples, 2);
    }

    #[test]
    fn test_merge_respects_level1_lock() {
        let (_catalog, table, level0, level1) = setup();
        let _held = level1
            .lock
            .acquire(LockMode::ShareUpdateExclusive, TIMEOUT)
            .unwrap();
        assert!(matches!(
            merge_level0(&level0, &table, &level1, Duration::from_millis(10)),
            Err(StrataError::LockTimeout { .. })
        ));
    }
}
