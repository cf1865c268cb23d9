//! Two-tier log-structured index over B+Trees.
//!
//! ```text
//! insert → [level-0: tiny B+Tree, metadata in its control page]
//!              │ full (level0_count == capacity)
//!              ▼
//!          merge every entry (postings split) → [level-1: large B+Tree]
//!              │
//!              ▼
//!          truncate level-0, reset counters, retry insert
//! ```
//!
//! Level-0 is the index the catalog hands out; level-1 is a sibling index on
//! the same table, created by the first merge and named with a suffix.
//! Everything except insert is answered by level-0 alone.

mod merge;
mod meta;
mod provision;
mod router;
mod truncate;

pub use merge::{decompose_posting, MergeStats};
pub use meta::{TierMetaGuard, TierMetaStore, TierMetadata};

use crate::am::{
    AmCapabilities, BulkDeleteStats, IndexAccessMethod, IndexCost, IndexProperty, IndexStats,
    UniqueCheck,
};
use crate::btree::{compare_positions, IndexScan, ScanBounds, ScanDirection, ScanItem, ScanVisibility};
use crate::catalog::{Catalog, IndexDefinition, IndexEntry};
use crate::tuple::TupleId;
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::Arc;
use strata_common::{CostParams, RelationId, Result, StrataError, TierConfig};

/// A two-tier index.
pub struct TieredIndex {
    catalog: Arc<Catalog>,
    level0: Arc<IndexEntry>,
    meta: TierMetaStore,
    /// Shared by inserts, exclusive for a merge.
    merge_gate: RwLock<()>,
    config: TierConfig,
}

impl TieredIndex {
    /// Builds level-0 over `table` from `rows` and initialises the tier
    /// metadata with zero counts and no level-1.
    pub fn build<I>(
        catalog: Arc<Catalog>,
        table: RelationId,
        name: &str,
        definition: IndexDefinition,
        rows: I,
        config: TierConfig,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (Bytes, TupleId)>,
    {
        config.validate()?;
        let level0 = catalog.create_index(table, name, definition, rows)?;

        let meta = TierMetaStore::new(Arc::clone(level0.tree()), config.lock_timeout());
        let initial = TierMetadata::new(table, level0.id, catalog.owner_id(), catalog.database_id());
        meta.initialize(&initial)?;

        tracing::info!(
            index = %level0.id,
            name,
            table = %table,
            capacity = config.level0_capacity,
            "built tiered index"
        );

        Ok(Self {
            catalog,
            level0,
            meta,
            merge_gate: RwLock::new(()),
            config,
        })
    }

    /// Opens an existing tiered index from its level-0 control page.
    pub fn open(catalog: Arc<Catalog>, index: RelationId, config: TierConfig) -> Result<Self> {
        config.validate()?;
        let level0 = catalog.index(index)?;
        level0.tree().verify_control_page()?;

        let meta = TierMetaStore::new(Arc::clone(level0.tree()), config.lock_timeout());
        let state = meta.snapshot()?;
        if state.level0 != index || state.base_table != level0.table_id {
            return Err(StrataError::MetadataCorrupted(format!(
                "metadata of {} describes level-0 {} on table {}",
                index, state.level0, state.base_table
            )));
        }
        state.check_invariants(config.level0_capacity)?;
        if let Some(level1) = state.level1 {
            catalog.index(level1)?;
        }

        Ok(Self {
            catalog,
            level0,
            meta,
            merge_gate: RwLock::new(()),
            config,
        })
    }

    /// Relation id of the index (its level-0).
    pub fn id(&self) -> RelationId {
        self.level0.id
    }

    pub fn level0(&self) -> &Arc<IndexEntry> {
        &self.level0
    }

    /// The level-1 index, if a merge has created it.
    pub fn level1(&self) -> Result<Option<Arc<IndexEntry>>> {
        match self.meta.snapshot()?.level1 {
            Some(id) => Ok(Some(self.catalog.index(id)?)),
            None => Ok(None),
        }
    }

    /// Snapshot of the tier metadata.
    pub fn tier_state(&self) -> Result<TierMetadata> {
        self.meta.snapshot()
    }

    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    pub fn meta_store(&self) -> &TierMetaStore {
        &self.meta
    }

    fn gate_timeout(&self) -> StrataError {
        StrataError::LockTimeout {
            resource: format!("merge gate of index {}", self.level0.id),
            timeout_ms: self.config.lock_timeout_ms,
        }
    }

    /// Live row references of both tiers within `bounds`, in (key, row
    /// reference) order.
    pub fn merged_scan(&self, bounds: ScanBounds) -> Result<Vec<ScanItem>> {
        // No merge can move entries between the two reads.
        let _gate = self
            .merge_gate
            .try_read_for(self.config.lock_timeout())
            .ok_or_else(|| self.gate_timeout())?;

        let level0_items: Vec<ScanItem> = self
            .level0
            .tree()
            .begin_scan(bounds.clone(), ScanDirection::Forward, ScanVisibility::LiveOnly)?
            .collect();
        let level1_items: Vec<ScanItem> = match self.meta.snapshot()?.level1 {
            Some(id) => self
                .catalog
                .index(id)?
                .tree()
                .begin_scan(bounds, ScanDirection::Forward, ScanVisibility::LiveOnly)?
                .collect(),
            None => Vec::new(),
        };

        let mut merged = Vec::with_capacity(level0_items.len() + level1_items.len());
        let mut level0_iter = level0_items.into_iter().peekable();
        let mut level1_iter = level1_items.into_iter().peekable();

        loop {
            let take_level0 = match (level0_iter.peek(), level1_iter.peek()) {
                (Some(a), Some(b)) => {
                    compare_positions(&a.key, a.tuple_id, &b.key, b.tuple_id).is_le()
                }
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let next = if take_level0 {
                level0_iter.next()
            } else {
                level1_iter.next()
            };
            merged.extend(next);
        }

        Ok(merged)
    }

    /// Drops the index: level-1 (if created) and level-0 leave the catalog,
    /// and the metadata goes with level-0's control page.
    pub fn drop_index(self) -> Result<()> {
        let _gate = self
            .merge_gate
            .try_write_for(self.config.lock_timeout())
            .ok_or_else(|| self.gate_timeout())?;

        let state = self.meta.snapshot()?;
        if let Some(level1) = state.level1 {
            self.catalog.drop_index(level1)?;
        }
        self.catalog.drop_index(self.level0.id)?;

        tracing::info!(index = %self.level0.id, level1 = ?state.level1, "dropped tiered index");
        Ok(())
    }
}

impl IndexAccessMethod for TieredIndex {
    fn name(&self) -> &'static str {
        "lsm"
    }

    fn capabilities(&self) -> AmCapabilities {
        AmCapabilities {
            can_order: true,
            can_backward: true,
            can_unique: false,
            can_multi_col: true,
            can_include: true,
            optional_key: true,
            search_array: false,
            search_nulls: true,
            clusterable: true,
            can_parallel: false,
            can_mark: false,
        }
    }

    fn insert(&self, key: &[u8], tuple_id: TupleId, unique: UniqueCheck) -> Result<()> {
        TieredIndex::insert(self, key, tuple_id, unique)
    }

    fn bulk_delete(&self, callback: &mut dyn FnMut(TupleId) -> bool) -> Result<BulkDeleteStats> {
        self.level0.tree().bulk_delete(callback)
    }

    fn vacuum_cleanup(&self, stats: Option<BulkDeleteStats>) -> Result<IndexStats> {
        self.level0.tree().vacuum_cleanup(stats)
    }

    fn cost_estimate(&self, selectivity: f64, params: &CostParams) -> Result<IndexCost> {
        self.level0.tree().cost_estimate(selectivity, params)
    }

    fn property(&self, property: IndexProperty) -> Option<bool> {
        self.level0.tree().property(property)
    }

    fn can_return(&self, column: usize) -> bool {
        self.level0.tree().can_return(column)
    }

    fn build_empty(&self) -> Result<()> {
        self.level0.tree().build_empty()
    }

    fn begin_scan(
        &self,
        bounds: ScanBounds,
        direction: ScanDirection,
        visibility: ScanVisibility,
    ) -> Result<IndexScan<'_>> {
        self.level0.tree().begin_scan(bounds, direction, visibility)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::page::PageId;

    fn tid(n: u32) -> TupleId {
        TupleId::new(PageId::new(2, n), 0)
    }

    fn build(capacity: u32) -> (Arc<Catalog>, TieredIndex) {
        let catalog = Arc::new(Catalog::new(1, 10));
        let table = catalog.create_table("items").unwrap();
        let config = TierConfig {
            level0_capacity: capacity,
            ..TierConfig::default()
        };
        let index = TieredIndex::build(
            Arc::clone(&catalog),
            table,
            "items_sku",
            IndexDefinition::new(["sku"]),
            std::iter::empty(),
            config,
        )
        .unwrap();
        (catalog, index)
    }

    #[test]
    fn test_build_initializes_metadata() {
        let (catalog, index) = build(2);
        let state = index.tier_state().unwrap();
        assert_eq!(state.level0, index.id());
        assert_eq!(state.level1, None);
        assert_eq!(state.total_count, 0);
        assert_eq!(state.owner_id, catalog.owner_id());
        assert_eq!(state.database_id, catalog.database_id());
        assert!(index.level1().unwrap().is_none());
    }

    #[test]
    fn test_open_reads_metadata() {
        let (catalog, index) = build(2);
        for n in 0..3 {
            index.insert(&[n as u8], tid(n), UniqueCheck::No).unwrap();
        }
        let id = index.id();
        let before = index.tier_state().unwrap();

        let reopened = TieredIndex::open(Arc::clone(&catalog), id, TierConfig::default()).unwrap();
        assert_eq!(reopened.tier_state().unwrap(), before);
        assert!(reopened.level1().unwrap().is_some());
    }

    #[test]
    fn test_open_rejects_plain_index() {
        let catalog = Arc::new(Catalog::new(1, 10));
        let table = catalog.create_table("t").unwrap();
        let plain = catalog
            .create_index(table, "plain", IndexDefinition::new(["a"]), std::iter::empty())
            .unwrap();
        assert!(matches!(
            TieredIndex::open(catalog, plain.id, TierConfig::default()),
            Err(StrataError::MetadataCorrupted(_))
        ));
    }

    #[test]
    fn test_merged_scan_interleaves_tiers() {
        let (_catalog, index) = build(2);
        for (n, key) in [b"b", b"d", b"a", b"c"].iter().enumerate() {
            index.insert(*key, tid(n as u32), UniqueCheck::No).unwrap();
        }
        // b, d merged into level-1; a, c in level-0.
        let keys: Vec<Bytes> = index
            .merged_scan(ScanBounds::all())
            .unwrap()
            .into_iter()
            .map(|item| item.key)
            .collect();
        assert_eq!(
            keys,
            vec![
                Bytes::from_static(b"a"),
                Bytes::from_static(b"b"),
                Bytes::from_static(b"c"),
                Bytes::from_static(b"d"),
            ]
        );

        let bounded = index
            .merged_scan(ScanBounds::inclusive(Some(b"b"), Some(b"c")))
            .unwrap();
        assert_eq!(bounded.len(), 2);
    }

    #[test]
    fn test_delegated_operations_see_level0_only() {
        let (_catalog, index) = build(2);
        for n in 0..3u32 {
            index.insert(&n.to_be_bytes(), tid(n), UniqueCheck::No).unwrap();
        }
        let am: &dyn IndexAccessMethod = &index;
        let scanned: Vec<ScanItem> = am
            .begin_scan(ScanBounds::all(), ScanDirection::Forward, ScanVisibility::LiveOnly)
            .unwrap()
            .collect();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].tuple_id, tid(2));

        assert!(!am.capabilities().can_unique);
        assert!(!am.capabilities().search_array);
        assert!(!am.capabilities().can_parallel && !am.capabilities().can_mark);
        assert!(am.cost_estimate(0.5, &CostParams::default()).is_ok());
        let mut scan = am
            .begin_scan(ScanBounds::all(), ScanDirection::Forward, ScanVisibility::LiveOnly)
            .unwrap();
        assert!(matches!(
            am.restore_position(&mut scan),
            Err(StrataError::Unsupported { method: "lsm", .. })
        ));
    }

    #[test]
    fn test_build_empty_keeps_metadata() {
        let (_catalog, index) = build(2);
        index.insert(b"a", tid(1), UniqueCheck::No).unwrap();
        let before = index.tier_state().unwrap();
        IndexAccessMethod::build_empty(&index).unwrap();
        assert_eq!(index.tier_state().unwrap(), before);
    }

    #[test]
    fn test_drop_index_removes_both_tiers() {
        let (catalog, index) = build(1);
        index.insert(b"a", tid(1), UniqueCheck::No).unwrap();
        index.insert(b"b", tid(2), UniqueCheck::No).unwrap();
        let level1 = index.level1().unwrap().unwrap();
        let level0 = index.id();

        index.drop_index().unwrap();
        assert!(catalog.index(level0).is_err());
        assert!(catalog.index(level1.id).is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let catalog = Arc::new(Catalog::new(1, 10));
        let table = catalog.create_table("t").unwrap();
        let config = TierConfig {
            level0_capacity: 0,
            ..TierConfig::default()
        };
        assert!(TieredIndex::build(
            catalog,
            table,
            "idx",
            IndexDefinition::new(["a"]),
            std::iter::empty(),
            config,
        )
        .is_err());
    }
}
