//! Storage engine for StrataDB.
//!
//! This crate provides:
//! - Page-based B+ tree index with compact multi-reference entries
//! - Index access-method trait shared by all index kinds
//! - Relation locks and an in-memory catalog
//! - Two-tier (level-0 / level-1) log-structured index built on the B+ tree

mod am;
mod btree;
mod catalog;
mod lock;
mod tiered;
mod tuple;

pub use am::{
    AmCapabilities, BulkDeleteStats, IndexAccessMethod, IndexCost, IndexProperty, IndexStats,
    UniqueCheck,
};
pub use btree::{
    compare_keys, compare_positions, BTreeIndex, BTreeInternalPage, BTreeLeafPage,
    BTreeMetaHeader, IndexScan, InternalEntry, InternalPageHeader, LeafEntry, LeafInsertPolicy,
    LeafPageHeader, ScanBounds, ScanDirection, ScanItem, ScanVisibility, ENTRY_DEAD_FLAG,
    ENTRY_POSTING_FLAG, ENTRY_SIZE_MASK, MAX_KEY_SIZE,
};
pub use catalog::{Catalog, IndexColumn, IndexDefinition, IndexEntry, TableEntry};
pub use lock::{LockMode, RelationLock, RelationLockGuard};
pub use tiered::{
    decompose_posting, MergeStats, TierMetaGuard, TierMetaStore, TierMetadata, TieredIndex,
};
pub use tuple::TupleId;
