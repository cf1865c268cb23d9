//! Index access-method surface shared by the plain B+Tree and the tiered index.

use crate::btree::{IndexScan, ScanBounds, ScanDirection, ScanVisibility};
use crate::tuple::TupleId;
use strata_common::{CostParams, Result, StrataError};

/// Whether an insert must reject a key that already has a live entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueCheck {
    No,
    Yes,
}

/// Feature flags an access method advertises to the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AmCapabilities {
    pub can_order: bool,
    pub can_backward: bool,
    pub can_unique: bool,
    pub can_multi_col: bool,
    pub can_include: bool,
    pub optional_key: bool,
    pub search_array: bool,
    pub search_nulls: bool,
    pub clusterable: bool,
    pub can_parallel: bool,
    pub can_mark: bool,
}

/// Queryable index properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexProperty {
    Orderable,
    DistanceOrderable,
    Returnable,
    Clusterable,
    IndexScan,
    BitmapScan,
    BackwardScan,
    SearchArray,
    SearchNulls,
}

/// Result of a bulk delete pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkDeleteStats {
    /// Row references removed.
    pub tuples_removed: u64,
    /// Row references remaining.
    pub num_index_tuples: u64,
    /// Leaf pages left without entries.
    pub empty_pages: u64,
    /// Node pages in the index.
    pub num_pages: u64,
}

/// Physical statistics of an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Node pages (control page excluded).
    pub num_pages: u64,
    /// Leaf pages.
    pub leaf_pages: u64,
    /// Stored entries (a posting entry counts once).
    pub num_entries: u64,
    /// Row references across all entries.
    pub num_index_tuples: u64,
    /// Tree height (1 = root is a leaf).
    pub height: u32,
}

/// Planner estimate for an index scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexCost {
    pub startup_cost: f64,
    pub total_cost: f64,
    pub selectivity: f64,
    pub pages_fetched: f64,
}

/// Operations an index access method provides to the surrounding framework.
pub trait IndexAccessMethod: Send + Sync {
    /// Access method name, used in error reports.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> AmCapabilities;

    /// Inserts one row reference for `key`.
    fn insert(&self, key: &[u8], tuple_id: TupleId, unique: UniqueCheck) -> Result<()>;

    /// Removes every row reference for which `callback` returns true.
    fn bulk_delete(&self, callback: &mut dyn FnMut(TupleId) -> bool) -> Result<BulkDeleteStats>;

    /// Post-vacuum cleanup. Returns fresh statistics.
    fn vacuum_cleanup(&self, stats: Option<BulkDeleteStats>) -> Result<IndexStats>;

    fn cost_estimate(&self, selectivity: f64, params: &CostParams) -> Result<IndexCost>;

    /// Answers an access-method specific property, or None to fall back to
    /// the framework's default answer.
    fn property(&self, property: IndexProperty) -> Option<bool>;

    /// Whether index-only scans can return key column `column`.
    fn can_return(&self, column: usize) -> bool;

    /// Resets the index to a valid empty instance.
    fn build_empty(&self) -> Result<()>;

    fn begin_scan(
        &self,
        bounds: ScanBounds,
        direction: ScanDirection,
        visibility: ScanVisibility,
    ) -> Result<IndexScan<'_>>;

    fn mark_position(&self, _scan: &mut IndexScan<'_>) -> Result<()> {
        Err(StrataError::Unsupported {
            method: self.name(),
            operation: "mark_position",
        })
    }

    fn restore_position(&self, _scan: &mut IndexScan<'_>) -> Result<()> {
        Err(StrataError::Unsupported {
            method: self.name(),
            operation: "restore_position",
        })
    }

    fn begin_parallel_scan(&self, _bounds: ScanBounds, _workers: usize) -> Result<IndexScan<'_>> {
        Err(StrataError::Unsupported {
            method: self.name(),
            operation: "parallel_scan",
        })
    }
}
