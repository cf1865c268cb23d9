//! Emptying level-0 after a merge.

use crate::catalog::{IndexEntry, TableEntry};
use crate::lock::LockMode;
use std::time::Duration;
use strata_common::Result;

/// Releases every node page of level-0 and rebuilds it as an empty tree.
///
/// Must only run after a merge has copied level-0 into level-1. The tier
/// metadata in the control page survives the rebuild. Returns the number of
/// node pages released.
pub(crate) fn truncate_level0(
    level0: &IndexEntry,
    table: &TableEntry,
    timeout: Duration,
) -> Result<u64> {
    let _level0_lock = level0.lock.acquire(LockMode::AccessExclusive, timeout)?;
    let _table_lock = table.lock.acquire(LockMode::AccessShare, timeout)?;

    let released = level0.tree().stats()?.num_pages;
    level0.tree().build_empty()?;

    tracing::info!(level0 = %level0.id, released, "truncated level-0");
    Ok(released)
}
