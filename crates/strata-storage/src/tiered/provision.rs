//! Level-1 creation.

use super::meta::TierMetadata;
use crate::catalog::{Catalog, IndexEntry};
use std::sync::Arc;
use strata_common::Result;

/// Creates the empty level-1 index: same definition and table as level-0,
/// named `<level-0 name><suffix>`.
///
/// # Panics
///
/// Panics if `meta` already records a level-1 index. The router only calls
/// this while level-1 is unset, so a second call is a bug.
pub(crate) fn provision_level1(
    catalog: &Catalog,
    meta: &TierMetadata,
    level0: &IndexEntry,
    suffix: &str,
) -> Result<Arc<IndexEntry>> {
    assert!(
        meta.level1.is_none(),
        "level-1 of index {} already exists as {:?}",
        level0.id,
        meta.level1
    );

    let name = format!("{}{}", level0.name, suffix);
    let level1 = catalog.create_index_like(meta.base_table, level0.id, &name)?;

    tracing::info!(
        level0 = %level0.id,
        level1 = %level1.id,
        name = %level1.name,
        "provisioned level-1 index"
    );
    Ok(level1)
}
