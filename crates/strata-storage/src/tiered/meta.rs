//! Tier metadata record and its store in the level-0 control page.

use crate::btree::{BTreeIndex, BTreeMetaHeader};
use std::sync::Arc;
use std::time::Duration;
use strata_buffer::FrameWriteGuard;
use strata_common::{RelationId, Result, StrataError};

/// State of a two-tier index.
///
/// Persisted at [`BTreeMetaHeader::EXTENSION_OFFSET`] of the level-0 control
/// page.
///
/// Layout (48 bytes, little-endian):
/// - magic: 4 bytes
/// - version: 4 bytes
/// - base_table: 4 bytes
/// - level0: 4 bytes
/// - level1: 4 bytes (0 = not created yet)
/// - level0_full: 1 byte
/// - reserved: 3 bytes
/// - total_count: 8 bytes
/// - level0_count: 4 bytes
/// - owner_id: 4 bytes
/// - database_id: 4 bytes
/// - reserved: 4 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierMetadata {
    /// Table the index covers.
    pub base_table: RelationId,
    /// The level-0 index (the index owning the control page).
    pub level0: RelationId,
    /// The level-1 index, once the first merge created it.
    pub level1: Option<RelationId>,
    /// Set when level0_count reached the level-0 capacity.
    pub level0_full: bool,
    /// Row references inserted through the router, across both tiers.
    pub total_count: u64,
    /// Row references inserted into level-0 since it was last emptied.
    pub level0_count: u32,
    pub owner_id: u32,
    pub database_id: u32,
}

impl TierMetadata {
    /// Size of the persisted record in bytes.
    pub const SIZE: usize = 48;

    /// Magic number of the record ("TIER").
    pub const MAGIC: u32 = 0x5449_4552;

    pub const VERSION: u32 = 1;

    /// Metadata of a freshly built index: zero counts, no level-1.
    pub fn new(base_table: RelationId, level0: RelationId, owner_id: u32, database_id: u32) -> Self {
        Self {
            base_table,
            level0,
            level1: None,
            level0_full: false,
            total_count: 0,
            level0_count: 0,
            owner_id,
            database_id,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&Self::MAGIC.to_le_bytes());
        buf[4..8].copy_from_slice(&Self::VERSION.to_le_bytes());
        buf[8..12].copy_from_slice(&self.base_table.0.to_le_bytes());
        buf[12..16].copy_from_slice(&self.level0.0.to_le_bytes());
        buf[16..20].copy_from_slice(&self.level1.unwrap_or(RelationId::INVALID).0.to_le_bytes());
        buf[20] = self.level0_full as u8;
        buf[24..32].copy_from_slice(&self.total_count.to_le_bytes());
        buf[32..36].copy_from_slice(&self.level0_count.to_le_bytes());
        buf[36..40].copy_from_slice(&self.owner_id.to_le_bytes());
        buf[40..44].copy_from_slice(&self.database_id.to_le_bytes());
        buf
    }

    /// Parses the record, rejecting anything not written by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(StrataError::MetadataCorrupted(format!(
                "record truncated to {} bytes",
                buf.len()
            )));
        }
        let u32_at = |offset: usize| {
            u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
        };

        let magic = u32_at(0);
        if magic != Self::MAGIC {
            return Err(StrataError::MetadataCorrupted(format!(
                "bad magic {:#010x}",
                magic
            )));
        }
        let version = u32_at(4);
        if version != Self::VERSION {
            return Err(StrataError::MetadataCorrupted(format!(
                "unsupported version {}",
                version
            )));
        }
        let level0 = RelationId::from_raw(u32_at(12))
            .ok_or_else(|| StrataError::MetadataCorrupted("level-0 id unset".to_string()))?;
        let level0_full = match buf[20] {
            0 => false,
            1 => true,
            other => {
                return Err(StrataError::MetadataCorrupted(format!(
                    "bad fullness flag {}",
                    other
                )))
            }
        };

        let mut total = [0u8; 8];
        total.copy_from_slice(&buf[24..32]);

        Ok(Self {
            base_table: RelationId(u32_at(8)),
            level0,
            level1: RelationId::from_raw(u32_at(16)),
            level0_full,
            total_count: u64::from_le_bytes(total),
            level0_count: u32_at(32),
            owner_id: u32_at(36),
            database_id: u32_at(40),
        })
    }

    /// Checks the counter invariants for a level-0 capacity.
    pub fn check_invariants(&self, capacity: u32) -> Result<()> {
        if self.level0_count > capacity {
            return Err(StrataError::MetadataCorrupted(format!(
                "level-0 holds {} entries, capacity {}",
                self.level0_count, capacity
            )));
        }
        if self.level0_full != (self.level0_count == capacity) {
            return Err(StrataError::MetadataCorrupted(format!(
                "fullness flag {} with {} of {} entries",
                self.level0_full, self.level0_count, capacity
            )));
        }
        Ok(())
    }
}

/// Access to the tier metadata stored in the level-0 control page.
///
/// Every read and write goes through the control page latch, so the record
/// is always observed and replaced as a whole.
pub struct TierMetaStore {
    tree: Arc<BTreeIndex>,
    timeout: Duration,
}

impl TierMetaStore {
    const RANGE: std::ops::Range<usize> =
        BTreeMetaHeader::EXTENSION_OFFSET..BTreeMetaHeader::EXTENSION_OFFSET + TierMetadata::SIZE;

    /// Creates a store over `tree`'s control page. Latch waits give up after `timeout`.
    pub fn new(tree: Arc<BTreeIndex>, timeout: Duration) -> Self {
        Self { tree, timeout }
    }

    fn timeout_error(&self) -> StrataError {
        StrataError::LockTimeout {
            resource: format!("control page of index {}", self.tree.file_id()),
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }

    /// Writes a new record without reading the old one.
    pub fn initialize(&self, meta: &TierMetadata) -> Result<()> {
        let mut page = self
            .tree
            .control_frame()
            .try_lock_exclusive_for(self.timeout)
            .ok_or_else(|| self.timeout_error())?;
        page[Self::RANGE].copy_from_slice(&meta.to_bytes());
        Ok(())
    }

    /// Pins and latches the control page and reads the record.
    ///
    /// The latch is held until the returned guard is dropped.
    pub fn acquire(&self) -> Result<TierMetaGuard<'_>> {
        let page = self
            .tree
            .control_frame()
            .try_lock_exclusive_for(self.timeout)
            .ok_or_else(|| self.timeout_error())?;
        let meta = TierMetadata::from_bytes(&page[Self::RANGE])?;
        Ok(TierMetaGuard { page, meta })
    }

    /// Returns an owned copy of the record.
    pub fn snapshot(&self) -> Result<TierMetadata> {
        let page = self
            .tree
            .control_frame()
            .try_lock_shared_for(self.timeout)
            .ok_or_else(|| self.timeout_error())?;
        TierMetadata::from_bytes(&page[Self::RANGE])
    }

    /// Replaces the record with `new` if it still equals `expected`.
    pub fn commit(&self, expected: &TierMetadata, new: &TierMetadata) -> Result<()> {
        let mut guard = self.acquire()?;
        if guard.get() != expected {
            return Err(StrataError::MetadataConflict {
                index: expected.level0.0,
            });
        }
        guard.set(new);
        Ok(())
    }

    /// Read-modify-write under one latch hold.
    pub fn update<R>(&self, f: impl FnOnce(&mut TierMetadata) -> R) -> Result<R> {
        let mut guard = self.acquire()?;
        let mut meta = *guard.get();
        let result = f(&mut meta);
        guard.set(&meta);
        Ok(result)
    }
}

/// Latched access to the tier metadata. Dropping the guard releases the
/// control page; changes reach the page only through [`set`](Self::set).
pub struct TierMetaGuard<'a> {
    page: FrameWriteGuard<'a>,
    meta: TierMetadata,
}

impl TierMetaGuard<'_> {
    pub fn get(&self) -> &TierMetadata {
        &self.meta
    }

    /// Writes the whole record.
    pub fn set(&mut self, meta: &TierMetadata) {
        self.page[TierMetaStore::RANGE].copy_from_slice(&meta.to_bytes());
        self.meta = *meta;
    }

    /// Releases the latch.
    pub fn release(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::BTreeConfig;

    fn sample() -> TierMetadata {
        TierMetadata {
            base_table: RelationId(16384),
            level0: RelationId(16385),
            level1: Some(RelationId(16390)),
            level0_full: true,
            total_count: 12,
            level0_count: 2,
            owner_id: 10,
            database_id: 1,
        }
    }

    fn store() -> TierMetaStore {
        let tree = Arc::new(BTreeIndex::create(16385, BTreeConfig::default()).unwrap());
        TierMetaStore::new(tree, Duration::from_millis(50))
    }

    #[test]
    fn test_record_bytes() {
        let meta = sample();
        let bytes = meta.to_bytes();
        assert_eq!(&bytes[0..4], &TierMetadata::MAGIC.to_le_bytes());
        assert_eq!(&bytes[16..20], &16390u32.to_le_bytes());
        assert_eq!(TierMetadata::from_bytes(&bytes).unwrap(), meta);

        let fresh = TierMetadata::new(RelationId(1), RelationId(2), 3, 4);
        let parsed = TierMetadata::from_bytes(&fresh.to_bytes()).unwrap();
        assert_eq!(parsed.level1, None);
        assert_eq!(parsed.level0_count, 0);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(TierMetadata::from_bytes(&[0u8; TierMetadata::SIZE]).is_err());
        assert!(TierMetadata::from_bytes(&[0u8; 8]).is_err());

        let mut bytes = sample().to_bytes();
        bytes[20] = 7;
        assert!(matches!(
            TierMetadata::from_bytes(&bytes),
            Err(StrataError::MetadataCorrupted(_))
        ));
    }

    #[test]
    fn test_invariants() {
        assert!(sample().check_invariants(2).is_ok());
        let mut meta = sample();
        meta.level0_full = false;
        assert!(meta.check_invariants(2).is_err());
        meta.level0_count = 3;
        assert!(meta.check_invariants(2).is_err());
        meta.level0_count = 1;
        assert!(meta.check_invariants(2).is_ok());
    }

    #[test]
    fn test_store_update_and_snapshot() {
        let store = store();
        let meta = TierMetadata::new(RelationId(16384), RelationId(16385), 10, 1);
        store.initialize(&meta).unwrap();

        let count = store
            .update(|m| {
                m.level0_count += 1;
                m.level0_count
            })
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.snapshot().unwrap().level0_count, 1);
    }

    #[test]
    fn test_store_commit_detects_conflict() {
        let store = store();
        let meta = TierMetadata::new(RelationId(16384), RelationId(16385), 10, 1);
        store.initialize(&meta).unwrap();

        let stale = store.snapshot().unwrap();
        store.update(|m| m.total_count += 5).unwrap();

        let mut next = stale;
        next.level0_count = 1;
        assert!(matches!(
            store.commit(&stale, &next),
            Err(StrataError::MetadataConflict { .. })
        ));

        let current = store.snapshot().unwrap();
        let mut next = current;
        next.level0_count = 1;
        store.commit(&current, &next).unwrap();
        assert_eq!(store.snapshot().unwrap(), next);
    }

    #[test]
    fn test_guard_blocks_other_accessors_until_dropped() {
        let store = store();
        store
            .initialize(&TierMetadata::new(RelationId(1), RelationId(2), 0, 0))
            .unwrap();

        let guard = store.acquire().unwrap();
        assert!(matches!(
            store.snapshot(),
            Err(StrataError::LockTimeout { .. })
        ));
        guard.release();
        assert!(store.snapshot().is_ok());
    }

    #[test]
    fn test_guard_without_set_leaves_page_unchanged() {
        let store = store();
        let meta = TierMetadata::new(RelationId(1), RelationId(2), 0, 0);
        store.initialize(&meta).unwrap();

        let result: Result<()> = (|| {
            let _guard = store.acquire()?;
            Err(StrataError::Internal("failed mid-update".to_string()))
        })();
        assert!(result.is_err());
        assert_eq!(store.snapshot().unwrap(), meta);
        assert_eq!(store.tree.control_frame().pin_count(), 0);
    }
}
