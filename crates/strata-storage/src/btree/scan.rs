//! Index scans over a B+Tree.

use super::index::BTreeIndex;
use super::types::compare_keys;
use crate::tuple::TupleId;
use bytes::Bytes;
use std::ops::Bound;
use strata_common::Result;

/// Key range of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanBounds {
    pub lower: Bound<Bytes>,
    pub upper: Bound<Bytes>,
}

impl ScanBounds {
    /// Every key.
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// Keys in `[start, end]`; either side may be open.
    pub fn inclusive(start: Option<&[u8]>, end: Option<&[u8]>) -> Self {
        Self {
            lower: start.map_or(Bound::Unbounded, |k| Bound::Included(Bytes::copy_from_slice(k))),
            upper: end.map_or(Bound::Unbounded, |k| Bound::Included(Bytes::copy_from_slice(k))),
        }
    }

    /// Exactly one key.
    pub fn point(key: &[u8]) -> Self {
        Self::inclusive(Some(key), Some(key))
    }

    /// Key the scan starts descending from, if any.
    pub fn lower_key(&self) -> Option<&[u8]> {
        match &self.lower {
            Bound::Included(k) | Bound::Excluded(k) => Some(k.as_ref()),
            Bound::Unbounded => None,
        }
    }

    /// Returns true if `key` sorts before the lower bound.
    pub fn below_lower(&self, key: &[u8]) -> bool {
        match &self.lower {
            Bound::Included(k) => compare_keys(key, k).is_lt(),
            Bound::Excluded(k) => compare_keys(key, k).is_le(),
            Bound::Unbounded => false,
        }
    }

    /// Returns true if `key` sorts after the upper bound.
    pub fn above_upper(&self, key: &[u8]) -> bool {
        match &self.upper {
            Bound::Included(k) => compare_keys(key, k).is_gt(),
            Bound::Excluded(k) => compare_keys(key, k).is_ge(),
            Bound::Unbounded => false,
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        !self.below_lower(key) && !self.above_upper(key)
    }
}

impl Default for ScanBounds {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanDirection {
    #[default]
    Forward,
    Backward,
}

/// Which physically present entries a scan returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanVisibility {
    /// Skip entries hinted dead.
    #[default]
    LiveOnly,
    /// Every stored entry, dead hints included.
    Any,
}

/// One row reference returned by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanItem {
    pub key: Bytes,
    pub tuple_id: TupleId,
}

/// A scan over a snapshot of the matching entries.
///
/// Posting entries are expanded into one item per row reference. The scan
/// ends when it is dropped or [`end`](Self::end) is called.
pub struct IndexScan<'a> {
    index: &'a BTreeIndex,
    items: Vec<ScanItem>,
    next: usize,
    current: Option<usize>,
}

impl<'a> IndexScan<'a> {
    pub(crate) fn new(index: &'a BTreeIndex, mut items: Vec<ScanItem>, direction: ScanDirection) -> Self {
        if direction == ScanDirection::Backward {
            items.reverse();
        }
        Self {
            index,
            items,
            next: 0,
            current: None,
        }
    }

    /// Number of items not yet returned.
    pub fn remaining(&self) -> usize {
        self.items.len() - self.next
    }

    /// Hints that the row behind the last returned item is dead, so later
    /// live-only scans skip it. Returns false if no hint was recorded.
    pub fn kill_current(&mut self) -> Result<bool> {
        match self.current {
            Some(idx) => {
                let item = &self.items[idx];
                self.index.kill_entry(&item.key, item.tuple_id)
            }
            None => Ok(false),
        }
    }

    /// Ends the scan.
    pub fn end(self) {}
}

impl Iterator for IndexScan<'_> {
    type Item = ScanItem;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.items.get(self.next)?.clone();
        self.current = Some(self.next);
        self.next += 1;
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_inclusive() {
        let bounds = ScanBounds::inclusive(Some(b"b"), Some(b"d"));
        assert!(!bounds.contains(b"a"));
        assert!(bounds.contains(b"b"));
        assert!(bounds.contains(b"c"));
        assert!(bounds.contains(b"d"));
        assert!(bounds.above_upper(b"e"));
    }

    #[test]
    fn test_bounds_exclusive() {
        let bounds = ScanBounds {
            lower: Bound::Excluded(Bytes::from_static(b"b")),
            upper: Bound::Excluded(Bytes::from_static(b"d")),
        };
        assert!(bounds.below_lower(b"b"));
        assert!(bounds.contains(b"c"));
        assert!(bounds.above_upper(b"d"));
    }

    #[test]
    fn test_bounds_all() {
        let bounds = ScanBounds::all();
        assert!(bounds.contains(b""));
        assert!(bounds.contains(&[0xFF; 32]));
        assert_eq!(bounds.lower_key(), None);
    }
}
