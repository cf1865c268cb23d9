//! Common types for the page-based B+Tree.

use super::constants::{
    BTREE_MAGIC, BTREE_VERSION, ENTRY_DEAD_FLAG, ENTRY_POSTING_FLAG, ENTRY_SIZE_MASK,
};
use crate::tuple::TupleId;
use bytes::{Bytes, BytesMut};
use std::cmp::Ordering;
use strata_common::page::{PageHeader, PageId, PAGE_SIZE};

/// Key comparison using u64 prefix for 8+ byte keys.
/// Falls back to slice comparison for shorter keys or when prefix matches.
#[inline(always)]
pub fn compare_keys(a: &[u8], b: &[u8]) -> Ordering {
    // For 8+ byte keys, compare first 8 bytes as u64 (big-endian for sort order)
    if a.len() >= 8 && b.len() >= 8 {
        let a_prefix = u64::from_be_bytes([a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7]]);
        let b_prefix = u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]);
        if a_prefix != b_prefix {
            return a_prefix.cmp(&b_prefix);
        }
        if a.len() == 8 && b.len() == 8 {
            return Ordering::Equal;
        }
    }
    a.cmp(b)
}

/// Orders index positions by key, then by row reference.
#[inline]
pub fn compare_positions(
    a_key: &[u8],
    a_tid: TupleId,
    b_key: &[u8],
    b_tid: TupleId,
) -> Ordering {
    compare_keys(a_key, b_key).then(a_tid.cmp(&b_tid))
}

/// Header of the control page (page 0) of every index file.
///
/// Layout (32 bytes, directly after the PageHeader):
/// - magic: 4 bytes
/// - version: 4 bytes
/// - root: 4 bytes (page number)
/// - height: 4 bytes (1 = root is a leaf)
/// - reserved: 16 bytes
///
/// Bytes from [`BTreeMetaHeader::EXTENSION_OFFSET`] to the end of the page
/// belong to the index's user and are never touched by the tree itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeMetaHeader {
    pub magic: u32,
    pub version: u32,
    pub root: u32,
    pub height: u32,
}

impl BTreeMetaHeader {
    /// Size of the meta header in bytes.
    pub const SIZE: usize = 32;

    /// Offset of the meta header in the control page.
    pub const OFFSET: usize = PageHeader::SIZE;

    /// First byte of the extension area.
    pub const EXTENSION_OFFSET: usize = Self::OFFSET + Self::SIZE;

    /// Size of the extension area.
    pub const EXTENSION_SIZE: usize = PAGE_SIZE - Self::EXTENSION_OFFSET;

    pub fn new(root: u32, height: u32) -> Self {
        Self {
            magic: BTREE_MAGIC,
            version: BTREE_VERSION,
            root,
            height,
        }
    }

    /// Returns true if the header was written by this tree implementation.
    pub fn is_valid(&self) -> bool {
        self.magic == BTREE_MAGIC && self.version == BTREE_VERSION && self.height >= 1
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..12].copy_from_slice(&self.root.to_le_bytes());
        buf[12..16].copy_from_slice(&self.height.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            magic: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            version: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            root: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            height: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
        }
    }
}

/// Header for B+ tree leaf pages (slotted page format).
///
/// Layout (16 bytes):
/// - num_slots: 2 bytes (number of entries)
/// - data_end: 2 bytes (offset where entry data begins, grows backward from PAGE_SIZE)
/// - next_leaf: 8 bytes (PageId as u64, for range scans)
/// - reserved: 4 bytes
///
/// Page layout:
/// ```text
/// +------------------------+ 0
/// | Page Header (32 bytes) |
/// +------------------------+ 32
/// | Leaf Header (16 bytes) |
/// +------------------------+ 48 (SLOT_ARRAY_START)
/// | Slot Array             |
/// | [offset:2, len:2] * n  |  <- grows forward
/// +------------------------+ 48 + 4*n
/// |      Free Space        |
/// +------------------------+ data_end
/// | Entry Data             |  <- grows backward from PAGE_SIZE
/// +------------------------+ PAGE_SIZE
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LeafPageHeader {
    /// Number of entries (slots) in this leaf.
    pub num_slots: u16,
    /// Offset where entry data begins.
    pub data_end: u16,
    /// Page ID of the next leaf.
    pub next_leaf: u64,
}

impl LeafPageHeader {
    /// Size of the leaf header in bytes.
    pub const SIZE: usize = 16;

    /// Offset of leaf header in page (after PageHeader).
    pub const OFFSET: usize = PageHeader::SIZE;

    /// Creates a new leaf header.
    pub fn new() -> Self {
        Self {
            num_slots: 0,
            data_end: PAGE_SIZE as u16, // Data grows backward from end
            next_leaf: u64::MAX,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..2].copy_from_slice(&self.num_slots.to_le_bytes());
        buf[2..4].copy_from_slice(&self.data_end.to_le_bytes());
        buf[4..12].copy_from_slice(&self.next_leaf.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            num_slots: u16::from_le_bytes([buf[0], buf[1]]),
            data_end: u16::from_le_bytes([buf[2], buf[3]]),
            next_leaf: u64::from_le_bytes([
                buf[4], buf[5], buf[6], buf[7], buf[8], buf[9], buf[10], buf[11],
            ]),
        }
    }
}

impl Default for LeafPageHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Header for B+ tree internal pages.
///
/// Layout (16 bytes):
/// - num_keys: 2 bytes
/// - free_space_offset: 2 bytes
/// - level: 2 bytes (0 = just above leaves)
/// - reserved: 10 bytes
#[derive(Debug, Clone, Copy)]
pub struct InternalPageHeader {
    /// Number of keys in this internal node.
    pub num_keys: u16,
    /// Offset to free space (from page start).
    pub free_space_offset: u16,
    /// Level in the tree (0 = just above leaves).
    pub level: u16,
}

impl InternalPageHeader {
    /// Size of the internal header in bytes.
    pub const SIZE: usize = 16;

    /// Offset of internal header in page (after PageHeader).
    pub const OFFSET: usize = PageHeader::SIZE;

    pub fn new(level: u16) -> Self {
        Self {
            num_keys: 0,
            free_space_offset: (PageHeader::SIZE + Self::SIZE) as u16,
            level,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..2].copy_from_slice(&self.num_keys.to_le_bytes());
        buf[2..4].copy_from_slice(&self.free_space_offset.to_le_bytes());
        buf[4..6].copy_from_slice(&self.level.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            num_keys: u16::from_le_bytes([buf[0], buf[1]]),
            free_space_offset: u16::from_le_bytes([buf[2], buf[3]]),
            level: u16::from_le_bytes([buf[4], buf[5]]),
        }
    }
}

/// An index entry stored in a leaf page.
///
/// A plain entry maps one key to one row reference. A posting entry is the
/// compact multi-reference form: one key followed by a sorted list of row
/// references that all share it.
///
/// Layout:
/// - key_len: 2 bytes
/// - key: variable
/// - info: 2 bytes (size in the low 13 bits, posting and dead flags above)
/// - plain: tuple_id (10 bytes)
/// - posting: ref_count (2 bytes) + ref_count * tuple_id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafEntry {
    /// The key bytes.
    pub key: Bytes,
    /// Size and format tag.
    info: u16,
    /// Row references, ascending. Exactly one for a plain entry.
    tids: Vec<TupleId>,
}

impl LeafEntry {
    /// Creates a plain entry.
    pub fn new(key: Bytes, tuple_id: TupleId) -> Self {
        let mut entry = Self {
            key,
            info: 0,
            tids: vec![tuple_id],
        };
        entry.info = entry.encoded_len() as u16;
        entry
    }

    /// Creates a posting entry from at least two ascending row references.
    pub fn posting(key: Bytes, mut tids: Vec<TupleId>) -> Self {
        tids.sort_unstable();
        tids.dedup();
        let mut entry = Self {
            key,
            info: 0,
            tids,
        };
        entry.refresh_info();
        entry
    }

    /// Builds an entry from its raw parts without normalizing the info tag.
    ///
    /// Used when an entry is synthesized from another one; call
    /// [`validate`](Self::validate) before storing it.
    pub fn from_parts(key: Bytes, info: u16, tids: Vec<TupleId>) -> Self {
        Self { key, info, tids }
    }

    /// Raw info tag.
    #[inline]
    pub fn info(&self) -> u16 {
        self.info
    }

    /// Size recorded in the info tag.
    #[inline]
    pub fn tagged_size(&self) -> usize {
        (self.info & ENTRY_SIZE_MASK) as usize
    }

    /// Returns true for a compact multi-reference entry.
    #[inline]
    pub fn is_posting(&self) -> bool {
        self.info & ENTRY_POSTING_FLAG != 0
    }

    /// Returns true if a scan hinted that the entry's rows are dead.
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.info & ENTRY_DEAD_FLAG != 0
    }

    pub fn set_dead(&mut self, dead: bool) {
        if dead {
            self.info |= ENTRY_DEAD_FLAG;
        } else {
            self.info &= !ENTRY_DEAD_FLAG;
        }
    }

    /// Row references of this entry, ascending.
    #[inline]
    pub fn tids(&self) -> &[TupleId] {
        &self.tids
    }

    /// Smallest row reference; the entry's position within its key.
    #[inline]
    pub fn heap_tid(&self) -> TupleId {
        self.tids[0]
    }

    /// Largest row reference.
    #[inline]
    pub fn max_tid(&self) -> TupleId {
        self.tids[self.tids.len() - 1]
    }

    pub fn contains(&self, tid: TupleId) -> bool {
        self.tids.binary_search(&tid).is_ok()
    }

    /// Size of this entry on disk.
    pub fn encoded_len(&self) -> usize {
        let refs = if self.tids.len() > 1 || self.is_posting() {
            2 + self.tids.len() * TupleId::SIZE
        } else {
            TupleId::SIZE
        };
        2 + self.key.len() + 2 + refs
    }

    /// Size the entry would have after adding one more row reference.
    pub fn encoded_len_with_one_more(&self) -> usize {
        2 + self.key.len() + 2 + 2 + (self.tids.len() + 1) * TupleId::SIZE
    }

    /// Adds a row reference, turning a plain entry into a posting entry.
    /// Returns false if it was already present.
    pub fn add_tid(&mut self, tid: TupleId) -> bool {
        match self.tids.binary_search(&tid) {
            Ok(_) => false,
            Err(pos) => {
                self.tids.insert(pos, tid);
                self.refresh_info();
                true
            }
        }
    }

    /// Removes and returns the row references above `tid`, ascending.
    ///
    /// The caller keeps at least one reference below `tid` in the entry.
    pub fn split_off_above(&mut self, tid: TupleId) -> Vec<TupleId> {
        let at = self.tids.partition_point(|t| *t <= tid);
        let upper = self.tids.split_off(at);
        if !upper.is_empty() {
            self.refresh_info();
        }
        upper
    }

    /// Removes every row reference matching `pred`. Returns how many were removed.
    pub fn remove_tids(&mut self, mut pred: impl FnMut(TupleId) -> bool) -> usize {
        let before = self.tids.len();
        self.tids.retain(|tid| !pred(*tid));
        let removed = before - self.tids.len();
        if removed > 0 && !self.tids.is_empty() {
            self.refresh_info();
        }
        removed
    }

    /// Recomputes the format bit and size after the reference list changed.
    fn refresh_info(&mut self) {
        let dead = self.info & ENTRY_DEAD_FLAG;
        let posting = if self.tids.len() > 1 {
            ENTRY_POSTING_FLAG
        } else {
            0
        };
        self.info = dead | posting;
        self.info |= self.encoded_len() as u16 & ENTRY_SIZE_MASK;
    }

    /// Checks that the info tag agrees with the entry's contents.
    pub fn validate(&self) -> bool {
        if self.tids.is_empty() {
            return false;
        }
        let posting_ok = self.is_posting() == (self.tids.len() > 1);
        posting_ok && self.tagged_size() == self.encoded_len()
    }

    /// Serializes the entry to bytes.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.extend_from_slice(&(self.key.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.info.to_le_bytes());
        if self.is_posting() {
            buf.extend_from_slice(&(self.tids.len() as u16).to_le_bytes());
        }
        for tid in &self.tids {
            buf.extend_from_slice(&tid.to_bytes());
        }
        buf.freeze()
    }

    /// Deserializes an entry from bytes. Returns (entry, bytes_consumed).
    pub fn from_bytes(buf: &[u8]) -> Option<(Self, usize)> {
        if buf.len() < 2 {
            return None;
        }
        let key_len = u16::from_le_bytes([buf[0], buf[1]]) as usize;
        let mut offset = 2 + key_len;
        if buf.len() < offset + 2 {
            return None;
        }
        let key = Bytes::copy_from_slice(&buf[2..offset]);
        let info = u16::from_le_bytes([buf[offset], buf[offset + 1]]);
        offset += 2;

        let count = if info & ENTRY_POSTING_FLAG != 0 {
            if buf.len() < offset + 2 {
                return None;
            }
            let n = u16::from_le_bytes([buf[offset], buf[offset + 1]]) as usize;
            offset += 2;
            n
        } else {
            1
        };

        let mut tids = Vec::with_capacity(count);
        for _ in 0..count {
            tids.push(TupleId::from_bytes(buf.get(offset..)?)?);
            offset += TupleId::SIZE;
        }

        Some((Self { key, info, tids }, offset))
    }
}

/// A separator entry in an internal page.
///
/// Separators carry the row reference of the first entry to their right so
/// that runs of duplicate keys can span leaves.
///
/// Layout:
/// - key_len: 2 bytes
/// - key: variable
/// - tuple_id: 10 bytes
/// - child_page_id: 8 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalEntry {
    /// The separator key.
    pub key: Bytes,
    /// Row reference tie-break of the separator.
    pub tuple_id: TupleId,
    /// The child page holding positions >= (key, tuple_id).
    pub child_page_id: PageId,
}

impl InternalEntry {
    /// Size of this entry on disk.
    pub fn size_on_disk(&self) -> usize {
        2 + self.key.len() + TupleId::SIZE + 8
    }

    /// Serializes the entry to bytes.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size_on_disk());
        buf.extend_from_slice(&(self.key.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.tuple_id.to_bytes());
        buf.extend_from_slice(&self.child_page_id.as_u64().to_le_bytes());
        buf.freeze()
    }

    /// Deserializes an entry from bytes. Returns (entry, bytes_consumed).
    pub fn from_bytes(buf: &[u8]) -> Option<(Self, usize)> {
        if buf.len() < 2 {
            return None;
        }
        let key_len = u16::from_le_bytes([buf[0], buf[1]]) as usize;
        let total = 2 + key_len + TupleId::SIZE + 8;
        if buf.len() < total {
            return None;
        }

        let key = Bytes::copy_from_slice(&buf[2..2 + key_len]);
        let tuple_id = TupleId::from_bytes(&buf[2 + key_len..])?;
        let child_offset = 2 + key_len + TupleId::SIZE;
        let mut child = [0u8; 8];
        child.copy_from_slice(&buf[child_offset..child_offset + 8]);

        Some((
            Self {
                key,
                tuple_id,
                child_page_id: PageId::from_u64(u64::from_le_bytes(child)),
            },
            total,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(page: u32, slot: u16) -> TupleId {
        TupleId::new(PageId::new(0, page), slot)
    }

    #[test]
    fn test_compare_keys_prefix_and_tail() {
        assert_eq!(compare_keys(b"abc", b"abd"), Ordering::Less);
        assert_eq!(compare_keys(b"abcdefgh1", b"abcdefgh0"), Ordering::Greater);
        assert_eq!(compare_keys(b"abcdefgh", b"abcdefgh"), Ordering::Equal);
        assert_eq!(compare_keys(b"ab", b"abc"), Ordering::Less);
    }

    #[test]
    fn test_compare_positions_breaks_ties_by_tid() {
        assert_eq!(
            compare_positions(b"k", tid(1, 0), b"k", tid(2, 0)),
            Ordering::Less
        );
        assert_eq!(
            compare_positions(b"a", tid(9, 0), b"b", tid(1, 0)),
            Ordering::Less
        );
    }

    #[test]
    fn test_meta_header_layout() {
        let header = BTreeMetaHeader::new(3, 2);
        assert!(header.is_valid());
        let decoded = BTreeMetaHeader::from_bytes(&header.to_bytes());
        assert_eq!(decoded, header);
        assert_eq!(BTreeMetaHeader::EXTENSION_OFFSET, 64);
        assert!(!BTreeMetaHeader::from_bytes(&[0u8; 32]).is_valid());
    }

    #[test]
    fn test_plain_entry_info_tag() {
        let entry = LeafEntry::new(Bytes::from_static(b"key"), tid(1, 1));
        assert!(!entry.is_posting());
        assert!(!entry.is_dead());
        assert_eq!(entry.tagged_size(), 2 + 3 + 2 + 10);
        assert!(entry.validate());
    }

    #[test]
    fn test_add_tid_promotes_to_posting() {
        let mut entry = LeafEntry::new(Bytes::from_static(b"k"), tid(5, 0));
        assert!(entry.add_tid(tid(2, 0)));
        assert!(!entry.add_tid(tid(2, 0)));

        assert!(entry.is_posting());
        assert_eq!(entry.tids(), &[tid(2, 0), tid(5, 0)]);
        assert_eq!(entry.heap_tid(), tid(2, 0));
        assert_eq!(entry.max_tid(), tid(5, 0));
        assert_eq!(entry.tagged_size(), 2 + 1 + 2 + 2 + 20);
        assert!(entry.validate());
    }

    #[test]
    fn test_posting_entry_bytes() {
        let entry = LeafEntry::posting(
            Bytes::from_static(b"dup"),
            vec![tid(3, 0), tid(1, 0), tid(2, 0)],
        );
        let bytes = entry.to_bytes();
        assert_eq!(bytes.len(), entry.encoded_len());

        let (decoded, consumed) = LeafEntry::from_bytes(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, entry);
        assert_eq!(decoded.tids().len(), 3);
    }

    #[test]
    fn test_remove_tids_shrinks_posting_to_plain() {
        let mut entry =
            LeafEntry::posting(Bytes::from_static(b"k"), vec![tid(1, 0), tid(2, 0)]);
        assert_eq!(entry.remove_tids(|t| t == tid(1, 0)), 1);
        assert!(!entry.is_posting());
        assert!(entry.validate());
        assert_eq!(entry.remove_tids(|_| true), 1);
        assert!(entry.tids().is_empty());
    }

    #[test]
    fn test_dead_flag_survives_refresh() {
        let mut entry = LeafEntry::new(Bytes::from_static(b"k"), tid(1, 0));
        entry.set_dead(true);
        entry.add_tid(tid(2, 0));
        assert!(entry.is_dead());
        assert!(entry.validate());
        entry.set_dead(false);
        assert!(!entry.is_dead());
    }

    #[test]
    fn test_validate_rejects_stale_tag() {
        let entry = LeafEntry::from_parts(
            Bytes::from_static(b"k"),
            ENTRY_POSTING_FLAG | 40,
            vec![tid(1, 0)],
        );
        assert!(!entry.validate());
    }

    #[test]
    fn test_internal_entry_bytes() {
        let entry = InternalEntry {
            key: Bytes::from_static(b"sep"),
            tuple_id: tid(4, 2),
            child_page_id: PageId::new(9, 17),
        };
        let bytes = entry.to_bytes();
        assert_eq!(bytes.len(), entry.size_on_disk());
        let (decoded, consumed) = InternalEntry::from_bytes(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_truncated_buffers_rejected() {
        let entry = LeafEntry::new(Bytes::from_static(b"key"), tid(1, 1));
        let bytes = entry.to_bytes();
        assert!(LeafEntry::from_bytes(&bytes[..bytes.len() - 1]).is_none());
        assert!(InternalEntry::from_bytes(&[1, 0]).is_none());
    }
}
