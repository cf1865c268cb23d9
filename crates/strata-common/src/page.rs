//! Page structures for StrataDB storage.

use serde::{Deserialize, Serialize};

/// Default page size in bytes (16 KB).
pub const PAGE_SIZE: usize = 16 * 1024;

/// Unique identifier for a page within a file.
///
/// PageId consists of a file ID and page number within that file.
/// Index files use the owning relation id as their file id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId {
    /// File identifier.
    pub file_id: u32,
    /// Page number within the file (0-indexed).
    pub page_num: u32,
}

impl PageId {
    /// Creates a new PageId.
    pub fn new(file_id: u32, page_num: u32) -> Self {
        Self { file_id, page_num }
    }

    /// Returns the PageId as a single u64 for compact storage.
    pub fn as_u64(&self) -> u64 {
        ((self.file_id as u64) << 32) | (self.page_num as u64)
    }

    /// Creates a PageId from a u64 representation.
    pub fn from_u64(value: u64) -> Self {
        Self {
            file_id: (value >> 32) as u32,
            page_num: value as u32,
        }
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file_id, self.page_num)
    }
}

/// Page types in StrataDB storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PageType {
    /// Unallocated/free page.
    Free = 0,
    /// B+ tree control (meta) page, always page 0 of an index file.
    BTreeMeta = 1,
    /// B+ tree leaf page.
    BTreeLeaf = 2,
    /// B+ tree internal page.
    BTreeInternal = 3,
}

impl PageType {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PageType::BTreeMeta,
            2 => PageType::BTreeLeaf,
            3 => PageType::BTreeInternal,
            _ => PageType::Free,
        }
    }
}

/// Header structure at the beginning of every page.
///
/// Layout (32 bytes total):
/// - file_id: 4 bytes
/// - page_num: 4 bytes
/// - lsn: 8 bytes
/// - page_type: 1 byte
/// - flags: 1 byte
/// - free_space_offset: 2 bytes
/// - tuple_count: 2 bytes
/// - checksum: 4 bytes
/// - reserved: 6 bytes
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageHeader {
    /// Unique page identifier.
    pub page_id: PageId,
    /// Log sequence number of the last modification.
    pub lsn: u64,
    /// Type of this page.
    pub page_type: PageType,
    /// Page flags, owned by the page's user.
    pub flags: u8,
    /// Offset to the start of free space within the page.
    pub free_space_offset: u16,
    /// Number of tuples/entries on this page.
    pub tuple_count: u16,
    /// Checksum of the page contents (0 = not computed).
    pub checksum: u32,
}

impl PageHeader {
    /// Size of the page header in bytes.
    pub const SIZE: usize = 32;

    /// Creates a new page header.
    pub fn new(page_id: PageId, page_type: PageType) -> Self {
        Self {
            page_id,
            lsn: 0,
            page_type,
            flags: 0,
            free_space_offset: Self::SIZE as u16,
            tuple_count: 0,
            checksum: 0,
        }
    }

    /// Serializes the header to bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.page_id.file_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.page_id.page_num.to_le_bytes());
        buf[8..16].copy_from_slice(&self.lsn.to_le_bytes());
        buf[16] = self.page_type as u8;
        buf[17] = self.flags;
        buf[18..20].copy_from_slice(&self.free_space_offset.to_le_bytes());
        buf[20..22].copy_from_slice(&self.tuple_count.to_le_bytes());
        buf[22..26].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Deserializes the header from bytes.
    pub fn from_bytes(buf: &[u8]) -> Self {
        let file_id = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let page_num = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let lsn = u64::from_le_bytes([
            buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15],
        ]);

        Self {
            page_id: PageId::new(file_id, page_num),
            lsn,
            page_type: PageType::from_u8(buf[16]),
            flags: buf[17],
            free_space_offset: u16::from_le_bytes([buf[18], buf[19]]),
            tuple_count: u16::from_le_bytes([buf[20], buf[21]]),
            checksum: u32::from_le_bytes([buf[22], buf[23], buf[24], buf[25]]),
        }
    }
}

/// Identifier of a relation (table or index) in the catalog.
///
/// Zero is reserved as the "unset" value, the same way an invalid object
/// id is encoded in persisted metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationId(pub u32);

impl RelationId {
    /// The unset relation id.
    pub const INVALID: RelationId = RelationId(0);

    /// Returns true if this id refers to a relation.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Converts a persisted id, mapping the reserved value to None.
    pub fn from_raw(raw: u32) -> Option<Self> {
        let id = RelationId(raw);
        id.is_valid().then_some(id)
    }
}

impl std::fmt::Display for RelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rel:{}", self.0)
    }
}
