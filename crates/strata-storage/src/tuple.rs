//! Row references stored in index entries.

use strata_common::page::PageId;

/// Unique identifier for a tuple within the database.
///
/// Combines a PageId with a slot number to uniquely identify
/// where a tuple is stored. Ordering is (file, page, slot), which is the
/// tie-break order for index entries sharing a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TupleId {
    /// Page containing this tuple.
    pub page_id: PageId,
    /// Slot number within the page.
    pub slot_id: u16,
}

impl TupleId {
    /// Encoded size in bytes (file_id:4 + page_num:4 + slot_id:2).
    pub const SIZE: usize = 10;

    /// Smallest possible tuple ID, used to position scans at a key's first entry.
    pub const MIN: TupleId = TupleId {
        page_id: PageId {
            file_id: 0,
            page_num: 0,
        },
        slot_id: 0,
    };

    /// Invalid tuple ID.
    pub const INVALID: TupleId = TupleId {
        page_id: PageId {
            file_id: u32::MAX,
            page_num: u32::MAX,
        },
        slot_id: u16::MAX,
    };

    /// Creates a new tuple ID.
    pub fn new(page_id: PageId, slot_id: u16) -> Self {
        Self { page_id, slot_id }
    }

    /// Returns true if this is a valid tuple ID.
    pub fn is_valid(&self) -> bool {
        self.page_id.file_id != u32::MAX
    }

    /// Serializes the tuple ID.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.page_id.file_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.page_id.page_num.to_le_bytes());
        buf[8..10].copy_from_slice(&self.slot_id.to_le_bytes());
        buf
    }

    /// Deserializes a tuple ID. Returns None if the buffer is too short.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }
        let file_id = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let page_num = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let slot_id = u16::from_le_bytes([buf[8], buf[9]]);
        Some(Self::new(PageId::new(file_id, page_num), slot_id))
    }
}

impl std::fmt::Display for TupleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.page_id, self.slot_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_id_validity() {
        assert!(TupleId::new(PageId::new(0, 1), 3).is_valid());
        assert!(!TupleId::INVALID.is_valid());
    }

    #[test]
    fn test_tuple_id_ordering() {
        let a = TupleId::new(PageId::new(0, 1), 9);
        let b = TupleId::new(PageId::new(0, 2), 0);
        let c = TupleId::new(PageId::new(1, 0), 0);
        assert!(TupleId::MIN <= a);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_tuple_id_bytes() {
        let tid = TupleId::new(PageId::new(3, 77), 12);
        assert_eq!(TupleId::from_bytes(&tid.to_bytes()), Some(tid));
        assert_eq!(TupleId::from_bytes(&[0u8; 4]), None);
    }

    #[test]
    fn test_tuple_id_display() {
        let tid = TupleId::new(PageId::new(1, 5), 2);
        assert_eq!(tid.to_string(), "1:5:2");
    }
}
