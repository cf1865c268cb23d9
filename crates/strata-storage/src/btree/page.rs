//! B+Tree page implementations (leaf and internal nodes).

use super::types::{compare_positions, InternalEntry, InternalPageHeader, LeafEntry, LeafPageHeader};
use crate::tuple::TupleId;
use bytes::Bytes;
use std::cmp::Ordering;
use strata_common::page::{PageHeader, PageId, PageType, PAGE_SIZE};
use strata_common::{Result, StrataError};

/// How a leaf folds duplicate keys on insert.
#[derive(Debug, Clone, Copy)]
pub struct LeafInsertPolicy {
    /// Fold a new row reference into an existing entry with the same key.
    pub deduplicate: bool,
    /// Upper bound on row references per posting entry.
    pub max_posting_refs: usize,
}

/// B+ tree leaf page (slotted page format).
pub struct BTreeLeafPage {
    /// Page data buffer.
    data: Box<[u8; PAGE_SIZE]>,
}

impl BTreeLeafPage {
    /// Slot array start offset after headers.
    const SLOT_ARRAY_START: usize = PageHeader::SIZE + LeafPageHeader::SIZE;

    /// Size of each slot (offset:2 + len:2).
    const SLOT_SIZE: usize = 4;

    /// Creates a new empty leaf page.
    pub fn new(page_id: PageId) -> Self {
        let mut data = Box::new([0u8; PAGE_SIZE]);

        let page_header = PageHeader::new(page_id, PageType::BTreeLeaf);
        data[..PageHeader::SIZE].copy_from_slice(&page_header.to_bytes());

        let leaf_header = LeafPageHeader::new();
        let offset = LeafPageHeader::OFFSET;
        data[offset..offset + LeafPageHeader::SIZE].copy_from_slice(&leaf_header.to_bytes());

        Self { data }
    }

    /// Creates a leaf page from raw bytes.
    pub fn from_bytes(data: &[u8; PAGE_SIZE]) -> Self {
        Self {
            data: Box::new(*data),
        }
    }

    /// Returns the raw page data.
    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    /// Returns true if the raw page is a leaf.
    pub fn is_leaf(data: &[u8; PAGE_SIZE]) -> bool {
        PageHeader::from_bytes(&data[..PageHeader::SIZE]).page_type == PageType::BTreeLeaf
    }

    fn leaf_header(&self) -> LeafPageHeader {
        let offset = LeafPageHeader::OFFSET;
        LeafPageHeader::from_bytes(&self.data[offset..offset + LeafPageHeader::SIZE])
    }

    fn set_leaf_header(&mut self, header: LeafPageHeader) {
        let offset = LeafPageHeader::OFFSET;
        self.data[offset..offset + LeafPageHeader::SIZE].copy_from_slice(&header.to_bytes());
    }

    /// Returns the number of entries in this leaf.
    pub fn num_entries(&self) -> u16 {
        self.leaf_header().num_slots
    }

    /// Returns the next leaf page ID.
    pub fn next_leaf(&self) -> Option<PageId> {
        let next = self.leaf_header().next_leaf;
        if next == u64::MAX {
            None
        } else {
            Some(PageId::from_u64(next))
        }
    }

    /// Sets the next leaf page ID.
    pub fn set_next_leaf(&mut self, page_id: Option<PageId>) {
        let mut header = self.leaf_header();
        header.next_leaf = page_id.map(|p| p.as_u64()).unwrap_or(u64::MAX);
        self.set_leaf_header(header);
    }

    /// Reads all entries from the leaf (via slot array), in position order.
    pub fn entries(&self) -> Vec<LeafEntry> {
        let num_slots = self.leaf_header().num_slots as usize;
        let mut entries = Vec::with_capacity(num_slots);

        for slot_idx in 0..num_slots {
            let slot_offset = Self::SLOT_ARRAY_START + slot_idx * Self::SLOT_SIZE;
            let entry_offset =
                u16::from_le_bytes([self.data[slot_offset], self.data[slot_offset + 1]]) as usize;

            if let Some((entry, _)) = LeafEntry::from_bytes(&self.data[entry_offset..]) {
                entries.push(entry);
            }
        }

        entries
    }

    /// Rewrites the page with the given entries using slotted format.
    /// The page is left untouched if the entries do not fit.
    pub fn write_entries(&mut self, entries: &[LeafEntry]) -> Result<()> {
        let slot_space = entries.len() * Self::SLOT_SIZE;
        let entry_space: usize = entries.iter().map(|e| e.encoded_len()).sum();
        let slot_array_end = Self::SLOT_ARRAY_START + slot_space;

        if slot_array_end + entry_space > PAGE_SIZE {
            return Err(StrataError::NodeFull);
        }

        // Write entries backward from end and slots forward from start
        let mut data_end = PAGE_SIZE;

        for (slot_idx, entry) in entries.iter().enumerate() {
            let bytes = entry.to_bytes();
            data_end -= bytes.len();
            self.data[data_end..data_end + bytes.len()].copy_from_slice(&bytes);

            let slot_offset = Self::SLOT_ARRAY_START + slot_idx * Self::SLOT_SIZE;
            self.data[slot_offset..slot_offset + 2]
                .copy_from_slice(&(data_end as u16).to_le_bytes());
            self.data[slot_offset + 2..slot_offset + 4]
                .copy_from_slice(&(bytes.len() as u16).to_le_bytes());
        }

        let mut header = self.leaf_header();
        header.num_slots = entries.len() as u16;
        header.data_end = data_end as u16;
        self.set_leaf_header(header);
        Ok(())
    }

    /// Inserts a row reference for `key`.
    ///
    /// Entries stay ordered by (key, smallest row reference) and the row
    /// references of entries sharing a key never interleave: every reference
    /// of an entry sorts before the first reference of the next one. So the
    /// only entry that can already hold `tuple_id` is the one just before
    /// the insertion point. The reference is folded into that entry while
    /// the policy allows; a full posting list is cut at `tuple_id` and its
    /// upper part moves into the new entry.
    ///
    /// Returns Err(NodeFull) if the page cannot take the change and
    /// Err(DuplicateEntry) if the exact (key, reference) pair is present.
    pub fn insert(&mut self, key: &[u8], tuple_id: TupleId, policy: LeafInsertPolicy) -> Result<()> {
        let mut entries = self.entries();
        let pos = entries.partition_point(|e| {
            compare_positions(&e.key, e.heap_tid(), key, tuple_id) != Ordering::Greater
        });

        let mut entry = LeafEntry::new(Bytes::copy_from_slice(key), tuple_id);
        if pos > 0 && entries[pos - 1].key.as_ref() == key {
            let prev = &mut entries[pos - 1];
            if prev.contains(tuple_id) {
                return Err(StrataError::DuplicateEntry {
                    key: key.to_vec(),
                    tuple_id: tuple_id.to_string(),
                });
            }
            if policy.deduplicate && prev.tids().len() < policy.max_posting_refs {
                prev.add_tid(tuple_id);
                return self.write_entries(&entries);
            }
            if prev.max_tid() > tuple_id {
                let upper = prev.split_off_above(tuple_id);
                for tid in upper {
                    entry.add_tid(tid);
                }
            }
        }

        entries.insert(pos, entry);
        self.write_entries(&entries)
    }

    /// Stores a fully formed entry at its position without folding.
    pub fn insert_entry(&mut self, entry: LeafEntry) -> Result<()> {
        let mut entries = self.entries();
        let pos = entries.partition_point(|e| {
            compare_positions(&e.key, e.heap_tid(), &entry.key, entry.heap_tid())
                != Ordering::Greater
        });
        entries.insert(pos, entry);
        self.write_entries(&entries)
    }

    /// Splits this leaf into two. Returns (separator, new_right_page).
    ///
    /// The separator is the position (key, row reference) of the first entry
    /// of the right page.
    pub fn split(&mut self, new_page_id: PageId) -> Result<((Bytes, TupleId), BTreeLeafPage)> {
        let entries = self.entries();
        if entries.len() < 2 {
            return Err(StrataError::BTreeCorrupted(format!(
                "cannot split leaf {} with {} entries",
                new_page_id,
                entries.len()
            )));
        }
        let mid = entries.len() / 2;

        let (left_entries, right_entries) = entries.split_at(mid);
        let separator = (right_entries[0].key.clone(), right_entries[0].heap_tid());

        self.write_entries(left_entries)?;

        let mut right_page = BTreeLeafPage::new(new_page_id);
        right_page.write_entries(right_entries)?;

        // Link pages
        let old_next = self.next_leaf();
        self.set_next_leaf(Some(new_page_id));
        right_page.set_next_leaf(old_next);

        Ok((separator, right_page))
    }
}

/// B+ tree internal page.
pub struct BTreeInternalPage {
    /// Page data buffer.
    data: Box<[u8; PAGE_SIZE]>,
}

impl BTreeInternalPage {
    /// Data start offset after headers.
    const DATA_START: usize = PageHeader::SIZE + InternalPageHeader::SIZE;

    /// Size of the leftmost child pointer.
    const LEFTMOST_PTR_SIZE: usize = 8;

    /// Creates a new empty internal page.
    pub fn new(page_id: PageId, level: u16) -> Self {
        let mut data = Box::new([0u8; PAGE_SIZE]);

        let page_header = PageHeader::new(page_id, PageType::BTreeInternal);
        data[..PageHeader::SIZE].copy_from_slice(&page_header.to_bytes());

        let internal_header = InternalPageHeader::new(level);
        let offset = InternalPageHeader::OFFSET;
        data[offset..offset + InternalPageHeader::SIZE]
            .copy_from_slice(&internal_header.to_bytes());

        Self { data }
    }

    /// Creates an internal page from raw bytes.
    pub fn from_bytes(data: &[u8; PAGE_SIZE]) -> Self {
        Self {
            data: Box::new(*data),
        }
    }

    /// Returns the raw page data.
    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    fn internal_header(&self) -> InternalPageHeader {
        let offset = InternalPageHeader::OFFSET;
        InternalPageHeader::from_bytes(&self.data[offset..offset + InternalPageHeader::SIZE])
    }

    fn set_internal_header(&mut self, header: InternalPageHeader) {
        let offset = InternalPageHeader::OFFSET;
        self.data[offset..offset + InternalPageHeader::SIZE].copy_from_slice(&header.to_bytes());
    }

    /// Returns the number of keys in this internal node.
    pub fn num_keys(&self) -> u16 {
        self.internal_header().num_keys
    }

    /// Returns the level of this internal node.
    pub fn level(&self) -> u16 {
        self.internal_header().level
    }

    /// Gets the leftmost child pointer.
    pub fn leftmost_child(&self) -> PageId {
        let offset = Self::DATA_START;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.data[offset..offset + 8]);
        PageId::from_u64(u64::from_le_bytes(bytes))
    }

    /// Sets the leftmost child pointer.
    pub fn set_leftmost_child(&mut self, page_id: PageId) {
        let offset = Self::DATA_START;
        self.data[offset..offset + 8].copy_from_slice(&page_id.as_u64().to_le_bytes());

        let mut header = self.internal_header();
        if (header.free_space_offset as usize) < Self::DATA_START + Self::LEFTMOST_PTR_SIZE {
            header.free_space_offset = (Self::DATA_START + Self::LEFTMOST_PTR_SIZE) as u16;
            self.set_internal_header(header);
        }
    }

    /// Reads all separator entries from the internal node.
    pub fn entries(&self) -> Vec<InternalEntry> {
        let header = self.internal_header();
        let mut entries = Vec::with_capacity(header.num_keys as usize);
        let mut offset = Self::DATA_START + Self::LEFTMOST_PTR_SIZE;

        for _ in 0..header.num_keys {
            if let Some((entry, consumed)) = InternalEntry::from_bytes(&self.data[offset..]) {
                entries.push(entry);
                offset += consumed;
            } else {
                break;
            }
        }

        entries
    }

    /// Finds the child page covering position (key, tuple_id).
    ///
    /// Descends into the child of the last separator <= the position, or the
    /// leftmost child if every separator is greater.
    pub fn find_child(&self, key: &[u8], tuple_id: TupleId) -> PageId {
        let entries = self.entries();
        let idx = entries.partition_point(|e| {
            compare_positions(&e.key, e.tuple_id, key, tuple_id) != Ordering::Greater
        });
        if idx == 0 {
            self.leftmost_child()
        } else {
            entries[idx - 1].child_page_id
        }
    }

    /// Inserts a separator and its right child in position order.
    pub fn insert(&mut self, entry: InternalEntry) -> Result<()> {
        let mut entries = self.entries();
        let pos = entries.partition_point(|e| {
            compare_positions(&e.key, e.tuple_id, &entry.key, entry.tuple_id) == Ordering::Less
        });
        entries.insert(pos, entry);
        self.write_entries(&entries)
    }

    /// Writes entries to the page. The page is left untouched if they do not fit.
    fn write_entries(&mut self, entries: &[InternalEntry]) -> Result<()> {
        let start = Self::DATA_START + Self::LEFTMOST_PTR_SIZE;
        let total: usize = entries.iter().map(|e| e.size_on_disk()).sum();
        if start + total > PAGE_SIZE {
            return Err(StrataError::NodeFull);
        }

        let mut offset = start;
        for entry in entries {
            let bytes = entry.to_bytes();
            self.data[offset..offset + bytes.len()].copy_from_slice(&bytes);
            offset += bytes.len();
        }

        let mut header = self.internal_header();
        header.num_keys = entries.len() as u16;
        header.free_space_offset = offset as u16;
        self.set_internal_header(header);
        Ok(())
    }

    /// Splits this internal node. Returns (promoted separator, new_right_page).
    ///
    /// The promoted separator's child is the new right page.
    pub fn split(&mut self, new_page_id: PageId) -> Result<(InternalEntry, BTreeInternalPage)> {
        let entries = self.entries();
        if entries.len() < 3 {
            return Err(StrataError::BTreeCorrupted(format!(
                "cannot split internal node with {} separators",
                entries.len()
            )));
        }
        let mid = entries.len() / 2;

        let promoted = &entries[mid];
        let mut right_page = BTreeInternalPage::new(new_page_id, self.level());
        right_page.set_leftmost_child(promoted.child_page_id);
        right_page.write_entries(&entries[mid + 1..])?;

        self.write_entries(&entries[..mid])?;

        let separator = InternalEntry {
            key: promoted.key.clone(),
            tuple_id: promoted.tuple_id,
            child_page_id: new_page_id,
        };
        Ok((separator, right_page))
    }
}
