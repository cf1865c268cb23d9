//! Page-based B+ tree index.
//!
//! ## Layout
//!
//! Every index file starts with a control page followed by node pages:
//!
//! ```text
//! page 0   [PageHeader | BTreeMetaHeader | extension area ...........]
//! page 1.. [PageHeader | Leaf/Internal header | slots / separators ...]
//! ```
//!
//! The extension area (from byte 64 to the end of the control page) is owned
//! by the index's user. The tiered index stores its tier metadata there.
//!
//! ## Entries
//!
//! Entries are ordered by (key, row reference). With deduplication enabled,
//! a leaf folds row references that share a key into one posting entry:
//!
//! ```text
//! plain:   [key_len:2][key][info:2][tid:10]
//! posting: [key_len:2][key][info:2][count:2][tid:10 * count]
//! ```
//!
//! The low 13 bits of `info` hold the encoded entry size; bit 15 marks a
//! posting entry and bit 14 a dead hint left by a scan.
//!
//! Internal separators carry the row reference of the first entry to their
//! right, so a run of duplicates can span any number of leaves.

pub mod constants;
pub mod index;
pub mod page;
pub mod scan;
pub mod store;
pub mod types;

pub use constants::{ENTRY_DEAD_FLAG, ENTRY_POSTING_FLAG, ENTRY_SIZE_MASK, MAX_KEY_SIZE};
pub use index::BTreeIndex;
pub use page::{BTreeInternalPage, BTreeLeafPage, LeafInsertPolicy};
pub use scan::{IndexScan, ScanBounds, ScanDirection, ScanItem, ScanVisibility};
pub use store::InMemoryPageStore;
pub use types::{
    compare_keys, compare_positions, BTreeMetaHeader, InternalEntry, InternalPageHeader,
    LeafEntry, LeafPageHeader,
};
