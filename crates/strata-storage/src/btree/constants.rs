//! B+Tree constants.

/// Maximum key size in bytes.
pub const MAX_KEY_SIZE: usize = 256;

/// Page number of the control (meta) page in every index file.
pub const META_PAGE_NUM: u32 = 0;

/// Magic number identifying an initialized control page ("STBT").
pub const BTREE_MAGIC: u32 = 0x5354_4254;

/// On-page format version of the control page.
pub const BTREE_VERSION: u32 = 1;

/// Low bits of an entry's info tag holding the encoded entry size.
pub const ENTRY_SIZE_MASK: u16 = 0x1FFF;

/// Info tag bit marking a compact multi-reference (posting) entry.
pub const ENTRY_POSTING_FLAG: u16 = 0x8000;

/// Info tag bit marking an entry hinted dead by a scan.
pub const ENTRY_DEAD_FLAG: u16 = 0x4000;
