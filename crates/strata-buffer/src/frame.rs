//! Pinned, latched page frames.

use crate::guard::{FrameReadGuard, FrameWriteGuard};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use strata_common::page::{PageId, PAGE_SIZE};

/// A frame holding a single page in memory.
///
/// Each frame contains:
/// - The page data (PAGE_SIZE bytes) behind a reader/writer latch
/// - A pin count tracking how many accessors currently hold the page
/// - A dirty flag set whenever a write guard modified the page
///
/// Access goes through [`FrameReadGuard`] and [`FrameWriteGuard`], which pin
/// the frame and take the latch together and undo both on drop.
pub struct BufferFrame {
    /// The page stored in this frame.
    page_id: PageId,
    /// Page data buffer.
    data: RwLock<Box<[u8; PAGE_SIZE]>>,
    /// Number of users currently accessing this page.
    pin_count: AtomicU32,
    /// Whether the page has been modified.
    is_dirty: AtomicBool,
}

impl BufferFrame {
    /// Creates a zero-filled frame for the given page.
    pub fn new(page_id: PageId) -> Self {
        Self::with_data(page_id, Box::new([0u8; PAGE_SIZE]))
    }

    /// Creates a frame holding existing page data.
    pub fn with_data(page_id: PageId, data: Box<[u8; PAGE_SIZE]>) -> Self {
        Self {
            page_id,
            data: RwLock::new(data),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    /// Returns the page ID stored in this frame.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Returns true if this frame is pinned.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    /// Returns true if this frame is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    /// Clears the dirty flag, typically after the page was written out.
    #[inline]
    pub fn mark_clean(&self) {
        self.is_dirty.store(false, Ordering::Release);
    }

    #[inline]
    pub(crate) fn set_dirty(&self) {
        self.is_dirty.store(true, Ordering::Release);
    }

    #[inline]
    pub(crate) fn pin(&self) {
        self.pin_count.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn unpin(&self) {
        let prev = self.pin_count.fetch_sub(1, Ordering::AcqRel);
        if prev == 0 {
            // Underflow protection: restore to 0
            self.pin_count.store(0, Ordering::Release);
        }
    }

    /// Pins the frame and takes the latch in shared mode.
    pub fn lock_shared(&self) -> FrameReadGuard<'_> {
        self.pin();
        FrameReadGuard::new(self, self.data.read())
    }

    /// Pins the frame and takes the latch in exclusive mode.
    pub fn lock_exclusive(&self) -> FrameWriteGuard<'_> {
        self.pin();
        FrameWriteGuard::new(self, self.data.write())
    }

    /// Like [`lock_shared`](Self::lock_shared), giving up after `timeout`.
    pub fn try_lock_shared_for(&self, timeout: Duration) -> Option<FrameReadGuard<'_>> {
        self.pin();
        match self.data.try_read_for(timeout) {
            Some(data) => Some(FrameReadGuard::new(self, data)),
            None => {
                self.unpin();
                None
            }
        }
    }

    /// Like [`lock_exclusive`](Self::lock_exclusive), giving up after `timeout`.
    pub fn try_lock_exclusive_for(&self, timeout: Duration) -> Option<FrameWriteGuard<'_>> {
        self.pin();
        match self.data.try_write_for(timeout) {
            Some(data) => Some(FrameWriteGuard::new(self, data)),
            None => {
                self.unpin();
                None
            }
        }
    }
}

impl std::fmt::Debug for BufferFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferFrame")
            .field("page_id", &self.page_id)
            .field("pin_count", &self.pin_count())
            .field("is_dirty", &self.is_dirty())
            .finish()
    }
}
