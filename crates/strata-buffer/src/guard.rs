//! RAII guards over a pinned, latched frame.

use crate::frame::BufferFrame;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use std::ops::{Deref, DerefMut};
use strata_common::page::{PageId, PAGE_SIZE};

/// Shared access to a frame. Unlatches and unpins on drop.
pub struct FrameReadGuard<'a> {
    frame: &'a BufferFrame,
    data: Option<RwLockReadGuard<'a, Box<[u8; PAGE_SIZE]>>>,
}

impl<'a> FrameReadGuard<'a> {
    pub(crate) fn new(
        frame: &'a BufferFrame,
        data: RwLockReadGuard<'a, Box<[u8; PAGE_SIZE]>>,
    ) -> Self {
        Self {
            frame,
            data: Some(data),
        }
    }

    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.frame.page_id()
    }
}

impl Deref for FrameReadGuard<'_> {
    type Target = [u8; PAGE_SIZE];

    fn deref(&self) -> &Self::Target {
        match &self.data {
            Some(data) => data,
            None => unreachable!("latch released before guard drop"),
        }
    }
}

impl Drop for FrameReadGuard<'_> {
    fn drop(&mut self) {
        // Release the latch before the pin.
        self.data.take();
        self.frame.unpin();
    }
}

/// Exclusive access to a frame.
///
/// Any mutable access marks the frame dirty when the guard is dropped.
/// Unlatches and unpins on drop, including during unwinding.
pub struct FrameWriteGuard<'a> {
    frame: &'a BufferFrame,
    data: Option<RwLockWriteGuard<'a, Box<[u8; PAGE_SIZE]>>>,
    modified: bool,
}

impl<'a> FrameWriteGuard<'a> {
    pub(crate) fn new(
        frame: &'a BufferFrame,
        data: RwLockWriteGuard<'a, Box<[u8; PAGE_SIZE]>>,
    ) -> Self {
        Self {
            frame,
            data: Some(data),
            modified: false,
        }
    }

    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.frame.page_id()
    }
}

impl Deref for FrameWriteGuard<'_> {
    type Target = [u8; PAGE_SIZE];

    fn deref(&self) -> &Self::Target {
        match &self.data {
            Some(data) => data,
            None => unreachable!("latch released before guard drop"),
        }
    }
}

impl DerefMut for FrameWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.modified = true;
        match &mut self.data {
            Some(data) => data,
            None => unreachable!("latch released before guard drop"),
        }
    }
}

impl Drop for FrameWriteGuard<'_> {
    fn drop(&mut self) {
        if self.modified {
            self.frame.set_dirty();
        }
        self.data.take();
        self.frame.unpin();
    }
}
