//! In-memory page storage for B+Tree nodes.

use super::constants::META_PAGE_NUM;
use strata_common::page::PAGE_SIZE;

/// In-memory page storage for B+Tree nodes.
///
/// Node pages are numbered from 1; page 0 is the control page, which the
/// index keeps in its own frame. Page N lives at Vec index N - 1.
pub struct InMemoryPageStore {
    /// Node pages stored by page number.
    pages: Vec<Box<[u8; PAGE_SIZE]>>,
}

impl InMemoryPageStore {
    /// Creates a new empty page store.
    pub fn new() -> Self {
        Self { pages: Vec::new() }
    }

    #[inline]
    fn slot(page_num: u32) -> Option<usize> {
        if page_num == META_PAGE_NUM {
            None
        } else {
            Some(page_num as usize - 1)
        }
    }

    /// Allocates a new zeroed page and returns its page number.
    #[inline]
    pub fn allocate(&mut self) -> u32 {
        self.pages.push(Box::new([0u8; PAGE_SIZE]));
        self.pages.len() as u32
    }

    /// Gets a page by page number (read-only).
    #[inline]
    pub fn get(&self, page_num: u32) -> Option<&[u8; PAGE_SIZE]> {
        Self::slot(page_num)
            .and_then(|idx| self.pages.get(idx))
            .map(|p| &**p)
    }

    /// Gets a mutable page by page number.
    #[inline]
    pub fn get_mut(&mut self, page_num: u32) -> Option<&mut [u8; PAGE_SIZE]> {
        Self::slot(page_num)
            .and_then(|idx| self.pages.get_mut(idx))
            .map(|p| &mut **p)
    }

    /// Writes page data at a specific page number.
    #[inline]
    pub fn write(&mut self, page_num: u32, data: &[u8; PAGE_SIZE]) {
        if let Some(page) = self.get_mut(page_num) {
            page.copy_from_slice(data);
        }
    }

    /// Releases every node page.
    pub fn clear(&mut self) {
        self.pages.clear();
        self.pages.shrink_to_fit();
    }

    /// Returns the number of allocated node pages.
    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }
}

impl Default for InMemoryPageStore {
    fn default() -> Self {
        Self::new()
    }
}
