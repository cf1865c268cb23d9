//! Page-based B+Tree index implementation.

use super::constants::{MAX_KEY_SIZE, META_PAGE_NUM};
use super::page::{BTreeInternalPage, BTreeLeafPage, LeafInsertPolicy};
use super::scan::{IndexScan, ScanBounds, ScanDirection, ScanItem, ScanVisibility};
use super::store::InMemoryPageStore;
use super::types::{compare_keys, compare_positions, BTreeMetaHeader, InternalEntry, LeafEntry};
use crate::am::{
    AmCapabilities, BulkDeleteStats, IndexAccessMethod, IndexCost, IndexProperty, IndexStats,
    UniqueCheck,
};
use crate::tuple::TupleId;
use bytes::Bytes;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use strata_buffer::BufferFrame;
use strata_common::page::{PageHeader, PageId, PageType};
use strata_common::{BTreeConfig, CostParams, RelationId, Result, StrataError};

/// A B+Tree over byte-string keys mapping to row references.
///
/// Entries are ordered by (key, row reference), so a key may map to many
/// rows. Node pages live in an in-memory page store; page 0 is the control
/// page, held in its own pinned frame. The control page carries the root and
/// height, followed by an extension area reserved for the tree's user.
pub struct BTreeIndex {
    /// Control page (page 0).
    control: BufferFrame,
    /// In-memory page storage (all nodes stored here).
    pages: RwLock<InMemoryPageStore>,
    /// Root page number.
    root_page_num: AtomicU32,
    /// Tree height (1 = just root as leaf).
    height: AtomicU32,
    /// File ID for this index (used for PageId construction).
    file_id: u32,
    config: BTreeConfig,
}

impl BTreeIndex {
    /// Maximum B+Tree height (supports billions of keys).
    const MAX_HEIGHT: usize = 16;

    /// Creates an empty B+Tree: a control page and one empty root leaf.
    pub fn create(file_id: u32, config: BTreeConfig) -> Result<Self> {
        config.validate()?;

        let index = Self {
            control: BufferFrame::new(PageId::new(file_id, META_PAGE_NUM)),
            pages: RwLock::new(InMemoryPageStore::new()),
            root_page_num: AtomicU32::new(0),
            height: AtomicU32::new(1),
            file_id,
            config,
        };
        {
            let mut pages = index.pages.write();
            index.reset_pages(&mut pages);
        }
        Ok(index)
    }

    /// Creates a B+Tree and loads it with `rows`.
    ///
    /// Rows are sorted by position first so leaves fill left to right.
    pub fn build<I>(file_id: u32, config: BTreeConfig, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Bytes, TupleId)>,
    {
        let index = Self::create(file_id, config)?;

        let mut rows: Vec<(Bytes, TupleId)> = rows.into_iter().collect();
        rows.sort_by(|a, b| compare_positions(&a.0, a.1, &b.0, b.1));

        {
            let mut pages = index.pages.write();
            for (key, tuple_id) in &rows {
                index.check_insert_args(key, *tuple_id)?;
                index.insert_in_pages(&mut pages, key, *tuple_id)?;
            }
        }

        tracing::debug!(file_id, rows = rows.len(), height = index.height(), "built b+tree");
        Ok(index)
    }

    /// Returns the root page ID.
    #[inline]
    pub fn root_page_id(&self) -> PageId {
        PageId::new(
            self.file_id,
            self.root_page_num.load(AtomicOrdering::Acquire),
        )
    }

    /// Returns the file ID.
    #[inline]
    pub fn file_id(&self) -> u32 {
        self.file_id
    }

    /// Returns the tree height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height.load(AtomicOrdering::Acquire)
    }

    pub fn config(&self) -> &BTreeConfig {
        &self.config
    }

    /// Frame holding the control page.
    ///
    /// Bytes from [`BTreeMetaHeader::EXTENSION_OFFSET`] onward belong to the
    /// caller; the tree only writes the page and meta headers.
    pub fn control_frame(&self) -> &BufferFrame {
        &self.control
    }

    /// Reads the meta header from the control page.
    pub fn meta_header(&self) -> BTreeMetaHeader {
        let page = self.control.lock_shared();
        BTreeMetaHeader::from_bytes(
            &page[BTreeMetaHeader::OFFSET..BTreeMetaHeader::OFFSET + BTreeMetaHeader::SIZE],
        )
    }

    /// Checks that the control page describes this tree.
    pub fn verify_control_page(&self) -> Result<()> {
        let meta = self.meta_header();
        if !meta.is_valid() {
            return Err(StrataError::PageCorrupted {
                page_id: self.control.page_id().as_u64(),
                reason: "invalid b+tree meta header".to_string(),
            });
        }
        if meta.root != self.root_page_num.load(AtomicOrdering::Acquire) || meta.height != self.height() {
            return Err(StrataError::BTreeCorrupted(format!(
                "control page root {} height {} out of sync",
                meta.root, meta.height
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Build / Reset
    // =========================================================================

    /// Releases every node page and reinitialises the tree as empty.
    ///
    /// The control page extension area is preserved.
    pub fn build_empty(&self) -> Result<()> {
        let mut pages = self.pages.write();
        let released = pages.num_pages();
        self.reset_pages(&mut pages);
        tracing::debug!(file_id = self.file_id, released, "reset b+tree to empty");
        Ok(())
    }

    fn reset_pages(&self, pages: &mut InMemoryPageStore) {
        pages.clear();
        let root_page_num = pages.allocate();
        let root_page = BTreeLeafPage::new(PageId::new(self.file_id, root_page_num));
        pages.write(root_page_num, root_page.as_bytes());

        self.root_page_num.store(root_page_num, AtomicOrdering::Release);
        self.height.store(1, AtomicOrdering::Release);
        self.write_meta_header(root_page_num, 1);
    }

    /// Writes root and height through to the control page.
    fn write_meta_header(&self, root: u32, height: u32) {
        let mut page = self.control.lock_exclusive();
        let header = PageHeader::from_bytes(&page[..PageHeader::SIZE]);
        if header.page_type != PageType::BTreeMeta {
            let header = PageHeader::new(self.control.page_id(), PageType::BTreeMeta);
            page[..PageHeader::SIZE].copy_from_slice(&header.to_bytes());
        }
        let meta = BTreeMetaHeader::new(root, height);
        page[BTreeMetaHeader::OFFSET..BTreeMetaHeader::OFFSET + BTreeMetaHeader::SIZE]
            .copy_from_slice(&meta.to_bytes());
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    fn leaf_at(&self, pages: &InMemoryPageStore, page_num: u32) -> Result<BTreeLeafPage> {
        pages
            .get(page_num)
            .map(BTreeLeafPage::from_bytes)
            .ok_or_else(|| StrataError::BTreeCorrupted(format!("leaf {} not found", page_num)))
    }

    /// Finds the path from root to the leaf covering (key, tuple_id).
    fn find_path(
        &self,
        pages: &InMemoryPageStore,
        key: &[u8],
        tuple_id: TupleId,
    ) -> Result<([u32; Self::MAX_HEIGHT], usize)> {
        let height = self.height.load(AtomicOrdering::Acquire) as usize;
        if height == 0 || height > Self::MAX_HEIGHT {
            return Err(StrataError::BTreeCorrupted(format!("invalid height {}", height)));
        }

        let mut path = [0u32; Self::MAX_HEIGHT];
        let mut current = self.root_page_num.load(AtomicOrdering::Acquire);
        path[0] = current;

        for depth in 1..height {
            let data = pages.get(current).ok_or_else(|| {
                StrataError::BTreeCorrupted(format!("internal node {} not found", current))
            })?;
            current = BTreeInternalPage::from_bytes(data).find_child(key, tuple_id).page_num;
            path[depth] = current;
        }

        Ok((path, height))
    }

    /// Find leftmost leaf page number.
    fn find_leftmost_leaf_num(&self, pages: &InMemoryPageStore) -> Result<u32> {
        let height = self.height.load(AtomicOrdering::Acquire);
        let mut current = self.root_page_num.load(AtomicOrdering::Acquire);

        for _ in 1..height {
            let data = pages.get(current).ok_or_else(|| {
                StrataError::BTreeCorrupted(format!("internal node {} not found", current))
            })?;
            current = BTreeInternalPage::from_bytes(data).leftmost_child().page_num;
        }

        Ok(current)
    }

    /// Visits stored entries in position order, starting at the leaf covering
    /// `start` (or the leftmost leaf), until `visit` breaks.
    fn walk_leaves<F>(
        &self,
        pages: &InMemoryPageStore,
        start: Option<(&[u8], TupleId)>,
        mut visit: F,
    ) -> Result<()>
    where
        F: FnMut(&LeafEntry) -> ControlFlow<()>,
    {
        let first = match start {
            Some((key, tuple_id)) => {
                let (path, len) = self.find_path(pages, key, tuple_id)?;
                path[len - 1]
            }
            None => self.find_leftmost_leaf_num(pages)?,
        };

        let mut current = Some(first);
        while let Some(page_num) = current {
            let leaf = self.leaf_at(pages, page_num)?;
            for entry in leaf.entries() {
                if visit(&entry).is_break() {
                    return Ok(());
                }
            }
            current = leaf.next_leaf().map(|p| p.page_num);
        }
        Ok(())
    }

    fn collect_entries(
        &self,
        pages: &InMemoryPageStore,
        bounds: &ScanBounds,
        visibility: ScanVisibility,
    ) -> Result<Vec<LeafEntry>> {
        let mut entries = Vec::new();
        let start = bounds.lower_key().map(|k| (k, TupleId::MIN));

        self.walk_leaves(pages, start, |entry| {
            if bounds.below_lower(&entry.key) {
                return ControlFlow::Continue(());
            }
            if bounds.above_upper(&entry.key) {
                return ControlFlow::Break(());
            }
            if visibility == ScanVisibility::Any || !entry.is_dead() {
                entries.push(entry.clone());
            }
            ControlFlow::Continue(())
        })?;

        Ok(entries)
    }

    fn has_live_key(&self, pages: &InMemoryPageStore, key: &[u8]) -> Result<bool> {
        let mut found = false;
        self.walk_leaves(pages, Some((key, TupleId::MIN)), |entry| {
            match compare_keys(&entry.key, key) {
                Ordering::Less => ControlFlow::Continue(()),
                Ordering::Greater => ControlFlow::Break(()),
                Ordering::Equal if entry.is_dead() => ControlFlow::Continue(()),
                Ordering::Equal => {
                    found = true;
                    ControlFlow::Break(())
                }
            }
        })?;
        Ok(found)
    }

    // =========================================================================
    // Insert
    // =========================================================================

    #[inline]
    fn policy(&self) -> LeafInsertPolicy {
        LeafInsertPolicy {
            deduplicate: self.config.deduplicate,
            max_posting_refs: self.config.max_posting_refs as usize,
        }
    }

    fn check_insert_args(&self, key: &[u8], tuple_id: TupleId) -> Result<()> {
        if key.len() > MAX_KEY_SIZE {
            return Err(StrataError::KeyTooLarge {
                size: key.len(),
                max: MAX_KEY_SIZE,
            });
        }
        if !tuple_id.is_valid() {
            return Err(StrataError::InvalidParameter {
                name: "tuple_id".to_string(),
                value: tuple_id.to_string(),
            });
        }
        Ok(())
    }

    /// Inserts one row reference for `key`.
    ///
    /// With [`UniqueCheck::Yes`] the insert fails if the key already has a
    /// live entry. Inserting an exact (key, row reference) pair twice fails
    /// with DuplicateEntry.
    pub fn insert(&self, key: &[u8], tuple_id: TupleId, unique: UniqueCheck) -> Result<()> {
        self.check_insert_args(key, tuple_id)?;

        let mut pages = self.pages.write();
        if unique == UniqueCheck::Yes && self.has_live_key(&pages, key)? {
            return Err(StrataError::UniqueViolation {
                index: RelationId(self.file_id).to_string(),
                key: key.to_vec(),
            });
        }
        self.insert_in_pages(&mut pages, key, tuple_id)
    }

    /// Inserts a single-reference entry taken from another tree.
    ///
    /// The entry's info tag must agree with its contents. A dead hint on the
    /// entry is not carried over.
    pub fn insert_entry(&self, entry: &LeafEntry) -> Result<()> {
        if !entry.validate() {
            return Err(StrataError::BTreeCorrupted(format!(
                "entry info tag {:#06x} does not match its contents",
                entry.info()
            )));
        }
        if entry.is_posting() {
            return Err(StrataError::InvalidParameter {
                name: "entry".to_string(),
                value: format!("posting entry with {} references", entry.tids().len()),
            });
        }
        self.insert(&entry.key, entry.heap_tid(), UniqueCheck::No)
    }

    /// Returns true if `key` has a live entry.
    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        let pages = self.pages.read();
        self.has_live_key(&pages, key)
    }

    fn insert_in_pages(
        &self,
        pages: &mut InMemoryPageStore,
        key: &[u8],
        tuple_id: TupleId,
    ) -> Result<()> {
        let (path, path_len) = self.find_path(pages, key, tuple_id)?;
        let leaf_page_num = path[path_len - 1];
        let mut leaf = self.leaf_at(pages, leaf_page_num)?;

        match leaf.insert(key, tuple_id, self.policy()) {
            Ok(()) => {
                pages.write(leaf_page_num, leaf.as_bytes());
                return Ok(());
            }
            Err(StrataError::NodeFull) => {
                // Need split - fall through
            }
            Err(e) => return Err(e),
        }

        // Allocate new page for right sibling
        let new_page_num = pages.allocate();
        let new_page_id = PageId::new(self.file_id, new_page_num);
        let ((split_key, split_tid), mut right_leaf) = leaf.split(new_page_id)?;

        // Insert the new entry into the leaf covering its position
        if compare_positions(key, tuple_id, &split_key, split_tid).is_lt() {
            leaf.insert(key, tuple_id, self.policy())?;
        } else {
            right_leaf.insert(key, tuple_id, self.policy())?;
        }

        pages.write(leaf_page_num, leaf.as_bytes());
        pages.write(new_page_num, right_leaf.as_bytes());

        let separator = InternalEntry {
            key: split_key,
            tuple_id: split_tid,
            child_page_id: new_page_id,
        };
        self.propagate_split(pages, separator, &path[..path_len])
    }

    /// Propagate split up the tree.
    fn propagate_split(
        &self,
        pages: &mut InMemoryPageStore,
        separator: InternalEntry,
        path: &[u32],
    ) -> Result<()> {
        if path.len() < 2 {
            // Root was a leaf, create new root
            return self.create_new_root(pages, separator);
        }

        let mut current = separator;
        let mut parent_idx = path.len() - 2;

        loop {
            let parent_page_num = path[parent_idx];
            let parent_data = pages.get(parent_page_num).ok_or_else(|| {
                StrataError::BTreeCorrupted(format!("parent {} not found", parent_page_num))
            })?;
            let mut parent = BTreeInternalPage::from_bytes(parent_data);

            match parent.insert(current.clone()) {
                Ok(()) => {
                    pages.write(parent_page_num, parent.as_bytes());
                    return Ok(());
                }
                Err(StrataError::NodeFull) => {
                    let new_page_num = pages.allocate();
                    let new_page_id = PageId::new(self.file_id, new_page_num);
                    let (promoted, mut right_internal) = parent.split(new_page_id)?;

                    if compare_positions(
                        &current.key,
                        current.tuple_id,
                        &promoted.key,
                        promoted.tuple_id,
                    )
                    .is_lt()
                    {
                        parent.insert(current)?;
                    } else {
                        right_internal.insert(current)?;
                    }

                    pages.write(parent_page_num, parent.as_bytes());
                    pages.write(new_page_num, right_internal.as_bytes());

                    if parent_idx == 0 {
                        return self.create_new_root(pages, promoted);
                    }

                    current = promoted;
                    parent_idx -= 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Creates a new root when the current root splits.
    fn create_new_root(&self, pages: &mut InMemoryPageStore, separator: InternalEntry) -> Result<()> {
        let old_root = self.root_page_num.load(AtomicOrdering::Acquire);
        let height = self.height.load(AtomicOrdering::Acquire);

        let new_root_num = pages.allocate();
        let new_root_id = PageId::new(self.file_id, new_root_num);

        let mut new_root = BTreeInternalPage::new(new_root_id, height as u16);
        new_root.set_leftmost_child(PageId::new(self.file_id, old_root));
        new_root.insert(separator)?;

        pages.write(new_root_num, new_root.as_bytes());

        self.root_page_num.store(new_root_num, AtomicOrdering::Release);
        self.height.store(height + 1, AtomicOrdering::Release);
        self.write_meta_header(new_root_num, height + 1);

        Ok(())
    }

    // =========================================================================
    // Lookup / Scan
    // =========================================================================

    /// Returns the live row references stored for `key`, ascending.
    pub fn search(&self, key: &[u8]) -> Result<Vec<TupleId>> {
        let pages = self.pages.read();
        let entries = self.collect_entries(&pages, &ScanBounds::point(key), ScanVisibility::LiveOnly)?;
        Ok(entries.iter().flat_map(|e| e.tids().iter().copied()).collect())
    }

    /// Returns every stored entry in position order, posting lists intact.
    pub fn scan_entries(&self, visibility: ScanVisibility) -> Result<Vec<LeafEntry>> {
        let pages = self.pages.read();
        self.collect_entries(&pages, &ScanBounds::all(), visibility)
    }

    /// Starts a scan over `bounds`.
    pub fn begin_scan(
        &self,
        bounds: ScanBounds,
        direction: ScanDirection,
        visibility: ScanVisibility,
    ) -> Result<IndexScan<'_>> {
        let entries = {
            let pages = self.pages.read();
            self.collect_entries(&pages, &bounds, visibility)?
        };
        let items = entries
            .iter()
            .flat_map(|e| {
                e.tids().iter().map(move |tid| ScanItem {
                    key: e.key.clone(),
                    tuple_id: *tid,
                })
            })
            .collect();
        Ok(IndexScan::new(self, items, direction))
    }

    /// Hints that the row behind (key, tuple_id) is dead.
    ///
    /// Only plain entries take the hint; posting entries keep their
    /// references until a bulk delete removes them. Returns true if a hint
    /// was recorded.
    pub fn kill_entry(&self, key: &[u8], tuple_id: TupleId) -> Result<bool> {
        let mut pages = self.pages.write();
        let (path, path_len) = self.find_path(&pages, key, tuple_id)?;
        let leaf_page_num = path[path_len - 1];
        let mut leaf = self.leaf_at(&pages, leaf_page_num)?;

        let mut entries = leaf.entries();
        let pos = entries.partition_point(|e| {
            compare_positions(&e.key, e.heap_tid(), key, tuple_id) != Ordering::Greater
        });
        if pos == 0 {
            return Ok(false);
        }

        let entry = &mut entries[pos - 1];
        if entry.key.as_ref() != key || !entry.contains(tuple_id) {
            return Ok(false);
        }
        if entry.is_posting() || entry.is_dead() {
            return Ok(false);
        }

        entry.set_dead(true);
        leaf.write_entries(&entries)?;
        pages.write(leaf_page_num, leaf.as_bytes());
        Ok(true)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Removes every row reference for which `callback` returns true.
    ///
    /// Emptied leaves stay linked in place; they are reused by later inserts
    /// into their key range.
    pub fn bulk_delete<F>(&self, mut callback: F) -> Result<BulkDeleteStats>
    where
        F: FnMut(TupleId) -> bool,
    {
        let mut pages = self.pages.write();
        let mut stats = BulkDeleteStats::default();
        let mut current = Some(self.find_leftmost_leaf_num(&pages)?);

        while let Some(page_num) = current {
            let mut leaf = self.leaf_at(&pages, page_num)?;
            let mut entries = leaf.entries();

            let mut removed = 0usize;
            for entry in entries.iter_mut() {
                removed += entry.remove_tids(&mut callback);
            }
            entries.retain(|e| !e.tids().is_empty());

            if removed > 0 {
                leaf.write_entries(&entries)?;
                pages.write(page_num, leaf.as_bytes());
            }

            stats.tuples_removed += removed as u64;
            stats.num_index_tuples += entries.iter().map(|e| e.tids().len() as u64).sum::<u64>();
            if entries.is_empty() {
                stats.empty_pages += 1;
            }
            current = leaf.next_leaf().map(|p| p.page_num);
        }

        stats.num_pages = pages.num_pages() as u64;
        tracing::debug!(
            file_id = self.file_id,
            removed = stats.tuples_removed,
            remaining = stats.num_index_tuples,
            "bulk delete"
        );
        Ok(stats)
    }

    /// Post-vacuum pass. Returns fresh statistics.
    pub fn vacuum_cleanup(&self, bulk: Option<BulkDeleteStats>) -> Result<IndexStats> {
        let stats = self.stats()?;
        if let Some(bulk) = bulk {
            if bulk.num_index_tuples != stats.num_index_tuples {
                tracing::warn!(
                    file_id = self.file_id,
                    counted = stats.num_index_tuples,
                    reported = bulk.num_index_tuples,
                    "row count changed since bulk delete"
                );
            }
        }
        Ok(stats)
    }

    /// Counts pages, entries and row references.
    pub fn stats(&self) -> Result<IndexStats> {
        let pages = self.pages.read();
        let mut stats = IndexStats {
            num_pages: pages.num_pages() as u64,
            height: self.height(),
            ..IndexStats::default()
        };

        let mut current = Some(self.find_leftmost_leaf_num(&pages)?);
        while let Some(page_num) = current {
            let leaf = self.leaf_at(&pages, page_num)?;
            let entries = leaf.entries();
            stats.leaf_pages += 1;
            stats.num_entries += entries.len() as u64;
            stats.num_index_tuples += entries.iter().map(|e| e.tids().len() as u64).sum::<u64>();
            current = leaf.next_leaf().map(|p| p.page_num);
        }

        Ok(stats)
    }

    /// Estimates the cost of a scan returning `selectivity` of the index.
    pub fn cost_estimate(&self, selectivity: f64, params: &CostParams) -> Result<IndexCost> {
        if !(0.0..=1.0).contains(&selectivity) {
            return Err(StrataError::InvalidParameter {
                name: "selectivity".to_string(),
                value: selectivity.to_string(),
            });
        }
        params.validate()?;

        let stats = self.stats()?;
        let tuples = (stats.num_index_tuples as f64 * selectivity).max(1.0);
        let pages_fetched = (stats.leaf_pages as f64 * selectivity).ceil().max(1.0);

        // Descent: one comparison per halving of the index, plus a fixed
        // charge per level.
        let comparisons = (stats.num_index_tuples.max(1) as f64).log2().ceil();
        let startup_cost =
            (comparisons + (stats.height as f64 + 1.0) * 50.0) * params.cpu_operator_cost;
        let total_cost = startup_cost
            + pages_fetched * params.random_page_cost
            + tuples * (params.cpu_index_tuple_cost + params.cpu_operator_cost);

        Ok(IndexCost {
            startup_cost,
            total_cost,
            selectivity,
            pages_fetched,
        })
    }

    pub fn property(&self, property: IndexProperty) -> Option<bool> {
        match property {
            IndexProperty::Returnable
            | IndexProperty::Orderable
            | IndexProperty::Clusterable
            | IndexProperty::IndexScan
            | IndexProperty::BitmapScan
            | IndexProperty::BackwardScan
            | IndexProperty::SearchArray => Some(true),
            IndexProperty::DistanceOrderable => Some(false),
            IndexProperty::SearchNulls => None,
        }
    }

    /// Key columns are stored verbatim, so index-only scans can return any.
    pub fn can_return(&self, _column: usize) -> bool {
        true
    }
}

impl IndexAccessMethod for BTreeIndex {
    fn name(&self) -> &'static str {
        "btree"
    }

    fn capabilities(&self) -> AmCapabilities {
        AmCapabilities {
            can_order: true,
            can_backward: true,
            can_unique: true,
            can_multi_col: true,
            can_include: true,
            optional_key: true,
            search_array: true,
            search_nulls: true,
            clusterable: true,
            can_parallel: false,
            can_mark: false,
        }
    }

    fn insert(&self, key: &[u8], tuple_id: TupleId, unique: UniqueCheck) -> Result<()> {
        BTreeIndex::insert(self, key, tuple_id, unique)
    }

    fn bulk_delete(&self, callback: &mut dyn FnMut(TupleId) -> bool) -> Result<BulkDeleteStats> {
        BTreeIndex::bulk_delete(self, callback)
    }

    fn vacuum_cleanup(&self, stats: Option<BulkDeleteStats>) -> Result<IndexStats> {
        BTreeIndex::vacuum_cleanup(self, stats)
    }

    fn cost_estimate(&self, selectivity: f64, params: &CostParams) -> Result<IndexCost> {
        BTreeIndex::cost_estimate(self, selectivity, params)
    }

    fn property(&self, property: IndexProperty) -> Option<bool> {
        BTreeIndex::property(self, property)
    }

    fn can_return(&self, column: usize) -> bool {
        BTreeIndex::can_return(self, column)
    }

    fn build_empty(&self) -> Result<()> {
        BTreeIndex::build_empty(self)
    }

    fn begin_scan(
        &self,
        bounds: ScanBounds,
        direction: ScanDirection,
        visibility: ScanVisibility,
    ) -> Result<IndexScan<'_>> {
        BTreeIndex::begin_scan(self, bounds, direction, visibility)
    }
}

impl std::fmt::Debug for BTreeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BTreeIndex")
            .field("file_id", &self.file_id)
            .field("root", &self.root_page_num.load(AtomicOrdering::Relaxed))
            .field("height", &self.height.load(AtomicOrdering::Relaxed))
            .finish()
    }
}
