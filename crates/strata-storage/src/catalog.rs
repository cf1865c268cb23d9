//! Relation catalog: tables, index definitions and their trees.

use crate::btree::BTreeIndex;
use crate::lock::RelationLock;
use crate::tuple::TupleId;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use strata_common::{BTreeConfig, RelationId, Result, StrataError};

/// A key column of an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumn {
    pub name: String,
    pub descending: bool,
}

/// Column definition of an index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexDefinition {
    pub key_columns: Vec<IndexColumn>,
    /// Non-key columns stored alongside the key.
    pub include_columns: Vec<String>,
}

impl IndexDefinition {
    /// Ascending key columns, no include columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key_columns: columns
                .into_iter()
                .map(|name| IndexColumn {
                    name: name.into(),
                    descending: false,
                })
                .collect(),
            include_columns: Vec::new(),
        }
    }

    pub fn with_include<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// A table registered in the catalog.
#[derive(Debug)]
pub struct TableEntry {
    pub id: RelationId,
    pub name: String,
    pub lock: RelationLock,
}

/// An index registered in the catalog.
#[derive(Debug)]
pub struct IndexEntry {
    pub id: RelationId,
    pub name: String,
    pub table_id: RelationId,
    pub definition: IndexDefinition,
    pub lock: RelationLock,
    tree: Arc<BTreeIndex>,
}

impl IndexEntry {
    /// The index's B+Tree. Its file id is the index's relation id.
    pub fn tree(&self) -> &Arc<BTreeIndex> {
        &self.tree
    }
}

/// In-memory catalog of one database.
pub struct Catalog {
    database_id: u32,
    owner_id: u32,
    btree_config: BTreeConfig,
    next_relation_id: AtomicU32,
    tables: RwLock<HashMap<RelationId, Arc<TableEntry>>>,
    indexes: RwLock<HashMap<RelationId, Arc<IndexEntry>>>,
}

impl Catalog {
    /// First relation id handed out; lower ids are reserved.
    const FIRST_RELATION_ID: u32 = 16384;

    pub fn new(database_id: u32, owner_id: u32) -> Self {
        Self::with_btree_config(database_id, owner_id, BTreeConfig::default())
    }

    /// Creates a catalog whose indexes use `btree_config`.
    pub fn with_btree_config(database_id: u32, owner_id: u32, btree_config: BTreeConfig) -> Self {
        Self {
            database_id,
            owner_id,
            btree_config,
            next_relation_id: AtomicU32::new(Self::FIRST_RELATION_ID),
            tables: RwLock::new(HashMap::new()),
            indexes: RwLock::new(HashMap::new()),
        }
    }

    pub fn database_id(&self) -> u32 {
        self.database_id
    }

    pub fn owner_id(&self) -> u32 {
        self.owner_id
    }

    fn allocate_relation_id(&self) -> RelationId {
        RelationId(self.next_relation_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a table.
    pub fn create_table(&self, name: &str) -> Result<RelationId> {
        let mut tables = self.tables.write();
        if tables.values().any(|t| t.name == name) {
            return Err(StrataError::InvalidParameter {
                name: "table".to_string(),
                value: format!("{} already exists", name),
            });
        }
        let id = self.allocate_relation_id();
        tables.insert(
            id,
            Arc::new(TableEntry {
                id,
                name: name.to_string(),
                lock: RelationLock::new(id),
            }),
        );
        Ok(id)
    }

    pub fn table(&self, id: RelationId) -> Result<Arc<TableEntry>> {
        self.tables
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StrataError::TableNotFound(id.to_string()))
    }

    /// Creates an index over `table` and loads it with `rows`.
    pub fn create_index<I>(
        &self,
        table: RelationId,
        name: &str,
        definition: IndexDefinition,
        rows: I,
    ) -> Result<Arc<IndexEntry>>
    where
        I: IntoIterator<Item = (Bytes, TupleId)>,
    {
        self.table(table)?;
        if definition.key_columns.is_empty() {
            return Err(StrataError::InvalidParameter {
                name: "definition".to_string(),
                value: "no key columns".to_string(),
            });
        }

        // Hold the map across the build so two creators cannot race on a name.
        let mut indexes = self.indexes.write();
        if indexes.values().any(|i| i.name == name) {
            return Err(StrataError::IndexAlreadyExists(name.to_string()));
        }

        let id = self.allocate_relation_id();
        let tree = BTreeIndex::build(id.0, self.btree_config.clone(), rows)?;
        let entry = Arc::new(IndexEntry {
            id,
            name: name.to_string(),
            table_id: table,
            definition,
            lock: RelationLock::new(id),
            tree: Arc::new(tree),
        });
        indexes.insert(id, Arc::clone(&entry));

        tracing::info!(index = %id, name, table = %table, "created index");
        Ok(entry)
    }

    /// Creates an empty index over `table` with the same definition as `source`.
    pub fn create_index_like(
        &self,
        table: RelationId,
        source: RelationId,
        name: &str,
    ) -> Result<Arc<IndexEntry>> {
        let definition = self.index(source)?.definition.clone();
        self.create_index(table, name, definition, std::iter::empty())
    }

    pub fn index(&self, id: RelationId) -> Result<Arc<IndexEntry>> {
        self.indexes
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StrataError::IndexNotFound(id.to_string()))
    }

    pub fn index_by_name(&self, name: &str) -> Option<Arc<IndexEntry>> {
        self.indexes.read().values().find(|i| i.name == name).cloned()
    }

    /// Indexes defined on `table`, in creation order.
    pub fn indexes_on(&self, table: RelationId) -> Vec<RelationId> {
        let mut ids: Vec<RelationId> = self
            .indexes
            .read()
            .values()
            .filter(|i| i.table_id == table)
            .map(|i| i.id)
            .collect();
        ids.sort_by_key(|id| id.0);
        ids
    }

    /// Removes an index from the catalog. Returns the removed entry.
    pub fn drop_index(&self, id: RelationId) -> Result<Arc<IndexEntry>> {
        let entry = self
            .indexes
            .write()
            .remove(&id)
            .ok_or_else(|| StrataError::IndexNotFound(id.to_string()))?;
        tracing::info!(index = %id, name = %entry.name, "dropped index");
        Ok(entry)
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("database_id", &self.database_id)
            .field("owner_id", &self.owner_id)
            .field("tables", &self.tables.read().len())
            .field("indexes", &self.indexes.read().len())
            .finish()
    }
}
