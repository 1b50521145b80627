//! Table catalog
//!
//! # Design
//!
//! - DashMap by id: lock-free lookups on the scan path
//! - DashMap by name: creation goes through the name map's entry API, so
//!   two sessions creating the same table cannot both succeed

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tempora_core::{Error, Result, TableDef, TableId};

use crate::heap::HeapTable;

/// All heap tables of one database
#[derive(Debug)]
pub struct HeapStore {
    by_id: DashMap<TableId, Arc<HeapTable>>,
    by_name: DashMap<String, TableId>,
    next_id: AtomicU32,
}

impl HeapStore {
    /// Empty store
    pub fn new() -> Self {
        HeapStore {
            by_id: DashMap::new(),
            by_name: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    /// Create a table
    ///
    /// Returns the table and whether it was created. With `if_not_exists`
    /// an existing table of the same name is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTable`] when the name is taken and
    /// `if_not_exists` is false, and an error for duplicate column names.
    pub fn create_table(&self, def: TableDef, if_not_exists: bool) -> Result<(Arc<HeapTable>, bool)> {
        for (i, column) in def.columns.iter().enumerate() {
            if def.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(Error::invalid_input(format!(
                    "column \"{}\" specified more than once",
                    column.name
                )));
            }
        }

        match self.by_name.entry(def.name.clone()) {
            Entry::Occupied(existing) => {
                if !if_not_exists {
                    return Err(Error::DuplicateTable(def.name));
                }
                let table = self.get(*existing.get()).ok_or_else(|| {
                    Error::internal(format!("catalog entry for \"{}\" has no table", def.name))
                })?;
                tracing::debug!(target: "tempora::storage", table = %def.name, "table exists, skipping");
                Ok((table, false))
            }
            Entry::Vacant(slot) => {
                let id = TableId(self.next_id.fetch_add(1, Ordering::Relaxed));
                let table = Arc::new(HeapTable::new(id, def));
                self.by_id.insert(id, Arc::clone(&table));
                slot.insert(id);
                tracing::debug!(target: "tempora::storage", table = table.name(), %id, "table created");
                Ok((table, true))
            }
        }
    }

    /// Table by id
    pub fn get(&self, id: TableId) -> Option<Arc<HeapTable>> {
        self.by_id.get(&id).map(|t| Arc::clone(t.value()))
    }

    /// Table by (case-folded) name
    pub fn get_by_name(&self, name: &str) -> Option<Arc<HeapTable>> {
        let id = *self.by_name.get(name)?.value();
        self.get(id)
    }

    /// Names of all tables, sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for HeapStore {
    fn default() -> Self {
        Self::new()
    }
}
