//! Heap tables
//!
//! Rows are never updated in place. An insert appends a new version; a
//! delete stamps the deleting transaction on the existing version. A
//! version's position in the heap is stable for the table's lifetime, so
//! scan cursors are plain positions.

use parking_lot::RwLock;

use tempora_core::{Column, Error, Result, Row, TableDef, TableId, TxnId};

/// One version of a row
#[derive(Debug, Clone, PartialEq)]
pub struct TupleVersion {
    /// Transaction that inserted the version
    pub xmin: TxnId,
    /// Transaction that deleted it, if any
    pub xmax: Option<TxnId>,
    /// Column values in storage order
    pub values: Row,
}

/// A table of row versions
#[derive(Debug)]
pub struct HeapTable {
    id: TableId,
    def: TableDef,
    versions: RwLock<Vec<TupleVersion>>,
}

impl HeapTable {
    /// Empty table
    pub fn new(id: TableId, def: TableDef) -> Self {
        HeapTable {
            id,
            def,
            versions: RwLock::new(Vec::new()),
        }
    }

    /// Table identity
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Columns in storage order
    pub fn columns(&self) -> &[Column] {
        &self.def.columns
    }

    /// Full definition
    pub fn def(&self) -> &TableDef {
        &self.def
    }

    /// Number of versions, live or dead
    pub fn len(&self) -> usize {
        self.versions.read().len()
    }

    /// True if nothing was ever inserted
    pub fn is_empty(&self) -> bool {
        self.versions.read().is_empty()
    }

    /// Append a version inserted by `xid`, returning its position
    ///
    /// # Errors
    ///
    /// Returns an error if the row does not match the table's columns.
    pub fn insert(&self, xid: TxnId, values: Row) -> Result<usize> {
        if values.len() != self.def.columns.len() {
            return Err(Error::invalid_input(format!(
                "table \"{}\" has {} columns but {} values were supplied",
                self.def.name,
                self.def.columns.len(),
                values.len()
            )));
        }
        for (value, column) in values.iter().zip(&self.def.columns) {
            value.check_type(column.data_type)?;
        }
        let mut versions = self.versions.write();
        versions.push(TupleVersion {
            xmin: xid,
            xmax: None,
            values,
        });
        Ok(versions.len() - 1)
    }

    /// Stamp `xid` as the deleter of the version at `position`
    ///
    /// Returns the previous deleter, which the caller must have found
    /// aborted (or absent) before deleting.
    pub fn mark_deleted(&self, position: usize, xid: TxnId) -> Result<Option<TxnId>> {
        let mut versions = self.versions.write();
        let version = versions.get_mut(position).ok_or_else(|| {
            Error::internal(format!(
                "no row version at position {} in \"{}\"",
                position, self.def.name
            ))
        })?;
        Ok(version.xmax.replace(xid))
    }

    /// Copy of the version at `position`
    pub fn version_at(&self, position: usize) -> Option<TupleVersion> {
        self.versions.read().get(position).cloned()
    }

    /// First version at or after `start` accepted by `visible`
    ///
    /// `visible` receives the version's inserting and deleting ids.
    /// Returns the version's position and values.
    pub fn next_visible(
        &self,
        start: usize,
        mut visible: impl FnMut(TxnId, Option<TxnId>) -> bool,
    ) -> Option<(usize, Row)> {
        let versions = self.versions.read();
        versions
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, v)| visible(v.xmin, v.xmax))
            .map(|(pos, v)| (pos, v.values.clone()))
    }

    /// Last version before `end` accepted by `visible`, scanning backwards
    pub fn prev_visible(
        &self,
        end: usize,
        mut visible: impl FnMut(TxnId, Option<TxnId>) -> bool,
    ) -> Option<(usize, Row)> {
        let versions = self.versions.read();
        let end = end.min(versions.len());
        versions[..end]
            .iter()
            .enumerate()
            .rev()
            .find(|(_, v)| visible(v.xmin, v.xmax))
            .map(|(pos, v)| (pos, v.values.clone()))
    }
}
