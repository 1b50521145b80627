//! Services a host engine offers to loaded modules
//!
//! Modules never reach into engine internals. They see the engine through
//! three traits:
//! - [`Spi`]: issue auxiliary SQL (connect, prepare, execute, keep, free)
//! - [`TableAccess`]: open tables and scan them under a chosen snapshot
//! - [`Host`]: hook slots, the standard executor routines, function
//!   registration and the active snapshot

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::hooks::{ExecutorFlags, HookSlots};
use crate::query::QueryDesc;
use crate::snapshot::Snapshot;
use crate::types::{Column, DataType, Datum, FunctionId, Row, TableId};

// ============================================================================
// SPI
// ============================================================================

/// Handle of a statement prepared through SPI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatementHandle(pub u64);

/// Outcome of an SPI execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpiResult {
    /// Rows returned, inserted or deleted
    pub processed: u64,
    /// Result column names (empty for writes)
    pub columns: Vec<String>,
    /// Returned rows (empty for writes)
    pub rows: Vec<Row>,
}

/// An open SPI connection
///
/// Obtained from [`Spi::connect`]; dropping it disconnects, on every exit
/// path. Statements prepared under a connection are released with it
/// unless they were handed to [`Spi::keep`].
pub struct SpiConnection<'a> {
    spi: &'a dyn Spi,
    depth: usize,
}

impl<'a> SpiConnection<'a> {
    /// Wrap connection `depth` of `spi`; only engines call this
    pub fn new(spi: &'a dyn Spi, depth: usize) -> Self {
        SpiConnection { spi, depth }
    }

    /// Nesting depth of this connection, starting at 1
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Drop for SpiConnection<'_> {
    fn drop(&mut self) {
        self.spi.disconnect(self.depth);
    }
}

impl fmt::Debug for SpiConnection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpiConnection")
            .field("depth", &self.depth)
            .finish()
    }
}

/// Server programming interface: SQL issued from inside the engine
pub trait Spi {
    /// Open a (possibly nested) connection
    fn connect(&self) -> Result<SpiConnection<'_>>;

    /// Close connection `depth`; called by the connection guard
    fn disconnect(&self, depth: usize);

    /// Compile `sql` with the given parameter types
    fn prepare(
        &self,
        conn: &SpiConnection<'_>,
        sql: &str,
        param_types: &[DataType],
    ) -> Result<StatementHandle>;

    /// Make a prepared statement outlive its connection
    fn keep(&self, handle: StatementHandle) -> Result<()>;

    /// Run a prepared statement
    ///
    /// `row_limit == 0` means no limit.
    fn execute_prepared(
        &self,
        conn: &SpiConnection<'_>,
        handle: StatementHandle,
        params: &[Datum],
        read_only: bool,
        row_limit: usize,
    ) -> Result<SpiResult>;

    /// Plan and run `sql` once
    fn execute(
        &self,
        conn: &SpiConnection<'_>,
        sql: &str,
        read_only: bool,
        row_limit: usize,
    ) -> Result<SpiResult>;

    /// Release a prepared statement
    fn free(&self, handle: StatementHandle) -> Result<()>;
}

// ============================================================================
// Table access
// ============================================================================

/// Lock strength requested when opening a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Reading
    AccessShare,
    /// Inserting or deleting rows
    RowExclusive,
}

/// Scan direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    /// First to last
    Forward,
    /// Last to first
    Backward,
}

/// Scan options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanFlags {
    /// Judge rows written by the current transaction by the snapshot too
    pub hide_own_writes: bool,
}

/// An opened table
#[derive(Debug, Clone, PartialEq)]
pub struct TableHandle {
    /// Table identity
    pub id: TableId,
    /// Table name
    pub name: String,
    /// Columns in storage order
    pub columns: Vec<Column>,
    /// Lock the table was opened with
    pub lock: LockMode,
}

/// Cursor of a table scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanHandle {
    table: TableId,
    snapshot: Snapshot,
    flags: ScanFlags,
    position: Option<usize>,
}

impl ScanHandle {
    /// A cursor positioned before the first row
    pub fn new(table: TableId, snapshot: Snapshot, flags: ScanFlags) -> Self {
        ScanHandle {
            table,
            snapshot,
            flags,
            position: None,
        }
    }

    /// Scanned table
    pub fn table(&self) -> TableId {
        self.table
    }

    /// Snapshot the scan judges visibility with
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Scan options
    pub fn flags(&self) -> ScanFlags {
        self.flags
    }

    /// Storage position of the last row returned
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Record the storage position of the row just returned
    pub fn set_position(&mut self, position: usize) {
        self.position = Some(position);
    }
}

/// Raw table access
pub trait TableAccess {
    /// Resolve `qualified_name` (`table` or `schema.table`) and open it
    fn open_table(&self, qualified_name: &str, lock: LockMode) -> Result<TableHandle>;

    /// Start a scan that judges visibility with `snapshot`
    fn begin_scan(
        &self,
        table: &TableHandle,
        snapshot: Snapshot,
        flags: ScanFlags,
    ) -> Result<ScanHandle>;

    /// Next visible row, or `None` at the end
    fn next_row(&self, scan: &mut ScanHandle, direction: ScanDirection) -> Result<Option<Row>>;
}

// ============================================================================
// Functions
// ============================================================================

/// Body of a scalar function
pub type ScalarFn = Arc<dyn Fn(&[Datum]) -> Result<Datum> + Send + Sync>;

/// Body of a set-returning function
pub type SetReturningFn = Arc<dyn Fn(&dyn Host, &[Datum]) -> Result<Vec<Row>> + Send + Sync>;

/// Shape of the rows a set-returning function produces
#[derive(Debug, Clone, PartialEq)]
pub enum ResultColumns {
    /// Always the same columns
    Fixed(Vec<Column>),
    /// The columns of the table named by the text argument at this position
    LikeTableArg(usize),
}

/// Function implementation
#[derive(Clone)]
pub enum FunctionBody {
    /// Called once per row, returns one value
    Scalar {
        /// Result type
        returns: DataType,
        /// Implementation
        body: ScalarFn,
    },
    /// Called once per scan, returns rows
    SetReturning {
        /// Result shape
        columns: ResultColumns,
        /// Implementation
        body: SetReturningFn,
    },
}

/// A function to register with the engine
#[derive(Clone)]
pub struct FunctionDef {
    /// SQL-visible name
    pub name: String,
    /// Argument types; the arity is part of the function's identity
    pub arg_types: Vec<DataType>,
    /// Implementation
    pub body: FunctionBody,
}

impl FunctionDef {
    /// Define a scalar function
    pub fn scalar(
        name: impl Into<String>,
        arg_types: Vec<DataType>,
        returns: DataType,
        body: ScalarFn,
    ) -> Self {
        FunctionDef {
            name: name.into(),
            arg_types,
            body: FunctionBody::Scalar { returns, body },
        }
    }

    /// Define a set-returning function
    pub fn set_returning(
        name: impl Into<String>,
        arg_types: Vec<DataType>,
        columns: ResultColumns,
        body: SetReturningFn,
    ) -> Self {
        FunctionDef {
            name: name.into(),
            arg_types,
            body: FunctionBody::SetReturning { columns, body },
        }
    }

    /// Number of arguments
    pub fn arity(&self) -> usize {
        self.arg_types.len()
    }

    /// True for set-returning functions
    pub fn is_set_returning(&self) -> bool {
        matches!(self.body, FunctionBody::SetReturning { .. })
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("arg_types", &self.arg_types)
            .field("set_returning", &self.is_set_returning())
            .finish()
    }
}

// ============================================================================
// Host
// ============================================================================

/// The engine as seen by a loaded module
pub trait Host: Spi + TableAccess {
    /// Executor hook slots
    fn hooks(&self) -> &HookSlots;

    /// The engine's own start routine, run at the end of the start chain
    fn standard_executor_start(&self, qd: &mut QueryDesc, flags: ExecutorFlags) -> Result<()>;

    /// The engine's own end routine, run at the end of the end chain
    fn standard_executor_end(&self, qd: &mut QueryDesc) -> Result<()>;

    /// Snapshot of the currently running statement
    fn active_snapshot(&self) -> Result<Snapshot>;

    /// Register (or replace the body of) a function; returns its identity
    fn define_function(&self, def: FunctionDef) -> Result<FunctionId>;

    /// Identity of the function `name` taking `arity` arguments
    fn lookup_function(&self, name: &str, arity: usize) -> Option<FunctionId>;
}
