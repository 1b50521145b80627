//! Sessions
//!
//! A [`Backend`] is one client session. It runs statements in autocommit
//! mode unless a `BEGIN` opened a transaction block, and it is the
//! [`Host`] modules see: hook slots, SPI, table access and function
//! registration all go through it.
//!
//! ## Query lifecycle
//!
//! ```text
//! 1. plan the statement and take the statement snapshot
//! 2. build the QueryDesc (execution-state tree included)
//! 3. start chain: installed start hook, or the standard start routine
//! 4. pull rows (skipped for EXPLAIN)
//! 5. end chain: installed end hook, or the standard end routine
//! 6. autocommit: commit on success, abort on any error
//! ```
//!
//! A failing step aborts the statement; the end chain does not run.
//!
//! ## Transaction ids
//!
//! Reading does not need a transaction id. One is assigned on the first
//! write and kept until the transaction ends.

use parking_lot::Mutex;
use std::sync::Arc;

use tempora_concurrency::Visibility;
use tempora_core::{
    Error, ExecutorFlags, FunctionDef, FunctionId, HookSlots, Host, LockMode, PlannedStmt,
    QueryDesc, Result, Row, ScanDirection, ScanFlags, ScanHandle, Snapshot, TableAccess,
    TableHandle, TableId, TxnId,
};
use tracing::{debug, trace, warn};

use crate::database::Database;
use crate::executor;
use crate::planner::{relation_name, Planned, Planner, Utility};
use crate::spi::SpiState;

/// Output of one statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Result column names (empty for writes and utility statements)
    pub columns: Vec<String>,
    /// Result rows
    pub rows: Vec<Row>,
    /// Rows returned, inserted or deleted
    pub processed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum BlockState {
    /// Autocommit: every statement is its own transaction
    #[default]
    Idle,
    /// Inside `BEGIN ... COMMIT`
    InBlock,
    /// A statement in the block failed; only `COMMIT`/`ROLLBACK` accepted
    Failed,
}

#[derive(Debug, Default)]
struct XactState {
    block: BlockState,
    xid: Option<TxnId>,
}

/// One client session
pub struct Backend {
    id: u32,
    db: Arc<Database>,
    hooks: HookSlots,
    xact: Mutex<XactState>,
    snapshot_override: Mutex<Option<Snapshot>>,
    active: Mutex<Vec<Snapshot>>,
    pub(crate) spi: SpiState,
}

/// Pops the active snapshot pushed for a running query
struct ActiveSnapshotGuard<'a> {
    backend: &'a Backend,
}

impl Drop for ActiveSnapshotGuard<'_> {
    fn drop(&mut self) {
        self.backend.active.lock().pop();
    }
}

impl Backend {
    pub(crate) fn new(id: u32, db: Arc<Database>) -> Self {
        Backend {
            id,
            db,
            hooks: HookSlots::new(),
            xact: Mutex::new(XactState::default()),
            snapshot_override: Mutex::new(None),
            active: Mutex::new(Vec::new()),
            spi: SpiState::default(),
        }
    }

    /// Session id
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The database this session belongs to
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Run every following statement under `snapshot` instead of a fresh one
    ///
    /// `None` goes back to taking a snapshot per statement.
    pub fn set_snapshot_override(&self, snapshot: Option<Snapshot>) {
        *self.snapshot_override.lock() = snapshot;
    }

    /// Transaction id of the current transaction, if one was assigned
    pub fn current_xid(&self) -> Option<TxnId> {
        self.xact.lock().xid
    }

    /// True inside `BEGIN ... COMMIT`
    pub fn in_transaction_block(&self) -> bool {
        self.xact.lock().block != BlockState::Idle
    }

    /// Transaction id of the current transaction, assigning one if needed
    pub(crate) fn assign_xid(&self) -> Result<TxnId> {
        let mut xact = self.xact.lock();
        if xact.block == BlockState::Failed {
            return Err(aborted_block());
        }
        if let Some(xid) = xact.xid {
            return Ok(xid);
        }
        let xid = self.db.transactions().begin()?;
        xact.xid = Some(xid);
        debug!(target: "tempora::engine", backend = self.id, %xid, "transaction id assigned");
        Ok(xid)
    }

    /// Snapshot for a new statement
    pub(crate) fn statement_snapshot(&self) -> Result<Snapshot> {
        if let Some(snapshot) = self.snapshot_override.lock().clone() {
            return Ok(snapshot);
        }
        self.db.transactions().take_snapshot()
    }

    /// True when no query is running in this session
    pub(crate) fn is_idle(&self) -> bool {
        self.active.lock().is_empty()
    }

    fn push_active_snapshot(&self, snapshot: Snapshot) -> ActiveSnapshotGuard<'_> {
        self.active.lock().push(snapshot);
        ActiveSnapshotGuard { backend: self }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Plan and run one SQL statement
    pub fn execute(&self, sql: &str) -> Result<QueryResult> {
        debug!(target: "tempora::engine", backend = self.id, sql, "statement");
        let result = self.execute_statement(sql);
        if let Err(e) = &result {
            debug!(target: "tempora::engine", backend = self.id, error = %e, "statement failed");
        }
        self.finish_statement(result.is_ok())?;
        result
    }

    fn execute_statement(&self, sql: &str) -> Result<QueryResult> {
        let planned = Planner::new(self.db.store(), self.db.functions(), &[]).plan(sql)?;
        let block = self.xact.lock().block;
        if block == BlockState::Failed
            && !matches!(
                planned,
                Planned::Utility(Utility::Commit) | Planned::Utility(Utility::Rollback)
            )
        {
            return Err(aborted_block());
        }
        match planned {
            Planned::Utility(utility) => self.run_utility(utility),
            Planned::Query { stmt, explain } => {
                let snapshot = self.statement_snapshot()?;
                self.run_planned(sql, Arc::new(stmt), Vec::new(), snapshot, explain, 0)
            }
        }
    }

    /// Run a utility statement
    pub(crate) fn run_utility(&self, utility: Utility) -> Result<QueryResult> {
        match utility {
            Utility::CreateTable { def, if_not_exists } => {
                self.db.store().create_table(def, if_not_exists)?;
            }
            Utility::Begin => {
                let mut xact = self.xact.lock();
                if xact.block == BlockState::Idle {
                    xact.block = BlockState::InBlock;
                } else {
                    warn!(target: "tempora::engine", backend = self.id, "there is already a transaction in progress");
                }
            }
            Utility::Commit | Utility::Rollback => {
                let mut xact = self.xact.lock();
                let commit = matches!(utility, Utility::Commit) && xact.block == BlockState::InBlock;
                if xact.block == BlockState::Idle {
                    warn!(target: "tempora::engine", backend = self.id, "there is no transaction in progress");
                }
                if let Some(xid) = xact.xid.take() {
                    if commit {
                        self.db.transactions().commit(xid)?;
                    } else {
                        self.db.transactions().abort(xid)?;
                    }
                }
                xact.block = BlockState::Idle;
            }
        }
        Ok(QueryResult::default())
    }

    /// Run a planned query through the full executor path
    pub(crate) fn run_planned(
        &self,
        source_text: &str,
        stmt: Arc<PlannedStmt>,
        params: Vec<tempora_core::Datum>,
        snapshot: Snapshot,
        explain: bool,
        row_limit: usize,
    ) -> Result<QueryResult> {
        let mut qd = QueryDesc::new(source_text, stmt, params, snapshot);
        let flags = ExecutorFlags {
            explain_only: explain,
        };
        let rows = self.run_query(&mut qd, flags, row_limit)?;
        let columns = if explain {
            vec!["QUERY PLAN".to_string()]
        } else {
            qd.plan.output_columns.clone()
        };
        Ok(QueryResult {
            columns,
            rows,
            processed: qd.processed,
        })
    }

    /// Drive `qd` through start chain, execution and end chain
    ///
    /// `row_limit == 0` means no limit. With `flags.explain_only` no rows
    /// are pulled and the plan description is returned instead.
    pub fn run_query(
        &self,
        qd: &mut QueryDesc,
        flags: ExecutorFlags,
        row_limit: usize,
    ) -> Result<Vec<Row>> {
        let _active = self.push_active_snapshot(qd.snapshot.clone());

        match self.hooks.executor_start() {
            Some(hook) => hook(self, qd, flags)?,
            None => self.standard_executor_start(qd, flags)?,
        }
        if !qd.estate.as_ref().is_some_and(|e| e.is_started()) {
            return Err(Error::executor(
                "executor start chain did not run the standard start routine",
            ));
        }

        let rows = if flags.explain_only {
            executor::explain(qd)
        } else {
            executor::run(self, qd, row_limit)?
        };

        match self.hooks.executor_end() {
            Some(hook) => hook(self, qd)?,
            None => self.standard_executor_end(qd)?,
        }
        if qd.estate.is_some() {
            warn!(target: "tempora::engine", backend = self.id, "executor end chain did not release the execution state");
        }
        Ok(rows)
    }

    /// End the statement's share of the transaction
    ///
    /// In autocommit mode the transaction ends with the statement. Inside
    /// a block a failure aborts the transaction and marks the block failed.
    pub(crate) fn finish_statement(&self, ok: bool) -> Result<()> {
        let mut xact = self.xact.lock();
        match (xact.block, ok) {
            (BlockState::Idle, _) => {
                if let Some(xid) = xact.xid.take() {
                    if ok {
                        self.db.transactions().commit(xid)?;
                        trace!(target: "tempora::engine", backend = self.id, %xid, "committed");
                    } else {
                        self.db.transactions().abort(xid)?;
                        trace!(target: "tempora::engine", backend = self.id, %xid, "aborted");
                    }
                }
            }
            (BlockState::InBlock, false) => {
                if let Some(xid) = xact.xid.take() {
                    self.db.transactions().abort(xid)?;
                }
                xact.block = BlockState::Failed;
            }
            (BlockState::InBlock, true) | (BlockState::Failed, _) => {}
        }
        Ok(())
    }

    // ========================================================================
    // Table helpers
    // ========================================================================

    /// Handle of table `id`
    pub(crate) fn table_handle(&self, id: TableId, lock: LockMode) -> Result<TableHandle> {
        let table = self
            .db
            .store()
            .get(id)
            .ok_or_else(|| Error::internal(format!("table {} vanished", id)))?;
        Ok(TableHandle {
            id,
            name: table.name().to_string(),
            columns: table.columns().to_vec(),
            lock,
        })
    }
}

fn aborted_block() -> Error {
    Error::Transaction(
        "current transaction is aborted, commands ignored until end of transaction block".into(),
    )
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("id", &self.id)
            .field("hooks", &self.hooks)
            .field("xact", &*self.xact.lock())
            .finish()
    }
}

// ============================================================================
// Host
// ============================================================================

impl Host for Backend {
    fn hooks(&self) -> &HookSlots {
        &self.hooks
    }

    fn standard_executor_start(&self, qd: &mut QueryDesc, flags: ExecutorFlags) -> Result<()> {
        let estate = qd
            .estate
            .as_mut()
            .ok_or_else(|| Error::executor("query has no execution state"))?;
        if estate.is_started() {
            return Err(Error::executor("executor already started"));
        }
        estate.mark_started();
        trace!(
            target: "tempora::engine",
            backend = self.id,
            snapshot = %estate.snapshot(),
            explain_only = flags.explain_only,
            "executor started"
        );
        Ok(())
    }

    fn standard_executor_end(&self, qd: &mut QueryDesc) -> Result<()> {
        let estate = qd
            .estate
            .take()
            .ok_or_else(|| Error::executor("executor already ended"))?;
        qd.processed = estate.processed;
        trace!(target: "tempora::engine", backend = self.id, processed = qd.processed, "executor ended");
        Ok(())
    }

    fn active_snapshot(&self) -> Result<Snapshot> {
        self.active
            .lock()
            .last()
            .cloned()
            .ok_or_else(|| Error::executor("no active snapshot"))
    }

    fn define_function(&self, def: FunctionDef) -> Result<FunctionId> {
        Ok(self.db.functions().define(def))
    }

    fn lookup_function(&self, name: &str, arity: usize) -> Option<FunctionId> {
        self.db.functions().lookup(name, arity)
    }
}

// ============================================================================
// Table access
// ============================================================================

impl TableAccess for Backend {
    fn open_table(&self, qualified_name: &str, lock: LockMode) -> Result<TableHandle> {
        let parts: Vec<String> = qualified_name
            .split('.')
            .map(|p| p.trim().to_lowercase())
            .collect();
        let name = relation_name(&parts)?;
        let table = self
            .db
            .store()
            .get_by_name(&name)
            .ok_or(Error::UndefinedTable(name))?;
        self.table_handle(table.id(), lock)
    }

    fn begin_scan(
        &self,
        table: &TableHandle,
        snapshot: Snapshot,
        flags: ScanFlags,
    ) -> Result<ScanHandle> {
        if self.db.store().get(table.id).is_none() {
            return Err(Error::UndefinedTable(table.name.clone()));
        }
        trace!(target: "tempora::engine", table = %table.name, %snapshot, "scan begins");
        Ok(ScanHandle::new(table.id, snapshot, flags))
    }

    fn next_row(&self, scan: &mut ScanHandle, direction: ScanDirection) -> Result<Option<Row>> {
        let table = self
            .db
            .store()
            .get(scan.table())
            .ok_or_else(|| Error::internal(format!("table {} vanished", scan.table())))?;
        let current = self.current_xid();
        let found = {
            let vis = Visibility::new(self.db.transactions(), scan.snapshot(), current, scan.flags());
            let visible = |xmin: TxnId, xmax: Option<TxnId>| vis.version_visible(xmin, xmax);
            match direction {
                ScanDirection::Forward => {
                    table.next_visible(scan.position().map_or(0, |p| p + 1), visible)
                }
                ScanDirection::Backward => {
                    table.prev_visible(scan.position().unwrap_or(usize::MAX), visible)
                }
            }
        };
        Ok(found.map(|(position, row)| {
            scan.set_position(position);
            row
        }))
    }
}
