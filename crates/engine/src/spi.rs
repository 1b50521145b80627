//! Server programming interface
//!
//! SQL issued from inside the engine: by hooks, table functions and module
//! load routines. Statements run through the same executor path as client
//! statements, hooks included.
//!
//! # Plan lifetime
//!
//! A plan prepared under connection depth `n` is released when that
//! connection closes, unless it was kept. Kept plans live until they are
//! freed or the session ends.
//!
//! # Transactions
//!
//! SPI work joins the session's current transaction. When SPI is used
//! outside any running statement and outside a transaction block, each
//! execution commits (or aborts) on its own like a client statement.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tempora_core::{
    CmdType, DataType, Datum, Error, PlannedStmt, Result, Spi, SpiConnection, SpiResult,
    StatementHandle,
};
use tracing::{debug, trace};

use crate::backend::{Backend, QueryResult};
use crate::planner::{Planned, Planner, Utility};

#[derive(Debug)]
struct SpiPlan {
    source: String,
    stmt: Arc<PlannedStmt>,
    depth: usize,
    kept: bool,
}

/// Per-session SPI bookkeeping
#[derive(Debug, Default)]
pub(crate) struct SpiState {
    depth: AtomicUsize,
    plans: Mutex<FxHashMap<StatementHandle, SpiPlan>>,
    next_handle: AtomicU64,
    prepares: AtomicU64,
}

impl Backend {
    /// Number of statements compiled through SPI in this session
    pub fn spi_prepare_count(&self) -> u64 {
        self.spi.prepares.load(Ordering::Relaxed)
    }

    /// Number of prepared statements currently held
    pub fn spi_plan_count(&self) -> usize {
        self.spi.plans.lock().len()
    }

    fn check_connection(&self, conn: &SpiConnection<'_>) -> Result<()> {
        let depth = self.spi.depth.load(Ordering::Acquire);
        if conn.depth() == 0 || conn.depth() > depth {
            return Err(Error::spi(format!(
                "connection {} is not open (current depth {})",
                conn.depth(),
                depth
            )));
        }
        Ok(())
    }

    /// Run a planned statement for SPI and end its transaction if it owns one
    fn spi_run(
        &self,
        source: &str,
        stmt: Arc<PlannedStmt>,
        params: Vec<Datum>,
        read_only: bool,
        row_limit: usize,
    ) -> Result<SpiResult> {
        if read_only && stmt.command != CmdType::Select {
            return Err(Error::spi(format!(
                "{:?} is not allowed in a read-only execution",
                stmt.command
            )));
        }
        let outermost = self.is_idle() && !self.in_transaction_block();
        let result = self.spi_query(source, stmt, params, read_only, row_limit);
        if outermost {
            self.finish_statement(result.is_ok())?;
        }
        let out = result?;
        Ok(SpiResult {
            processed: out.processed,
            columns: out.columns,
            rows: out.rows,
        })
    }

    fn spi_query(
        &self,
        source: &str,
        stmt: Arc<PlannedStmt>,
        params: Vec<Datum>,
        read_only: bool,
        row_limit: usize,
    ) -> Result<QueryResult> {
        let snapshot = if read_only {
            match tempora_core::Host::active_snapshot(self) {
                Ok(snapshot) => snapshot,
                Err(_) => self.statement_snapshot()?,
            }
        } else {
            self.statement_snapshot()?
        };
        self.run_planned(source, stmt, params, snapshot, false, row_limit)
    }
}

impl Spi for Backend {
    fn connect(&self) -> Result<SpiConnection<'_>> {
        let max = self.database().config().max_spi_depth;
        let depth = self.spi.depth.fetch_add(1, Ordering::AcqRel) + 1;
        if depth > max {
            self.spi.depth.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::spi(format!(
                "SPI connections nested deeper than {}",
                max
            )));
        }
        trace!(target: "tempora::spi", backend = self.id(), depth, "connect");
        Ok(SpiConnection::new(self, depth))
    }

    fn disconnect(&self, depth: usize) {
        let mut plans = self.spi.plans.lock();
        let before = plans.len();
        plans.retain(|_, plan| plan.kept || plan.depth < depth);
        let freed = before - plans.len();
        drop(plans);
        self.spi.depth.fetch_sub(1, Ordering::AcqRel);
        trace!(target: "tempora::spi", backend = self.id(), depth, freed, "disconnect");
    }

    fn prepare(
        &self,
        conn: &SpiConnection<'_>,
        sql: &str,
        param_types: &[DataType],
    ) -> Result<StatementHandle> {
        self.check_connection(conn)?;
        let db = self.database();
        let planned = Planner::new(db.store(), db.functions(), param_types).plan(sql)?;
        let stmt = match planned {
            Planned::Query {
                stmt,
                explain: false,
            } => stmt,
            _ => {
                return Err(Error::spi(format!(
                    "cannot prepare utility statement: {}",
                    sql
                )))
            }
        };
        self.spi.prepares.fetch_add(1, Ordering::Relaxed);
        let handle = StatementHandle(self.spi.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        self.spi.plans.lock().insert(
            handle,
            SpiPlan {
                source: sql.to_string(),
                stmt: Arc::new(stmt),
                depth: conn.depth(),
                kept: false,
            },
        );
        debug!(target: "tempora::spi", backend = self.id(), handle = handle.0, sql, "prepared");
        Ok(handle)
    }

    fn keep(&self, handle: StatementHandle) -> Result<()> {
        let mut plans = self.spi.plans.lock();
        let plan = plans
            .get_mut(&handle)
            .ok_or_else(|| Error::spi(format!("unknown statement handle {}", handle.0)))?;
        plan.kept = true;
        Ok(())
    }

    fn execute_prepared(
        &self,
        conn: &SpiConnection<'_>,
        handle: StatementHandle,
        params: &[Datum],
        read_only: bool,
        row_limit: usize,
    ) -> Result<SpiResult> {
        self.check_connection(conn)?;
        let (source, stmt) = {
            let plans = self.spi.plans.lock();
            let plan = plans
                .get(&handle)
                .ok_or_else(|| Error::spi(format!("unknown statement handle {}", handle.0)))?;
            (plan.source.clone(), Arc::clone(&plan.stmt))
        };
        if params.len() != stmt.param_types.len() {
            return Err(Error::spi(format!(
                "statement expects {} parameter(s), got {}",
                stmt.param_types.len(),
                params.len()
            )));
        }
        for (value, ty) in params.iter().zip(&stmt.param_types) {
            value.check_type(*ty)?;
        }
        self.spi_run(&source, stmt, params.to_vec(), read_only, row_limit)
    }

    fn execute(
        &self,
        conn: &SpiConnection<'_>,
        sql: &str,
        read_only: bool,
        row_limit: usize,
    ) -> Result<SpiResult> {
        self.check_connection(conn)?;
        let db = self.database();
        match Planner::new(db.store(), db.functions(), &[]).plan(sql)? {
            Planned::Query {
                stmt,
                explain: false,
            } => self.spi_run(sql, Arc::new(stmt), Vec::new(), read_only, row_limit),
            Planned::Query { explain: true, .. } => {
                Err(Error::spi("EXPLAIN is not supported through SPI"))
            }
            Planned::Utility(utility @ Utility::CreateTable { .. }) => {
                if read_only {
                    return Err(Error::spi("CREATE TABLE is not allowed in a read-only execution"));
                }
                self.run_utility(utility)?;
                Ok(SpiResult::default())
            }
            Planned::Utility(_) => Err(Error::spi(
                "transaction control is not allowed through SPI",
            )),
        }
    }

    fn free(&self, handle: StatementHandle) -> Result<()> {
        self.spi
            .plans
            .lock()
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| Error::spi(format!("unknown statement handle {}", handle.0)))
    }
}
