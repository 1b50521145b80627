//! Audit logging
//!
//! Every completed query whose primary relation is not the audit table
//! leaves one record: the lower and upper bound of the snapshot it ran
//! under, and its exact source text.
//!
//! # Statement lifetime
//!
//! The insert is compiled on first use and kept, so later records only
//! execute it. The handle lives until [`AuditLogger::release`], which the
//! registry calls at uninstall. The cache lock is only held while reading
//! or storing the handle, never across a call into the engine.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use tempora_core::{
    DataType, Datum, Error, Host, QueryDesc, Result, RteKind, Spi, SpiConnection,
    StatementHandle,
};
use tracing::debug;

use crate::config::is_plain_name;

/// One audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Lower snapshot bound the query ran under
    pub lower: i64,
    /// Upper snapshot bound the query ran under
    pub upper: i64,
    /// Exact query text
    pub source_text: String,
}

/// Parameter types of the audit insert: lower, upper, source text
const INSERT_PARAM_TYPES: [DataType; 3] = [DataType::Integer, DataType::Integer, DataType::Text];

/// Appends audit records through a cached prepared insert
#[derive(Debug)]
pub struct AuditLogger {
    table: String,
    relation: String,
    insert_sql: String,
    statement: Mutex<Option<StatementHandle>>,
}

impl AuditLogger {
    /// Logger writing to `table`, optionally `public.`-qualified
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        let insert_sql = format!("INSERT INTO {} VALUES ($1, $2, $3)", table);
        let relation = table.strip_prefix("public.").unwrap_or(&table).to_string();
        AuditLogger {
            table,
            relation,
            insert_sql,
            statement: Mutex::new(None),
        }
    }

    /// Audit table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Cached insert statement, if it was prepared
    pub fn cached_statement(&self) -> Option<StatementHandle> {
        *self.statement.lock()
    }

    /// True unless `qd` reads or writes the audit table as its primary relation
    pub fn should_log(&self, qd: &QueryDesc) -> bool {
        match qd.plan.primary_relation() {
            Some(rte) if matches!(rte.kind, RteKind::Relation(_)) => rte.name != self.relation,
            _ => true,
        }
    }

    /// Record `qd`, unless it targets the audit table
    ///
    /// Returns whether a record was written.
    ///
    /// # Errors
    ///
    /// Connect, prepare and execute failures are returned unchanged.
    pub fn log(&self, host: &dyn Host, qd: &QueryDesc) -> Result<bool> {
        if !self.should_log(qd) {
            return Ok(false);
        }
        let snapshot = qd.effective_snapshot();
        let params = [
            Datum::Int(snapshot.xmin().into()),
            Datum::Int(snapshot.xmax().into()),
            Datum::Text(qd.source_text.clone()),
        ];
        let conn = host.connect()?;
        let handle = self.statement(host, &conn)?;
        host.execute_prepared(&conn, handle, &params, false, 0)?;
        debug!(
            target: "tempora::timetravel",
            lower = %snapshot.xmin(),
            upper = %snapshot.xmax(),
            source_text = %qd.source_text,
            "audit record"
        );
        Ok(true)
    }

    fn statement(&self, host: &dyn Host, conn: &SpiConnection<'_>) -> Result<StatementHandle> {
        if let Some(handle) = *self.statement.lock() {
            return Ok(handle);
        }
        let handle = host.prepare(conn, &self.insert_sql, &INSERT_PARAM_TYPES)?;
        host.keep(handle)?;
        let mut slot = self.statement.lock();
        match *slot {
            Some(existing) => {
                drop(slot);
                host.free(handle)?;
                Ok(existing)
            }
            None => {
                *slot = Some(handle);
                debug!(target: "tempora::timetravel", handle = handle.0, "audit insert prepared");
                Ok(handle)
            }
        }
    }

    /// Free the cached insert statement, if any
    pub fn release(&self, host: &dyn Host) -> Result<()> {
        let handle = self.statement.lock().take();
        if let Some(handle) = handle {
            host.free(handle)?;
            debug!(target: "tempora::timetravel", handle = handle.0, "audit insert released");
        }
        Ok(())
    }
}

/// Reading the audit table back
pub struct AuditLog;

impl AuditLog {
    /// All records of the default audit table, in insertion order
    pub fn read_all(host: &dyn Host) -> Result<Vec<AuditRecord>> {
        Self::read_table(host, crate::config::DEFAULT_AUDIT_TABLE)
    }

    /// All records of audit table `table`, in insertion order
    ///
    /// # Errors
    ///
    /// Returns an error if `table` is not a plain lower-case table name,
    /// or if the read fails.
    pub fn read_table(host: &dyn Host, table: &str) -> Result<Vec<AuditRecord>> {
        if !is_plain_name(table) {
            return Err(Error::invalid_input(format!(
                "'{}' is not a plain lower-case table name",
                table
            )));
        }
        let conn = host.connect()?;
        let sql = format!("SELECT lower_bound, upper_bound, source_text FROM {}", table);
        let result = host.execute(&conn, &sql, true, 0)?;
        result.rows.iter().map(|row| decode_record(row)).collect()
    }
}

fn decode_record(row: &[Datum]) -> Result<AuditRecord> {
    match row {
        [Datum::Int(lower), Datum::Int(upper), Datum::Text(source_text)] => Ok(AuditRecord {
            lower: *lower,
            upper: *upper,
            source_text: source_text.clone(),
        }),
        _ => Err(Error::internal(format!("malformed audit row: {:?}", row))),
    }
}
