//! Shared test utilities for the integration suites.
//!
//! Import via `mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::{Arc, Once};

pub use tempora::core::{Datum, Snapshot, TxnId};
pub use tempora::{
    AuditLog, AuditRecord, Backend, Database, EngineConfig, QueryResult, RewriteScope, TimeTravel,
    TimeTravelConfig,
};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Surface module logs when `RUST_LOG` is set.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        if std::env::var_os("RUST_LOG").is_some() {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        }
    });
}

// ============================================================================
// TestSession - a session with orders written at known transaction ids
// ============================================================================

/// Live snapshot used throughout: `[120,130]`.
pub fn live_snapshot() -> Snapshot {
    Snapshot::bounds(TxnId::new(120), TxnId::new(130)).unwrap()
}

/// A database holding `orders`, plus one session to query it.
///
/// Rows are written at xids 100 (`pen`), 110 (`ink`) and 125 (`cap`).
pub struct TestSession {
    pub db: Arc<Database>,
    pub session: Backend,
}

impl TestSession {
    /// Fixture without the module loaded.
    pub fn new() -> Self {
        init_tracing();
        let db = Database::new(EngineConfig::default()).unwrap();
        let session = db.connect();
        session
            .execute("CREATE TABLE orders (id integer, item text)")
            .unwrap();
        for (xid, id, item) in [(100, 1, "pen"), (110, 2, "ink"), (125, 3, "cap")] {
            db.advance_xid_to(TxnId::new(xid));
            session
                .execute(&format!("INSERT INTO orders VALUES ({}, '{}')", id, item))
                .unwrap();
        }
        TestSession { db, session }
    }

    /// Fixture with the module loaded under `config`, reading at `[120,130]`.
    pub fn loaded(config: TimeTravelConfig) -> (Self, TimeTravel) {
        let fixture = Self::new();
        let tt = TimeTravel::on_load(&fixture.session, config).unwrap();
        fixture.session.set_snapshot_override(Some(live_snapshot()));
        (fixture, tt)
    }

    /// Run `sql` in the fixture's session.
    pub fn query(&self, sql: &str) -> QueryResult {
        self.session.execute(sql).unwrap()
    }

    /// Audit records, read from a fresh session that sees every commit.
    pub fn records(&self) -> Vec<AuditRecord> {
        AuditLog::read_all(&self.db.connect()).unwrap()
    }
}

/// First column of every row, as integers.
pub fn ids(result: &QueryResult) -> Vec<i64> {
    result.rows.iter().map(|r| r[0].as_int().unwrap()).collect()
}

/// Shorthand for an expected audit record.
pub fn record(lower: i64, upper: i64, source_text: &str) -> AuditRecord {
    AuditRecord {
        lower,
        upper,
        source_text: source_text.to_string(),
    }
}
