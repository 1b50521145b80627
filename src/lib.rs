//! Tempora - executor-level audit logging and time-travel scans
//!
//! Tempora is an interception module for an MVCC query engine. Once
//! loaded into a session it records every completed query in an audit
//! table, and lets a query read the past by naming a transaction-id
//! boundary in its projection.
//!
//! # Quick Start
//!
//! ```ignore
//! use tempora::{AuditLog, Database, EngineConfig, TimeTravel, TimeTravelConfig};
//!
//! let db = Database::new(EngineConfig::default())?;
//! let session = db.connect();
//! let tt = TimeTravel::on_load(&session, TimeTravelConfig::default())?;
//!
//! session.execute("CREATE TABLE orders (id integer, item text)")?;
//! session.execute("SELECT snapshot(105), * FROM orders")?;
//! let records = AuditLog::read_all(&session)?;
//! ```
//!
//! # Architecture
//!
//! The shared vocabulary (snapshots, plan and execution-state trees, the
//! host traits) lives in `tempora-core`. `tempora-engine` is the reference
//! host engine and `tempora-timetravel` the module itself.

pub use tempora_core as core;
pub use tempora_engine::{Backend, Database, EngineConfig, QueryResult};
pub use tempora_timetravel::*;
