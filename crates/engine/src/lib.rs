//! Reference query engine for Tempora
//!
//! This crate hosts the interception modules:
//! - Database: shared catalogs, heap store and transaction manager
//! - Backend: one session, with its own hook slots, SPI state and
//!   transaction
//! - Planner: SQL text to plan trees (sqlparser, PostgreSQL dialect)
//! - Executor: pulls tuples through the plan under per-scan snapshots
//!
//! The engine is the only component that knows about:
//! - Transaction ids and the commit log
//! - Row-version visibility
//! - How SQL text becomes a plan

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod catalog;
pub mod database;
pub mod eval;
mod executor;
pub mod planner;
mod spi;

pub use backend::{Backend, QueryResult};
pub use catalog::FunctionCatalog;
pub use database::{Database, EngineConfig, CONFIG_FILE_NAME};
pub use planner::{Planned, Planner, Utility};
