//! Core types and traits for Tempora
//!
//! This crate defines the vocabulary shared by the host engine and the
//! interception modules loaded into it:
//! - TxnId, Snapshot: transaction identifiers and visibility bounds
//! - Datum, DataType, Column: the value model
//! - Expr, Plan, PlannedStmt: the read-only plan tree produced by planning
//! - ExecState, PlanState, ScanState: the mutable execution-state tree
//! - QueryDesc: everything the executor hooks get to see about a query
//! - HookSlots: the executor start/end interception chain
//! - Host, Spi, TableAccess: the services an engine offers to modules
//! - Error: the engine-wide error channel

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod exec;
pub mod expr;
pub mod hooks;
pub mod host;
pub mod plan;
pub mod query;
pub mod snapshot;
pub mod types;

pub use error::{Error, Result};
pub use exec::{ExecState, FunctionScanState, PlanState, PlanStateKind, ScanState};
pub use expr::{BinaryOp, Expr, TargetEntry, UnaryOp};
pub use hooks::{ExecutorEndHook, ExecutorFlags, ExecutorStartHook, HookSlots};
pub use host::{
    FunctionBody, FunctionDef, Host, LockMode, ResultColumns, ScalarFn, ScanDirection, ScanFlags,
    ScanHandle, SetReturningFn, Spi, SpiConnection, SpiResult, StatementHandle, TableAccess,
    TableHandle,
};
pub use plan::{CmdType, Plan, PlanKind, PlannedStmt, RangeTblEntry, RteKind};
pub use query::QueryDesc;
pub use snapshot::Snapshot;
pub use types::{Column, DataType, Datum, FunctionId, Row, TableDef, TableId, TxnId};
