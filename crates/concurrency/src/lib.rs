//! Concurrency layer for Tempora
//!
//! This crate implements multi-version visibility:
//! - TransactionManager: xid allocation, commit log, snapshot construction
//! - Visibility: deciding whether a row version is seen by a snapshot
//!
//! Row versions carry the id of the transaction that inserted them and,
//! once deleted, the id of the deleting transaction. Whether a version is
//! visible depends only on those two ids, the commit log and the snapshot
//! the reader runs under.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod visibility;

pub use manager::{TransactionManager, TxnStatus};
pub use visibility::Visibility;
