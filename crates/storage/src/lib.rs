//! Storage layer for Tempora
//!
//! This crate implements the heap backend with:
//! - HeapTable: append-only vector of row versions behind an RwLock
//! - HeapStore: DashMap catalog of tables, by id and by name
//!
//! Storage knows nothing about commit status. Each version carries the ids
//! of its inserting and deleting transactions; callers decide visibility
//! by passing a predicate over those ids.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod heap;
pub mod store;

pub use heap::{HeapTable, TupleVersion};
pub use store::HeapStore;
