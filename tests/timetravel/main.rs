#[path = "../common/mod.rs"]
mod common;

mod audit_records;
mod lifecycle;
mod snapshot_marker;
mod table_function;
