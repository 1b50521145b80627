//! The `snapshot(table_name text, boundary integer)` table function
//!
//! `SELECT * FROM snapshot('orders', 105)` returns the rows of `orders`
//! visible at boundary 105, whatever the marker scanner does. It goes
//! through [`TableAccess`] only: open, scan under a narrowed copy of the
//! active snapshot, collect.

use std::sync::Arc;

use tempora_core::{
    DataType, Datum, Error, FunctionDef, Host, LockMode, ResultColumns, Result, Row,
    ScanDirection, ScanFlags, SetReturningFn, TableAccess,
};
use tracing::debug;

use crate::marker::decode_boundary;

/// Rows of `table_name` visible at `boundary`
pub fn scan_as_of(host: &dyn Host, table_name: &str, boundary: &Datum) -> Result<Vec<Row>> {
    let boundary = decode_boundary(boundary)?;
    let table = host.open_table(table_name, LockMode::AccessShare)?;
    let snapshot = host.active_snapshot()?.as_of(boundary);
    let mut scan = host.begin_scan(&table, snapshot, ScanFlags::default())?;

    let mut rows = Vec::new();
    while let Some(row) = host.next_row(&mut scan, ScanDirection::Forward)? {
        rows.push(row);
    }
    debug!(
        target: "tempora::timetravel",
        table = %table.name,
        %boundary,
        rows = rows.len(),
        "table read as of boundary"
    );
    Ok(rows)
}

/// Definition of the table function, registered under `name`
pub fn table_function(name: &str) -> FunctionDef {
    let body: SetReturningFn =
        Arc::new(|host: &dyn Host, args: &[Datum]| -> Result<Vec<Row>> {
            match args {
                [Datum::Text(table), boundary] => scan_as_of(host, table, boundary),
                [Datum::Null, _] => Err(Error::invalid_input("table name must not be NULL")),
                [other, _] => Err(Error::type_mismatch("text", other.type_name())),
                _ => Err(Error::internal(format!(
                    "snapshot table function called with {} arguments",
                    args.len()
                ))),
            }
        });
    FunctionDef::set_returning(
        name,
        vec![DataType::Text, DataType::Integer],
        ResultColumns::LikeTableArg(0),
        body,
    )
}
