//! SQL Integration Tests
//!
//! Validates statement execution end to end:
//! - SELECT with filters, projections and comma joins
//! - INSERT / DELETE with row-version visibility
//! - Transaction blocks across sessions
//! - Historical reads under an explicit snapshot
//! - EXPLAIN output and table functions

use std::sync::Arc;

use tempora_core::{
    Column, DataType, Datum, FunctionDef, Host, Result, ResultColumns, Row, SetReturningFn,
    Snapshot, TxnId,
};
use tempora_engine::{Backend, Database, EngineConfig};

fn setup() -> (Arc<Database>, Backend) {
    let db = Database::new(EngineConfig::default()).unwrap();
    let s = db.connect();
    s.execute("CREATE TABLE orders (id integer, item text, qty integer)")
        .unwrap();
    s.execute("CREATE TABLE customers (id integer, name text)")
        .unwrap();
    (db, s)
}

fn ints(rows: &[Row]) -> Vec<i64> {
    rows.iter().map(|r| r[0].as_int().unwrap()).collect()
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_select_filter_and_projection() {
    let (_db, s) = setup();
    s.execute("INSERT INTO orders VALUES (1, 'pen', 3), (2, 'ink', 10), (3, 'pad', NULL)")
        .unwrap();

    let out = s
        .execute("SELECT id, qty * 2 AS twice FROM orders WHERE qty > 2")
        .unwrap();
    assert_eq!(out.columns, vec!["id", "twice"]);
    assert_eq!(
        out.rows,
        vec![
            vec![Datum::Int(1), Datum::Int(6)],
            vec![Datum::Int(2), Datum::Int(20)],
        ]
    );

    let nulls = s.execute("SELECT item FROM orders WHERE qty IS NULL").unwrap();
    assert_eq!(nulls.rows, vec![vec![Datum::Text("pad".into())]]);
}

#[test]
fn test_select_without_from() {
    let (_db, s) = setup();
    let out = s.execute("SELECT 1 + 2, upper('x')").unwrap();
    assert_eq!(out.columns, vec!["?column?", "upper"]);
    assert_eq!(out.rows, vec![vec![Datum::Int(3), Datum::Text("X".into())]]);
}

#[test]
fn test_comma_join() {
    let (_db, s) = setup();
    s.execute("INSERT INTO orders VALUES (1, 'pen', 3), (2, 'ink', 10)")
        .unwrap();
    s.execute("INSERT INTO customers VALUES (1, 'ada'), (2, 'bob'), (3, 'cy')")
        .unwrap();

    let out = s
        .execute("SELECT o.item, c.name FROM orders o, customers c WHERE o.id = c.id")
        .unwrap();
    assert_eq!(
        out.rows,
        vec![
            vec![Datum::Text("pen".into()), Datum::Text("ada".into())],
            vec![Datum::Text("ink".into()), Datum::Text("bob".into())],
        ]
    );

    let all = s.execute("SELECT * FROM orders, customers").unwrap();
    assert_eq!(all.rows.len(), 6);
    assert_eq!(all.columns.len(), 5);
}

#[test]
fn test_delete_hides_rows() {
    let (_db, s) = setup();
    s.execute("INSERT INTO orders VALUES (1, 'pen', 3), (2, 'ink', 10)")
        .unwrap();
    let del = s.execute("DELETE FROM orders WHERE id = 1").unwrap();
    assert_eq!(del.processed, 1);
    let out = s.execute("SELECT id FROM orders").unwrap();
    assert_eq!(ints(&out.rows), vec![2]);
}

#[test]
fn test_errors_are_reported() {
    let (_db, s) = setup();
    assert!(s.execute("SELECT * FROM missing").is_err());
    assert!(s.execute("SELECT nope FROM orders").is_err());
    assert!(s.execute("INSERT INTO orders VALUES ('x', 'pen', 1)").is_err());
    assert!(s.execute("CREATE TABLE orders (id integer)").is_err());
    assert!(s.execute("CREATE TABLE IF NOT EXISTS orders (id integer)").is_ok());
    assert!(s.execute("SELEC 1").is_err());
}

// ============================================================================
// Visibility
// ============================================================================

#[test]
fn test_uncommitted_rows_invisible_to_other_sessions() {
    let (db, a) = setup();
    let b = db.connect();

    a.execute("BEGIN").unwrap();
    a.execute("INSERT INTO orders VALUES (1, 'pen', 3)").unwrap();
    assert_eq!(a.execute("SELECT id FROM orders").unwrap().rows.len(), 1);
    assert!(b.execute("SELECT id FROM orders").unwrap().rows.is_empty());

    a.execute("COMMIT").unwrap();
    assert_eq!(b.execute("SELECT id FROM orders").unwrap().rows.len(), 1);
}

#[test]
fn test_concurrent_delete_conflict() {
    let (db, a) = setup();
    let b = db.connect();
    a.execute("INSERT INTO orders VALUES (1, 'pen', 3)").unwrap();

    a.execute("BEGIN").unwrap();
    a.execute("DELETE FROM orders WHERE id = 1").unwrap();
    let err = b.execute("DELETE FROM orders WHERE id = 1").unwrap_err();
    assert!(err.to_string().contains("concurrent"));

    a.execute("ROLLBACK").unwrap();
    assert_eq!(b.execute("DELETE FROM orders WHERE id = 1").unwrap().processed, 1);
}

#[test]
fn test_historical_read_under_override() {
    let (db, s) = setup();
    db.advance_xid_to(TxnId::new(100));
    s.execute("INSERT INTO orders VALUES (1, 'pen', 3)").unwrap();
    db.advance_xid_to(TxnId::new(110));
    s.execute("INSERT INTO orders VALUES (2, 'ink', 10)").unwrap();
    db.advance_xid_to(TxnId::new(120));
    s.execute("DELETE FROM orders WHERE id = 1").unwrap();

    s.set_snapshot_override(Some(Snapshot::at(TxnId::new(105))));
    assert_eq!(ints(&s.execute("SELECT id FROM orders").unwrap().rows), vec![1]);

    s.set_snapshot_override(Some(Snapshot::at(TxnId::new(115))));
    assert_eq!(
        ints(&s.execute("SELECT id FROM orders").unwrap().rows),
        vec![1, 2]
    );

    s.set_snapshot_override(None);
    assert_eq!(ints(&s.execute("SELECT id FROM orders").unwrap().rows), vec![2]);
}

// ============================================================================
// EXPLAIN and table functions
// ============================================================================

#[test]
fn test_explain_describes_scans() {
    let (_db, s) = setup();
    s.set_snapshot_override(Some(Snapshot::at(TxnId::new(50))));
    let out = s
        .execute("EXPLAIN SELECT * FROM orders o, customers WHERE o.id = 1")
        .unwrap();
    assert_eq!(out.columns, vec!["QUERY PLAN"]);
    let lines: Vec<&str> = out.rows.iter().map(|r| r[0].as_text().unwrap()).collect();
    assert_eq!(lines[0], "Nested Loop");
    assert!(lines.contains(&"  ->  Seq Scan on orders o [50,50]"));
    assert!(lines.contains(&"  ->  Seq Scan on customers [50,50]"));
    assert_eq!(out.processed, 0);
}

#[test]
fn test_set_returning_function_in_from() {
    let (_db, s) = setup();
    let series: SetReturningFn = Arc::new(|_: &dyn Host, args: &[Datum]| -> Result<Vec<Row>> {
        let n = args[0].as_int().unwrap_or(0);
        Ok((1..=n).map(|i| vec![Datum::Int(i)]).collect())
    });
    s.define_function(FunctionDef::set_returning(
        "series",
        vec![DataType::Integer],
        ResultColumns::Fixed(vec![Column::new("n", DataType::Integer)]),
        series,
    ))
    .unwrap();

    let out = s.execute("SELECT n FROM series(4) WHERE n > 1").unwrap();
    assert_eq!(ints(&out.rows), vec![2, 3, 4]);

    s.execute("INSERT INTO customers VALUES (1, 'ada')").unwrap();
    let joined = s.execute("SELECT c.name, n FROM customers c, series(2)").unwrap();
    assert_eq!(joined.rows.len(), 2);
}

// ============================================================================
// Properties
// ============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// A read at boundary T sees exactly the rows committed below T
        #[test]
        fn prop_read_at_boundary_sees_earlier_commits(
            gaps in prop::collection::vec(1u32..20, 1..12),
            boundary in 3u32..250,
        ) {
            let (db, s) = setup();
            let mut xid = 3u32;
            let mut expected = Vec::new();
            for (i, gap) in gaps.iter().enumerate() {
                xid += gap;
                db.advance_xid_to(TxnId::new(xid));
                s.execute(&format!("INSERT INTO orders VALUES ({}, 'x', 1)", i)).unwrap();
                if xid < boundary {
                    expected.push(i as i64);
                }
            }
            s.set_snapshot_override(Some(Snapshot::at(TxnId::new(boundary))));
            let out = s.execute("SELECT id FROM orders").unwrap();
            prop_assert_eq!(ints(&out.rows), expected);
        }
    }
}
