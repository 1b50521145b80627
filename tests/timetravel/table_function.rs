//! Snapshot Table Function Tests
//!
//! `snapshot(table_name, T)` in FROM reads one table as of boundary T.

use crate::common::*;

#[test]
fn reads_table_as_of_boundary() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    assert_eq!(ids(&t.query("SELECT * FROM snapshot('orders', 105)")), vec![1]);
    assert_eq!(ids(&t.query("SELECT id FROM snapshot('orders', 115)")), vec![1, 2]);
    assert_eq!(
        ids(&t.query("SELECT id FROM snapshot('public.orders', 200)")),
        vec![1, 2, 3]
    );
}

#[test]
fn result_columns_follow_table() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    let result = t.query("SELECT * FROM snapshot('orders', 105)");
    assert_eq!(result.columns, vec!["id", "item"]);
    assert_eq!(result.rows, vec![vec![Datum::Int(1), Datum::Text("pen".into())]]);
}

#[test]
fn deleted_rows_reappear_in_the_past() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    t.session.set_snapshot_override(None);
    t.db.advance_xid_to(TxnId::new(140));
    t.query("DELETE FROM orders WHERE id = 1");
    assert_eq!(ids(&t.query("SELECT id FROM orders")), vec![2, 3]);
    assert_eq!(ids(&t.query("SELECT id FROM snapshot('orders', 130)")), vec![1, 2, 3]);
}

#[test]
fn joins_with_live_table() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    let result = t.query("SELECT o.id FROM orders o, snapshot('orders', 105) p WHERE o.id = p.id");
    assert_eq!(ids(&result), vec![1]);
}

#[test]
fn recorded_with_live_bounds() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    t.query("SELECT * FROM snapshot('orders', 105)");
    assert_eq!(
        t.records(),
        vec![record(120, 130, "SELECT * FROM snapshot('orders', 105)")]
    );
}

#[test]
fn unknown_table_and_bad_boundary() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    let err = t.session.execute("SELECT * FROM snapshot('nope', 105)").unwrap_err();
    assert!(err.to_string().contains("nope"));
    let err = t.session.execute("SELECT * FROM snapshot('orders', -4)").unwrap_err();
    assert!(err.to_string().contains("-4"));
}
