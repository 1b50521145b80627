//! Snapshot Marker Tests
//!
//! A `snapshot(T)` call in the projection retargets the query's scans:
//! - Bounds are [T,T] before the first row is produced
//! - Rows match an unmarked query run under [T,T]
//! - Unmarked queries keep the live bounds
//! - Scope "first" retargets only the first scan of a join

use crate::common::*;

#[test]
fn marker_pins_scan_to_boundary() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    let result = t.query("SELECT snapshot(105) FROM orders");
    // only the row written at 100 is visible at 105
    assert_eq!(result.rows, vec![vec![Datum::Int(105)]]);
    assert_eq!(result.columns, vec!["snapshot"]);
}

#[test]
fn marked_rows_match_unmarked_query_at_boundary() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    let marked = t.query("SELECT id, item, snapshot(115) FROM orders");

    let plain = t.db.connect();
    plain.set_snapshot_override(Some(Snapshot::at(TxnId::new(115))));
    let reference = plain.execute("SELECT id, item, 115 FROM orders").unwrap();

    assert_eq!(marked.rows, reference.rows);
    assert_eq!(ids(&marked), vec![1, 2]);
}

#[test]
fn unmarked_query_keeps_live_bounds() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    assert_eq!(ids(&t.query("SELECT * FROM orders")), vec![1, 2, 3]);
    assert_eq!(
        t.records(),
        vec![record(120, 130, "SELECT * FROM orders")]
    );
}

#[test]
fn marker_in_nested_expression() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    let result = t.query("SELECT id + abs(snapshot(105)) FROM orders");
    assert_eq!(ids(&result), vec![106]);
}

#[test]
fn first_marker_wins() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    let result = t.query("SELECT snapshot(105), snapshot(115) FROM orders");
    assert_eq!(result.rows.len(), 1);
    assert_eq!(t.records()[0].lower, 105);
}

#[test]
fn marker_applies_to_filtered_scan() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    let result = t.query("SELECT id, snapshot(115) FROM orders WHERE item <> 'pen'");
    assert_eq!(ids(&result), vec![2]);
}

#[test]
fn boundary_beyond_live_bounds_reads_more() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    t.session
        .set_snapshot_override(Some(Snapshot::bounds(TxnId::new(105), TxnId::new(108)).unwrap()));
    assert_eq!(ids(&t.query("SELECT id FROM orders")), vec![1]);
    assert_eq!(ids(&t.query("SELECT id, snapshot(126) FROM orders")), vec![1, 2, 3]);
}

#[test]
fn bad_boundary_fails_query() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    let err = t.session.execute("SELECT snapshot(-1) FROM orders").unwrap_err();
    assert!(err.to_string().contains("-1"));
    // the failed query left no audit record
    assert!(t.records().is_empty());
}

#[test]
fn all_scans_scope_pins_every_scan() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    let result = t.query("SELECT a.id, b.id, snapshot(105) FROM orders a, orders b");
    assert_eq!(result.rows.len(), 1);
}

#[test]
fn first_scan_scope_pins_outer_scan_only() {
    let config = TimeTravelConfig {
        rewrite_scope: RewriteScope::FirstScan,
        ..TimeTravelConfig::default()
    };
    let (t, _tt) = TestSession::loaded(config);
    let result = t.query("SELECT a.id, b.id, snapshot(105) FROM orders a, orders b");
    // outer side at 105 sees one row, inner side keeps the live bounds
    assert_eq!(result.rows.len(), 3);
    assert!(result.rows.iter().all(|r| r[0] == Datum::Int(1)));
}

#[test]
fn explain_shows_rewritten_bounds() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    let out = t.query("EXPLAIN SELECT snapshot(105) FROM orders");
    let lines: Vec<&str> = out.rows.iter().map(|r| r[0].as_text().unwrap()).collect();
    assert_eq!(lines, vec!["Seq Scan on orders [105,105]"]);

    let out = t.query("EXPLAIN SELECT * FROM orders");
    assert_eq!(out.rows[0][0].as_text(), Some("Seq Scan on orders [120,130]"));
}

#[test]
fn time_travel_disabled_ignores_marker_name() {
    let config = TimeTravelConfig {
        time_travel_enabled: false,
        ..TimeTravelConfig::default()
    };
    let (t, _tt) = TestSession::loaded(config);
    let err = t.session.execute("SELECT snapshot(105) FROM orders").unwrap_err();
    assert!(err.to_string().contains("snapshot"));
}
