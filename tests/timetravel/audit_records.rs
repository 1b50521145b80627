//! Audit Record Tests
//!
//! Every completed query outside the audit table leaves exactly one record
//! with the bounds its scans used and its exact text. The insert behind
//! the records is compiled once per module lifetime.

use crate::common::*;

#[test]
fn marked_query_records_rewritten_bounds() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    t.query("SELECT snapshot(105) FROM orders");
    assert_eq!(
        t.records(),
        vec![record(105, 105, "SELECT snapshot(105) FROM orders")]
    );
}

#[test]
fn one_record_per_query_in_order() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    let queries = [
        "SELECT * FROM orders",
        "SELECT id, snapshot(110) FROM orders",
        "SELECT 1 + 2",
        "INSERT INTO orders VALUES (4, 'pad')",
    ];
    for sql in queries {
        t.query(sql);
    }
    let records = t.records();
    let texts: Vec<&str> = records.iter().map(|r| r.source_text.as_str()).collect();
    assert_eq!(texts, queries.to_vec());
    assert_eq!((records[1].lower, records[1].upper), (110, 110));
    assert_eq!((records[3].lower, records[3].upper), (120, 130));
}

#[test]
fn audit_table_queries_are_not_recorded() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    t.query("SELECT * FROM orders");
    t.session.set_snapshot_override(None);
    assert_eq!(t.query("SELECT * FROM audit_log").rows.len(), 1);
    t.query("SELECT source_text FROM audit_log a WHERE a.lower_bound = 120");
    t.query("DELETE FROM audit_log WHERE lower_bound = 0");
    assert_eq!(t.records().len(), 1);
}

#[test]
fn insert_compiled_once() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    assert_eq!(t.session.spi_prepare_count(), 0);
    for i in 0..10 {
        t.query(&format!("SELECT id, snapshot({}) FROM orders", 100 + i));
    }
    t.query("SELECT * FROM orders");
    assert_eq!(t.session.spi_prepare_count(), 1);
    assert_eq!(t.session.spi_plan_count(), 1);
    assert_eq!(t.records().len(), 11);
}

#[test]
fn failed_query_leaves_no_record() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    assert!(t.session.execute("SELECT nope FROM orders").is_err());
    assert!(t.session.execute("SELECT * FROM missing").is_err());
    assert!(t.records().is_empty());
}

#[test]
fn records_inside_transaction_block_follow_it() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    t.query("BEGIN");
    t.query("SELECT * FROM orders");
    assert!(t.records().is_empty());
    t.query("ROLLBACK");
    assert!(t.records().is_empty());

    t.query("BEGIN");
    t.query("SELECT * FROM orders");
    t.query("COMMIT");
    assert_eq!(t.records().len(), 1);
}

#[test]
fn audit_disabled_writes_nothing() {
    let config = TimeTravelConfig {
        audit_enabled: false,
        ..TimeTravelConfig::default()
    };
    let (t, _tt) = TestSession::loaded(config);
    assert_eq!(ids(&t.query("SELECT id, snapshot(105) FROM orders")), vec![1]);
    assert_eq!(t.session.spi_prepare_count(), 0);
    // audit_enabled = false also skips creating the table
    assert!(AuditLog::read_all(&t.db.connect()).is_err());
}

#[test]
fn custom_audit_table() {
    let config = TimeTravelConfig {
        audit_table: "public.trail".to_string(),
        ..TimeTravelConfig::default()
    };
    let (t, _tt) = TestSession::loaded(config);
    t.query("SELECT * FROM orders");
    t.query("SELECT * FROM trail");
    let records = AuditLog::read_table(&t.db.connect(), "trail").unwrap();
    assert_eq!(records, vec![record(120, 130, "SELECT * FROM orders")]);
}

#[test]
fn records_serialize_to_json() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    t.query("SELECT snapshot(105) FROM orders");
    let json = serde_json::to_value(&t.records()).unwrap();
    assert_eq!(json[0]["lower"], 105);
    assert_eq!(json[0]["source_text"], "SELECT snapshot(105) FROM orders");
}
