//! Module Lifecycle Tests
//!
//! Load and unload through `TimeTravel`, with and without other handlers
//! already chained into the session.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::common::*;
use tempora::core::{ExecutorFlags, ExecutorStartHook, Host, QueryDesc, Result};
use tempora::CONFIG_FILE_NAME;

#[test]
fn load_creates_table_and_installs_hooks() {
    let (t, tt) = TestSession::loaded(TimeTravelConfig::default());
    assert!(tt.registry().is_installed());
    assert!(t.session.hooks().executor_start().is_some());
    assert!(t.records().is_empty());
    assert_eq!(tt.config().audit_table, "audit_log");
}

#[test]
fn unload_restores_previous_handler() {
    let t = TestSession::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let prev: ExecutorStartHook = Arc::new(
        move |host: &dyn Host, qd: &mut QueryDesc, flags: ExecutorFlags| -> Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            host.standard_executor_start(qd, flags)
        },
    );
    t.session.hooks().set_executor_start(Some(Arc::clone(&prev)));

    let tt = TimeTravel::on_load(&t.session, TimeTravelConfig::default()).unwrap();
    t.query("SELECT * FROM orders");
    tt.on_unload(&t.session).unwrap();

    let head = t.session.hooks().executor_start().unwrap();
    assert!(Arc::ptr_eq(&head, &prev));
    assert!(t.session.hooks().executor_end().is_none());
    assert_eq!(t.session.spi_plan_count(), 0);

    let before = calls.load(Ordering::SeqCst);
    t.query("SELECT snapshot(105) FROM orders a");
    assert_eq!(calls.load(Ordering::SeqCst), before + 1);
}

#[test]
fn unloaded_marker_no_longer_rewrites() {
    let (t, tt) = TestSession::loaded(TimeTravelConfig::default());
    tt.on_unload(&t.session).unwrap();
    // the function stays defined and still returns its argument
    assert_eq!(ids(&t.query("SELECT id, snapshot(105) FROM orders")), vec![1, 2, 3]);
    assert!(t.records().is_empty());
}

#[test]
fn second_load_in_session_records_once() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    let again = TimeTravel::on_load(&t.session, TimeTravelConfig::default()).unwrap();
    assert!(!again.registry().is_installed());

    t.query("SELECT * FROM orders");
    t.query("SELECT snapshot(105) FROM orders");
    assert_eq!(
        t.records(),
        vec![
            record(120, 130, "SELECT * FROM orders"),
            record(105, 105, "SELECT snapshot(105) FROM orders"),
        ]
    );
}

#[test]
fn unload_twice_is_noop() {
    let (t, tt) = TestSession::loaded(TimeTravelConfig::default());
    tt.on_unload(&t.session).unwrap();
    tt.on_unload(&t.session).unwrap();
    assert!(!tt.registry().is_installed());
}

#[test]
fn reload_after_unload() {
    let (t, tt) = TestSession::loaded(TimeTravelConfig::default());
    t.query("SELECT * FROM orders");
    tt.on_unload(&t.session).unwrap();

    let tt = TimeTravel::on_load(&t.session, TimeTravelConfig::default()).unwrap();
    t.query("SELECT snapshot(105) FROM orders");
    tt.on_unload(&t.session).unwrap();

    let records = t.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1], record(105, 105, "SELECT snapshot(105) FROM orders"));
    assert_eq!(t.session.spi_prepare_count(), 2);
}

#[test]
fn modules_in_two_sessions_are_independent() {
    let (t, _tt) = TestSession::loaded(TimeTravelConfig::default());
    let other = t.db.connect();
    let other_tt = TimeTravel::on_load(&other, TimeTravelConfig::default()).unwrap();
    other.execute("SELECT * FROM orders").unwrap();
    t.query("SELECT * FROM orders");
    other_tt.on_unload(&other).unwrap();

    // both sessions append to the shared table
    assert_eq!(t.records().len(), 2);
    assert!(t.session.hooks().executor_start().is_some());
}

#[test]
fn invalid_config_rejected_at_load() {
    let t = TestSession::new();
    let config = TimeTravelConfig {
        audit_table: "Audit Log".to_string(),
        ..TimeTravelConfig::default()
    };
    assert!(TimeTravel::on_load(&t.session, config).is_err());
    assert!(t.session.hooks().executor_start().is_none());
}

#[test]
fn load_from_config_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "rewrite_scope = \"first\"\naudit_table = \"trail\"\n").unwrap();
    let config = TimeTravelConfig::from_file(&path).unwrap();

    let t = TestSession::new();
    let tt = TimeTravel::on_load(&t.session, config).unwrap();
    assert_eq!(tt.config().rewrite_scope, RewriteScope::FirstScan);
    t.query("SELECT * FROM orders");
    assert_eq!(AuditLog::read_table(&t.db.connect(), "trail").unwrap().len(), 1);
}
