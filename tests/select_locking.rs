//! Locking, Cancellation and Configuration Tests
//!
//! - FOR UPDATE under multi-version locks rows, otherwise whole tables
//! - FOR UPDATE combinations that cannot lock precisely are rejected
//! - Cancel requests and statement deadlines stop a running query
//! - Settings load from a JSON file

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use aeroquery::config::DatabaseSettings;
use aeroquery::executor::{ExecutorErrorCode, Select};
use aeroquery::expression::{AggregateKind, CompareOp, Expression};
use aeroquery::index::{IndexType, SortType};
use aeroquery::table::{Column, Database, Session, Table, TableFilter};
use aeroquery::value::{DataType, Value};

fn accounts(db: &Arc<Database>) -> Arc<Table> {
    let table = db
        .create_table(
            "ACCOUNTS",
            vec![
                Column::new("ID", DataType::Int).not_null(),
                Column::new("OWNER", DataType::String),
                Column::new("BALANCE", DataType::Int),
            ],
            Some("ID"),
        )
        .unwrap();
    let session = db.create_session();
    for (id, owner, balance) in [(1, "ann", 100), (2, "bob", 50), (3, "ann", 25)] {
        table
            .insert(&session, vec![Value::Int(id), Value::from(owner), Value::Int(balance)])
            .unwrap();
    }
    session.commit().unwrap();
    table
}

fn for_update(session: &Arc<Session>, table: &Arc<Table>, expressions: Vec<Expression>) -> Select {
    let mut select = Select::new(Arc::clone(session));
    select.add_table_filter(TableFilter::new(Arc::clone(table), None), true);
    select.set_expressions(expressions);
    select.set_for_update(true);
    select
}

fn prepared(mut select: Select) -> Select {
    select.init().unwrap();
    select.prepare().unwrap();
    select
}

// =============================================================================
// FOR UPDATE Under Multi-Version Tests
// =============================================================================

#[test]
fn test_for_update_locks_selected_rows() {
    let db = Database::in_memory();
    let table = accounts(&db);
    let a = db.create_session();
    let b = db.create_session();

    let mut select = for_update(&a, &table, vec![Expression::column("BALANCE")]);
    select.add_condition(Expression::eq(Expression::column("ID"), Expression::literal(1)));
    let select = prepared(select);
    assert!(!select.is_read_only());
    assert!(select.plan_sql().ends_with("\nFOR UPDATE"));
    let rows = select.query(0, None).unwrap().unwrap().rows();
    assert_eq!(rows, vec![vec![Value::Int(100)]]);

    let locked = table.get_row(&b, 1).unwrap().unwrap();
    assert!(table.delete(&b, &locked).is_err());
    let untouched = table.get_row(&b, 2).unwrap().unwrap();
    assert!(table.delete(&b, &untouched).is_ok());
}

#[test]
fn test_for_update_rejects_imprecise_locking() {
    let db = Database::in_memory();
    let table = accounts(&db);
    let session = db.create_session();

    let quick = prepared(for_update(&session, &table, vec![Expression::count_all()]));
    let err = quick.query(0, None).unwrap_err();
    assert_eq!(err.code(), ExecutorErrorCode::AeroExecutionUnsupported);
    assert!(err.message().contains("AGGREGATE"));

    let mut grouped = for_update(
        &session,
        &table,
        vec![
            Expression::column("OWNER"),
            Expression::aggregate(AggregateKind::Sum, Expression::column("BALANCE")),
        ],
    );
    grouped.set_group_by(vec![Expression::column("OWNER")]);
    let err = prepared(grouped).query(0, None).unwrap_err();
    assert!(err.message().contains("GROUP"));

    let mut distinct = for_update(&session, &table, vec![Expression::column("OWNER")]);
    distinct.set_distinct(true);
    let err = prepared(distinct).query(0, None).unwrap_err();
    assert!(err.message().contains("DISTINCT"));

    let mut joined = Select::new(Arc::clone(&session));
    let first = joined.add_table_filter(TableFilter::new(Arc::clone(&table), Some("A")), true);
    joined.add_join(
        first,
        TableFilter::new(Arc::clone(&table), Some("B")),
        false,
        Some(Expression::eq(
            Expression::qualified("A", "OWNER"),
            Expression::qualified("B", "OWNER"),
        )),
    );
    joined.set_expressions(vec![Expression::qualified("A", "ID")]);
    joined.set_for_update(true);
    let err = prepared(joined).query(0, None).unwrap_err();
    assert!(err.message().contains("JOIN"));
    assert!(!err.is_fatal());
}

// =============================================================================
// FOR UPDATE Table Lock Tests
// =============================================================================

#[test]
fn test_for_update_without_mvcc_takes_table_lock() {
    let settings = DatabaseSettings {
        multi_version: false,
        lock_timeout_ms: 50,
        ..DatabaseSettings::default()
    };
    let db = Database::open(settings).unwrap();
    let table = accounts(&db);
    let a = db.create_session();
    let b = db.create_session();

    let mut grouped = for_update(
        &a,
        &table,
        vec![
            Expression::column("OWNER"),
            Expression::aggregate(AggregateKind::Sum, Expression::column("BALANCE")),
        ],
    );
    grouped.set_group_by(vec![Expression::column("OWNER")]);
    let grouped = prepared(grouped);
    assert_eq!(grouped.query(0, None).unwrap().unwrap().rows().len(), 2);
    assert!(table.is_locked_exclusively());
    assert_eq!(a.locked_tables(), 1);

    let waiting = prepared(for_update(&b, &table, vec![Expression::column("ID")]));
    let err = waiting.query(0, None).unwrap_err();
    assert_eq!(err.code(), ExecutorErrorCode::AeroLockTimeout);

    a.commit().unwrap();
    assert!(!table.is_locked_exclusively());
    assert_eq!(waiting.query(0, None).unwrap().unwrap().rows().len(), 3);
}

// =============================================================================
// Cancellation Tests
// =============================================================================

#[test]
fn test_cancel_stops_query_once() {
    let db = Database::in_memory();
    let table = accounts(&db);
    let session = db.create_session();
    let mut select = Select::new(Arc::clone(&session));
    select.add_table_filter(TableFilter::new(Arc::clone(&table), None), true);
    select.set_expressions(vec![Expression::column("ID")]);
    let select = prepared(select);

    session.cancel();
    let err = select.query(0, None).unwrap_err();
    assert_eq!(err.code(), ExecutorErrorCode::AeroQueryCancelled);
    assert!(err.message().contains(select.query_id()));

    // the request was consumed
    assert_eq!(select.query(0, None).unwrap().unwrap().rows().len(), 3);
    let metrics = db.metrics().snapshot();
    assert_eq!(metrics.queries_cancelled, 1);
    assert_eq!(metrics.queries_executed, 1);
}

#[test]
fn test_statement_timeout() {
    let db = Database::in_memory();
    let table = accounts(&db);
    let session = db.create_session();
    let mut select = Select::new(Arc::clone(&session));
    select.add_table_filter(TableFilter::new(Arc::clone(&table), None), true);
    select.set_expressions(vec![Expression::column("ID")]);
    select.add_condition(Expression::compare(
        CompareOp::Gt,
        Expression::column("BALANCE"),
        Expression::literal(0),
    ));
    let select = prepared(select);

    session.set_query_timeout(Some(Duration::ZERO));
    let err = select.query(0, None).unwrap_err();
    assert_eq!(err.code(), ExecutorErrorCode::AeroQueryTimeout);

    session.set_query_timeout(None);
    assert_eq!(select.query(0, None).unwrap().unwrap().rows().len(), 3);
}

// =============================================================================
// Configuration Tests
// =============================================================================

#[test]
fn test_settings_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"optimize_distinct": false, "log_level": "ERROR"}}"#).unwrap();
    let settings = DatabaseSettings::load(file.path()).unwrap();
    assert!(!settings.optimize_distinct);
    assert!(settings.multi_version);

    let db = Database::open(settings).unwrap();
    let table = accounts(&db);
    let session = db.create_session();
    db.create_index(&session, "ACCOUNTS", "IDX_OWNER", &[("OWNER", SortType::ASCENDING)], IndexType::non_unique())
        .unwrap();
    // low enough for the distinct index walk
    table.find_column("OWNER").unwrap().set_selectivity(10);

    let mut select = Select::new(Arc::clone(&session));
    select.add_table_filter(TableFilter::new(table, None), true);
    select.set_distinct(true);
    select.set_expressions(vec![Expression::column("OWNER")]);
    let select = prepared(select);
    assert!(!select.is_distinct_query());
    assert!(!select.plan_sql().contains("/* distinct */"));
    assert_eq!(select.query(0, None).unwrap().unwrap().rows().len(), 2);
}

#[test]
fn test_invalid_settings_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"lock_timeout_ms": 0}}"#).unwrap();
    let err = DatabaseSettings::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("lock_timeout_ms"));

    let missing = DatabaseSettings::load("/nonexistent/aeroquery.json").unwrap_err();
    assert!(missing.to_string().contains("/nonexistent/aeroquery.json"));
}
