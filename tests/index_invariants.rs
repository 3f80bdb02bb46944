//! Index and Transaction Invariant Tests
//!
//! - Unique indexes reject equal non-NULL keys, within and across sessions
//! - Uncommitted rows stay invisible to other sessions
//! - Readers keep their snapshot until their transaction ends

use std::sync::Arc;

use aeroquery::executor::Select;
use aeroquery::expression::{CompareOp, Expression};
use aeroquery::index::{IndexType, SortType};
use aeroquery::table::{Column, Database, Table, TableFilter};
use aeroquery::value::{DataType, Value};

fn people(db: &Arc<Database>) -> Arc<Table> {
    db.create_table(
        "PEOPLE",
        vec![
            Column::new("ID", DataType::Int).not_null(),
            Column::new("EMAIL", DataType::String),
        ],
        Some("ID"),
    )
    .unwrap()
}

fn emails(db: &Arc<Database>, session: &Arc<aeroquery::table::Session>) -> Vec<Vec<Value>> {
    let table = db.table("PEOPLE").unwrap();
    let mut select = Select::new(Arc::clone(session));
    select.add_table_filter(TableFilter::new(table, None), true);
    select.set_expressions(vec![Expression::column("EMAIL")]);
    select.set_order(vec![aeroquery::planner::SelectOrderBy::expression(Expression::column("ID"))]);
    select.init().unwrap();
    select.prepare().unwrap();
    select.query(0, None).unwrap().unwrap().rows()
}

// =============================================================================
// Unique Index Tests
// =============================================================================

#[test]
fn test_unique_index_rejects_duplicate() {
    let db = Database::in_memory();
    let table = people(&db);
    let session = db.create_session();
    db.create_index(&session, "PEOPLE", "UQ_EMAIL", &[("EMAIL", SortType::ASCENDING)], IndexType::unique())
        .unwrap();

    table.insert(&session, vec![Value::Int(1), Value::from("a@x")]).unwrap();
    let err = table
        .insert(&session, vec![Value::Int(2), Value::from("a@x")])
        .unwrap_err();
    assert!(err.is_duplicate_key());
    assert_eq!(db.metrics().snapshot().index_duplicate_keys, 1);

    // the failed insert left nothing behind
    assert_eq!(table.row_count(&session).unwrap(), 1);
}

#[test]
fn test_unique_index_allows_many_nulls() {
    let db = Database::in_memory();
    let table = people(&db);
    let session = db.create_session();
    db.create_index(&session, "PEOPLE", "UQ_EMAIL", &[("EMAIL", SortType::ASCENDING)], IndexType::unique())
        .unwrap();

    for id in 1..=3 {
        table.insert(&session, vec![Value::Int(id), Value::Null]).unwrap();
    }
    session.commit().unwrap();
    assert_eq!(table.row_count(&session).unwrap(), 3);
}

#[test]
fn test_concurrent_unique_inserts_first_commit_wins() {
    let db = Database::in_memory();
    let table = people(&db);
    let setup = db.create_session();
    db.create_index(&setup, "PEOPLE", "UQ_EMAIL", &[("EMAIL", SortType::ASCENDING)], IndexType::unique())
        .unwrap();
    setup.commit().unwrap();

    let a = db.create_session();
    let b = db.create_session();
    table.insert(&a, vec![Value::Int(1), Value::from("same@x")]).unwrap();
    // a's entry is not visible to b yet
    table.insert(&b, vec![Value::Int(2), Value::from("same@x")]).unwrap();

    a.commit().unwrap();
    let err = b.commit().unwrap_err();
    assert!(err.is_conflict());

    let reader = db.create_session();
    assert_eq!(emails(&db, &reader), vec![vec![Value::from("same@x")]]);
}

// =============================================================================
// Visibility Tests
// =============================================================================

#[test]
fn test_uncommitted_rows_invisible_to_other_sessions() {
    let db = Database::in_memory();
    let table = people(&db);
    let writer = db.create_session();
    table.insert(&writer, vec![Value::Int(1), Value::from("w@x")]).unwrap();

    let reader = db.create_session();
    assert!(emails(&db, &reader).is_empty());
    // own writes are visible
    assert_eq!(emails(&db, &writer).len(), 1);
}

#[test]
fn test_reader_keeps_snapshot_until_commit() {
    let db = Database::in_memory();
    let table = people(&db);
    let writer = db.create_session();
    let reader = db.create_session();

    assert!(emails(&db, &reader).is_empty());
    table.insert(&writer, vec![Value::Int(1), Value::from("late@x")]).unwrap();
    writer.commit().unwrap();

    assert!(emails(&db, &reader).is_empty());
    reader.commit().unwrap();
    assert_eq!(emails(&db, &reader), vec![vec![Value::from("late@x")]]);
}

#[test]
fn test_rollback_discards_rows() {
    let db = Database::in_memory();
    let table = people(&db);
    let session = db.create_session();
    table.insert(&session, vec![Value::Int(1), Value::from("gone@x")]).unwrap();
    session.rollback();
    assert!(emails(&db, &session).is_empty());
}

// =============================================================================
// Index Scan Tests
// =============================================================================

#[test]
fn test_secondary_index_range_scan() {
    let db = Database::in_memory();
    let table = people(&db);
    let session = db.create_session();
    db.create_index(&session, "PEOPLE", "IDX_EMAIL", &[("EMAIL", SortType::ASCENDING)], IndexType::non_unique())
        .unwrap();
    for (id, email) in [(1, "d"), (2, "b"), (3, "a"), (4, "c"), (5, "b")] {
        table.insert(&session, vec![Value::Int(id), Value::from(email)]).unwrap();
    }

    let mut select = Select::new(Arc::clone(&session));
    select.add_table_filter(TableFilter::new(Arc::clone(&table), None), true);
    select.set_expressions(vec![Expression::column("ID")]);
    select.add_condition(Expression::and(
        Expression::compare(CompareOp::Ge, Expression::column("EMAIL"), Expression::literal("b")),
        Expression::compare(CompareOp::Lt, Expression::column("EMAIL"), Expression::literal("d")),
    ));
    select.init().unwrap();
    select.prepare().unwrap();
    assert!(select.plan_sql().contains("IDX_EMAIL"), "{}", select.plan_sql());

    let mut ids: Vec<i64> = select
        .query(0, None)
        .unwrap()
        .unwrap()
        .rows()
        .into_iter()
        .filter_map(|r| r[0].as_int())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![2, 4, 5]);
}

#[test]
fn test_null_never_matches_range() {
    let db = Database::in_memory();
    let table = people(&db);
    let session = db.create_session();
    table.insert(&session, vec![Value::Int(1), Value::Null]).unwrap();
    table.insert(&session, vec![Value::Int(2), Value::from("z")]).unwrap();

    let mut select = Select::new(Arc::clone(&session));
    select.add_table_filter(TableFilter::new(table, None), true);
    select.set_expressions(vec![Expression::column("ID")]);
    select.add_condition(Expression::compare(
        CompareOp::Gt,
        Expression::column("EMAIL"),
        Expression::literal(Value::Null),
    ));
    select.init().unwrap();
    select.prepare().unwrap();
    assert!(select.query(0, None).unwrap().unwrap().rows().is_empty());
}
