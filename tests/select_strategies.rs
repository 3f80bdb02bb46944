//! Row Production Strategy Tests
//!
//! Every strategy must return what a flat scan followed by a sort would:
//! - hashed and sorted grouping agree
//! - the distinct index walk returns each value once
//! - quick aggregates answer from index metadata
//! - LIMIT, OFFSET and SAMPLE_SIZE bound the result

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use aeroquery::executor::{LocalResult, ResultTarget, Select};
use aeroquery::expression::{AggregateKind, CompareOp, Expression};
use aeroquery::index::{IndexType, SortType};
use aeroquery::planner::SelectOrderBy;
use aeroquery::table::{Column, Database, Session, Table, TableFilter};
use aeroquery::value::{DataType, Value};

fn items(db: &Arc<Database>) -> Arc<Table> {
    db.create_table(
        "ITEMS",
        vec![
            Column::new("ID", DataType::Int).not_null(),
            Column::new("CATEGORY", DataType::Int),
            Column::new("PRICE", DataType::Int),
        ],
        Some("ID"),
    )
    .unwrap()
}

fn fill(table: &Table, session: &Session, rows: &[(i64, i64, i64)]) {
    for &(id, category, price) in rows {
        table
            .insert(session, vec![Value::Int(id), Value::Int(category), Value::Int(price)])
            .unwrap();
    }
}

fn select_from(session: &Arc<Session>, table: &Arc<Table>) -> Select {
    let mut select = Select::new(Arc::clone(session));
    select.add_table_filter(TableFilter::new(Arc::clone(table), None), true);
    select
}

fn run(select: &mut Select) -> Vec<Vec<Value>> {
    select.init().unwrap();
    select.prepare().unwrap();
    select.query(0, None).unwrap().unwrap().rows()
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|v| Value::Int(*v)).collect()
}

// =============================================================================
// Grouping Tests
// =============================================================================

#[test]
fn test_group_by_counts() {
    let db = Database::in_memory();
    let table = items(&db);
    let session = db.create_session();
    fill(&table, &session, &[(1, 1, 10), (2, 2, 20), (3, 2, 30)]);

    let mut select = select_from(&session, &table);
    select.set_expressions(vec![Expression::column("CATEGORY"), Expression::count_all()]);
    select.set_group_by(vec![Expression::column("CATEGORY")]);
    select.set_order(vec![SelectOrderBy::ordinal(1)]);
    assert_eq!(run(&mut select), vec![ints(&[1, 1]), ints(&[2, 2])]);
    assert!(!select.is_group_sorted_query());
    assert_eq!(db.metrics().snapshot().strategy_group_hashed, 1);
}

#[test]
fn test_having_filters_groups() {
    let db = Database::in_memory();
    let table = items(&db);
    let session = db.create_session();
    fill(&table, &session, &[(1, 1, 10), (2, 2, 20), (3, 2, 30), (4, 3, 5)]);

    let mut select = select_from(&session, &table);
    select.set_expressions(vec![
        Expression::column("CATEGORY"),
        Expression::aggregate(AggregateKind::Sum, Expression::column("PRICE")).alias("TOTAL"),
    ]);
    select.set_group_by(vec![Expression::column("CATEGORY")]);
    select.set_having(Expression::compare(
        CompareOp::Gt,
        Expression::column("TOTAL"),
        Expression::literal(9),
    ));
    select.set_order(vec![SelectOrderBy::ordinal(2).desc()]);
    assert_eq!(run(&mut select), vec![ints(&[2, 50]), ints(&[1, 10])]);
}

#[test]
fn test_sorted_grouping_matches_hashed() {
    let mut rng = StdRng::seed_from_u64(42);
    let rows: Vec<(i64, i64, i64)> = (1..=300)
        .map(|id| (id, rng.gen_range(0..12), rng.gen_range(-50..500)))
        .collect();

    let query = |with_index: bool| {
        let db = Database::in_memory();
        let table = items(&db);
        let session = db.create_session();
        if with_index {
            db.create_index(
                &session,
                "ITEMS",
                "IDX_CATEGORY",
                &[("CATEGORY", SortType::ASCENDING)],
                IndexType::non_unique(),
            )
            .unwrap();
        }
        fill(&table, &session, &rows);
        let mut select = select_from(&session, &table);
        select.set_expressions(vec![
            Expression::column("CATEGORY"),
            Expression::count_all(),
            Expression::aggregate(AggregateKind::Sum, Expression::column("PRICE")),
            Expression::aggregate(AggregateKind::Min, Expression::column("PRICE")),
            Expression::aggregate(AggregateKind::Max, Expression::column("PRICE")),
            Expression::aggregate_distinct(AggregateKind::Count, Expression::column("PRICE")),
        ]);
        select.set_group_by(vec![Expression::column("CATEGORY")]);
        select.set_order(vec![SelectOrderBy::ordinal(1)]);
        let result = run(&mut select);
        (result, select.is_group_sorted_query(), select.plan_sql())
    };

    let (hashed, hashed_sorted, _) = query(false);
    let (sorted, sorted_sorted, plan) = query(true);
    assert!(!hashed_sorted);
    assert!(sorted_sorted);
    assert!(plan.contains("/* group sorted */"), "{}", plan);
    assert_eq!(hashed, sorted);
    assert_eq!(hashed.len(), 12);
}

#[test]
fn test_aggregate_over_no_rows() {
    let db = Database::in_memory();
    let table = items(&db);
    let session = db.create_session();

    let mut select = select_from(&session, &table);
    select.set_expressions(vec![
        Expression::count_all(),
        Expression::aggregate(AggregateKind::Max, Expression::column("PRICE")),
    ]);
    select.add_condition(Expression::compare(
        CompareOp::Gt,
        Expression::column("PRICE"),
        Expression::literal(0),
    ));
    assert_eq!(run(&mut select), vec![vec![Value::Int(0), Value::Null]]);

    let mut grouped = select_from(&session, &table);
    grouped.set_expressions(vec![Expression::column("CATEGORY"), Expression::count_all()]);
    grouped.set_group_by(vec![Expression::column("CATEGORY")]);
    assert!(run(&mut grouped).is_empty());
}

// =============================================================================
// Quick Aggregate Tests
// =============================================================================

#[test]
fn test_quick_max_uses_index() {
    let db = Database::in_memory();
    let table = items(&db);
    let session = db.create_session();
    db.create_index(&session, "ITEMS", "IDX_PRICE", &[("PRICE", SortType::ASCENDING)], IndexType::non_unique())
        .unwrap();
    fill(&table, &session, &[(1, 1, 2), (2, 1, 3), (3, 2, 1)]);

    let mut select = select_from(&session, &table);
    select.set_expressions(vec![
        Expression::aggregate(AggregateKind::Max, Expression::column("PRICE")),
        Expression::count_all(),
    ]);
    assert_eq!(run(&mut select), vec![ints(&[3, 3])]);
    assert!(select.is_quick_aggregate_query());
    assert!(select.plan_sql().ends_with("/* direct lookup */"), "{}", select.plan_sql());

    let metrics = db.metrics().snapshot();
    assert_eq!(metrics.strategy_quick, 1);
    assert_eq!(metrics.rows_scanned, 0);
}

#[test]
fn test_min_without_index_is_not_quick() {
    let db = Database::in_memory();
    let table = items(&db);
    let session = db.create_session();
    fill(&table, &session, &[(1, 1, 2), (2, 1, 3)]);

    let mut select = select_from(&session, &table);
    select.set_expressions(vec![Expression::aggregate(AggregateKind::Min, Expression::column("PRICE"))]);
    assert_eq!(run(&mut select), vec![ints(&[2])]);
    assert!(!select.is_quick_aggregate_query());
}

// =============================================================================
// Distinct Tests
// =============================================================================

#[test]
fn test_distinct_walks_low_cardinality_index() {
    let db = Database::in_memory();
    let table = db
        .create_table(
            "TAGS",
            vec![
                Column::new("ID", DataType::Int).not_null(),
                Column::new("NAME", DataType::String),
            ],
            Some("ID"),
        )
        .unwrap();
    let session = db.create_session();
    db.create_index(&session, "TAGS", "IDX_NAME", &[("NAME", SortType::ASCENDING)], IndexType::non_unique())
        .unwrap();
    for id in 0..30 {
        let name = ["c", "a", "b"][id as usize % 3];
        table.insert(&session, vec![Value::Int(id), Value::from(name)]).unwrap();
    }
    table.analyze(&session).unwrap();
    assert_eq!(table.find_column("NAME").unwrap().selectivity(), 10);

    let mut select = select_from(&session, &table);
    select.set_distinct(true);
    select.set_expressions(vec![Expression::column("NAME")]);
    select.set_order(vec![SelectOrderBy::expression(Expression::column("NAME"))]);
    let rows = run(&mut select);
    assert_eq!(
        rows,
        vec![vec![Value::from("a")], vec![Value::from("b")], vec![Value::from("c")]]
    );
    assert!(select.is_distinct_query());
    let plan = select.plan_sql();
    assert!(plan.contains("/* distinct */"), "{}", plan);
    assert!(plan.contains("/* index sorted */"), "{}", plan);
    assert_eq!(db.metrics().snapshot().strategy_distinct, 1);

    // an unbounded max_rows plus an offset must not overflow the walk bound
    let mut skipped = select_from(&session, &table);
    skipped.set_distinct(true);
    skipped.set_expressions(vec![Expression::column("NAME")]);
    skipped.set_order(vec![SelectOrderBy::expression(Expression::column("NAME"))]);
    skipped.set_offset(Expression::literal(1));
    skipped.init().unwrap();
    skipped.prepare().unwrap();
    assert!(skipped.is_distinct_query());
    let rows = skipped.query(usize::MAX, None).unwrap().unwrap().rows();
    assert_eq!(rows, vec![vec![Value::from("b")], vec![Value::from("c")]]);
}

#[test]
fn test_distinct_without_statistics_dedups_in_result() {
    let db = Database::in_memory();
    let table = items(&db);
    let session = db.create_session();
    db.create_index(&session, "ITEMS", "IDX_CATEGORY", &[("CATEGORY", SortType::ASCENDING)], IndexType::non_unique())
        .unwrap();
    fill(&table, &session, &[(1, 2, 0), (2, 1, 0), (3, 2, 0)]);

    let mut select = select_from(&session, &table);
    select.set_distinct(true);
    select.set_expressions(vec![Expression::column("CATEGORY")]);
    select.set_order(vec![SelectOrderBy::ordinal(1)]);
    assert_eq!(run(&mut select), vec![ints(&[1]), ints(&[2])]);
    assert!(!select.is_distinct_query());
}

// =============================================================================
// Ordering and Bounds Tests
// =============================================================================

#[test]
fn test_order_by_descending_index() {
    let db = Database::in_memory();
    let table = items(&db);
    let session = db.create_session();
    db.create_index(&session, "ITEMS", "IDX_PRICE_DESC", &[("PRICE", SortType::DESCENDING)], IndexType::non_unique())
        .unwrap();
    fill(&table, &session, &[(1, 0, 5), (2, 0, 9), (3, 0, 1), (4, 0, 7)]);

    let mut select = select_from(&session, &table);
    select.set_expressions(vec![Expression::column("PRICE")]);
    select.set_order(vec![SelectOrderBy::expression(Expression::column("PRICE")).desc()]);
    select.set_limit(Expression::literal(3));
    assert_eq!(run(&mut select), vec![ints(&[9]), ints(&[7]), ints(&[5])]);
    assert!(select.is_sort_using_index());
    assert!(select.plan_sql().contains("/* index sorted */"));
}

#[test]
fn test_limit_zero_returns_nothing() {
    let db = Database::in_memory();
    let table = items(&db);
    let session = db.create_session();
    fill(&table, &session, &[(1, 0, 5), (2, 0, 9)]);

    let mut select = select_from(&session, &table);
    select.set_expressions(vec![Expression::column("ID")]);
    select.set_limit(Expression::literal(0));
    let rows = run(&mut select);
    assert!(rows.is_empty());
    assert_eq!(db.metrics().snapshot().rows_scanned, 0);
}

#[test]
fn test_offset_beyond_rows_is_empty() {
    let db = Database::in_memory();
    let table = items(&db);
    let session = db.create_session();
    fill(&table, &session, &[(1, 0, 5), (2, 0, 9)]);

    let mut select = select_from(&session, &table);
    select.set_expressions(vec![Expression::column("ID")]);
    select.set_offset(Expression::literal(5));
    assert!(run(&mut select).is_empty());
    assert!(!select.allow_global_conditions());
}

#[test]
fn test_limit_offset_window() {
    let db = Database::in_memory();
    let table = items(&db);
    let session = db.create_session();
    fill(&table, &session, &[(1, 0, 5), (2, 0, 9), (3, 0, 1), (4, 0, 7), (5, 0, 3)]);

    let mut select = select_from(&session, &table);
    select.set_expressions(vec![Expression::column("PRICE")]);
    select.set_order(vec![SelectOrderBy::expression(Expression::column("PRICE"))]);
    select.set_limit(Expression::param(0));
    select.set_offset(Expression::literal(1));
    select.set_parameter(0, Value::Int(2));
    assert_eq!(run(&mut select), vec![ints(&[3]), ints(&[5])]);

    // max_rows tightens the statement limit
    let result = select.query(1, None).unwrap().unwrap();
    assert_eq!(result.rows(), vec![ints(&[3])]);
}

#[test]
fn test_unbounded_max_rows_with_offset() {
    let db = Database::in_memory();
    let table = items(&db);
    let session = db.create_session();
    fill(&table, &session, &[(1, 0, 5), (2, 0, 9)]);

    let mut select = select_from(&session, &table);
    select.set_expressions(vec![Expression::column("ID")]);
    select.set_offset(Expression::literal(1));
    select.init().unwrap();
    select.prepare().unwrap();
    let rows = select.query(usize::MAX, None).unwrap().unwrap().rows();
    assert_eq!(rows, vec![ints(&[2])]);
}

#[test]
fn test_sample_size_stops_scan() {
    let db = Database::in_memory();
    let table = items(&db);
    let session = db.create_session();
    fill(&table, &session, &[(1, 0, 5), (2, 0, 9), (3, 0, 1), (4, 0, 7)]);

    let mut select = select_from(&session, &table);
    select.set_expressions(vec![Expression::column("ID")]);
    select.set_sample_size(Expression::literal(2));
    assert_eq!(run(&mut select), vec![ints(&[1]), ints(&[2])]);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_prepare_is_idempotent_and_query_repeats() {
    let db = Database::in_memory();
    let table = items(&db);
    let session = db.create_session();
    fill(&table, &session, &[(1, 0, 5), (2, 0, 9)]);

    let mut select = select_from(&session, &table);
    select.set_expressions(vec![Expression::column("ID")]);
    select.init().unwrap();
    select.prepare().unwrap();
    let plan = select.plan_sql();
    let cost = select.cost();
    select.prepare().unwrap();
    assert_eq!(select.plan_sql(), plan);
    assert_eq!(select.cost(), cost);
    assert_eq!(db.metrics().snapshot().queries_prepared, 1);

    let first = select.query(0, None).unwrap().unwrap().rows();
    let second = select.query(0, None).unwrap().unwrap().rows();
    assert_eq!(first, second);
    assert_eq!(db.metrics().snapshot().queries_executed, 2);
}

struct Collector(Vec<Vec<Value>>);

impl ResultTarget for Collector {
    fn add_row(&mut self, values: Vec<Value>) {
        self.0.push(values);
    }

    fn row_count(&self) -> usize {
        self.0.len()
    }
}

#[test]
fn test_query_into_target() {
    let db = Database::in_memory();
    let table = items(&db);
    let session = db.create_session();
    fill(&table, &session, &[(1, 0, 5), (2, 0, 9)]);

    let mut select = select_from(&session, &table);
    select.set_expressions(vec![Expression::column("PRICE")]);
    select.set_order(vec![SelectOrderBy::expression(Expression::column("ID")).desc()]);
    select.init().unwrap();
    select.prepare().unwrap();

    let mut target = Collector(Vec::new());
    let returned = select.query(0, Some(&mut target)).unwrap();
    assert!(returned.is_none());
    assert_eq!(target.0, vec![ints(&[9]), ints(&[5])]);

    let meta: LocalResult = select.query_meta();
    assert_eq!(meta.columns().len(), 1);
    assert_eq!(meta.columns()[0].name, "PRICE");
}
