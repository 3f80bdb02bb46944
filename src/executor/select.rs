//! SELECT statement
//!
//! A `Select` is built programmatically, then moves through three phases:
//! - `init` expands wildcards, lays out the expression list and binds
//!   every column reference
//! - `prepare` optimizes expressions, pushes index conditions, asks the
//!   optimizer for a plan and picks the row production strategy
//! - `query` runs the chosen strategy; it may be called any number of times
//!
//! Expression list layout after `init`:
//! `[visible | appended ORDER BY | HAVING | appended GROUP BY]`
//!
//! Strategies, in dispatch order: quick aggregate, sorted group, hashed
//! group, distinct index walk, flat scan.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::errors::{ExecutorError, ExecutorErrorCode, ExecutorResult};
use super::join::{Flow, JoinScan};
use super::result::{LocalResult, ResultColumn, ResultTarget};
use crate::expression::{
    unenclose, Accumulator, CompareOp, EvalContext, Expression, ExpressionResult, SlotKind,
};
use crate::observability::{log_event_with_fields, Event, Strategy, Timer};
use crate::planner::{
    bind_columns, chain_order, create_index_conditions, group_sorted_index, init_order,
    prepare_order, resolve_select_aliases, sort_index, CostOptimizer, Optimizer, PlannerError,
    PlannerResult, SelectOrderBy, SortHint, SortOrder,
};
use crate::table::{Session, Table, TableFilter, SELECTIVITY_DEFAULT};
use crate::value::{Row, SearchRow, Value, ValueTuple};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Initialized,
    Prepared,
}

pub struct Select {
    session: Arc<Session>,
    query_id: String,
    phase: Phase,
    optimizer: Box<dyn Optimizer>,

    filters: Vec<TableFilter>,
    top_filters: Vec<usize>,
    top_filter: Option<usize>,

    expressions: Vec<Expression>,
    expression_sql: Vec<String>,
    visible_column_count: usize,
    distinct_column_count: usize,
    condition: Option<Expression>,
    having: Option<Expression>,
    having_index: Option<usize>,
    group: Vec<Expression>,
    group_index: Option<Vec<usize>>,
    group_by_expression: Vec<bool>,
    order: Vec<SelectOrderBy>,
    sort: Option<SortOrder>,
    distinct: bool,
    limit: Option<Expression>,
    offset: Option<Expression>,
    sample_size: Option<Expression>,
    for_update: bool,
    parameters: Vec<Option<Value>>,

    is_group_query: bool,
    is_quick_aggregate_query: bool,
    is_distinct_query: bool,
    sort_using_index: bool,
    is_group_sorted_query: bool,
    slots: Vec<SlotKind>,
    cost: f64,
}

impl Select {
    pub fn new(session: Arc<Session>) -> Self {
        let permutations = session.database().settings().max_optimizer_permutation_tables;
        Self {
            session,
            query_id: Uuid::new_v4().to_string(),
            phase: Phase::Created,
            optimizer: Box::new(CostOptimizer::new(permutations)),
            filters: Vec::new(),
            top_filters: Vec::new(),
            top_filter: None,
            expressions: Vec::new(),
            expression_sql: Vec::new(),
            visible_column_count: 0,
            distinct_column_count: 0,
            condition: None,
            having: None,
            having_index: None,
            group: Vec::new(),
            group_index: None,
            group_by_expression: Vec::new(),
            order: Vec::new(),
            sort: None,
            distinct: false,
            limit: None,
            offset: None,
            sample_size: None,
            for_update: false,
            parameters: Vec::new(),
            is_group_query: false,
            is_quick_aggregate_query: false,
            is_distinct_query: false,
            sort_using_index: false,
            is_group_sorted_query: false,
            slots: Vec::new(),
            cost: 0.0,
        }
    }

    // ==================================================================
    // Building
    // ==================================================================

    /// Adds a FROM item and returns its filter position. Top filters are
    /// the comma separated items; the optimizer may reorder them.
    pub fn add_table_filter(&mut self, filter: TableFilter, is_top: bool) -> usize {
        self.filters.push(filter);
        let f = self.filters.len() - 1;
        if is_top {
            self.top_filters.push(f);
        }
        f
    }

    /// Appends `filter` to the end of `parent`'s chain.
    pub fn add_join(
        &mut self,
        parent: usize,
        mut filter: TableFilter,
        outer: bool,
        on: Option<Expression>,
    ) -> usize {
        filter.set_join_outer(outer);
        filter.set_join_condition(on);
        let f = self.add_table_filter(filter, false);
        let last = self.chain_end(parent);
        self.filters[last].set_join(Some(f));
        f
    }

    /// Joins `filter` on every column name its table shares with `parent`'s.
    /// The shared columns belong to `parent` from then on.
    pub fn add_natural_join(&mut self, parent: usize, mut filter: TableFilter, outer: bool) -> usize {
        let table = Arc::clone(filter.table());
        let left = &self.filters[parent];
        let mut on: Option<Expression> = None;
        for column in table.columns() {
            if left.table().find_column(column.name()).is_none() {
                continue;
            }
            filter.add_natural_column(column.column_id());
            let eq = Expression::eq(
                Expression::qualified(left.alias(), column.name()),
                Expression::qualified(filter.alias(), column.name()),
            );
            on = Some(match on.take() {
                Some(previous) => Expression::and(previous, eq),
                None => eq,
            });
        }
        self.add_join(parent, filter, outer, on)
    }

    /// Opens (or extends) the parenthesized sub-chain of `host`; `on` is
    /// an inner join condition within the sub-chain.
    pub fn add_nested_join(&mut self, host: usize, mut filter: TableFilter, on: Option<Expression>) -> usize {
        filter.set_join_condition(on);
        let f = self.add_table_filter(filter, false);
        match self.filters[host].nested_join() {
            Some(first) => {
                let last = self.chain_end(first);
                self.filters[last].set_join(Some(f));
            }
            None => self.filters[host].set_nested_join(Some(f)),
        }
        f
    }

    fn chain_end(&self, start: usize) -> usize {
        let mut last = start;
        while let Some(next) = self.filters[last].join() {
            last = next;
        }
        last
    }

    pub fn set_expressions(&mut self, expressions: Vec<Expression>) {
        self.expressions = expressions;
    }

    /// ANDs `condition` into WHERE.
    pub fn add_condition(&mut self, condition: Expression) {
        self.condition = Some(match self.condition.take() {
            Some(existing) => Expression::and(existing, condition),
            None => condition,
        });
    }

    pub fn set_group_by(&mut self, group: Vec<Expression>) {
        self.group = group;
    }

    pub fn set_having(&mut self, having: Expression) {
        self.having = Some(having);
    }

    /// Forces grouping even without aggregates or GROUP BY.
    pub fn set_group_query(&mut self) {
        self.is_group_query = true;
    }

    pub fn set_order(&mut self, order: Vec<SelectOrderBy>) {
        self.order = order;
    }

    pub fn set_distinct(&mut self, distinct: bool) {
        self.distinct = distinct;
    }

    pub fn set_limit(&mut self, limit: Expression) {
        self.limit = Some(limit);
    }

    pub fn set_offset(&mut self, offset: Expression) {
        self.offset = Some(offset);
    }

    /// Stops every strategy after this many qualifying rows.
    pub fn set_sample_size(&mut self, sample_size: Expression) {
        self.sample_size = Some(sample_size);
    }

    pub fn set_for_update(&mut self, for_update: bool) {
        self.for_update = for_update;
    }

    pub fn set_optimizer(&mut self, optimizer: Box<dyn Optimizer>) {
        self.optimizer = optimizer;
    }

    /// Binds positional parameter `index` (zero based).
    pub fn set_parameter(&mut self, index: usize, value: Value) {
        if self.parameters.len() <= index {
            self.parameters.resize(index + 1, None);
        }
        self.parameters[index] = Some(value);
    }

    // ==================================================================
    // init
    // ==================================================================

    pub fn init(&mut self) -> PlannerResult<()> {
        if self.phase != Phase::Created {
            return Err(PlannerError::internal("init called twice"));
        }
        let result = self.init_expressions();
        self.observe_rejection(&result);
        result?;
        self.phase = Phase::Initialized;
        Ok(())
    }

    fn init_expressions(&mut self) -> PlannerResult<()> {
        if self.top_filters.is_empty() {
            return Err(PlannerError::internal("statement has no table filter"));
        }
        if !self.session.database().settings().nested_joins {
            self.flatten_nested_joins();
        }
        self.expand_wildcards()?;
        self.visible_column_count = self.expressions.len();
        if !self.order.is_empty() || !self.group.is_empty() {
            self.expression_sql = self.expressions.iter().map(Expression::sql).collect();
        }
        if !self.order.is_empty() {
            let aliases: Vec<String> = self.filters.iter().map(|f| f.alias().to_string()).collect();
            init_order(
                &mut self.expressions,
                &mut self.expression_sql,
                &mut self.order,
                self.visible_column_count,
                self.distinct,
                &aliases,
            )?;
        }
        self.distinct_column_count = self.expressions.len();

        if let Some(mut having) = self.having.take() {
            resolve_select_aliases(&mut having, &self.expressions, self.visible_column_count);
            self.expressions.push(having);
            self.having_index = Some(self.expressions.len() - 1);
        }

        if !self.group.is_empty() {
            self.init_group()?;
        }

        for expr in &mut self.expressions {
            bind_columns(expr, &self.filters)?;
        }
        if let Some(condition) = &mut self.condition {
            bind_columns(condition, &self.filters)?;
        }
        for f in 0..self.filters.len() {
            let mut on = self.filters[f].take_join_condition();
            if let Some(on) = &mut on {
                bind_columns(on, &self.filters)?;
            }
            self.filters[f].set_join_condition(on);
        }

        self.is_group_query = self.is_group_query
            || self.group_index.is_some()
            || self.having_index.is_some()
            || self.expressions.iter().any(Expression::contains_aggregate);
        self.check_group_by()
    }

    /// Splices every nested sub-chain into its host's chain.
    fn flatten_nested_joins(&mut self) {
        for f in 0..self.filters.len() {
            let Some(nested) = self.filters[f].nested_join() else {
                continue;
            };
            let after = self.filters[f].join();
            self.filters[f].set_nested_join(None);
            self.filters[f].set_join(Some(nested));
            let last = self.chain_end(nested);
            self.filters[last].set_join(after);
        }
    }

    fn expand_wildcards(&mut self) -> PlannerResult<()> {
        let mut expanded = Vec::with_capacity(self.expressions.len());
        for expr in std::mem::take(&mut self.expressions) {
            match expr {
                Expression::Wildcard { table: None } => {
                    for f in 0..self.filters.len() {
                        self.expand_filter(f, &mut expanded);
                    }
                }
                Expression::Wildcard { table: Some(alias) } => {
                    let f = self
                        .filters
                        .iter()
                        .position(|f| f.alias().eq_ignore_ascii_case(&alias))
                        .ok_or_else(|| PlannerError::table_not_found(&alias))?;
                    self.expand_filter(f, &mut expanded);
                }
                other => expanded.push(other),
            }
        }
        self.expressions = expanded;
        Ok(())
    }

    fn expand_filter(&self, f: usize, out: &mut Vec<Expression>) {
        let filter = &self.filters[f];
        for column in filter.table().columns() {
            if filter.is_natural_join_column(column.column_id()) {
                continue;
            }
            out.push(Expression::qualified(filter.alias(), column.name()));
        }
    }

    /// Matches GROUP BY entries to the expression list by text, then by
    /// alias; unmatched entries are appended.
    fn init_group(&mut self) -> PlannerResult<()> {
        let matchable = self.expression_sql.len();
        let mut group_index = Vec::with_capacity(self.group.len());
        for g in &self.group {
            let sql = g.sql();
            let found = self.expression_sql[..matchable]
                .iter()
                .position(|s| s.eq_ignore_ascii_case(&sql))
                .or_else(|| {
                    // GROUP BY a column alias
                    self.expressions[..matchable]
                        .iter()
                        .position(|e| e.alias_name().map_or(false, |a| a.eq_ignore_ascii_case(&sql)))
                });
            let idx = match found {
                Some(idx) => idx,
                None => {
                    self.expressions.push(g.clone());
                    self.expressions.len() - 1
                }
            };
            group_index.push(idx);
        }
        let mut group_by_expression = vec![false; self.expressions.len()];
        for &idx in &group_index {
            group_by_expression[idx] = true;
        }
        self.group_index = Some(group_index);
        self.group_by_expression = group_by_expression;
        Ok(())
    }

    /// In a grouped query every column outside an aggregate must be a grouping key.
    fn check_group_by(&self) -> PlannerResult<()> {
        if !self.is_group_query {
            return Ok(());
        }
        let keys: Vec<_> = self
            .group_index
            .iter()
            .flatten()
            .filter_map(|&i| self.expressions[i].as_column())
            .collect();
        for (i, expr) in self.expressions.iter().enumerate() {
            if self.is_group_by_expression(i) {
                continue;
            }
            for column in expr.columns_outside_aggregates() {
                if !keys.iter().any(|k| k.same_target(column)) {
                    return Err(PlannerError::not_in_group_by(
                        &Expression::Column(column.clone()).sql(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn is_group_by_expression(&self, i: usize) -> bool {
        self.group_by_expression.get(i).copied().unwrap_or(false)
    }

    /// Pushes `expression op ?parameter` into the statement from an
    /// enclosing query. Only valid between `init` and `prepare`.
    ///
    /// A grouping column goes to WHERE; any other column of a grouped
    /// query goes to HAVING.
    pub fn add_global_condition(&mut self, parameter: usize, column: usize, op: CompareOp) -> PlannerResult<()> {
        if self.phase != Phase::Initialized {
            return Err(PlannerError::internal(
                "global conditions are only accepted between init and prepare",
            ));
        }
        let target = self
            .expressions
            .get(column)
            .filter(|_| column < self.visible_column_count)
            .ok_or_else(|| PlannerError::internal(format!("no select column {}", column)))?
            .non_alias()
            .clone();
        let comparison = if target.is_query_comparable() {
            Expression::compare(op, target, Expression::param(parameter))
        } else {
            // always true; keeps the parameter referenced
            Expression::compare(
                CompareOp::EqNullSafe,
                Expression::param(parameter),
                Expression::param(parameter),
            )
        };
        let to_where = !self.is_group_query
            || self
                .group_index
                .as_ref()
                .map_or(false, |g| g.contains(&column));
        if to_where {
            self.add_condition(comparison);
            return Ok(());
        }
        match self.having_index {
            Some(h) => {
                let existing = std::mem::replace(&mut self.expressions[h], Expression::literal(true));
                self.expressions[h] = Expression::and(existing, comparison);
            }
            None => {
                self.expressions.push(comparison);
                self.having_index = Some(self.expressions.len() - 1);
                self.group_by_expression.resize(self.expressions.len(), false);
            }
        }
        Ok(())
    }

    /// Whether an enclosing query may push conditions into this one.
    pub fn allow_global_conditions(&self) -> bool {
        self.offset.is_none() && (self.limit.is_none() || self.sort.is_none())
    }

    // ==================================================================
    // prepare
    // ==================================================================

    /// Plans the statement. A second call is a no-op.
    pub fn prepare(&mut self) -> PlannerResult<()> {
        match self.phase {
            Phase::Prepared => return Ok(()),
            Phase::Created => return Err(PlannerError::internal("prepare called before init")),
            Phase::Initialized => {}
        }
        let result = self.prepare_plan();
        self.observe_rejection(&result);
        result?;
        self.phase = Phase::Prepared;

        let metrics = self.session.database().metrics();
        metrics.increment_queries_prepared();
        log_event_with_fields(
            Event::QueryPrepared,
            &[
                ("query_id", &self.query_id),
                ("strategy", strategy_name(self.strategy())),
                ("cost", &self.cost.to_string()),
            ],
        );
        Ok(())
    }

    fn prepare_plan(&mut self) -> PlannerResult<()> {
        if !self.order.is_empty() {
            self.sort = Some(prepare_order(&self.order, self.expressions.len(), &self.parameters)?);
        }
        self.expressions = std::mem::take(&mut self.expressions)
            .into_iter()
            .map(Expression::optimize)
            .collect();
        self.condition = self
            .condition
            .take()
            .map(Expression::optimize)
            .filter(|c| !matches!(c, Expression::Literal(Value::Bool(true))));

        self.mark_outer_indirect();
        self.prepare_join_conditions()?;
        if let Some(condition) = &self.condition {
            for f in 0..self.filters.len() {
                let filter = &self.filters[f];
                if filter.is_join_outer() || filter.is_join_outer_indirect() {
                    continue;
                }
                let mut conditions = Vec::new();
                create_index_conditions(condition, f, &mut conditions);
                for c in conditions {
                    self.filters[f].add_index_condition(c);
                }
            }
        }

        self.is_quick_aggregate_query = self.is_group_query
            && self.group_index.is_none()
            && self.having_index.is_none()
            && self.filters.len() == 1
            && self.condition.is_none()
            && self
                .expressions
                .iter()
                .all(|e| e.is_quick_evaluatable(&self.filters));

        let hint = self.sort.as_ref().map(|order| SortHint {
            order,
            expressions: &self.expressions,
        });
        let plan = self
            .optimizer
            .optimize(&self.session, &mut self.filters, &self.top_filters, hint)?;
        let top = plan.top_filter;
        self.top_filter = Some(top);
        self.cost = plan.cost;
        for (position, f) in chain_order(&self.filters, top).into_iter().enumerate() {
            self.filters[f].set_scan_position(Some(position));
        }

        let optimize_distinct = self.session.database().settings().optimize_distinct;
        if self.distinct
            && optimize_distinct
            && !self.is_group_query
            && self.filters.len() == 1
            && self.expressions.len() == 1
            && self.condition.is_none()
        {
            self.use_distinct_index(top);
        }
        if !self.is_quick_aggregate_query && !self.is_group_query {
            self.use_sort_index(top);
        }
        if !self.is_quick_aggregate_query && self.is_group_query && self.group_by_expression.contains(&true) {
            if let Some(index) =
                group_sorted_index(&self.filters, top, &self.expressions, &self.group_by_expression)
            {
                let current = self.filters[top].index();
                if current.index_type().is_scan() || current.id() == index.id() {
                    self.filters[top].set_index(index);
                    self.is_group_sorted_query = true;
                }
            }
        }

        self.slots.clear();
        if self.is_group_query && !self.is_quick_aggregate_query {
            for (i, expr) in self.expressions.iter_mut().enumerate() {
                if !self.group_by_expression.get(i).copied().unwrap_or(false) {
                    expr.assign_slots(&mut self.slots);
                }
            }
        }
        Ok(())
    }

    /// Filters inside the nested sub-chain of an outer joined filter.
    fn mark_outer_indirect(&mut self) {
        for f in 0..self.filters.len() {
            if !self.filters[f].is_join_outer() {
                continue;
            }
            if let Some(nested) = self.filters[f].nested_join() {
                for n in chain_order(&self.filters, nested) {
                    self.filters[n].set_join_outer_indirect(true);
                }
            }
        }
    }

    /// Optimizes ON conditions and derives index conditions from them.
    ///
    /// An ON condition may read its own filter, filters declared before it
    /// and its nested sub-chain. An inner join condition reading anything
    /// else moves to WHERE; an outer one is rejected.
    fn prepare_join_conditions(&mut self) -> PlannerResult<()> {
        let declared: Vec<usize> = self
            .top_filters
            .iter()
            .flat_map(|&t| chain_order(&self.filters, t))
            .collect();
        for (position, &f) in declared.iter().enumerate() {
            let Some(on) = self.filters[f].take_join_condition() else {
                continue;
            };
            let on = on.optimize();
            if matches!(on, Expression::Literal(Value::Bool(true))) {
                continue;
            }
            let earlier = &declared[..position];
            let unit = self.filters[f]
                .nested_join()
                .map(|n| chain_order(&self.filters, n))
                .unwrap_or_default();
            let evaluatable = on.is_evaluatable(&|i| i == f || earlier.contains(&i) || unit.contains(&i));
            if !evaluatable {
                let filter = &self.filters[f];
                if filter.is_join_outer() || filter.is_join_outer_indirect() {
                    return Err(PlannerError::unsupported_outer_join(unenclose(&on.sql())));
                }
                self.add_condition(on);
                continue;
            }
            let mut conditions = Vec::new();
            create_index_conditions(&on, f, &mut conditions);
            for c in conditions {
                self.filters[f].add_index_condition(c);
            }
            self.filters[f].set_join_condition(Some(on));
        }
        Ok(())
    }

    fn use_distinct_index(&mut self, top: usize) {
        let Some(column) = self.expressions[0].as_column().and_then(|c| c.column()).cloned() else {
            return;
        };
        let selectivity = column.selectivity();
        if selectivity == SELECTIVITY_DEFAULT || selectivity >= 20 {
            return;
        }
        let filter = &self.filters[top];
        let Some(index) = filter.table().index_for_column(column.column_id(), false, true) else {
            return;
        };
        // the first column must be ascending
        let ascending = index
            .index_columns()
            .first()
            .map_or(false, |c| !c.sort_type.descending);
        let current = filter.index();
        if !ascending || !(current.index_type().is_scan() || current.id() == index.id()) {
            return;
        }
        let index_type = index.index_type();
        // a unique single column index has nothing to skip
        if index_type.is_hash() || (index_type.is_unique() && index.index_columns().len() == 1) {
            return;
        }
        self.filters[top].set_index(index);
        self.is_distinct_query = true;
    }

    fn use_sort_index(&mut self, top: usize) {
        let Some(sort) = &self.sort else {
            return;
        };
        let Some(index) = sort_index(&self.filters, top, &self.expressions, sort) else {
            return;
        };
        let current = self.filters[top].index();
        if current.index_type().is_scan() || current.id() == index.id() {
            // IN lists are walked in list order
            let in_list = self.filters[top].has_in_comparisons();
            self.filters[top].set_index(index);
            if !in_list {
                self.sort_using_index = true;
            }
            return;
        }
        let sort_columns = index.index_columns();
        let current_columns = current.index_columns();
        if sort_columns.len() < current_columns.len() {
            return;
        }
        let mut swap = false;
        for (s, c) in sort_columns.iter().zip(current_columns) {
            if s.column_id() != c.column_id() {
                swap = false;
                break;
            }
            if s.sort_type != c.sort_type {
                swap = true;
            }
        }
        if swap {
            self.filters[top].set_index(index);
            self.sort_using_index = true;
        }
    }

    fn observe_rejection<T>(&self, result: &PlannerResult<T>) {
        if let Err(err) = result {
            self.session.database().metrics().increment_queries_rejected();
            log_event_with_fields(
                Event::QueryRejected,
                &[
                    ("query_id", &self.query_id),
                    ("code", err.code().code()),
                    ("reason", err.message()),
                ],
            );
        }
    }

    // ==================================================================
    // query
    // ==================================================================

    /// Runs the statement. `max_rows` of zero means unlimited.
    ///
    /// With a `target` the visible rows are pushed into it and `None` is
    /// returned; otherwise the materialized result is returned.
    pub fn query(
        &self,
        max_rows: usize,
        target: Option<&mut dyn ResultTarget>,
    ) -> ExecutorResult<Option<LocalResult>> {
        if self.phase != Phase::Prepared {
            return Err(ExecutorError::not_prepared());
        }
        let top = self.top_filter.ok_or_else(ExecutorError::not_prepared)?;
        let timer = Timer::new();
        self.session.start_statement();
        let outcome = self.execute(max_rows, top);
        self.session.end_statement();

        let metrics = self.session.database().metrics();
        let (mut result, rows_scanned) = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                match err.code() {
                    ExecutorErrorCode::AeroQueryCancelled | ExecutorErrorCode::AeroQueryTimeout => {
                        metrics.increment_queries_cancelled();
                        log_event_with_fields(
                            Event::QueryCancelled,
                            &[("query_id", &self.query_id), ("code", err.code().code())],
                        );
                    }
                    _ => {
                        metrics.increment_queries_rejected();
                        log_event_with_fields(
                            Event::QueryRejected,
                            &[
                                ("query_id", &self.query_id),
                                ("code", err.code().code()),
                                ("reason", err.message()),
                            ],
                        );
                    }
                }
                return Err(err);
            }
        };

        let strategy = self.strategy();
        metrics.increment_queries_executed();
        metrics.record_strategy(strategy);
        metrics.add_rows_scanned(rows_scanned);
        metrics.add_rows_returned(result.row_count() as u64);
        if self.sort_using_index {
            metrics.increment_index_sorted();
        }
        if !matches!(strategy, Strategy::Flat | Strategy::GroupHashed) || self.sort_using_index {
            log_event_with_fields(
                Event::QueryFastPath,
                &[("query_id", &self.query_id), ("strategy", strategy_name(strategy))],
            );
        }
        log_event_with_fields(
            Event::QueryExecuted,
            &[
                ("query_id", &self.query_id),
                ("rows", &result.row_count().to_string()),
                ("rows_scanned", &rows_scanned.to_string()),
                ("elapsed_ms", &timer.elapsed_ms()),
            ],
        );

        match target {
            Some(target) => {
                while result.next() {
                    if let Some(row) = result.current_row() {
                        target.add_row(row.to_vec());
                    }
                }
                Ok(None)
            }
            None => Ok(Some(result)),
        }
    }

    fn execute(&self, max_rows: usize, top: usize) -> ExecutorResult<(LocalResult, u64)> {
        let session = self.session.as_ref();
        let settings = session.database().settings();

        let mut limit = (max_rows > 0).then_some(max_rows);
        if let Some(expr) = &self.limit {
            if let Some(l) = self.evaluate_constant(expr)?.as_int().filter(|l| *l >= 0) {
                let l = l as usize;
                limit = Some(limit.map_or(l, |m| m.min(l)));
            }
        }
        let offset = match &self.offset {
            Some(expr) => self.evaluate_constant(expr)?.as_int().unwrap_or(0).max(0) as usize,
            None => 0,
        };

        let mut result = LocalResult::new(self.result_columns(), self.visible_column_count);
        if let Some(sort) = &self.sort {
            if !self.sort_using_index || self.distinct {
                result.set_sort_order(sort.clone());
            }
        }
        if self.distinct && !self.is_distinct_query {
            result.set_distinct();
        }

        let lock_rows = self.for_update && session.database().is_multi_version() && settings.select_for_update_mvcc;
        if lock_rows {
            let joined = self.filters[top].join().is_some() || self.filters[top].nested_join().is_some();
            if self.is_quick_aggregate_query {
                return Err(ExecutorError::unsupported("MVCC && FOR UPDATE && AGGREGATE"));
            } else if self.is_group_query {
                return Err(ExecutorError::unsupported("MVCC && FOR UPDATE && GROUP"));
            } else if self.distinct {
                return Err(ExecutorError::unsupported("MVCC && FOR UPDATE && DISTINCT"));
            } else if joined {
                return Err(ExecutorError::unsupported("MVCC && FOR UPDATE && JOIN"));
            }
        } else if self.for_update {
            let timeout = Duration::from_millis(settings.lock_timeout_ms);
            for f in chain_order(&self.filters, top) {
                self.filters[f].table().lock_exclusive(session, timeout)?;
            }
        }

        let scan = JoinScan::new(session, &self.filters, &self.parameters, &self.query_id);
        let mut visited = 0;
        if limit != Some(0) {
            if self.is_quick_aggregate_query {
                self.query_quick(&mut result)?;
            } else if self.is_group_query {
                if self.is_group_sorted_query {
                    self.query_group_sorted(&scan, top, &mut result)?;
                } else {
                    self.query_group(&scan, top, &mut result)?;
                }
            } else if self.is_distinct_query {
                visited = self.query_distinct(&scan, top, &mut result, limit, offset)?;
            } else {
                self.query_flat(&scan, top, &mut result, limit, offset, lock_rows)?;
            }
        }
        result.set_offset(offset);
        result.set_limit(limit);
        result.done();
        Ok((result, scan.rows_scanned() + visited))
    }

    fn context<'a>(&'a self, rows: &'a [Option<Row>]) -> EvalContext<'a> {
        EvalContext::new(&self.session, &self.filters, &self.parameters, rows)
    }

    fn evaluate_constant(&self, expr: &Expression) -> ExecutorResult<Value> {
        Ok(expr.value(&self.context(&[]))?)
    }

    fn sample_size(&self) -> ExecutorResult<usize> {
        match &self.sample_size {
            Some(expr) => Ok(self.evaluate_constant(expr)?.as_int().unwrap_or(0).max(0) as usize),
            None => Ok(0),
        }
    }

    fn passes_condition(&self, ctx: &EvalContext<'_>) -> ExecutorResult<bool> {
        match &self.condition {
            Some(condition) => Ok(condition.is_true(ctx)?),
            None => Ok(true),
        }
    }

    fn evaluate_row(&self, ctx: &EvalContext<'_>) -> ExecutorResult<Vec<Value>> {
        Ok(self
            .expressions
            .iter()
            .map(|e| e.value(ctx))
            .collect::<ExpressionResult<Vec<Value>>>()?)
    }

    fn query_quick(&self, result: &mut LocalResult) -> ExecutorResult<()> {
        let rows = vec![None; self.filters.len()];
        let ctx = self.context(&rows).quick();
        let row = self.evaluate_row(&ctx)?;
        result.add_row(row);
        Ok(())
    }

    fn query_flat(
        &self,
        scan: &JoinScan<'_>,
        top: usize,
        result: &mut LocalResult,
        limit: Option<usize>,
        offset: usize,
        lock_rows: bool,
    ) -> ExecutorResult<()> {
        // rows before the offset are produced too; the result drops them
        let limit = limit.map(|l| l.saturating_add(offset));
        let early_stop = self.sort.is_none() || self.sort_using_index;
        let sample_size = self.sample_size()?;
        let mut row_number = 0;
        let mut locked: Vec<Row> = Vec::new();
        scan.run(top, &mut |rows| {
            let ctx = self.context(rows);
            if !self.passes_condition(&ctx)? {
                return Ok(Flow::Continue);
            }
            let values = self.evaluate_row(&ctx)?;
            if lock_rows {
                if let Some(Some(row)) = rows.get(top) {
                    locked.push(row.clone());
                }
            }
            result.add_row(values);
            row_number += 1;
            if early_stop && limit.map_or(false, |l| result.row_count() >= l) {
                return Ok(Flow::Stop);
            }
            if sample_size > 0 && row_number >= sample_size {
                return Ok(Flow::Stop);
            }
            Ok(Flow::Continue)
        })?;
        if lock_rows {
            let table = self.filters[top].table();
            for row in &locked {
                table.lock_row(&self.session, row)?;
            }
        }
        Ok(())
    }

    fn group_key(&self, ctx: &EvalContext<'_>) -> ExecutorResult<ValueTuple> {
        match &self.group_index {
            None => Ok(ValueTuple::empty()),
            Some(group_index) => {
                let values = group_index
                    .iter()
                    .map(|&i| self.expressions[i].value(ctx))
                    .collect::<ExpressionResult<Vec<Value>>>()?;
                Ok(ValueTuple::new(values))
            }
        }
    }

    fn update_aggregates(&self, ctx: &EvalContext<'_>, group: &mut [Accumulator]) -> ExecutorResult<()> {
        for (i, expr) in self.expressions.iter().enumerate() {
            if !self.is_group_by_expression(i) {
                expr.update_aggregate(ctx, group)?;
            }
        }
        Ok(())
    }

    /// Output row of one group, or `None` when HAVING rejects it.
    fn group_row(
        &self,
        key: &[Value],
        group: &[Accumulator],
        apply_having: bool,
    ) -> ExecutorResult<Option<Vec<Value>>> {
        let rows = vec![None; self.filters.len()];
        let base = self.context(&rows);
        let ctx = base.with_group(group);
        let mut row = Vec::with_capacity(self.expressions.len());
        for (i, expr) in self.expressions.iter().enumerate() {
            let key_position = self
                .group_index
                .as_ref()
                .and_then(|g| g.iter().position(|&gi| gi == i));
            let value = match key_position {
                Some(k) => key.get(k).cloned().unwrap_or(Value::Null),
                None => expr.value(&ctx)?,
            };
            row.push(value);
        }
        if apply_having {
            if let Some(h) = self.having_index {
                if !row.get(h).map_or(false, Value::is_true) {
                    return Ok(None);
                }
            }
        }
        row.truncate(self.distinct_column_count);
        Ok(Some(row))
    }

    fn query_group(&self, scan: &JoinScan<'_>, top: usize, result: &mut LocalResult) -> ExecutorResult<()> {
        let sample_size = self.sample_size()?;
        let mut keys: Vec<ValueTuple> = Vec::new();
        let mut groups: HashMap<ValueTuple, Vec<Accumulator>> = HashMap::new();
        let mut row_number = 0;
        scan.run(top, &mut |rows| {
            let ctx = self.context(rows);
            if !self.passes_condition(&ctx)? {
                return Ok(Flow::Continue);
            }
            row_number += 1;
            let key = self.group_key(&ctx)?;
            let group = match groups.entry(key) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    keys.push(entry.key().clone());
                    entry.insert(Accumulator::group(&self.slots))
                }
            };
            self.update_aggregates(&ctx, group)?;
            if sample_size > 0 && row_number >= sample_size {
                return Ok(Flow::Stop);
            }
            Ok(Flow::Continue)
        })?;

        if self.group_index.is_none() && groups.is_empty() {
            // the implicit group of an aggregate over no rows; HAVING does not apply
            let group = Accumulator::group(&self.slots);
            if let Some(row) = self.group_row(&[], &group, false)? {
                result.add_row(row);
            }
            return Ok(());
        }
        for key in &keys {
            let Some(group) = groups.get(key) else {
                continue;
            };
            if let Some(row) = self.group_row(key.values(), group, true)? {
                result.add_row(row);
            }
        }
        Ok(())
    }

    /// Groups arrive contiguously in index order; a key change closes a group.
    fn query_group_sorted(&self, scan: &JoinScan<'_>, top: usize, result: &mut LocalResult) -> ExecutorResult<()> {
        let sample_size = self.sample_size()?;
        let mut current: Option<(ValueTuple, Vec<Accumulator>)> = None;
        let mut row_number = 0;
        scan.run(top, &mut |rows| {
            let ctx = self.context(rows);
            if !self.passes_condition(&ctx)? {
                return Ok(Flow::Continue);
            }
            row_number += 1;
            let key = self.group_key(&ctx)?;
            let same_group = matches!(&current, Some((k, _)) if *k == key);
            if !same_group {
                if let Some((previous, group)) = current.take() {
                    if let Some(row) = self.group_row(previous.values(), &group, true)? {
                        result.add_row(row);
                    }
                }
                current = Some((key, Accumulator::group(&self.slots)));
            }
            if let Some((_, group)) = &mut current {
                self.update_aggregates(&ctx, group)?;
            }
            if sample_size > 0 && row_number >= sample_size {
                return Ok(Flow::Stop);
            }
            Ok(Flow::Continue)
        })?;
        if let Some((key, group)) = current {
            if let Some(row) = self.group_row(key.values(), &group, true)? {
                result.add_row(row);
            }
        }
        Ok(())
    }

    /// Walks the distinct values of the index's first column, skipping
    /// every duplicate with one `find_next`. Returns the entries visited.
    fn query_distinct(
        &self,
        scan: &JoinScan<'_>,
        top: usize,
        result: &mut LocalResult,
        limit: Option<usize>,
        offset: usize,
    ) -> ExecutorResult<u64> {
        let limit = limit.map(|l| l.saturating_add(offset));
        let early_stop = self.sort.is_none() || self.sort_using_index;
        let sample_size = self.sample_size()?;
        let session = self.session.as_ref();
        let filter = &self.filters[top];
        let index = filter.index();
        let Some(column) = index.index_columns().first().map(|c| c.column_id()) else {
            return Ok(0);
        };
        let mut higher_than: Option<SearchRow> = None;
        let mut row_number = 0;
        let mut visited = 0;
        loop {
            scan.check_interrupt()?;
            let mut cursor = match &higher_than {
                None => index.find(session, None, None)?,
                Some(h) => index.find_next(session, h, None)?,
            };
            if !cursor.next()? {
                break;
            }
            visited += 1;
            let value = cursor
                .search_row()
                .and_then(|r| r.value(column))
                .cloned()
                .unwrap_or(Value::Null);
            let mut next = filter.table().template_row();
            next.set_value(column, value.clone());
            higher_than = Some(next);
            result.add_row(vec![value]);
            row_number += 1;
            if early_stop && limit.map_or(false, |l| row_number >= l) {
                break;
            }
            if sample_size > 0 && row_number >= sample_size {
                break;
            }
        }
        Ok(visited)
    }

    /// Empty result carrying the column metadata only.
    pub fn query_meta(&self) -> LocalResult {
        let mut result = LocalResult::new(self.result_columns(), self.visible_column_count);
        result.done();
        result
    }

    fn result_columns(&self) -> Vec<ResultColumn> {
        self.expressions
            .iter()
            .map(|e| ResultColumn {
                name: e
                    .alias_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| unenclose(&e.sql()).to_string()),
                data_type: e.data_type(),
                nullable: e.is_nullable(),
            })
            .collect()
    }

    // ==================================================================
    // Plan and metadata
    // ==================================================================

    fn strategy(&self) -> Strategy {
        if self.is_quick_aggregate_query {
            Strategy::Quick
        } else if self.is_group_query && self.is_group_sorted_query {
            Strategy::GroupSorted
        } else if self.is_group_query {
            Strategy::GroupHashed
        } else if self.is_distinct_query {
            Strategy::Distinct
        } else {
            Strategy::Flat
        }
    }

    /// Canonical statement text annotated with the chosen plan.
    pub fn plan_sql(&self) -> String {
        let mut buf = String::from("SELECT");
        if self.distinct {
            buf.push_str(" DISTINCT");
        }
        for (i, expr) in self.expressions.iter().take(self.visible_column_count).enumerate() {
            if i > 0 {
                buf.push(',');
            }
            let _ = write!(buf, "\n{}", indent(&expr.sql(), 4));
        }
        buf.push_str("\nFROM ");
        let chains: Vec<usize> = match self.top_filter {
            Some(top) => vec![top],
            None => self.top_filters.clone(),
        };
        let mut is_join = false;
        for start in chains {
            let mut next = Some(start);
            while let Some(f) = next {
                if is_join {
                    buf.push('\n');
                }
                self.write_filter_plan(&mut buf, f, is_join);
                is_join = true;
                next = self.filters[f].join();
            }
        }
        if let Some(condition) = &self.condition {
            let _ = write!(buf, "\nWHERE {}", unenclose(&condition.sql()));
        }
        if let Some(group_index) = &self.group_index {
            let keys: Vec<String> = group_index
                .iter()
                .map(|&i| unenclose(&self.expressions[i].non_alias().sql()).to_string())
                .collect();
            let _ = write!(buf, "\nGROUP BY {}", keys.join(", "));
        } else if !self.group.is_empty() {
            let keys: Vec<String> = self.group.iter().map(|g| unenclose(&g.sql()).to_string()).collect();
            let _ = write!(buf, "\nGROUP BY {}", keys.join(", "));
        }
        if let Some(h) = self.having_index {
            let _ = write!(buf, "\nHAVING {}", unenclose(&self.expressions[h].sql()));
        } else if let Some(having) = &self.having {
            let _ = write!(buf, "\nHAVING {}", unenclose(&having.sql()));
        }
        if let Some(sort) = &self.sort {
            let _ = write!(buf, "\nORDER BY {}", sort.sql(&self.expressions, self.visible_column_count));
        } else if !self.order.is_empty() {
            let order: Vec<String> = self.order.iter().map(SelectOrderBy::sql).collect();
            let _ = write!(buf, "\nORDER BY {}", order.join(", "));
        }
        if let Some(limit) = &self.limit {
            let _ = write!(buf, "\nLIMIT {}", unenclose(&limit.sql()));
        }
        if let Some(offset) = &self.offset {
            if self.limit.is_none() {
                buf.push('\n');
            } else {
                buf.push(' ');
            }
            let _ = write!(buf, "OFFSET {}", unenclose(&offset.sql()));
        }
        if let Some(sample_size) = &self.sample_size {
            let _ = write!(buf, "\nSAMPLE_SIZE {}", unenclose(&sample_size.sql()));
        }
        if self.for_update {
            buf.push_str("\nFOR UPDATE");
        }
        if self.is_quick_aggregate_query {
            buf.push_str("\n/* direct lookup */");
        }
        if self.is_distinct_query {
            buf.push_str("\n/* distinct */");
        }
        if self.sort_using_index {
            buf.push_str("\n/* index sorted */");
        }
        if self.is_group_query && self.is_group_sorted_query {
            buf.push_str("\n/* group sorted */");
        }
        buf
    }

    fn write_filter_plan(&self, buf: &mut String, f: usize, is_join: bool) {
        let filter = &self.filters[f];
        buf.push_str(&filter.plan_sql(is_join));
        let Some(nested) = filter.nested_join() else {
            return;
        };
        let mut inner = String::new();
        let mut next = Some(nested);
        while let Some(n) = next {
            if !inner.is_empty() {
                inner.push('\n');
            }
            self.write_filter_plan(&mut inner, n, true);
            next = self.filters[n].join();
        }
        let _ = write!(buf, "\n    (\n{}\n    )", indent(&inner, 8));
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    /// Estimated cost of the chosen plan.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn filters(&self) -> &[TableFilter] {
        &self.filters
    }

    pub fn top_filter(&self) -> Option<usize> {
        self.top_filter
    }

    /// Distinct tables read by the statement, in filter order.
    pub fn tables(&self) -> Vec<Arc<Table>> {
        let mut tables: Vec<Arc<Table>> = Vec::new();
        for filter in &self.filters {
            if !tables.iter().any(|t| t.id() == filter.table().id()) {
                tables.push(Arc::clone(filter.table()));
            }
        }
        tables
    }

    pub fn sort_order(&self) -> Option<&SortOrder> {
        self.sort.as_ref()
    }

    /// Number of visible result columns.
    pub fn column_count(&self) -> usize {
        self.visible_column_count
    }

    pub fn is_group_query(&self) -> bool {
        self.is_group_query
    }

    pub fn is_quick_aggregate_query(&self) -> bool {
        self.is_quick_aggregate_query
    }

    pub fn is_distinct_query(&self) -> bool {
        self.is_distinct_query
    }

    pub fn is_sort_using_index(&self) -> bool {
        self.sort_using_index
    }

    pub fn is_group_sorted_query(&self) -> bool {
        self.is_group_sorted_query
    }

    /// FOR UPDATE writes row locks.
    pub fn is_read_only(&self) -> bool {
        !self.for_update
    }

    pub fn is_cacheable(&self) -> bool {
        !self.for_update
    }
}

fn strategy_name(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::Quick => "quick",
        Strategy::GroupHashed => "group_hashed",
        Strategy::GroupSorted => "group_sorted",
        Strategy::Distinct => "distinct",
        Strategy::Flat => "flat",
    }
}

fn indent(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.lines()
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::AggregateKind;
    use crate::index::{IndexType, SortType};
    use crate::planner::PlannerErrorCode;
    use crate::table::{Column, Database};
    use crate::value::DataType;

    fn setup() -> (Arc<Database>, Arc<Session>, Arc<Table>) {
        let db = Database::in_memory();
        let table = db
            .create_table(
                "TEST",
                vec![
                    Column::new("ID", DataType::Int).not_null(),
                    Column::new("NAME", DataType::String),
                ],
                Some("ID"),
            )
            .unwrap();
        let session = db.create_session();
        for (id, name) in [(1, "a"), (2, "b"), (3, "a")] {
            table
                .insert(&session, vec![Value::Int(id), Value::from(name)])
                .unwrap();
        }
        (db, session, table)
    }

    fn select(session: &Arc<Session>, table: &Arc<Table>) -> Select {
        let mut select = Select::new(Arc::clone(session));
        select.add_table_filter(TableFilter::new(Arc::clone(table), None), true);
        select
    }

    #[test]
    fn test_init_twice_is_fatal() {
        let (_db, session, table) = setup();
        let mut s = select(&session, &table);
        s.set_expressions(vec![Expression::wildcard()]);
        s.init().unwrap();
        let err = s.init().unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::AeroQueryInternal);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_prepare_before_init_fails() {
        let (_db, session, table) = setup();
        let mut s = select(&session, &table);
        assert!(s.prepare().unwrap_err().is_fatal());
    }

    #[test]
    fn test_query_before_prepare_fails() {
        let (_db, session, table) = setup();
        let mut s = select(&session, &table);
        s.set_expressions(vec![Expression::wildcard()]);
        s.init().unwrap();
        let err = s.query(0, None).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::AeroExecutionNotPrepared);
    }

    #[test]
    fn test_wildcard_expands_in_column_order() {
        let (_db, session, table) = setup();
        let mut s = select(&session, &table);
        s.set_expressions(vec![Expression::wildcard()]);
        s.init().unwrap();
        s.prepare().unwrap();
        assert_eq!(s.column_count(), 2);
        let result = s.query(0, None).unwrap().unwrap();
        let names: Vec<&str> = result.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ID", "NAME"]);
        assert_eq!(result.rows().len(), 3);
    }

    #[test]
    fn test_unknown_wildcard_table() {
        let (_db, session, table) = setup();
        let mut s = select(&session, &table);
        s.set_expressions(vec![Expression::table_wildcard("X")]);
        let err = s.init().unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::AeroQueryTableNotFound);
    }

    #[test]
    fn test_order_by_hidden_column() {
        let (_db, session, table) = setup();
        let mut s = select(&session, &table);
        s.set_expressions(vec![Expression::column("NAME")]);
        s.set_order(vec![SelectOrderBy::expression(Expression::column("ID")).desc()]);
        s.init().unwrap();
        s.prepare().unwrap();
        assert_eq!(s.column_count(), 1);
        let result = s.query(0, None).unwrap().unwrap();
        assert_eq!(
            result.rows(),
            vec![vec![Value::from("a")], vec![Value::from("b")], vec![Value::from("a")]]
        );
    }

    #[test]
    fn test_group_by_alias() {
        let (_db, session, table) = setup();
        let mut s = select(&session, &table);
        s.set_expressions(vec![
            Expression::column("NAME").alias("N"),
            Expression::count_all(),
        ]);
        s.set_group_by(vec![Expression::column("N")]);
        s.set_order(vec![SelectOrderBy::ordinal(1)]);
        s.init().unwrap();
        s.prepare().unwrap();
        let result = s.query(0, None).unwrap().unwrap();
        assert_eq!(
            result.rows(),
            vec![
                vec![Value::from("a"), Value::Int(2)],
                vec![Value::from("b"), Value::Int(1)],
            ]
        );
    }

    #[test]
    fn test_column_not_in_group_by() {
        let (_db, session, table) = setup();
        let mut s = select(&session, &table);
        s.set_expressions(vec![Expression::column("ID"), Expression::count_all()]);
        s.set_group_by(vec![Expression::column("NAME")]);
        let err = s.init().unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::AeroQueryNotInGroupBy);
    }

    #[test]
    fn test_empty_aggregate_emits_one_row() {
        let (_db, session, table) = setup();
        let mut s = select(&session, &table);
        s.set_expressions(vec![
            Expression::count_all(),
            Expression::aggregate(AggregateKind::Sum, Expression::column("ID")),
        ]);
        s.add_condition(Expression::compare(
            CompareOp::Gt,
            Expression::column("ID"),
            Expression::literal(10),
        ));
        s.init().unwrap();
        s.prepare().unwrap();
        assert!(!s.is_quick_aggregate_query());
        let result = s.query(0, None).unwrap().unwrap();
        assert_eq!(result.rows(), vec![vec![Value::Int(0), Value::Null]]);
    }

    #[test]
    fn test_global_condition_routing() {
        let (db, session, table) = setup();
        db.create_index(&session, "TEST", "IDX_NAME", &[("NAME", SortType::ASCENDING)], IndexType::non_unique())
            .unwrap();
        let mut s = select(&session, &table);
        s.set_expressions(vec![Expression::column("NAME"), Expression::count_all().alias("C")]);
        s.set_group_by(vec![Expression::column("NAME")]);
        s.init().unwrap();
        assert!(s.allow_global_conditions());
        s.add_global_condition(0, 0, CompareOp::Eq).unwrap();
        s.add_global_condition(1, 1, CompareOp::Ge).unwrap();
        s.set_parameter(0, Value::from("a"));
        s.set_parameter(1, Value::Int(2));
        s.prepare().unwrap();
        let plan = s.plan_sql();
        assert!(plan.contains("WHERE NAME = ?1") || plan.contains("WHERE TEST.NAME = ?1"), "{}", plan);
        assert!(plan.contains("HAVING COUNT(*) >= ?2"), "{}", plan);
        let result = s.query(0, None).unwrap().unwrap();
        assert_eq!(result.rows(), vec![vec![Value::from("a"), Value::Int(2)]]);

        let err = s.add_global_condition(0, 0, CompareOp::Eq).unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::AeroQueryInternal);
    }

    #[test]
    fn test_plan_lists_clauses() {
        let (_db, session, table) = setup();
        let mut s = select(&session, &table);
        s.set_expressions(vec![Expression::column("ID")]);
        s.add_condition(Expression::compare(
            CompareOp::Ge,
            Expression::column("ID"),
            Expression::literal(2),
        ));
        s.set_limit(Expression::literal(5));
        s.set_offset(Expression::literal(1));
        s.set_sample_size(Expression::literal(100));
        s.init().unwrap();
        s.prepare().unwrap();
        let plan = s.plan_sql();
        assert!(plan.starts_with("SELECT\n    TEST.ID\nFROM TEST\n    /* TEST.tableScan: ID >= 2 */"), "{}", plan);
        assert!(plan.contains("\nWHERE TEST.ID >= 2"), "{}", plan);
        assert!(plan.contains("\nLIMIT 5 OFFSET 1"), "{}", plan);
        assert!(plan.contains("\nSAMPLE_SIZE 100"), "{}", plan);
    }

    #[test]
    fn test_query_meta_has_no_rows() {
        let (_db, session, table) = setup();
        let mut s = select(&session, &table);
        s.set_expressions(vec![Expression::column("ID"), Expression::count_all().alias("N")]);
        s.set_group_by(vec![Expression::column("ID")]);
        s.init().unwrap();
        s.prepare().unwrap();
        let mut meta = s.query_meta();
        assert!(!meta.next());
        let columns = meta.columns();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[1].name, "N");
        assert_eq!(columns[1].data_type, Some(DataType::Int));
        assert!(!columns[1].nullable);
    }
}
