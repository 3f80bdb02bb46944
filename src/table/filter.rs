//! Table filters
//!
//! A table filter is one table occurrence in a statement's FROM list: the
//! table, its alias, the index chosen to scan it and the conditions pushed
//! into that index. Filters live in an arena owned by the statement and
//! link to each other by position:
//! - `join` is the next filter of the same chain
//! - `nested_join` is the first filter of a parenthesized sub-chain,
//!   scanned as a unit for every row of this filter

use std::fmt::Write as _;
use std::sync::Arc;

use super::Table;
use crate::expression::{unenclose, Expression};
use crate::index::Index;
use crate::planner::{IndexComparison, IndexCondition};

#[derive(Clone)]
pub struct TableFilter {
    table: Arc<Table>,
    alias: String,
    index: Option<Arc<dyn Index>>,
    index_conditions: Vec<IndexCondition>,
    join: Option<usize>,
    nested_join: Option<usize>,
    join_outer: bool,
    /// Inside the nested sub-chain of an outer joined filter
    join_outer_indirect: bool,
    join_condition: Option<Expression>,
    /// Columns merged into an earlier filter by a natural join
    natural_columns: Vec<usize>,
    /// Position in scan order once the plan is fixed
    scan_position: Option<usize>,
}

impl TableFilter {
    pub fn new(table: Arc<Table>, alias: Option<&str>) -> Self {
        let alias = alias.unwrap_or_else(|| table.name()).to_string();
        Self {
            table,
            alias,
            index: None,
            index_conditions: Vec::new(),
            join: None,
            nested_join: None,
            join_outer: false,
            join_outer_indirect: false,
            join_condition: None,
            natural_columns: Vec::new(),
            scan_position: None,
        }
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Alias, or the table name when none was given.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Index the filter scans; the scan index until the planner picks another.
    pub fn index(&self) -> Arc<dyn Index> {
        match &self.index {
            Some(index) => Arc::clone(index),
            None => {
                let scan: Arc<dyn Index> = self.table.scan_index().clone();
                scan
            }
        }
    }

    pub fn set_index(&mut self, index: Arc<dyn Index>) {
        self.index = Some(index);
    }

    pub fn index_conditions(&self) -> &[IndexCondition] {
        &self.index_conditions
    }

    pub fn add_index_condition(&mut self, condition: IndexCondition) {
        self.index_conditions.push(condition);
    }

    pub fn has_in_comparisons(&self) -> bool {
        self.index_conditions
            .iter()
            .any(|c| c.comparison == IndexComparison::InList)
    }

    pub fn join(&self) -> Option<usize> {
        self.join
    }

    pub(crate) fn set_join(&mut self, join: Option<usize>) {
        self.join = join;
    }

    pub fn nested_join(&self) -> Option<usize> {
        self.nested_join
    }

    pub(crate) fn set_nested_join(&mut self, nested: Option<usize>) {
        self.nested_join = nested;
    }

    pub fn is_join_outer(&self) -> bool {
        self.join_outer
    }

    pub(crate) fn set_join_outer(&mut self, outer: bool) {
        self.join_outer = outer;
    }

    pub fn is_join_outer_indirect(&self) -> bool {
        self.join_outer_indirect
    }

    pub(crate) fn set_join_outer_indirect(&mut self, indirect: bool) {
        self.join_outer_indirect = indirect;
    }

    pub fn join_condition(&self) -> Option<&Expression> {
        self.join_condition.as_ref()
    }

    pub(crate) fn join_condition_mut(&mut self) -> Option<&mut Expression> {
        self.join_condition.as_mut()
    }

    pub(crate) fn set_join_condition(&mut self, condition: Option<Expression>) {
        self.join_condition = condition;
    }

    pub(crate) fn take_join_condition(&mut self) -> Option<Expression> {
        self.join_condition.take()
    }

    /// Marks a column as merged into an earlier filter.
    pub fn add_natural_column(&mut self, column_id: usize) {
        if !self.natural_columns.contains(&column_id) {
            self.natural_columns.push(column_id);
        }
    }

    pub fn is_natural_join_column(&self, column_id: usize) -> bool {
        self.natural_columns.contains(&column_id)
    }

    pub fn scan_position(&self) -> Option<usize> {
        self.scan_position
    }

    pub(crate) fn set_scan_position(&mut self, position: Option<usize>) {
        self.scan_position = position;
    }

    /// Plan line for this filter; `is_join` prefixes the join keyword and appends ON.
    pub fn plan_sql(&self, is_join: bool) -> String {
        let mut buf = String::new();
        if is_join {
            buf.push_str(if self.join_outer {
                "LEFT OUTER JOIN "
            } else {
                "INNER JOIN "
            });
        }
        buf.push_str(self.table.name());
        if !self.alias.eq_ignore_ascii_case(self.table.name()) {
            let _ = write!(buf, " {}", self.alias);
        }
        let mut plan = self.index().plan_sql();
        if !self.index_conditions.is_empty() {
            let conditions: Vec<String> = self.index_conditions.iter().map(IndexCondition::sql).collect();
            let _ = write!(plan, ": {}", conditions.join(" AND "));
        }
        let _ = write!(buf, "\n    /* {} */", plan);
        if is_join {
            match &self.join_condition {
                Some(on) => {
                    let _ = write!(buf, "\n    ON {}", unenclose(&on.sql()));
                }
                None => buf.push_str("\n    ON 1=1"),
            }
        }
        buf
    }
}

impl std::fmt::Debug for TableFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableFilter")
            .field("table", &self.table.name())
            .field("alias", &self.alias)
            .field("join", &self.join)
            .field("nested_join", &self.nested_join)
            .field("join_outer", &self.join_outer)
            .finish()
    }
}
