//! Index conditions
//!
//! A WHERE or ON comparison of the form `column op expr`, where `column`
//! belongs to one filter and `expr` does not read that filter, becomes an
//! index condition of the filter. The filter's cursor turns the usable
//! conditions into first/last search rows, or walks an IN list.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use crate::expression::{unenclose, AndOrOp, CompareOp, EvalContext, Expression, ExpressionResult};
use crate::index::{mask, Index};
use crate::table::Column;
use crate::value::{SearchRow, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexComparison {
    Equal,
    EqualNullSafe,
    Bigger,
    BiggerEqual,
    Smaller,
    SmallerEqual,
    InList,
}

impl IndexComparison {
    fn from_compare(op: CompareOp) -> Option<Self> {
        match op {
            CompareOp::Eq => Some(IndexComparison::Equal),
            CompareOp::EqNullSafe => Some(IndexComparison::EqualNullSafe),
            CompareOp::Gt => Some(IndexComparison::Bigger),
            CompareOp::Ge => Some(IndexComparison::BiggerEqual),
            CompareOp::Lt => Some(IndexComparison::Smaller),
            CompareOp::Le => Some(IndexComparison::SmallerEqual),
            CompareOp::NotEq => None,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            IndexComparison::Equal => " = ",
            IndexComparison::EqualNullSafe => " IS ",
            IndexComparison::Bigger => " > ",
            IndexComparison::BiggerEqual => " >= ",
            IndexComparison::Smaller => " < ",
            IndexComparison::SmallerEqual => " <= ",
            IndexComparison::InList => " IN",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexCondition {
    pub column: Arc<Column>,
    pub comparison: IndexComparison,
    /// Compared value; `None` for IN lists
    pub expression: Option<Expression>,
    pub list: Vec<Expression>,
}

impl IndexCondition {
    /// Lookup mask this condition contributes for its column.
    pub fn mask(&self) -> u8 {
        match self.comparison {
            IndexComparison::Equal | IndexComparison::EqualNullSafe | IndexComparison::InList => {
                mask::EQUALITY
            }
            IndexComparison::Bigger | IndexComparison::BiggerEqual => mask::START,
            IndexComparison::Smaller | IndexComparison::SmallerEqual => mask::END,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(
            self.comparison,
            IndexComparison::Equal
                | IndexComparison::EqualNullSafe
                | IndexComparison::Bigger
                | IndexComparison::BiggerEqual
        )
    }

    pub fn is_end(&self) -> bool {
        matches!(
            self.comparison,
            IndexComparison::Equal
                | IndexComparison::EqualNullSafe
                | IndexComparison::Smaller
                | IndexComparison::SmallerEqual
        )
    }

    /// Whether the compared values only read filters `bound` accepts.
    pub fn is_evaluatable(&self, bound: &dyn Fn(usize) -> bool) -> bool {
        match &self.expression {
            Some(e) => e.is_evaluatable(bound),
            None => self.list.iter().all(|e| e.is_evaluatable(bound)),
        }
    }

    pub fn sql(&self) -> String {
        match &self.expression {
            Some(e) => format!("{}{}{}", self.column.name(), self.comparison.sql(), e.sql()),
            None => {
                let list: Vec<String> = self.list.iter().map(|e| unenclose(&e.sql()).to_string()).collect();
                format!("{} IN({})", self.column.name(), list.join(", "))
            }
        }
    }
}

fn filter_column(expr: &Expression, filter: usize) -> Option<&Arc<Column>> {
    match expr {
        Expression::Column(c) if c.filter() == Some(filter) => c.column(),
        _ => None,
    }
}

/// Collects the index conditions `expr` implies for `filter`.
///
/// Only the AND spine is searched; an OR branch restricts nothing on its own.
pub fn create_index_conditions(expr: &Expression, filter: usize, out: &mut Vec<IndexCondition>) {
    match expr {
        Expression::AndOr {
            op: AndOrOp::And,
            left,
            right,
        } => {
            create_index_conditions(left, filter, out);
            create_index_conditions(right, filter, out);
        }
        Expression::Comparison { op, left, right } => {
            let found = if let Some(column) = filter_column(left, filter) {
                (!right.references_filter(filter) && !right.contains_aggregate())
                    .then(|| (column, *op, right.as_ref()))
            } else if let Some(column) = filter_column(right, filter) {
                (!left.references_filter(filter) && !left.contains_aggregate())
                    .then(|| (column, op.reverse(), left.as_ref()))
            } else {
                None
            };
            if let Some((column, op, value)) = found {
                if let Some(comparison) = IndexComparison::from_compare(op) {
                    out.push(IndexCondition {
                        column: Arc::clone(column),
                        comparison,
                        expression: Some(value.clone()),
                        list: Vec::new(),
                    });
                }
            }
        }
        Expression::InList { left, values } => {
            if let Some(column) = filter_column(left, filter) {
                if !values.is_empty()
                    && values
                        .iter()
                        .all(|v| !v.references_filter(filter) && !v.contains_aggregate())
                {
                    out.push(IndexCondition {
                        column: Arc::clone(column),
                        comparison: IndexComparison::InList,
                        expression: None,
                        list: values.clone(),
                    });
                }
            }
        }
        _ => {}
    }
}

/// Search bounds of one cursor over an index.
#[derive(Debug, Default)]
pub struct CursorBounds {
    /// No row can satisfy the conditions
    pub always_false: bool,
    pub first: Option<SearchRow>,
    pub last: Option<SearchRow>,
    /// Column walked by value, with the distinct values to look up
    pub in_list: Option<(usize, Vec<Value>)>,
}

/// Computes the cursor bounds for the usable conditions of one filter.
pub fn cursor_bounds(
    conditions: &[IndexCondition],
    index: &dyn Index,
    column_count: usize,
    ctx: &EvalContext<'_>,
    usable: &dyn Fn(&IndexCondition) -> bool,
) -> ExpressionResult<CursorBounds> {
    let mut bounds = CursorBounds::default();
    for condition in conditions {
        if !usable(condition) {
            continue;
        }
        let column_id = condition.column.column_id();
        let Some(position) = index.column_position(column_id) else {
            continue;
        };
        let sort_type = index.index_columns()[position].sort_type;
        let Some(expression) = &condition.expression else {
            // an X = ? condition produces fewer rows than X IN(...)
            if bounds.first.is_none() && bounds.last.is_none() && position == 0 {
                let mut seen = HashSet::new();
                let mut values = Vec::new();
                for e in &condition.list {
                    let v = e.value(ctx)?;
                    if !v.is_null() && seen.insert(v.clone()) {
                        values.push(v);
                    }
                }
                if values.is_empty() {
                    bounds.always_false = true;
                    return Ok(bounds);
                }
                bounds.in_list = Some((column_id, values));
            }
            continue;
        };
        let value = expression.value(ctx)?;
        if value.is_null() && condition.comparison != IndexComparison::EqualNullSafe {
            bounds.always_false = true;
            return Ok(bounds);
        }
        let (mut is_start, mut is_end) = (condition.is_start(), condition.is_end());
        if sort_type.descending {
            std::mem::swap(&mut is_start, &mut is_end);
        }
        if is_start {
            tighten(&mut bounds.first, column_count, column_id, &value, |ord| {
                index_order(ord, sort_type.descending) == Ordering::Greater
            });
        }
        if is_end {
            tighten(&mut bounds.last, column_count, column_id, &value, |ord| {
                index_order(ord, sort_type.descending) == Ordering::Less
            });
        }
        if is_start || is_end {
            bounds.in_list = None;
        }
    }
    Ok(bounds)
}

fn index_order(ord: Ordering, descending: bool) -> Ordering {
    if descending {
        ord.reverse()
    } else {
        ord
    }
}

/// Sets `column` of the bound to `value` unless the bound already holds a tighter one.
fn tighten(
    bound: &mut Option<SearchRow>,
    column_count: usize,
    column: usize,
    value: &Value,
    replaces: impl Fn(Ordering) -> bool,
) {
    let row = bound.get_or_insert_with(|| SearchRow::template(column_count));
    let replace = match row.value(column) {
        None => true,
        Some(current) => replaces(value.compare_sql(current)),
    };
    if replace {
        row.set_value(column, value.clone());
    }
}
