//! ORDER BY normalization
//!
//! `init_order` resolves every ORDER BY entry to a position in the
//! expression list, reusing a select-list expression when one matches and
//! appending the entry otherwise. `prepare_order` turns the positions into
//! one `SortOrder`.

use super::errors::{PlannerError, PlannerResult};
use super::sort::SortOrder;
use crate::expression::{unenclose, Expression};
use crate::index::{NullOrdering, SortType};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct SelectOrderBy {
    /// Expression to order by, `None` when ordering by position
    pub expression: Option<Expression>,
    /// One-based position in the expression list; negative reverses direction
    pub position: Option<Expression>,
    pub descending: bool,
    pub nulls: NullOrdering,
}

impl SelectOrderBy {
    pub fn expression(expression: Expression) -> Self {
        Self {
            expression: Some(expression),
            position: None,
            descending: false,
            nulls: NullOrdering::Default,
        }
    }

    pub fn ordinal(position: i64) -> Self {
        Self {
            expression: None,
            position: Some(Expression::literal(position)),
            descending: false,
            nulls: NullOrdering::Default,
        }
    }

    /// Position taken from a statement parameter.
    pub fn parameter(index: usize) -> Self {
        Self {
            expression: None,
            position: Some(Expression::param(index)),
            descending: false,
            nulls: NullOrdering::Default,
        }
    }

    pub fn desc(mut self) -> Self {
        self.descending = true;
        self
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = NullOrdering::First;
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = NullOrdering::Last;
        self
    }

    pub fn sql(&self) -> String {
        let mut buf = match (&self.expression, &self.position) {
            (Some(e), _) => format!("={}", unenclose(&e.sql())),
            (None, Some(p)) => p.sql(),
            (None, None) => String::new(),
        };
        let sort = SortType {
            descending: self.descending,
            nulls: self.nulls,
        };
        buf.push_str(&sort.sql());
        buf
    }
}

fn eq_ident(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Finds the visible expression an ORDER BY column refers to.
fn match_visible_column(
    expressions: &[Expression],
    visible: usize,
    order: &Expression,
    filter_aliases: &[String],
) -> Option<usize> {
    let column = order.as_column()?;
    for (j, candidate) in expressions.iter().take(visible).enumerate() {
        let found = match candidate {
            Expression::Column(c) => {
                let mut found = eq_ident(&column.name, &c.name);
                if found {
                    if let Some(qualifier) = &column.qualifier {
                        found = match &c.qualifier {
                            // select id from test order by test.id
                            None => filter_aliases.iter().any(|a| eq_ident(a, qualifier)),
                            Some(q) => eq_ident(q, qualifier),
                        };
                    }
                }
                found
            }
            Expression::Alias { alias, .. } if column.qualifier.is_none() && eq_ident(&column.name, alias) => {
                true
            }
            Expression::Alias { expr, .. } => match expr.non_alias() {
                Expression::Column(c) => {
                    eq_ident(&column.name, &c.name) && eq_ident(&order.sql(), &expr.sql())
                }
                _ => false,
            },
            _ => false,
        };
        if found {
            return Some(j);
        }
    }
    None
}

/// Resolves ORDER BY entries against the expression list, appending missing ones.
pub fn init_order(
    expressions: &mut Vec<Expression>,
    expression_sql: &mut Vec<String>,
    order: &mut [SelectOrderBy],
    visible: usize,
    must_be_in_result: bool,
    filter_aliases: &[String],
) -> PlannerResult<()> {
    for o in order.iter_mut() {
        let Some(e) = o.expression.as_ref() else {
            continue;
        };
        let found = if e.as_column().is_some() && matches!(e, Expression::Column(_)) {
            match_visible_column(expressions, visible, e, filter_aliases)
        } else {
            let sql = e.sql();
            expression_sql.iter().position(|s| eq_ident(s, &sql))
        };
        let idx = match found {
            Some(idx) => idx,
            None => {
                if must_be_in_result {
                    return Err(PlannerError::order_by_not_in_result(&e.sql()));
                }
                expressions.push(e.clone());
                expression_sql.push(e.sql());
                expressions.len() - 1
            }
        };
        o.position = Some(Expression::literal(idx as i64 + 1));
    }
    Ok(())
}

/// Builds the sort order from resolved positions.
///
/// A position parameter that is not set yet orders by the first column.
pub fn prepare_order(
    order: &[SelectOrderBy],
    expression_count: usize,
    parameters: &[Option<Value>],
) -> PlannerResult<SortOrder> {
    let mut indexes = Vec::with_capacity(order.len());
    let mut sort_types = Vec::with_capacity(order.len());
    for o in order {
        let position = match &o.position {
            Some(Expression::Literal(v)) => v.as_int(),
            Some(Expression::Parameter(i)) => parameters.get(*i).cloned().flatten().and_then(|v| v.as_int()),
            _ => None,
        };
        let (idx, reverse) = match position {
            None => (0, false),
            Some(p) => {
                let reverse = p < 0;
                let idx = p.abs() - 1;
                if idx < 0 || idx as usize >= expression_count {
                    return Err(PlannerError::order_by_out_of_range(p));
                }
                (idx as usize, reverse)
            }
        };
        indexes.push(idx);
        sort_types.push(SortType {
            descending: o.descending != reverse,
            nulls: o.nulls,
        });
    }
    Ok(SortOrder::new(indexes, sort_types))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PlannerErrorCode;

    fn columns(names: &[&str]) -> Vec<Expression> {
        names.iter().map(|n| Expression::column(*n)).collect()
    }

    #[test]
    fn test_order_by_reuses_select_list_column() {
        let mut exprs = columns(&["ID", "NAME"]);
        let mut sql: Vec<String> = exprs.iter().map(Expression::sql).collect();
        let mut order = vec![SelectOrderBy::expression(Expression::column("name"))];
        init_order(&mut exprs, &mut sql, &mut order, 2, false, &[]).unwrap();
        assert_eq!(exprs.len(), 2);
        let sort = prepare_order(&order, exprs.len(), &[]).unwrap();
        assert_eq!(sort.indexes(), &[1]);
    }

    #[test]
    fn test_order_by_alias() {
        let mut exprs = vec![Expression::count_all().alias("N")];
        let mut sql: Vec<String> = exprs.iter().map(|e| e.non_alias().sql()).collect();
        let mut order = vec![SelectOrderBy::expression(Expression::column("n")).desc()];
        init_order(&mut exprs, &mut sql, &mut order, 1, false, &[]).unwrap();
        assert_eq!(exprs.len(), 1);
        let sort = prepare_order(&order, 1, &[]).unwrap();
        assert!(sort.sort_types()[0].descending);
    }

    #[test]
    fn test_missing_order_by_expression_is_appended() {
        let mut exprs = columns(&["NAME"]);
        let mut sql: Vec<String> = exprs.iter().map(Expression::sql).collect();
        let mut order = vec![SelectOrderBy::expression(Expression::column("ID"))];
        init_order(&mut exprs, &mut sql, &mut order, 1, false, &[]).unwrap();
        assert_eq!(exprs.len(), 2);
        assert_eq!(prepare_order(&order, 2, &[]).unwrap().indexes(), &[1]);
    }

    #[test]
    fn test_distinct_requires_order_by_in_result() {
        let mut exprs = columns(&["NAME"]);
        let mut sql: Vec<String> = exprs.iter().map(Expression::sql).collect();
        let mut order = vec![SelectOrderBy::expression(Expression::column("ID"))];
        let err = init_order(&mut exprs, &mut sql, &mut order, 1, true, &[]).unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::AeroQueryOrderByNotInResult);
    }

    #[test]
    fn test_negative_ordinal_reverses() {
        let order = vec![SelectOrderBy::ordinal(-2)];
        let sort = prepare_order(&order, 2, &[]).unwrap();
        assert_eq!(sort.indexes(), &[1]);
        assert!(sort.sort_types()[0].descending);
    }

    #[test]
    fn test_ordinal_out_of_range() {
        let err = prepare_order(&[SelectOrderBy::ordinal(3)], 2, &[]).unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::AeroQueryOrderByOutOfRange);
        let err = prepare_order(&[SelectOrderBy::ordinal(0)], 2, &[]).unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::AeroQueryOrderByOutOfRange);
    }

    #[test]
    fn test_unset_position_parameter_orders_by_first_column() {
        let sort = prepare_order(&[SelectOrderBy::parameter(0)], 2, &[None]).unwrap();
        assert_eq!(sort.indexes(), &[0]);
    }
}
