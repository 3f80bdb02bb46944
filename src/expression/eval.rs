//! Expression evaluation
//!
//! Three evaluation modes share one entry point:
//! - row mode: columns read the current row of their filter
//! - group mode: aggregates and grouped columns read the group's accumulators
//! - quick mode: aggregates answer from row counts and index ends

use std::cmp::Ordering;

use super::aggregate::{Accumulator, AggregateKind};
use super::errors::{ExpressionError, ExpressionResult};
use super::expr::{Aggregate, AndOrOp, CompareOp, Expression};
use crate::index::Index;
use crate::table::{Session, TableFilter};
use crate::value::{Row, Value};

pub struct EvalContext<'a> {
    pub session: &'a Session,
    pub filters: &'a [TableFilter],
    pub parameters: &'a [Option<Value>],
    /// Current row per filter; `None` is the null row of an outer join
    pub rows: &'a [Option<Row>],
    pub group: Option<&'a [Accumulator]>,
    pub quick: bool,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        session: &'a Session,
        filters: &'a [TableFilter],
        parameters: &'a [Option<Value>],
        rows: &'a [Option<Row>],
    ) -> Self {
        Self {
            session,
            filters,
            parameters,
            rows,
            group: None,
            quick: false,
        }
    }

    pub fn with_group(&self, group: &'a [Accumulator]) -> Self {
        Self {
            group: Some(group),
            ..*self
        }
    }

    pub fn quick(&self) -> Self {
        Self { quick: true, ..*self }
    }

    fn parameter(&self, index: usize) -> ExpressionResult<Value> {
        self.parameters
            .get(index)
            .cloned()
            .flatten()
            .ok_or_else(|| ExpressionError::parameter_not_set(index))
    }
}

/// SQL comparison with three-valued NULL handling.
pub fn compare_values(op: CompareOp, left: &Value, right: &Value) -> Value {
    if op == CompareOp::EqNullSafe {
        return Value::Bool(left.is_null() == right.is_null() && (left.is_null() || left.compare_sql(right) == Ordering::Equal));
    }
    if left.is_null() || right.is_null() {
        return Value::Null;
    }
    let ord = left.compare_sql(right);
    Value::Bool(match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::NotEq => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Ge => ord != Ordering::Less,
        CompareOp::EqNullSafe => ord == Ordering::Equal,
    })
}

pub fn and_or(op: AndOrOp, left: Value, right: Value) -> Value {
    let dominant = op == AndOrOp::Or;
    if left == Value::Bool(dominant) || right == Value::Bool(dominant) {
        return Value::Bool(dominant);
    }
    if left.is_null() || right.is_null() {
        return Value::Null;
    }
    Value::Bool(!dominant)
}

impl Expression {
    pub fn value(&self, ctx: &EvalContext<'_>) -> ExpressionResult<Value> {
        match self {
            Expression::Column(c) => {
                if let (Some(group), Some(slot)) = (ctx.group, c.slot) {
                    return Ok(group.get(slot).map_or(Value::Null, Accumulator::value));
                }
                let binding = c.binding.as_ref().ok_or_else(|| ExpressionError::unbound(&self.sql()))?;
                Ok(match ctx.rows.get(binding.filter) {
                    Some(Some(row)) => row.value(binding.column.column_id()).clone(),
                    _ => Value::Null,
                })
            }
            Expression::Literal(v) => Ok(v.clone()),
            Expression::Parameter(i) => ctx.parameter(*i),
            Expression::Comparison { op, left, right } => {
                let l = left.value(ctx)?;
                let r = right.value(ctx)?;
                Ok(compare_values(*op, &l, &r))
            }
            Expression::InList { left, values } => {
                let l = left.value(ctx)?;
                if l.is_null() {
                    return Ok(Value::Null);
                }
                let mut saw_null = false;
                for candidate in values {
                    let v = candidate.value(ctx)?;
                    match compare_values(CompareOp::Eq, &l, &v) {
                        Value::Bool(true) => return Ok(Value::Bool(true)),
                        Value::Null => saw_null = true,
                        _ => {}
                    }
                }
                Ok(if saw_null { Value::Null } else { Value::Bool(false) })
            }
            Expression::AndOr { op, left, right } => {
                let l = left.value(ctx)?;
                // short circuit on the dominant value
                if l == Value::Bool(*op == AndOrOp::Or) {
                    return Ok(l);
                }
                let r = right.value(ctx)?;
                Ok(and_or(*op, l, r))
            }
            Expression::Aggregate(agg) => {
                if ctx.quick {
                    return agg.quick_value(ctx);
                }
                match (ctx.group, agg.slot) {
                    (Some(group), Some(slot)) => Ok(group.get(slot).map_or(Value::Null, Accumulator::value)),
                    _ => Err(ExpressionError::unbound(&self.sql())),
                }
            }
            Expression::Wildcard { .. } => Err(ExpressionError::unbound(&self.sql())),
            Expression::Alias { expr, .. } => expr.value(ctx),
        }
    }

    /// Only `TRUE` passes a condition.
    pub fn is_true(&self, ctx: &EvalContext<'_>) -> ExpressionResult<bool> {
        Ok(self.value(ctx)?.is_true())
    }

    /// Feeds the current row into the group's accumulators.
    pub fn update_aggregate(&self, ctx: &EvalContext<'_>, group: &mut [Accumulator]) -> ExpressionResult<()> {
        match self {
            Expression::Aggregate(agg) => {
                let Some(slot) = agg.slot else {
                    return Err(ExpressionError::unbound(&self.sql()));
                };
                let value = match &agg.arg {
                    Some(arg) => arg.value(ctx)?,
                    None => Value::Null,
                };
                if let Some(acc) = group.get_mut(slot) {
                    acc.add(value);
                }
                Ok(())
            }
            Expression::Column(c) => {
                if let Some(slot) = c.slot {
                    let value = self.value(ctx)?;
                    if let Some(acc) = group.get_mut(slot) {
                        acc.add(value);
                    }
                }
                Ok(())
            }
            Expression::Comparison { left, right, .. } | Expression::AndOr { left, right, .. } => {
                left.update_aggregate(ctx, group)?;
                right.update_aggregate(ctx, group)
            }
            Expression::InList { left, values } => {
                left.update_aggregate(ctx, group)?;
                for v in values {
                    v.update_aggregate(ctx, group)?;
                }
                Ok(())
            }
            Expression::Alias { expr, .. } => expr.update_aggregate(ctx, group),
            Expression::Literal(_) | Expression::Parameter(_) | Expression::Wildcard { .. } => Ok(()),
        }
    }
}

impl Aggregate {
    fn quick_value(&self, ctx: &EvalContext<'_>) -> ExpressionResult<Value> {
        match self.kind {
            AggregateKind::CountAll | AggregateKind::Count => {
                let Some(filter) = ctx.filters.first() else {
                    return Ok(Value::Int(0));
                };
                let count = filter.table().scan_index().row_count(ctx.session)?;
                Ok(Value::Int(count as i64))
            }
            AggregateKind::Min | AggregateKind::Max => {
                let Some(index) = self.quick_index(ctx.filters) else {
                    return Err(ExpressionError::unbound(&format!("{}(...)", self.kind.name())));
                };
                let Some(first_column) = index.index_columns().first() else {
                    return Ok(Value::Null);
                };
                let mut first = self.kind == AggregateKind::Min;
                if first_column.sort_type.descending {
                    first = !first;
                }
                let cursor = index.find_first_or_last(ctx.session, first)?;
                Ok(cursor
                    .search_row()
                    .and_then(|row| row.value(first_column.column_id()))
                    .cloned()
                    .unwrap_or(Value::Null))
            }
            AggregateKind::Sum | AggregateKind::Avg => {
                Err(ExpressionError::unbound(&format!("{}(...)", self.kind.name())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_with_null_is_unknown() {
        assert_eq!(compare_values(CompareOp::Eq, &Value::Null, &Value::Int(1)), Value::Null);
        assert_eq!(compare_values(CompareOp::Lt, &Value::Int(1), &Value::Int(2)), Value::Bool(true));
        assert_eq!(compare_values(CompareOp::Ge, &Value::Int(1), &Value::Float(1.0)), Value::Bool(true));
    }

    #[test]
    fn test_null_safe_equality() {
        assert_eq!(compare_values(CompareOp::EqNullSafe, &Value::Null, &Value::Null), Value::Bool(true));
        assert_eq!(compare_values(CompareOp::EqNullSafe, &Value::Int(1), &Value::Null), Value::Bool(false));
        assert_eq!(compare_values(CompareOp::EqNullSafe, &Value::Int(1), &Value::Int(1)), Value::Bool(true));
    }

    #[test]
    fn test_three_valued_and_or() {
        let t = Value::Bool(true);
        let f = Value::Bool(false);
        assert_eq!(and_or(AndOrOp::And, f.clone(), Value::Null), f);
        assert_eq!(and_or(AndOrOp::And, t.clone(), Value::Null), Value::Null);
        assert_eq!(and_or(AndOrOp::Or, t.clone(), Value::Null), t);
        assert_eq!(and_or(AndOrOp::Or, f.clone(), f.clone()), f);
    }

    #[test]
    fn test_constant_folding() {
        let folded = Expression::and(
            Expression::literal(true),
            Expression::eq(Expression::literal(1), Expression::literal(1)),
        )
        .optimize();
        assert!(matches!(folded, Expression::Literal(Value::Bool(true))));

        let kept = Expression::and(Expression::literal(true), Expression::column("ID")).optimize();
        assert_eq!(kept.sql(), "ID");
    }

    #[test]
    fn test_sql_rendering() {
        let e = Expression::and(
            Expression::compare(CompareOp::Gt, Expression::column("ID"), Expression::param(0)),
            Expression::in_list(Expression::column("NAME"), vec![Expression::literal("a")]),
        );
        assert_eq!(e.sql(), "((ID > ?1) AND (NAME IN('a')))");
        assert_eq!(
            Expression::aggregate_distinct(AggregateKind::Count, Expression::column("X")).sql(),
            "COUNT(DISTINCT X)"
        );
        assert_eq!(Expression::count_all().alias("N").sql(), "COUNT(*) AS N");
        assert_eq!(Expression::is_null(Expression::column("X")).sql(), "(X IS NULL)");
    }
}
