//! Sort order over the statement's expression list
//!
//! A sort order is a list of (expression position, sort type) pairs. The
//! comparator is stable-sort friendly: equal rows keep their scan order.

use std::cmp::Ordering;

use crate::expression::{unenclose, Expression};
use crate::index::{IndexSort, SortType};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    indexes: Vec<usize>,
    sort_types: Vec<SortType>,
}

impl SortOrder {
    pub fn new(indexes: Vec<usize>, sort_types: Vec<SortType>) -> Self {
        Self { indexes, sort_types }
    }

    /// Expression positions, most significant first.
    pub fn indexes(&self) -> &[usize] {
        &self.indexes
    }

    pub fn sort_types(&self) -> &[SortType] {
        &self.sort_types
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub fn compare(&self, a: &[Value], b: &[Value]) -> Ordering {
        for (&idx, sort_type) in self.indexes.iter().zip(&self.sort_types) {
            let ord = sort_type.compare(
                a.get(idx).unwrap_or(&Value::Null),
                b.get(idx).unwrap_or(&Value::Null),
            );
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    pub fn sort(&self, rows: &mut [Vec<Value>]) {
        rows.sort_by(|a, b| self.compare(a, b));
    }

    /// ORDER BY entries as seen by `filter` when costing its indexes.
    pub fn index_sorts(&self, expressions: &[Expression], filter: usize) -> Vec<IndexSort> {
        self.indexes
            .iter()
            .zip(&self.sort_types)
            .map(|(&idx, &sort_type)| IndexSort {
                column: expressions
                    .get(idx)
                    .and_then(Expression::as_column)
                    .filter(|c| c.filter() == Some(filter))
                    .and_then(|c| c.column())
                    .map(|c| c.column_id()),
                sort_type,
            })
            .collect()
    }

    /// Visible columns render as their ordinal, hidden ones as `=expr`.
    pub fn sql(&self, expressions: &[Expression], visible: usize) -> String {
        let parts: Vec<String> = self
            .indexes
            .iter()
            .zip(&self.sort_types)
            .map(|(&idx, sort_type)| {
                let target = if idx < visible {
                    (idx + 1).to_string()
                } else {
                    let sql = expressions.get(idx).map(Expression::sql).unwrap_or_default();
                    format!("={}", unenclose(&sql))
                };
                format!("{}{}", target, sort_type.sql())
            })
            .collect();
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_respects_direction_and_priority() {
        let order = SortOrder::new(vec![1, 0], vec![SortType::DESCENDING, SortType::ASCENDING]);
        let a = vec![Value::Int(1), Value::Int(5)];
        let b = vec![Value::Int(2), Value::Int(5)];
        let c = vec![Value::Int(0), Value::Int(9)];
        assert_eq!(order.compare(&a, &b), Ordering::Less);
        assert_eq!(order.compare(&c, &a), Ordering::Less);
    }

    #[test]
    fn test_sort_is_stable() {
        let order = SortOrder::new(vec![0], vec![SortType::ASCENDING]);
        let mut rows = vec![
            vec![Value::Int(2), Value::from("x")],
            vec![Value::Int(1), Value::from("y")],
            vec![Value::Int(2), Value::from("z")],
        ];
        order.sort(&mut rows);
        assert_eq!(rows[0][1], Value::from("y"));
        assert_eq!(rows[1][1], Value::from("x"));
        assert_eq!(rows[2][1], Value::from("z"));
    }

    #[test]
    fn test_nulls_follow_sort_type() {
        let order = SortOrder::new(vec![0], vec![SortType::ASCENDING.nulls_last()]);
        let mut rows = vec![vec![Value::Null], vec![Value::Int(1)]];
        order.sort(&mut rows);
        assert_eq!(rows[1][0], Value::Null);
    }

    #[test]
    fn test_sql_uses_ordinals_for_visible_columns() {
        let exprs = vec![Expression::column("A"), Expression::column("B")];
        let order = SortOrder::new(vec![0, 1], vec![SortType::DESCENDING, SortType::ASCENDING]);
        assert_eq!(order.sql(&exprs, 1), "1 DESC, =B");
    }
}
