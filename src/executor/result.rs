//! Result sinks
//!
//! Every row-production strategy pushes rows into a `ResultTarget`.
//! `LocalResult` is the materializing target: it can drop duplicate rows,
//! sort, then apply OFFSET and LIMIT in `done()`, and is iterated with
//! `next()` / `current_row()` afterwards. Rows may carry hidden trailing
//! columns (ORDER BY expressions outside the select list); readers only
//! see the visible prefix.

use std::collections::HashSet;

use crate::planner::SortOrder;
use crate::value::{DataType, Value, ValueTuple};

/// Receives produced rows.
pub trait ResultTarget {
    fn add_row(&mut self, values: Vec<Value>);

    fn row_count(&self) -> usize;
}

/// Column metadata of a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultColumn {
    pub name: String,
    pub data_type: Option<DataType>,
    pub nullable: bool,
}

#[derive(Debug, Clone)]
pub struct LocalResult {
    columns: Vec<ResultColumn>,
    visible: usize,
    rows: Vec<Vec<Value>>,
    distinct: Option<HashSet<ValueTuple>>,
    sort: Option<SortOrder>,
    limit: Option<usize>,
    offset: usize,
    closed: bool,
    position: Option<usize>,
}

impl LocalResult {
    pub fn new(columns: Vec<ResultColumn>, visible: usize) -> Self {
        Self {
            visible: visible.min(columns.len()),
            columns,
            rows: Vec::new(),
            distinct: None,
            sort: None,
            limit: None,
            offset: 0,
            closed: false,
            position: None,
        }
    }

    /// Drops rows equal to an earlier row; the first occurrence is kept.
    pub fn set_distinct(&mut self) {
        self.distinct = Some(HashSet::new());
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct.is_some()
    }

    pub fn set_sort_order(&mut self, sort: SortOrder) {
        self.sort = Some(sort);
    }

    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    /// Sorts, then applies OFFSET and LIMIT. Further rows are ignored.
    pub fn done(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.distinct = None;
        if let Some(sort) = &self.sort {
            if self.limit != Some(0) {
                sort.sort(&mut self.rows);
            }
        }
        if self.offset > 0 {
            let skip = self.offset.min(self.rows.len());
            self.rows.drain(..skip);
        }
        if let Some(limit) = self.limit {
            self.rows.truncate(limit);
        }
        self.position = None;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Moves to the next row; false after the last one.
    pub fn next(&mut self) -> bool {
        let next = self.position.map_or(0, |p| p + 1);
        if next < self.rows.len() {
            self.position = Some(next);
            true
        } else {
            self.position = Some(self.rows.len());
            false
        }
    }

    pub fn reset(&mut self) {
        self.position = None;
    }

    /// Visible values of the current row.
    pub fn current_row(&self) -> Option<&[Value]> {
        let row = self.rows.get(self.position?)?;
        Some(&row[..self.visible.min(row.len())])
    }

    /// Visible values of every row, in result order.
    pub fn rows(&self) -> Vec<Vec<Value>> {
        self.rows
            .iter()
            .map(|r| r[..self.visible.min(r.len())].to_vec())
            .collect()
    }

    pub fn columns(&self) -> &[ResultColumn] {
        &self.columns[..self.visible]
    }

    pub fn visible_column_count(&self) -> usize {
        self.visible
    }
}

impl ResultTarget for LocalResult {
    fn add_row(&mut self, values: Vec<Value>) {
        if self.closed {
            return;
        }
        if let Some(seen) = &mut self.distinct {
            if !seen.insert(ValueTuple::new(values.clone())) {
                return;
            }
        }
        self.rows.push(values);
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SortType;

    fn result(visible: usize, width: usize) -> LocalResult {
        let columns = (0..width)
            .map(|i| ResultColumn {
                name: format!("C{}", i),
                data_type: Some(DataType::Int),
                nullable: true,
            })
            .collect();
        LocalResult::new(columns, visible)
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Int(*v)).collect()
    }

    #[test]
    fn test_distinct_keeps_first_occurrence() {
        let mut r = result(1, 1);
        r.set_distinct();
        for v in [3, 1, 3, 2, 1] {
            r.add_row(ints(&[v]));
        }
        r.done();
        assert_eq!(r.rows(), vec![ints(&[3]), ints(&[1]), ints(&[2])]);
    }

    #[test]
    fn test_sort_then_offset_then_limit() {
        let mut r = result(1, 1);
        r.set_sort_order(SortOrder::new(vec![0], vec![SortType::DESCENDING]));
        r.set_offset(1);
        r.set_limit(Some(2));
        for v in [1, 5, 3, 4, 2] {
            r.add_row(ints(&[v]));
        }
        r.done();
        assert_eq!(r.rows(), vec![ints(&[4]), ints(&[3])]);
    }

    #[test]
    fn test_offset_beyond_rows_is_empty() {
        let mut r = result(1, 1);
        r.set_offset(10);
        r.add_row(ints(&[1]));
        r.done();
        assert!(r.rows().is_empty());
        assert!(!r.next());
    }

    #[test]
    fn test_hidden_columns_are_not_visible() {
        let mut r = result(1, 2);
        r.set_sort_order(SortOrder::new(vec![1], vec![SortType::ASCENDING]));
        r.add_row(ints(&[10, 2]));
        r.add_row(ints(&[20, 1]));
        r.done();
        assert!(r.next());
        assert_eq!(r.current_row(), Some(&ints(&[20])[..]));
        assert!(r.next());
        assert_eq!(r.current_row(), Some(&ints(&[10])[..]));
        assert!(!r.next());
        assert_eq!(r.columns().len(), 1);
    }
}
