//! Index selection for ORDER BY and GROUP BY
//!
//! Both matchers look only at the top filter's own indexes.
//! - order match: the index's leading columns equal the sort columns in
//!   the same order and with the same direction
//! - group match: every grouping column is an index column and the
//!   grouped index positions form a prefix; order among them is free

use std::sync::Arc;

use super::sort::SortOrder;
use crate::expression::Expression;
use crate::index::{Index, SortType};
use crate::table::{Column, TableFilter};

/// Index whose scan order satisfies `sort`, if any.
pub fn sort_index(
    filters: &[TableFilter],
    top: usize,
    expressions: &[Expression],
    sort: &SortOrder,
) -> Option<Arc<dyn Index>> {
    let filter = &filters[top];
    let mut sort_columns: Vec<(&Arc<Column>, SortType)> = Vec::new();
    for (&idx, &sort_type) in sort.indexes().iter().zip(sort.sort_types()) {
        let expr = expressions.get(idx)?.non_alias();
        if expr.is_constant() {
            continue;
        }
        let column = expr.as_column()?;
        if column.filter() != Some(top) {
            return None;
        }
        sort_columns.push((column.column()?, sort_type));
    }
    let table = filter.table();
    if sort_columns.is_empty() {
        // sorting by constants only
        let scan: Arc<dyn Index> = table.scan_index().clone();
        return Some(scan);
    }
    for index in table.indexes() {
        if index.create_sql().is_none() || index.index_type().is_hash() {
            continue;
        }
        let index_columns = index.index_columns();
        if index_columns.len() < sort_columns.len() {
            continue;
        }
        // the index must start with the exact sort columns
        let matches = sort_columns
            .iter()
            .zip(index_columns)
            .all(|((column, sort_type), index_column)| {
                index_column.column_id() == column.column_id()
                    && index_column.sort_type.explicit() == sort_type.explicit()
            });
        if matches {
            return Some(index);
        }
    }
    // ordering by the row id alone is the scan order
    if let [(column, sort_type)] = sort_columns.as_slice() {
        let scan = table.scan_index();
        if scan.is_row_id_index()
            && scan.row_id_column() == Some(column.column_id())
            && sort_type.explicit() == SortType::ASCENDING.explicit()
        {
            let scan: Arc<dyn Index> = scan.clone();
            return Some(scan);
        }
    }
    None
}

/// First index of the top filter that delivers the groups contiguously.
pub fn group_sorted_index(
    filters: &[TableFilter],
    top: usize,
    expressions: &[Expression],
    group_by: &[bool],
) -> Option<Arc<dyn Index>> {
    filters[top].table().indexes().into_iter().find(|index| {
        !index.index_type().is_scan()
            && !index.index_type().is_hash()
            && is_group_sorted_index(top, index.as_ref(), expressions, group_by)
    })
}

/// Whether scanning `index` keeps every group's rows adjacent.
pub fn is_group_sorted_index(
    top: usize,
    index: &dyn Index,
    expressions: &[Expression],
    group_by: &[bool],
) -> bool {
    let index_columns = index.index_columns();
    let mut grouped = vec![false; index_columns.len()];
    for (expr, _) in expressions
        .iter()
        .zip(group_by)
        .filter(|(_, &is_group)| is_group)
    {
        let Some(column) = expr.non_alias().as_column() else {
            return false;
        };
        if column.filter() != Some(top) {
            return false;
        }
        let position = column
            .column()
            .and_then(|c| index_columns.iter().position(|ic| ic.column_id() == c.column_id()));
        match position {
            Some(p) => grouped[p] = true,
            None => return false,
        }
    }
    // good: index(a, b, c) group by b, a
    // bad: index(a, b, c) group by a, c
    !grouped.windows(2).any(|w| !w[0] && w[1])
}
