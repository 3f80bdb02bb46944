//! Index cost model
//!
//! Costs are relative numbers used only to compare access paths. A lookup
//! mask per table column describes which index conditions apply to it.

use super::{IndexColumn, SortType};

/// Per-column condition masks.
pub mod mask {
    pub const EQUALITY: u8 = 1;
    pub const START: u8 = 2;
    pub const END: u8 = 4;
    pub const RANGE: u8 = START | END;
    pub const ALWAYS_FALSE: u8 = 8;
}

/// Rows added to every estimate so empty tables still prefer indexes.
pub const COST_ROW_OFFSET: u64 = 1000;

/// One ORDER BY entry as seen by the filter being costed.
///
/// `column` is set only when the entry is a plain column of that filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSort {
    pub column: Option<usize>,
    pub sort_type: SortType,
}

/// Cost of reading a range of an ordered index.
pub fn cost_range_index(
    columns: &[IndexColumn],
    unique: bool,
    masks: Option<&[u8]>,
    row_count: u64,
    sort: Option<&[IndexSort]>,
    is_scan: bool,
) -> f64 {
    let row_count = row_count + COST_ROW_OFFSET;
    let mut total_selectivity: u64 = 0;
    let mut rows_cost = row_count;
    if let Some(masks) = masks {
        for (i, index_column) in columns.iter().enumerate() {
            let m = masks.get(index_column.column_id()).copied().unwrap_or(0);
            if m & mask::EQUALITY == mask::EQUALITY {
                if i == columns.len() - 1 && unique {
                    rows_cost = 3;
                    break;
                }
                let selectivity = u64::from(index_column.column.selectivity());
                total_selectivity = 100 - ((100 - total_selectivity) * (100 - selectivity) / 100);
                let distinct_rows = (row_count * total_selectivity / 100).max(1);
                rows_cost = 2 + (row_count / distinct_rows).max(1);
            } else if m & mask::RANGE == mask::RANGE {
                rows_cost = 2 + row_count / 4;
                break;
            } else if m & mask::START == mask::START {
                rows_cost = 2 + row_count / 3;
                break;
            } else if m & mask::END == mask::END {
                rows_cost = row_count / 3;
                break;
            } else {
                break;
            }
        }
    }

    let mut sorting_cost = 0;
    if let Some(sort) = sort {
        sorting_cost = 100 + row_count / 10;
        if !is_scan {
            let mut covering = 0;
            let mut matches = true;
            for (entry, index_column) in sort.iter().zip(columns) {
                if entry.column != Some(index_column.column_id())
                    || entry.sort_type.explicit() != index_column.sort_type.explicit()
                {
                    matches = false;
                    break;
                }
                covering += 1;
            }
            if matches {
                sorting_cost = 100 - covering;
            }
        }
    }

    let cost = if is_scan {
        rows_cost + sorting_cost + 20
    } else {
        // entries carry only the key, rows are fetched from the scan index
        rows_cost + rows_cost + sorting_cost + 20
    };
    cost as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use crate::value::DataType;
    use std::sync::Arc;

    fn columns(n: usize) -> Vec<IndexColumn> {
        (0..n)
            .map(|i| IndexColumn::new(Arc::new(Column::new(format!("C{}", i), DataType::Int).with_id(i)), SortType::ASCENDING))
            .collect()
    }

    #[test]
    fn test_unique_equality_is_cheapest() {
        let cols = columns(1);
        let masks = [mask::EQUALITY];
        let unique = cost_range_index(&cols, true, Some(&masks), 10_000, None, false);
        let plain = cost_range_index(&cols, false, Some(&masks), 10_000, None, false);
        assert_eq!(unique, 26.0);
        assert!(unique < plain);
    }

    #[test]
    fn test_range_cheaper_than_open_start() {
        let cols = columns(1);
        let range = cost_range_index(&cols, false, Some(&[mask::RANGE]), 9_000, None, false);
        let start = cost_range_index(&cols, false, Some(&[mask::START]), 9_000, None, false);
        let full = cost_range_index(&cols, false, None, 9_000, None, false);
        assert!(range < start);
        assert!(start < full);
    }

    #[test]
    fn test_matching_sort_order_discount() {
        let cols = columns(2);
        let sort = [IndexSort { column: Some(0), sort_type: SortType::ASCENDING }];
        let matching = cost_range_index(&cols, false, None, 0, Some(&sort), false);
        let reversed = [IndexSort { column: Some(0), sort_type: SortType::DESCENDING }];
        let other = cost_range_index(&cols, false, None, 0, Some(&reversed), false);
        assert!(matching < other);
    }
}
