//! Index key encoding
//!
//! A secondary index key is the tuple (indexed column values..., row key).
//! Column parts order by their index column's sort type; the row key part
//! is always ascending. The trailing row key makes every entry unique even
//! when the indexed values repeat.
//!
//! Unset search-row columns encode as `Low` or `High`. Both sit outside
//! every value regardless of sort direction, so a key with a `Low` suffix
//! seeks to the first entry of a prefix and a `High` suffix seeks past it.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::IndexColumn;
use super::SortType;
use crate::value::{Row, RowKey, SearchRow, Value};

#[derive(Debug, Clone)]
pub enum KeyValue {
    Low,
    Value(Value),
    High,
}

impl KeyValue {
    fn compare(&self, other: &KeyValue, sort: SortType) -> Ordering {
        match (self, other) {
            (KeyValue::Low, KeyValue::Low) | (KeyValue::High, KeyValue::High) => Ordering::Equal,
            (KeyValue::Low, _) | (_, KeyValue::High) => Ordering::Less,
            (_, KeyValue::Low) | (KeyValue::High, _) => Ordering::Greater,
            (KeyValue::Value(a), KeyValue::Value(b)) => sort.compare(a, b),
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            KeyValue::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Column positions and sort types shared by an index, its keys and cursors.
#[derive(Debug)]
pub struct KeyLayout {
    column_ids: Vec<usize>,
    sorts: Arc<[SortType]>,
    table_columns: usize,
}

impl KeyLayout {
    pub fn new(columns: &[IndexColumn], table_columns: usize) -> Self {
        Self {
            column_ids: columns.iter().map(IndexColumn::column_id).collect(),
            sorts: columns.iter().map(|c| c.sort_type).collect(),
            table_columns,
        }
    }

    pub fn column_ids(&self) -> &[usize] {
        &self.column_ids
    }

    pub fn sort(&self, position: usize) -> SortType {
        self.sorts[position]
    }

    /// Compares a decoded row against a bound on the indexed columns.
    ///
    /// Comparison stops at the first column the bound leaves unset.
    pub fn compare_rows(&self, row: &SearchRow, bound: &SearchRow) -> Ordering {
        for (position, &column) in self.column_ids.iter().enumerate() {
            let Some(limit) = bound.value(column) else {
                return Ordering::Equal;
            };
            let value = row.value(column).unwrap_or(&Value::Null);
            let ord = self.sorts[position].compare(value, limit);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Key of a stored row.
    pub fn encode_row(&self, row: &Row) -> IndexKey {
        IndexKey {
            values: self
                .column_ids
                .iter()
                .map(|&c| KeyValue::Value(row.value(c).clone()))
                .collect(),
            row_key: KeyValue::Value(Value::Int(row.key())),
            sorts: Arc::clone(&self.sorts),
        }
    }

    /// Seek key for a search row; unset columns and an unset row key become `fill`.
    pub fn encode_search(&self, row: &SearchRow, fill: KeyValue) -> IndexKey {
        IndexKey {
            values: self
                .column_ids
                .iter()
                .map(|&c| match row.value(c) {
                    Some(v) => KeyValue::Value(v.clone()),
                    None => fill.clone(),
                })
                .collect(),
            row_key: match row.key() {
                Some(k) => KeyValue::Value(Value::Int(k)),
                None => fill,
            },
            sorts: Arc::clone(&self.sorts),
        }
    }

    /// Rebuilds the search row a key was encoded from.
    pub fn decode(&self, key: &IndexKey) -> SearchRow {
        let mut row = SearchRow::template(self.table_columns);
        for (position, &column) in self.column_ids.iter().enumerate() {
            if let Some(v) = key.values[position].value() {
                row.set_value(column, v.clone());
            }
        }
        if let Some(k) = key.row_key() {
            row.set_key(k);
        }
        row
    }
}

#[derive(Debug, Clone)]
pub struct IndexKey {
    values: Vec<KeyValue>,
    row_key: KeyValue,
    sorts: Arc<[SortType]>,
}

impl IndexKey {
    pub fn values(&self) -> &[KeyValue] {
        &self.values
    }

    pub fn row_key(&self) -> Option<RowKey> {
        match &self.row_key {
            KeyValue::Value(Value::Int(k)) => Some(*k),
            _ => None,
        }
    }

    pub fn with_row_key(mut self, row_key: KeyValue) -> Self {
        self.row_key = row_key;
        self
    }

    /// Leading indexed value, `None` for a seek sentinel.
    pub fn first_value(&self) -> Option<&Value> {
        self.values.first().and_then(KeyValue::value)
    }

    /// Whether the indexed parts of two keys are equal.
    pub fn same_values(&self, other: &IndexKey) -> bool {
        self.compare_values(other) == Ordering::Equal
    }

    /// Whether any indexed part is SQL NULL; such entries never collide in a unique index.
    pub fn has_null(&self) -> bool {
        self.values
            .iter()
            .any(|v| matches!(v, KeyValue::Value(Value::Null)))
    }

    fn compare_values(&self, other: &IndexKey) -> Ordering {
        for (position, (a, b)) in self.values.iter().zip(&other.values).enumerate() {
            let ord = a.compare(b, self.sorts[position]);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare_values(other)
            .then_with(|| self.row_key.compare(&other.row_key, SortType::ASCENDING))
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, part) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match part {
                KeyValue::Low => write!(f, "<low>")?,
                KeyValue::High => write!(f, "<high>")?,
                KeyValue::Value(v) => write!(f, "{}", v.sql())?,
            }
        }
        if let Some(k) = self.row_key() {
            write!(f, "; key={}", k)?;
        }
        write!(f, ")")
    }
}
