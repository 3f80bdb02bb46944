//! Rows and search rows

use super::Value;

/// Unique 64-bit row identifier within a table.
pub type RowKey = i64;

/// A full table row: ordered column values plus its row key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row {
    key: RowKey,
    values: Vec<Value>,
}

impl Row {
    pub fn new(key: RowKey, values: Vec<Value>) -> Self {
        Self { key, values }
    }

    pub fn key(&self) -> RowKey {
        self.key
    }

    pub fn set_key(&mut self, key: RowKey) {
        self.key = key;
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Returns the value at the column ordinal, NULL if out of range.
    pub fn value(&self, column: usize) -> &Value {
        self.values.get(column).unwrap_or(&Value::Null)
    }

    pub fn column_count(&self) -> usize {
        self.values.len()
    }
}

/// A partially-filled row used as a seek bound.
///
/// Unset columns (`None`) do not constrain the bound: a first-bound treats
/// them as the lowest possible key, a last-bound stops comparing at them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRow {
    key: Option<RowKey>,
    values: Vec<Option<Value>>,
}

impl SearchRow {
    /// Creates a search row template with every column unset.
    pub fn template(column_count: usize) -> Self {
        Self {
            key: None,
            values: vec![None; column_count],
        }
    }

    pub fn key(&self) -> Option<RowKey> {
        self.key
    }

    pub fn set_key(&mut self, key: RowKey) {
        self.key = Some(key);
    }

    pub fn value(&self, column: usize) -> Option<&Value> {
        self.values.get(column).and_then(Option::as_ref)
    }

    pub fn set_value(&mut self, column: usize, value: Value) {
        if column >= self.values.len() {
            self.values.resize(column + 1, None);
        }
        self.values[column] = Some(value);
    }

    pub fn column_count(&self) -> usize {
        self.values.len()
    }

    /// Converts into a full row, unset columns become NULL.
    pub fn into_row(self) -> Row {
        let key = self.key.unwrap_or_default();
        Row::new(
            key,
            self.values
                .into_iter()
                .map(|v| v.unwrap_or(Value::Null))
                .collect(),
        )
    }
}

impl From<&Row> for SearchRow {
    fn from(row: &Row) -> Self {
        Self {
            key: Some(row.key()),
            values: row.values().iter().cloned().map(Some).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_value_out_of_range_is_null() {
        let row = Row::new(1, vec![Value::Int(5)]);
        assert_eq!(row.value(0), &Value::Int(5));
        assert_eq!(row.value(3), &Value::Null);
    }

    #[test]
    fn test_search_row_from_row() {
        let row = Row::new(9, vec![Value::Int(1), Value::from("a")]);
        let search = SearchRow::from(&row);
        assert_eq!(search.key(), Some(9));
        assert_eq!(search.value(1), Some(&Value::from("a")));
        assert_eq!(search.into_row(), row);
    }

    #[test]
    fn test_search_row_set_value_grows() {
        let mut search = SearchRow::template(1);
        search.set_value(2, Value::Int(4));
        assert_eq!(search.column_count(), 3);
        assert_eq!(search.value(1), None);
        assert_eq!(search.value(2), Some(&Value::Int(4)));
    }
}
