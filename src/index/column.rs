//! Index column descriptors and sort direction

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::table::Column;
use crate::value::Value;

/// Where NULL sorts relative to other values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NullOrdering {
    /// NULL is the lowest value: first ascending, last descending
    #[default]
    Default,
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SortType {
    pub descending: bool,
    pub nulls: NullOrdering,
}

impl SortType {
    pub const ASCENDING: SortType = SortType {
        descending: false,
        nulls: NullOrdering::Default,
    };

    pub const DESCENDING: SortType = SortType {
        descending: true,
        nulls: NullOrdering::Default,
    };

    pub fn nulls_first(self) -> Self {
        Self {
            nulls: NullOrdering::First,
            ..self
        }
    }

    pub fn nulls_last(self) -> Self {
        Self {
            nulls: NullOrdering::Last,
            ..self
        }
    }

    /// Same ordering with the NULL position spelled out.
    pub fn explicit(self) -> Self {
        match self.nulls {
            NullOrdering::Default if self.descending => self.nulls_last(),
            NullOrdering::Default => self.nulls_first(),
            _ => self,
        }
    }

    /// Orders two values under this sort type.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) | (false, true) => {
                let nulls_first = self.explicit().nulls == NullOrdering::First;
                let null_side = if a.is_null() { Ordering::Less } else { Ordering::Greater };
                if nulls_first {
                    null_side
                } else {
                    null_side.reverse()
                }
            }
            (false, false) => {
                let ord = a.compare_sql(b);
                if self.descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
        }
    }

    /// SQL suffix, empty for plain ascending.
    pub fn sql(&self) -> String {
        let mut buf = String::new();
        if self.descending {
            buf.push_str(" DESC");
        }
        match self.nulls {
            NullOrdering::Default => {}
            NullOrdering::First => buf.push_str(" NULLS FIRST"),
            NullOrdering::Last => buf.push_str(" NULLS LAST"),
        }
        buf
    }
}

/// One column of an index.
#[derive(Debug, Clone)]
pub struct IndexColumn {
    pub column: Arc<Column>,
    pub sort_type: SortType,
}

impl IndexColumn {
    pub fn new(column: Arc<Column>, sort_type: SortType) -> Self {
        Self { column, sort_type }
    }

    pub fn column_id(&self) -> usize {
        self.column.column_id()
    }

    pub fn sql(&self) -> String {
        format!("{}{}", self.column.name(), self.sort_type.sql())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexType {
    unique: bool,
    hash: bool,
    scan: bool,
}

impl IndexType {
    pub fn non_unique() -> Self {
        Self::default()
    }

    pub fn unique() -> Self {
        Self {
            unique: true,
            ..Self::default()
        }
    }

    pub fn scan() -> Self {
        Self {
            scan: true,
            ..Self::default()
        }
    }

    /// Marks the index as hash-organized; such indexes cannot serve ordered scans.
    pub fn with_hash(mut self) -> Self {
        self.hash = true;
        self
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_hash(&self) -> bool {
        self.hash
    }

    pub fn is_scan(&self) -> bool {
        self.scan
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scan {
            return write!(f, "SCAN");
        }
        if self.unique {
            write!(f, "UNIQUE ")?;
        }
        if self.hash {
            write!(f, "HASH ")?;
        }
        write!(f, "INDEX")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nulls_low_by_default() {
        let asc = SortType::ASCENDING;
        let desc = SortType::DESCENDING;
        assert_eq!(asc.compare(&Value::Null, &Value::Int(1)), Ordering::Less);
        assert_eq!(desc.compare(&Value::Null, &Value::Int(1)), Ordering::Greater);
        assert_eq!(desc.compare(&Value::Int(2), &Value::Int(1)), Ordering::Less);
    }

    #[test]
    fn test_explicit_null_position_ignores_direction() {
        let desc_first = SortType::DESCENDING.nulls_first();
        assert_eq!(desc_first.compare(&Value::Null, &Value::Int(1)), Ordering::Less);
        let asc_last = SortType::ASCENDING.nulls_last();
        assert_eq!(asc_last.compare(&Value::Null, &Value::Int(1)), Ordering::Greater);
    }

    #[test]
    fn test_explicit_normalization() {
        assert_eq!(SortType::ASCENDING.explicit(), SortType::ASCENDING.nulls_first());
        assert_eq!(SortType::DESCENDING.explicit(), SortType::DESCENDING.nulls_last());
        assert_eq!(SortType::DESCENDING.sql(), " DESC");
    }

    #[test]
    fn test_index_type_display() {
        assert_eq!(IndexType::unique().to_string(), "UNIQUE INDEX");
        assert_eq!(IndexType::scan().to_string(), "SCAN");
    }
}
