//! Typed SQL values
//!
//! Float values are ordered and hashed through their total-order bit
//! pattern, the same trick the index key uses, so `Value` can be `Eq`,
//! `Ord` and `Hash` and serve directly as a map key.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int,
    Float,
    String,
    /// Character large object
    Clob,
    /// Binary large object
    Blob,
}

impl DataType {
    /// Large-object types cannot be indexed
    pub fn is_lob(&self) -> bool {
        matches!(self, DataType::Clob | DataType::Blob)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Bool => "BOOLEAN",
            DataType::Int => "BIGINT",
            DataType::Float => "DOUBLE",
            DataType::String => "VARCHAR",
            DataType::Clob => "CLOB",
            DataType::Blob => "BLOB",
        }
    }
}

/// A typed SQL value with a single canonical NULL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Clob(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// SQL truthiness: only `TRUE` is true, NULL is not.
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(DataType::Bool),
            Value::Int(_) => Some(DataType::Int),
            Value::Float(_) => Some(DataType::Float),
            Value::String(_) => Some(DataType::String),
            Value::Clob(_) => Some(DataType::Clob),
            Value::Blob(_) => Some(DataType::Blob),
        }
    }

    /// Renders the value as a SQL literal.
    pub fn sql(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => format!("{:?}", v),
            Value::String(s) | Value::Clob(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
                format!("X'{}'", hex)
            }
        }
    }

    /// SQL comparison: numbers compare by magnitude across INT and FLOAT,
    /// everything else falls back to the total order.
    pub fn compare_sql(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) => Self::float_bits(*a as f64).cmp(&Self::float_bits(*b)),
            (Value::Float(a), Value::Int(b)) => Self::float_bits(*a).cmp(&Self::float_bits(*b as f64)),
            _ => self.cmp(other),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::String(_) => 4,
            Value::Clob(_) => 5,
            Value::Blob(_) => 6,
        }
    }

    /// Total-order bit pattern for floats: negative values flip all bits,
    /// positive values flip the sign bit. -0.0 is folded onto 0.0.
    fn float_bits(v: f64) -> u64 {
        let v = if v == 0.0 { 0.0 } else { v };
        let bits = v.to_bits();
        if (bits >> 63) == 1 {
            !bits
        } else {
            bits ^ (1 << 63)
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => Self::float_bits(*a).cmp(&Self::float_bits(*b)),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Clob(a), Value::Clob(b)) => a.cmp(b),
            (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_rank().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Float(v) => Self::float_bits(*v).hash(state),
            Value::String(s) | Value::Clob(s) => s.hash(state),
            Value::Blob(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) | Value::Clob(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.sql()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_type_ordering() {
        let values = vec![
            Value::Null,
            Value::Bool(false),
            Value::Bool(true),
            Value::Int(-5),
            Value::Int(7),
            Value::Float(-1.5),
            Value::Float(2.5),
            Value::from("aaa"),
            Value::from("zzz"),
        ];
        for i in 1..values.len() {
            assert!(values[i - 1] < values[i], "{:?} < {:?}", values[i - 1], values[i]);
        }
    }

    #[test]
    fn test_float_zero_is_canonical() {
        assert_eq!(Value::Float(0.0), Value::Float(-0.0));
        let mut set = HashSet::new();
        set.insert(Value::Float(0.0));
        assert!(set.contains(&Value::Float(-0.0)));
    }

    #[test]
    fn test_null_is_single_value() {
        let mut set = HashSet::new();
        set.insert(Value::Null);
        set.insert(Value::from(None::<i64>));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_sql_literals() {
        assert_eq!(Value::from("it's").sql(), "'it''s'");
        assert_eq!(Value::Int(3).sql(), "3");
        assert_eq!(Value::Null.sql(), "NULL");
        assert_eq!(Value::Blob(vec![0xab, 0x01]).sql(), "X'ab01'");
    }

    #[test]
    fn test_lob_types() {
        assert!(DataType::Clob.is_lob());
        assert!(DataType::Blob.is_lob());
        assert!(!DataType::String.is_lob());
    }

    #[test]
    fn test_compare_sql_across_numeric_types() {
        assert_eq!(Value::Int(2).compare_sql(&Value::Float(2.5)), Ordering::Less);
        assert_eq!(Value::Float(3.0).compare_sql(&Value::Int(3)), Ordering::Equal);
        assert_eq!(Value::Int(2).cmp(&Value::Float(0.5)), Ordering::Less);
    }
}
