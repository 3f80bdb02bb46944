//! Value tuples
//!
//! Structural equality, hash and order over an ordered list of values.
//! Backs the hashed-group map, the group-sorted boundary check and the
//! distinct set of a result.

use std::fmt;

use super::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueTuple(Vec<Value>);

impl ValueTuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// The empty tuple, key of the implicit group of an ungrouped aggregate.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for ValueTuple {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl fmt::Display for ValueTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v.sql())?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_structural_equality_with_nulls() {
        let a = ValueTuple::new(vec![Value::Int(1), Value::Null]);
        let b = ValueTuple::new(vec![Value::Int(1), Value::Null]);
        assert_eq!(a, b);

        let mut groups = HashMap::new();
        groups.insert(a, 1);
        *groups.entry(b).or_insert(0) += 1;
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_empty_tuple() {
        assert!(ValueTuple::empty().is_empty());
        assert_eq!(ValueTuple::empty().to_string(), "()");
    }

    #[test]
    fn test_display() {
        let t = ValueTuple::new(vec![Value::Int(2), Value::from("b")]);
        assert_eq!(t.to_string(), "(2, 'b')");
    }
}
