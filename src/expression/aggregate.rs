//! Aggregates and the per-group accumulator arena
//!
//! Every aggregate call and every grouped column reference of a statement
//! gets a slot number when the statement is prepared. One group's state
//! is a `Vec<Accumulator>` indexed by slot.

use std::collections::HashSet;

use crate::value::{DataType, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    CountAll,
    Count,
    Min,
    Max,
    Sum,
    Avg,
}

impl AggregateKind {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateKind::CountAll | AggregateKind::Count => "COUNT",
            AggregateKind::Min => "MIN",
            AggregateKind::Max => "MAX",
            AggregateKind::Sum => "SUM",
            AggregateKind::Avg => "AVG",
        }
    }

    /// Result type given the argument type.
    pub fn data_type(&self, arg: Option<DataType>) -> Option<DataType> {
        match self {
            AggregateKind::CountAll | AggregateKind::Count => Some(DataType::Int),
            AggregateKind::Avg => Some(DataType::Float),
            AggregateKind::Min | AggregateKind::Max | AggregateKind::Sum => arg,
        }
    }
}

/// What a slot accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Value of a grouping column, fixed by the group's first row
    Column,
    Aggregate { kind: AggregateKind, distinct: bool },
}

#[derive(Debug, Clone)]
pub struct Accumulator {
    kind: SlotKind,
    count: i64,
    value: Option<Value>,
    float_sum: f64,
    distinct: Option<HashSet<Value>>,
}

impl Accumulator {
    pub fn new(kind: SlotKind) -> Self {
        let distinct = match kind {
            SlotKind::Aggregate { distinct: true, .. } => Some(HashSet::new()),
            _ => None,
        };
        Self {
            kind,
            count: 0,
            value: None,
            float_sum: 0.0,
            distinct,
        }
    }

    /// One group's fresh state.
    pub fn group(slots: &[SlotKind]) -> Vec<Accumulator> {
        slots.iter().copied().map(Accumulator::new).collect()
    }

    /// Feeds one row's argument value; `CountAll` ignores it.
    pub fn add(&mut self, value: Value) {
        match self.kind {
            SlotKind::Column => {
                if self.value.is_none() {
                    self.value = Some(value);
                }
            }
            SlotKind::Aggregate { kind, .. } => {
                if kind == AggregateKind::CountAll {
                    self.count += 1;
                    return;
                }
                if value.is_null() {
                    return;
                }
                match &mut self.distinct {
                    Some(seen) => {
                        seen.insert(value);
                    }
                    None => Self::accumulate(kind, &mut self.count, &mut self.value, &mut self.float_sum, value),
                }
            }
        }
    }

    fn accumulate(kind: AggregateKind, count: &mut i64, current: &mut Option<Value>, float_sum: &mut f64, value: Value) {
        *count += 1;
        match kind {
            AggregateKind::CountAll | AggregateKind::Count => {}
            AggregateKind::Min => {
                if current.as_ref().map_or(true, |c| value.compare_sql(c).is_lt()) {
                    *current = Some(value);
                }
            }
            AggregateKind::Max => {
                if current.as_ref().map_or(true, |c| value.compare_sql(c).is_gt()) {
                    *current = Some(value);
                }
            }
            AggregateKind::Sum => {
                *current = Some(match current.take() {
                    None => value,
                    Some(sum) => add_values(sum, value),
                });
            }
            AggregateKind::Avg => {
                *float_sum += value.as_float().unwrap_or(0.0);
            }
        }
    }

    /// Current result of the slot.
    pub fn value(&self) -> Value {
        match self.kind {
            SlotKind::Column => self.value.clone().unwrap_or(Value::Null),
            SlotKind::Aggregate { kind, .. } => match &self.distinct {
                Some(seen) => {
                    let mut folded = Accumulator::new(SlotKind::Aggregate { kind, distinct: false });
                    for value in seen {
                        folded.add(value.clone());
                    }
                    folded.value()
                }
                None => self.finish(kind),
            },
        }
    }

    fn finish(&self, kind: AggregateKind) -> Value {
        match kind {
            AggregateKind::CountAll | AggregateKind::Count => Value::Int(self.count),
            AggregateKind::Min | AggregateKind::Max | AggregateKind::Sum => {
                self.value.clone().unwrap_or(Value::Null)
            }
            AggregateKind::Avg if self.count == 0 => Value::Null,
            AggregateKind::Avg => Value::Float(self.float_sum / self.count as f64),
        }
    }
}

fn add_values(a: Value, b: Value) -> Value {
    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => match x.checked_add(*y) {
            Some(sum) => Value::Int(sum),
            None => Value::Float(*x as f64 + *y as f64),
        },
        _ => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => Value::Float(x + y),
            _ => a,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(kind: AggregateKind, distinct: bool) -> Accumulator {
        Accumulator::new(SlotKind::Aggregate { kind, distinct })
    }

    #[test]
    fn test_count_ignores_nulls_count_all_does_not() {
        let mut count = aggregate(AggregateKind::Count, false);
        let mut all = aggregate(AggregateKind::CountAll, false);
        for v in [Value::Int(1), Value::Null, Value::Int(2)] {
            count.add(v.clone());
            all.add(v);
        }
        assert_eq!(count.value(), Value::Int(2));
        assert_eq!(all.value(), Value::Int(3));
    }

    #[test]
    fn test_empty_aggregates() {
        assert_eq!(aggregate(AggregateKind::Count, false).value(), Value::Int(0));
        assert_eq!(aggregate(AggregateKind::Sum, false).value(), Value::Null);
        assert_eq!(aggregate(AggregateKind::Avg, false).value(), Value::Null);
        assert_eq!(aggregate(AggregateKind::Max, false).value(), Value::Null);
    }

    #[test]
    fn test_min_max_sum_avg() {
        let mut min = aggregate(AggregateKind::Min, false);
        let mut max = aggregate(AggregateKind::Max, false);
        let mut sum = aggregate(AggregateKind::Sum, false);
        let mut avg = aggregate(AggregateKind::Avg, false);
        for v in [3, 1, 2] {
            for acc in [&mut min, &mut max, &mut sum, &mut avg] {
                acc.add(Value::Int(v));
            }
        }
        assert_eq!(min.value(), Value::Int(1));
        assert_eq!(max.value(), Value::Int(3));
        assert_eq!(sum.value(), Value::Int(6));
        assert_eq!(avg.value(), Value::Float(2.0));
    }

    #[test]
    fn test_distinct_counts_values_once() {
        let mut count = aggregate(AggregateKind::Count, true);
        for v in [1, 1, 2, 2, 2] {
            count.add(Value::Int(v));
        }
        assert_eq!(count.value(), Value::Int(2));
    }

    #[test]
    fn test_sum_overflow_widens_to_float() {
        let mut sum = aggregate(AggregateKind::Sum, false);
        sum.add(Value::Int(i64::MAX));
        sum.add(Value::Int(1));
        assert!(matches!(sum.value(), Value::Float(_)));
    }

    #[test]
    fn test_column_slot_keeps_first_value() {
        let mut slot = Accumulator::new(SlotKind::Column);
        slot.add(Value::Int(7));
        slot.add(Value::Int(8));
        assert_eq!(slot.value(), Value::Int(7));
    }
}
