//! Expression subsystem for aeroquery
//!
//! - `Expression` - the expression sum type and its SQL rendering
//! - `EvalContext` - row, group and quick evaluation
//! - `Accumulator` - per-group aggregate state, addressed by slot
//!
//! # Invariants
//!
//! - Comparisons involving NULL are unknown, except `IS`
//! - Only `TRUE` passes a condition
//! - Every aggregate of a prepared statement owns exactly one slot

mod aggregate;
mod errors;
mod eval;
mod expr;

pub use aggregate::{Accumulator, AggregateKind, SlotKind};
pub use errors::{ExpressionError, ExpressionErrorCode, ExpressionResult};
pub use eval::{and_or, compare_values, EvalContext};
pub use expr::{unenclose, Aggregate, AndOrOp, ColumnBinding, ColumnRef, CompareOp, Expression};
