//! Query executor subsystem for aeroquery
//!
//! Runs a prepared `Select` with one of five row production strategies
//! (quick aggregate, sorted group, hashed group, distinct index walk,
//! flat scan) over a nested-loop `JoinScan`, collecting rows into a
//! `ResultTarget`.
//!
//! # Invariants
//!
//! - Every strategy returns the same rows a flat scan with a final sort would
//! - The cancel flag and statement deadline are polled before each row
//! - Rows past OFFSET + LIMIT are never materialized when order allows

mod errors;
mod join;
mod result;
mod select;

pub use errors::{ExecutorError, ExecutorErrorCode, ExecutorResult, Severity};
pub use join::{Flow, JoinScan};
pub use result::{LocalResult, ResultColumn, ResultTarget};
pub use select::Select;
