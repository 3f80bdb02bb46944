//! Value substrate for aeroquery
//!
//! Typed column values, rows keyed by a 64-bit row key, partially-filled
//! search rows, and value tuples used as group keys.
//!
//! # Ordering
//!
//! Values have a total order so they can back ordered maps:
//! NULL < Bool < Int < Float < String < Clob < Blob.
//! Values of different types never compare equal; numeric coercion is an
//! expression-level concern (see `expression`).

mod row;
mod tuple;
mod types;

pub use row::{Row, RowKey, SearchRow};
pub use tuple::ValueTuple;
pub use types::{DataType, Value};
