//! Table subsystem for aeroquery
//!
//! - `Database` - in-memory catalog, transaction store, settings, metrics
//! - `Session` - one open transaction plus cancel flag and statement deadline
//! - `Table` - columns, scan index, secondary indexes, exclusive lock
//! - `TableFilter` - one table occurrence in a statement's FROM list
//!
//! # Invariants
//!
//! - Every row mutation touches every index of the table or none of them
//! - Exclusive locks are released when the owning transaction ends

mod column;
mod database;
mod errors;
mod filter;
mod session;
mod table;

pub use column::{Column, SELECTIVITY_DEFAULT};
pub use database::Database;
pub use errors::{Severity, TableError, TableErrorCode, TableResult};
pub use filter::TableFilter;
pub use session::{Interrupt, Session};
pub use table::Table;
