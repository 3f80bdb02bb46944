//! aeroquery - single-query SELECT engine over MVCC tables
//!
//! A `Select` is assembled in code, initialized, prepared once and then
//! queried any number of times. Subsystems, bottom up:
//! - `value` - typed values, rows and search rows
//! - `mvcc` - transactional maps with snapshot reads
//! - `index` - scan and secondary indexes over those maps
//! - `table` - tables, sessions, the database and table filters
//! - `expression` - expression tree, evaluation and aggregates
//! - `planner` - ORDER BY handling, index conditions, join order, index choice
//! - `executor` - the `Select` statement and its row production strategies
//! - `observability` - structured logging and metrics
//! - `config` - database settings

pub mod config;
pub mod executor;
pub mod expression;
pub mod index;
pub mod mvcc;
pub mod observability;
pub mod planner;
pub mod table;
pub mod value;
