//! Index subsystem for aeroquery
//!
//! Indexes share one capability set, the `Index` trait:
//! - `ScanIndex` - the table's row store, ordered by row key
//! - `SecondaryIndex` - ordered entries over indexed columns plus row key
//!
//! # Invariants
//!
//! - Every live row has exactly one entry in every index of its table
//! - Reads and writes go through the session's transaction view
//! - A unique index never holds two live entries with equal values
//!   unless one of them contains NULL
//! - A secondary index whose backing map is empty needs a rebuild

mod column;
mod cost;
mod cursor;
mod errors;
mod key;
mod scan;
mod secondary;

pub use column::{IndexColumn, IndexType, NullOrdering, SortType};
pub use cost::{cost_range_index, mask, IndexSort, COST_ROW_OFFSET};
pub use cursor::Cursor;
pub use errors::{IndexError, IndexErrorCode, IndexResult, Severity};
pub use key::{IndexKey, KeyLayout, KeyValue};
pub use scan::ScanIndex;
pub use secondary::{IndexDefinition, SecondaryIndex};

use crate::table::Session;
use crate::value::{Row, SearchRow};

pub trait Index: Send + Sync {
    /// Database-wide object id; two handles denote the same index iff ids match.
    fn id(&self) -> u32;

    fn name(&self) -> String;

    fn table_name(&self) -> &str;

    fn index_type(&self) -> IndexType;

    fn index_columns(&self) -> &[IndexColumn];

    /// Position of a table column within the index.
    fn column_position(&self, column_id: usize) -> Option<usize> {
        self.index_columns()
            .iter()
            .position(|c| c.column_id() == column_id)
    }

    fn is_first_column(&self, column_id: usize) -> bool {
        self.column_position(column_id) == Some(0)
    }

    /// DDL that recreates the index; `None` for the scan index.
    fn create_sql(&self) -> Option<String>;

    /// Name shown in execution plans.
    fn plan_sql(&self) -> String;

    /// Whether scan order is row-key order on a visible column.
    fn is_row_id_index(&self) -> bool {
        false
    }

    fn can_get_first_or_last(&self) -> bool;

    fn can_find_next(&self) -> bool {
        false
    }

    /// Cursor over entries from `first` (inclusive) up to `last`.
    ///
    /// Either bound may leave columns unset; `None` means unbounded.
    fn find(
        &self,
        session: &Session,
        first: Option<&SearchRow>,
        last: Option<&SearchRow>,
    ) -> IndexResult<Box<dyn Cursor>>;

    /// Cursor starting after every entry whose indexed values equal `higher_than`'s.
    fn find_next(
        &self,
        _session: &Session,
        _higher_than: &SearchRow,
        _last: Option<&SearchRow>,
    ) -> IndexResult<Box<dyn Cursor>> {
        Err(IndexError::unsupported(&self.name(), "find_next"))
    }

    /// Cursor positioned on the lowest or highest entry.
    fn find_first_or_last(&self, session: &Session, first: bool) -> IndexResult<Box<dyn Cursor>>;

    fn add(&self, session: &Session, row: &Row) -> IndexResult<()>;

    /// Removes the row's entry; a missing entry is a fatal inconsistency.
    fn remove_row(&self, session: &Session, row: &Row) -> IndexResult<()>;

    fn truncate(&self, session: &Session) -> IndexResult<()>;

    /// Drops the index and its data.
    fn remove_index(&self, session: &Session) -> IndexResult<()>;

    fn rename(&self, new_name: &str);

    fn need_rebuild(&self) -> bool;

    fn row_count(&self, session: &Session) -> IndexResult<u64>;

    fn row_count_approximation(&self) -> u64;

    fn cost(&self, session: &Session, masks: Option<&[u8]>, sort: Option<&[IndexSort]>) -> f64;
}
