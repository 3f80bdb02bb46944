//! Table error types
//!
//! Error codes:
//! - AERO_TABLE_NOT_FOUND (REJECT)
//! - AERO_TABLE_ALREADY_EXISTS (REJECT)
//! - AERO_TABLE_COLUMN_NOT_FOUND (REJECT)
//! - AERO_TABLE_INDEX_NOT_FOUND (REJECT)
//! - AERO_TABLE_NULL_NOT_ALLOWED (REJECT)
//! - AERO_TABLE_COLUMN_COUNT (REJECT)
//! - AERO_TABLE_INVALID_ROW_ID (REJECT)
//! - AERO_TABLE_LOCK_TIMEOUT (ERROR)
//! - index errors pass through with their own code and severity

use std::fmt;

use crate::index::{self, IndexError, IndexErrorCode};
use crate::mvcc::MvccError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Reject,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableErrorCode {
    AeroTableNotFound,
    AeroTableAlreadyExists,
    AeroTableColumnNotFound,
    AeroTableIndexNotFound,
    AeroTableNullNotAllowed,
    AeroTableColumnCount,
    /// Row-id column must be a NOT NULL INT
    AeroTableInvalidRowId,
    AeroTableLockTimeout,
    Index(IndexErrorCode),
}

impl TableErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            TableErrorCode::AeroTableNotFound => "AERO_TABLE_NOT_FOUND",
            TableErrorCode::AeroTableAlreadyExists => "AERO_TABLE_ALREADY_EXISTS",
            TableErrorCode::AeroTableColumnNotFound => "AERO_TABLE_COLUMN_NOT_FOUND",
            TableErrorCode::AeroTableIndexNotFound => "AERO_TABLE_INDEX_NOT_FOUND",
            TableErrorCode::AeroTableNullNotAllowed => "AERO_TABLE_NULL_NOT_ALLOWED",
            TableErrorCode::AeroTableColumnCount => "AERO_TABLE_COLUMN_COUNT",
            TableErrorCode::AeroTableInvalidRowId => "AERO_TABLE_INVALID_ROW_ID",
            TableErrorCode::AeroTableLockTimeout => "AERO_TABLE_LOCK_TIMEOUT",
            TableErrorCode::Index(code) => code.code(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            TableErrorCode::AeroTableLockTimeout => Severity::Error,
            TableErrorCode::Index(code) => match code.severity() {
                index::Severity::Reject => Severity::Reject,
                index::Severity::Error => Severity::Error,
                index::Severity::Fatal => Severity::Fatal,
            },
            _ => Severity::Reject,
        }
    }
}

impl fmt::Display for TableErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone)]
pub struct TableError {
    code: TableErrorCode,
    message: String,
    index: Option<IndexError>,
}

impl TableError {
    fn new(code: TableErrorCode, message: String) -> Self {
        Self {
            code,
            message,
            index: None,
        }
    }

    pub fn not_found(table: &str) -> Self {
        Self::new(
            TableErrorCode::AeroTableNotFound,
            format!("Table '{}' not found", table),
        )
    }

    pub fn already_exists(table: &str) -> Self {
        Self::new(
            TableErrorCode::AeroTableAlreadyExists,
            format!("Table '{}' already exists", table),
        )
    }

    pub fn column_not_found(table: &str, column: &str) -> Self {
        Self::new(
            TableErrorCode::AeroTableColumnNotFound,
            format!("Column '{}' not found in table '{}'", column, table),
        )
    }

    pub fn index_not_found(table: &str, index: &str) -> Self {
        Self::new(
            TableErrorCode::AeroTableIndexNotFound,
            format!("Index '{}' not found on table '{}'", index, table),
        )
    }

    pub fn null_not_allowed(table: &str, column: &str) -> Self {
        Self::new(
            TableErrorCode::AeroTableNullNotAllowed,
            format!("NULL not allowed for column '{}.{}'", table, column),
        )
    }

    pub fn column_count(table: &str, expected: usize, actual: usize) -> Self {
        Self::new(
            TableErrorCode::AeroTableColumnCount,
            format!(
                "Table '{}' has {} columns, row has {}",
                table, expected, actual
            ),
        )
    }

    pub fn invalid_row_id(table: &str, column: &str) -> Self {
        Self::new(
            TableErrorCode::AeroTableInvalidRowId,
            format!(
                "Row-id column '{}.{}' must be a NOT NULL INT",
                table, column
            ),
        )
    }

    pub fn lock_timeout(table: &str) -> Self {
        Self::new(
            TableErrorCode::AeroTableLockTimeout,
            format!("Timeout trying to lock table '{}'", table),
        )
    }

    pub fn code(&self) -> TableErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The index error this was raised from, if any
    pub fn index_error(&self) -> Option<&IndexError> {
        self.index.as_ref()
    }

    pub fn is_duplicate_key(&self) -> bool {
        self.code == TableErrorCode::Index(IndexErrorCode::AeroIndexDuplicateKey)
    }
}

impl From<IndexError> for TableError {
    fn from(err: IndexError) -> Self {
        Self {
            code: TableErrorCode::Index(err.code()),
            message: err.message().to_string(),
            index: Some(err),
        }
    }
}

impl From<MvccError> for TableError {
    fn from(err: MvccError) -> Self {
        IndexError::from(err).into()
    }
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for TableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.index
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

pub type TableResult<T> = Result<T, TableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_errors_keep_their_code() {
        let err: TableError = IndexError::duplicate_key("IDX", "(1)").into();
        assert!(err.is_duplicate_key());
        assert_eq!(err.code().code(), "AERO_INDEX_DUPLICATE_KEY");
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn test_row_not_found_stays_fatal() {
        let err: TableError = IndexError::row_not_found("IDX", 1).into();
        assert_eq!(err.severity(), Severity::Fatal);
    }

    #[test]
    fn test_display() {
        let err = TableError::lock_timeout("T");
        assert_eq!(
            err.to_string(),
            "[ERROR] AERO_TABLE_LOCK_TIMEOUT: Timeout trying to lock table 'T'"
        );
    }
}
