//! Executor error types
//!
//! Error codes:
//! - AERO_EXECUTION_FAILED (ERROR)
//! - AERO_EXECUTION_UNSUPPORTED (REJECT)
//! - AERO_QUERY_CANCELLED (ERROR)
//! - AERO_QUERY_TIMEOUT (ERROR)
//! - AERO_LOCK_TIMEOUT (ERROR)
//! - AERO_EXECUTION_NOT_PREPARED (FATAL)
//! - planner, table, index, expression and transaction errors pass through
//!   with their own code

use std::fmt;

use crate::expression::{ExpressionError, ExpressionErrorCode};
use crate::index::{self, IndexError, IndexErrorCode};
use crate::mvcc::{self, MvccError, MvccErrorCode};
use crate::planner::{self, PlannerError, PlannerErrorCode};
use crate::table::{self, TableError, TableErrorCode};

/// Severity levels for executor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Statement rejected before any row was read
    Reject,
    /// Operation failed but system is healthy
    Error,
    /// Internal inconsistency; indicates a bug or corruption
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
pub enum ExecutorErrorCode {
    /// General execution failure
    AeroExecutionFailed,
    /// FOR UPDATE combined with grouping, DISTINCT, quick aggregates or joins
    AeroExecutionUnsupported,
    AeroQueryCancelled,
    AeroQueryTimeout,
    /// Exclusive table lock not granted in time
    AeroLockTimeout,
    /// `query` before `prepare`
    AeroExecutionNotPrepared,
    Planner(PlannerErrorCode),
    Table(TableErrorCode),
    Index(IndexErrorCode),
    Expression(ExpressionErrorCode),
    Mvcc(MvccErrorCode),
}

impl ExecutorErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorErrorCode::AeroExecutionFailed => "AERO_EXECUTION_FAILED",
            ExecutorErrorCode::AeroExecutionUnsupported => "AERO_EXECUTION_UNSUPPORTED",
            ExecutorErrorCode::AeroQueryCancelled => "AERO_QUERY_CANCELLED",
            ExecutorErrorCode::AeroQueryTimeout => "AERO_QUERY_TIMEOUT",
            ExecutorErrorCode::AeroLockTimeout => "AERO_LOCK_TIMEOUT",
            ExecutorErrorCode::AeroExecutionNotPrepared => "AERO_EXECUTION_NOT_PREPARED",
            ExecutorErrorCode::Planner(code) => code.code(),
            ExecutorErrorCode::Table(code) => code.code(),
            ExecutorErrorCode::Index(code) => code.code(),
            ExecutorErrorCode::Expression(code) => code.code(),
            ExecutorErrorCode::Mvcc(code) => code.code(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ExecutorErrorCode::AeroExecutionUnsupported => Severity::Reject,
            ExecutorErrorCode::AeroExecutionNotPrepared => Severity::Fatal,
            ExecutorErrorCode::Planner(code) => match code.severity() {
                planner::Severity::Reject => Severity::Reject,
                planner::Severity::Fatal => Severity::Fatal,
            },
            ExecutorErrorCode::Table(code) => match code.severity() {
                table::Severity::Reject => Severity::Reject,
                table::Severity::Error => Severity::Error,
                table::Severity::Fatal => Severity::Fatal,
            },
            ExecutorErrorCode::Index(code) => index_severity(*code),
            ExecutorErrorCode::Expression(code) => match code {
                ExpressionErrorCode::AeroExpressionUnbound => Severity::Fatal,
                ExpressionErrorCode::AeroExpressionParameterNotSet => Severity::Reject,
                ExpressionErrorCode::Index(code) => index_severity(*code),
            },
            ExecutorErrorCode::Mvcc(code) => match code.severity() {
                mvcc::Severity::Error => Severity::Error,
                mvcc::Severity::Fatal => Severity::Fatal,
            },
            _ => Severity::Error,
        }
    }
}

fn index_severity(code: IndexErrorCode) -> Severity {
    match code.severity() {
        index::Severity::Reject => Severity::Reject,
        index::Severity::Error => Severity::Error,
        index::Severity::Fatal => Severity::Fatal,
    }
}

impl fmt::Display for ExecutorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Executor error type with full context
#[derive(Debug, Clone)]
pub struct ExecutorError {
    code: ExecutorErrorCode,
    message: String,
}

impl ExecutorError {
    fn new(code: ExecutorErrorCode, message: String) -> Self {
        Self { code, message }
    }

    pub fn execution_failed(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::AeroExecutionFailed, reason.into())
    }

    pub fn unsupported(feature: &str) -> Self {
        Self::new(
            ExecutorErrorCode::AeroExecutionUnsupported,
            format!("Feature not supported: {}", feature),
        )
    }

    pub fn cancelled(query_id: &str) -> Self {
        Self::new(
            ExecutorErrorCode::AeroQueryCancelled,
            format!("Statement {} was cancelled", query_id),
        )
    }

    pub fn timeout(query_id: &str) -> Self {
        Self::new(
            ExecutorErrorCode::AeroQueryTimeout,
            format!("Statement {} exceeded its timeout", query_id),
        )
    }

    pub fn lock_timeout(table: &str) -> Self {
        Self::new(
            ExecutorErrorCode::AeroLockTimeout,
            format!("Timeout trying to lock table {}", table),
        )
    }

    pub fn not_prepared() -> Self {
        Self::new(
            ExecutorErrorCode::AeroExecutionNotPrepared,
            "Statement executed before prepare".to_string(),
        )
    }

    pub fn code(&self) -> ExecutorErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl From<PlannerError> for ExecutorError {
    fn from(err: PlannerError) -> Self {
        Self::new(ExecutorErrorCode::Planner(err.code()), err.message().to_string())
    }
}

impl From<TableError> for ExecutorError {
    fn from(err: TableError) -> Self {
        if err.code() == TableErrorCode::AeroTableLockTimeout {
            return Self::new(ExecutorErrorCode::AeroLockTimeout, err.message().to_string());
        }
        Self::new(ExecutorErrorCode::Table(err.code()), err.message().to_string())
    }
}

impl From<IndexError> for ExecutorError {
    fn from(err: IndexError) -> Self {
        Self::new(ExecutorErrorCode::Index(err.code()), err.message().to_string())
    }
}

impl From<ExpressionError> for ExecutorError {
    fn from(err: ExpressionError) -> Self {
        Self::new(ExecutorErrorCode::Expression(err.code()), err.message().to_string())
    }
}

impl From<MvccError> for ExecutorError {
    fn from(err: MvccError) -> Self {
        Self::new(ExecutorErrorCode::Mvcc(err.code()), err.message().to_string())
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for ExecutorError {}

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ExecutorErrorCode::AeroExecutionFailed.code(), "AERO_EXECUTION_FAILED");
        assert_eq!(ExecutorErrorCode::AeroQueryCancelled.code(), "AERO_QUERY_CANCELLED");
        assert_eq!(
            ExecutorErrorCode::AeroExecutionUnsupported.code(),
            "AERO_EXECUTION_UNSUPPORTED"
        );
    }

    #[test]
    fn test_not_prepared_is_fatal() {
        let err = ExecutorError::not_prepared();
        assert!(err.is_fatal());
        assert!(!ExecutorError::unsupported("FOR UPDATE && GROUP").is_fatal());
    }

    #[test]
    fn test_wrapped_codes_keep_their_identity() {
        let err: ExecutorError = PlannerError::ambiguous_column("ID").into();
        assert_eq!(
            err.code(),
            ExecutorErrorCode::Planner(PlannerErrorCode::AeroQueryAmbiguousColumn)
        );
        assert_eq!(err.severity(), Severity::Reject);

        let err: ExecutorError = IndexError::row_not_found("IDX", 7).into();
        assert_eq!(err.code().code(), "AERO_INDEX_ROW_NOT_FOUND");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = ExecutorError::unsupported("FOR UPDATE && JOIN");
        let display = format!("{}", err);
        assert!(display.starts_with("[REJECT] AERO_EXECUTION_UNSUPPORTED"));
    }
}
