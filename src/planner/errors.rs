//! Planner error types
//!
//! Error codes:
//! - AERO_QUERY_TABLE_NOT_FOUND (REJECT)
//! - AERO_QUERY_COLUMN_NOT_FOUND (REJECT)
//! - AERO_QUERY_AMBIGUOUS_COLUMN (REJECT)
//! - AERO_QUERY_ORDER_BY_OUT_OF_RANGE (REJECT)
//! - AERO_QUERY_ORDER_BY_NOT_IN_RESULT (REJECT)
//! - AERO_QUERY_NOT_IN_GROUP_BY (REJECT)
//! - AERO_QUERY_UNSUPPORTED_OUTER_JOIN (REJECT)
//! - AERO_QUERY_INTERNAL (FATAL)
//!
//! All planner errors surface during `init`/`prepare`, never mid-scan.

use std::fmt;

use crate::expression::ExpressionError;

/// Severity levels for planner errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Statement rejected before execution
    Reject,
    /// Statement lifecycle misuse; indicates a bug in the caller
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerErrorCode {
    /// Wildcard or column qualifier names no table filter
    AeroQueryTableNotFound,
    AeroQueryColumnNotFound,
    /// Unqualified column present in more than one filter
    AeroQueryAmbiguousColumn,
    AeroQueryOrderByOutOfRange,
    /// `DISTINCT` with an ORDER BY expression missing from the select list
    AeroQueryOrderByNotInResult,
    /// Column outside an aggregate that is not a grouping key
    AeroQueryNotInGroupBy,
    AeroQueryUnsupportedOuterJoin,
    AeroQueryInternal,
}

impl PlannerErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            PlannerErrorCode::AeroQueryTableNotFound => "AERO_QUERY_TABLE_NOT_FOUND",
            PlannerErrorCode::AeroQueryColumnNotFound => "AERO_QUERY_COLUMN_NOT_FOUND",
            PlannerErrorCode::AeroQueryAmbiguousColumn => "AERO_QUERY_AMBIGUOUS_COLUMN",
            PlannerErrorCode::AeroQueryOrderByOutOfRange => "AERO_QUERY_ORDER_BY_OUT_OF_RANGE",
            PlannerErrorCode::AeroQueryOrderByNotInResult => "AERO_QUERY_ORDER_BY_NOT_IN_RESULT",
            PlannerErrorCode::AeroQueryNotInGroupBy => "AERO_QUERY_NOT_IN_GROUP_BY",
            PlannerErrorCode::AeroQueryUnsupportedOuterJoin => "AERO_QUERY_UNSUPPORTED_OUTER_JOIN",
            PlannerErrorCode::AeroQueryInternal => "AERO_QUERY_INTERNAL",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            PlannerErrorCode::AeroQueryInternal => Severity::Fatal,
            _ => Severity::Reject,
        }
    }
}

impl fmt::Display for PlannerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Planner error type with full context
#[derive(Debug, Clone)]
pub struct PlannerError {
    code: PlannerErrorCode,
    message: String,
    /// Offending identifier or expression, if any
    subject: Option<String>,
}

impl PlannerError {
    fn new(code: PlannerErrorCode, message: String, subject: Option<String>) -> Self {
        Self {
            code,
            message,
            subject,
        }
    }

    pub fn table_not_found(alias: &str) -> Self {
        Self::new(
            PlannerErrorCode::AeroQueryTableNotFound,
            format!("Table {} not found", alias),
            Some(alias.to_string()),
        )
    }

    pub fn column_not_found(column: &str) -> Self {
        Self::new(
            PlannerErrorCode::AeroQueryColumnNotFound,
            format!("Column {} not found", column),
            Some(column.to_string()),
        )
    }

    pub fn ambiguous_column(column: &str) -> Self {
        Self::new(
            PlannerErrorCode::AeroQueryAmbiguousColumn,
            format!("Ambiguous column name {}", column),
            Some(column.to_string()),
        )
    }

    /// `position` is one based, as written.
    pub fn order_by_out_of_range(position: i64) -> Self {
        Self::new(
            PlannerErrorCode::AeroQueryOrderByOutOfRange,
            format!("ORDER BY {} is out of range", position),
            Some(position.to_string()),
        )
    }

    pub fn order_by_not_in_result(sql: &str) -> Self {
        Self::new(
            PlannerErrorCode::AeroQueryOrderByNotInResult,
            format!("Order by expression {} must be in the result list in this case", sql),
            Some(sql.to_string()),
        )
    }

    pub fn not_in_group_by(sql: &str) -> Self {
        Self::new(
            PlannerErrorCode::AeroQueryNotInGroupBy,
            format!("Column {} must be in the GROUP BY list", sql),
            Some(sql.to_string()),
        )
    }

    pub fn unsupported_outer_join(sql: &str) -> Self {
        Self::new(
            PlannerErrorCode::AeroQueryUnsupportedOuterJoin,
            format!("Unsupported outer join condition: {}", sql),
            Some(sql.to_string()),
        )
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(PlannerErrorCode::AeroQueryInternal, reason.into(), None)
    }

    pub fn code(&self) -> PlannerErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl From<ExpressionError> for PlannerError {
    fn from(err: ExpressionError) -> Self {
        Self::internal(err.to_string())
    }
}

impl fmt::Display for PlannerError {
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

impl std::error::Error for PlannerError {}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            PlannerErrorCode::AeroQueryAmbiguousColumn.code(),
            "AERO_QUERY_AMBIGUOUS_COLUMN"
        );
        assert_eq!(
            PlannerErrorCode::AeroQueryNotInGroupBy.code(),
            "AERO_QUERY_NOT_IN_GROUP_BY"
        );
        assert_eq!(PlannerErrorCode::AeroQueryInternal.code(), "AERO_QUERY_INTERNAL");
    }

    #[test]
    fn test_internal_is_fatal() {
        assert!(PlannerError::internal("init twice").is_fatal());
        assert!(!PlannerError::column_not_found("X").is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = PlannerError::order_by_out_of_range(5);
        let display = format!("{}", err);
        assert!(display.starts_with("[REJECT] AERO_QUERY_ORDER_BY_OUT_OF_RANGE"));
        assert_eq!(err.subject(), Some("5"));
    }
}
