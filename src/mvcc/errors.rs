//! MVCC error types
//!
//! Error codes:
//! - AERO_TXN_WRITE_CONFLICT (ERROR)
//! - AERO_TXN_UNIQUE_CONFLICT (ERROR)
//! - AERO_TXN_NOT_ACTIVE (FATAL)
//! - AERO_MAP_CLOSED (FATAL)

use std::fmt;

/// Severity levels for MVCC errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The transaction must roll back, the store is healthy
    Error,
    /// Misuse of a closed transaction or map
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MvccErrorCode {
    /// Key holds an uncommitted version of another transaction, or a
    /// version committed after this transaction's read view
    AeroTxnWriteConflict,
    /// Commit-time uniqueness re-validation failed
    AeroTxnUniqueConflict,
    /// Transaction already committed or rolled back
    AeroTxnNotActive,
    /// Map was removed
    AeroMapClosed,
}

impl MvccErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            MvccErrorCode::AeroTxnWriteConflict => "AERO_TXN_WRITE_CONFLICT",
            MvccErrorCode::AeroTxnUniqueConflict => "AERO_TXN_UNIQUE_CONFLICT",
            MvccErrorCode::AeroTxnNotActive => "AERO_TXN_NOT_ACTIVE",
            MvccErrorCode::AeroMapClosed => "AERO_MAP_CLOSED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            MvccErrorCode::AeroTxnWriteConflict | MvccErrorCode::AeroTxnUniqueConflict => {
                Severity::Error
            }
            MvccErrorCode::AeroTxnNotActive | MvccErrorCode::AeroMapClosed => Severity::Fatal,
        }
    }
}

impl fmt::Display for MvccErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone)]
pub struct MvccError {
    code: MvccErrorCode,
    message: String,
}

impl MvccError {
    pub fn write_conflict(map: &str, detail: impl Into<String>) -> Self {
        Self {
            code: MvccErrorCode::AeroTxnWriteConflict,
            message: format!("Concurrent update in map '{}': {}", map, detail.into()),
        }
    }

    pub fn unique_conflict(map: &str, detail: impl Into<String>) -> Self {
        Self {
            code: MvccErrorCode::AeroTxnUniqueConflict,
            message: format!("Unique constraint violated at commit in map '{}': {}", map, detail.into()),
        }
    }

    pub fn not_active(txn: u64) -> Self {
        Self {
            code: MvccErrorCode::AeroTxnNotActive,
            message: format!("Transaction {} is not active", txn),
        }
    }

    pub fn read_only(map: &str) -> Self {
        Self {
            code: MvccErrorCode::AeroTxnNotActive,
            message: format!("Map '{}' was opened without a transaction", map),
        }
    }

    pub fn map_closed(map: &str) -> Self {
        Self {
            code: MvccErrorCode::AeroMapClosed,
            message: format!("Map '{}' is closed", map),
        }
    }

    pub fn code(&self) -> MvccErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self.code,
            MvccErrorCode::AeroTxnWriteConflict | MvccErrorCode::AeroTxnUniqueConflict
        )
    }
}

impl fmt::Display for MvccError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for MvccError {}

pub type MvccResult<T> = Result<T, MvccError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(MvccErrorCode::AeroTxnWriteConflict.code(), "AERO_TXN_WRITE_CONFLICT");
        assert_eq!(MvccErrorCode::AeroMapClosed.code(), "AERO_MAP_CLOSED");
    }

    #[test]
    fn test_conflicts_are_not_fatal() {
        assert!(MvccError::write_conflict("m", "k").is_conflict());
        assert_eq!(MvccError::unique_conflict("m", "k").severity(), Severity::Error);
        assert_eq!(MvccError::not_active(3).severity(), Severity::Fatal);
    }

    #[test]
    fn test_error_display() {
        let display = MvccError::map_closed("idx_7").to_string();
        assert!(display.contains("FATAL"));
        assert!(display.contains("AERO_MAP_CLOSED"));
        assert!(display.contains("idx_7"));
    }
}
