//! Index error types
//!
//! Error codes:
//! - AERO_INDEX_DUPLICATE_KEY (ERROR)
//! - AERO_INDEX_ROW_NOT_FOUND (FATAL)
//! - AERO_INDEX_LOB_UNSUPPORTED (REJECT)
//! - AERO_INDEX_UNSUPPORTED_OPERATION (FATAL)
//! - AERO_INDEX_CONCURRENT_UPDATE (ERROR)
//! - AERO_INDEX_CLOSED (FATAL)

use std::fmt;

use crate::mvcc::{MvccError, MvccErrorCode};

/// Severity levels for index errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Definition rejected before anything was written
    Reject,
    /// Mutation failed, the surrounding transaction decides what to do
    Error,
    /// Index and table disagree, or the index was used after drop
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
pub enum IndexErrorCode {
    /// Unique index already holds a live entry with equal values
    AeroIndexDuplicateKey,
    /// Entry that must exist was missing on delete
    AeroIndexRowNotFound,
    /// Index on a CLOB or BLOB column
    AeroIndexLobUnsupported,
    /// Operation not offered by this index kind
    AeroIndexUnsupportedOperation,
    /// Another transaction holds a pending version of the entry
    AeroIndexConcurrentUpdate,
    /// Index was dropped
    AeroIndexClosed,
}

impl IndexErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            IndexErrorCode::AeroIndexDuplicateKey => "AERO_INDEX_DUPLICATE_KEY",
            IndexErrorCode::AeroIndexRowNotFound => "AERO_INDEX_ROW_NOT_FOUND",
            IndexErrorCode::AeroIndexLobUnsupported => "AERO_INDEX_LOB_UNSUPPORTED",
            IndexErrorCode::AeroIndexUnsupportedOperation => "AERO_INDEX_UNSUPPORTED_OPERATION",
            IndexErrorCode::AeroIndexConcurrentUpdate => "AERO_INDEX_CONCURRENT_UPDATE",
            IndexErrorCode::AeroIndexClosed => "AERO_INDEX_CLOSED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            IndexErrorCode::AeroIndexLobUnsupported => Severity::Reject,
            IndexErrorCode::AeroIndexDuplicateKey | IndexErrorCode::AeroIndexConcurrentUpdate => {
                Severity::Error
            }
            IndexErrorCode::AeroIndexRowNotFound
            | IndexErrorCode::AeroIndexUnsupportedOperation
            | IndexErrorCode::AeroIndexClosed => Severity::Fatal,
        }
    }
}

impl fmt::Display for IndexErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone)]
pub struct IndexError {
    code: IndexErrorCode,
    message: String,
    source: Option<MvccError>,
}

impl IndexError {
    pub fn duplicate_key(index: &str, key: impl fmt::Display) -> Self {
        Self {
            code: IndexErrorCode::AeroIndexDuplicateKey,
            message: format!("Unique index '{}' violated by {}", index, key),
            source: None,
        }
    }

    pub fn row_not_found(index: &str, key: i64) -> Self {
        Self {
            code: IndexErrorCode::AeroIndexRowNotFound,
            message: format!("Row {} not found in index '{}' while deleting", key, index),
            source: None,
        }
    }

    pub fn lob_unsupported(column: &str) -> Self {
        Self {
            code: IndexErrorCode::AeroIndexLobUnsupported,
            message: format!("Index on BLOB or CLOB column '{}'", column),
            source: None,
        }
    }

    pub fn unsupported(index: &str, operation: &str) -> Self {
        Self {
            code: IndexErrorCode::AeroIndexUnsupportedOperation,
            message: format!("Index '{}' does not support {}", index, operation),
            source: None,
        }
    }

    pub fn closed(index: &str) -> Self {
        Self {
            code: IndexErrorCode::AeroIndexClosed,
            message: format!("Index '{}' was dropped", index),
            source: None,
        }
    }

    pub fn code(&self) -> IndexErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The transactional map error this was raised from, if any
    pub fn mvcc_source(&self) -> Option<&MvccError> {
        self.source.as_ref()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl From<MvccError> for IndexError {
    fn from(err: MvccError) -> Self {
        let code = match err.code() {
            MvccErrorCode::AeroMapClosed => IndexErrorCode::AeroIndexClosed,
            MvccErrorCode::AeroTxnWriteConflict | MvccErrorCode::AeroTxnUniqueConflict => {
                IndexErrorCode::AeroIndexConcurrentUpdate
            }
            MvccErrorCode::AeroTxnNotActive => IndexErrorCode::AeroIndexUnsupportedOperation,
        };
        Self {
            code,
            message: err.message().to_string(),
            source: Some(err),
        }
    }
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

pub type IndexResult<T> = Result<T, IndexError>;
