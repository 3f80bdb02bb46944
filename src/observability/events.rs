//! Observable events
//!
//! Every structured log line names one of these events.

use std::fmt;

use super::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    ConfigLoaded,

    // Query lifecycle
    QueryPrepared,
    QueryExecuted,
    QueryRejected,
    QueryCancelled,
    /// A non-default row production strategy was chosen
    QueryFastPath,

    // Index
    IndexDuplicateKey,
    /// Removal of an entry that does not exist; the index is corrupt
    IndexRowNotFound,
    IndexRebuildRequired,
    IndexDropped,

    // Transactions
    TxnCommit,
    TxnRollback,
    TxnConflict,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::QueryPrepared => "QUERY_PREPARED",
            Event::QueryExecuted => "QUERY_EXECUTED",
            Event::QueryRejected => "QUERY_REJECTED",
            Event::QueryCancelled => "QUERY_CANCELLED",
            Event::QueryFastPath => "QUERY_FAST_PATH",
            Event::IndexDuplicateKey => "INDEX_DUPLICATE_KEY",
            Event::IndexRowNotFound => "INDEX_ROW_NOT_FOUND",
            Event::IndexRebuildRequired => "INDEX_REBUILD_REQUIRED",
            Event::IndexDropped => "INDEX_DROPPED",
            Event::TxnCommit => "TXN_COMMIT",
            Event::TxnRollback => "TXN_ROLLBACK",
            Event::TxnConflict => "TXN_CONFLICT",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Event::IndexRowNotFound => Severity::Fatal,
            Event::QueryRejected
            | Event::IndexDuplicateKey
            | Event::IndexRebuildRequired
            | Event::TxnConflict => Severity::Warn,
            Event::QueryFastPath | Event::TxnCommit | Event::TxnRollback => Severity::Trace,
            Event::ConfigLoaded
            | Event::QueryPrepared
            | Event::QueryExecuted
            | Event::QueryCancelled
            | Event::IndexDropped => Severity::Info,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_upper_snake() {
        let events = [
            Event::ConfigLoaded,
            Event::QueryPrepared,
            Event::QueryExecuted,
            Event::QueryRejected,
            Event::QueryCancelled,
            Event::QueryFastPath,
            Event::IndexDuplicateKey,
            Event::IndexRowNotFound,
            Event::IndexRebuildRequired,
            Event::IndexDropped,
            Event::TxnCommit,
            Event::TxnRollback,
            Event::TxnConflict,
        ];
        for event in events {
            assert!(event.as_str().chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_only_missing_row_is_fatal() {
        assert!(Event::IndexRowNotFound.is_fatal());
        assert!(!Event::IndexDuplicateKey.is_fatal());
        assert_eq!(Event::QueryFastPath.severity(), Severity::Trace);
    }
}
