//! Sessions
//!
//! A session owns at most one open transaction, begun lazily on first
//! use, plus the per-statement state: the savepoint reads are pinned to,
//! the cancel flag and the statement deadline. Exclusive table locks taken by the session
//! are released when its transaction ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{Database, Table};
use crate::mvcc::{MvMap, MvccResult, Transaction, TransactionMap, TxnId};
use crate::observability::{log_event_with_fields, Event};

/// Why a running statement must stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Cancelled,
    TimedOut,
}

pub struct Session {
    id: u64,
    database: Arc<Database>,
    transaction: Mutex<Option<Transaction>>,
    statement_savepoint: Mutex<Option<(TxnId, u64)>>,
    cancelled: AtomicBool,
    query_timeout: Mutex<Option<Duration>>,
    deadline: Mutex<Option<Instant>>,
    locks: Mutex<Vec<Arc<Table>>>,
}

impl Session {
    pub(crate) fn new(id: u64, database: Arc<Database>) -> Self {
        let timeout_ms = database.settings().query_timeout_ms;
        Self {
            id,
            database,
            transaction: Mutex::new(None),
            statement_savepoint: Mutex::new(None),
            cancelled: AtomicBool::new(false),
            query_timeout: Mutex::new((timeout_ms > 0).then(|| Duration::from_millis(timeout_ms))),
            deadline: Mutex::new(None),
            locks: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    fn lock_transaction(&self) -> MutexGuard<'_, Option<Transaction>> {
        self.transaction.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The open transaction, begun on first use.
    pub fn transaction(&self) -> Transaction {
        let mut slot = self.lock_transaction();
        match slot.as_ref() {
            Some(txn) if txn.is_open() => txn.clone(),
            _ => {
                let txn = self.database.store().begin();
                *slot = Some(txn.clone());
                txn
            }
        }
    }

    pub fn has_open_transaction(&self) -> bool {
        self.lock_transaction()
            .as_ref()
            .map_or(false, Transaction::is_open)
    }

    pub fn set_savepoint(&self) -> u64 {
        self.transaction().set_savepoint()
    }

    pub fn rollback_to_savepoint(&self, savepoint: u64) -> MvccResult<()> {
        self.transaction().rollback_to_savepoint(savepoint)
    }

    pub fn commit(&self) -> MvccResult<()> {
        let txn = self.lock_transaction().take();
        let result = match txn {
            Some(txn) => {
                let metrics = self.database.metrics();
                match txn.commit() {
                    Ok(commit_id) => {
                        metrics.increment_txn_commits();
                        log_event_with_fields(
                            Event::TxnCommit,
                            &[
                                ("session", &self.id.to_string()),
                                ("commit_id", &commit_id.value().to_string()),
                            ],
                        );
                        Ok(())
                    }
                    Err(err) => {
                        metrics.increment_txn_conflicts();
                        metrics.increment_txn_rollbacks();
                        log_event_with_fields(
                            Event::TxnConflict,
                            &[("session", &self.id.to_string()), ("reason", err.message())],
                        );
                        Err(err)
                    }
                }
            }
            None => Ok(()),
        };
        self.release_locks();
        result
    }

    pub fn rollback(&self) {
        let txn = self.lock_transaction().take();
        if let Some(txn) = txn {
            if txn.is_open() {
                txn.rollback();
                self.database.metrics().increment_txn_rollbacks();
                log_event_with_fields(Event::TxnRollback, &[("session", &self.id.to_string())]);
            }
        }
        self.release_locks();
    }

    /// Requests cancellation of the running (or next) statement.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// `None` disables the statement deadline.
    pub fn set_query_timeout(&self, timeout: Option<Duration>) {
        *self.query_timeout.lock().unwrap_or_else(PoisonError::into_inner) = timeout;
    }

    /// The session's view of `map`. While a statement runs, writes the
    /// statement itself made are hidden.
    pub(crate) fn map_view<K, V>(&self, map: &Arc<MvMap<K, V>>) -> TransactionMap<K, V>
    where
        K: Ord + Clone,
    {
        let txn = self.transaction();
        let pinned = *self
            .statement_savepoint
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match pinned {
            Some((id, savepoint)) if id == txn.id() => map.instance_at(&txn, savepoint),
            _ => map.instance(&txn),
        }
    }

    /// Pins reads to the current savepoint and arms the deadline for a new statement.
    pub fn start_statement(&self) {
        let txn = self.transaction();
        *self
            .statement_savepoint
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some((txn.id(), txn.set_savepoint()));
        let timeout = *self.query_timeout.lock().unwrap_or_else(PoisonError::into_inner);
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner) =
            timeout.map(|t| Instant::now() + t);
    }

    pub fn end_statement(&self) {
        *self
            .statement_savepoint
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Polled between rows. A pending cancel request is consumed.
    pub fn check_interrupt(&self) -> Option<Interrupt> {
        if self.cancelled.swap(false, Ordering::SeqCst) {
            return Some(Interrupt::Cancelled);
        }
        let deadline = *self.deadline.lock().unwrap_or_else(PoisonError::into_inner);
        match deadline {
            Some(d) if Instant::now() >= d => Some(Interrupt::TimedOut),
            _ => None,
        }
    }

    pub(crate) fn add_lock(&self, table: Arc<Table>) {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(table);
    }

    pub fn locked_tables(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn release_locks(&self) {
        let tables = std::mem::take(&mut *self.locks.lock().unwrap_or_else(PoisonError::into_inner));
        for table in tables {
            table.unlock(self.id);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.rollback();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use crate::value::{DataType, Value};

    fn numbers(db: &Arc<Database>) -> Arc<Table> {
        db.create_table("NUMBERS", vec![Column::new("ID", DataType::Int).not_null()], Some("ID"))
            .unwrap()
    }

    #[test]
    fn test_statement_hides_its_own_writes() {
        let db = Database::in_memory();
        let table = numbers(&db);
        let session = db.create_session();
        table.insert(&session, vec![Value::Int(1)]).unwrap();

        session.start_statement();
        table.insert(&session, vec![Value::Int(2)]).unwrap();
        assert_eq!(table.rows(&session).unwrap().len(), 1);
        session.end_statement();

        assert_eq!(table.rows(&session).unwrap().len(), 2);
    }

    #[test]
    fn test_statement_pin_ignored_after_commit() {
        let db = Database::in_memory();
        let table = numbers(&db);
        let session = db.create_session();

        session.start_statement();
        session.commit().unwrap();
        // the pin belongs to the finished transaction
        table.insert(&session, vec![Value::Int(1)]).unwrap();
        assert_eq!(table.rows(&session).unwrap().len(), 1);
        session.end_statement();
    }

    #[test]
    fn test_cancel_is_consumed() {
        let db = Database::in_memory();
        let session = db.create_session();
        session.cancel();
        assert_eq!(session.check_interrupt(), Some(Interrupt::Cancelled));
        assert_eq!(session.check_interrupt(), None);
    }
}
