//! Transaction - snapshot reader and pending writer
//!
//! A transaction reads the store as of its begin and writes pending
//! versions tagged with a monotonically increasing log position. A
//! savepoint is a log position: rolling back to it discards every later
//! write; reading at it hides every later write.
//!
//! Commit validates every touched map, then binds all pending versions to
//! one fresh commit identity. A failed validation rolls the whole
//! transaction back.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::errors::{MvccError, MvccResult};
use super::map::MapParticipant;
use super::{CommitId, ReadView, TransactionStore, TxnId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    Open,
    Committed,
    RolledBack,
}

struct TxnState {
    status: TxnStatus,
    next_log_id: u64,
    participants: Vec<Arc<dyn MapParticipant>>,
}

struct TxnInner {
    id: TxnId,
    read_bound: CommitId,
    store: Arc<TransactionStore>,
    state: Mutex<TxnState>,
}

/// Shared handle to one transaction.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TxnInner>,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("read_bound", &self.inner.read_bound)
            .field("status", &self.status())
            .finish()
    }
}

impl Transaction {
    pub(crate) fn start(store: Arc<TransactionStore>, id: TxnId, read_bound: CommitId) -> Self {
        Self {
            inner: Arc::new(TxnInner {
                id,
                read_bound,
                store,
                state: Mutex::new(TxnState {
                    status: TxnStatus::Open,
                    next_log_id: 0,
                    participants: Vec::new(),
                }),
            }),
        }
    }

    pub fn id(&self) -> TxnId {
        self.inner.id
    }

    pub fn status(&self) -> TxnStatus {
        self.inner.lock().status
    }

    pub fn is_open(&self) -> bool {
        self.status() == TxnStatus::Open
    }

    /// Current log position; every write so far precedes it.
    pub fn set_savepoint(&self) -> u64 {
        self.inner.lock().next_log_id
    }

    /// A view seeing committed data as of begin plus own writes before `savepoint`.
    pub fn read_view_at(&self, savepoint: u64) -> ReadView {
        ReadView::for_transaction(self.inner.read_bound, self.inner.id, savepoint)
    }

    /// A view seeing all own writes so far.
    pub fn read_view(&self) -> ReadView {
        self.read_view_at(self.set_savepoint())
    }

    /// Reserves a log position for a write into `participant`.
    pub(crate) fn log_write(&self, participant: Arc<dyn MapParticipant>) -> MvccResult<u64> {
        let mut state = self.inner.lock();
        if state.status != TxnStatus::Open {
            return Err(MvccError::not_active(self.inner.id.value()));
        }
        let log_id = state.next_log_id;
        state.next_log_id += 1;
        let id = participant.map_id();
        if !state.participants.iter().any(|p| p.map_id() == id) {
            state.participants.push(participant);
        }
        Ok(log_id)
    }

    /// Discards every write logged at or after `savepoint`.
    pub fn rollback_to_savepoint(&self, savepoint: u64) -> MvccResult<()> {
        let participants = {
            let state = self.inner.lock();
            if state.status != TxnStatus::Open {
                return Err(MvccError::not_active(self.inner.id.value()));
            }
            state.participants.clone()
        };
        for participant in &participants {
            participant.rollback_to(self.inner.id, savepoint);
        }
        Ok(())
    }

    pub fn commit(&self) -> MvccResult<CommitId> {
        let participants = {
            let state = self.inner.lock();
            if state.status != TxnStatus::Open {
                return Err(MvccError::not_active(self.inner.id.value()));
            }
            state.participants.clone()
        };

        let mut store = self.inner.store.lock_state();
        for participant in &participants {
            if let Err(err) = participant.validate_commit(self.inner.id) {
                drop(store);
                self.rollback();
                return Err(err);
            }
        }
        let commit_id = store.last_commit.next();
        store.floor.unregister(self.inner.read_bound);
        let floor = store.floor.floor(store.last_commit);
        for participant in &participants {
            participant.commit(self.inner.id, commit_id, floor);
        }
        store.last_commit = commit_id;
        drop(store);

        let mut state = self.inner.lock();
        state.status = TxnStatus::Committed;
        state.participants.clear();
        Ok(commit_id)
    }

    /// Discards all writes. Rolling back a finished transaction is a no-op.
    pub fn rollback(&self) {
        self.inner.rollback();
    }
}

impl TxnInner {
    fn lock(&self) -> MutexGuard<'_, TxnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rollback(&self) {
        let participants = {
            let mut state = self.lock();
            if state.status != TxnStatus::Open {
                return;
            }
            state.status = TxnStatus::RolledBack;
            std::mem::take(&mut state.participants)
        };
        for participant in &participants {
            participant.rollback_to(self.id, 0);
        }
        self.store.lock_state().floor.unregister(self.read_bound);
    }
}

impl Drop for TxnInner {
    fn drop(&mut self) {
        self.rollback();
    }
}
