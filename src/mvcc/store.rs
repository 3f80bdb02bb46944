//! TransactionStore - commit identity authority
//!
//! Hands out transaction and commit identities, tracks the visibility
//! floor of open transactions and opens the named maps transactions
//! write into. Commits are serialized on the store state lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::gc::VisibilityFloor;
use super::map::MvMap;
use super::{CommitId, Transaction, TxnId};

#[derive(Debug)]
pub(crate) struct StoreState {
    pub(crate) last_commit: CommitId,
    next_txn: u64,
    pub(crate) floor: VisibilityFloor,
}

#[derive(Debug)]
pub struct TransactionStore {
    state: Mutex<StoreState>,
    next_map_id: AtomicU64,
}

impl TransactionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(StoreState {
                last_commit: CommitId::ZERO,
                next_txn: 1,
                floor: VisibilityFloor::new(),
            }),
            next_map_id: AtomicU64::new(1),
        })
    }

    /// Starts a transaction reading the latest committed state.
    pub fn begin(self: &Arc<Self>) -> Transaction {
        let (id, bound) = {
            let mut state = self.lock_state();
            let id = TxnId::new(state.next_txn);
            state.next_txn += 1;
            let bound = state.last_commit;
            state.floor.register(bound);
            (id, bound)
        };
        Transaction::start(Arc::clone(self), id, bound)
    }

    /// Opens an empty map. Keys are ordered by `K`'s `Ord`.
    pub fn open_map<K, V>(&self, name: impl Into<String>) -> Arc<MvMap<K, V>>
    where
        K: Ord + Clone,
    {
        let id = self.next_map_id.fetch_add(1, Ordering::SeqCst);
        Arc::new(MvMap::new(id, name.into(), None))
    }

    /// Opens a map whose commits re-validate uniqueness.
    ///
    /// `conflicts(a, b)` reports whether two keys may not both be live.
    /// Conflicting keys must be adjacent in key order.
    pub fn open_unique_map<K, V, F>(&self, name: impl Into<String>, conflicts: F) -> Arc<MvMap<K, V>>
    where
        K: Ord + Clone,
        F: Fn(&K, &K) -> bool + Send + Sync + 'static,
    {
        let id = self.next_map_id.fetch_add(1, Ordering::SeqCst);
        Arc::new(MvMap::new(id, name.into(), Some(Box::new(conflicts))))
    }

    pub fn last_commit(&self) -> CommitId {
        self.lock_state().last_commit
    }

    pub fn open_transactions(&self) -> usize {
        self.lock_state().floor.active_count()
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_ids_are_unique() {
        let store = TransactionStore::new();
        let a = store.begin();
        let b = store.begin();
        assert_ne!(a.id(), b.id());
        assert_eq!(store.open_transactions(), 2);
        a.rollback();
        b.rollback();
        assert_eq!(store.open_transactions(), 0);
    }

    #[test]
    fn test_commit_advances_last_commit() {
        let store = TransactionStore::new();
        let map = store.open_map::<i64, String>("t");
        let txn = store.begin();
        map.instance(&txn)
            .put(1, "a".to_string())
            .expect("put");
        let id = txn.commit().expect("commit");
        assert_eq!(store.last_commit(), id);
        assert_eq!(id, CommitId::new(1));
    }
}
