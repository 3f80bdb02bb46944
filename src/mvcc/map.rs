//! Transactional ordered maps
//!
//! `MvMap` owns the version chains of a named, ordered key space.
//! `TransactionMap` is a transaction's view of it pinned at a savepoint:
//! reads follow the visibility rule, writes append pending versions.
//!
//! Writing a key that holds another transaction's pending version, or a
//! version committed after the writer's snapshot, is a write conflict.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Debug;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::errors::{MvccError, MvccResult};
use super::{
    CommitId, ReadView, Transaction, TxnId, Version, VersionChain, VersionPayload, Visibility,
};

type ConflictCheck<K> = Box<dyn Fn(&K, &K) -> bool + Send + Sync>;

/// Hook through which a transaction finalizes its writes in a map.
pub(crate) trait MapParticipant: Send + Sync {
    fn map_id(&self) -> u64;
    fn validate_commit(&self, txn: TxnId) -> MvccResult<()>;
    fn commit(&self, txn: TxnId, commit_id: CommitId, floor: CommitId);
    fn rollback_to(&self, txn: TxnId, log_id: u64);
}

pub struct MvMap<K, V> {
    id: u64,
    name: RwLock<String>,
    data: RwLock<BTreeMap<K, VersionChain<V>>>,
    pending: Mutex<HashMap<TxnId, BTreeSet<K>>>,
    closed: AtomicBool,
    conflicts: Option<ConflictCheck<K>>,
}

impl<K, V> MvMap<K, V>
where
    K: Ord + Clone,
{
    pub(crate) fn new(id: u64, name: String, conflicts: Option<ConflictCheck<K>>) -> Self {
        Self {
            id,
            name: RwLock::new(name),
            data: RwLock::new(BTreeMap::new()),
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            conflicts,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> String {
        self.name.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn rename(&self, new_name: impl Into<String>) {
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = new_name.into();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes the map and drops all its data. Later access fails.
    pub fn remove_map(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.write_data().clear();
        self.lock_pending().clear();
    }

    /// Keys whose newest version, committed or not, carries a value.
    pub fn size_raw(&self) -> u64 {
        self.read_data().values().filter(|c| c.is_live()).count() as u64
    }

    /// View of `txn` seeing all of its writes so far.
    pub fn instance(self: &Arc<Self>, txn: &Transaction) -> TransactionMap<K, V> {
        TransactionMap {
            map: Arc::clone(self),
            txn: Some(txn.clone()),
            view: txn.read_view(),
        }
    }

    /// View of `txn` hiding its writes logged at or after `savepoint`.
    pub fn instance_at(self: &Arc<Self>, txn: &Transaction, savepoint: u64) -> TransactionMap<K, V> {
        TransactionMap {
            map: Arc::clone(self),
            txn: Some(txn.clone()),
            view: txn.read_view_at(savepoint),
        }
    }

    /// Read-only view of the latest committed state.
    pub fn committed(self: &Arc<Self>) -> TransactionMap<K, V> {
        TransactionMap {
            map: Arc::clone(self),
            txn: None,
            view: ReadView::new(CommitId::MAX),
        }
    }

    fn read_data(&self) -> RwLockReadGuard<'_, BTreeMap<K, VersionChain<V>>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_data(&self) -> RwLockWriteGuard<'_, BTreeMap<K, VersionChain<V>>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<TxnId, BTreeSet<K>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> MvccResult<()> {
        if self.is_closed() {
            return Err(MvccError::map_closed(&self.name()));
        }
        Ok(())
    }

    /// Live state of `chain` once `txn` commits.
    fn live_after_commit(chain: &VersionChain<V>, txn: TxnId) -> bool {
        if chain.has_pending(txn) {
            !chain.deleted_by(txn)
        } else {
            chain.is_committed_live()
        }
    }
}

impl<K, V> MapParticipant for MvMap<K, V>
where
    K: Ord + Clone + Debug + Send + Sync,
    V: Send + Sync,
{
    fn map_id(&self) -> u64 {
        self.id
    }

    fn validate_commit(&self, txn: TxnId) -> MvccResult<()> {
        let Some(conflicts) = &self.conflicts else {
            return Ok(());
        };
        if self.is_closed() {
            return Ok(());
        }
        let keys = self.lock_pending().get(&txn).cloned().unwrap_or_default();
        let data = self.read_data();
        for key in &keys {
            let Some(chain) = data.get(key) else {
                continue;
            };
            if !Self::live_after_commit(chain, txn) {
                continue;
            }
            let after = data.range((Bound::Excluded(key), Bound::Unbounded));
            let before = data.range((Bound::Unbounded, Bound::Excluded(key))).rev();
            let sides: [Box<dyn Iterator<Item = (&K, &VersionChain<V>)>>; 2] =
                [Box::new(after), Box::new(before)];
            for side in sides {
                for (other, other_chain) in side {
                    if !conflicts(key, other) {
                        break;
                    }
                    if Self::live_after_commit(other_chain, txn) {
                        return Err(MvccError::unique_conflict(
                            &self.name(),
                            format!("{:?} conflicts with {:?}", key, other),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn commit(&self, txn: TxnId, commit_id: CommitId, floor: CommitId) {
        let keys = self.lock_pending().remove(&txn).unwrap_or_default();
        let mut data = self.write_data();
        for key in keys {
            if let Some(chain) = data.get_mut(&key) {
                chain.commit(txn, commit_id);
                chain.prune(floor);
                if chain.is_empty() {
                    data.remove(&key);
                }
            }
        }
    }

    fn rollback_to(&self, txn: TxnId, log_id: u64) {
        let mut pending = self.lock_pending();
        let Some(keys) = pending.get_mut(&txn) else {
            return;
        };
        let mut data = self.write_data();
        keys.retain(|key| {
            let Some(chain) = data.get_mut(key) else {
                return false;
            };
            chain.rollback_to(txn, log_id);
            let still_pending = chain.has_pending(txn);
            if chain.is_empty() {
                data.remove(key);
            }
            still_pending
        });
        if keys.is_empty() {
            pending.remove(&txn);
        }
    }
}

/// A transaction's view of an `MvMap`.
pub struct TransactionMap<K, V> {
    map: Arc<MvMap<K, V>>,
    txn: Option<Transaction>,
    view: ReadView,
}

impl<K, V> Clone for TransactionMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            map: Arc::clone(&self.map),
            txn: self.txn.clone(),
            view: self.view,
        }
    }
}

impl<K, V> TransactionMap<K, V>
where
    K: Ord + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn map(&self) -> &Arc<MvMap<K, V>> {
        &self.map
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.txn.as_ref()
    }

    pub fn read_view(&self) -> ReadView {
        self.view
    }

    /// Moves the view to the transaction's current log position.
    pub fn refresh(&mut self) {
        if let Some(txn) = &self.txn {
            self.view = txn.read_view();
        }
    }

    pub fn get(&self, key: &K) -> MvccResult<Option<V>> {
        self.map.ensure_open()?;
        let data = self.map.read_data();
        Ok(data
            .get(key)
            .and_then(|chain| Visibility::visible_version(chain, &self.view).value().cloned()))
    }

    pub fn contains_key(&self, key: &K) -> MvccResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Writes `value`, returning the previously visible value.
    pub fn put(&self, key: K, value: V) -> MvccResult<Option<V>> {
        self.write(key, VersionPayload::Value(value))
    }

    /// Deletes `key`, returning the previously visible value.
    ///
    /// Absent keys are left untouched.
    pub fn remove(&self, key: &K) -> MvccResult<Option<V>> {
        self.write(key.clone(), VersionPayload::Tombstone)
    }

    /// Deletes every visible key.
    pub fn clear(&self) -> MvccResult<()> {
        let keys: Vec<K> = {
            self.map.ensure_open()?;
            let data = self.map.read_data();
            data.iter()
                .filter(|(_, chain)| Visibility::visible_version(chain, &self.view).is_visible())
                .map(|(k, _)| k.clone())
                .collect()
        };
        for key in keys {
            self.write(key, VersionPayload::Tombstone)?;
        }
        Ok(())
    }

    /// Number of visible keys.
    pub fn size(&self) -> MvccResult<u64> {
        self.map.ensure_open()?;
        let data = self.map.read_data();
        Ok(data
            .values()
            .filter(|chain| Visibility::visible_version(chain, &self.view).is_visible())
            .count() as u64)
    }

    pub fn first_key(&self) -> MvccResult<Option<K>> {
        self.find_forward(Bound::Unbounded)
    }

    pub fn last_key(&self) -> MvccResult<Option<K>> {
        self.find_backward(Bound::Unbounded)
    }

    /// Smallest visible key `>= key`.
    pub fn ceiling_key(&self, key: &K) -> MvccResult<Option<K>> {
        self.find_forward(Bound::Included(key))
    }

    /// Smallest visible key `> key`.
    pub fn higher_key(&self, key: &K) -> MvccResult<Option<K>> {
        self.find_forward(Bound::Excluded(key))
    }

    /// Largest visible key `<= key`.
    pub fn floor_key(&self, key: &K) -> MvccResult<Option<K>> {
        self.find_backward(Bound::Included(key))
    }

    /// Largest visible key `< key`.
    pub fn lower_key(&self, key: &K) -> MvccResult<Option<K>> {
        self.find_backward(Bound::Excluded(key))
    }

    fn find_forward(&self, from: Bound<&K>) -> MvccResult<Option<K>> {
        self.map.ensure_open()?;
        let data = self.map.read_data();
        Ok(data
            .range((from, Bound::Unbounded))
            .find(|(_, chain)| Visibility::visible_version(chain, &self.view).is_visible())
            .map(|(k, _)| k.clone()))
    }

    fn find_backward(&self, to: Bound<&K>) -> MvccResult<Option<K>> {
        self.map.ensure_open()?;
        let data = self.map.read_data();
        Ok(data
            .range((Bound::Unbounded, to))
            .rev()
            .find(|(_, chain)| Visibility::visible_version(chain, &self.view).is_visible())
            .map(|(k, _)| k.clone()))
    }

    fn write(&self, key: K, payload: VersionPayload<V>) -> MvccResult<Option<V>> {
        self.map.ensure_open()?;
        let txn = self
            .txn
            .as_ref()
            .ok_or_else(|| MvccError::read_only(&self.map.name()))?;
        let participant: Arc<dyn MapParticipant> = self.map.clone();
        let log_id = txn.log_write(participant)?;

        let mut data = self.map.write_data();
        if let Some(chain) = data.get(&key) {
            if let Some(owner) = chain.pending_owner() {
                if owner != txn.id() {
                    return Err(MvccError::write_conflict(
                        &self.map.name(),
                        format!("{:?} is being written by transaction {}", key, owner.value()),
                    ));
                }
            }
            let newest = chain.latest_committed().and_then(|v| v.commit_id());
            if matches!(newest, Some(c) if c > self.view.upper_bound()) {
                return Err(MvccError::write_conflict(
                    &self.map.name(),
                    format!("{:?} was committed after the transaction began", key),
                ));
            }
        }

        let own_view = txn.read_view_at(log_id);
        let previous = data
            .get(&key)
            .and_then(|chain| Visibility::visible_version(chain, &own_view).value().cloned());
        if previous.is_none() && payload.is_tombstone() {
            return Ok(None);
        }
        data.entry(key.clone())
            .or_default()
            .push(Version::pending(payload, txn.id(), log_id));
        drop(data);

        self.map.lock_pending().entry(txn.id()).or_default().insert(key);
        Ok(previous)
    }
}
