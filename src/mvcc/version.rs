//! Version - one entry of a key's history
//!
//! A version carries either a value or an explicit tombstone, and is either
//! committed (bound to a commit identity) or pending (owned by an open
//! transaction at a log position).

use super::{CommitId, TxnId};

/// The payload of a version: a value or an explicit tombstone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionPayload<V> {
    Value(V),
    Tombstone,
}

impl<V> VersionPayload<V> {
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, VersionPayload::Tombstone)
    }

    #[inline]
    pub fn value(&self) -> Option<&V> {
        match self {
            VersionPayload::Value(v) => Some(v),
            VersionPayload::Tombstone => None,
        }
    }
}

/// Commit state of a version.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VersionState {
    Committed(CommitId),
    Pending { txn: TxnId, log_id: u64 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Version<V> {
    payload: VersionPayload<V>,
    state: VersionState,
}

impl<V> Version<V> {
    pub fn new(payload: VersionPayload<V>, state: VersionState) -> Self {
        Self { payload, state }
    }

    pub fn committed(payload: VersionPayload<V>, commit_id: CommitId) -> Self {
        Self::new(payload, VersionState::Committed(commit_id))
    }

    pub fn pending(payload: VersionPayload<V>, txn: TxnId, log_id: u64) -> Self {
        Self::new(payload, VersionState::Pending { txn, log_id })
    }

    #[inline]
    pub fn payload(&self) -> &VersionPayload<V> {
        &self.payload
    }

    #[inline]
    pub fn state(&self) -> VersionState {
        self.state
    }

    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.payload.is_tombstone()
    }

    /// Commit identity, `None` while pending.
    #[inline]
    pub fn commit_id(&self) -> Option<CommitId> {
        match self.state {
            VersionState::Committed(id) => Some(id),
            VersionState::Pending { .. } => None,
        }
    }

    /// Owning transaction, `None` once committed.
    #[inline]
    pub fn pending_owner(&self) -> Option<TxnId> {
        match self.state {
            VersionState::Committed(_) => None,
            VersionState::Pending { txn, .. } => Some(txn),
        }
    }

    /// Binds a pending version to its commit identity.
    pub(crate) fn commit(&mut self, commit_id: CommitId) {
        self.state = VersionState::Committed(commit_id);
    }
}
