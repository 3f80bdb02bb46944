//! VersionChain - Version history for a key
//!
//! Versions are appended in log order. Committed versions precede the
//! pending versions of the (at most one) transaction currently writing
//! the key.

use super::{CommitId, TxnId, Version, VersionPayload, VersionState};

#[derive(Clone, Debug)]
pub struct VersionChain<V> {
    versions: Vec<Version<V>>,
}

impl<V> Default for VersionChain<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> VersionChain<V> {
    pub fn new() -> Self {
        Self {
            versions: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Raw accessor, oldest first. No visibility filtering.
    #[inline]
    pub fn versions(&self) -> &[Version<V>] {
        &self.versions
    }

    pub fn push(&mut self, version: Version<V>) {
        self.versions.push(version);
    }

    /// The newest version regardless of state.
    pub fn latest(&self) -> Option<&Version<V>> {
        self.versions.last()
    }

    /// The newest committed version.
    pub fn latest_committed(&self) -> Option<&Version<V>> {
        self.versions.iter().rev().find(|v| v.commit_id().is_some())
    }

    /// The transaction holding uncommitted versions of this key, if any.
    pub fn pending_owner(&self) -> Option<TxnId> {
        self.versions.iter().rev().find_map(|v| v.pending_owner())
    }

    /// True when `txn` has a pending tombstone as its newest write here.
    pub fn deleted_by(&self, txn: TxnId) -> bool {
        self.versions
            .iter()
            .rev()
            .find(|v| v.pending_owner() == Some(txn))
            .map(|v| v.is_tombstone())
            .unwrap_or(false)
    }

    /// Collapses the pending versions of `txn` into one committed version.
    ///
    /// Only the last write of the transaction survives; intermediate
    /// writes were never visible outside the transaction.
    pub fn commit(&mut self, txn: TxnId, commit_id: CommitId) {
        let last = self
            .versions
            .iter()
            .rposition(|v| v.pending_owner() == Some(txn));
        let Some(last) = last else {
            return;
        };
        let mut index = 0;
        self.versions.retain(|v| {
            let keep = v.pending_owner() != Some(txn) || index == last;
            index += 1;
            keep
        });
        if let Some(version) = self
            .versions
            .iter_mut()
            .rev()
            .find(|v| v.pending_owner() == Some(txn))
        {
            version.commit(commit_id);
        }
    }

    /// Drops the pending versions of `txn` logged at or after `log_id`.
    pub fn rollback_to(&mut self, txn: TxnId, log_id: u64) {
        self.versions.retain(|v| match v.state() {
            VersionState::Pending { txn: owner, log_id: l } => owner != txn || l < log_id,
            VersionState::Committed(_) => true,
        });
    }

    /// True when `txn` still owns a pending version here.
    pub fn has_pending(&self, txn: TxnId) -> bool {
        self.versions.iter().any(|v| v.pending_owner() == Some(txn))
    }

    /// Removes committed versions no read view at or above `floor` can observe.
    ///
    /// The newest committed version at or below the floor stays, along with
    /// everything newer. A chain left holding only a committed tombstone at
    /// or below the floor is emptied.
    pub fn prune(&mut self, floor: CommitId) {
        let anchor = self
            .versions
            .iter()
            .rposition(|v| matches!(v.commit_id(), Some(c) if c <= floor));
        let Some(anchor) = anchor else {
            return;
        };
        self.versions.drain(..anchor);
        if self.versions.len() == 1 && self.versions[0].is_tombstone() {
            self.versions.clear();
        }
    }

    /// True when the newest version (of any state) carries a value.
    pub fn is_live(&self) -> bool {
        matches!(
            self.latest().map(|v| v.payload()),
            Some(VersionPayload::Value(_))
        )
    }

    /// True when the newest committed version carries a value.
    pub fn is_committed_live(&self) -> bool {
        matches!(
            self.latest_committed().map(|v| v.payload()),
            Some(VersionPayload::Value(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn committed(value: i32, id: u64) -> Version<i32> {
        Version::committed(VersionPayload::Value(value), CommitId::new(id))
    }

    #[test]
    fn test_commit_collapses_pending_writes() {
        let txn = TxnId::new(1);
        let mut chain = VersionChain::new();
        chain.push(committed(1, 1));
        chain.push(Version::pending(VersionPayload::Value(2), txn, 0));
        chain.push(Version::pending(VersionPayload::Value(3), txn, 1));
        chain.commit(txn, CommitId::new(2));

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.pending_owner(), None);
        let latest = chain.latest_committed().expect("latest");
        assert_eq!(latest.payload().value(), Some(&3));
        assert_eq!(latest.commit_id(), Some(CommitId::new(2)));
    }

    #[test]
    fn test_rollback_to_log_position() {
        let txn = TxnId::new(4);
        let mut chain = VersionChain::new();
        chain.push(Version::pending(VersionPayload::Value(1), txn, 0));
        chain.push(Version::pending(VersionPayload::Tombstone, txn, 3));
        chain.rollback_to(txn, 2);
        assert_eq!(chain.len(), 1);
        assert!(chain.is_live());
        chain.rollback_to(txn, 0);
        assert!(chain.is_empty());
    }

    #[test]
    fn test_prune_keeps_anchor_version() {
        let mut chain = VersionChain::new();
        chain.push(committed(1, 1));
        chain.push(committed(2, 3));
        chain.push(committed(3, 5));
        chain.prune(CommitId::new(4));
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.versions()[0].commit_id(), Some(CommitId::new(3)));
    }

    #[test]
    fn test_prune_empties_dead_chain() {
        let mut chain: VersionChain<i32> = VersionChain::new();
        chain.push(committed(1, 1));
        chain.push(Version::committed(VersionPayload::Tombstone, CommitId::new(2)));
        chain.prune(CommitId::new(2));
        assert!(chain.is_empty());
    }

    #[test]
    fn test_deleted_by() {
        let txn = TxnId::new(2);
        let mut chain = VersionChain::new();
        chain.push(committed(1, 1));
        assert!(!chain.deleted_by(txn));
        chain.push(Version::pending(VersionPayload::Tombstone, txn, 0));
        assert!(chain.deleted_by(txn));
        assert!(chain.is_committed_live());
        assert!(!chain.is_live());
    }
}
