//! Commit and transaction identities
//!
//! - `CommitId` totally orders committed versions; the sole authority for visibility
//! - `TxnId` names an open transaction owning uncommitted versions

/// A totally ordered, opaque commit identity.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CommitId(u64);

impl CommitId {
    /// The identity before any commit; data loaded at this point is visible to all.
    pub const ZERO: CommitId = CommitId(0);

    /// Upper bound that admits every committed version.
    pub const MAX: CommitId = CommitId(u64::MAX);

    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

/// Identity of a transaction, unique for the lifetime of a store.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TxnId(u64);

impl TxnId {
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_id_next() {
        assert_eq!(CommitId::ZERO.next(), CommitId::new(1));
        assert!(CommitId::new(5) < CommitId::MAX);
    }

    #[test]
    fn test_txn_id_value() {
        assert_eq!(TxnId::new(42).value(), 42);
    }
}
