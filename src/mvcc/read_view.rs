//! ReadView - Stable snapshot boundary
//!
//! A read view admits committed versions up to `read_upper_bound` plus the
//! owning transaction's own pending writes logged before `savepoint`.
//! It never changes once established; refreshing a savepoint produces a
//! new view.

use super::{CommitId, TxnId};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ReadView {
    read_upper_bound: CommitId,
    owner: Option<TxnId>,
    savepoint: u64,
}

impl ReadView {
    /// A view with no owning transaction.
    #[inline]
    pub fn new(upper_bound: CommitId) -> Self {
        Self {
            read_upper_bound: upper_bound,
            owner: None,
            savepoint: 0,
        }
    }

    /// A view for a transaction pinned at a savepoint (a log position).
    #[inline]
    pub fn for_transaction(upper_bound: CommitId, owner: TxnId, savepoint: u64) -> Self {
        Self {
            read_upper_bound: upper_bound,
            owner: Some(owner),
            savepoint,
        }
    }

    #[inline]
    pub fn upper_bound(&self) -> CommitId {
        self.read_upper_bound
    }

    #[inline]
    pub fn owner(&self) -> Option<TxnId> {
        self.owner
    }

    #[inline]
    pub fn savepoint(&self) -> u64 {
        self.savepoint
    }

    /// Same snapshot, different savepoint.
    #[inline]
    pub fn at_savepoint(&self, savepoint: u64) -> Self {
        Self { savepoint, ..*self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_view_creation() {
        let view = ReadView::new(CommitId::new(100));
        assert_eq!(view.upper_bound(), CommitId::new(100));
        assert_eq!(view.owner(), None);
    }

    #[test]
    fn test_at_savepoint_keeps_snapshot() {
        let view = ReadView::for_transaction(CommitId::new(7), TxnId::new(3), 2);
        let moved = view.at_savepoint(9);
        assert_eq!(moved.upper_bound(), CommitId::new(7));
        assert_eq!(moved.owner(), Some(TxnId::new(3)));
        assert_eq!(moved.savepoint(), 9);
        assert_eq!(view.savepoint(), 2);
    }
}
