//! MVCC Visibility
//!
//! Given a read view `R` and a version chain, the visible version is the
//! newest version that is either
//! 1. a pending version of `R`'s owner logged before `R.savepoint`, or
//! 2. a committed version with `commit_id <= R.read_upper_bound`.
//!
//! If that version is a tombstone the key is invisible. Pending versions of
//! other transactions are never visible.

use super::{ReadView, Version, VersionChain, VersionPayload, VersionState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityResult<'a, V> {
    Visible(&'a V),
    Invisible,
}

impl<'a, V> VisibilityResult<'a, V> {
    pub fn value(&self) -> Option<&'a V> {
        match self {
            VisibilityResult::Visible(v) => Some(v),
            VisibilityResult::Invisible => None,
        }
    }

    pub fn is_visible(&self) -> bool {
        matches!(self, VisibilityResult::Visible(_))
    }
}

pub struct Visibility;

impl Visibility {
    pub fn is_version_visible<V>(version: &Version<V>, view: &ReadView) -> bool {
        match version.state() {
            VersionState::Committed(commit_id) => commit_id <= view.upper_bound(),
            VersionState::Pending { txn, log_id } => {
                view.owner() == Some(txn) && log_id < view.savepoint()
            }
        }
    }

    pub fn visible_version<'a, V>(
        chain: &'a VersionChain<V>,
        view: &ReadView,
    ) -> VisibilityResult<'a, V> {
        let newest = chain
            .versions()
            .iter()
            .rev()
            .find(|v| Self::is_version_visible(v, view));
        match newest.map(|v| v.payload()) {
            Some(VersionPayload::Value(value)) => VisibilityResult::Visible(value),
            Some(VersionPayload::Tombstone) | None => VisibilityResult::Invisible,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvcc::{CommitId, TxnId};

    fn chain() -> VersionChain<&'static str> {
        let mut chain = VersionChain::new();
        chain.push(Version::committed(VersionPayload::Value("v1"), CommitId::new(1)));
        chain.push(Version::committed(VersionPayload::Value("v3"), CommitId::new(3)));
        chain
    }

    #[test]
    fn test_snapshot_bound() {
        let c = chain();
        assert_eq!(
            Visibility::visible_version(&c, &ReadView::new(CommitId::new(2))).value(),
            Some(&"v1")
        );
        assert_eq!(
            Visibility::visible_version(&c, &ReadView::new(CommitId::new(3))).value(),
            Some(&"v3")
        );
        assert!(!Visibility::visible_version(&c, &ReadView::new(CommitId::ZERO)).is_visible());
    }

    #[test]
    fn test_own_pending_write_respects_savepoint() {
        let owner = TxnId::new(8);
        let mut c = chain();
        c.push(Version::pending(VersionPayload::Tombstone, owner, 5));

        let before = ReadView::for_transaction(CommitId::new(3), owner, 5);
        assert_eq!(Visibility::visible_version(&c, &before).value(), Some(&"v3"));

        let after = before.at_savepoint(6);
        assert!(!Visibility::visible_version(&c, &after).is_visible());
    }

    #[test]
    fn test_foreign_pending_write_invisible() {
        let mut c = chain();
        c.push(Version::pending(VersionPayload::Value("dirty"), TxnId::new(2), 0));
        let view = ReadView::for_transaction(CommitId::MAX, TxnId::new(1), u64::MAX);
        assert_eq!(Visibility::visible_version(&c, &view).value(), Some(&"v3"));
    }
}
