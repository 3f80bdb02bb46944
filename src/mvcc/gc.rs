//! MVCC Garbage Collection floor
//!
//! A committed version may be dropped only if a newer committed version
//! exists at or below the visibility floor: the oldest read view upper
//! bound among open transactions, or the latest commit when none are open.

use std::collections::BTreeMap;

use super::CommitId;

/// Tracks the read view bounds of open transactions.
#[derive(Debug, Clone, Default)]
pub struct VisibilityFloor {
    active: BTreeMap<CommitId, usize>,
}

impl VisibilityFloor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, bound: CommitId) {
        *self.active.entry(bound).or_insert(0) += 1;
    }

    pub fn unregister(&mut self, bound: CommitId) {
        if let Some(count) = self.active.get_mut(&bound) {
            *count -= 1;
            if *count == 0 {
                self.active.remove(&bound);
            }
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.values().sum()
    }

    /// The lowest bound any current or future read view may use.
    pub fn floor(&self, latest_commit: CommitId) -> CommitId {
        self.active
            .keys()
            .next()
            .copied()
            .map(|oldest| oldest.min(latest_commit))
            .unwrap_or(latest_commit)
    }
}
