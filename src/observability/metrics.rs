//! Metrics registry
//!
//! - Counters only, monotonic
//! - Thread-safe, lock-free (`Relaxed` atomics)

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Which row production strategy a query ran with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Quick,
    GroupHashed,
    GroupSorted,
    Distinct,
    Flat,
}

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    queries_prepared: AtomicU64,
    queries_executed: AtomicU64,
    queries_rejected: AtomicU64,
    queries_cancelled: AtomicU64,
    strategy_quick: AtomicU64,
    strategy_group_hashed: AtomicU64,
    strategy_group_sorted: AtomicU64,
    strategy_distinct: AtomicU64,
    strategy_flat: AtomicU64,
    /// Queries whose ORDER BY was satisfied by an index
    index_sorted: AtomicU64,
    rows_scanned: AtomicU64,
    rows_returned: AtomicU64,
    index_duplicate_keys: AtomicU64,
    txn_commits: AtomicU64,
    txn_rollbacks: AtomicU64,
    txn_conflicts: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_queries_prepared(&self) {
        self.queries_prepared.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_rejected(&self) {
        self.queries_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_cancelled(&self) {
        self.queries_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_strategy(&self, strategy: Strategy) {
        let counter = match strategy {
            Strategy::Quick => &self.strategy_quick,
            Strategy::GroupHashed => &self.strategy_group_hashed,
            Strategy::GroupSorted => &self.strategy_group_sorted,
            Strategy::Distinct => &self.strategy_distinct,
            Strategy::Flat => &self.strategy_flat,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_index_sorted(&self) {
        self.index_sorted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows_scanned(&self, rows: u64) {
        self.rows_scanned.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn add_rows_returned(&self, rows: u64) {
        self.rows_returned.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn increment_index_duplicate_keys(&self) {
        self.index_duplicate_keys.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_txn_commits(&self) {
        self.txn_commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_txn_rollbacks(&self) {
        self.txn_rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_txn_conflicts(&self) {
        self.txn_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_prepared: self.queries_prepared.load(Ordering::Relaxed),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_rejected: self.queries_rejected.load(Ordering::Relaxed),
            queries_cancelled: self.queries_cancelled.load(Ordering::Relaxed),
            strategy_quick: self.strategy_quick.load(Ordering::Relaxed),
            strategy_group_hashed: self.strategy_group_hashed.load(Ordering::Relaxed),
            strategy_group_sorted: self.strategy_group_sorted.load(Ordering::Relaxed),
            strategy_distinct: self.strategy_distinct.load(Ordering::Relaxed),
            strategy_flat: self.strategy_flat.load(Ordering::Relaxed),
            index_sorted: self.index_sorted.load(Ordering::Relaxed),
            rows_scanned: self.rows_scanned.load(Ordering::Relaxed),
            rows_returned: self.rows_returned.load(Ordering::Relaxed),
            index_duplicate_keys: self.index_duplicate_keys.load(Ordering::Relaxed),
            txn_commits: self.txn_commits.load(Ordering::Relaxed),
            txn_rollbacks: self.txn_rollbacks.load(Ordering::Relaxed),
            txn_conflicts: self.txn_conflicts.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queries_prepared: u64,
    pub queries_executed: u64,
    pub queries_rejected: u64,
    pub queries_cancelled: u64,
    pub strategy_quick: u64,
    pub strategy_group_hashed: u64,
    pub strategy_group_sorted: u64,
    pub strategy_distinct: u64,
    pub strategy_flat: u64,
    pub index_sorted: u64,
    pub rows_scanned: u64,
    pub rows_returned: u64,
    pub index_duplicate_keys: u64,
    pub txn_commits: u64,
    pub txn_rollbacks: u64,
    pub txn_conflicts: u64,
}
