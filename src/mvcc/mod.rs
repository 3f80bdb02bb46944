//! MVCC Domain Types
//!
//! Snapshot isolation over ordered, named key spaces:
//! - `CommitId` / `TxnId` - commit and transaction identities
//! - `Version` / `VersionChain` - per-key history, committed or pending
//! - `ReadView` - snapshot bound plus own-write savepoint
//! - `Visibility` - the single visibility rule
//! - `TransactionStore` / `Transaction` - begin, savepoints, commit, rollback
//! - `MvMap` / `TransactionMap` - the ordered map and a transaction's view of it
//! - `VisibilityFloor` - the lowest snapshot still readable, drives pruning

mod commit_id;
mod errors;
mod gc;
mod map;
mod read_view;
mod store;
mod transaction;
mod version;
mod version_chain;
mod visibility;

pub use commit_id::{CommitId, TxnId};
pub use errors::{MvccError, MvccErrorCode, MvccResult, Severity};
pub use gc::VisibilityFloor;
pub use map::{MvMap, TransactionMap};
pub use read_view::ReadView;
pub use store::TransactionStore;
pub use transaction::{Transaction, TxnStatus};
pub use version::{Version, VersionPayload, VersionState};
pub use version_chain::VersionChain;
pub use visibility::{Visibility, VisibilityResult};
