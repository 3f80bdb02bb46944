//! Query planner subsystem for aeroquery
//!
//! Everything `Select::prepare` decides before the first row is read:
//! - `SortOrder` / `SelectOrderBy` - ORDER BY normalization
//! - `IndexCondition` - comparisons pushed into a filter's index
//! - `Optimizer` / `CostOptimizer` - filter order and index per filter
//! - `sort_index` / `group_sorted_index` - sort and group avoidance
//!
//! # Invariants
//!
//! - Planning is deterministic: same statement and statistics, same plan
//! - Only the top filter's indexes are considered for sort or group avoidance
//! - All planner errors surface before execution

mod condition;
mod errors;
mod optimizer;
mod order_by;
mod resolver;
mod selector;
mod sort;

pub use condition::{create_index_conditions, cursor_bounds, CursorBounds, IndexComparison, IndexCondition};
pub use errors::{PlannerError, PlannerErrorCode, PlannerResult, Severity};
pub use optimizer::{chain_order, CostOptimizer, Optimizer, Plan, SortHint};
pub use order_by::{init_order, prepare_order, SelectOrderBy};
pub use resolver::{bind_columns, resolve_select_aliases};
pub use selector::{group_sorted_index, is_group_sorted_index, sort_index};
pub use sort::SortOrder;
