//! Join order and index choice
//!
//! The optimizer sees the statement's filter arena and its top filters
//! (the comma separated FROM items). It picks an order for the top
//! filters and, for every filter, the cheapest index given the filters
//! scanned before it. The result is one chain starting at the top filter.
//!
//! Cost of a chain: starting at 1, every filter multiplies in its own
//! cost, so an expensive filter late in the chain costs as much as it
//! would first.

use std::sync::Arc;

use super::errors::{PlannerError, PlannerResult};
use super::sort::SortOrder;
use crate::expression::Expression;
use crate::index::Index;
use crate::table::{Session, TableFilter};

/// Chosen chain and its estimated cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub top_filter: usize,
    pub cost: f64,
}

/// Ordering hints for index costing: the statement's sort and its expressions.
#[derive(Clone, Copy)]
pub struct SortHint<'a> {
    pub order: &'a SortOrder,
    pub expressions: &'a [Expression],
}

pub trait Optimizer {
    /// Orders `top_filters`, links them into one chain and sets each filter's index.
    fn optimize(
        &self,
        session: &Session,
        filters: &mut [TableFilter],
        top_filters: &[usize],
        sort: Option<SortHint<'_>>,
    ) -> PlannerResult<Plan>;
}

/// Filters reachable from `start` in scan order: each filter, then its
/// nested sub-chain, then the rest of its chain.
pub fn chain_order(filters: &[TableFilter], start: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut next = Some(start);
    while let Some(f) = next {
        out.push(f);
        if let Some(nested) = filters[f].nested_join() {
            out.extend(chain_order(filters, nested));
        }
        next = filters[f].join();
    }
    out
}

struct PlanItem {
    index: Arc<dyn Index>,
    cost: f64,
}

/// Exhaustive permutation search over the top filters.
#[derive(Debug, Clone)]
pub struct CostOptimizer {
    max_permutation_tables: usize,
}

impl CostOptimizer {
    pub fn new(max_permutation_tables: usize) -> Self {
        Self {
            max_permutation_tables,
        }
    }

    fn best_plan_item(
        &self,
        session: &Session,
        filters: &[TableFilter],
        f: usize,
        level: usize,
        bound: &dyn Fn(usize) -> bool,
        sort: Option<SortHint<'_>>,
    ) -> PlanItem {
        let filter = &filters[f];
        let table = filter.table();
        let sorts = sort.map(|s| s.order.index_sorts(s.expressions, f));
        let sorts = sorts.as_deref();

        let scan: Arc<dyn Index> = table.scan_index().clone();
        let scan_only = filter.index_conditions().is_empty().then(|| PlanItem {
            cost: scan.cost(session, None, sorts),
            index: Arc::clone(&scan),
        });

        let mut masks = vec![0u8; table.column_count()];
        for condition in filter.index_conditions() {
            if condition.is_evaluatable(bound) {
                if let Some(m) = masks.get_mut(condition.column.column_id()) {
                    *m |= condition.mask();
                }
            }
        }

        let mut best = PlanItem {
            cost: scan.cost(session, None, None),
            index: scan,
        };
        for index in table.indexes().into_iter().skip(1) {
            let cost = index.cost(session, Some(&masks), sorts);
            if cost < best.cost {
                best = PlanItem { index, cost };
            }
        }
        // more index conditions, earlier in the chain
        let conditions = filter.index_conditions().len() as f64;
        best.cost -= best.cost * conditions / 100.0 / level as f64;

        match scan_only {
            Some(item) if item.cost < best.cost => item,
            _ => best,
        }
    }

    /// Cost of scanning `order`; infinite when an ON condition reads a later
    /// filter outside its own nested sub-chain.
    fn chain_cost(
        &self,
        session: &Session,
        filters: &[TableFilter],
        order: &[usize],
        sort: Option<SortHint<'_>>,
        chosen: &mut Vec<(usize, Arc<dyn Index>)>,
    ) -> f64 {
        chosen.clear();
        let mut cost = 1.0;
        for (level, &f) in order.iter().enumerate() {
            let earlier = &order[..level];
            let bound = |i: usize| earlier.contains(&i);
            let item = self.best_plan_item(session, filters, f, level + 1, &bound, sort);
            cost += cost * item.cost;
            chosen.push((f, item.index));
            if let Some(on) = filters[f].join_condition() {
                let unit = filters[f]
                    .nested_join()
                    .map(|n| chain_order(filters, n))
                    .unwrap_or_default();
                let evaluatable = |i: usize| i == f || earlier.contains(&i) || unit.contains(&i);
                if !on.is_evaluatable(&evaluatable) {
                    return f64::INFINITY;
                }
            }
        }
        cost
    }
}

impl Optimizer for CostOptimizer {
    fn optimize(
        &self,
        session: &Session,
        filters: &mut [TableFilter],
        top_filters: &[usize],
        sort: Option<SortHint<'_>>,
    ) -> PlannerResult<Plan> {
        let Some(&first) = top_filters.first() else {
            return Err(PlannerError::internal("statement has no table filter"));
        };
        let fixed_order = top_filters.len() > self.max_permutation_tables
            || top_filters.iter().any(|&t| {
                chain_order(filters, t)
                    .into_iter()
                    .any(|f| filters[f].is_join_outer() || filters[f].is_join_outer_indirect())
            });

        let candidates: Vec<Vec<usize>> = if fixed_order || top_filters.len() == 1 {
            vec![top_filters.to_vec()]
        } else {
            permutations(top_filters)
        };

        let mut best: Option<(f64, Vec<usize>, Vec<(usize, Arc<dyn Index>)>)> = None;
        let mut chosen = Vec::new();
        for candidate in candidates {
            let order: Vec<usize> = candidate
                .iter()
                .flat_map(|&t| chain_order(filters, t))
                .collect();
            let cost = self.chain_cost(session, filters, &order, sort, &mut chosen);
            if best.as_ref().map_or(true, |(c, _, _)| cost < *c) {
                best = Some((cost, candidate, chosen.clone()));
            }
        }
        let (cost, order, chosen) = match best {
            Some(best) => best,
            None => (f64::INFINITY, top_filters.to_vec(), Vec::new()),
        };

        for (f, index) in chosen {
            filters[f].set_index(index);
        }
        // link the top filters into one chain
        for pair in order.windows(2) {
            let mut last = pair[0];
            while let Some(next) = filters[last].join() {
                last = next;
            }
            filters[last].set_join(Some(pair[1]));
        }
        let top_filter = order.first().copied().unwrap_or(first);
        Ok(Plan { top_filter, cost })
    }
}

/// All orderings of `items`, declared order first.
fn permutations(items: &[usize]) -> Vec<Vec<usize>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for (i, &head) in items.iter().enumerate() {
        let mut rest = items.to_vec();
        rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head);
            out.push(tail);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permutations_start_with_declared_order() {
        let p = permutations(&[0, 1, 2]);
        assert_eq!(p.len(), 6);
        assert_eq!(p[0], vec![0, 1, 2]);
        assert_eq!(p[5], vec![2, 1, 0]);
    }

    #[test]
    fn test_single_permutation() {
        assert_eq!(permutations(&[4]), vec![vec![4]]);
    }
}
