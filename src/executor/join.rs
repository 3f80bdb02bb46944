//! Nested-loop scan over a filter chain
//!
//! For every row of a filter the rest of the chain is scanned, so the
//! visitor sees each combination of rows once, in index order of the
//! first filter. A left outer joined filter without a matching row
//! contributes its null row (`None`), as does every filter of its nested
//! sub-chain. An ON condition that reads the nested sub-chain is checked
//! once the sub-chain has produced its rows. The cancel flag and statement
//! deadline are polled before each row.

use std::cell::Cell;

use super::errors::{ExecutorError, ExecutorResult};
use crate::expression::EvalContext;
use crate::index::Cursor;
use crate::planner::{chain_order, cursor_bounds, IndexCondition};
use crate::table::{Interrupt, Session, TableFilter};
use crate::value::{Row, Value};

/// Whether the scan goes on after a visited row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

type Visit<'v> = dyn FnMut(&mut Vec<Option<Row>>) -> ExecutorResult<Flow> + 'v;

pub struct JoinScan<'a> {
    session: &'a Session,
    filters: &'a [TableFilter],
    parameters: &'a [Option<Value>],
    query_id: &'a str,
    rows_scanned: Cell<u64>,
}

impl<'a> JoinScan<'a> {
    pub fn new(
        session: &'a Session,
        filters: &'a [TableFilter],
        parameters: &'a [Option<Value>],
        query_id: &'a str,
    ) -> Self {
        Self {
            session,
            filters,
            parameters,
            query_id,
            rows_scanned: Cell::new(0),
        }
    }

    /// Rows read from indexes so far, over all filters.
    pub fn rows_scanned(&self) -> u64 {
        self.rows_scanned.get()
    }

    pub fn check_interrupt(&self) -> ExecutorResult<()> {
        match self.session.check_interrupt() {
            Some(Interrupt::Cancelled) => Err(ExecutorError::cancelled(self.query_id)),
            Some(Interrupt::TimedOut) => Err(ExecutorError::timeout(self.query_id)),
            None => Ok(()),
        }
    }

    /// Visits every row combination of the chain starting at `top`.
    pub fn run(
        &self,
        top: usize,
        visit: &mut dyn FnMut(&[Option<Row>]) -> ExecutorResult<Flow>,
    ) -> ExecutorResult<Flow> {
        let mut rows = vec![None; self.filters.len()];
        self.scan(Some(top), &mut rows, &mut |rows| visit(rows))
    }

    fn scan(&self, f: Option<usize>, rows: &mut Vec<Option<Row>>, next: &mut Visit<'_>) -> ExecutorResult<Flow> {
        let Some(f) = f else {
            return next(rows);
        };
        let filter = &self.filters[f];
        let deferred = self.on_needs_nested(f);
        let found = Cell::new(false);
        let flow = self.for_each_candidate(f, rows, &mut |row, rows| {
            self.check_interrupt()?;
            self.rows_scanned.set(self.rows_scanned.get() + 1);
            rows[f] = Some(row);
            if !deferred && !self.passes_on(f, rows)? {
                return Ok(Flow::Continue);
            }
            match filter.nested_join() {
                Some(nested) => self.scan(Some(nested), rows, &mut |rows| {
                    if deferred && !self.passes_on(f, rows)? {
                        return Ok(Flow::Continue);
                    }
                    found.set(true);
                    self.scan(filter.join(), rows, next)
                }),
                None => {
                    found.set(true);
                    self.scan(filter.join(), rows, next)
                }
            }
        })?;
        if flow == Flow::Stop {
            return Ok(Flow::Stop);
        }
        if !found.get() && filter.is_join_outer() {
            rows[f] = None;
            if let Some(nested) = filter.nested_join() {
                for n in chain_order(self.filters, nested) {
                    rows[n] = None;
                }
            }
            return self.scan(filter.join(), rows, next);
        }
        Ok(Flow::Continue)
    }

    /// Whether the ON condition of `f` reads its nested sub-chain.
    fn on_needs_nested(&self, f: usize) -> bool {
        let filter = &self.filters[f];
        match (filter.join_condition(), filter.nested_join()) {
            (Some(on), Some(_)) => {
                let position = filter.scan_position();
                !on.is_evaluatable(&|i| self.filters[i].scan_position() <= position)
            }
            _ => false,
        }
    }

    fn passes_on(&self, f: usize, rows: &[Option<Row>]) -> ExecutorResult<bool> {
        match self.filters[f].join_condition() {
            Some(on) => {
                let ctx = EvalContext::new(self.session, self.filters, self.parameters, rows);
                Ok(on.is_true(&ctx)?)
            }
            None => Ok(true),
        }
    }

    /// Feeds the rows of filter `f` that its usable index conditions allow.
    fn for_each_candidate(
        &self,
        f: usize,
        rows: &mut Vec<Option<Row>>,
        visit: &mut dyn FnMut(Row, &mut Vec<Option<Row>>) -> ExecutorResult<Flow>,
    ) -> ExecutorResult<Flow> {
        let filter = &self.filters[f];
        let index = filter.index();
        let position = filter.scan_position();
        let bounds = {
            let ctx = EvalContext::new(self.session, self.filters, self.parameters, rows);
            let bound = |i: usize| self.filters[i].scan_position() < position;
            let usable = |c: &IndexCondition| c.is_evaluatable(&bound);
            cursor_bounds(
                filter.index_conditions(),
                index.as_ref(),
                filter.table().column_count(),
                &ctx,
                &usable,
            )?
        };
        if bounds.always_false {
            return Ok(Flow::Continue);
        }
        match bounds.in_list {
            Some((column, values)) => {
                for value in values {
                    let mut search = filter.table().template_row();
                    search.set_value(column, value);
                    let mut cursor = index.find(self.session, Some(&search), Some(&search))?;
                    if drain(cursor.as_mut(), rows, visit)? == Flow::Stop {
                        return Ok(Flow::Stop);
                    }
                }
                Ok(Flow::Continue)
            }
            None => {
                let mut cursor = index.find(self.session, bounds.first.as_ref(), bounds.last.as_ref())?;
                drain(cursor.as_mut(), rows, visit)
            }
        }
    }
}

fn drain(
    cursor: &mut dyn Cursor,
    rows: &mut Vec<Option<Row>>,
    visit: &mut dyn FnMut(Row, &mut Vec<Option<Row>>) -> ExecutorResult<Flow>,
) -> ExecutorResult<Flow> {
    while cursor.next()? {
        let Some(row) = cursor.get()?.cloned() else {
            continue;
        };
        if visit(row, rows)? == Flow::Stop {
            return Ok(Flow::Stop);
        }
    }
    Ok(Flow::Continue)
}
