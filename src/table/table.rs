//! Tables
//!
//! A table owns its columns, its scan index (the row store) and the list
//! of secondary indexes. Index 0 of `indexes()` is always the scan index.
//! Row mutations touch every index; a failure part way rolls the session
//! back to the savepoint taken before the first index was touched.

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use super::errors::{TableError, TableResult};
use super::{Column, Session};
use crate::index::{Index, ScanIndex};
use crate::observability::{log_event_with_fields, Event};
use crate::value::{Row, RowKey, SearchRow, Value};

pub struct Table {
    id: u32,
    name: String,
    columns: Vec<Arc<Column>>,
    scan: Arc<ScanIndex>,
    indexes: RwLock<Vec<Arc<dyn Index>>>,
    lock_owner: Mutex<Option<u64>>,
    lock_released: Condvar,
}

impl Table {
    pub(crate) fn new(id: u32, name: String, columns: Vec<Arc<Column>>, scan: Arc<ScanIndex>) -> Self {
        let scan_index: Arc<dyn Index> = scan.clone();
        Self {
            id,
            name,
            columns,
            scan,
            indexes: RwLock::new(vec![scan_index]),
            lock_owner: Mutex::new(None),
            lock_released: Condvar::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Arc<Column>] {
        &self.columns
    }

    pub fn column(&self, column_id: usize) -> Option<&Arc<Column>> {
        self.columns.get(column_id)
    }

    pub fn find_column(&self, name: &str) -> Option<&Arc<Column>> {
        self.columns
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn scan_index(&self) -> &Arc<ScanIndex> {
        &self.scan
    }

    /// Scan index first, then secondary indexes in creation order.
    pub fn indexes(&self) -> Vec<Arc<dyn Index>> {
        self.indexes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn find_index(&self, name: &str) -> Option<Arc<dyn Index>> {
        self.indexes()
            .into_iter()
            .find(|i| i.name().eq_ignore_ascii_case(name))
    }

    pub(crate) fn add_index(&self, index: Arc<dyn Index>) {
        self.indexes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(index);
    }

    pub(crate) fn remove_index(&self, id: u32) -> Option<Arc<dyn Index>> {
        let mut indexes = self.indexes.write().unwrap_or_else(PoisonError::into_inner);
        let position = indexes.iter().skip(1).position(|i| i.id() == id)? + 1;
        Some(indexes.remove(position))
    }

    /// Smallest secondary index whose first column is `column_id`.
    pub fn index_for_column(
        &self,
        column_id: usize,
        need_first_or_last: bool,
        need_find_next: bool,
    ) -> Option<Arc<dyn Index>> {
        let mut result: Option<Arc<dyn Index>> = None;
        for index in self.indexes().into_iter().skip(1) {
            if need_first_or_last && !index.can_get_first_or_last() {
                continue;
            }
            if need_find_next && !index.can_find_next() {
                continue;
            }
            if index.is_first_column(column_id)
                && result
                    .as_ref()
                    .map_or(true, |r| r.index_columns().len() > index.index_columns().len())
            {
                result = Some(index);
            }
        }
        result
    }

    /// Search row with every column unset.
    pub fn template_row(&self) -> SearchRow {
        SearchRow::template(self.columns.len())
    }

    pub fn can_get_row_count(&self) -> bool {
        true
    }

    pub fn row_count(&self, session: &Session) -> TableResult<u64> {
        Ok(self.scan.row_count(session)?)
    }

    pub fn row_count_approximation(&self) -> u64 {
        self.scan.row_count_approximation()
    }

    fn check_row(&self, values: &[Value]) -> TableResult<()> {
        if values.len() != self.columns.len() {
            return Err(TableError::column_count(
                &self.name,
                self.columns.len(),
                values.len(),
            ));
        }
        for (column, value) in self.columns.iter().zip(values) {
            if value.is_null() && !column.is_nullable() {
                return Err(TableError::null_not_allowed(&self.name, column.name()));
            }
        }
        Ok(())
    }

    /// Inserts a row into every index and returns its row key.
    pub fn insert(&self, session: &Session, values: Vec<Value>) -> TableResult<RowKey> {
        self.check_row(&values)?;
        let key = self.scan.assign_key(&values)?;
        let row = Row::new(key, values);
        let savepoint = session.set_savepoint();
        for index in self.indexes() {
            if let Err(err) = index.add(session, &row) {
                session.rollback_to_savepoint(savepoint)?;
                return Err(err.into());
            }
        }
        Ok(key)
    }

    /// Removes a row from every index.
    pub fn delete(&self, session: &Session, row: &Row) -> TableResult<()> {
        let savepoint = session.set_savepoint();
        for index in self.indexes().iter().rev() {
            if let Err(err) = index.remove_row(session, row) {
                session.rollback_to_savepoint(savepoint)?;
                return Err(err.into());
            }
        }
        Ok(())
    }

    pub fn get_row(&self, session: &Session, key: RowKey) -> TableResult<Option<Row>> {
        Ok(self.scan.get_row(session, key)?)
    }

    /// All visible rows in row-key order.
    pub fn rows(&self, session: &Session) -> TableResult<Vec<Row>> {
        let mut cursor = self.scan.find(session, None, None)?;
        let mut rows = Vec::new();
        while cursor.next()? {
            if let Some(row) = cursor.get()? {
                rows.push(row.clone());
            }
        }
        Ok(rows)
    }

    pub fn truncate(&self, session: &Session) -> TableResult<()> {
        for index in self.indexes() {
            index.truncate(session)?;
        }
        Ok(())
    }

    /// Rewrites the row under the session's transaction so concurrent writers conflict.
    pub fn lock_row(&self, session: &Session, row: &Row) -> TableResult<()> {
        Ok(self.scan.lock_row(session, row)?)
    }

    /// Fills a fresh index from the rows visible to the session.
    pub(crate) fn rebuild_index(&self, session: &Session, index: &dyn Index) -> TableResult<()> {
        let mut cursor = self.scan.find(session, None, None)?;
        let mut count = 0u64;
        while cursor.next()? {
            if let Some(row) = cursor.get()? {
                index.add(session, row)?;
                count += 1;
            }
        }
        log_event_with_fields(
            Event::IndexRebuildRequired,
            &[("index", &index.name()), ("rows", &count.to_string())],
        );
        Ok(())
    }

    /// Recomputes column selectivity: distinct values per hundred rows.
    pub fn analyze(&self, session: &Session) -> TableResult<()> {
        let rows = self.rows(session)?;
        if rows.is_empty() {
            return Ok(());
        }
        for column in &self.columns {
            let distinct: HashSet<&Value> = rows
                .iter()
                .map(|r| r.value(column.column_id()))
                .collect();
            let selectivity = (distinct.len() * 100 / rows.len()) as u32;
            column.set_selectivity(selectivity);
        }
        Ok(())
    }

    /// Takes the exclusive table lock for `session`, waiting up to `timeout`.
    pub fn lock_exclusive(self: &Arc<Self>, session: &Session, timeout: Duration) -> TableResult<()> {
        let deadline = Instant::now() + timeout;
        let mut owner = self.lock_owner.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match *owner {
                None => {
                    *owner = Some(session.id());
                    drop(owner);
                    session.add_lock(Arc::clone(self));
                    return Ok(());
                }
                Some(id) if id == session.id() => return Ok(()),
                Some(_) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(TableError::lock_timeout(&self.name));
                    }
                    let (guard, _) = self
                        .lock_released
                        .wait_timeout(owner, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    owner = guard;
                }
            }
        }
    }

    pub(crate) fn unlock(&self, session_id: u64) {
        let mut owner = self.lock_owner.lock().unwrap_or_else(PoisonError::into_inner);
        if *owner == Some(session_id) {
            *owner = None;
            self.lock_released.notify_all();
        }
    }

    pub fn is_locked_exclusively(&self) -> bool {
        self.lock_owner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("columns", &self.columns.len())
            .finish()
    }
}
