//! Scan index: the table's row store
//!
//! Rows live in a transactional map keyed by row key. When the table has
//! a row-id column (a NOT NULL INT primary key) its value is the row key,
//! so range lookups on that column turn into key ranges.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::cost::{cost_range_index, IndexSort};
use super::cursor::{Cursor, FoundCursor, RowMap, ScanCursor};
use super::errors::{IndexError, IndexResult};
use super::{Index, IndexColumn, IndexType, SortType};
use crate::mvcc::{MvMap, TransactionStore};
use crate::observability::{log_event_with_fields, Event};
use crate::table::{Column, Session};
use crate::value::{Row, RowKey, SearchRow, Value};

pub struct ScanIndex {
    id: u32,
    name: RwLock<String>,
    table_name: String,
    rows: Arc<MvMap<RowKey, Vec<Value>>>,
    /// Empty, or the row-id column
    columns: Vec<IndexColumn>,
    last_key: AtomicI64,
}

impl ScanIndex {
    pub fn new(
        store: &TransactionStore,
        id: u32,
        table_name: &str,
        row_id_column: Option<Arc<Column>>,
    ) -> Self {
        let name = format!("{}_DATA", table_name);
        Self {
            id,
            rows: store.open_map(format!("{}_{}", name, id)),
            name: RwLock::new(name),
            table_name: table_name.to_string(),
            columns: row_id_column
                .map(|c| vec![IndexColumn::new(c, SortType::ASCENDING)])
                .unwrap_or_default(),
            last_key: AtomicI64::new(0),
        }
    }

    /// Table column whose value is the row key.
    pub fn row_id_column(&self) -> Option<usize> {
        self.columns.first().map(IndexColumn::column_id)
    }

    /// Row key for a new row: the row-id column's value, or the next free key.
    pub fn assign_key(&self, values: &[Value]) -> IndexResult<RowKey> {
        match self.row_id_column() {
            Some(column) => match values.get(column) {
                Some(Value::Int(key)) => {
                    self.last_key.fetch_max(*key, Ordering::SeqCst);
                    Ok(*key)
                }
                _ => Err(IndexError::unsupported(
                    &self.name(),
                    "a row without an INT row id",
                )),
            },
            None => Ok(self.last_key.fetch_add(1, Ordering::SeqCst) + 1),
        }
    }

    pub(crate) fn rows_for(&self, session: &Session) -> RowMap {
        session.map_view(&self.rows)
    }

    /// Row by key as seen by the session.
    pub fn get_row(&self, session: &Session, key: RowKey) -> IndexResult<Option<Row>> {
        Ok(self
            .rows_for(session)
            .get(&key)?
            .map(|values| Row::new(key, values)))
    }

    /// Rewrites a row with its current values, taking a row lock.
    pub fn lock_row(&self, session: &Session, row: &Row) -> IndexResult<()> {
        self.rows_for(session).put(row.key(), row.values().to_vec())?;
        Ok(())
    }

    fn key_bound(&self, row: Option<&SearchRow>) -> Option<RowKey> {
        let row = row?;
        match self.row_id_column() {
            Some(column) => match row.value(column) {
                Some(Value::Int(k)) => Some(*k),
                _ => row.key(),
            },
            None => row.key(),
        }
    }
}

impl Index for ScanIndex {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> String {
        self.name.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn table_name(&self) -> &str {
        &self.table_name
    }

    fn index_type(&self) -> IndexType {
        IndexType::scan()
    }

    fn index_columns(&self) -> &[IndexColumn] {
        &self.columns
    }

    fn create_sql(&self) -> Option<String> {
        None
    }

    fn plan_sql(&self) -> String {
        format!("{}.tableScan", self.table_name)
    }

    fn is_row_id_index(&self) -> bool {
        !self.columns.is_empty()
    }

    fn can_get_first_or_last(&self) -> bool {
        true
    }

    fn find(
        &self,
        session: &Session,
        first: Option<&SearchRow>,
        last: Option<&SearchRow>,
    ) -> IndexResult<Box<dyn Cursor>> {
        Ok(Box::new(ScanCursor::new(
            self.rows_for(session),
            self.name(),
            self.key_bound(first),
            self.key_bound(last),
        )))
    }

    fn find_first_or_last(&self, session: &Session, first: bool) -> IndexResult<Box<dyn Cursor>> {
        let rows = self.rows_for(session);
        let key = if first { rows.first_key()? } else { rows.last_key()? };
        let found = match key {
            Some(k) => rows.get(&k)?.map(|values| SearchRow::from(&Row::new(k, values))),
            None => None,
        };
        Ok(Box::new(FoundCursor::new(rows, self.name(), found)))
    }

    fn add(&self, session: &Session, row: &Row) -> IndexResult<()> {
        let rows = self.rows_for(session);
        if rows.contains_key(&row.key())? {
            log_event_with_fields(
                Event::IndexDuplicateKey,
                &[("index", &self.name()), ("key", &row.key().to_string())],
            );
            session.database().metrics().increment_index_duplicate_keys();
            return Err(IndexError::duplicate_key(
                &format!("PRIMARY KEY ON {}", self.table_name),
                row.key(),
            ));
        }
        rows.put(row.key(), row.values().to_vec())?;
        Ok(())
    }

    fn remove_row(&self, session: &Session, row: &Row) -> IndexResult<()> {
        if self.rows_for(session).remove(&row.key())?.is_none() {
            log_event_with_fields(
                Event::IndexRowNotFound,
                &[("index", &self.name()), ("key", &row.key().to_string())],
            );
            return Err(IndexError::row_not_found(&self.name(), row.key()));
        }
        Ok(())
    }

    fn truncate(&self, session: &Session) -> IndexResult<()> {
        self.rows_for(session).clear()?;
        Ok(())
    }

    fn remove_index(&self, _session: &Session) -> IndexResult<()> {
        self.rows.remove_map();
        Ok(())
    }

    fn rename(&self, new_name: &str) {
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = new_name.to_string();
        self.rows.rename(format!("{}_{}", new_name, self.id));
    }

    fn need_rebuild(&self) -> bool {
        false
    }

    fn row_count(&self, session: &Session) -> IndexResult<u64> {
        Ok(self.rows_for(session).size()?)
    }

    fn row_count_approximation(&self) -> u64 {
        self.rows.size_raw()
    }

    fn cost(&self, _session: &Session, masks: Option<&[u8]>, sort: Option<&[IndexSort]>) -> f64 {
        10.0 * cost_range_index(
            &self.columns,
            true,
            masks,
            self.row_count_approximation(),
            sort,
            true,
        )
    }
}
