//! Secondary index over a transactional map
//!
//! Entries map `(indexed values..., row key)` to the unit value; rows are
//! fetched from the table's scan index. Every operation works through the
//! session's transaction, so uncommitted entries of other sessions stay
//! invisible and concurrent writers never block each other.
//!
//! Uniqueness is checked on `add` and re-validated by the map at commit,
//! which catches two sessions inserting equal values concurrently.

use std::sync::{Arc, PoisonError, RwLock};

use super::cost::{cost_range_index, IndexSort};
use super::cursor::{Cursor, EntryMap, FoundCursor, SecondaryCursor};
use super::errors::{IndexError, IndexResult};
use super::key::{IndexKey, KeyLayout, KeyValue};
use super::{Index, IndexColumn, IndexType, ScanIndex};
use crate::mvcc::{MvMap, TransactionStore};
use crate::observability::{log_event_with_fields, Event};
use crate::table::Session;
use crate::value::{Row, SearchRow};

/// What a secondary index is built from.
#[derive(Debug, Clone)]
pub struct IndexDefinition {
    pub id: u32,
    pub name: String,
    pub table_name: String,
    pub columns: Vec<IndexColumn>,
    pub index_type: IndexType,
    /// Column count of the owning table
    pub table_columns: usize,
}

pub struct SecondaryIndex {
    id: u32,
    name: RwLock<String>,
    table_name: String,
    index_type: IndexType,
    columns: Vec<IndexColumn>,
    layout: Arc<KeyLayout>,
    entries: Arc<MvMap<IndexKey, ()>>,
    scan: Arc<ScanIndex>,
}

impl SecondaryIndex {
    /// Creates an empty index. LOB columns are rejected unless the database
    /// is starting up and re-opening existing definitions.
    pub fn new(
        store: &TransactionStore,
        definition: IndexDefinition,
        scan: Arc<ScanIndex>,
        starting: bool,
    ) -> IndexResult<Self> {
        if !starting {
            if let Some(lob) = definition
                .columns
                .iter()
                .find(|c| c.column.data_type().is_lob())
            {
                return Err(IndexError::lob_unsupported(lob.column.name()));
            }
        }
        let layout = Arc::new(KeyLayout::new(&definition.columns, definition.table_columns));
        let map_name = format!("{}_{}", definition.name, definition.id);
        let entries = if definition.index_type.is_unique() {
            store.open_unique_map(map_name, |a: &IndexKey, b: &IndexKey| {
                a.same_values(b) && !a.has_null()
            })
        } else {
            store.open_map(map_name)
        };
        Ok(Self {
            id: definition.id,
            name: RwLock::new(definition.name),
            table_name: definition.table_name,
            index_type: definition.index_type,
            columns: definition.columns,
            layout,
            entries,
            scan,
        })
    }

    fn entries_for(&self, session: &Session) -> EntryMap {
        session.map_view(&self.entries)
    }

    fn duplicate(&self, session: &Session, key: &IndexKey) -> IndexError {
        let name = self.name();
        log_event_with_fields(
            Event::IndexDuplicateKey,
            &[("index", &name), ("key", &key.to_string())],
        );
        session.database().metrics().increment_index_duplicate_keys();
        IndexError::duplicate_key(&name, key)
    }

    fn cursor(
        &self,
        session: &Session,
        first: Option<IndexKey>,
        last: Option<&SearchRow>,
    ) -> Box<dyn Cursor> {
        Box::new(SecondaryCursor::new(
            self.entries_for(session),
            self.scan.rows_for(session),
            Arc::clone(&self.layout),
            self.name(),
            first,
            last.cloned(),
        ))
    }
}

impl Index for SecondaryIndex {
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
        self.index_type
    }

    fn index_columns(&self) -> &[IndexColumn] {
        &self.columns
    }

    fn create_sql(&self) -> Option<String> {
        let columns: Vec<String> = self.columns.iter().map(IndexColumn::sql).collect();
        Some(format!(
            "CREATE {}{} ON {}({})",
            if self.index_type.is_unique() { "UNIQUE " } else { "" },
            self.name(),
            self.table_name,
            columns.join(", ")
        ))
    }

    fn plan_sql(&self) -> String {
        self.name()
    }

    fn can_get_first_or_last(&self) -> bool {
        true
    }

    fn can_find_next(&self) -> bool {
        true
    }

    fn find(
        &self,
        session: &Session,
        first: Option<&SearchRow>,
        last: Option<&SearchRow>,
    ) -> IndexResult<Box<dyn Cursor>> {
        let first = first.map(|f| {
            self.layout
                .encode_search(f, KeyValue::Low)
                .with_row_key(KeyValue::Low)
        });
        Ok(self.cursor(session, first, last))
    }

    fn find_next(
        &self,
        session: &Session,
        higher_than: &SearchRow,
        last: Option<&SearchRow>,
    ) -> IndexResult<Box<dyn Cursor>> {
        let first = self
            .layout
            .encode_search(higher_than, KeyValue::High)
            .with_row_key(KeyValue::High);
        Ok(self.cursor(session, Some(first), last))
    }

    fn find_first_or_last(&self, session: &Session, first: bool) -> IndexResult<Box<dyn Cursor>> {
        let entries = self.entries_for(session);
        let mut key = if first {
            entries.first_key()?
        } else {
            entries.last_key()?
        };
        // NULL never answers MIN or MAX
        while let Some(k) = &key {
            if k.first_value().map_or(false, |v| !v.is_null()) {
                break;
            }
            key = if first {
                entries.higher_key(k)?
            } else {
                entries.lower_key(k)?
            };
        }
        Ok(Box::new(FoundCursor::new(
            self.scan.rows_for(session),
            self.name(),
            key.map(|k| self.layout.decode(&k)),
        )))
    }

    fn add(&self, session: &Session, row: &Row) -> IndexResult<()> {
        let entries = self.entries_for(session);
        let key = self.layout.encode_row(row);
        if self.index_type.is_unique() {
            let lowest = key.clone().with_row_key(KeyValue::Low);
            if let Some(found) = entries.ceiling_key(&lowest)? {
                if found.same_values(&lowest) && !found.has_null() {
                    return Err(self.duplicate(session, &key));
                }
            }
        }
        entries.put(key, ())?;
        Ok(())
    }

    fn remove_row(&self, session: &Session, row: &Row) -> IndexResult<()> {
        let key = self.layout.encode_row(row);
        if self.entries_for(session).remove(&key)?.is_none() {
            let name = self.name();
            log_event_with_fields(
                Event::IndexRowNotFound,
                &[("index", &name), ("key", &row.key().to_string())],
            );
            return Err(IndexError::row_not_found(&name, row.key()));
        }
        Ok(())
    }

    fn truncate(&self, session: &Session) -> IndexResult<()> {
        self.entries_for(session).clear()?;
        Ok(())
    }

    fn remove_index(&self, _session: &Session) -> IndexResult<()> {
        if !self.entries.is_closed() {
            self.entries.remove_map();
            log_event_with_fields(Event::IndexDropped, &[("index", &self.name())]);
        }
        Ok(())
    }

    fn rename(&self, new_name: &str) {
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = new_name.to_string();
        self.entries.rename(format!("{}_{}", new_name, self.id));
    }

    fn need_rebuild(&self) -> bool {
        self.entries.size_raw() == 0
    }

    fn row_count(&self, session: &Session) -> IndexResult<u64> {
        Ok(self.entries_for(session).size()?)
    }

    fn row_count_approximation(&self) -> u64 {
        self.entries.size_raw()
    }

    fn cost(&self, _session: &Session, masks: Option<&[u8]>, sort: Option<&[IndexSort]>) -> f64 {
        10.0 * cost_range_index(
            &self.columns,
            self.index_type.is_unique(),
            masks,
            self.scan.row_count_approximation(),
            sort,
            false,
        )
    }
}

impl SecondaryIndex {
    /// Name of the backing map.
    pub fn map_name(&self) -> String {
        self.entries.name()
    }
}
