//! In-memory catalog
//!
//! The database owns the settings, the transaction store shared by every
//! map, the metrics registry and the table list. Object ids (tables and
//! indexes) come from one counter, so an index id identifies it globally.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::errors::{TableError, TableResult};
use super::{Column, Session, Table};
use crate::config::{ConfigResult, DatabaseSettings};
use crate::index::{Index, IndexColumn, IndexDefinition, IndexType, ScanIndex, SecondaryIndex, SortType};
use crate::mvcc::TransactionStore;
use crate::observability::{Logger, MetricsRegistry};
use crate::value::DataType;

pub struct Database {
    settings: DatabaseSettings,
    store: Arc<TransactionStore>,
    metrics: MetricsRegistry,
    tables: RwLock<Vec<Arc<Table>>>,
    next_object_id: AtomicU32,
    next_session_id: AtomicU64,
    starting: AtomicBool,
}

impl Database {
    /// Opens an empty database with validated settings.
    pub fn open(settings: DatabaseSettings) -> ConfigResult<Arc<Self>> {
        settings.validate()?;
        Logger::set_min_severity(settings.log_severity()?);
        Ok(Self::build(settings))
    }

    /// Opens an empty database with default settings.
    pub fn in_memory() -> Arc<Self> {
        Self::build(DatabaseSettings::default())
    }

    fn build(settings: DatabaseSettings) -> Arc<Self> {
        Arc::new(Self {
            settings,
            store: TransactionStore::new(),
            metrics: MetricsRegistry::new(),
            tables: RwLock::new(Vec::new()),
            next_object_id: AtomicU32::new(1),
            next_session_id: AtomicU64::new(1),
            starting: AtomicBool::new(false),
        })
    }

    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<TransactionStore> {
        &self.store
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn is_multi_version(&self) -> bool {
        self.settings.multi_version
    }

    /// Set while re-opening existing definitions; relaxes definition checks.
    pub fn set_starting(&self, starting: bool) {
        self.starting.store(starting, Ordering::SeqCst);
    }

    pub fn is_starting(&self) -> bool {
        self.starting.load(Ordering::SeqCst)
    }

    fn allocate_object_id(&self) -> u32 {
        self.next_object_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn create_session(self: &Arc<Self>) -> Arc<Session> {
        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        Arc::new(Session::new(id, Arc::clone(self)))
    }

    /// Creates a table. With `row_id_column` set, that column's value is the row key.
    pub fn create_table(
        &self,
        name: &str,
        columns: Vec<Column>,
        row_id_column: Option<&str>,
    ) -> TableResult<Arc<Table>> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if tables.iter().any(|t| t.name().eq_ignore_ascii_case(name)) {
            return Err(TableError::already_exists(name));
        }
        let columns: Vec<Arc<Column>> = columns
            .into_iter()
            .enumerate()
            .map(|(i, c)| Arc::new(c.with_id(i)))
            .collect();
        let row_id = match row_id_column {
            Some(column_name) => {
                let column = columns
                    .iter()
                    .find(|c| c.name().eq_ignore_ascii_case(column_name))
                    .ok_or_else(|| TableError::column_not_found(name, column_name))?;
                if column.data_type() != DataType::Int || column.is_nullable() {
                    return Err(TableError::invalid_row_id(name, column_name));
                }
                Some(Arc::clone(column))
            }
            None => None,
        };
        let id = self.allocate_object_id();
        let scan = Arc::new(ScanIndex::new(&self.store, id, name, row_id));
        let table = Arc::new(Table::new(id, name.to_string(), columns, scan));
        tables.push(Arc::clone(&table));
        Ok(table)
    }

    pub fn find_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn table(&self, name: &str) -> TableResult<Arc<Table>> {
        self.find_table(name).ok_or_else(|| TableError::not_found(name))
    }

    /// Creates a secondary index and fills it from the rows the session sees.
    pub fn create_index(
        &self,
        session: &Session,
        table_name: &str,
        index_name: &str,
        columns: &[(&str, SortType)],
        index_type: IndexType,
    ) -> TableResult<Arc<dyn Index>> {
        let table = self.table(table_name)?;
        let mut index_columns = Vec::with_capacity(columns.len());
        for (column_name, sort_type) in columns {
            let column = table
                .find_column(column_name)
                .ok_or_else(|| TableError::column_not_found(table_name, column_name))?;
            index_columns.push(IndexColumn::new(Arc::clone(column), *sort_type));
        }
        let definition = IndexDefinition {
            id: self.allocate_object_id(),
            name: index_name.to_string(),
            table_name: table.name().to_string(),
            columns: index_columns,
            index_type,
            table_columns: table.column_count(),
        };
        let index = SecondaryIndex::new(
            &self.store,
            definition,
            Arc::clone(table.scan_index()),
            self.is_starting(),
        )?;
        let index: Arc<dyn Index> = Arc::new(index);
        if index.need_rebuild() && table.row_count(session)? > 0 {
            table.rebuild_index(session, index.as_ref())?;
        }
        table.add_index(Arc::clone(&index));
        Ok(index)
    }

    pub fn drop_index(&self, session: &Session, table_name: &str, index_name: &str) -> TableResult<()> {
        let table = self.table(table_name)?;
        let index = table
            .find_index(index_name)
            .filter(|i| !i.index_type().is_scan())
            .ok_or_else(|| TableError::index_not_found(table_name, index_name))?;
        table.remove_index(index.id());
        index.remove_index(session)?;
        Ok(())
    }

    pub fn rename_index(&self, table_name: &str, index_name: &str, new_name: &str) -> TableResult<()> {
        let table = self.table(table_name)?;
        let index = table
            .find_index(index_name)
            .ok_or_else(|| TableError::index_not_found(table_name, index_name))?;
        index.rename(new_name);
        Ok(())
    }

    /// Drops a table with all its indexes.
    pub fn drop_table(&self, session: &Session, name: &str) -> TableResult<()> {
        let table = {
            let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
            let position = tables
                .iter()
                .position(|t| t.name().eq_ignore_ascii_case(name))
                .ok_or_else(|| TableError::not_found(name))?;
            tables.remove(position)
        };
        for index in table.indexes().iter().rev() {
            index.remove_index(session)?;
        }
        Ok(())
    }

    pub fn tables(&self) -> Vec<Arc<Table>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("settings", &self.settings)
            .field("tables", &self.tables().len())
            .finish()
    }
}
