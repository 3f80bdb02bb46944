//! Index cursors
//!
//! A cursor walks one transaction view of an index lazily: each `next`
//! descends once into the backing map, starting strictly after the
//! previous position. Dropping a cursor releases it.

use std::cmp::Ordering;
use std::sync::Arc;

use super::errors::{IndexError, IndexResult};
use super::key::{IndexKey, KeyLayout};
use crate::mvcc::TransactionMap;
use crate::value::{Row, RowKey, SearchRow, Value};

pub(crate) type RowMap = TransactionMap<RowKey, Vec<Value>>;
pub(crate) type EntryMap = TransactionMap<IndexKey, ()>;

pub trait Cursor: Send {
    /// Moves to the next entry; false once the range is exhausted.
    fn next(&mut self) -> IndexResult<bool>;

    /// Entry at the current position, holding the indexed columns and row key.
    fn search_row(&self) -> Option<&SearchRow>;

    /// Full row at the current position.
    fn get(&mut self) -> IndexResult<Option<&Row>>;
}

fn fetch_row(rows: &RowMap, index: &str, key: RowKey) -> IndexResult<Row> {
    match rows.get(&key)? {
        Some(values) => Ok(Row::new(key, values)),
        None => Err(IndexError::row_not_found(index, key)),
    }
}

/// Walks the row-key ordered scan map.
pub(crate) struct ScanCursor {
    rows: RowMap,
    index: String,
    first: Option<RowKey>,
    last: Option<RowKey>,
    position: Option<RowKey>,
    row: Option<Row>,
    search: Option<SearchRow>,
    done: bool,
}

impl ScanCursor {
    pub(crate) fn new(rows: RowMap, index: String, first: Option<RowKey>, last: Option<RowKey>) -> Self {
        Self {
            rows,
            index,
            first,
            last,
            position: None,
            row: None,
            search: None,
            done: false,
        }
    }
}

impl Cursor for ScanCursor {
    fn next(&mut self) -> IndexResult<bool> {
        if self.done {
            return Ok(false);
        }
        let key = match (self.position, self.first) {
            (Some(pos), _) => self.rows.higher_key(&pos)?,
            (None, Some(first)) => self.rows.ceiling_key(&first)?,
            (None, None) => self.rows.first_key()?,
        };
        let key = match key {
            Some(k) if self.last.map_or(true, |last| k <= last) => k,
            _ => {
                self.done = true;
                self.row = None;
                self.search = None;
                return Ok(false);
            }
        };
        let row = fetch_row(&self.rows, &self.index, key)?;
        self.search = Some(SearchRow::from(&row));
        self.row = Some(row);
        self.position = Some(key);
        Ok(true)
    }

    fn search_row(&self) -> Option<&SearchRow> {
        self.search.as_ref()
    }

    fn get(&mut self) -> IndexResult<Option<&Row>> {
        Ok(self.row.as_ref())
    }
}

/// Walks secondary index entries, fetching rows from the scan map on demand.
pub(crate) struct SecondaryCursor {
    entries: EntryMap,
    rows: RowMap,
    layout: Arc<KeyLayout>,
    index: String,
    first: Option<IndexKey>,
    last: Option<SearchRow>,
    position: Option<IndexKey>,
    search: Option<SearchRow>,
    row: Option<Row>,
    done: bool,
}

impl SecondaryCursor {
    pub(crate) fn new(
        entries: EntryMap,
        rows: RowMap,
        layout: Arc<KeyLayout>,
        index: String,
        first: Option<IndexKey>,
        last: Option<SearchRow>,
    ) -> Self {
        Self {
            entries,
            rows,
            layout,
            index,
            first,
            last,
            position: None,
            search: None,
            row: None,
            done: false,
        }
    }
}

impl Cursor for SecondaryCursor {
    fn next(&mut self) -> IndexResult<bool> {
        if self.done {
            return Ok(false);
        }
        let key = match (&self.position, &self.first) {
            (Some(pos), _) => self.entries.higher_key(pos)?,
            (None, Some(first)) => self.entries.ceiling_key(first)?,
            (None, None) => self.entries.first_key()?,
        };
        self.row = None;
        let Some(key) = key else {
            self.done = true;
            self.search = None;
            return Ok(false);
        };
        let search = self.layout.decode(&key);
        if let Some(last) = &self.last {
            if self.layout.compare_rows(&search, last) == Ordering::Greater {
                self.done = true;
                self.search = None;
                return Ok(false);
            }
        }
        self.search = Some(search);
        self.position = Some(key);
        Ok(true)
    }

    fn search_row(&self) -> Option<&SearchRow> {
        self.search.as_ref()
    }

    fn get(&mut self) -> IndexResult<Option<&Row>> {
        if self.row.is_none() {
            let Some(key) = self.search.as_ref().and_then(SearchRow::key) else {
                return Ok(None);
            };
            self.row = Some(fetch_row(&self.rows, &self.index, key)?);
        }
        Ok(self.row.as_ref())
    }
}

/// A cursor already positioned on the single entry a lookup found.
///
/// `next` reports exhaustion; the entry stays readable.
pub(crate) struct FoundCursor {
    search: Option<SearchRow>,
    row: Option<Row>,
    rows: RowMap,
    index: String,
}

impl FoundCursor {
    pub(crate) fn new(rows: RowMap, index: String, search: Option<SearchRow>) -> Self {
        Self {
            search,
            row: None,
            rows,
            index,
        }
    }
}

impl Cursor for FoundCursor {
    fn next(&mut self) -> IndexResult<bool> {
        Ok(false)
    }

    fn search_row(&self) -> Option<&SearchRow> {
        self.search.as_ref()
    }

    fn get(&mut self) -> IndexResult<Option<&Row>> {
        if self.row.is_none() {
            let Some(key) = self.search.as_ref().and_then(SearchRow::key) else {
                return Ok(None);
            };
            self.row = Some(fetch_row(&self.rows, &self.index, key)?);
        }
        Ok(self.row.as_ref())
    }
}
