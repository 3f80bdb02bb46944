//! Table columns

use std::sync::atomic::{AtomicU32, Ordering};

use crate::value::DataType;

/// Selectivity assumed for a column that was never analyzed.
pub const SELECTIVITY_DEFAULT: u32 = 50;

#[derive(Debug)]
pub struct Column {
    name: String,
    data_type: DataType,
    nullable: bool,
    column_id: usize,
    /// Percentage of distinct values, 1..=100
    selectivity: AtomicU32,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            column_id: 0,
            selectivity: AtomicU32::new(SELECTIVITY_DEFAULT),
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub(crate) fn with_id(mut self, column_id: usize) -> Self {
        self.column_id = column_id;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Ordinal position within the owning table.
    pub fn column_id(&self) -> usize {
        self.column_id
    }

    pub fn selectivity(&self) -> u32 {
        self.selectivity.load(Ordering::Relaxed)
    }

    /// Clamped to 1..=100.
    pub fn set_selectivity(&self, selectivity: u32) {
        self.selectivity
            .store(selectivity.clamp(1, 100), Ordering::Relaxed);
    }
}
