//! Column placeholder registry
//!
//! Columns are numbered per table: every table starts its own `col_n`
//! sequence, so `orders.id` and `customers.id` can both become `col_1`.
//! Columns that cannot be attributed to exactly one table share a single
//! global map with `global_col_n` placeholders.

use indexmap::IndexMap;

use super::registry::{Category, CounterMap};
use crate::util::ident_key;

/// Prefix for columns routed to the global fallback map.
pub const GLOBAL_COLUMN_TAG: &str = "global_col";

/// Where a column reference was attributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnOwner {
    /// The normalized path of the owning table
    Table(String),
    /// Unresolved or ambiguous reference
    Global,
}

#[derive(Debug, Clone, Default)]
pub struct ColumnRegistry {
    /// Keyed by normalized table path, in first-encounter order
    tables: IndexMap<String, CounterMap>,
    global: CounterMap,
}

impl ColumnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the placeholder for `column` under `owner`.
    pub fn placeholder_for(&mut self, owner: &ColumnOwner, column: &str) -> String {
        let key = ident_key(column);
        match owner {
            ColumnOwner::Table(path) => self
                .tables
                .entry(path.clone())
                .or_default()
                .get_or_allocate(Category::Column.tag(), key),
            ColumnOwner::Global => self.global.get_or_allocate(GLOBAL_COLUMN_TAG, key),
        }
    }

    /// Whether `table` already maps `column` (case-insensitive).
    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .is_some_and(|columns| columns.contains(&ident_key(column)))
    }

    /// Column mappings for every table that has at least one column.
    pub fn per_table(&self) -> impl Iterator<Item = (&String, &IndexMap<String, String>)> {
        self.tables.iter().map(|(table, map)| (table, map.entries()))
    }

    /// The global fallback mappings.
    pub fn global(&self) -> &IndexMap<String, String> {
        self.global.entries()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
