//! Placeholder registry
//!
//! Maps original values to category-tagged placeholders (`table_3`,
//! `email_2`, ...). Each category owns an independent 1-based counter, so a
//! placeholder is unique within its category and can never collide with one
//! from another category.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Kind of sensitive value being replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Database,
    Schema,
    Table,
    Column,
    String,
    Number,
    Email,
}

impl Category {
    const COUNT: usize = 7;

    /// Prefix used when building placeholders for this category.
    pub fn tag(self) -> &'static str {
        match self {
            Category::Database => "database",
            Category::Schema => "schema",
            Category::Table => "table",
            Category::Column => "col",
            Category::String => "string",
            Category::Number => "number",
            Category::Email => "email",
        }
    }

    /// Identifiers are names and compare case-insensitively; literal values
    /// are data and compare exactly. Emails are the exception: they are
    /// case-insensitive addresses.
    fn normalize(self, original: &str) -> String {
        match self {
            Category::String | Category::Number => original.to_string(),
            Category::Database
            | Category::Schema
            | Category::Table
            | Category::Column
            | Category::Email => original.to_lowercase(),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Build the placeholder string for the `n`th distinct value of a category.
pub fn format_placeholder(tag: &str, n: usize) -> String {
    format!("{}_{}", tag, n)
}

/// Ordered original -> placeholder map with its own counter.
#[derive(Debug, Clone, Default)]
pub(crate) struct CounterMap {
    counter: usize,
    entries: IndexMap<String, String>,
}

impl CounterMap {
    /// Return the placeholder for `key`, allocating `{tag}_{n+1}` on first sight.
    pub(crate) fn get_or_allocate(&mut self, tag: &str, key: String) -> String {
        if let Some(existing) = self.entries.get(&key) {
            return existing.clone();
        }
        self.counter += 1;
        let placeholder = format_placeholder(tag, self.counter);
        self.entries.insert(key, placeholder.clone());
        placeholder
    }

    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn entries(&self) -> &IndexMap<String, String> {
        &self.entries
    }
}

/// Per-category placeholder maps for one anonymization run.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderRegistry {
    maps: [CounterMap; Category::COUNT],
}

impl PlaceholderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the placeholder for `original` in `category`.
    ///
    /// Repeated calls with the same normalized value return the same result;
    /// the first call for a new value takes the next counter value.
    pub fn placeholder_for(&mut self, category: Category, original: &str) -> String {
        let key = category.normalize(original);
        self.maps[category.index()].get_or_allocate(category.tag(), key)
    }

    /// Look up an existing placeholder without allocating.
    pub fn lookup(&self, category: Category, original: &str) -> Option<&str> {
        self.maps[category.index()].get(&category.normalize(original))
    }

    /// Original (normalized) -> placeholder entries in first-encounter order.
    pub fn mappings(&self, category: Category) -> &IndexMap<String, String> {
        self.maps[category.index()].entries()
    }

    /// Drop all mappings and reset every counter.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
