//! CREATE TABLE synthesis for anonymized tables

use super::Backend;
use crate::util::quote_ident;

/// A column of an anonymized table. Type and default are carried over from
/// the source unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    /// Render `CREATE TABLE` (without trailing semicolon).
    pub fn create_table_sql(&self, backend: Backend) -> String {
        let quote = |name: &str| quote_ident(name, backend.quote_char());

        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|column| {
                let mut line = format!("    {}", quote(&column.name));
                if !column.data_type.trim().is_empty() {
                    line.push(' ');
                    line.push_str(column.data_type.trim());
                }
                if column.not_null {
                    line.push_str(" NOT NULL");
                }
                if let Some(default) = &column.default {
                    line.push_str(" DEFAULT ");
                    line.push_str(default);
                }
                line
            })
            .collect();

        let primary_key: Vec<String> = self
            .columns
            .iter()
            .filter(|column| column.primary_key)
            .map(|column| quote(&column.name))
            .collect();
        if !primary_key.is_empty() {
            defs.push(format!("    PRIMARY KEY ({})", primary_key.join(", ")));
        }

        format!(
            "CREATE TABLE {} (\n{}\n)",
            quote(&self.name),
            defs.join(",\n")
        )
    }

    /// Positional `INSERT` with one bind parameter per column.
    ///
    /// Columns flagged in `null_columns` get a literal `NULL` instead of a
    /// parameter and take no bind slot.
    pub fn insert_sql(&self, backend: Backend, null_columns: &[bool]) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|column| quote_ident(&column.name, backend.quote_char()))
            .collect();

        let mut bound = 0;
        let values: Vec<String> = (0..self.columns.len())
            .map(|i| {
                if null_columns.get(i).copied().unwrap_or(false) {
                    return "NULL".to_string();
                }
                bound += 1;
                match backend {
                    Backend::Postgres => format!("${}", bound),
                    Backend::Sqlite | Backend::Mysql => "?".to_string(),
                }
            })
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&self.name, backend.quote_char()),
            columns.join(", "),
            values.join(", ")
        )
    }
}

/// `SELECT` of the original columns in the order given.
pub fn select_columns_sql(table: &str, columns: &[&str], backend: Backend) -> String {
    let quote = backend.quote_char();
    let columns: Vec<String> = columns.iter().map(|c| quote_ident(c, quote)).collect();
    format!(
        "SELECT {} FROM {}",
        columns.join(", "),
        quote_ident(table, quote)
    )
}
