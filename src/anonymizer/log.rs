//! Transformation log
//!
//! A snapshot of every mapping a run produced, built once after rewriting
//! completes. Map order is first-encounter order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::columns::ColumnRegistry;
use super::registry::{Category, PlaceholderRegistry};

pub type Mapping = IndexMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierMappings {
    pub database: Mapping,
    pub schema: Mapping,
    pub table: Mapping,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub global_column_fallback: Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteralMappings {
    pub string: Mapping,
    pub number: Mapping,
    pub email: Mapping,
}

/// Original -> placeholder mappings of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationLog {
    pub identifier_mappings: IdentifierMappings,
    /// Original table path -> {original column -> placeholder}
    pub column_mappings_per_table: IndexMap<String, Mapping>,
    pub literal_mappings: LiteralMappings,
}

impl TransformationLog {
    /// Snapshot the registries of a finished run.
    pub fn build(placeholders: &PlaceholderRegistry, columns: &ColumnRegistry) -> Self {
        let snapshot = |category| placeholders.mappings(category).clone();

        Self {
            identifier_mappings: IdentifierMappings {
                database: snapshot(Category::Database),
                schema: snapshot(Category::Schema),
                table: snapshot(Category::Table),
                global_column_fallback: columns.global().clone(),
            },
            column_mappings_per_table: columns
                .per_table()
                .filter(|(_, mapping)| !mapping.is_empty())
                .map(|(table, mapping)| (table.clone(), mapping.clone()))
                .collect(),
            literal_mappings: LiteralMappings {
                string: snapshot(Category::String),
                number: snapshot(Category::Number),
                email: snapshot(Category::Email),
            },
        }
    }

    /// Placeholder recorded for a table path, if any.
    pub fn table_placeholder(&self, table_path: &str) -> Option<&str> {
        self.identifier_mappings
            .table
            .get(table_path)
            .map(String::as_str)
    }

    /// Column mappings of a table, looked up by original path.
    pub fn columns_of(&self, table_path: &str) -> Option<&Mapping> {
        self.column_mappings_per_table.get(table_path)
    }

    /// Human-facing view keyed by anonymized table names.
    pub fn explain(&self) -> ExplainReport<'_> {
        let columns = self
            .column_mappings_per_table
            .iter()
            .map(|(table, mapping)| {
                let key = self.table_placeholder(table).unwrap_or(table.as_str());
                (key, mapping)
            })
            .collect();

        let global = &self.identifier_mappings.global_column_fallback;

        ExplainReport {
            identifiers: ExplainIdentifiers {
                database: &self.identifier_mappings.database,
                schema: &self.identifier_mappings.schema,
                table: &self.identifier_mappings.table,
            },
            columns,
            literals: &self.literal_mappings,
            global_fallback: (!global.is_empty()).then_some(global),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExplainIdentifiers<'a> {
    pub database: &'a Mapping,
    pub schema: &'a Mapping,
    pub table: &'a Mapping,
}

/// The mapping block printed after the SQL by `query --explain`.
#[derive(Debug, Serialize)]
pub struct ExplainReport<'a> {
    #[serde(rename = "Identifier Mappings")]
    pub identifiers: ExplainIdentifiers<'a>,
    #[serde(rename = "Column Mappings (per anonymized table)")]
    pub columns: IndexMap<&'a str, &'a Mapping>,
    #[serde(rename = "Literal Mappings")]
    pub literals: &'a LiteralMappings,
    #[serde(
        rename = "Global Column Fallback Mapping (for unqualified columns)",
        skip_serializing_if = "Option::is_none"
    )]
    pub global_fallback: Option<&'a Mapping>,
}

/// What a `sanitize` call reports besides the SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RunLog {
    /// Successful run with `explain` enabled
    Mappings(TransformationLog),
    /// Input did not parse; the text was returned unchanged
    Failed { error: String },
    /// Successful run with `explain` disabled
    Empty {},
}

impl RunLog {
    pub fn mappings(&self) -> Option<&TransformationLog> {
        match self {
            RunLog::Mappings(log) => Some(log),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RunLog::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Render for the `--explain` block of the CLI.
    pub fn to_explain_json(&self) -> Result<String, serde_json::Error> {
        match self {
            RunLog::Mappings(log) => serde_json::to_string_pretty(&log.explain()),
            other => serde_json::to_string_pretty(other),
        }
    }
}
