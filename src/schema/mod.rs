//! Whole-database schema anonymization
//!
//! Reads a live database catalog, assigns table and column placeholders in
//! catalog order and recreates the schema under anonymized names. SQLite
//! databases are copied row by row into a new file; PostgreSQL and MySQL
//! produce a DDL script.

pub mod catalog;
pub mod ddl;
mod migrate;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::MigrationError;

pub use migrate::migrate_schema;

/// File written into the output directory for script-only backends.
pub const SCHEMA_SCRIPT_FILE: &str = "anonymized_schema.sql";

/// Supported source databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Postgres,
    Mysql,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Sqlite => "sqlite",
            Backend::Postgres => "postgres",
            Backend::Mysql => "mysql",
        }
    }

    /// Identifier quote character used in generated DDL.
    pub fn quote_char(self) -> char {
        match self {
            Backend::Mysql => '`',
            Backend::Sqlite | Backend::Postgres => '"',
        }
    }

    /// Whether rows can be copied into a new database in-process.
    pub fn supports_row_copy(self) -> bool {
        matches!(self, Backend::Sqlite)
    }

    fn default_port(self) -> Option<u16> {
        match self {
            Backend::Sqlite => None,
            Backend::Postgres => Some(5432),
            Backend::Mysql => Some(3306),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Backend::Sqlite),
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            "mysql" | "mariadb" => Ok(Backend::Mysql),
            other => Err(format!(
                "unsupported database type '{}' (expected sqlite, postgres or mysql)",
                other
            )),
        }
    }
}

/// Options for one schema migration
#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    pub backend: Backend,
    /// SQLite input database file
    pub input: Option<PathBuf>,
    /// SQLite output file, or output directory for the DDL script
    pub output: Option<PathBuf>,
    /// Where to write the mapping log as JSON
    pub log_path: Option<PathBuf>,
    pub host: Option<String>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
    /// PostgreSQL schema to introspect (default `public`)
    pub pg_schema: Option<String>,
}

impl MigrationOptions {
    /// Check that the arguments the backend needs are present.
    pub fn validate(&self) -> Result<(), MigrationError> {
        let backend = self.backend.name();
        let missing = |argument| MigrationError::MissingArgument { backend, argument };

        match self.backend {
            Backend::Sqlite => {
                let input = self.input.as_ref().ok_or_else(|| missing("--input"))?;
                if self.output.is_none() {
                    return Err(missing("--output"));
                }
                if !input.exists() {
                    return Err(MigrationError::InputNotFound {
                        path: input.clone(),
                    });
                }
            }
            Backend::Postgres | Backend::Mysql => {
                if self.host.is_none() {
                    return Err(missing("--host"));
                }
                if self.database.is_none() {
                    return Err(missing("--database"));
                }
                if self.user.is_none() {
                    return Err(missing("--user"));
                }
                if self.password.is_none() {
                    return Err(missing("--password"));
                }
            }
        }
        Ok(())
    }

    pub fn pg_schema(&self) -> &str {
        self.pg_schema.as_deref().unwrap_or("public")
    }

    /// Connection URL for the input database.
    pub fn input_url(&self) -> Result<String, MigrationError> {
        let backend = self.backend.name();
        match self.backend {
            Backend::Sqlite => {
                let input = self.input.as_ref().ok_or(MigrationError::MissingArgument {
                    backend,
                    argument: "--input",
                })?;
                Ok(sqlite_url(input, "ro"))
            }
            Backend::Postgres | Backend::Mysql => {
                let invalid = |what: &str| MigrationError::Connection {
                    backend,
                    message: format!("invalid {}", what),
                };

                let mut url = url::Url::parse(&format!("{}://localhost", backend))
                    .map_err(|e| invalid(&e.to_string()))?;
                if let Some(host) = &self.host {
                    url.set_host(Some(host)).map_err(|_| invalid("host"))?;
                }
                let port = self.port.or(self.backend.default_port());
                url.set_port(port).map_err(|_| invalid("port"))?;
                if let Some(user) = &self.user {
                    url.set_username(user).map_err(|_| invalid("user"))?;
                }
                url.set_password(self.password.as_deref())
                    .map_err(|_| invalid("password"))?;
                if let Some(database) = &self.database {
                    url.set_path(database);
                }
                Ok(url.to_string())
            }
        }
    }
}

pub(crate) fn sqlite_url(path: &Path, mode: &str) -> String {
    format!("sqlite://{}?mode={}", path.display(), mode)
}

/// Table and column mappings of a migration, keyed by original names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationLog {
    pub table_mapping: IndexMap<String, String>,
    pub column_mappings_per_table: IndexMap<String, IndexMap<String, String>>,
}

impl MigrationLog {
    /// Write the log as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<(), MigrationError> {
        let io_error = |source| MigrationError::Io {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        fs::write(path, json).map_err(io_error)
    }

    /// Human-readable summary printed by the CLI.
    pub fn summary(&self) -> String {
        let mut out = String::from("Table Mapping:\n");
        for (original, anonymized) in &self.table_mapping {
            out.push_str(&format!("  {} -> {}\n", original, anonymized));
        }
        out.push_str("\nColumn Mappings (per table):\n");
        for (table, columns) in &self.column_mappings_per_table {
            let anonymized = self.table_mapping.get(table).unwrap_or(table);
            out.push_str(&format!(" Table '{}':\n", anonymized));
            for (original, placeholder) in columns {
                out.push_str(&format!("    {} -> {}\n", original, placeholder));
            }
        }
        out
    }
}

/// Result of [`migrate_schema`]; errors are carried rather than propagated.
#[derive(Debug)]
pub struct MigrationOutcome {
    pub result: Result<MigrationLog, MigrationError>,
    /// The SQLite database or DDL script that was written, on success
    pub output: Option<PathBuf>,
}

impl MigrationOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}
