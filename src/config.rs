//! Optional `sql-anonymizer.toml` defaults
//!
//! ```toml
//! [query]
//! dialect = "mysql"
//! strict_mode = true
//! explain = false
//!
//! [schema]
//! dbtype = "postgres"
//! host = "localhost"
//! port = 5432
//! database = "shop"
//! user = "reader"
//! pg_schema = "public"
//! ```
//!
//! Values only fill in what the command line leaves unset.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AnonymizerError;

/// Looked up in the current directory when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "sql-anonymizer.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryDefaults {
    pub dialect: Option<String>,
    pub strict_mode: Option<bool>,
    pub explain: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaDefaults {
    pub dbtype: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub pg_schema: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub query: QueryDefaults,
    pub schema: SchemaDefaults,
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, AnonymizerError> {
        toml::from_str(content).map_err(|e| AnonymizerError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load an explicit config file; it must exist.
    pub fn load(path: &Path) -> Result<Self, AnonymizerError> {
        let content = fs::read_to_string(path).map_err(|source| AnonymizerError::InputRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content, path)
    }

    /// Load `explicit` if given, else `sql-anonymizer.toml` from the working
    /// directory when present, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, AnonymizerError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        if default_path.is_file() {
            log::info!("Using configuration from {}", default_path.display());
            Self::load(&default_path)
        } else {
            Ok(Self::default())
        }
    }
}
