//! Error types for sql-anonymizer

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while anonymizing SQL text
#[derive(Error, Debug)]
pub enum AnonymizerError {
    #[error("Parsing failed for dialect {dialect} at line {line}: {message}")]
    ParseFailure {
        dialect: String,
        line: usize,
        message: String,
    },

    #[error("Failed to read SQL input: {path}")]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write anonymized output: {path}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration file {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("Failed to serialize transformation log: {0}")]
    LogSerialization(#[from] serde_json::Error),
}

/// Errors that abort a schema migration.
///
/// These are returned inside a [`crate::schema::MigrationOutcome`] rather than
/// propagated, so callers always get a structured result.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Missing required argument for {backend}: {argument}")]
    MissingArgument {
        backend: &'static str,
        argument: &'static str,
    },

    #[error("Input database not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Failed to connect to {backend} database: {message}")]
    Connection {
        backend: &'static str,
        message: String,
    },

    #[error("Failed to read catalog from {backend} database: {message}")]
    Catalog {
        backend: &'static str,
        message: String,
    },

    #[error("Failed to create anonymized table {table}: {message}")]
    Ddl { table: String, message: String },

    #[error("Failed to copy rows from {table}: {message}")]
    RowCopy { table: String, message: String },

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
