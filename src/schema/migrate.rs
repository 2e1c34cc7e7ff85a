//! Schema migration driver

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{AnyConnection, Connection, Row, TypeInfo, ValueRef};

use super::catalog::{self, Catalog, ColumnDescriptor};
use super::ddl::{select_columns_sql, ColumnDefinition, TableDefinition};
use super::{
    sqlite_url, Backend, MigrationLog, MigrationOptions, MigrationOutcome, SCHEMA_SCRIPT_FILE,
};
use crate::anonymizer::columns::{ColumnOwner, ColumnRegistry};
use crate::anonymizer::registry::{Category, PlaceholderRegistry};
use crate::error::MigrationError;
use crate::util::ident_key;

/// A source table paired with its anonymized definition.
struct PlannedTable<'a> {
    original: &'a str,
    source_columns: &'a [ColumnDescriptor],
    definition: TableDefinition,
}

/// A value read from the source database during row copy.
#[derive(Debug, Clone, PartialEq)]
enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Anonymize a database schema (and, for SQLite, its data).
///
/// Never panics or propagates: failures are reported in
/// [`MigrationOutcome::result`], after any partial SQLite output has been
/// removed.
pub async fn migrate_schema(options: &MigrationOptions) -> MigrationOutcome {
    match run(options).await {
        Ok((log, output)) => {
            if let Some(log_path) = &options.log_path {
                match log.write_json(log_path) {
                    Ok(()) => log::info!("Transformation mapping saved to {}", log_path.display()),
                    Err(e) => log::error!("Error saving mapping log: {}", e),
                }
            }
            MigrationOutcome {
                result: Ok(log),
                output: Some(output),
            }
        }
        Err(e) => {
            log::error!("Schema migration failed: {}", e);
            MigrationOutcome {
                result: Err(e),
                output: None,
            }
        }
    }
}

async fn run(options: &MigrationOptions) -> Result<(MigrationLog, PathBuf), MigrationError> {
    options.validate()?;
    let url = options.input_url()?;

    match options.backend {
        Backend::Sqlite => {
            let mut input: SqliteConnection = connect(Backend::Sqlite, &url).await?;
            log::info!("Connected to sqlite input database");
            let result = migrate_sqlite(&mut input, options).await;
            close(input, "input").await;
            result
        }
        Backend::Postgres | Backend::Mysql => {
            sqlx::any::install_default_drivers();
            let mut input: AnyConnection = connect(options.backend, &url).await?;
            log::info!("Connected to {} input database", options.backend);
            let result = migrate_server(&mut input, options).await;
            close(input, "input").await;
            result
        }
    }
}

async fn migrate_sqlite(
    input: &mut SqliteConnection,
    options: &MigrationOptions,
) -> Result<(MigrationLog, PathBuf), MigrationError> {
    let output = options
        .output
        .clone()
        .ok_or(MigrationError::MissingArgument {
            backend: "sqlite",
            argument: "--output",
        })?;
    let catalog = catalog::introspect_sqlite(input).await?;

    let mut placeholders = PlaceholderRegistry::new();
    let mut columns = ColumnRegistry::new();
    let (plan, log) = plan_tables(&catalog, &mut placeholders, &mut columns);

    copy_sqlite(input, &plan, &output).await?;
    Ok((log, output))
}

async fn migrate_server(
    input: &mut AnyConnection,
    options: &MigrationOptions,
) -> Result<(MigrationLog, PathBuf), MigrationError> {
    let catalog = catalog::introspect_information_schema(input, options).await?;

    let mut placeholders = PlaceholderRegistry::new();
    let mut columns = ColumnRegistry::new();
    let (plan, log) = plan_tables(&catalog, &mut placeholders, &mut columns);

    let dir = options.output.clone().unwrap_or_else(|| PathBuf::from("."));
    let path = write_script(&plan, options.backend, &dir)?;
    Ok((log, path))
}

/// Assign placeholders in catalog order and build the anonymized definitions.
fn plan_tables<'a>(
    catalog: &'a Catalog,
    placeholders: &mut PlaceholderRegistry,
    columns: &mut ColumnRegistry,
) -> (Vec<PlannedTable<'a>>, MigrationLog) {
    let mut log = MigrationLog::default();
    let mut plan = Vec::with_capacity(catalog.len());

    for (first, other) in case_collisions(catalog.keys().map(String::as_str)) {
        log::warn!(
            "Tables '{}' and '{}' differ only in case and share one placeholder",
            first,
            other
        );
    }

    for (table, source_columns) in catalog {
        for (first, other) in case_collisions(source_columns.iter().map(|c| c.name.as_str())) {
            log::warn!(
                "Columns '{}' and '{}' of table '{}' differ only in case and share one placeholder",
                first,
                other,
                table
            );
        }
        let table_name = placeholders.placeholder_for(Category::Table, table);
        let owner = ColumnOwner::Table(ident_key(table));
        log::info!("Processing table: '{}' -> '{}'", table, table_name);

        let mut column_mapping = indexmap::IndexMap::new();
        let definitions = source_columns
            .iter()
            .map(|column| {
                let name = columns.placeholder_for(&owner, &column.name);
                column_mapping.insert(column.name.clone(), name.clone());
                ColumnDefinition {
                    name,
                    data_type: column.data_type.clone(),
                    not_null: column.not_null,
                    default: column.default.clone(),
                    primary_key: column.primary_key,
                }
            })
            .collect();

        log.table_mapping.insert(table.clone(), table_name.clone());
        log.column_mappings_per_table
            .insert(table.clone(), column_mapping);
        plan.push(PlannedTable {
            original: table,
            source_columns,
            definition: TableDefinition {
                name: table_name,
                columns: definitions,
            },
        });
    }

    (plan, log)
}

/// Pairs of names that are distinct but equal once lowercased. The first
/// name of each pair is the one seen earlier.
fn case_collisions<'a>(names: impl Iterator<Item = &'a str>) -> Vec<(&'a str, &'a str)> {
    let mut seen: HashMap<String, &'a str> = HashMap::new();
    let mut collisions = Vec::new();
    for name in names {
        match seen.get(&ident_key(name)) {
            Some(first) if *first != name => collisions.push((*first, name)),
            Some(_) => {}
            None => {
                seen.insert(ident_key(name), name);
            }
        }
    }
    collisions
}

async fn connect<C: Connection>(backend: Backend, url: &str) -> Result<C, MigrationError> {
    C::connect(url)
        .await
        .map_err(|e| MigrationError::Connection {
            backend: backend.name(),
            message: e.to_string(),
        })
}

async fn close<C: Connection>(conn: C, role: &str) {
    if let Err(e) = conn.close().await {
        log::warn!("Failed to close {} connection: {}", role, e);
    }
}

fn io_error(path: &Path) -> impl Fn(std::io::Error) -> MigrationError + '_ {
    move |source| MigrationError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Sibling path the SQLite output is built at before being moved into place.
fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(format!(".partial-{}", uuid::Uuid::new_v4()));
    PathBuf::from(name)
}

/// Build the anonymized SQLite database at `output`, replacing any existing
/// file only once the new one is complete. On failure the previous `output`
/// is untouched and the partial file is removed.
async fn copy_sqlite(
    input: &mut SqliteConnection,
    plan: &[PlannedTable<'_>],
    output: &Path,
) -> Result<(), MigrationError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let partial = partial_path(output);
    let result = match build_sqlite(input, plan, &partial).await {
        Ok(()) => fs::rename(&partial, output).map_err(io_error(output)),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            log::info!("Wrote anonymized database to {}", output.display());
            Ok(())
        }
        Err(e) => {
            if partial.exists() {
                if let Err(cleanup) = fs::remove_file(&partial) {
                    log::warn!(
                        "Failed to remove partial output {}: {}",
                        partial.display(),
                        cleanup
                    );
                }
            }
            Err(e)
        }
    }
}

async fn build_sqlite(
    input: &mut SqliteConnection,
    plan: &[PlannedTable<'_>],
    path: &Path,
) -> Result<(), MigrationError> {
    let mut output: SqliteConnection = connect(Backend::Sqlite, &sqlite_url(path, "rwc")).await?;
    let result = fill_sqlite(input, &mut output, plan).await;
    close(output, "output").await;
    result
}

async fn fill_sqlite(
    input: &mut SqliteConnection,
    output: &mut SqliteConnection,
    plan: &[PlannedTable<'_>],
) -> Result<(), MigrationError> {
    let mut tx = output.begin().await.map_err(|e| MigrationError::Connection {
        backend: "sqlite",
        message: e.to_string(),
    })?;

    for table in plan {
        let ddl_error = |e: sqlx::Error| MigrationError::Ddl {
            table: table.definition.name.clone(),
            message: e.to_string(),
        };
        let copy_error = |e: sqlx::Error| MigrationError::RowCopy {
            table: table.original.to_string(),
            message: e.to_string(),
        };

        sqlx::query(&table.definition.create_table_sql(Backend::Sqlite))
            .execute(&mut *tx)
            .await
            .map_err(ddl_error)?;

        if table.source_columns.is_empty() {
            log::warn!(
                "No columns found for table '{}'. Skipping data copy.",
                table.original
            );
            continue;
        }

        let source_names: Vec<&str> = table
            .source_columns
            .iter()
            .map(|column| column.name.as_str())
            .collect();
        let rows = sqlx::query(&select_columns_sql(
            table.original,
            &source_names,
            Backend::Sqlite,
        ))
        .fetch_all(&mut *input)
        .await
        .map_err(copy_error)?;

        for row in &rows {
            let cells = (0..source_names.len())
                .map(|index| read_cell(row, index))
                .collect::<Result<Vec<_>, _>>()
                .map_err(copy_error)?;
            let nulls: Vec<bool> = cells.iter().map(|c| *c == CellValue::Null).collect();

            let insert = table.definition.insert_sql(Backend::Sqlite, &nulls);
            let mut query = sqlx::query(&insert);
            for cell in cells {
                query = match cell {
                    CellValue::Null => query,
                    CellValue::Integer(v) => query.bind(v),
                    CellValue::Real(v) => query.bind(v),
                    CellValue::Text(v) => query.bind(v),
                    CellValue::Blob(v) => query.bind(v),
                };
            }
            query.execute(&mut *tx).await.map_err(copy_error)?;
        }

        log::info!(
            "Copied {} rows from '{}' to '{}'",
            rows.len(),
            table.original,
            table.definition.name
        );
    }

    tx.commit().await.map_err(|e| MigrationError::Connection {
        backend: "sqlite",
        message: e.to_string(),
    })
}

/// Decode one value by the storage class SQLite reports for it.
fn read_cell(row: &SqliteRow, index: usize) -> Result<CellValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(CellValue::Null);
    }
    let storage = raw.type_info().name().to_string();
    match storage.as_str() {
        "INTEGER" => row.try_get_unchecked(index).map(CellValue::Integer),
        "REAL" => row.try_get_unchecked(index).map(CellValue::Real),
        "BLOB" => row.try_get_unchecked(index).map(CellValue::Blob),
        _ => row.try_get_unchecked(index).map(CellValue::Text),
    }
}

/// Write the DDL script for backends without in-process row copy.
fn write_script(
    plan: &[PlannedTable<'_>],
    backend: Backend,
    dir: &Path,
) -> Result<PathBuf, MigrationError> {
    fs::create_dir_all(dir).map_err(io_error(dir))?;

    let mut script = format!(
        "-- Anonymized {} schema generated {}\n\n",
        backend,
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    for table in plan {
        for statement in [
            table.definition.create_table_sql(backend),
            format!(
                "-- INSERT statements for {} (data copy not yet implemented)",
                table.definition.name
            ),
        ] {
            script.push_str(statement.trim());
            script.push_str(";\n\n");
        }
        log::info!(
            "Data copy not yet implemented for {}; wrote DDL for '{}'",
            backend,
            table.definition.name
        );
    }

    let path = dir.join(SCHEMA_SCRIPT_FILE);
    fs::write(&path, script).map_err(io_error(&path))?;
    log::info!("Generated SQL schema script: {}", path.display());
    Ok(path)
}
