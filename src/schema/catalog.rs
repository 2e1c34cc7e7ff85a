//! Catalog introspection
//!
//! Reads table and column descriptors from a live database. Tables keep the
//! order the catalog reports them in; columns are always sorted by their
//! ordinal position.

use indexmap::IndexMap;
use sqlx::any::AnyRow;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{AnyConnection, ColumnIndex, Decode, Row, Type, ValueRef};

use super::{Backend, MigrationOptions};
use crate::error::MigrationError;
use crate::util::starts_with_ci;

/// One column as described by the source catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Declared type, verbatim
    pub data_type: String,
    pub not_null: bool,
    /// Default expression, verbatim
    pub default: Option<String>,
    pub primary_key: bool,
    /// Position within the table (catalog numbering)
    pub ordinal: i64,
}

/// Original table name -> columns, in catalog order.
pub type Catalog = IndexMap<String, Vec<ColumnDescriptor>>;

const SQLITE_TABLES: &str = "SELECT name FROM sqlite_master WHERE type = 'table'";

const SQLITE_COLUMNS: &str =
    "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?)";

const POSTGRES_COLUMNS: &str = r#"
SELECT
    c.table_name::text,
    c.column_name::text,
    c.data_type::text,
    c.is_nullable::text,
    c.column_default::text,
    c.ordinal_position::bigint,
    EXISTS (
        SELECT 1
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
          ON tc.constraint_name = kcu.constraint_name
         AND tc.table_schema = kcu.table_schema
         AND tc.table_name = kcu.table_name
        WHERE tc.constraint_type = 'PRIMARY KEY'
          AND tc.table_schema = c.table_schema
          AND tc.table_name = c.table_name
          AND kcu.column_name = c.column_name
    ) AS is_primary
FROM information_schema.columns c
WHERE c.table_schema = $1
ORDER BY c.table_name, c.ordinal_position
"#;

const MYSQL_COLUMNS: &str = r#"
SELECT
    CAST(table_name AS CHAR),
    CAST(column_name AS CHAR),
    CAST(column_type AS CHAR),
    CAST(is_nullable AS CHAR),
    CAST(column_default AS CHAR),
    CAST(ordinal_position AS SIGNED),
    CAST(column_key AS CHAR)
FROM information_schema.columns
WHERE table_schema = DATABASE()
ORDER BY table_name, ordinal_position
"#;

/// Read the catalog of a SQLite database.
///
/// Queried on a typed [`SqliteConnection`]: `pragma_table_info` columns carry
/// no declared type, which the Any driver cannot decode.
pub async fn introspect_sqlite(conn: &mut SqliteConnection) -> Result<Catalog, MigrationError> {
    let catalog_error = catalog_error(Backend::Sqlite);

    let tables: Vec<String> = sqlx::query_scalar(SQLITE_TABLES)
        .fetch_all(&mut *conn)
        .await
        .map_err(catalog_error)?;

    let mut rows = Vec::new();
    // sqlite_sequence, sqlite_stat1 and friends belong to the engine
    for table in tables.into_iter().filter(|t| !starts_with_ci(t, "sqlite_")) {
        let columns = sqlx::query(SQLITE_COLUMNS)
            .bind(table.clone())
            .fetch_all(&mut *conn)
            .await
            .map_err(catalog_error)?;
        for row in &columns {
            rows.push((table.clone(), sqlite_column(row).map_err(catalog_error)?));
        }
        if columns.is_empty() {
            log::warn!("Table '{}' reports no columns", table);
        }
    }

    Ok(finish(rows, Backend::Sqlite))
}

/// Read the catalog of a PostgreSQL or MySQL database from
/// `information_schema`.
pub async fn introspect_information_schema(
    conn: &mut AnyConnection,
    options: &MigrationOptions,
) -> Result<Catalog, MigrationError> {
    let backend = options.backend;
    let catalog_error = catalog_error(backend);

    let rows = match backend {
        Backend::Postgres => {
            let columns = sqlx::query(POSTGRES_COLUMNS)
                .bind(options.pg_schema().to_string())
                .fetch_all(&mut *conn)
                .await
                .map_err(catalog_error)?;
            columns
                .iter()
                .map(|row| information_schema_column(row, |row| row.try_get::<bool, _>(6)))
                .collect::<Result<Vec<_>, _>>()
                .map_err(catalog_error)?
        }
        Backend::Mysql => {
            let columns = sqlx::query(MYSQL_COLUMNS)
                .fetch_all(&mut *conn)
                .await
                .map_err(catalog_error)?;
            columns
                .iter()
                .map(|row| {
                    information_schema_column(row, |row| {
                        Ok(nullable::<_, String>(row, 6)?.as_deref() == Some("PRI"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(catalog_error)?
        }
        Backend::Sqlite => {
            return Err(MigrationError::Catalog {
                backend: backend.name(),
                message: "SQLite has no information_schema".to_string(),
            })
        }
    };

    Ok(finish(rows, backend))
}

fn catalog_error(backend: Backend) -> impl Fn(sqlx::Error) -> MigrationError + Copy {
    move |e| MigrationError::Catalog {
        backend: backend.name(),
        message: e.to_string(),
    }
}

fn finish(rows: Vec<(String, ColumnDescriptor)>, backend: Backend) -> Catalog {
    let catalog = group_by_table(rows);
    log::info!(
        "Read {} table(s) from {} catalog",
        catalog.len(),
        backend.name()
    );
    catalog
}

/// Decode an optional value, checking for NULL before the type.
fn nullable<'r, R, T>(row: &'r R, index: usize) -> Result<Option<T>, sqlx::Error>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    if row.try_get_raw(index)?.is_null() {
        return Ok(None);
    }
    row.try_get(index).map(Some)
}

/// One `pragma_table_info` row: cid, name, type, notnull, dflt_value, pk.
fn sqlite_column(row: &SqliteRow) -> Result<ColumnDescriptor, sqlx::Error> {
    Ok(ColumnDescriptor {
        ordinal: row.try_get(0)?,
        name: row.try_get(1)?,
        data_type: nullable::<_, String>(row, 2)?.unwrap_or_default(),
        not_null: row.try_get::<i64, _>(3)? != 0,
        default: nullable(row, 4)?,
        primary_key: row.try_get::<i64, _>(5)? != 0,
    })
}

/// Row shape shared by the PostgreSQL and MySQL catalog queries.
fn information_schema_column(
    row: &AnyRow,
    primary_key: impl Fn(&AnyRow) -> Result<bool, sqlx::Error>,
) -> Result<(String, ColumnDescriptor), sqlx::Error> {
    let table: String = row.try_get(0)?;
    let is_nullable: String = row.try_get(3)?;
    Ok((
        table,
        ColumnDescriptor {
            name: row.try_get(1)?,
            data_type: row.try_get(2)?,
            not_null: is_nullable.eq_ignore_ascii_case("NO"),
            default: nullable(row, 4)?,
            primary_key: primary_key(row)?,
            ordinal: row.try_get(5)?,
        },
    ))
}

/// Group `(table, column)` rows by table in first-seen order and sort each
/// table's columns by ordinal.
pub fn group_by_table(rows: impl IntoIterator<Item = (String, ColumnDescriptor)>) -> Catalog {
    let mut catalog = Catalog::new();
    for (table, column) in rows {
        catalog.entry(table).or_default().push(column);
    }
    for columns in catalog.values_mut() {
        columns.sort_by_key(|column| column.ordinal);
    }
    catalog
}
