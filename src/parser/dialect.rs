//! Dialect catalog
//!
//! Maps the dialect names accepted on the command line and in configuration
//! files to sqlparser-rs dialects. The same dialect is used to parse the input
//! and to print the anonymized output.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlparser::dialect::{
    AnsiDialect, BigQueryDialect, ClickHouseDialect, DatabricksDialect, Dialect, DuckDbDialect,
    GenericDialect, HiveDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect,
    RedshiftSqlDialect, SQLiteDialect, SnowflakeDialect,
};

/// A named SQL grammar understood by the parse/print provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    Postgres,
    MySql,
    Sqlite,
    BigQuery,
    Snowflake,
    Redshift,
    Tsql,
    Hive,
    Databricks,
    DuckDb,
    ClickHouse,
    Ansi,
    Generic,
}

impl SqlDialect {
    /// Every supported dialect, in the order they are listed to users.
    pub const ALL: [SqlDialect; 13] = [
        SqlDialect::Postgres,
        SqlDialect::MySql,
        SqlDialect::Sqlite,
        SqlDialect::BigQuery,
        SqlDialect::Snowflake,
        SqlDialect::Redshift,
        SqlDialect::Tsql,
        SqlDialect::Hive,
        SqlDialect::Databricks,
        SqlDialect::DuckDb,
        SqlDialect::ClickHouse,
        SqlDialect::Ansi,
        SqlDialect::Generic,
    ];

    /// Canonical lowercase name, as used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            SqlDialect::Postgres => "postgres",
            SqlDialect::MySql => "mysql",
            SqlDialect::Sqlite => "sqlite",
            SqlDialect::BigQuery => "bigquery",
            SqlDialect::Snowflake => "snowflake",
            SqlDialect::Redshift => "redshift",
            SqlDialect::Tsql => "tsql",
            SqlDialect::Hive => "hive",
            SqlDialect::Databricks => "databricks",
            SqlDialect::DuckDb => "duckdb",
            SqlDialect::ClickHouse => "clickhouse",
            SqlDialect::Ansi => "ansi",
            SqlDialect::Generic => "generic",
        }
    }

    /// Look up a dialect by name or common alias (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let dialect = match name.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => SqlDialect::Postgres,
            "mysql" | "mariadb" => SqlDialect::MySql,
            "sqlite" | "sqlite3" => SqlDialect::Sqlite,
            "bigquery" => SqlDialect::BigQuery,
            "snowflake" => SqlDialect::Snowflake,
            "redshift" => SqlDialect::Redshift,
            "tsql" | "mssql" | "sqlserver" => SqlDialect::Tsql,
            "hive" => SqlDialect::Hive,
            "spark" | "databricks" => SqlDialect::Databricks,
            "duckdb" => SqlDialect::DuckDb,
            "clickhouse" => SqlDialect::ClickHouse,
            "ansi" => SqlDialect::Ansi,
            "generic" => SqlDialect::Generic,
            _ => return None,
        };
        Some(dialect)
    }

    /// Like [`SqlDialect::from_name`], falling back to postgres for unknown names.
    pub fn resolve(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            log::warn!(
                "Unknown dialect '{}', falling back to {}",
                name,
                SqlDialect::default()
            );
            SqlDialect::default()
        })
    }

    /// The sqlparser dialect used for both parsing and printing.
    pub fn parser_dialect(self) -> Box<dyn Dialect> {
        match self {
            SqlDialect::Postgres => Box::new(PostgreSqlDialect {}),
            SqlDialect::MySql => Box::new(MySqlDialect {}),
            SqlDialect::Sqlite => Box::new(SQLiteDialect {}),
            SqlDialect::BigQuery => Box::new(BigQueryDialect {}),
            SqlDialect::Snowflake => Box::new(SnowflakeDialect {}),
            SqlDialect::Redshift => Box::new(RedshiftSqlDialect {}),
            SqlDialect::Tsql => Box::new(MsSqlDialect {}),
            SqlDialect::Hive => Box::new(HiveDialect {}),
            SqlDialect::Databricks => Box::new(DatabricksDialect {}),
            SqlDialect::DuckDb => Box::new(DuckDbDialect {}),
            SqlDialect::ClickHouse => Box::new(ClickHouseDialect {}),
            SqlDialect::Ansi => Box::new(AnsiDialect {}),
            SqlDialect::Generic => Box::new(GenericDialect {}),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
