//! Integration tests for schema migration against real SQLite files

use std::fs;

use pretty_assertions::assert_eq;
use sql_anonymizer::{migrate_schema, Backend, MigrationError, MigrationOptions};
use sqlx::{Connection, Row};

use crate::common::{create_sqlite_db, open_sqlite, TestContext};

const SOURCE_SCHEMA: &[&str] = &[
    "CREATE TABLE customers (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT DEFAULT 'none',
        balance REAL,
        avatar BLOB
    )",
    "CREATE TABLE orders (
        order_id INTEGER NOT NULL,
        customer_id INTEGER,
        note TEXT,
        PRIMARY KEY (order_id)
    )",
    "INSERT INTO customers (id, name, email, balance, avatar) VALUES (1, 'Ada', 'ada@example.com', 12.5, x'0102')",
    "INSERT INTO customers (id, name, email, balance, avatar) VALUES (2, 'Bob', NULL, NULL, NULL)",
    "INSERT INTO orders (order_id, customer_id, note) VALUES (10, 1, 'first')",
];

fn sqlite_options(ctx: &TestContext) -> MigrationOptions {
    MigrationOptions {
        backend: Backend::Sqlite,
        input: Some(ctx.path("source.db")),
        output: Some(ctx.path("out/anonymized.db")),
        log_path: Some(ctx.path("mapping.json")),
        ..Default::default()
    }
}

// ============================================================================
// SQLite copy
// ============================================================================

#[tokio::test]
async fn test_sqlite_migration_copies_schema_and_rows() {
    let ctx = TestContext::new();
    create_sqlite_db(&ctx.path("source.db"), SOURCE_SCHEMA).await;
    let options = sqlite_options(&ctx);

    let outcome = migrate_schema(&options).await;
    assert!(outcome.is_success(), "Migration failed: {:?}", outcome.result);
    assert_eq!(outcome.output.as_deref(), Some(ctx.path("out/anonymized.db").as_path()));

    let log = outcome.result.unwrap();
    assert_eq!(log.table_mapping["customers"], "table_1");
    assert_eq!(log.table_mapping["orders"], "table_2");
    let customer_columns: Vec<_> = log.column_mappings_per_table["customers"]
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(
        customer_columns,
        vec![
            ("id", "col_1"),
            ("name", "col_2"),
            ("email", "col_3"),
            ("balance", "col_4"),
            ("avatar", "col_5"),
        ]
    );

    let mut output = open_sqlite(&ctx.path("out/anonymized.db"), "ro").await;
    let rows = sqlx::query("SELECT col_1, col_2, col_3, col_4, col_5 FROM table_1 ORDER BY col_1")
        .fetch_all(&mut output)
        .await
        .expect("anonymized table should be queryable");
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].get::<i64, _>(0), 1);
    assert_eq!(rows[0].get::<String, _>(1), "Ada");
    assert_eq!(rows[0].get::<String, _>(2), "ada@example.com");
    assert_eq!(rows[0].get::<f64, _>(3), 12.5);
    assert_eq!(rows[0].get::<Vec<u8>, _>(4), vec![1u8, 2]);

    assert_eq!(rows[1].get::<String, _>(1), "Bob");
    assert_eq!(rows[1].get::<Option<String>, _>(2), None);
    assert_eq!(rows[1].get::<Option<f64>, _>(3), None);

    let orders = sqlx::query("SELECT col_1, col_2, col_3 FROM table_2")
        .fetch_all(&mut output)
        .await
        .unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].get::<String, _>(2), "first");
    output.close().await.unwrap();
}

#[tokio::test]
async fn test_sqlite_migration_preserves_column_definitions() {
    let ctx = TestContext::new();
    create_sqlite_db(&ctx.path("source.db"), SOURCE_SCHEMA).await;

    let outcome = migrate_schema(&sqlite_options(&ctx)).await;
    assert!(outcome.is_success(), "Migration failed: {:?}", outcome.result);

    let mut output = open_sqlite(&ctx.path("out/anonymized.db"), "ro").await;
    let columns = sqlx::query(
        "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info('table_1') ORDER BY cid",
    )
    .fetch_all(&mut output)
    .await
    .unwrap();

    let described: Vec<(String, String, i64, Option<String>, i64)> = columns
        .iter()
        .map(|row| {
            (
                row.get(0),
                row.get(1),
                row.get(2),
                row.get(3),
                row.get(4),
            )
        })
        .collect();
    assert_eq!(
        described,
        vec![
            ("col_1".to_string(), "INTEGER".to_string(), 0, None, 1),
            ("col_2".to_string(), "TEXT".to_string(), 1, None, 0),
            ("col_3".to_string(), "TEXT".to_string(), 0, Some("'none'".to_string()), 0),
            ("col_4".to_string(), "REAL".to_string(), 0, None, 0),
            ("col_5".to_string(), "BLOB".to_string(), 0, None, 0),
        ]
    );
    output.close().await.unwrap();
}

#[tokio::test]
async fn test_sqlite_migration_writes_mapping_log() {
    let ctx = TestContext::new();
    create_sqlite_db(&ctx.path("source.db"), SOURCE_SCHEMA).await;

    let outcome = migrate_schema(&sqlite_options(&ctx)).await;
    assert!(outcome.is_success());

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(ctx.path("mapping.json")).unwrap()).unwrap();
    assert_eq!(json["table_mapping"]["orders"], "table_2");
    assert_eq!(
        json["column_mappings_per_table"]["orders"]["customer_id"],
        "col_2"
    );
}

#[tokio::test]
async fn test_sqlite_migration_replaces_existing_output() {
    let ctx = TestContext::new();
    create_sqlite_db(&ctx.path("source.db"), SOURCE_SCHEMA).await;
    fs::create_dir_all(ctx.path("out")).unwrap();
    fs::write(ctx.path("out/anonymized.db"), b"stale").unwrap();

    let outcome = migrate_schema(&sqlite_options(&ctx)).await;
    assert!(outcome.is_success(), "Migration failed: {:?}", outcome.result);

    let leftovers: Vec<_> = fs::read_dir(ctx.path("out"))
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains(".partial-"))
        .collect();
    assert!(leftovers.is_empty(), "partial files left: {:?}", leftovers);
}

#[tokio::test]
async fn test_sqlite_migration_keeps_storage_class_of_untyped_columns() {
    let ctx = TestContext::new();
    create_sqlite_db(
        &ctx.path("source.db"),
        &[
            "CREATE TABLE events (payload, kind TEXT)",
            "INSERT INTO events VALUES (1, 'a')",
            "INSERT INTO events VALUES ('text', 'b')",
            "INSERT INTO events VALUES (2.5, NULL)",
            "INSERT INTO events VALUES (x'ff', 'd')",
            "INSERT INTO events VALUES (NULL, 'e')",
        ],
    )
    .await;

    let outcome = migrate_schema(&sqlite_options(&ctx)).await;
    assert!(outcome.is_success(), "Migration failed: {:?}", outcome.result);

    let mut output = open_sqlite(&ctx.path("out/anonymized.db"), "ro").await;
    let rows = sqlx::query("SELECT typeof(col_1), col_2 FROM table_1 ORDER BY rowid")
        .fetch_all(&mut output)
        .await
        .unwrap();
    let copied: Vec<(String, Option<String>)> =
        rows.iter().map(|row| (row.get(0), row.get(1))).collect();
    assert_eq!(
        copied,
        vec![
            ("integer".to_string(), Some("a".to_string())),
            ("text".to_string(), Some("b".to_string())),
            ("real".to_string(), None),
            ("blob".to_string(), Some("d".to_string())),
            ("null".to_string(), Some("e".to_string())),
        ]
    );
    output.close().await.unwrap();
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_missing_input_database() {
    let ctx = TestContext::new();
    let outcome = migrate_schema(&sqlite_options(&ctx)).await;

    assert!(matches!(
        outcome.result,
        Err(MigrationError::InputNotFound { .. })
    ));
    assert!(outcome.output.is_none());
    assert!(!ctx.path("out/anonymized.db").exists());
}

#[tokio::test]
async fn test_corrupt_input_leaves_no_output() {
    let ctx = TestContext::new();
    fs::write(ctx.path("source.db"), "this is not a sqlite database, just some text padding it out")
        .unwrap();

    let outcome = migrate_schema(&sqlite_options(&ctx)).await;

    assert!(!outcome.is_success());
    assert!(!ctx.path("out/anonymized.db").exists());
    assert!(!ctx.path("mapping.json").exists());
}

#[tokio::test]
async fn test_server_backend_requires_credentials() {
    let options = MigrationOptions {
        backend: Backend::Postgres,
        host: Some("localhost".to_string()),
        database: Some("shop".to_string()),
        ..Default::default()
    };

    let outcome = migrate_schema(&options).await;

    assert!(matches!(
        outcome.result,
        Err(MigrationError::MissingArgument {
            backend: "postgres",
            argument: "--user"
        })
    ));
}
