//! Unit tests for query anonymization
//!
//! These exercise the public `Anonymizer` API end to end: parse, scope
//! resolution, rewrite and print.

use pretty_assertions::assert_eq;
use sql_anonymizer::{Anonymizer, DiagnosticKind, SanitizeOutcome, SqlDialect};

fn anonymize(sql: &str) -> String {
    anonymize_with(sql, SqlDialect::Postgres).sql
}

fn anonymize_with(sql: &str, dialect: SqlDialect) -> SanitizeOutcome {
    let outcome = Anonymizer::new(false).sanitize(sql, dialect, true);
    assert!(
        !outcome.is_failure(),
        "Failed to parse: {:?}",
        outcome.log.error()
    );
    outcome
}

// ============================================================================
// Tables, schemas and databases
// ============================================================================

#[test]
fn test_schema_qualified_table() {
    assert_eq!(
        anonymize("SELECT o.total FROM sales.orders o"),
        "SELECT o.col_1 FROM schema_1.table_1 AS o"
    );
}

#[test]
fn test_three_part_table_name() {
    assert_eq!(
        anonymize("SELECT * FROM finance_db.dbo.accounts"),
        "SELECT * FROM database_1.schema_1.table_1"
    );
}

#[test]
fn test_table_name_as_qualifier_is_renamed() {
    assert_eq!(
        anonymize("SELECT users.name FROM users"),
        "SELECT table_1.col_1 FROM table_1"
    );
}

#[test]
fn test_different_qualification_depth_is_not_unified() {
    let outcome = anonymize_with(
        "SELECT a.id FROM customers a JOIN finance_db.customers b ON a.id = b.id",
        SqlDialect::Postgres,
    );
    let log = outcome.log.mappings().unwrap();
    assert_eq!(log.table_placeholder("customers"), Some("table_1"));
    assert_eq!(log.table_placeholder("finance_db.customers"), Some("table_2"));
}

#[test]
fn test_table_names_are_case_insensitive() {
    assert_eq!(
        anonymize("SELECT * FROM Orders JOIN ORDERS_ARCHIVE ON true WHERE orders.id = 1"),
        "SELECT * FROM table_1 JOIN table_2 ON true WHERE table_1.col_1 = number_1"
    );
}

#[test]
fn test_drop_table() {
    assert_eq!(anonymize("DROP TABLE sales.orders"), "DROP TABLE schema_1.table_1");
}

#[test]
fn test_create_schema() {
    assert_eq!(anonymize("CREATE SCHEMA sales"), "CREATE SCHEMA schema_1");
}

// ============================================================================
// Column resolution
// ============================================================================

#[test]
fn test_join_with_aliases() {
    assert_eq!(
        anonymize(
            "SELECT c.name, o.total FROM customers c JOIN orders o ON o.customer_id = c.id WHERE o.total > 100"
        ),
        "SELECT c.col_1, o.col_1 FROM table_1 AS c JOIN table_2 AS o ON o.col_2 = c.col_2 WHERE o.col_1 > number_1"
    );
}

#[test]
fn test_unqualified_column_attributed_by_qualified_use() {
    // `total` is only ever qualified by orders, so the bare reference follows it
    let outcome = anonymize_with(
        "SELECT total FROM customers c JOIN orders o ON o.customer_id = c.id WHERE o.total > 0",
        SqlDialect::Postgres,
    );
    assert!(outcome.diagnostics.is_empty());
    assert!(outcome.sql.starts_with("SELECT col_1 FROM"));
    let log = outcome.log.mappings().unwrap();
    assert_eq!(log.columns_of("orders").unwrap()["total"], "col_1");
}

#[test]
fn test_unresolvable_column_goes_global() {
    let outcome = anonymize_with("SELECT status FROM a, b", SqlDialect::Postgres);
    assert_eq!(outcome.sql, "SELECT global_col_1 FROM table_1, table_2");
    assert_eq!(
        outcome.diagnostics[0].kind,
        DiagnosticKind::UnresolvedReference
    );
    assert!(outcome.diagnostics[0].message.contains("'status'"));
}

#[test]
fn test_projection_alias_is_not_a_column() {
    assert_eq!(
        anonymize("SELECT count(*) AS n FROM orders ORDER BY n"),
        "SELECT count(*) AS n FROM table_1 ORDER BY n"
    );
}

#[test]
fn test_column_alias_preserved() {
    assert_eq!(
        anonymize("SELECT name AS customer_name FROM customers"),
        "SELECT col_1 AS customer_name FROM table_1"
    );
}

#[test]
fn test_tsql_variables_pass_through() {
    let outcome = anonymize_with(
        "SELECT name FROM users WHERE id = @user_id",
        SqlDialect::Tsql,
    );
    assert_eq!(outcome.sql, "SELECT col_1 FROM table_1 WHERE col_2 = @user_id");
}

// ============================================================================
// DML and DDL
// ============================================================================

#[test]
fn test_insert_values() {
    assert_eq!(
        anonymize("INSERT INTO users (name, email) VALUES ('Bob', 'bob@example.com')"),
        "INSERT INTO table_1 (col_1, col_2) VALUES ('string_1', 'email_1')"
    );
}

#[test]
fn test_insert_select_columns_follow_target() {
    let outcome = anonymize_with(
        "INSERT INTO archive (id) SELECT id FROM archive_staging",
        SqlDialect::Postgres,
    );
    let log = outcome.log.mappings().unwrap();
    assert_eq!(log.columns_of("archive").unwrap()["id"], "col_1");
}

#[test]
fn test_update_assignments() {
    assert_eq!(
        anonymize("UPDATE users SET email = 'a@b.co' WHERE id = 7"),
        "UPDATE table_1 SET col_1 = 'email_1' WHERE col_2 = number_1"
    );
}

#[test]
fn test_create_table_with_foreign_key() {
    let outcome = anonymize_with(
        "CREATE TABLE orders (id INT PRIMARY KEY, customer_id INT REFERENCES customers (id), total NUMERIC DEFAULT 0)",
        SqlDialect::Postgres,
    );
    assert!(outcome
        .sql
        .starts_with("CREATE TABLE table_1 (col_1 INT PRIMARY KEY, col_2 INT REFERENCES table_2"));
    assert!(outcome.sql.contains("col_3 NUMERIC DEFAULT number_1"));

    let log = outcome.log.mappings().unwrap();
    assert_eq!(log.columns_of("customers").unwrap()["id"], "col_1");
    assert_eq!(log.columns_of("orders").unwrap()["customer_id"], "col_2");
}

#[test]
fn test_create_table_name_is_renamed_once() {
    // Source names that look like placeholders must not be renamed twice
    let outcome = anonymize_with(
        "CREATE TABLE table_2 (x INT REFERENCES table_1 (id))",
        SqlDialect::Postgres,
    );
    assert_eq!(
        outcome.sql,
        "CREATE TABLE table_1 (col_1 INT REFERENCES table_2 (col_1))"
    );

    let log = outcome.log.mappings().unwrap();
    assert_eq!(log.table_placeholder("table_2"), Some("table_1"));
    assert_eq!(log.table_placeholder("table_1"), Some("table_2"));
}

#[test]
fn test_alter_table_add_foreign_key() {
    assert_eq!(
        anonymize(
            "ALTER TABLE orders ADD CONSTRAINT fk_cust FOREIGN KEY (customer_id) REFERENCES customers (id)"
        ),
        "ALTER TABLE table_1 ADD CONSTRAINT fk_cust FOREIGN KEY (col_1) REFERENCES table_2(col_1)"
    );
}

#[test]
fn test_alter_table_column_operations() {
    assert_eq!(
        anonymize("ALTER TABLE orders ADD COLUMN secret_ssn TEXT"),
        "ALTER TABLE table_1 ADD COLUMN col_1 TEXT"
    );
    assert_eq!(
        anonymize("ALTER TABLE orders RENAME COLUMN total TO amount"),
        "ALTER TABLE table_1 RENAME COLUMN col_1 TO col_2"
    );
    assert_eq!(
        anonymize("ALTER TABLE orders DROP COLUMN total"),
        "ALTER TABLE table_1 DROP COLUMN col_1"
    );
}

#[test]
fn test_alter_table_rename_to() {
    assert_eq!(
        anonymize("ALTER TABLE orders RENAME TO orders_archive"),
        "ALTER TABLE table_1 RENAME TO table_2"
    );
}

#[test]
fn test_create_view_name_is_renamed() {
    let outcome = anonymize_with(
        "CREATE VIEW v AS SELECT name FROM customers",
        SqlDialect::Postgres,
    );
    assert_eq!(outcome.sql, "CREATE VIEW table_1 AS SELECT col_1 FROM table_2");

    let log = outcome.log.mappings().unwrap();
    assert_eq!(log.table_placeholder("v"), Some("table_1"));
    assert_eq!(log.columns_of("customers").unwrap()["name"], "col_1");
}

#[test]
fn test_drop_view() {
    assert_eq!(anonymize("DROP VIEW active_customers"), "DROP VIEW table_1");
}

#[test]
fn test_cte_name_renamed_consistently() {
    let sql = anonymize("WITH recent AS (SELECT * FROM orders) SELECT * FROM recent");
    assert_eq!(
        sql,
        "WITH table_1 AS (SELECT * FROM table_2) SELECT * FROM table_1"
    );
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_same_literal_same_placeholder() {
    assert_eq!(
        anonymize("SELECT a FROM t WHERE b = 'x' OR c = 'x' OR d = 'y'"),
        "SELECT col_1 FROM table_1 WHERE col_2 = 'string_1' OR col_3 = 'string_1' OR col_4 = 'string_2'"
    );
}

#[test]
fn test_email_takes_precedence_over_string() {
    let outcome = anonymize_with(
        "SELECT a FROM t WHERE b IN ('ADMIN@X.COM', 'admin@x.com', 'plain')",
        SqlDialect::Postgres,
    );
    assert_eq!(
        outcome.sql,
        "SELECT col_1 FROM table_1 WHERE col_2 IN ('email_1', 'email_1', 'string_1')"
    );
    let literals = &outcome.log.mappings().unwrap().literal_mappings;
    assert_eq!(literals.email.len(), 1);
    assert_eq!(literals.string.len(), 1);
}

#[test]
fn test_numbers_in_limit() {
    assert_eq!(
        anonymize("SELECT a FROM t LIMIT 10"),
        "SELECT col_1 FROM table_1 LIMIT number_1"
    );
}

// ============================================================================
// Dialects and runs
// ============================================================================

#[test]
fn test_quoted_identifiers_keep_their_quotes() {
    assert_eq!(
        anonymize(r#"SELECT "Name" FROM "Users""#),
        r#"SELECT "col_1" FROM "table_1""#
    );
}

#[test]
fn test_mysql_backticks() {
    let outcome = anonymize_with("SELECT `id` FROM `users`", SqlDialect::MySql);
    assert_eq!(outcome.sql, "SELECT `col_1` FROM `table_1`");
}

#[test]
fn test_multi_statement_shares_registries() {
    assert_eq!(
        anonymize("SELECT id FROM users; SELECT id FROM users WHERE id = 3"),
        "SELECT col_1 FROM table_1;\nSELECT col_1 FROM table_1 WHERE col_1 = number_1"
    );
}

#[test]
fn test_output_is_deterministic() {
    let sql = "SELECT c.name, o.total FROM customers c JOIN orders o ON c.id = o.cid WHERE c.email = 'x@y.z'";
    let first = Anonymizer::new(false).sanitize(sql, SqlDialect::Postgres, true);
    let second = Anonymizer::new(false).sanitize(sql, SqlDialect::Postgres, true);
    assert_eq!(first.sql, second.sql);
    assert_eq!(first.log, second.log);
}

#[test]
fn test_parse_failure_keeps_input() {
    let sql = "SELECT FROM WHERE (";
    let outcome = Anonymizer::new(false).sanitize(sql, SqlDialect::Postgres, true);
    assert!(outcome.is_failure());
    assert_eq!(outcome.sql, sql);
    assert!(outcome.log.mappings().is_none());
}

#[test]
fn test_unknown_dialect_falls_back_to_postgres() {
    let dialect = SqlDialect::resolve("not-a-dialect");
    let outcome = anonymize_with("SELECT a FROM t", dialect);
    assert_eq!(outcome.sql, "SELECT col_1 FROM table_1");
}
