//! Integration tests for file and batch anonymization

use std::fs;

use pretty_assertions::assert_eq;
use sql_anonymizer::parser::collect_sql_files;
use sql_anonymizer::{anonymize_file, anonymize_files, SanitizeOptions, SqlDialect};

use crate::common::TestContext;

fn options(explain: bool) -> SanitizeOptions {
    SanitizeOptions {
        dialect: SqlDialect::Postgres,
        strict_mode: false,
        explain,
    }
}

// ============================================================================
// Single files
// ============================================================================

#[test]
fn test_anonymize_file_writes_output() {
    let ctx = TestContext::new();
    let input = ctx.write_sql("in/report.sql", "SELECT name FROM customers WHERE id = 42");

    let report = anonymize_file(&input, &ctx.path("out"), &options(false))
        .expect("anonymize_file should succeed");

    assert!(!report.failed);
    assert_eq!(report.output, ctx.path("out/report.sql"));
    assert!(report.mapping.is_none());
    assert_eq!(
        fs::read_to_string(&report.output).unwrap(),
        "SELECT col_1 FROM table_1 WHERE col_2 = number_1"
    );
}

#[test]
fn test_anonymize_file_with_explain_writes_mapping() {
    let ctx = TestContext::new();
    let input = ctx.write_sql("report.sql", "SELECT email FROM users WHERE email = 'a@b.io'");

    let report = anonymize_file(&input, &ctx.path("out"), &options(true)).unwrap();

    let mapping_path = report.mapping.expect("mapping should be written with explain");
    assert_eq!(mapping_path, ctx.path("out/report.mapping.json"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&mapping_path).unwrap()).unwrap();
    assert_eq!(json["Identifier Mappings"]["table"]["users"], "table_1");
    assert_eq!(
        json["Column Mappings (per anonymized table)"]["table_1"]["email"],
        "col_1"
    );
    assert_eq!(json["Literal Mappings"]["email"]["a@b.io"], "email_1");
}

#[test]
fn test_unparseable_file_is_copied_unchanged() {
    let ctx = TestContext::new();
    let broken = "SELECT * FROM WHERE ((";
    let input = ctx.write_sql("broken.sql", broken);

    let report = anonymize_file(&input, &ctx.path("out"), &options(false)).unwrap();

    assert!(report.failed);
    assert_eq!(fs::read_to_string(&report.output).unwrap(), broken);

    let mapping = fs::read_to_string(report.mapping.expect("failure log is always written"))
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&mapping).unwrap();
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Parsing failed for dialect postgres"));
}

#[test]
fn test_missing_input_is_an_error() {
    let ctx = TestContext::new();
    let result = anonymize_file(&ctx.path("nope.sql"), &ctx.path("out"), &options(false));
    assert!(result.is_err());
}

// ============================================================================
// Batches
// ============================================================================

#[test]
fn test_collect_sql_files_from_directory() {
    let ctx = TestContext::new();
    ctx.write_sql("queries/b.sql", "SELECT 1");
    ctx.write_sql("queries/nested/a.SQL", "SELECT 1");
    ctx.write_sql("queries/notes.txt", "not sql");

    let files = collect_sql_files(&[ctx.path("queries").display().to_string()]);

    assert_eq!(
        files,
        vec![ctx.path("queries/b.sql"), ctx.path("queries/nested/a.SQL")]
    );
}

#[test]
fn test_collect_sql_files_from_glob() {
    let ctx = TestContext::new();
    ctx.write_sql("one.sql", "SELECT 1");
    ctx.write_sql("two.sql", "SELECT 2");
    ctx.write_sql("three.txt", "SELECT 3");

    let pattern = format!("{}/*.sql", ctx.dir.display());
    let files = collect_sql_files(&[pattern]);

    assert_eq!(files, vec![ctx.path("one.sql"), ctx.path("two.sql")]);
}

#[test]
fn test_batch_numbers_each_file_independently() {
    let ctx = TestContext::new();
    let first = ctx.write_sql("a.sql", "SELECT total FROM orders");
    let second = ctx.write_sql("b.sql", "SELECT name FROM customers");

    let reports = anonymize_files(&[first, second], &ctx.path("out"), &options(false)).unwrap();

    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert_eq!(
            fs::read_to_string(&report.output).unwrap(),
            "SELECT col_1 FROM table_1"
        );
    }
}

#[test]
fn test_batch_keeps_same_named_files_apart() {
    let ctx = TestContext::new();
    let first = ctx.write_sql("sql/a/q.sql", "SELECT total FROM orders WHERE total > 10");
    let second = ctx.write_sql("sql/b/q.sql", "SELECT name FROM customers");
    let top = ctx.write_sql("sql/top.sql", "SELECT 1");

    let reports =
        anonymize_files(&[first, second, top], &ctx.path("out"), &options(true)).unwrap();

    let outputs: Vec<_> = reports.iter().map(|r| r.output.clone()).collect();
    assert_eq!(
        outputs,
        vec![
            ctx.path("out/a/q.sql"),
            ctx.path("out/b/q.sql"),
            ctx.path("out/top.sql"),
        ]
    );
    assert_eq!(
        fs::read_to_string(ctx.path("out/a/q.sql")).unwrap(),
        "SELECT col_1 FROM table_1 WHERE col_1 > number_1"
    );
    assert_eq!(
        fs::read_to_string(ctx.path("out/b/q.sql")).unwrap(),
        "SELECT col_1 FROM table_1"
    );
    assert!(ctx.path("out/a/q.mapping.json").exists());
    assert!(ctx.path("out/b/q.mapping.json").exists());
}

#[test]
fn test_large_batch_runs_in_parallel_with_same_results() {
    let ctx = TestContext::new();
    let files: Vec<_> = (0..12)
        .map(|i| {
            ctx.write_sql(
                &format!("q{:02}.sql", i),
                &format!("SELECT c{} FROM t{} WHERE c{} = {}", i, i, i, i),
            )
        })
        .collect();

    let reports = anonymize_files(&files, &ctx.path("out"), &options(false)).unwrap();

    assert_eq!(reports.len(), 12);
    for (report, input) in reports.iter().zip(&files) {
        assert_eq!(&report.input, input);
        assert!(!report.failed);
        assert_eq!(
            fs::read_to_string(&report.output).unwrap(),
            "SELECT col_1 FROM table_1 WHERE col_1 = number_1"
        );
    }
}
