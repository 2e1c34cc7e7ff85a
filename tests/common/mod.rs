//! Common test utilities for sql-anonymizer tests

use std::fs;
use std::path::{Path, PathBuf};

use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;
use tempfile::TempDir;

/// Test context with temporary directory for isolated test execution
pub struct TestContext {
    /// Kept to prevent temp directory cleanup until TestContext is dropped
    _temp_dir: TempDir,
    pub dir: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().to_path_buf();
        Self {
            _temp_dir: temp_dir,
            dir,
        }
    }

    /// Write a SQL file relative to the context directory
    pub fn write_sql(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write SQL file");
        path
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.join(relative)
    }
}

/// Create a SQLite database at `path` by running `statements` in order
pub async fn create_sqlite_db(path: &Path, statements: &[&str]) {
    let mut conn = open_sqlite(path, "rwc").await;
    for statement in statements {
        sqlx::query(statement)
            .execute(&mut conn)
            .await
            .unwrap_or_else(|e| panic!("Failed to run {:?}: {}", statement, e));
    }
    conn.close().await.expect("Failed to close database");
}

/// Open a SQLite database; `mode` is `ro`, `rw` or `rwc`
pub async fn open_sqlite(path: &Path, mode: &str) -> SqliteConnection {
    let url = format!("sqlite://{}?mode={}", path.display(), mode);
    SqliteConnection::connect(&url)
        .await
        .unwrap_or_else(|e| panic!("Failed to open {}: {}", url, e))
}
