//! Shared helpers for tests that need a real database.

use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::db;
use crate::model::{Book, BookMetadata};

/// Fresh migrated database in a temp directory. Keep the [`TempDir`] alive
/// for the duration of the test.
pub async fn test_pool() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let url = db::db_url(Some(&dir.path().join("test.db")));
    let pool = db::init_db(&url).await.expect("init test db");
    (pool, dir)
}

/// Insert a book with empty metadata and return it.
pub async fn insert_test_book(pool: &SqlitePool, library_id: i64, file_path: &str) -> Book {
    let id = db::books::insert_book(pool, library_id, file_path, &BookMetadata::default())
        .await
        .expect("insert test book");
    db::books::get_book(pool, id)
        .await
        .expect("load test book")
        .expect("test book exists")
}
