//! Database module for book, refresh-job, and proposal persistence.
//!
//! Uses SQLx with SQLite for lightweight, embedded database storage.
//! Provides async operations for:
//! - Book CRUD and metadata persistence
//! - Refresh job lifecycle and progress counters
//! - Proposal creation and review transitions
//!
//! # Example
//!
//! ```ignore
//! use book_minder::db::{init_db, books};
//!
//! let pool = init_db("sqlite:book_minder.db").await?;
//! let all = books::get_all_books(&pool).await?;
//! ```

pub mod books;
pub mod jobs;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "book_minder.db";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&std::path::Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations. Foreign
/// keys are enabled on every connection so deleting a job cascades to its
/// proposals.
///
/// # Errors
///
/// Returns an error if:
/// - Connection cannot be established
/// - Migration fails
pub async fn init_db(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(db_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_db_creates_database() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db_url = format!("sqlite:{}", db_path.display());

        let pool = init_db(&db_url).await.expect("Failed to init db");
        assert!(db_path.exists());

        let all = books::get_all_books(&pool).await.expect("query books");
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_url = format!("sqlite:{}", temp_dir.path().join("fk.db").display());
        let pool = init_db(&db_url).await.unwrap();

        let (enabled,): (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
