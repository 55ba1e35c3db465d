//! Book store: CRUD over the `books` table.
//!
//! Metadata is persisted as a JSON column (see [`crate::model::BookMetadata`]);
//! rows are decoded back into [`Book`] values here so callers never touch the
//! raw JSON.

use sqlx::sqlite::SqlitePool;
use tracing::warn;

use crate::model::{Book, BookMetadata};

/// Raw row shape; metadata stays serialized until [`row_to_book`] decodes it.
#[derive(sqlx::FromRow)]
struct BookRow {
    id: i64,
    library_id: i64,
    file_path: String,
    metadata: String,
    metadata_score: Option<f64>,
}

fn row_to_book(row: BookRow) -> Result<Book, sqlx::Error> {
    let metadata: BookMetadata = serde_json::from_str(&row.metadata)
        .map_err(|e| sqlx::Error::Decode(format!("invalid metadata JSON: {e}").into()))?;
    Ok(Book {
        id: row.id,
        library_id: row.library_id,
        file_path: row.file_path,
        metadata,
        metadata_score: row.metadata_score,
    })
}

const SELECT_BOOK: &str = "SELECT id, library_id, file_path, metadata, metadata_score FROM books";

/// Insert a new book record.
///
/// # Returns
///
/// The database ID of the new book.
pub async fn insert_book(
    pool: &SqlitePool,
    library_id: i64,
    file_path: &str,
    metadata: &BookMetadata,
) -> sqlx::Result<i64> {
    let json = serde_json::to_string(metadata)
        .map_err(|e| sqlx::Error::Encode(format!("serialize metadata: {e}").into()))?;

    let result = sqlx::query("INSERT INTO books (library_id, file_path, metadata) VALUES (?, ?, ?)")
        .bind(library_id)
        .bind(file_path)
        .bind(json)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Get a book by its database ID, or None.
pub async fn get_book(pool: &SqlitePool, book_id: i64) -> sqlx::Result<Option<Book>> {
    let row: Option<BookRow> = sqlx::query_as(&format!("{SELECT_BOOK} WHERE id = ?"))
        .bind(book_id)
        .fetch_optional(pool)
        .await?;

    row.map(row_to_book).transpose()
}

/// Get books by explicit IDs, preserving the given order.
///
/// Unknown IDs are dropped with a warning rather than failing the batch.
pub async fn get_books_by_ids(pool: &SqlitePool, book_ids: &[i64]) -> sqlx::Result<Vec<Book>> {
    let mut books = Vec::with_capacity(book_ids.len());
    for &id in book_ids {
        match get_book(pool, id).await? {
            Some(book) => books.push(book),
            None => warn!(book_id = id, "book not found, dropping from refresh target"),
        }
    }
    Ok(books)
}

/// Get every book belonging to a library.
pub async fn get_books_by_library(pool: &SqlitePool, library_id: i64) -> sqlx::Result<Vec<Book>> {
    let rows: Vec<BookRow> =
        sqlx::query_as(&format!("{SELECT_BOOK} WHERE library_id = ? ORDER BY id"))
            .bind(library_id)
            .fetch_all(pool)
            .await?;

    rows.into_iter().map(row_to_book).collect()
}

/// Get all books across every library.
pub async fn get_all_books(pool: &SqlitePool) -> sqlx::Result<Vec<Book>> {
    let rows: Vec<BookRow> = sqlx::query_as(&format!("{SELECT_BOOK} ORDER BY id"))
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(row_to_book).collect()
}

/// Persist a book's metadata and completeness score.
///
/// This is the single write path for reconciled metadata; the engine and the
/// metadata writer both land here.
pub async fn save_metadata(pool: &SqlitePool, book: &Book) -> sqlx::Result<()> {
    let json = serde_json::to_string(&book.metadata)
        .map_err(|e| sqlx::Error::Encode(format!("serialize metadata: {e}").into()))?;

    sqlx::query("UPDATE books SET metadata = ?, metadata_score = ? WHERE id = ?")
        .bind(json)
        .bind(book.metadata_score)
        .bind(book.id)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_pool;

    #[tokio::test]
    async fn test_insert_and_get_book() {
        let (pool, _dir) = test_pool().await;

        let meta = BookMetadata {
            title: Some("Dune".to_string()),
            authors: vec!["Frank Herbert".to_string()],
            ..Default::default()
        };
        let id = insert_book(&pool, 1, "/books/dune.epub", &meta).await.unwrap();
        assert!(id > 0);

        let book = get_book(&pool, id).await.unwrap().unwrap();
        assert_eq!(book.library_id, 1);
        assert_eq!(book.metadata.title.as_deref(), Some("Dune"));
        assert_eq!(book.metadata_score, None);

        assert!(get_book(&pool, id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_books_by_ids_drops_unknown() {
        let (pool, _dir) = test_pool().await;

        let a = insert_book(&pool, 1, "/books/a.epub", &BookMetadata::default())
            .await
            .unwrap();
        let b = insert_book(&pool, 1, "/books/b.epub", &BookMetadata::default())
            .await
            .unwrap();

        let books = get_books_by_ids(&pool, &[b, 9999, a]).await.unwrap();
        let ids: Vec<i64> = books.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![b, a]);
    }

    #[tokio::test]
    async fn test_get_books_by_library() {
        let (pool, _dir) = test_pool().await;

        insert_book(&pool, 1, "/books/a.epub", &BookMetadata::default())
            .await
            .unwrap();
        insert_book(&pool, 2, "/books/b.epub", &BookMetadata::default())
            .await
            .unwrap();

        let books = get_books_by_library(&pool, 1).await.unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].file_path, "/books/a.epub");
    }

    #[tokio::test]
    async fn test_save_metadata_roundtrip() {
        let (pool, _dir) = test_pool().await;

        let id = insert_book(&pool, 1, "/books/a.epub", &BookMetadata::default())
            .await
            .unwrap();
        let mut book = get_book(&pool, id).await.unwrap().unwrap();

        book.metadata.title = Some("Hyperion".to_string());
        book.metadata.locks.title = true;
        book.metadata_score = Some(42.0);
        save_metadata(&pool, &book).await.unwrap();

        let reloaded = get_book(&pool, id).await.unwrap().unwrap();
        assert_eq!(reloaded, book);
    }
}
