//! Applies a consolidated metadata result to a stored book.
//!
//! Write order matters: lock updates land first, then the one-time backup is
//! taken, then values merge into the record. A field locked by this very
//! update is therefore already protected by the time values are written.

use std::io;
use std::path::Path;
use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::cover::CoverStore;
use crate::db;
use crate::model::{Book, BookMetadata};
use crate::reconcile::backup::BackupStore;
use crate::reconcile::domain::{ConsolidatedMetadata, LockUpdates, MetadataSnapshot, ReconcileError};
use crate::score;

/// Optional sink that mirrors metadata into the book file itself (e.g. an
/// EPUB OPF rewriter). The library database is the source of truth; sink
/// failures are logged and never fail the refresh.
pub trait EmbeddedMetadataSink: Send + Sync {
    fn write_embedded(&self, file_path: &Path, metadata: &BookMetadata) -> io::Result<()>;
}

/// Persists consolidated metadata: locks, backup, values, cover, score.
pub struct MetadataWriter {
    pool: SqlitePool,
    backups: BackupStore,
    covers: CoverStore,
    embedded: Option<Arc<dyn EmbeddedMetadataSink>>,
}

impl MetadataWriter {
    pub fn new(pool: SqlitePool, backups: BackupStore, covers: CoverStore) -> Self {
        Self {
            pool,
            backups,
            covers,
            embedded: None,
        }
    }

    pub fn with_embedded_sink(mut self, sink: Arc<dyn EmbeddedMetadataSink>) -> Self {
        self.embedded = Some(sink);
        self
    }

    /// Apply one consolidated update to `book` and persist it.
    ///
    /// `set_cover` gates the cover download; `merge_categories` switches
    /// category handling from replace to union.
    pub async fn apply(
        &self,
        book: &mut Book,
        update: &ConsolidatedMetadata,
        set_cover: bool,
        merge_categories: bool,
    ) -> Result<(), ReconcileError> {
        apply_lock_updates(&mut book.metadata, &update.lock_updates);

        if book.metadata.locks.all_locked() {
            // Nothing may be written, but the lock changes themselves persist.
            info!(book_id = book.id, "every field locked, storing lock changes only");
            db::books::save_metadata(&self.pool, book).await?;
            return Ok(());
        }

        // Backup happens before any value changes and only ever once.
        self.backups.create_if_absent(book)?;

        merge_values(&mut book.metadata, &update.snapshot, merge_categories);

        if set_cover
            && !book.metadata.locks.cover
            && let Some(url) = &update.snapshot.cover_url
        {
            match self.covers.fetch_and_store(book.id, url).await {
                Ok(path) => book.metadata.cover_path = Some(path.to_string_lossy().into_owned()),
                // A bad cover never fails the book; it just stays as it was.
                Err(e) => warn!(book_id = book.id, error = %e, "cover fetch failed"),
            }
        }

        book.metadata_score = Some(score::completeness(&book.metadata));
        db::books::save_metadata(&self.pool, book).await?;

        if let Some(sink) = &self.embedded
            && let Err(e) = sink.write_embedded(Path::new(&book.file_path), &book.metadata)
        {
            warn!(book_id = book.id, error = %e, "embedded metadata write failed");
        }

        Ok(())
    }
}

/// Apply explicit lock flag changes. `None` entries leave the flag alone.
pub fn apply_lock_updates(metadata: &mut BookMetadata, updates: &LockUpdates) {
    let locks = &mut metadata.locks;
    if let Some(v) = updates.title {
        locks.title = v;
    }
    if let Some(v) = updates.subtitle {
        locks.subtitle = v;
    }
    if let Some(v) = updates.description {
        locks.description = v;
    }
    if let Some(v) = updates.publisher {
        locks.publisher = v;
    }
    if let Some(v) = updates.published_date {
        locks.published_date = v;
    }
    if let Some(v) = updates.isbn10 {
        locks.isbn10 = v;
    }
    if let Some(v) = updates.isbn13 {
        locks.isbn13 = v;
    }
    if let Some(v) = updates.page_count {
        locks.page_count = v;
    }
    if let Some(v) = updates.language {
        locks.language = v;
    }
    if let Some(v) = updates.rating {
        locks.rating = v;
    }
    if let Some(v) = updates.review_count {
        locks.review_count = v;
    }
    if let Some(v) = updates.series_name {
        locks.series_name = v;
    }
    if let Some(v) = updates.series_number {
        locks.series_number = v;
    }
    if let Some(v) = updates.series_total {
        locks.series_total = v;
    }
    if let Some(v) = updates.authors {
        locks.authors = v;
    }
    if let Some(v) = updates.categories {
        locks.categories = v;
    }
    if let Some(v) = updates.cover {
        locks.cover = v;
    }
}

/// Merge resolved values into the stored record.
///
/// Absent snapshot fields leave the stored value alone; blank strings count
/// as absent. Locked fields are never touched, which also covers fields
/// locked by this same update.
pub fn merge_values(metadata: &mut BookMetadata, snapshot: &MetadataSnapshot, merge_categories: bool) {
    let locks = metadata.locks;

    if !locks.title && let Some(v) = non_blank(&snapshot.title) {
        metadata.title = Some(v);
    }
    if !locks.subtitle && let Some(v) = non_blank(&snapshot.subtitle) {
        metadata.subtitle = Some(v);
    }
    if !locks.description && let Some(v) = non_blank(&snapshot.description) {
        metadata.description = Some(v);
    }
    if !locks.publisher && let Some(v) = non_blank(&snapshot.publisher) {
        metadata.publisher = Some(v);
    }
    if !locks.published_date && let Some(v) = snapshot.published_date {
        metadata.published_date = Some(v);
    }
    if !locks.isbn10 && let Some(v) = non_blank(&snapshot.isbn10) {
        metadata.isbn10 = Some(v);
    }
    if !locks.isbn13 && let Some(v) = non_blank(&snapshot.isbn13) {
        metadata.isbn13 = Some(v);
    }
    if !locks.page_count && let Some(v) = snapshot.page_count {
        metadata.page_count = Some(v);
    }
    if !locks.language && let Some(v) = non_blank(&snapshot.language) {
        metadata.language = Some(v);
    }
    if !locks.rating && let Some(v) = snapshot.rating {
        metadata.rating = Some(v);
    }
    if !locks.review_count && let Some(v) = snapshot.review_count {
        metadata.review_count = Some(v);
    }
    if !locks.series_name && let Some(v) = non_blank(&snapshot.series_name) {
        metadata.series_name = Some(v);
    }
    if !locks.series_number && let Some(v) = snapshot.series_number {
        metadata.series_number = Some(v);
    }
    if !locks.series_total && let Some(v) = snapshot.series_total {
        metadata.series_total = Some(v);
    }

    if !locks.authors && !snapshot.authors.is_empty() {
        metadata.authors = snapshot.authors.clone();
    }
    if !locks.categories && !snapshot.categories.is_empty() {
        if merge_categories {
            for category in &snapshot.categories {
                if !metadata.categories.contains(category) {
                    metadata.categories.push(category.clone());
                }
            }
        } else {
            metadata.categories = snapshot.categories.clone();
        }
    }

    // Identifiers have no lock flags.
    if let Some(v) = non_blank(&snapshot.google_id) {
        metadata.google_id = Some(v);
    }
    if let Some(v) = non_blank(&snapshot.goodreads_id) {
        metadata.goodreads_id = Some(v);
    }
    if let Some(v) = non_blank(&snapshot.hardcover_id) {
        metadata.hardcover_id = Some(v);
    }
    if let Some(v) = non_blank(&snapshot.comicvine_id) {
        metadata.comicvine_id = Some(v);
    }
}

/// Treat whitespace-only provider strings as absent.
fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
