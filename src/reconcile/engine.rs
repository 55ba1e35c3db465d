//! The batch reconciliation engine.
//!
//! One refresh walks its target books sequentially; within a book, the
//! configured providers are queried in parallel. Provider failures are
//! swallowed per provider, book failures are logged per book, and only
//! infrastructure failures (database, serialization) abort the batch.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db;
use crate::model::{Book, JobStatus};
use crate::reconcile::domain::{
    ConsolidatedMetadata, MetadataSnapshot, ProviderId, QueryHints, ReconcileError,
    RefreshOptions, RefreshRequest, RefreshSelection,
};
use crate::reconcile::notify::{Event, EventBus};
use crate::reconcile::providers::ProviderRegistry;
use crate::reconcile::resolver;
use crate::reconcile::writer::MetadataWriter;

/// What happened to one book inside a batch.
enum BookOutcome {
    /// Metadata was applied or a proposal was staged.
    Processed,
    /// Every field was locked; nothing to do.
    Skipped,
}

/// Runs batch refreshes against the provider registry.
pub struct ReconciliationEngine {
    pool: SqlitePool,
    registry: Arc<ProviderRegistry>,
    writer: MetadataWriter,
    events: EventBus,
    /// Provider substituted for every chain by the `quick` flag.
    quick_provider: ProviderId,
}

impl ReconciliationEngine {
    pub fn new(
        pool: SqlitePool,
        registry: Arc<ProviderRegistry>,
        writer: MetadataWriter,
        events: EventBus,
        quick_provider: ProviderId,
    ) -> Self {
        Self {
            pool,
            registry,
            writer,
            events,
            quick_provider,
        }
    }

    /// Run one refresh to completion.
    ///
    /// Returns the refresh job id in review mode, None in direct-apply mode.
    /// A failed batch finalizes its job as Error before the error propagates.
    pub async fn refresh(
        &self,
        request: &RefreshRequest,
        user_id: i64,
    ) -> Result<Option<i64>, ReconcileError> {
        let options = if request.quick {
            RefreshOptions::quick_defaults(self.quick_provider, request.options.review_before_apply)
        } else {
            request.options.clone()
        };

        if options.resolved_providers().is_empty() {
            return Err(ReconcileError::NoProviders);
        }

        let books = self.target_books(&request.selection).await?;
        if books.is_empty() {
            return Err(ReconcileError::InvalidSelection(
                "selection matched no books".to_string(),
            ));
        }
        let total = books.len() as i64;

        let job_id = if options.review_before_apply {
            Some(db::jobs::create_job(&self.pool, user_id, total).await?)
        } else {
            None
        };

        info!(?job_id, total, review = options.review_before_apply, "starting refresh");

        let mut completed = 0i64;
        match self.run_batch(&books, &options, job_id, &mut completed).await {
            Ok(()) => {
                if let Some(id) = job_id {
                    db::jobs::finish_job(&self.pool, id, JobStatus::Completed, None).await?;
                }
                self.events.emit(Event::BatchProgress {
                    job_id,
                    completed: total,
                    total,
                    message: "Refresh complete".to_string(),
                    status: JobStatus::Completed,
                });
                Ok(job_id)
            }
            Err(e) => {
                warn!(?job_id, error = %e, "refresh batch failed");
                if let Some(id) = job_id {
                    db::jobs::finish_job(&self.pool, id, JobStatus::Error, Some(&e.to_string()))
                        .await?;
                }
                self.events.emit(Event::BatchProgress {
                    job_id,
                    completed,
                    total,
                    message: format!("Refresh failed: {e}"),
                    status: JobStatus::Error,
                });
                Err(e)
            }
        }
    }

    async fn target_books(&self, selection: &RefreshSelection) -> Result<Vec<Book>, ReconcileError> {
        match selection {
            RefreshSelection::Library { library_id } => {
                Ok(db::books::get_books_by_library(&self.pool, *library_id).await?)
            }
            RefreshSelection::Books { book_ids } => {
                if book_ids.is_empty() {
                    return Err(ReconcileError::InvalidSelection(
                        "empty book id list".to_string(),
                    ));
                }
                Ok(db::books::get_books_by_ids(&self.pool, book_ids).await?)
            }
        }
    }

    /// Walk the batch, advancing `completed` as each book finishes so the
    /// caller still knows how far the loop got if it aborts.
    async fn run_batch(
        &self,
        books: &[Book],
        options: &RefreshOptions,
        job_id: Option<i64>,
        completed: &mut i64,
    ) -> Result<(), ReconcileError> {
        let total = books.len() as i64;

        for book in books {
            let message = match self.process_book(book, options, job_id, *completed, total).await {
                Ok(BookOutcome::Processed) => {
                    format!("Processed {}", book.display_title())
                }
                Ok(BookOutcome::Skipped) => {
                    format!("Skipped {} (all fields locked)", book.display_title())
                }
                // One bad book never stops the batch, but the counter still
                // advances so progress reaches the end.
                Err(e) => {
                    warn!(book_id = book.id, error = %e, "book refresh failed");
                    format!("Failed {}: {e}", book.display_title())
                }
            };

            *completed += 1;
            if let Some(id) = job_id {
                db::jobs::set_progress(&self.pool, id, *completed).await?;
            }
            self.events.emit(Event::BatchProgress {
                job_id,
                completed: *completed,
                total,
                message,
                status: JobStatus::InProgress,
            });
        }

        Ok(())
    }

    async fn process_book(
        &self,
        book: &Book,
        options: &RefreshOptions,
        job_id: Option<i64>,
        completed: i64,
        total: i64,
    ) -> Result<BookOutcome, ReconcileError> {
        if book.metadata.locks.all_locked() {
            return Ok(BookOutcome::Skipped);
        }

        self.events.emit(Event::BatchProgress {
            job_id,
            completed,
            total,
            message: format!("Fetching metadata for {}", book.display_title()),
            status: JobStatus::InProgress,
        });

        let hints = QueryHints::from_book(book);
        let results = self.fetch_all(&hints, options).await;

        let snapshot = resolver::consolidate(&results, options, &book.metadata.locks);
        let consolidated = ConsolidatedMetadata {
            snapshot,
            ..Default::default()
        };

        if let Some(id) = job_id {
            let json = serde_json::to_string(&consolidated)?;
            db::jobs::create_proposal(&self.pool, id, book.id, &json).await?;
        } else {
            let mut book = book.clone();
            self.writer
                .apply(&mut book, &consolidated, options.refresh_covers, options.merge_categories)
                .await?;
            self.events.emit(Event::MetadataUpdated {
                book_id: book.id,
                title: book.metadata.title.clone(),
            });
        }

        Ok(BookOutcome::Processed)
    }

    /// Query every resolved provider in parallel for one book.
    ///
    /// A provider that is throttled waits on its limiter first. Failures and
    /// misses are logged and dropped; the result map only holds answers.
    async fn fetch_all(
        &self,
        hints: &QueryHints,
        options: &RefreshOptions,
    ) -> HashMap<ProviderId, MetadataSnapshot> {
        let fetches = options.resolved_providers().into_iter().map(|id| {
            let registry = Arc::clone(&self.registry);
            async move {
                let Some(client) = registry.get(id) else {
                    warn!(provider = %id, "provider not registered, skipping");
                    return None;
                };
                if let Some(limiter) = registry.limiter(id) {
                    limiter.acquire().await;
                }
                match client.fetch_top(hints).await {
                    Ok(Some(snapshot)) => Some((id, snapshot)),
                    Ok(None) => None,
                    Err(e) => {
                        warn!(provider = %id, error = %e, "provider fetch failed");
                        None
                    }
                }
            }
        });

        join_all(fetches).await.into_iter().flatten().collect()
    }
}
