//! Refresh-job and proposal store.
//!
//! Jobs are created only for review-mode refreshes; proposals belong to a job
//! and cascade away with it (FK `ON DELETE CASCADE`, enabled in `init_db`).

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use crate::model::{JobStatus, Proposal, ProposalStatus, RefreshJob};

#[derive(sqlx::FromRow)]
struct JobRow {
    id: i64,
    user_id: i64,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    total_books: i64,
    completed_books: i64,
    error: Option<String>,
}

fn row_to_job(row: JobRow) -> Result<RefreshJob, sqlx::Error> {
    let status = row
        .status
        .parse::<JobStatus>()
        .map_err(|_| sqlx::Error::Decode(format!("unknown job status: {}", row.status).into()))?;
    Ok(RefreshJob {
        id: row.id,
        user_id: row.user_id,
        status,
        started_at: row.started_at,
        completed_at: row.completed_at,
        total_books: row.total_books,
        completed_books: row.completed_books,
        error: row.error,
    })
}

#[derive(sqlx::FromRow)]
struct ProposalRow {
    id: i64,
    job_id: i64,
    book_id: i64,
    metadata: String,
    status: String,
    fetched_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
    reviewer_user_id: Option<i64>,
}

fn row_to_proposal(row: ProposalRow) -> Result<Proposal, sqlx::Error> {
    let status = row.status.parse::<ProposalStatus>().map_err(|_| {
        sqlx::Error::Decode(format!("unknown proposal status: {}", row.status).into())
    })?;
    Ok(Proposal {
        id: row.id,
        job_id: row.job_id,
        book_id: row.book_id,
        metadata: row.metadata,
        status,
        fetched_at: row.fetched_at,
        reviewed_at: row.reviewed_at,
        reviewer_user_id: row.reviewer_user_id,
    })
}

const SELECT_JOB: &str = "SELECT id, user_id, status, started_at, completed_at, total_books, \
                          completed_books, error FROM refresh_jobs";
const SELECT_PROPOSAL: &str = "SELECT id, job_id, book_id, metadata, status, fetched_at, \
                               reviewed_at, reviewer_user_id FROM proposals";

/// Create a new in-progress refresh job.
///
/// `total_books` is fixed at creation, before any book is processed.
pub async fn create_job(pool: &SqlitePool, user_id: i64, total_books: i64) -> sqlx::Result<i64> {
    let result = sqlx::query(
        "INSERT INTO refresh_jobs (user_id, status, started_at, total_books) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(JobStatus::InProgress.as_str())
    .bind(Utc::now())
    .bind(total_books)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Get a job by ID, or None.
pub async fn get_job(pool: &SqlitePool, job_id: i64) -> sqlx::Result<Option<RefreshJob>> {
    let row: Option<JobRow> = sqlx::query_as(&format!("{SELECT_JOB} WHERE id = ?"))
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

    row.map(row_to_job).transpose()
}

/// Get every job, newest first.
pub async fn get_all_jobs(pool: &SqlitePool) -> sqlx::Result<Vec<RefreshJob>> {
    let rows: Vec<JobRow> = sqlx::query_as(&format!("{SELECT_JOB} ORDER BY id DESC"))
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(row_to_job).collect()
}

/// Set a job's completed-book counter.
///
/// Only the single sequential batch loop writes this, so plain UPDATE
/// semantics keep the counter monotone.
pub async fn set_progress(pool: &SqlitePool, job_id: i64, completed_books: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE refresh_jobs SET completed_books = ? WHERE id = ?")
        .bind(completed_books)
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Finalize a job exactly once: terminal status, completion time, and the
/// error message when the batch died.
pub async fn finish_job(
    pool: &SqlitePool,
    job_id: i64,
    status: JobStatus,
    error: Option<&str>,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE refresh_jobs SET status = ?, completed_at = ?, error = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(error)
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a job; its proposals cascade.
///
/// # Returns
///
/// `false` if the job does not exist.
pub async fn delete_job(pool: &SqlitePool, job_id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM refresh_jobs WHERE id = ?")
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Record a fetched proposal for one book in one job.
pub async fn create_proposal(
    pool: &SqlitePool,
    job_id: i64,
    book_id: i64,
    metadata_json: &str,
) -> sqlx::Result<i64> {
    let result = sqlx::query(
        "INSERT INTO proposals (job_id, book_id, metadata, status, fetched_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(job_id)
    .bind(book_id)
    .bind(metadata_json)
    .bind(ProposalStatus::Fetched.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Get a proposal by ID, or None.
pub async fn get_proposal(pool: &SqlitePool, proposal_id: i64) -> sqlx::Result<Option<Proposal>> {
    let row: Option<ProposalRow> = sqlx::query_as(&format!("{SELECT_PROPOSAL} WHERE id = ?"))
        .bind(proposal_id)
        .fetch_optional(pool)
        .await?;

    row.map(row_to_proposal).transpose()
}

/// Get a job's proposals, optionally filtered by status.
pub async fn get_proposals_for_job(
    pool: &SqlitePool,
    job_id: i64,
    status: Option<ProposalStatus>,
) -> sqlx::Result<Vec<Proposal>> {
    let rows: Vec<ProposalRow> = match status {
        Some(s) => {
            sqlx::query_as(&format!(
                "{SELECT_PROPOSAL} WHERE job_id = ? AND status = ? ORDER BY id"
            ))
            .bind(job_id)
            .bind(s.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as(&format!("{SELECT_PROPOSAL} WHERE job_id = ? ORDER BY id"))
                .bind(job_id)
                .fetch_all(pool)
                .await?
        }
    };

    rows.into_iter().map(row_to_proposal).collect()
}

/// Counts used for the active-jobs summary: proposals that are not rejected,
/// and of those, how many were accepted.
pub async fn proposal_counts(pool: &SqlitePool, job_id: i64) -> sqlx::Result<(i64, i64)> {
    let row: (i64, i64) = sqlx::query_as(
        "SELECT \
             COUNT(CASE WHEN status != 'rejected' THEN 1 END), \
             COUNT(CASE WHEN status = 'accepted' THEN 1 END) \
         FROM proposals WHERE job_id = ?",
    )
    .bind(job_id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Apply a review decision: terminal status, review time, and reviewer.
pub async fn review_proposal(
    pool: &SqlitePool,
    proposal_id: i64,
    status: ProposalStatus,
    reviewer_user_id: i64,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE proposals SET status = ?, reviewed_at = ?, reviewer_user_id = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(Utc::now())
    .bind(reviewer_user_id)
    .bind(proposal_id)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_pool;

    #[tokio::test]
    async fn test_job_lifecycle() {
        let (pool, _dir) = test_pool().await;

        let id = create_job(&pool, 7, 3).await.unwrap();
        let job = get_job(&pool, id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::InProgress);
        assert_eq!(job.total_books, 3);
        assert_eq!(job.completed_books, 0);
        assert!(job.completed_at.is_none());

        set_progress(&pool, id, 2).await.unwrap();
        finish_job(&pool, id, JobStatus::Completed, None).await.unwrap();

        let job = get_job(&pool, id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.completed_books, 2);
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_finish_job_records_error() {
        let (pool, _dir) = test_pool().await;

        let id = create_job(&pool, 1, 1).await.unwrap();
        finish_job(&pool, id, JobStatus::Error, Some("database went away"))
            .await
            .unwrap();

        let job = get_job(&pool, id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error.as_deref(), Some("database went away"));
    }

    #[tokio::test]
    async fn test_proposal_lifecycle() {
        let (pool, _dir) = test_pool().await;

        let job_id = create_job(&pool, 1, 1).await.unwrap();
        let prop_id = create_proposal(&pool, job_id, 42, r#"{"snapshot":{}}"#)
            .await
            .unwrap();

        let prop = get_proposal(&pool, prop_id).await.unwrap().unwrap();
        assert_eq!(prop.status, ProposalStatus::Fetched);
        assert_eq!(prop.book_id, 42);
        assert!(prop.reviewed_at.is_none());

        review_proposal(&pool, prop_id, ProposalStatus::Accepted, 9)
            .await
            .unwrap();
        let prop = get_proposal(&pool, prop_id).await.unwrap().unwrap();
        assert_eq!(prop.status, ProposalStatus::Accepted);
        assert_eq!(prop.reviewer_user_id, Some(9));
        assert!(prop.reviewed_at.is_some());
    }

    #[tokio::test]
    async fn test_proposal_counts_exclude_rejected() {
        let (pool, _dir) = test_pool().await;

        let job_id = create_job(&pool, 1, 3).await.unwrap();
        let a = create_proposal(&pool, job_id, 1, "{}").await.unwrap();
        let b = create_proposal(&pool, job_id, 2, "{}").await.unwrap();
        create_proposal(&pool, job_id, 3, "{}").await.unwrap();

        review_proposal(&pool, a, ProposalStatus::Accepted, 1).await.unwrap();
        review_proposal(&pool, b, ProposalStatus::Rejected, 1).await.unwrap();

        let (total, accepted) = proposal_counts(&pool, job_id).await.unwrap();
        assert_eq!(total, 2); // rejected proposal excluded
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn test_delete_job_cascades_proposals() {
        let (pool, _dir) = test_pool().await;

        let job_id = create_job(&pool, 1, 1).await.unwrap();
        let prop_id = create_proposal(&pool, job_id, 1, "{}").await.unwrap();

        assert!(delete_job(&pool, job_id).await.unwrap());
        assert!(get_proposal(&pool, prop_id).await.unwrap().is_none());

        assert!(!delete_job(&pool, job_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_get_proposals_filtered_by_status() {
        let (pool, _dir) = test_pool().await;

        let job_id = create_job(&pool, 1, 2).await.unwrap();
        let a = create_proposal(&pool, job_id, 1, "{}").await.unwrap();
        create_proposal(&pool, job_id, 2, "{}").await.unwrap();
        review_proposal(&pool, a, ProposalStatus::Accepted, 1).await.unwrap();

        let fetched = get_proposals_for_job(&pool, job_id, Some(ProposalStatus::Fetched))
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].book_id, 2);

        let all = get_proposals_for_job(&pool, job_id, None).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
