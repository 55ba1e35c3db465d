//! Review-queue surface over refresh jobs and proposals.
//!
//! The engine writes jobs and proposals; this module is what the review UI
//! talks to: active-job summaries, the pending queue for one job, and the
//! accept/reject transition. Reviewing a proposal only records the decision;
//! it does not write the proposed metadata to the book.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db;
use crate::model::{JobStatus, Proposal, ProposalStatus, RefreshJob};
use crate::reconcile::domain::ReconcileError;

/// One row of the active-jobs summary.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveJob {
    pub job: JobSummary,
    /// Proposals still awaiting a decision (rejected ones are not counted).
    pub remaining: i64,
    pub message: String,
}

/// Job fields the summary exposes.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: i64,
    pub status: JobStatus,
    pub total_books: i64,
    pub completed_books: i64,
}

/// Read/review operations over the job and proposal tables.
pub struct TaskTracker {
    pool: SqlitePool,
}

impl TaskTracker {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A job together with its still-pending proposals.
    pub async fn get_job_with_proposals(
        &self,
        job_id: i64,
    ) -> Result<(RefreshJob, Vec<Proposal>), ReconcileError> {
        let job = db::jobs::get_job(&self.pool, job_id)
            .await?
            .ok_or(ReconcileError::JobNotFound(job_id))?;
        let proposals =
            db::jobs::get_proposals_for_job(&self.pool, job_id, Some(ProposalStatus::Fetched))
                .await?;
        Ok((job, proposals))
    }

    /// Jobs that still need attention: in progress, or with proposals
    /// awaiting review. Fully reviewed completed jobs are omitted.
    pub async fn get_active_jobs(&self) -> Result<Vec<ActiveJob>, ReconcileError> {
        let jobs = db::jobs::get_all_jobs(&self.pool).await?;
        let mut active = Vec::new();

        for job in jobs {
            let (reviewable, accepted) = db::jobs::proposal_counts(&self.pool, job.id).await?;
            let remaining = reviewable - accepted;

            if job.status != JobStatus::InProgress && remaining == 0 {
                continue;
            }

            let message = match job.status {
                JobStatus::InProgress => {
                    format!("Fetching {} of {} books", job.completed_books, job.total_books)
                }
                _ => format!("{remaining} of {reviewable} pending review"),
            };
            active.push(ActiveJob {
                job: JobSummary {
                    id: job.id,
                    status: job.status,
                    total_books: job.total_books,
                    completed_books: job.completed_books,
                },
                remaining,
                message,
            });
        }

        Ok(active)
    }

    /// Record a review decision on a proposal.
    ///
    /// Returns false instead of failing for any caller mistake: an
    /// unparseable status, an unknown proposal, or a proposal that does not
    /// belong to `job_id`.
    pub async fn update_proposal_status(
        &self,
        job_id: i64,
        proposal_id: i64,
        status: &str,
        reviewer_user_id: i64,
    ) -> Result<bool, ReconcileError> {
        let Ok(status) = status.parse::<ProposalStatus>() else {
            warn!(proposal_id, status, "unknown proposal status in review request");
            return Ok(false);
        };

        let Some(proposal) = db::jobs::get_proposal(&self.pool, proposal_id).await? else {
            warn!(proposal_id, "proposal not found");
            return Ok(false);
        };
        if proposal.job_id != job_id {
            warn!(proposal_id, job_id, actual_job = proposal.job_id, "job mismatch in review request");
            return Ok(false);
        }
        // The Fetched -> {Accepted, Rejected} transition is terminal; a
        // reviewed proposal cannot be flipped or reset.
        if proposal.status != ProposalStatus::Fetched {
            warn!(proposal_id, current = %proposal.status, "proposal already reviewed");
            return Ok(false);
        }

        db::jobs::review_proposal(&self.pool, proposal_id, status, reviewer_user_id).await?;
        info!(proposal_id, %status, reviewer_user_id, "proposal reviewed");
        Ok(true)
    }

    /// Delete a job and its proposals. False when the job does not exist.
    pub async fn delete_job(&self, job_id: i64) -> Result<bool, ReconcileError> {
        Ok(db::jobs::delete_job(&self.pool, job_id).await?)
    }
}
