//! Core data models for the book library.
//!
//! Defines the primary entities: [`Book`] with its [`BookMetadata`], the
//! [`RefreshJob`] batch record, and the [`Proposal`] review record.
//!
//! # Database Schema
//!
//! The models map to the following tables:
//! - `books` - one row per library file; metadata is a JSON column
//! - `refresh_jobs` - one row per review-mode batch refresh
//! - `proposals` - fetched-but-unapplied metadata snapshots awaiting review

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A book in the library.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Library this book belongs to
    pub library_id: i64,
    /// Absolute file path (unique identifier)
    pub file_path: String,
    /// Reconciled metadata record
    pub metadata: BookMetadata,
    /// Completeness score (0-100), recomputed on every metadata write
    pub metadata_score: Option<f64>,
}

/// The persisted metadata record being reconciled.
///
/// Every field has an independent lock flag in [`FieldLocks`]; a locked field
/// is never written by the automatic reconciliation path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookMetadata {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub page_count: Option<u32>,
    pub language: Option<String>,
    /// Average rating (0.0-5.0)
    pub rating: Option<f32>,
    pub review_count: Option<u32>,
    pub series_name: Option<String>,
    /// Position within the series; fractional for interstitial volumes
    pub series_number: Option<f32>,
    pub series_total: Option<u32>,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    /// Path of the locally stored cover image
    pub cover_path: Option<String>,
    /// External database identifiers, each taken directly from its own provider
    pub google_id: Option<String>,
    pub goodreads_id: Option<String>,
    pub hardcover_id: Option<String>,
    pub comicvine_id: Option<String>,
    pub locks: FieldLocks,
}

/// Per-field lock flags.
///
/// A `true` flag forbids any automatic write to that field regardless of
/// source. Identifier fields are not lockable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldLocks {
    pub title: bool,
    pub subtitle: bool,
    pub description: bool,
    pub publisher: bool,
    pub published_date: bool,
    pub isbn10: bool,
    pub isbn13: bool,
    pub page_count: bool,
    pub language: bool,
    pub rating: bool,
    pub review_count: bool,
    pub series_name: bool,
    pub series_number: bool,
    pub series_total: bool,
    pub authors: bool,
    pub categories: bool,
    pub cover: bool,
}

impl FieldLocks {
    /// True when every lockable field is locked, i.e. a refresh can do nothing.
    pub fn all_locked(&self) -> bool {
        self.title
            && self.subtitle
            && self.description
            && self.publisher
            && self.published_date
            && self.isbn10
            && self.isbn13
            && self.page_count
            && self.language
            && self.rating
            && self.review_count
            && self.series_name
            && self.series_number
            && self.series_total
            && self.authors
            && self.categories
            && self.cover
    }

    /// Lock every field.
    pub fn locked() -> Self {
        Self {
            title: true,
            subtitle: true,
            description: true,
            publisher: true,
            published_date: true,
            isbn10: true,
            isbn13: true,
            page_count: true,
            language: true,
            rating: true,
            review_count: true,
            series_name: true,
            series_number: true,
            series_total: true,
            authors: true,
            categories: true,
            cover: true,
        }
    }
}

/// One batch invocation of the reconciliation engine (review mode only).
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshJob {
    pub id: i64,
    /// User who started the batch
    pub user_id: i64,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_books: i64,
    /// Monotonically non-decreasing, always <= total_books
    pub completed_books: i64,
    /// Failure message when status is Error
    pub error: Option<String>,
}

/// Refresh job lifecycle. Completed and Error are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "in_progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "error" => Ok(JobStatus::Error),
            _ => Err(()),
        }
    }
}

/// A fetched-but-unapplied consolidated metadata snapshot awaiting review.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub id: i64,
    /// Owning refresh job
    pub job_id: i64,
    pub book_id: i64,
    /// Serialized `ConsolidatedMetadata` JSON
    pub metadata: String,
    pub status: ProposalStatus,
    pub fetched_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewer_user_id: Option<i64>,
}

/// Proposal lifecycle: a single Fetched -> Accepted|Rejected transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Fetched,
    Accepted,
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Fetched => "fetched",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = ();

    /// Case-insensitive, so review API callers can send "ACCEPTED" or "accepted".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fetched" => Ok(ProposalStatus::Fetched),
            "accepted" => Ok(ProposalStatus::Accepted),
            "rejected" => Ok(ProposalStatus::Rejected),
            _ => Err(()),
        }
    }
}

impl Book {
    /// Best human-readable name for progress messages.
    pub fn display_title(&self) -> &str {
        self.metadata
            .title
            .as_deref()
            .unwrap_or(self.file_path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_locked() {
        let mut locks = FieldLocks::locked();
        assert!(locks.all_locked());

        locks.description = false;
        assert!(!locks.all_locked());

        assert!(!FieldLocks::default().all_locked());
    }

    #[test]
    fn test_proposal_status_parse_case_insensitive() {
        assert_eq!("ACCEPTED".parse(), Ok(ProposalStatus::Accepted));
        assert_eq!("Rejected".parse(), Ok(ProposalStatus::Rejected));
        assert_eq!("fetched".parse(), Ok(ProposalStatus::Fetched));
        assert!("approved".parse::<ProposalStatus>().is_err());
    }

    #[test]
    fn test_metadata_json_roundtrip() {
        let meta = BookMetadata {
            title: Some("Dune".to_string()),
            authors: vec!["Frank Herbert".to_string()],
            published_date: NaiveDate::from_ymd_opt(1965, 8, 1),
            locks: FieldLocks {
                title: true,
                ..Default::default()
            },
            ..Default::default()
        };

        let json = serde_json::to_string(&meta).unwrap();
        let parsed: BookMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn test_metadata_partial_json_uses_defaults() {
        let meta: BookMetadata = serde_json::from_str(r#"{"title":"Dune"}"#).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Dune"));
        assert!(meta.authors.is_empty());
        assert!(!meta.locks.title);
    }

    #[test]
    fn test_display_title_falls_back_to_path() {
        let book = Book {
            id: 1,
            library_id: 1,
            file_path: "/books/unknown.epub".to_string(),
            metadata: BookMetadata::default(),
            metadata_score: None,
        };
        assert_eq!(book.display_title(), "/books/unknown.epub");
    }
}
