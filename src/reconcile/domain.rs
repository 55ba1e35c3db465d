//! Internal domain models for metadata reconciliation.
//!
//! These types are OUR types - they don't change when external provider APIs
//! change. Provider responses get converted into [`MetadataSnapshot`] via
//! per-provider adapters.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::Book;

/// An external bibliographic data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Amazon,
    Google,
    GoodReads,
    Hardcover,
    Comicvine,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Amazon => "amazon",
            ProviderId::Google => "google",
            ProviderId::GoodReads => "goodreads",
            ProviderId::Hardcover => "hardcover",
            ProviderId::Comicvine => "comicvine",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "amazon" => Ok(ProviderId::Amazon),
            "google" => Ok(ProviderId::Google),
            "goodreads" => Ok(ProviderId::GoodReads),
            "hardcover" => Ok(ProviderId::Hardcover),
            "comicvine" => Ok(ProviderId::Comicvine),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Search hints handed to a provider when looking up one book.
#[derive(Debug, Clone, Default)]
pub struct QueryHints {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
}

impl QueryHints {
    /// Build hints from a book's current metadata. ISBN-13 is preferred over
    /// ISBN-10 when both are present.
    pub fn from_book(book: &Book) -> Self {
        Self {
            title: book.metadata.title.clone(),
            author: book.metadata.authors.first().cloned(),
            isbn: book
                .metadata
                .isbn13
                .clone()
                .or_else(|| book.metadata.isbn10.clone()),
        }
    }
}

/// One provider's answer for one book, and also the shape of the consolidated
/// value bag produced by the field resolver.
///
/// `cover_url` is a remote thumbnail URL; it only becomes a local
/// `cover_path` once the metadata writer downloads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSnapshot {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub page_count: Option<u32>,
    pub language: Option<String>,
    pub rating: Option<f32>,
    pub review_count: Option<u32>,
    pub series_name: Option<String>,
    pub series_number: Option<f32>,
    pub series_total: Option<u32>,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub cover_url: Option<String>,
    pub google_id: Option<String>,
    pub goodreads_id: Option<String>,
    pub hardcover_id: Option<String>,
    pub comicvine_id: Option<String>,
}

/// Explicitly supplied lock changes, applied before any value write.
///
/// `None` leaves the flag alone; lock flags are settable independently of the
/// values they guard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockUpdates {
    pub title: Option<bool>,
    pub subtitle: Option<bool>,
    pub description: Option<bool>,
    pub publisher: Option<bool>,
    pub published_date: Option<bool>,
    pub isbn10: Option<bool>,
    pub isbn13: Option<bool>,
    pub page_count: Option<bool>,
    pub language: Option<bool>,
    pub rating: Option<bool>,
    pub review_count: Option<bool>,
    pub series_name: Option<bool>,
    pub series_number: Option<bool>,
    pub series_total: Option<bool>,
    pub authors: Option<bool>,
    pub categories: Option<bool>,
    pub cover: Option<bool>,
}

/// The single merged result produced for one book in one run, serialized
/// verbatim into a proposal in review mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidatedMetadata {
    pub snapshot: MetadataSnapshot,
    pub lock_updates: LockUpdates,
}

/// An ordered, per-field list of up to four preferred providers.
///
/// P1 denotes the most-trusted source for the field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderChain {
    pub p1: Option<ProviderId>,
    pub p2: Option<ProviderId>,
    pub p3: Option<ProviderId>,
    pub p4: Option<ProviderId>,
}

impl ProviderChain {
    /// Chain with only the most-trusted slot filled.
    pub fn single(provider: ProviderId) -> Self {
        Self {
            p1: Some(provider),
            ..Default::default()
        }
    }

    /// The fixed evaluation order of the resolver: P4, P3, P2, P1.
    ///
    /// Later entries overwrite earlier ones, which is how P1 ends up winning
    /// whenever it produced a value.
    pub fn evaluation_order(&self) -> [Option<ProviderId>; 4] {
        [self.p4, self.p3, self.p2, self.p1]
    }

    /// Every configured provider in the chain.
    pub fn providers(&self) -> impl Iterator<Item = ProviderId> {
        [self.p1, self.p2, self.p3, self.p4].into_iter().flatten()
    }
}

/// Per-field provider chains for the primary fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldOptions {
    pub title: ProviderChain,
    pub description: ProviderChain,
    pub authors: ProviderChain,
    pub categories: ProviderChain,
    pub cover: ProviderChain,
}

/// Options governing one batch refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshOptions {
    /// Stage results as proposals instead of applying them.
    pub review_before_apply: bool,
    /// Union resolved categories with existing ones instead of replacing.
    pub merge_categories: bool,
    /// Allow the cover to be replaced from a provider thumbnail.
    pub refresh_covers: bool,
    pub field_options: FieldOptions,
    /// Global provider bands for the secondary (unchained) fields.
    pub all_p1: Option<ProviderId>,
    pub all_p2: Option<ProviderId>,
    pub all_p3: Option<ProviderId>,
    pub all_p4: Option<ProviderId>,
}

impl RefreshOptions {
    /// The minimal distinct set of providers this refresh needs: the union of
    /// every configured chain entry and global band.
    pub fn resolved_providers(&self) -> BTreeSet<ProviderId> {
        let f = &self.field_options;
        [&f.title, &f.description, &f.authors, &f.categories, &f.cover]
            .into_iter()
            .flat_map(|chain| chain.providers())
            .chain([self.all_p1, self.all_p2, self.all_p3, self.all_p4].into_iter().flatten())
            .collect()
    }

    /// System defaults substituted by the `quick` flag: one trusted provider
    /// drives every field and the secondary band.
    pub fn quick_defaults(provider: ProviderId, review_before_apply: bool) -> Self {
        let chain = ProviderChain::single(provider);
        Self {
            review_before_apply,
            refresh_covers: true,
            field_options: FieldOptions {
                title: chain,
                description: chain,
                authors: chain,
                categories: chain,
                cover: chain,
            },
            all_p1: Some(provider),
            ..Default::default()
        }
    }
}

/// Which books one refresh targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum RefreshSelection {
    Library { library_id: i64 },
    Books { book_ids: Vec<i64> },
}

/// A full refresh request as received from the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub selection: RefreshSelection,
    /// Substitute system-default field options.
    #[serde(default)]
    pub quick: bool,
    #[serde(default)]
    pub options: RefreshOptions,
}

/// Errors that can occur during reconciliation.
///
/// Provider failures never appear here: they are swallowed at the fan-out
/// call site. These are the errors that can fail a book or a whole job.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("backup error: {0}")]
    Backup(#[from] std::io::Error),

    #[error("invalid refresh selection: {0}")]
    InvalidSelection(String),

    #[error("no providers configured for any field")]
    NoProviders,

    #[error("refresh job not found: {0}")]
    JobNotFound(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse_case_insensitive() {
        assert_eq!("Google".parse(), Ok(ProviderId::Google));
        assert_eq!("GOODREADS".parse(), Ok(ProviderId::GoodReads));
        assert!("librarything".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_resolved_providers_unions_chains_and_bands() {
        let options = RefreshOptions {
            field_options: FieldOptions {
                title: ProviderChain {
                    p1: Some(ProviderId::Google),
                    p3: Some(ProviderId::Amazon),
                    ..Default::default()
                },
                categories: ProviderChain::single(ProviderId::Comicvine),
                ..Default::default()
            },
            all_p2: Some(ProviderId::GoodReads),
            ..Default::default()
        };

        let providers = options.resolved_providers();
        assert_eq!(
            providers.into_iter().collect::<Vec<_>>(),
            vec![
                ProviderId::Amazon,
                ProviderId::Google,
                ProviderId::GoodReads,
                ProviderId::Comicvine,
            ]
        );
    }

    #[test]
    fn test_quick_defaults_cover_every_field() {
        let options = RefreshOptions::quick_defaults(ProviderId::Google, true);
        assert!(options.review_before_apply);
        assert_eq!(options.field_options.cover.p1, Some(ProviderId::Google));
        assert_eq!(options.all_p1, Some(ProviderId::Google));
        assert_eq!(
            options.resolved_providers().into_iter().collect::<Vec<_>>(),
            vec![ProviderId::Google]
        );
    }

    #[test]
    fn test_selection_json_shape() {
        let selection: RefreshSelection =
            serde_json::from_str(r#"{"type":"BOOKS","book_ids":[42]}"#).unwrap();
        assert_eq!(selection, RefreshSelection::Books { book_ids: vec![42] });

        let selection: RefreshSelection =
            serde_json::from_str(r#"{"type":"LIBRARY","library_id":3}"#).unwrap();
        assert_eq!(selection, RefreshSelection::Library { library_id: 3 });
    }

    #[test]
    fn test_query_hints_prefer_isbn13() {
        let book = Book {
            id: 1,
            library_id: 1,
            file_path: "/b.epub".to_string(),
            metadata: crate::model::BookMetadata {
                title: Some("Dune".to_string()),
                isbn10: Some("0441172717".to_string()),
                isbn13: Some("9780441172719".to_string()),
                ..Default::default()
            },
            metadata_score: None,
        };
        let hints = QueryHints::from_book(&book);
        assert_eq!(hints.isbn.as_deref(), Some("9780441172719"));
    }
}
