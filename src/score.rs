//! Metadata completeness scoring.
//!
//! A book's score is the weighted share of populated metadata fields,
//! expressed as 0-100. Core bibliographic fields weigh more than the
//! long-tail ones, so a book with title, authors, description, and a cover
//! scores well even when series data is absent.

use crate::model::BookMetadata;

/// Field weights. The denominator is their sum, so the weights only matter
/// relative to one another.
const WEIGHTS: &[(u32, fn(&BookMetadata) -> bool)] = &[
    (10, |m| m.title.is_some()),
    (10, |m| !m.authors.is_empty()),
    (8, |m| m.description.is_some()),
    (8, |m| m.cover_path.is_some()),
    (5, |m| m.publisher.is_some()),
    (5, |m| m.published_date.is_some()),
    (5, |m| m.isbn13.is_some() || m.isbn10.is_some()),
    (4, |m| !m.categories.is_empty()),
    (3, |m| m.page_count.is_some()),
    (3, |m| m.language.is_some()),
    (2, |m| m.rating.is_some()),
    (2, |m| m.subtitle.is_some()),
    (2, |m| m.series_name.is_some()),
];

/// Score metadata completeness from 0 (nothing) to 100 (every field set).
pub fn completeness(metadata: &BookMetadata) -> f64 {
    let total: u32 = WEIGHTS.iter().map(|(w, _)| w).sum();
    let earned: u32 = WEIGHTS
        .iter()
        .filter(|(_, present)| present(metadata))
        .map(|(w, _)| w)
        .sum();
    f64::from(earned) * 100.0 / f64::from(total)
}
