//! Field resolution: combines per-provider metadata snapshots into one
//! consolidated snapshot according to the user's per-field provider chains.
//!
//! Three distinct rules coexist and must not be unified:
//!
//! - Primary scalar fields walk the chain in fixed P4 -> P3 -> P2 -> P1 order,
//!   every present value overwriting the last, so the most-trusted provider
//!   that answered wins.
//! - Set-valued fields (authors, categories outside merge mode) use an
//!   asymmetric rule: P4 and P3 overwrite the running set whenever non-empty,
//!   P2 and P1 only fill it while still empty. The asymmetry is pinned by a
//!   regression test below.
//! - Secondary fields ignore per-field chains entirely and fill from the
//!   job-wide AllP4 -> AllP1 bands, first-applicable-wins.
//!
//! Everything here is pure; the engine owns all I/O.

use std::collections::HashMap;

use crate::model::FieldLocks;
use crate::reconcile::domain::{MetadataSnapshot, ProviderChain, ProviderId, RefreshOptions};

/// Combine one book's provider result map into a consolidated snapshot.
///
/// Locked fields are left unset in the output regardless of what any
/// provider returned.
pub fn consolidate(
    results: &HashMap<ProviderId, MetadataSnapshot>,
    options: &RefreshOptions,
    locks: &FieldLocks,
) -> MetadataSnapshot {
    let fields = &options.field_options;
    let mut out = MetadataSnapshot {
        title: resolve_scalar(&fields.title, results, |s| s.title.clone()),
        description: resolve_scalar(&fields.description, results, |s| s.description.clone()),
        cover_url: resolve_scalar(&fields.cover, results, |s| s.cover_url.clone()),
        authors: resolve_set(&fields.authors, results, |s| &s.authors),
        categories: if options.merge_categories {
            merge_sets(&fields.categories, results, |s| &s.categories)
        } else {
            resolve_set(&fields.categories, results, |s| &s.categories)
        },
        ..Default::default()
    };

    // Identifier fields are direct-mapped: each comes only from its own
    // provider's result, never through a chain.
    out.google_id = results
        .get(&ProviderId::Google)
        .and_then(|s| s.google_id.clone());
    out.goodreads_id = results
        .get(&ProviderId::GoodReads)
        .and_then(|s| s.goodreads_id.clone());
    out.hardcover_id = results
        .get(&ProviderId::Hardcover)
        .and_then(|s| s.hardcover_id.clone());
    out.comicvine_id = results
        .get(&ProviderId::Comicvine)
        .and_then(|s| s.comicvine_id.clone());

    fill_secondary(&mut out, options, results);
    clear_locked(&mut out, locks);
    out
}

/// Primary scalar cascade: evaluate P4 -> P3 -> P2 -> P1; each provider with
/// a value overwrites the running result.
fn resolve_scalar<T>(
    chain: &ProviderChain,
    results: &HashMap<ProviderId, MetadataSnapshot>,
    extract: impl Fn(&MetadataSnapshot) -> Option<T>,
) -> Option<T> {
    let mut value = None;
    for provider in chain.evaluation_order().into_iter().flatten() {
        if let Some(snapshot) = results.get(&provider)
            && let Some(v) = extract(snapshot)
        {
            value = Some(v);
        }
    }
    value
}

/// Set-valued rule outside merge mode.
///
/// P4 and P3 replace the running set whenever they produced anything; P2 and
/// P1 are applied only while the running set is still empty.
fn resolve_set(
    chain: &ProviderChain,
    results: &HashMap<ProviderId, MetadataSnapshot>,
    extract: impl Fn(&MetadataSnapshot) -> &[String],
) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for provider in [chain.p4, chain.p3].into_iter().flatten() {
        if let Some(snapshot) = results.get(&provider) {
            let values = extract(snapshot);
            if !values.is_empty() {
                result = values.to_vec();
            }
        }
    }
    for provider in [chain.p2, chain.p1].into_iter().flatten() {
        if result.is_empty()
            && let Some(snapshot) = results.get(&provider)
        {
            let values = extract(snapshot);
            if !values.is_empty() {
                result = values.to_vec();
            }
        }
    }

    result
}

/// Merge mode: the union of every configured provider's values,
/// first-seen order, duplicates removed.
fn merge_sets(
    chain: &ProviderChain,
    results: &HashMap<ProviderId, MetadataSnapshot>,
    extract: impl Fn(&MetadataSnapshot) -> &[String],
) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for provider in chain.providers() {
        if let Some(snapshot) = results.get(&provider) {
            for value in extract(snapshot) {
                if !merged.contains(value) {
                    merged.push(value.clone());
                }
            }
        }
    }
    merged
}

/// Secondary fields: one pass over the global bands AllP4 -> AllP1, filling
/// each field still unset. First band that answers wins.
fn fill_secondary(
    out: &mut MetadataSnapshot,
    options: &RefreshOptions,
    results: &HashMap<ProviderId, MetadataSnapshot>,
) {
    for band in [options.all_p4, options.all_p3, options.all_p2, options.all_p1]
        .into_iter()
        .flatten()
    {
        let Some(snapshot) = results.get(&band) else {
            continue;
        };
        if out.subtitle.is_none() {
            out.subtitle = snapshot.subtitle.clone();
        }
        if out.publisher.is_none() {
            out.publisher = snapshot.publisher.clone();
        }
        if out.published_date.is_none() {
            out.published_date = snapshot.published_date;
        }
        if out.isbn10.is_none() {
            out.isbn10 = snapshot.isbn10.clone();
        }
        if out.isbn13.is_none() {
            out.isbn13 = snapshot.isbn13.clone();
        }
        if out.page_count.is_none() {
            out.page_count = snapshot.page_count;
        }
        if out.language.is_none() {
            out.language = snapshot.language.clone();
        }
        if out.rating.is_none() {
            out.rating = snapshot.rating;
        }
        if out.review_count.is_none() {
            out.review_count = snapshot.review_count;
        }
        if out.series_name.is_none() {
            out.series_name = snapshot.series_name.clone();
        }
        if out.series_number.is_none() {
            out.series_number = snapshot.series_number;
        }
        if out.series_total.is_none() {
            out.series_total = snapshot.series_total;
        }
    }
}

/// Strip anything resolved for a locked field so it can never reach the book.
fn clear_locked(out: &mut MetadataSnapshot, locks: &FieldLocks) {
    if locks.title {
        out.title = None;
    }
    if locks.subtitle {
        out.subtitle = None;
    }
    if locks.description {
        out.description = None;
    }
    if locks.publisher {
        out.publisher = None;
    }
    if locks.published_date {
        out.published_date = None;
    }
    if locks.isbn10 {
        out.isbn10 = None;
    }
    if locks.isbn13 {
        out.isbn13 = None;
    }
    if locks.page_count {
        out.page_count = None;
    }
    if locks.language {
        out.language = None;
    }
    if locks.rating {
        out.rating = None;
    }
    if locks.review_count {
        out.review_count = None;
    }
    if locks.series_name {
        out.series_name = None;
    }
    if locks.series_number {
        out.series_number = None;
    }
    if locks.series_total {
        out.series_total = None;
    }
    if locks.authors {
        out.authors.clear();
    }
    if locks.categories {
        out.categories.clear();
    }
    if locks.cover {
        out.cover_url = None;
    }
}
