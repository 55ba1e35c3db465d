//! Converts Google Books DTOs into our domain [`MetadataSnapshot`].

use chrono::NaiveDate;

use super::dto;
use crate::reconcile::domain::MetadataSnapshot;

/// Convert one volume into a snapshot.
pub fn to_snapshot(volume: dto::Volume) -> MetadataSnapshot {
    let info = volume.volume_info;

    let mut isbn10 = None;
    let mut isbn13 = None;
    for identifier in info.industry_identifiers {
        match identifier.kind.as_str() {
            "ISBN_10" => isbn10 = Some(identifier.identifier),
            "ISBN_13" => isbn13 = Some(identifier.identifier),
            _ => {}
        }
    }

    MetadataSnapshot {
        title: info.title,
        subtitle: info.subtitle,
        description: info.description,
        publisher: info.publisher,
        published_date: info.published_date.as_deref().and_then(parse_published_date),
        isbn10,
        isbn13,
        page_count: info.page_count,
        language: info.language,
        rating: info.average_rating,
        review_count: info.ratings_count,
        authors: info.authors,
        categories: info.categories,
        cover_url: info
            .image_links
            .and_then(|links| links.thumbnail.or(links.small_thumbnail)),
        google_id: Some(volume.id),
        ..Default::default()
    }
}

/// Google dates come with year, year-month, or full precision; missing parts
/// default to the first day/month.
fn parse_published_date(raw: &str) -> Option<NaiveDate> {
    let mut parts = raw.splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next().map_or(Some(1), |m| m.parse().ok())?;
    let day: u32 = parts.next().map_or(Some(1), |d| d.parse().ok())?;
    NaiveDate::from_ymd_opt(year, month, day)
}
