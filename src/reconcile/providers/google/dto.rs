//! Google Books API response shapes.
//!
//! These structs mirror the JSON of the volumes endpoint exactly and never
//! leak past the adapter.

use serde::Deserialize;

/// Top-level response of `GET /books/v1/volumes?q=...`.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct VolumesResponse {
    #[serde(rename = "totalItems")]
    pub total_items: i64,
    pub items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
pub struct Volume {
    pub id: String,
    #[serde(rename = "volumeInfo", default)]
    pub volume_info: VolumeInfo,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct VolumeInfo {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    /// Fuzzy precision: "YYYY", "YYYY-MM", or "YYYY-MM-DD"
    pub published_date: Option<String>,
    pub description: Option<String>,
    pub industry_identifiers: Vec<IndustryIdentifier>,
    pub page_count: Option<u32>,
    pub categories: Vec<String>,
    pub average_rating: Option<f32>,
    pub ratings_count: Option<u32>,
    pub language: Option<String>,
    pub image_links: Option<ImageLinks>,
}

#[derive(Debug, Deserialize)]
pub struct IndustryIdentifier {
    /// "ISBN_10", "ISBN_13", or "OTHER"
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageLinks {
    pub small_thumbnail: Option<String>,
    pub thumbnail: Option<String>,
}

/// Error envelope returned on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: i64,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "totalItems": 1,
        "items": [{
            "id": "B1MOAAAAMAAJ",
            "volumeInfo": {
                "title": "Dune",
                "authors": ["Frank Herbert"],
                "publisher": "Chilton Books",
                "publishedDate": "1965",
                "description": "Melange.",
                "industryIdentifiers": [
                    {"type": "ISBN_10", "identifier": "0441172717"},
                    {"type": "ISBN_13", "identifier": "9780441172719"}
                ],
                "pageCount": 412,
                "categories": ["Fiction"],
                "averageRating": 4.5,
                "ratingsCount": 5000,
                "language": "en",
                "imageLinks": {"thumbnail": "http://books.google.com/thumb.jpg"}
            }
        }]
    }"#;

    #[test]
    fn test_parse_volumes_response() {
        let response: VolumesResponse = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(response.total_items, 1);

        let info = &response.items[0].volume_info;
        assert_eq!(info.title.as_deref(), Some("Dune"));
        assert_eq!(info.authors, vec!["Frank Herbert".to_string()]);
        assert_eq!(info.page_count, Some(412));
        assert_eq!(info.industry_identifiers.len(), 2);
        assert_eq!(
            info.image_links.as_ref().unwrap().thumbnail.as_deref(),
            Some("http://books.google.com/thumb.jpg")
        );
    }

    #[test]
    fn test_parse_empty_response() {
        let response: VolumesResponse = serde_json::from_str(r#"{"totalItems":0}"#).unwrap();
        assert!(response.items.is_empty());
    }

    #[test]
    fn test_parse_api_error() {
        let error: ApiError = serde_json::from_str(
            r#"{"error":{"code":429,"message":"Quota exceeded"}}"#,
        )
        .unwrap();
        assert_eq!(error.error.code, 429);
        assert_eq!(error.error.message, "Quota exceeded");
    }
}
