//! Google Books HTTP client
//!
//! Queries the public volumes endpoint. An API key is optional but raises
//! the quota considerably.
//! See: https://developers.google.com/books/docs/v1/using

use async_trait::async_trait;

use super::{adapter, dto};
use crate::reconcile::domain::{MetadataSnapshot, ProviderId, QueryHints};
use crate::reconcile::providers::{MetadataProvider, ProviderError};

/// User agent string sent with every request
const USER_AGENT: &str = concat!("BookMinder/", env!("CARGO_PKG_VERSION"));

/// Google Books API client
pub struct GoogleBooksClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleBooksClient {
    /// Create a new client, optionally with an API key.
    pub fn new(api_key: Option<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http_client,
            base_url: "https://www.googleapis.com/books/v1".to_string(),
            api_key,
        }
    }

    /// Create a client for testing with custom base URL
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http_client,
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// Build the `q` search term: an exact ISBN query when we have one,
    /// otherwise title and author terms. None when there is nothing to ask.
    fn search_term(hints: &QueryHints) -> Option<String> {
        if let Some(isbn) = &hints.isbn {
            return Some(format!("isbn:{isbn}"));
        }

        let mut terms = Vec::new();
        if let Some(title) = &hints.title {
            terms.push(format!("intitle:{title}"));
        }
        if let Some(author) = &hints.author {
            terms.push(format!("inauthor:{author}"));
        }
        if terms.is_empty() {
            None
        } else {
            Some(terms.join("+"))
        }
    }

    async fn send_volumes_request(
        &self,
        term: &str,
    ) -> Result<dto::VolumesResponse, ProviderError> {
        let mut url = format!(
            "{}/volumes?q={}&maxResults=1",
            self.base_url,
            urlencoding::encode(term)
        );
        if let Some(key) = &self.api_key {
            url.push_str("&key=");
            url.push_str(key);
        }

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }

        if !status.is_success() {
            // Try to parse the error envelope
            if let Ok(error) = response.json::<dto::ApiError>().await {
                return Err(ProviderError::Api(error.error.message));
            }
            return Err(ProviderError::Network(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .json::<dto::VolumesResponse>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

#[async_trait]
impl MetadataProvider for GoogleBooksClient {
    fn id(&self) -> ProviderId {
        ProviderId::Google
    }

    async fn fetch_top(&self, hints: &QueryHints) -> Result<Option<MetadataSnapshot>, ProviderError> {
        let Some(term) = Self::search_term(hints) else {
            return Ok(None);
        };

        let response = self.send_volumes_request(&term).await?;
        Ok(response.items.into_iter().next().map(adapter::to_snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GoogleBooksClient::new(None);
        assert_eq!(client.base_url, "https://www.googleapis.com/books/v1");
    }

    #[test]
    fn test_client_with_custom_url() {
        let client = GoogleBooksClient::with_base_url("http://localhost:8080");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_search_term_prefers_isbn() {
        let hints = QueryHints {
            title: Some("Dune".to_string()),
            author: Some("Frank Herbert".to_string()),
            isbn: Some("9780441172719".to_string()),
        };
        assert_eq!(
            GoogleBooksClient::search_term(&hints).as_deref(),
            Some("isbn:9780441172719")
        );
    }

    #[test]
    fn test_search_term_title_and_author() {
        let hints = QueryHints {
            title: Some("Dune".to_string()),
            author: Some("Frank Herbert".to_string()),
            isbn: None,
        };
        assert_eq!(
            GoogleBooksClient::search_term(&hints).as_deref(),
            Some("intitle:Dune+inauthor:Frank Herbert")
        );
    }

    #[test]
    fn test_search_term_empty_hints() {
        assert_eq!(GoogleBooksClient::search_term(&QueryHints::default()), None);
    }
}
