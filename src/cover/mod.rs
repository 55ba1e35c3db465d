//! Cover image download and storage.
//!
//! Provider snapshots carry remote thumbnail URLs; this module downloads
//! them, normalizes them to a bounded-size JPEG, and stores them under a
//! local covers directory. Every URL is validated before any connection is
//! made: provider responses are untrusted input, so URLs that point at
//! internal or non-routable addresses are refused outright.

use std::net::IpAddr;
use std::path::PathBuf;

use tokio::net::lookup_host;
use tracing::{debug, info};

/// Longest edge of a stored cover, in pixels.
const MAX_COVER_WIDTH: u32 = 500;
const MAX_COVER_HEIGHT: u32 = 750;

#[derive(Debug, thiserror::Error)]
pub enum CoverError {
    #[error("invalid cover URL: {0}")]
    InvalidUrl(String),

    #[error("refusing to fetch cover from {0}")]
    ForbiddenUrl(String),

    #[error("cover download failed: {0}")]
    Network(String),

    #[error("cover image could not be decoded: {0}")]
    Image(#[from] image::ImageError),

    #[error("cover storage failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Directory-backed store of book cover images.
pub struct CoverStore {
    http_client: reqwest::Client,
    dir: PathBuf,
}

impl CoverStore {
    pub fn new(http_client: reqwest::Client, dir: impl Into<PathBuf>) -> Self {
        Self {
            http_client,
            dir: dir.into(),
        }
    }

    /// Where a book's cover lives once stored.
    pub fn cover_path(&self, book_id: i64) -> PathBuf {
        self.dir.join(format!("{book_id}.jpg"))
    }

    /// Download a cover from `url`, resize it to fit the thumbnail bounds,
    /// and store it as the book's cover. Returns the stored path.
    pub async fn fetch_and_store(&self, book_id: i64, url: &str) -> Result<PathBuf, CoverError> {
        let url = validate_url(url).await?;

        debug!(book_id, url = %url, "downloading cover");
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| CoverError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoverError::Network(format!(
                "HTTP {} fetching cover",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CoverError::Network(e.to_string()))?;

        let decoded = image::load_from_memory(&bytes)?;
        let resized = decoded.thumbnail(MAX_COVER_WIDTH, MAX_COVER_HEIGHT);

        std::fs::create_dir_all(&self.dir)?;
        let path = self.cover_path(book_id);
        resized.save(&path)?;

        info!(book_id, path = %path.display(), "stored cover");
        Ok(path)
    }
}

/// Parse and vet a cover URL before any request is made.
///
/// Only http/https are allowed, and every address the host resolves to must
/// be publicly routable. Hostnames are resolved here so a DNS name pointing
/// at an internal address is caught the same way a raw IP literal is.
async fn validate_url(raw: &str) -> Result<reqwest::Url, CoverError> {
    let url = reqwest::Url::parse(raw).map_err(|e| CoverError::InvalidUrl(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(CoverError::ForbiddenUrl(raw.to_string()));
    }

    let Some(host) = url.host_str() else {
        return Err(CoverError::InvalidUrl("URL has no host".to_string()));
    };

    // IPv6 literals come back bracketed from host_str
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(addr) = literal.parse::<IpAddr>() {
        if is_forbidden_addr(addr) {
            return Err(CoverError::ForbiddenUrl(raw.to_string()));
        }
    } else {
        let port = url.port_or_known_default().unwrap_or(443);
        let addrs = lookup_host((host, port))
            .await
            .map_err(|e| CoverError::Network(e.to_string()))?;
        for addr in addrs {
            if is_forbidden_addr(addr.ip()) {
                return Err(CoverError::ForbiddenUrl(raw.to_string()));
            }
        }
    }

    Ok(url)
}

/// Addresses a cover URL must never resolve to.
fn is_forbidden_addr(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            // fc00::/7 unique-local, fe80::/10 link-local
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::path::Path;

    #[test]
    fn test_forbidden_v4_addresses() {
        assert!(is_forbidden_addr(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert!(is_forbidden_addr(IpAddr::V4(Ipv4Addr::UNSPECIFIED)));
        assert!(is_forbidden_addr(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))));
        assert!(is_forbidden_addr(IpAddr::V4(Ipv4Addr::new(172, 16, 0, 1))));
        assert!(is_forbidden_addr(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))));
        assert!(is_forbidden_addr(IpAddr::V4(Ipv4Addr::new(169, 254, 0, 1))));
    }

    #[test]
    fn test_public_v4_address_allowed() {
        assert!(!is_forbidden_addr(IpAddr::V4(Ipv4Addr::new(142, 250, 80, 46))));
    }

    #[test]
    fn test_forbidden_v6_addresses() {
        assert!(is_forbidden_addr(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert!(is_forbidden_addr(IpAddr::V6(Ipv6Addr::UNSPECIFIED)));
        // unique-local
        assert!(is_forbidden_addr(IpAddr::V6(
            "fd12:3456:789a::1".parse().unwrap()
        )));
        // link-local
        assert!(is_forbidden_addr(IpAddr::V6("fe80::1".parse().unwrap())));
    }

    #[test]
    fn test_public_v6_address_allowed() {
        assert!(!is_forbidden_addr(IpAddr::V6(
            "2607:f8b0:4004:c07::65".parse().unwrap()
        )));
    }

    #[tokio::test]
    async fn test_rejects_non_http_schemes() {
        let err = validate_url("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, CoverError::ForbiddenUrl(_)));

        let err = validate_url("ftp://example.com/cover.jpg").await.unwrap_err();
        assert!(matches!(err, CoverError::ForbiddenUrl(_)));
    }

    #[tokio::test]
    async fn test_rejects_loopback_literal() {
        let err = validate_url("http://127.0.0.1:8080/cover.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, CoverError::ForbiddenUrl(_)));

        let err = validate_url("http://[::1]/cover.jpg").await.unwrap_err();
        assert!(matches!(err, CoverError::ForbiddenUrl(_)));
    }

    #[tokio::test]
    async fn test_rejects_private_literal() {
        let err = validate_url("https://192.168.0.10/cover.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, CoverError::ForbiddenUrl(_)));
    }

    #[tokio::test]
    async fn test_rejects_garbage_url() {
        let err = validate_url("not a url").await.unwrap_err();
        assert!(matches!(err, CoverError::InvalidUrl(_)));
    }

    #[test]
    fn test_cover_path_layout() {
        let store = CoverStore::new(reqwest::Client::new(), "/covers");
        assert_eq!(store.cover_path(42), Path::new("/covers/42.jpg"));
    }
}
