//! Provider clients for external bibliographic sources.
//!
//! Each source gets a client implementing [`MetadataProvider`]; the engine
//! only ever sees the trait and the [`ProviderRegistry`] strategy map, so
//! adding a source never touches the reconciliation logic. Scraper-backed
//! sources (Amazon, GoodReads) live outside this crate and are registered by
//! the embedding application; the Google Books client ships here.

pub mod google;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::reconcile::domain::{MetadataSnapshot, ProviderId, QueryHints};
use crate::reconcile::throttle::RateLimiter;

/// Errors a provider call can produce.
///
/// The engine swallows all of these at the fan-out call site; a failing
/// provider simply contributes nothing to the result map.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API request failed: {0}")]
    Api(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("rate limited - try again later")]
    RateLimited,
}

/// One external bibliographic source.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Which provider this client speaks for.
    fn id(&self) -> ProviderId;

    /// Fetch the best-matching metadata snapshot for one book, or None when
    /// the source has no match.
    async fn fetch_top(&self, hints: &QueryHints) -> Result<Option<MetadataSnapshot>, ProviderError>;
}

/// Strategy map from provider id to client, fixed at construction time.
///
/// A provider may also carry a [`RateLimiter`] that callers must acquire
/// before each request.
#[derive(Default)]
pub struct ProviderRegistry {
    clients: HashMap<ProviderId, Arc<dyn MetadataProvider>>,
    limiters: HashMap<ProviderId, Arc<RateLimiter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client for its provider id.
    pub fn register(&mut self, client: Arc<dyn MetadataProvider>) {
        self.clients.insert(client.id(), client);
    }

    /// Register a client together with a throttle for its source.
    pub fn register_with_limiter(&mut self, client: Arc<dyn MetadataProvider>, limiter: RateLimiter) {
        self.limiters.insert(client.id(), Arc::new(limiter));
        self.register(client);
    }

    pub fn get(&self, id: ProviderId) -> Option<Arc<dyn MetadataProvider>> {
        self.clients.get(&id).cloned()
    }

    pub fn limiter(&self, id: ProviderId) -> Option<Arc<RateLimiter>> {
        self.limiters.get(&id).cloned()
    }
}
