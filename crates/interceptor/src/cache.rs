//! Session-scoped memoization of successful GET responses
//!
//! Entries live until the process exits or the application calls `clear`.
//! There is no TTL and writes do not evict related reads: a POST to
//! `/items` leaves a cached `GET /items` in place.

use std::collections::HashMap;

use reqwest::Method;
use tokio::sync::RwLock;
use tracing::debug;

use crate::request::{PendingRequest, Response};

/// Canonical identity of a cacheable request: method plus full URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: Method,
    url: String,
}

impl CacheKey {
    /// Key for a read request; `None` for anything that is not a GET.
    pub fn for_request(request: &PendingRequest) -> Option<Self> {
        request.is_read().then(|| Self {
            method: request.method.clone(),
            url: request.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Default)]
pub struct ResponseCache {
    entries: RwLock<HashMap<CacheKey, Response>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lookup(&self, key: &CacheKey) -> Option<Response> {
        let entries = self.entries.read().await;
        let hit = entries.get(key).cloned();
        debug!(url = key.url(), hit = hit.is_some(), "cache lookup");
        hit
    }

    /// Insert or replace. Concurrent misses may both store; last write wins.
    pub async fn store(&self, key: CacheKey, response: Response) {
        debug!(url = key.url(), status = response.status, "caching response");
        self.entries.write().await.insert(key, response);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every entry, e.g. when the user signs out.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let dropped = entries.len();
        entries.clear();
        debug!(dropped, "response cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_get_requests_have_keys() {
        assert!(CacheKey::for_request(&PendingRequest::get("https://api.test/a")).is_some());
        assert!(CacheKey::for_request(&PendingRequest::post("https://api.test/a", "{}")).is_none());
        assert!(
            CacheKey::for_request(&PendingRequest::new(Method::HEAD, "https://api.test/a"))
                .is_none()
        );
    }

    #[test]
    fn query_parameters_are_part_of_the_identity() {
        let a = CacheKey::for_request(&PendingRequest::get("https://api.test/a?page=1"));
        let b = CacheKey::for_request(&PendingRequest::get("https://api.test/a?page=2"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn store_then_lookup_returns_the_response() {
        let cache = ResponseCache::new();
        let key = CacheKey::for_request(&PendingRequest::get("https://api.test/a")).unwrap();

        assert!(cache.lookup(&key).await.is_none());
        cache.store(key.clone(), Response::new(200, "[1,2]")).await;

        let hit = cache.lookup(&key).await.unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.text(), "[1,2]");
    }

    #[tokio::test]
    async fn last_write_wins() {
        let cache = ResponseCache::new();
        let key = CacheKey::for_request(&PendingRequest::get("https://api.test/a")).unwrap();
        cache.store(key.clone(), Response::new(200, "first")).await;
        cache.store(key.clone(), Response::new(200, "second")).await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.lookup(&key).await.unwrap().text(), "second");
    }

    #[tokio::test]
    async fn clear_empties_the_cache() {
        let cache = ResponseCache::new();
        for path in ["a", "b", "c"] {
            let key =
                CacheKey::for_request(&PendingRequest::get(format!("https://api.test/{path}")))
                    .unwrap();
            cache.store(key, Response::new(200, "")).await;
        }
        assert_eq!(cache.len().await, 3);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
