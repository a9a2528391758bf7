//! Rendered-page cache backed by moka.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

pub const HOME_PAGE_KEY: &str = "page:home";

#[derive(Clone)]
pub struct PageCache {
    cache: Cache<String, String>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1_000)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: &str, page: String) {
        self.cache.insert(key.to_string(), page).await;
    }

    /// Returns the cached page, or renders and stores it. Concurrent
    /// callers for the same key share one render.
    pub async fn get_or_render<F, E>(&self, key: &str, render: F) -> Result<String, Arc<E>>
    where
        F: Future<Output = Result<String, E>>,
        E: Send + Sync + 'static,
    {
        self.cache.try_get_with(key.to_string(), render).await
    }

    /// Drops every cached page, used after writes through the admin panel.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}
