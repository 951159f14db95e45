//! Page cache abstractions.
//!
//! The cache is a capability resolved once at startup: either a working
//! [`DiskCache`] or a [`NoopCache`] that always misses. Callers never check
//! for availability themselves.
//!
//! ## Directory Structure
//!
//! ```text
//! .cache/pages/
//! ├── 3f1c…9a.html          # sha256(url) → page body
//! └── 77d0…12.html
//! ```
//!
//! There is no TTL or eviction. Filing pages for a closed date range do not
//! change, so entries stay valid for as long as the directory exists.

pub mod local;

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::CacheConfig;

// Re-export for convenience
pub use local::DiskCache;

/// Cache-aside store keyed by URL.
#[async_trait]
pub trait PageCache: Send + Sync {
    /// Look up a cached body. Any failure is a miss.
    async fn get(&self, url: &str) -> Option<String>;

    /// Store a body. Failures are logged and otherwise ignored.
    async fn put(&self, url: &str, body: &str);
}

/// Cache used when no backing store is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl PageCache for NoopCache {
    async fn get(&self, _url: &str) -> Option<String> {
        None
    }

    async fn put(&self, _url: &str, _body: &str) {}
}

/// Resolve the cache for this run.
///
/// An unavailable store degrades to [`NoopCache`] for the whole run and is
/// not retried.
pub async fn open_cache(config: &CacheConfig) -> Arc<dyn PageCache> {
    if !config.enabled {
        log::info!("Page cache disabled");
        return Arc::new(NoopCache);
    }

    match DiskCache::open(&config.dir).await {
        Ok(cache) => {
            log::info!("Page cache at {}", config.dir.display());
            Arc::new(cache)
        }
        Err(e) => {
            log::warn!("{e}. Continuing without page cache.");
            Arc::new(NoopCache)
        }
    }
}
