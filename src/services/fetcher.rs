// src/services/fetcher.rs

//! Transport boundary.
//!
//! Every outbound request of a run goes through one [`Fetcher`], which owns
//! the shared client (and with it the session cookies), the page cache, the
//! rate limiter and the retry policy.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::{Client, Response};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, Page, PageRequest};
use crate::services::RateLimiter;
use crate::storage::PageCache;
use crate::utils::Shutdown;

/// Share of the backoff delay added or removed at random.
const JITTER: f64 = 0.2;

/// Retry policy for transient transport failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Exponential backoff with jitter for the given retry (0-based).
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as f64 * 2f64.powi(attempt as i32);
        let jitter = rand::thread_rng().gen_range(-JITTER..=JITTER);
        Duration::from_millis((base * (1.0 + jitter)) as u64)
    }
}

/// Shared HTTP access with cache-aside, rate limiting, retries and cancellation.
pub struct Fetcher {
    client: Client,
    cache: Arc<dyn PageCache>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    shutdown: Shutdown,
}

impl Fetcher {
    pub fn new(
        client: Client,
        cache: Arc<dyn PageCache>,
        limiter: RateLimiter,
        retry: RetryPolicy,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            client,
            cache,
            limiter,
            retry,
            shutdown,
        }
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Fetch a page, consulting the cache first for cacheable GETs.
    pub async fn fetch(&self, request: &PageRequest) -> Result<Page> {
        let cache_key = match request {
            PageRequest::Get {
                url,
                cacheable: true,
            } => Some(url.as_str()),
            _ => None,
        };

        if let Some(key) = cache_key {
            if let Some(body) = self.cache.get(key).await {
                log::debug!("Cache hit: {key}");
                let mut page = Page::new(request.url().clone(), body);
                page.from_cache = true;
                return Ok(page);
            }
        }

        let response = self.send(request).await?;
        let final_url = response.url().clone();
        let body = self.shutdown.guard(async { Ok(response.text().await?) }).await?;

        if let Some(key) = cache_key {
            // A redirected body belongs to another page.
            if final_url == *request.url() {
                self.cache.put(key, &body).await;
            } else {
                log::debug!("Not caching {key}: redirected to {final_url}");
            }
        }

        Ok(Page::new(final_url, body))
    }

    /// Open a streaming GET. The body is left unread for the caller.
    pub async fn open(&self, url: &Url) -> Result<Response> {
        self.send(&PageRequest::get(url.clone())).await
    }

    /// Send a request with rate limiting and retries. Only 2xx is returned.
    async fn send(&self, request: &PageRequest) -> Result<Response> {
        let mut attempt = 0;
        loop {
            self.limiter.wait(&self.shutdown).await?;

            let result = self.shutdown.guard(self.send_once(request)).await;
            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff(attempt);
                    attempt += 1;
                    log::warn!(
                        "Request to {} failed ({}); retry {}/{} in {} ms",
                        request.url(),
                        e,
                        attempt,
                        self.retry.max_retries,
                        delay.as_millis()
                    );
                    self.shutdown
                        .guard(async {
                            tokio::time::sleep(delay).await;
                            Ok(())
                        })
                        .await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, request: &PageRequest) -> Result<Response> {
        let builder = match request {
            PageRequest::Get { url, .. } => self.client.get(url.clone()),
            PageRequest::Post { url, form } => self.client.post(url.clone()).form(&form.pairs()),
        };

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Status {
                url: request.url().to_string(),
                status: status.as_u16(),
            });
        }
        log::debug!("{} {}", status.as_u16(), response.url());
        Ok(response)
    }
}
