//! Fetched pages and the requests that produce them.

use url::Url;

use super::FormFieldSet;

/// A fetched HTML page.
///
/// Only the raw body is kept; parsing happens at the point of use so that no
/// parsed document is held across an await.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// URL the body was served from, used to resolve relative links
    pub url: Url,
    pub body: String,
    /// Served from the page cache rather than the network
    pub from_cache: bool,
}

impl Page {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            url,
            body: body.into(),
            from_cache: false,
        }
    }
}

/// An outbound page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    /// Plain GET. Only cacheable requests go through the page cache.
    Get { url: Url, cacheable: bool },
    /// Form POST replaying a field set.
    Post { url: Url, form: FormFieldSet },
}

impl PageRequest {
    /// GET that bypasses the cache (session-bound pages).
    pub fn get(url: Url) -> Self {
        Self::Get {
            url,
            cacheable: false,
        }
    }

    /// GET eligible for the page cache.
    pub fn cached_get(url: Url) -> Self {
        Self::Get {
            url,
            cacheable: true,
        }
    }

    pub fn post(url: Url, form: FormFieldSet) -> Self {
        Self::Post { url, form }
    }

    pub fn url(&self) -> &Url {
        match self {
            Self::Get { url, .. } | Self::Post { url, .. } => url,
        }
    }
}
