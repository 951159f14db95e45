//! Utility functions and helpers.

pub mod html;
pub mod http;
pub mod shutdown;

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

pub use shutdown::Shutdown;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Remove a `;jsessionid=...` path parameter from a link.
///
/// The session id is volatile, so it must not become part of a cache key.
/// This assumes it never selects different content.
pub fn strip_session_id(href: &str) -> String {
    static SESSION: OnceLock<Regex> = OnceLock::new();
    let re = SESSION.get_or_init(|| {
        Regex::new(r"(?i);jsessionid=[^?#]*").expect("session id pattern is valid")
    });
    re.replace_all(href, "").into_owned()
}

/// Numeric document id at the end of an attachment URL (`.../dpimages/r/4821`).
pub fn attachment_id(url: &str) -> Option<String> {
    static ATTACHMENT: OnceLock<Regex> = OnceLock::new();
    let re = ATTACHMENT.get_or_init(|| {
        Regex::new(r"dpimages/r/(\d+)/?$").expect("attachment id pattern is valid")
    });
    re.captures(url)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().to_string())
}

/// Make a value safe to use as a single path component.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').trim().to_string();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}
