//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Random delay inserted before network requests
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Detail page cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Attachment download settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Target site endpoints
    #[serde(default)]
    pub sites: SitesConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.crawler.max_pages == 0 {
            return Err(AppError::validation("crawler.max_pages must be > 0"));
        }
        if self.rate_limit.min_delay_ms > self.rate_limit.max_delay_ms {
            return Err(AppError::validation(
                "rate_limit.min_delay_ms must not exceed rate_limit.max_delay_ms",
            ));
        }
        if self.download.dir.as_os_str().is_empty() {
            return Err(AppError::validation("download.dir is empty"));
        }
        url::Url::parse(&self.sites.ocd_url)
            .map_err(|e| AppError::validation(format!("sites.ocd_url: {e}")))?;
        url::Url::parse(&self.sites.rrc_url)
            .map_err(|e| AppError::validation(format!("sites.rrc_url: {e}")))?;
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Workers for detail fetches and downloads
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Retries after a transient transport failure
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential retry backoff in milliseconds
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Upper bound on result pages per search
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            max_retries: defaults::max_retries(),
            retry_backoff_ms: defaults::retry_backoff(),
            max_pages: defaults::max_pages(),
        }
    }
}

/// Bounds of the random pre-request delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "defaults::min_delay")]
    pub min_delay_ms: u64,

    #[serde(default = "defaults::max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: defaults::min_delay(),
            max_delay_ms: defaults::max_delay(),
        }
    }
}

/// Page cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Use the cache at all
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Directory holding cached page bodies
    #[serde(default = "defaults::cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            dir: defaults::cache_dir(),
        }
    }
}

/// Attachment download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root of the `<api no>/<operator>/<file>` layout
    #[serde(default = "defaults::download_dir")]
    pub dir: PathBuf,

    /// Skip attachments whose target file already exists
    #[serde(default = "defaults::enabled")]
    pub skip_already_downloaded: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dir: defaults::download_dir(),
            skip_already_downloaded: defaults::enabled(),
        }
    }
}

/// How the RRC search is submitted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Compact query descriptor on a GET
    #[default]
    Query,
    /// Full form post after priming the session
    Form,
}

/// Target site endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitesConfig {
    #[serde(default = "defaults::ocd_url")]
    pub ocd_url: String,

    #[serde(default = "defaults::rrc_url")]
    pub rrc_url: String,

    #[serde(default)]
    pub rrc_search_mode: SearchMode,
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            ocd_url: defaults::ocd_url(),
            rrc_url: defaults::rrc_url(),
            rrc_search_mode: SearchMode::default(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12_6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/75.0.3770.100 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn max_retries() -> u32 {
        2
    }
    pub fn retry_backoff() -> u64 {
        500
    }
    pub fn max_pages() -> usize {
        500
    }

    // Rate limit defaults
    pub fn min_delay() -> u64 {
        500
    }
    pub fn max_delay() -> u64 {
        2000
    }

    // Storage defaults
    pub fn enabled() -> bool {
        true
    }
    pub fn cache_dir() -> PathBuf {
        PathBuf::from(".cache/pages")
    }
    pub fn download_dir() -> PathBuf {
        PathBuf::from("downloads")
    }

    // Site defaults
    pub fn ocd_url() -> String {
        "http://ocdimage.emnrd.state.nm.us/imaging/CaseFileCriteria.aspx".into()
    }
    pub fn rrc_url() -> String {
        "http://webapps.rrc.texas.gov/CMPL/publicSearchAction.do".into()
    }
}
