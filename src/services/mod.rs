//! Service layer for the harvester.
//!
//! This module contains the crawl machinery:
//! - Transport boundary with cache-aside and retries (`Fetcher`)
//! - Form harvesting and override (`form_state`)
//! - Result page sequencing (`Paginator`)
//! - Record and attachment extraction (`extractor`)
//! - Attachment downloads (`AttachmentDownloader`)
//! - Request pacing (`RateLimiter`)

pub mod downloader;
pub mod extractor;
mod fetcher;
pub mod form_state;
pub mod paginator;
mod rate_limit;

pub use downloader::{AttachmentDownloader, DownloadReport};
pub use extractor::{DetailLayout, IdSource, ListLayout, extract_detail_page, extract_list_page};
pub use fetcher::{Fetcher, RetryPolicy};
pub use paginator::{PaginationStyle, Paginator};
pub use rate_limit::RateLimiter;
