// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod criteria;
mod form;
mod page;
mod record;

// Re-export all public types
pub use config::{
    CacheConfig, Config, CrawlerConfig, DownloadConfig, RateLimitConfig, SearchMode, SitesConfig,
};
pub use criteria::{DATE_FORMAT, SearchCriteria, parse_date, parse_operator};
pub use form::{FormField, FormFieldSet};
pub use page::{Page, PageRequest};
pub use record::{AttachmentRef, DetailInfo, Record};
