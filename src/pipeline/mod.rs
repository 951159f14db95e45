//! Pipeline entry points for harvester operations.
//!
//! - `run_crawl`: Search, paginate, read details and download attachments
//! - `export`: Write harvested records to CSV and JSON

pub mod crawl;
pub mod export;

pub use crawl::{CrawlOptions, CrawlOutcome, run_crawl};
