// src/lib.rs

//! Harvester Library
//!
//! Stateful harvesting of public filing searches: form submission,
//! postback and anchor pagination, record extraction, detail page caching
//! and attachment downloads.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod sites;
pub mod storage;
pub mod utils;
