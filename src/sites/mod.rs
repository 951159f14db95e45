//! Target search sites.
//!
//! Each site knows how to submit its search, how its result pages link to
//! the next one, and the column contract of its tables.

mod ocd;
mod rrc;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{PageRequest, Record, SearchCriteria, SitesConfig};
use crate::services::{DetailLayout, Fetcher, ListLayout, PaginationStyle};

pub use ocd::OcdSite;
pub use rrc::RrcSite;

/// A search form and its result tables.
#[async_trait]
pub trait SearchSite: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Build the request that submits the search.
    ///
    /// May prime the session with a GET through `fetcher` first.
    async fn search_request(
        &self,
        fetcher: &Fetcher,
        criteria: &SearchCriteria,
    ) -> Result<PageRequest>;

    fn pagination(&self) -> &PaginationStyle;

    fn list_layout(&self) -> &ListLayout;

    /// Detail page layout, if records link to attachments.
    fn detail_layout(&self) -> Option<&DetailLayout> {
        None
    }

    /// Client-side filter for criteria the form cannot express.
    fn accepts(&self, _record: &Record, _criteria: &SearchCriteria) -> bool {
        true
    }
}

/// Supported sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteKind {
    /// New Mexico OCD imaging case files
    Ocd,
    /// Texas RRC completion packets
    Rrc,
}

impl SiteKind {
    /// Construct the site using endpoints from configuration.
    pub fn build(self, config: &SitesConfig) -> Result<Box<dyn SearchSite>> {
        Ok(match self {
            Self::Ocd => Box::new(OcdSite::new(Url::parse(&config.ocd_url)?)),
            Self::Rrc => Box::new(RrcSite::new(
                Url::parse(&config.rrc_url)?,
                config.rrc_search_mode,
            )),
        })
    }
}

impl FromStr for SiteKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ocd" => Ok(Self::Ocd),
            "rrc" => Ok(Self::Rrc),
            other => Err(AppError::validation(format!(
                "Unknown site '{other}' (expected ocd or rrc)"
            ))),
        }
    }
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ocd => "ocd",
            Self::Rrc => "rrc",
        })
    }
}
