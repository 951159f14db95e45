// src/services/paginator.rs

//! Result page sequencing.
//!
//! Pagination has no server cursor: each request is built from the page
//! before it, so pages are fetched strictly in order and the sequence cannot
//! be restarted or parallelized.

use std::collections::HashSet;
use std::sync::OnceLock;

use futures::Stream;
use futures::stream;
use regex::Regex;
use scraper::Html;

use crate::error::Result;
use crate::models::{Page, PageRequest, SearchCriteria};
use crate::services::Fetcher;
use crate::services::form_state::{self, FormOverrides, Trigger};
use crate::sites::SearchSite;
use crate::utils::html::{parse_selector, text_of};

/// Hidden field naming the postback target.
pub const EVENT_TARGET: &str = "__EVENTTARGET";
/// Hidden field carrying the postback argument.
pub const EVENT_ARGUMENT: &str = "__EVENTARGUMENT";

/// How a site exposes its "next page" control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStyle {
    /// Anchor whose href is `javascript:__doPostBack('target','arg')`;
    /// the current form is replayed with the target substituted.
    Postback {
        form: &'static str,
        next_anchor: &'static str,
        /// Fields never replayed on a postback
        removed: &'static [&'static str],
    },
    /// Anchor with this exact text pointing at the next page URL.
    Anchor { link_text: &'static str },
}

/// Parse `__doPostBack('target','argument')` out of an href.
pub fn parse_postback(href: &str) -> Option<(String, String)> {
    static POSTBACK: OnceLock<Regex> = OnceLock::new();
    let re = POSTBACK.get_or_init(|| {
        Regex::new(r"__doPostBack\('([^']+)',\s*'([^']*)'\)").expect("postback pattern is valid")
    });
    let caps = re.captures(href)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Build the request for the page after `page`, if there is one.
///
/// A missing next control, or one whose target cannot be parsed, is the
/// normal end of results.
pub fn next_request(page: &Page, style: &PaginationStyle) -> Result<Option<PageRequest>> {
    match style {
        PaginationStyle::Postback {
            form,
            next_anchor,
            removed,
        } => {
            let href = {
                let document = Html::parse_document(&page.body);
                let selector = parse_selector(next_anchor)?;
                document
                    .select(&selector)
                    .next()
                    .and_then(|a| a.value().attr("href").map(str::to_string))
            };
            let Some(href) = href else {
                return Ok(None);
            };
            let Some((target, _argument)) = parse_postback(&href) else {
                log::debug!("Next control on {} has no postback target: {href}", page.url);
                return Ok(None);
            };

            let fields = form_state::extract(page, form)?;
            let overrides = FormOverrides::new(Trigger::Script)
                .remove(removed)
                .set(EVENT_TARGET, target)
                .set(EVENT_ARGUMENT, "");
            let fields = form_state::apply(fields, &overrides, &page.url)?;
            let url = form_state::action_url(page, form)?;
            Ok(Some(PageRequest::post(url, fields)))
        }
        PaginationStyle::Anchor { link_text } => {
            let document = Html::parse_document(&page.body);
            let anchors = parse_selector("a[href]")?;
            let next = document
                .select(&anchors)
                .find(|a| text_of(a) == *link_text)
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| page.url.join(href).ok());
            Ok(next.map(PageRequest::get))
        }
    }
}

enum State {
    Searching(SearchCriteria),
    HasPage(Page),
    Done,
}

/// Lazy, forward-only sequence of result pages for one search.
pub struct Paginator<'a> {
    fetcher: &'a Fetcher,
    site: &'a dyn SearchSite,
    state: State,
    visited: HashSet<String>,
    fetched: usize,
    max_pages: usize,
}

impl<'a> Paginator<'a> {
    pub fn new(
        fetcher: &'a Fetcher,
        site: &'a dyn SearchSite,
        criteria: SearchCriteria,
        max_pages: usize,
    ) -> Self {
        Self {
            fetcher,
            site,
            state: State::Searching(criteria),
            visited: HashSet::new(),
            fetched: 0,
            max_pages: max_pages.max(1),
        }
    }

    /// Fetch the next page. `None` once results are exhausted.
    ///
    /// After an error or the end of results the paginator stays done.
    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        let request = match std::mem::replace(&mut self.state, State::Done) {
            State::Searching(criteria) => {
                log::info!("Submitting search on {}", self.site.name());
                self.site.search_request(self.fetcher, &criteria).await?
            }
            State::HasPage(previous) => {
                if self.fetched >= self.max_pages {
                    log::warn!(
                        "Stopping after {} pages (crawler.max_pages)",
                        self.max_pages
                    );
                    return Ok(None);
                }
                match next_request(&previous, self.site.pagination())? {
                    Some(request) => request,
                    None => {
                        log::info!("No next page after page {}", self.fetched);
                        return Ok(None);
                    }
                }
            }
            State::Done => return Ok(None),
        };

        if let PageRequest::Get { url, .. } = &request {
            if !self.visited.insert(url.to_string()) {
                log::warn!("Next page {url} was already visited; ending pagination");
                return Ok(None);
            }
        }

        let page = self.fetcher.fetch(&request).await?;
        self.fetched += 1;
        log::info!("Fetched result page {} ({})", self.fetched, page.url);

        self.state = State::HasPage(page.clone());
        Ok(Some(page))
    }

    /// Expose the paginator as a stream of pages.
    pub fn into_stream(self) -> impl Stream<Item = Result<Page>> + 'a {
        stream::try_unfold(self, |mut paginator| async move {
            Ok(paginator.next_page().await?.map(|page| (page, paginator)))
        })
    }
}
