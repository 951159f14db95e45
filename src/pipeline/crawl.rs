// src/pipeline/crawl.rs

//! Crawl pipeline: search, paginate, read details, download attachments.

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use url::Url;

use crate::error::{AppError, Result, StageExt};
use crate::models::{Config, PageRequest, Record, SearchCriteria};
use crate::services::{
    AttachmentDownloader, DetailLayout, DownloadReport, Fetcher, Paginator, extract_detail_page,
    extract_list_page,
};
use crate::sites::SearchSite;

/// Knobs for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub max_pages: usize,
    pub max_concurrent: usize,
    pub download_dir: PathBuf,
    pub skip_existing: bool,
    /// Fetch attachments after reading detail pages
    pub download: bool,
}

impl CrawlOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_pages: config.crawler.max_pages,
            max_concurrent: config.crawler.max_concurrent,
            download_dir: config.download.dir.clone(),
            skip_existing: config.download.skip_already_downloaded,
            download: true,
        }
    }
}

/// What a crawl produced.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub records: Vec<Record>,
    pub pages: usize,
    /// `None` when downloads were disabled or the site has no attachments
    pub report: Option<DownloadReport>,
}

/// Run one crawl against a site.
///
/// Errors before downloads start are fatal and carry the stage and the page
/// number or tracking number they happened on. Download failures are
/// per-record and reported in [`CrawlOutcome::report`].
pub async fn run_crawl(
    site: &dyn SearchSite,
    fetcher: Arc<Fetcher>,
    criteria: SearchCriteria,
    options: &CrawlOptions,
) -> Result<CrawlOutcome> {
    let (mut records, pages) = collect_records(site, &fetcher, &criteria, options).await?;
    log::info!(
        "Found {} records on {} pages of {}",
        records.len(),
        pages,
        site.name()
    );

    let Some(layout) = site.detail_layout() else {
        return Ok(CrawlOutcome {
            records,
            pages,
            report: None,
        });
    };

    read_details(&fetcher, layout, &mut records, options.max_concurrent).await?;

    let report = if options.download {
        let downloader = AttachmentDownloader::new(
            Arc::clone(&fetcher),
            &options.download_dir,
            options.skip_existing,
            options.max_concurrent,
        );
        Some(downloader.download_all(&records).await)
    } else {
        log::info!("Downloads disabled; skipping attachments");
        None
    };

    Ok(CrawlOutcome {
        records,
        pages,
        report,
    })
}

/// Walk every result page and extract the records the site accepts.
async fn collect_records(
    site: &dyn SearchSite,
    fetcher: &Fetcher,
    criteria: &SearchCriteria,
    options: &CrawlOptions,
) -> Result<(Vec<Record>, usize)> {
    let paginator = Paginator::new(fetcher, site, criteria.clone(), options.max_pages);
    let mut pages = Box::pin(paginator.into_stream());
    let mut records = Vec::new();
    let mut count = 0;

    while let Some(page) = pages.next().await {
        let page = match page {
            Ok(page) => page,
            Err(e) if count == 0 => return Err(e.in_stage("search", site.name())),
            Err(e) => return Err(e.in_stage("pagination", format!("page {}", count + 1))),
        };
        count += 1;

        let found = extract_list_page(&page, site.list_layout())
            .stage("extract", format!("page {count}"))?;
        let total = found.len();
        let kept: Vec<Record> = found
            .into_iter()
            .filter(|r| site.accepts(r, criteria))
            .collect();
        if kept.len() < total {
            log::debug!(
                "Page {count}: {} of {total} records outside the search range",
                total - kept.len()
            );
        }
        log::info!("Page {count}: {} records", kept.len());
        records.extend(kept);
    }

    Ok((records, count))
}

/// Fetch each record's detail page and merge operator and attachments.
///
/// Order is preserved. The first failure aborts the run.
async fn read_details(
    fetcher: &Fetcher,
    layout: &DetailLayout,
    records: &mut [Record],
    concurrency: usize,
) -> Result<()> {
    let details: Vec<_> = stream::iter(records.iter())
        .map(|record| async move {
            let url = Url::parse(&record.url)
                .map_err(|e| AppError::from(e).in_stage("detail", &record.id))?;
            let page = fetcher
                .fetch(&PageRequest::cached_get(url))
                .await
                .stage("detail", &record.id)?;
            log::info!(
                "Read details for {}{}",
                record.id,
                if page.from_cache { " (cached)" } else { "" }
            );
            extract_detail_page(&page, layout).stage("detail", &record.id)
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    for (record, detail) in records.iter_mut().zip(details) {
        record.apply_detail(detail);
    }
    Ok(())
}
