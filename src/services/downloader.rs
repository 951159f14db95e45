// src/services/downloader.rs

//! Attachment downloads.
//!
//! Files land in `<root>/<api no>/<operator>/<name>[-<id>].<ext>`. The file
//! on disk is the only record of a finished download: presence of the
//! computed name means done. Content changes at the same URL are not
//! detected.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures::stream::{self, StreamExt};
use reqwest::Response;
use reqwest::header::CONTENT_TYPE;
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;
use url::Url;

use crate::error::{AppError, Result, StageExt};
use crate::models::{AttachmentRef, Record};
use crate::services::Fetcher;
use crate::utils::{attachment_id, sanitize_component};

/// Extension used when the content type is missing or unknown.
pub const FALLBACK_EXTENSION: &str = "bin";

/// Map a `Content-Type` header value to a file extension.
pub fn extension_for(content_type: Option<&str>) -> &'static str {
    let essence = content_type
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match essence.as_str() {
        "application/pdf" => "pdf",
        "image/tiff" => "tif",
        "image/jpeg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "text/html" => "html",
        "text/plain" => "txt",
        "text/csv" => "csv",
        "text/xml" | "application/xml" => "xml",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/zip" | "application/x-zip-compressed" => "zip",
        "application/rtf" | "text/rtf" => "rtf",
        _ => FALLBACK_EXTENSION,
    }
}

/// File stem for an attachment: display name plus the id from its URL.
pub fn attachment_stem(attachment: &AttachmentRef) -> String {
    let name = sanitize_component(&attachment.display_name);
    match attachment_id(&attachment.source_url) {
        Some(id) => format!("{name}-{id}"),
        None => name,
    }
}

/// Hands out filenames that are unique within one record.
///
/// Names whose URL carries no id can still collide; later ones get an
/// ordinal suffix.
#[derive(Debug, Default)]
pub struct NameAllocator {
    used: HashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, stem: &str, extension: &str) -> String {
        let mut candidate = format!("{stem}.{extension}");
        let mut ordinal = 2;
        while !self.used.insert(candidate.to_lowercase()) {
            candidate = format!("{stem}-{ordinal}.{extension}");
            ordinal += 1;
        }
        candidate
    }
}

/// Outcome of downloading every record's attachments.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub downloaded: usize,
    pub skipped: usize,
    /// Tracking number and error for each record that failed
    pub failures: Vec<(String, AppError)>,
}

impl DownloadReport {
    fn absorb(&mut self, id: &str, result: Result<RecordTally>) {
        match result {
            Ok(tally) => {
                self.downloaded += tally.downloaded;
                self.skipped += tally.skipped;
            }
            Err(e) => {
                log::warn!("Downloads for {id} failed: {e}");
                self.failures.push((id.to_string(), e));
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct RecordTally {
    downloaded: usize,
    skipped: usize,
}

enum Outcome {
    Written,
    Skipped,
}

/// Target paths currently being written, shared by all workers.
#[derive(Debug, Default)]
struct PathClaims {
    held: Mutex<HashSet<PathBuf>>,
    released: Notify,
}

impl PathClaims {
    /// Claim a path, waiting while another worker holds it.
    async fn acquire(&self, path: &Path) -> Claim<'_> {
        loop {
            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            let acquired = {
                let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
                held.insert(path.to_path_buf())
            };
            if acquired {
                return Claim {
                    claims: self,
                    path: path.to_path_buf(),
                };
            }
            log::debug!("{} is being written by another worker; waiting", path.display());
            released.await;
        }
    }
}

/// Releases a claimed path when dropped.
struct Claim<'a> {
    claims: &'a PathClaims,
    path: PathBuf,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.claims
            .held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.path);
        self.claims.released.notify_waiters();
    }
}

/// Downloads attachments for records whose detail pages were read.
pub struct AttachmentDownloader {
    fetcher: Arc<Fetcher>,
    root_dir: PathBuf,
    skip_existing: bool,
    concurrency: usize,
    in_flight: PathClaims,
}

impl AttachmentDownloader {
    pub fn new(
        fetcher: Arc<Fetcher>,
        root_dir: impl Into<PathBuf>,
        skip_existing: bool,
        concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            root_dir: root_dir.into(),
            skip_existing,
            concurrency: concurrency.max(1),
            in_flight: PathClaims::default(),
        }
    }

    /// Directory for one record's attachments.
    pub fn record_dir(&self, record: &Record) -> PathBuf {
        let operator = record.operator_name.as_deref().unwrap_or_default();
        self.root_dir
            .join(sanitize_component(&record.api_no))
            .join(sanitize_component(operator))
    }

    /// Download every record's attachments on a bounded worker pool.
    ///
    /// A failing record is reported and does not stop the others.
    pub async fn download_all(&self, records: &[Record]) -> DownloadReport {
        let mut report = DownloadReport::default();
        let mut results = stream::iter(records.iter().filter(|r| !r.forms.is_empty()))
            .map(|record| async move { (record, self.download_record(record).await) })
            .buffer_unordered(self.concurrency);

        while let Some((record, result)) = results.next().await {
            report.absorb(&record.id, result);
        }
        report
    }

    async fn download_record(&self, record: &Record) -> Result<RecordTally> {
        log::info!("Getting {} forms for {}", record.forms.len(), record.id);
        let dir = self.record_dir(record);
        tokio::fs::create_dir_all(&dir).await?;

        let mut names = NameAllocator::new();
        let mut tally = RecordTally::default();
        for attachment in &record.forms {
            match self
                .download_one(&dir, attachment, &mut names)
                .await
                .stage("download", &attachment.source_url)?
            {
                Outcome::Written => tally.downloaded += 1,
                Outcome::Skipped => tally.skipped += 1,
            }
        }

        log::info!(
            "Finished {} forms for {} ({} new, {} skipped)",
            record.forms.len(),
            record.id,
            tally.downloaded,
            tally.skipped
        );
        Ok(tally)
    }

    async fn download_one(
        &self,
        dir: &Path,
        attachment: &AttachmentRef,
        names: &mut NameAllocator,
    ) -> Result<Outcome> {
        let url = Url::parse(&attachment.source_url)?;
        let mut response = self.fetcher.open(&url).await?;

        let extension = extension_for(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        let filename = names.allocate(&attachment_stem(attachment), extension);
        let path = dir.join(&filename);

        let shutdown = self.fetcher.shutdown().clone();
        // A worker that held this path may have written it; the existence
        // check below sees the result.
        let _claim = shutdown
            .guard(async { Ok(self.in_flight.acquire(&path).await) })
            .await?;

        if self.skip_existing && tokio::fs::try_exists(&path).await? {
            log::info!("{} already downloaded; skipping", path.display());
            // Unread body: dropping the response closes the connection.
            drop(response);
            return Ok(Outcome::Skipped);
        }

        log::info!("Downloading {filename}");
        let partial = path.with_extension(format!("{extension}.part"));
        if let Err(e) = self.write_body(&mut response, &partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        Ok(Outcome::Written)
    }

    /// Stream the body to `partial`, then move it into place.
    async fn write_body(
        &self,
        response: &mut Response,
        partial: &Path,
        path: &Path,
    ) -> Result<()> {
        let shutdown = self.fetcher.shutdown();
        let mut file = tokio::fs::File::create(partial).await?;
        while let Some(bytes) = shutdown.guard(async { Ok(response.chunk().await?) }).await? {
            file.write_all(&bytes).await?;
        }
        file.flush().await?;
        drop(file);
        tokio::fs::rename(partial, path).await?;
        Ok(())
    }
}
