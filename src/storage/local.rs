//! Local filesystem page cache.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::PageCache;

/// Page cache stored as one file per URL.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root_dir: PathBuf,
}

impl DiskCache {
    /// Open the cache, creating the directory and probing that it is writable.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        let unavailable =
            |e: std::io::Error| AppError::Cache(format!("{}: {}", root_dir.display(), e));

        tokio::fs::create_dir_all(&root_dir)
            .await
            .map_err(unavailable)?;

        let probe = root_dir.join(".probe");
        tokio::fs::write(&probe, b"ok").await.map_err(unavailable)?;
        let _ = tokio::fs::remove_file(&probe).await;

        Ok(Self { root_dir })
    }

    /// Cache key for a URL.
    fn key(url: &str) -> String {
        hex::encode(Sha256::digest(url.as_bytes()))
    }

    fn path(&self, url: &str) -> PathBuf {
        self.root_dir.join(format!("{}.html", Self::key(url)))
    }

    /// Write bytes atomically (write to temp, then rename).
    ///
    /// The temp name is unique per writer so concurrent puts of one key
    /// never interleave; the last rename wins.
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = path.with_extension(format!("{:016x}.tmp", rand::random::<u64>()));
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::Io(e));
        }
        Ok(())
    }

    /// Read a body, returning None if absent.
    async fn read(&self, path: &Path) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl PageCache for DiskCache {
    async fn get(&self, url: &str) -> Option<String> {
        match self.read(&self.path(url)).await {
            Ok(hit) => hit,
            Err(e) => {
                log::warn!("Cache read failed for {url}: {e}");
                None
            }
        }
    }

    async fn put(&self, url: &str, body: &str) {
        if let Err(e) = self.write_bytes(&self.path(url), body.as_bytes()).await {
            log::warn!("Cache write failed for {url}: {e}");
        }
    }
}
