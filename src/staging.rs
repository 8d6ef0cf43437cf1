//! Local staging of post media
//!
//! Before a post's media can be re-uploaded it is downloaded into a staging area: a
//! directory named by a millisecond timestamp under the staging root. Files are named
//! `{index}.{ext}` in media order. The area exists only for one publish attempt and is
//! purged afterwards, whether the attempt succeeded or not.

use crate::error::{Error, Result};
use crate::types::{MediaKind, Post};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// One staging directory for one publish attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingArea {
    dir: PathBuf,
    timestamp: i64,
}

impl StagingArea {
    /// Directory holding the staged files
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Millisecond timestamp the directory is named after
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// File name for the media item at `index`
pub fn staged_file_name(index: usize, kind: MediaKind) -> String {
    match kind.extension() {
        "" => index.to_string(),
        ext => format!("{}.{}", index, ext),
    }
}

/// Downloads post media into staging areas and removes them again
#[derive(Clone, Debug)]
pub struct MediaStager {
    client: reqwest::Client,
    root: PathBuf,
}

impl MediaStager {
    /// Create a stager that places areas under `root`
    pub fn new(client: reqwest::Client, root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            root: root.into(),
        }
    }

    /// Directory under which areas are created
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, uniquely named staging area
    ///
    /// The root is created if missing. If an area for the current millisecond already
    /// exists, the timestamp is bumped until an unused name is found.
    pub async fn open_area(&self) -> Result<StagingArea> {
        tokio::fs::create_dir_all(&self.root).await?;

        let mut timestamp = chrono::Utc::now().timestamp_millis();
        loop {
            let dir = self.root.join(timestamp.to_string());
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => {
                    debug!(?dir, "opened staging area");
                    return Ok(StagingArea { dir, timestamp });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => timestamp += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Download every media item of `post` into `area`
    ///
    /// Returns one path per media reference, in order. Stops at the first failed download
    /// and leaves whatever was written in place; purging is the caller's job.
    pub async fn stage(&self, area: &StagingArea, post: &Post) -> Result<Vec<PathBuf>> {
        if !post.has_media() {
            return Err(Error::Precondition(
                "cannot stage media for a post without media".into(),
            ));
        }

        let total = post.media().len();
        let mut paths = Vec::with_capacity(total);
        for (index, media) in post.media().iter().enumerate() {
            info!("Downloading: {}/{}", index, total);
            let path = area.dir.join(staged_file_name(index, media.kind()));
            self.download(media.remote_url(), &path).await?;
            paths.push(path);
        }
        info!("Downloading: {}/{}", total, total);

        Ok(paths)
    }

    /// Remove `area` and everything in it
    ///
    /// Purging an area that no longer exists is not an error.
    pub async fn purge(&self, area: &StagingArea) -> Result<()> {
        match tokio::fs::remove_dir_all(&area.dir).await {
            Ok(()) => {
                debug!(dir = ?area.dir, "purged staging area");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn download(&self, url: &str, path: &Path) -> Result<u64> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::unexpected(
                format!("media download {}", url),
                status.as_u16(),
                body,
            ));
        }

        let total = response.content_length();
        let mut file = tokio::fs::File::create(path).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            debug!(?path, written, total, "download progress");
        }
        file.flush().await?;

        Ok(written)
    }
}
