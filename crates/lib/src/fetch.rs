//! Remote fetcher: stream a media url into a uniquely named local file.
//!
//! The returned [`TempArtifact`] owns the file. It is removed by [`TempArtifact::release`] or,
//! failing that, when the artifact is dropped, so every exit path of the caller cleans up.

use crate::error::FetchError;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const FILE_PREFIX: &str = "insta_tg";

/// A local copy of a remote media resource, deleted exactly once.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    released: bool,
}

impl TempArtifact {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used for the multipart upload.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(FILE_PREFIX)
            .to_string()
    }

    /// Delete the file now. Failures are logged and swallowed.
    pub async fn release(mut self) {
        self.released = true;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            log::debug!("removing temp file {}: {}", self.path.display(), e);
        }
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::debug!("removing temp file {} on drop: {}", self.path.display(), e);
        }
    }
}

/// Downloads media into a temp directory.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    dir: PathBuf,
}

impl Fetcher {
    /// `dir` defaults to the platform temp directory.
    pub fn new(client: reqwest::Client, dir: Option<PathBuf>) -> Self {
        Self {
            client,
            dir: dir.unwrap_or_else(std::env::temp_dir),
        }
    }

    /// Stream `url` to a fresh file and return once it is flushed to disk.
    pub async fn fetch(&self, url: &str) -> Result<TempArtifact, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        // Guard first: a partial file is removed if anything below fails.
        let artifact = TempArtifact::new(self.dir.join(unique_file_name(url)));
        let write_err = |source| FetchError::Write {
            path: artifact.path.clone(),
            source,
        };
        let mut file = tokio::fs::File::create(&artifact.path)
            .await
            .map_err(write_err)?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
            file.write_all(&chunk).await.map_err(write_err)?;
        }
        file.flush().await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        log::debug!("fetched {} to {}", url, artifact.path.display());
        Ok(artifact)
    }
}

/// `insta_tg_<millis>_<random><.ext>`; the url only contributes its extension.
fn unique_file_name(url: &str) -> String {
    format!(
        "{}_{}_{}{}",
        FILE_PREFIX,
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple(),
        url_extension(url).unwrap_or_default()
    )
}

/// Extension (with leading dot) of the url path's last segment, if any.
fn url_extension(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.last()?;
    let ext = Path::new(last).extension()?.to_str()?;
    if ext.is_empty() {
        None
    } else {
        Some(format!(".{}", ext))
    }
}
