use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::future::join_all;
use log::debug;
use reqwest::Client;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Failed to download {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, DownloadError> {
        let request_err = |source| DownloadError::Request {
            url: url.to_string(),
            source,
        };
        self.client
            .get(url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(request_err)?
            .bytes()
            .await
            .map_err(request_err)
    }

    /// Fetches `url` and writes the whole body to `path`. Returns the number
    /// of bytes written.
    pub async fn save_image(&self, url: &str, path: &Path) -> Result<usize, DownloadError> {
        let bytes = self.fetch(url).await?;
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|source| DownloadError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Wrote {} bytes from {url} to {}", bytes.len(), path.display());
        Ok(bytes.len())
    }

    /// Runs all jobs concurrently. The results are in job order, a failed
    /// job doesn't affect the others.
    pub async fn save_all(&self, jobs: &[DownloadJob]) -> Vec<Result<usize, DownloadError>> {
        join_all(jobs.iter().map(|job| self.save_image(&job.url, &job.path))).await
    }
}
