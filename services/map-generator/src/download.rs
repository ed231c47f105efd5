//! Source file download with retry and progress tracking.
//!
//! The body is streamed to `<file>.partial` and renamed into place only once
//! complete, so a file at the final path is always whole.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{header, Client, StatusCode};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::config::DownloadSettings;
use crate::error::{PipelineError, PipelineResult};

/// Fetches one remote file to a local path.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Download `url` to `dest`, returning the number of bytes written.
    async fn fetch(&self, url: &str, dest: &Path) -> PipelineResult<u64>;
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_retry_delay: Duration,
    pub max_retry_delay: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self::from(&DownloadSettings::default())
    }
}

impl From<&DownloadSettings> for DownloadConfig {
    fn from(settings: &DownloadSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_retry_delay: Duration::from_secs(settings.initial_retry_delay_secs),
            max_retry_delay: Duration::from_secs(settings.max_retry_delay_secs),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            user_agent: settings.user_agent.clone(),
        }
    }
}

/// Download progress information.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    pub url: String,
    pub total_bytes: Option<u64>,
    pub downloaded_bytes: u64,
    pub started_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl DownloadProgress {
    fn start(url: &str) -> Self {
        let now = Utc::now();
        Self {
            url: url.to_string(),
            total_bytes: None,
            downloaded_bytes: 0,
            started_at: now,
            last_update: now,
        }
    }

    pub fn percent_complete(&self) -> Option<f64> {
        self.total_bytes
            .filter(|&total| total > 0)
            .map(|total| (self.downloaded_bytes as f64 / total as f64) * 100.0)
    }

    pub fn bytes_per_second(&self) -> f64 {
        let elapsed = (self.last_update - self.started_at).num_milliseconds() as f64 / 1000.0;
        if elapsed > 0.0 {
            self.downloaded_bytes as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// Path of the in-progress download for `dest`.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    dest.with_file_name(name)
}

/// `SourceFetcher` over HTTP(S) with exponential-backoff retries.
pub struct HttpFetcher {
    client: Client,
    config: DownloadConfig,
}

impl HttpFetcher {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .tcp_nodelay(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// One attempt: stream the body to `temp_path`, then check its size.
    async fn attempt(&self, url: &str, temp_path: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("HTTP request failed")?;

        match response.status() {
            StatusCode::OK => {}
            status => return Err(anyhow!("HTTP error: {}", status)),
        }

        let mut progress = DownloadProgress::start(url);
        progress.total_bytes = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());

        // Always start from an empty partial file
        let mut file = File::create(temp_path)
            .await
            .context("Failed to open output file")?;

        let mut stream = response.bytes_stream();
        let mut bytes_since_log = 0u64;
        let log_interval = 1_000_000; // ~1 MB

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Error reading response chunk")?;
            file.write_all(&chunk)
                .await
                .context("Error writing to file")?;

            progress.downloaded_bytes += chunk.len() as u64;
            progress.last_update = Utc::now();
            bytes_since_log += chunk.len() as u64;

            if bytes_since_log >= log_interval {
                bytes_since_log = 0;
                debug!(
                    downloaded = progress.downloaded_bytes,
                    total = ?progress.total_bytes,
                    percent = format!("{:.1}%", progress.percent_complete().unwrap_or(0.0)),
                    speed = format!("{:.1} KB/s", progress.bytes_per_second() / 1024.0),
                    "Download progress"
                );
            }
        }

        file.flush().await?;
        file.sync_all().await?;

        if let Some(expected) = progress.total_bytes {
            let actual = fs::metadata(temp_path).await?.len();
            if actual != expected {
                return Err(anyhow!(
                    "Download size mismatch: expected {} bytes, got {}",
                    expected,
                    actual
                ));
            }
        }

        Ok(progress.downloaded_bytes)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_path = partial_path(dest);

        let mut retry_count = 0;
        let mut delay = self.config.initial_retry_delay;

        loop {
            match self.attempt(url, &temp_path).await {
                Ok(bytes) => {
                    // Copy + delete when rename crosses filesystems
                    if fs::rename(&temp_path, dest).await.is_err() {
                        fs::copy(&temp_path, dest).await?;
                        fs::remove_file(&temp_path).await?;
                    }
                    return Ok(bytes);
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        return Err(e.context(format!("giving up after {} attempts", retry_count)));
                    }

                    warn!(
                        error = %e,
                        retry = retry_count,
                        max_retries = self.config.max_retries,
                        delay_secs = delay.as_secs(),
                        "Download failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.config.max_retry_delay);
                }
            }
        }
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    #[instrument(skip(self, dest), fields(url = %url))]
    async fn fetch(&self, url: &str, dest: &Path) -> PipelineResult<u64> {
        info!(path = %dest.display(), "Starting download");

        match self.download(url, dest).await {
            Ok(bytes) => {
                info!(path = %dest.display(), bytes = bytes, "Download completed");
                Ok(bytes)
            }
            Err(e) => {
                let _ = fs::remove_file(partial_path(dest)).await;
                Err(PipelineError::DownloadFailure {
                    url: url.to_string(),
                    message: format!("{:#}", e),
                })
            }
        }
    }
}
