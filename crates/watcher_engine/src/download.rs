use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use url::Url;
use watcher_logging::{watcher_debug, watcher_trace};

use crate::persist::{AtomicFileWriter, PersistError};
use crate::{DownloadError, DownloadReceipt, DownloadRequest, FailureKind};

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    /// Every destination resolves below this directory.
    pub root: PathBuf,
    pub connect_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("downloads"),
            connect_timeout: Duration::from_secs(10),
            redirect_limit: 5,
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Fetches one resource and stores it at the request's destination.
#[async_trait::async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, request: &DownloadRequest) -> Result<DownloadReceipt, DownloadError>;
}

pub struct ReqwestDownloader {
    client: reqwest::Client,
    writer: Arc<AtomicFileWriter>,
    max_bytes: u64,
}

impl ReqwestDownloader {
    pub fn new(settings: DownloadSettings) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| DownloadError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            writer: Arc::new(AtomicFileWriter::new(settings.root)),
            max_bytes: settings.max_bytes,
        })
    }

    fn too_large(&self, actual: u64) -> DownloadError {
        DownloadError::new(
            FailureKind::TooLarge {
                max_bytes: self.max_bytes,
                actual: Some(actual),
            },
            "response too large",
        )
    }
}

#[async_trait::async_trait]
impl Downloader for ReqwestDownloader {
    async fn download(&self, request: &DownloadRequest) -> Result<DownloadReceipt, DownloadError> {
        let parsed = Url::parse(&request.source_url)
            .map_err(|err| DownloadError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::new(
                FailureKind::InvalidUrl,
                format!("unsupported scheme {:?}", parsed.scheme()),
            ));
        }

        let mut builder = self.client.get(parsed).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        if let Some(content_len) = response.content_length() {
            if content_len > self.max_bytes {
                return Err(self.too_large(content_len));
            }
        }

        let final_url = response.url().to_string();
        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.max_bytes {
                return Err(self.too_large(next_len));
            }
            bytes.extend_from_slice(&chunk);
            watcher_trace!("[download #{}] {} byte(s)", request.job_id, bytes.len());
        }

        let writer = Arc::clone(&self.writer);
        let destination = request.destination.clone();
        let bytes_written = bytes.len() as u64;
        let path = tokio::task::spawn_blocking(move || writer.write(&destination, &bytes))
            .await
            .map_err(|err| DownloadError::new(FailureKind::Io, err.to_string()))?
            .map_err(map_persist_error)?;

        watcher_debug!(
            "[download #{}] Saved {} byte(s) to {}",
            request.job_id,
            bytes_written,
            path.display()
        );
        Ok(DownloadReceipt {
            final_url,
            path,
            bytes_written,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> DownloadError {
    if err.is_timeout() {
        return DownloadError::new(FailureKind::Timeout, err.to_string());
    }
    DownloadError::new(FailureKind::Network, err.to_string())
}

fn map_persist_error(err: PersistError) -> DownloadError {
    match err {
        PersistError::Destination(message) => {
            DownloadError::new(FailureKind::InvalidDestination, message)
        }
        other => DownloadError::new(FailureKind::Io, other.to_string()),
    }
}
