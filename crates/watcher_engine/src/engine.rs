use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time;
use watcher_logging::{watcher_debug, watcher_warn};

use crate::download::Downloader;
use crate::{DownloadError, DownloadReceipt, DownloadRequest, EngineEvent, FailureKind, JobId};

/// Runs downloads concurrently and reports exactly one
/// [`EngineEvent::DownloadCompleted`] per enqueued request.
#[derive(Clone)]
pub struct EngineHandle {
    downloader: Arc<dyn Downloader>,
    event_tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineHandle {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        event_tx: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            downloader,
            event_tx,
        }
    }

    /// Starts `request` on the current tokio runtime. The request's timeout
    /// bounds the whole download, including writing the file.
    pub fn enqueue(&self, request: DownloadRequest) {
        let downloader = Arc::clone(&self.downloader);
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let job_id = request.job_id;
            let result = supervise(downloader, request).await;
            match &result {
                Ok(receipt) => watcher_debug!(
                    "[engine #{}] Completed: {}",
                    job_id,
                    receipt.path.display()
                ),
                Err(err) => watcher_warn!("[engine #{}] Failed: {}", job_id, err),
            }
            // Receiver gone means the controller shut down.
            let _ = event_tx.send(EngineEvent::DownloadCompleted { job_id, result });
        });
    }
}

async fn supervise(
    downloader: Arc<dyn Downloader>,
    request: DownloadRequest,
) -> Result<DownloadReceipt, DownloadError> {
    let job_id: JobId = request.job_id;
    let timeout = request.timeout;
    let mut task = tokio::spawn(async move { downloader.download(&request).await });

    match time::timeout(timeout, &mut task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(DownloadError::new(
            FailureKind::Aborted,
            format!("download task for job {job_id} ended abnormally: {join_err}"),
        )),
        Err(_) => {
            task.abort();
            Err(DownloadError::new(
                FailureKind::Timeout,
                format!("no completion within {timeout:?}"),
            ))
        }
    }
}
