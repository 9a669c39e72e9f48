//! Pull-based discovery over the document's cache partitions.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use watcher_logging::{begin_poll_cycle, watcher_debug, watcher_error, watcher_trace, watcher_warn};

use crate::{Candidate, CandidateSink, SourceKind};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);
const MANIFEST_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache partition {0:?} not found")]
    MissingPartition(String),
    #[error("cache partition {name:?} unreadable: {message}")]
    Unreadable { name: String, message: String },
    #[error("cache storage unavailable: {0}")]
    Unavailable(String),
    #[error("malformed cache manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Named cache partitions, each holding stored requests.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Partition names in enumeration order.
    async fn partitions(&self) -> Result<Vec<String>, CacheError>;
    async fn request_urls(&self, partition: &str) -> Result<Vec<String>, CacheError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub cycle: u64,
    pub partitions: usize,
    pub failed_partitions: usize,
    pub urls: usize,
    /// Set when the partition list itself could not be read.
    pub error: Option<String>,
}

/// Walks every partition once, forwarding each stored request URL.
///
/// Never fails: unreadable partitions are skipped and a failed listing is
/// recorded in the report.
pub async fn poll_once(storage: &dyn CacheStorage, sink: &dyn CandidateSink) -> PollReport {
    let cycle = begin_poll_cycle();
    let mut report = PollReport {
        cycle,
        ..PollReport::default()
    };

    let names = match storage.partitions().await {
        Ok(names) => names,
        Err(err) => {
            watcher_error!("[cache #{}] Could not list cache partitions: {}", cycle, err);
            report.error = Some(err.to_string());
            return report;
        }
    };
    report.partitions = names.len();

    for name in &names {
        match storage.request_urls(name).await {
            Ok(urls) => {
                report.urls += urls.len();
                for url in urls {
                    sink.offer(Candidate {
                        source: SourceKind::CacheStorage,
                        url,
                    });
                }
            }
            Err(err) => {
                report.failed_partitions += 1;
                watcher_warn!("[cache #{}] Skipping partition {:?}: {}", cycle, name, err);
            }
        }
    }

    watcher_trace!(
        "[cache #{}] {} partition(s), {} skipped, {} url(s)",
        cycle,
        report.partitions,
        report.failed_partitions,
        report.urls
    );
    report
}

/// Owns the periodic polling schedule for one storage.
pub struct CachePoller {
    storage: Arc<dyn CacheStorage>,
    schedule: Option<CancellationToken>,
}

impl CachePoller {
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        Self {
            storage,
            schedule: None,
        }
    }

    pub async fn poll_once(&self, sink: &dyn CandidateSink) -> PollReport {
        poll_once(self.storage.as_ref(), sink).await
    }

    /// Runs one poll on its own task.
    pub fn spawn_poll(&self, sink: Arc<dyn CandidateSink>) -> JoinHandle<PollReport> {
        let storage = Arc::clone(&self.storage);
        tokio::spawn(async move { poll_once(storage.as_ref(), sink.as_ref()).await })
    }

    pub fn is_scheduled(&self) -> bool {
        self.schedule.is_some()
    }

    /// Polls every `every`, first tick one period from now. Replaces any
    /// previous schedule.
    pub fn schedule(&mut self, every: Duration, sink: Arc<dyn CandidateSink>) {
        self.unschedule();
        let every = if every < MIN_POLL_INTERVAL {
            watcher_warn!(
                "[cache] Poll interval {:?} too small, using {:?}",
                every,
                MIN_POLL_INTERVAL
            );
            MIN_POLL_INTERVAL
        } else {
            every
        };

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let storage = Arc::clone(&self.storage);
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = poll_once(storage.as_ref(), sink.as_ref()) => {}
                }
            }
            watcher_debug!("[cache] Periodic polling stopped");
        });
        self.schedule = Some(cancel);
        watcher_debug!("[cache] Periodic polling every {:?}", every);
    }

    pub fn unschedule(&mut self) {
        if let Some(cancel) = self.schedule.take() {
            cancel.cancel();
        }
    }
}

impl Drop for CachePoller {
    fn drop(&mut self) {
        self.unschedule();
    }
}

/// In-process storage; partitions enumerate in creation order.
#[derive(Default)]
pub struct MemoryCacheStorage {
    inner: Mutex<MemoryCacheInner>,
}

#[derive(Default)]
struct MemoryCacheInner {
    partitions: Vec<MemoryPartition>,
    unavailable: Option<String>,
}

struct MemoryPartition {
    name: String,
    urls: Vec<String>,
    broken: Option<String>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `url` in `partition`, creating the partition on first use.
    pub fn put(&self, partition: &str, url: impl Into<String>) {
        let url = url.into();
        let mut inner = self.lock();
        match inner.partitions.iter_mut().find(|p| p.name == partition) {
            Some(existing) => {
                if !existing.urls.contains(&url) {
                    existing.urls.push(url);
                }
            }
            None => inner.partitions.push(MemoryPartition {
                name: partition.to_string(),
                urls: vec![url],
                broken: None,
            }),
        }
    }

    /// Deletes `partition` and everything stored in it, as a page does when it
    /// evicts an old cache version.
    pub fn remove_partition(&self, partition: &str) {
        self.lock().partitions.retain(|p| p.name != partition);
    }

    /// Makes reads of `partition` fail with `reason` until healed.
    pub fn break_partition(&self, partition: &str, reason: impl Into<String>) {
        let reason = reason.into();
        let mut inner = self.lock();
        match inner.partitions.iter_mut().find(|p| p.name == partition) {
            Some(existing) => existing.broken = Some(reason),
            None => inner.partitions.push(MemoryPartition {
                name: partition.to_string(),
                urls: Vec::new(),
                broken: Some(reason),
            }),
        }
    }

    pub fn heal_partition(&self, partition: &str) {
        if let Some(existing) = self.lock().partitions.iter_mut().find(|p| p.name == partition) {
            existing.broken = None;
        }
    }

    /// Makes the partition listing itself fail (`Some`) or work again (`None`).
    pub fn set_unavailable(&self, reason: Option<String>) {
        self.lock().unavailable = reason;
    }

    fn lock(&self) -> MutexGuard<'_, MemoryCacheInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn partitions(&self) -> Result<Vec<String>, CacheError> {
        let inner = self.lock();
        if let Some(reason) = &inner.unavailable {
            return Err(CacheError::Unavailable(reason.clone()));
        }
        Ok(inner.partitions.iter().map(|p| p.name.clone()).collect())
    }

    async fn request_urls(&self, partition: &str) -> Result<Vec<String>, CacheError> {
        let inner = self.lock();
        let found = inner
            .partitions
            .iter()
            .find(|p| p.name == partition)
            .ok_or_else(|| CacheError::MissingPartition(partition.to_string()))?;
        match &found.broken {
            Some(reason) => Err(CacheError::Unreadable {
                name: partition.to_string(),
                message: reason.clone(),
            }),
            None => Ok(found.urls.clone()),
        }
    }
}

/// Directory of `<partition>.json` manifests, each a JSON array of request URLs.
#[derive(Debug, Clone)]
pub struct DirectoryCacheStorage {
    root: PathBuf,
}

impl DirectoryCacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn manifest_path(&self, partition: &str) -> PathBuf {
        self.root.join(format!("{partition}.{MANIFEST_EXTENSION}"))
    }
}

#[async_trait]
impl CacheStorage for DirectoryCacheStorage {
    async fn partitions(&self) -> Result<Vec<String>, CacheError> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(MANIFEST_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        // read_dir order is platform dependent.
        names.sort();
        Ok(names)
    }

    async fn request_urls(&self, partition: &str) -> Result<Vec<String>, CacheError> {
        let path = self.manifest_path(partition);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::MissingPartition(partition.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str::<Vec<String>>(&text)
            .map_err(|source| CacheError::Manifest { path, source })
    }
}
