//! Watcher engine: discovery sources, cache polling and download execution.
mod cache;
mod download;
mod engine;
mod feed;
mod filename;
mod persist;
mod sink;
mod types;

pub use cache::{
    poll_once, CacheError, CachePoller, CacheStorage, DirectoryCacheStorage, MemoryCacheStorage,
    PollReport,
};
pub use download::{DownloadSettings, Downloader, ReqwestDownloader};
pub use engine::EngineHandle;
pub use feed::{
    EventFeed, MemoryTimeline, ResourceEntry, ResourceSubscription, ResourceTimeline,
    DEFAULT_REPLAY_CAPACITY,
};
pub use filename::{resolve_destination, sanitize_component};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use sink::{CandidateSink, ChannelCandidateSink};
pub use types::{
    Candidate, DownloadError, DownloadReceipt, DownloadRequest, EngineEvent, FailureKind, JobId,
    SourceKind,
};
