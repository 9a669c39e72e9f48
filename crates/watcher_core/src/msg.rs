#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySource {
    /// Live resource-load notifications.
    ResourceFeed,
    /// Periodic enumeration of the cache partitions.
    CacheStorage,
}

/// Terminal result of one download job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Delivered,
    Failed { detail: String },
    TimedOut,
}

/// What one cache poll saw, reported back to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollSummary {
    pub partitions: usize,
    pub failed_partitions: usize,
    pub urls: usize,
    /// Set when the partition list itself could not be read.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User pressed the start/stop control.
    ToggleRequested,
    StartRequested,
    StopRequested,
    /// User entered a new destination folder (unsanitized).
    FolderEntered(String),
    /// User entered new pattern text.
    PatternEntered(String),
    /// A discovery source reported a URL.
    CandidateFound {
        source: DiscoverySource,
        url: String,
    },
    /// The immediate poll issued by a start finished, successfully or not.
    InitialPollFinished { epoch: u64, summary: PollSummary },
    /// Terminal callback for a dispatched job.
    DownloadFinished {
        job_id: crate::JobId,
        outcome: JobOutcome,
    },
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
