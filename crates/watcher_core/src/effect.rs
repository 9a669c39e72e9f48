use std::time::Duration;

use crate::{CanonicalKey, JobId, SettingKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Subscribe the live resource feed (replacing any previous subscription).
    ArmFeed,
    DisarmFeed,
    /// Run one cache poll now and answer with `Msg::InitialPollFinished { epoch, .. }`.
    PollCache { epoch: u64 },
    /// Start periodic cache polling (replacing any previous schedule).
    SchedulePolling { interval: Duration },
    UnschedulePolling,
    Download(DownloadJob),
    PersistSetting { key: SettingKey, value: String },
    ShowNotice(String),
    ShowError(String),
}

/// One handed-off download; lives until its terminal callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub job_id: JobId,
    pub key: CanonicalKey,
    pub source_url: String,
    /// `folder/name`, relative to the host's download root.
    pub destination: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}
