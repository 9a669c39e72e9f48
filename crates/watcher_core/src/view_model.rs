use crate::{ActivationState, JobId, SessionTotals};

/// Snapshot of everything the status readout shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    pub activation: ActivationState,
    pub folder: String,
    pub pattern: String,
    /// Keys currently held by the dedup gate (in flight or delivered).
    pub reserved: usize,
    pub in_flight: usize,
    pub delivered: usize,
    pub totals: SessionTotals,
    pub jobs: Vec<JobRowView>,
    pub last_error: Option<String>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRowView {
    pub job_id: JobId,
    pub key: String,
    pub destination: String,
}
