use tokio::sync::mpsc;

use crate::Candidate;

/// Receiver of URLs found by the discovery sources.
///
/// Implementations must not block; both sources call this from async tasks.
pub trait CandidateSink: Send + Sync {
    fn offer(&self, candidate: Candidate);
}

pub struct ChannelCandidateSink {
    tx: mpsc::UnboundedSender<Candidate>,
}

impl ChannelCandidateSink {
    pub fn new(tx: mpsc::UnboundedSender<Candidate>) -> Self {
        Self { tx }
    }
}

impl CandidateSink for ChannelCandidateSink {
    fn offer(&self, candidate: Candidate) {
        // Receiver gone means the controller shut down.
        let _ = self.tx.send(candidate);
    }
}
