//! Live resource-load discovery.
//!
//! A [`ResourceTimeline`] is the host's record of resources the document has
//! loaded. [`EventFeed`] subscribes to it while armed and forwards every URL
//! to a [`CandidateSink`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use watcher_logging::{watcher_debug, watcher_trace};

use crate::{Candidate, CandidateSink, SourceKind};

/// Replay buffer size of [`MemoryTimeline`]; same as the browser's
/// resource-timing buffer.
pub const DEFAULT_REPLAY_CAPACITY: usize = 250;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    /// Strictly increasing per timeline.
    pub sequence: u64,
    pub url: String,
}

/// Recent history at subscription time plus everything recorded afterwards.
pub struct ResourceSubscription {
    pub buffered: Vec<ResourceEntry>,
    pub live: mpsc::UnboundedReceiver<ResourceEntry>,
}

pub trait ResourceTimeline: Send + Sync {
    fn subscribe(&self) -> ResourceSubscription;
}

/// In-process timeline fed by [`MemoryTimeline::record`].
pub struct MemoryTimeline {
    inner: Mutex<TimelineInner>,
}

struct TimelineInner {
    next_sequence: u64,
    capacity: usize,
    buffer: VecDeque<ResourceEntry>,
    subscribers: Vec<mpsc::UnboundedSender<ResourceEntry>>,
}

impl MemoryTimeline {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(TimelineInner {
                next_sequence: 1,
                capacity,
                buffer: VecDeque::with_capacity(capacity),
                subscribers: Vec::new(),
            }),
        }
    }

    /// Records a resource load and pushes it to every open subscription.
    pub fn record(&self, url: impl Into<String>) -> u64 {
        let mut inner = self.lock();
        let entry = ResourceEntry {
            sequence: inner.next_sequence,
            url: url.into(),
        };
        inner.next_sequence += 1;

        if inner.capacity > 0 {
            if inner.buffer.len() == inner.capacity {
                inner.buffer.pop_front();
            }
            inner.buffer.push_back(entry.clone());
        }
        inner
            .subscribers
            .retain(|tx| tx.send(entry.clone()).is_ok());
        entry.sequence
    }

    /// Subscriptions whose receiving side is still alive.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, TimelineInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryTimeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTimeline for MemoryTimeline {
    fn subscribe(&self) -> ResourceSubscription {
        let mut inner = self.lock();
        let (tx, live) = mpsc::unbounded_channel();
        inner.subscribers.push(tx);
        ResourceSubscription {
            buffered: inner.buffer.iter().cloned().collect(),
            live,
        }
    }
}

/// Push-based discovery source.
pub struct EventFeed {
    timeline: Arc<dyn ResourceTimeline>,
    armed: Option<ArmedFeed>,
    /// Highest sequence ever forwarded, across all arm periods.
    delivered_through: Arc<AtomicU64>,
}

struct ArmedFeed {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EventFeed {
    pub fn new(timeline: Arc<dyn ResourceTimeline>) -> Self {
        Self {
            timeline,
            armed: None,
            delivered_through: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Subscribes and starts forwarding. Must be called inside a tokio runtime.
    pub fn arm(&mut self, sink: Arc<dyn CandidateSink>) {
        self.disarm();
        let subscription = self.timeline.subscribe();
        watcher_debug!(
            "[feed] Armed with {} buffered entr(ies)",
            subscription.buffered.len()
        );
        let cancel = CancellationToken::new();
        let task = tokio::spawn(forward(
            subscription,
            sink,
            cancel.clone(),
            Arc::clone(&self.delivered_through),
        ));
        self.armed = Some(ArmedFeed { cancel, task });
    }

    /// Stops forwarding. Never waits, so it can run from the delivery path.
    pub fn disarm(&mut self) {
        if let Some(armed) = self.armed.take() {
            armed.cancel.cancel();
            armed.task.abort();
            watcher_debug!("[feed] Disarmed");
        }
    }
}

impl Drop for EventFeed {
    fn drop(&mut self) {
        self.disarm();
    }
}

async fn forward(
    subscription: ResourceSubscription,
    sink: Arc<dyn CandidateSink>,
    cancel: CancellationToken,
    delivered_through: Arc<AtomicU64>,
) {
    let ResourceSubscription { buffered, mut live } = subscription;
    for entry in buffered {
        if cancel.is_cancelled() {
            return;
        }
        deliver(entry, sink.as_ref(), &cancel, &delivered_through);
    }
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            entry = live.recv() => match entry {
                Some(entry) => deliver(entry, sink.as_ref(), &cancel, &delivered_through),
                None => break,
            },
        }
    }
}

fn deliver(
    entry: ResourceEntry,
    sink: &dyn CandidateSink,
    cancel: &CancellationToken,
    delivered_through: &AtomicU64,
) {
    if cancel.is_cancelled() {
        return;
    }
    let previous = delivered_through.fetch_max(entry.sequence, Ordering::AcqRel);
    if entry.sequence <= previous {
        watcher_trace!("[feed] Already delivered #{}: {}", entry.sequence, entry.url);
        return;
    }
    sink.offer(Candidate {
        source: SourceKind::ResourceFeed,
        url: entry.url,
    });
}
