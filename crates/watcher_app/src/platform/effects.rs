use std::sync::Arc;

use tokio::sync::mpsc;
use watcher_core::{
    DiscoverySource, DownloadJob, Effect, JobOutcome, Msg, PollSummary, SettingsStore,
};
use watcher_engine::{
    CachePoller, CacheStorage, Candidate, CandidateSink, DownloadRequest, Downloader, EngineEvent,
    EngineHandle, EventFeed, PollReport, ResourceTimeline, SourceKind,
};
use watcher_logging::{watcher_debug, watcher_error, watcher_info, watcher_warn};

/// Text for the console, produced by notice and error effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    Notice(String),
    Error(String),
}

/// Feeds discovery results back into the controller's inbox.
struct MsgSink {
    msg_tx: mpsc::UnboundedSender<Msg>,
}

impl CandidateSink for MsgSink {
    fn offer(&self, candidate: Candidate) {
        let _ = self.msg_tx.send(Msg::CandidateFound {
            source: map_source(candidate.source),
            url: candidate.url,
        });
    }
}

/// Executes the effects `update` returns against the engine and the stores.
pub struct EffectRunner {
    feed: EventFeed,
    poller: CachePoller,
    engine: EngineHandle,
    settings: Box<dyn SettingsStore>,
    sink: Arc<dyn CandidateSink>,
    msg_tx: mpsc::UnboundedSender<Msg>,
}

impl EffectRunner {
    /// Must be called inside a tokio runtime; spawns the engine event relay.
    pub fn new(
        timeline: Arc<dyn ResourceTimeline>,
        storage: Arc<dyn CacheStorage>,
        downloader: Arc<dyn Downloader>,
        settings: Box<dyn SettingsStore>,
        msg_tx: mpsc::UnboundedSender<Msg>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        spawn_event_relay(event_rx, msg_tx.clone());
        Self {
            feed: EventFeed::new(timeline),
            poller: CachePoller::new(storage),
            engine: EngineHandle::new(downloader, event_tx),
            settings,
            sink: Arc::new(MsgSink {
                msg_tx: msg_tx.clone(),
            }),
            msg_tx,
        }
    }

    #[cfg(test)]
    pub fn is_feed_armed(&self) -> bool {
        self.feed.is_armed()
    }

    #[cfg(test)]
    pub fn is_polling_scheduled(&self) -> bool {
        self.poller.is_scheduled()
    }

    pub fn run(&mut self, effects: Vec<Effect>) -> Vec<ConsoleLine> {
        let mut console = Vec::new();
        for effect in effects {
            match effect {
                Effect::ArmFeed => self.feed.arm(Arc::clone(&self.sink)),
                Effect::DisarmFeed => self.feed.disarm(),
                Effect::PollCache { epoch } => self.poll_now(epoch),
                Effect::SchedulePolling { interval } => {
                    self.poller.schedule(interval, Arc::clone(&self.sink));
                }
                Effect::UnschedulePolling => self.poller.unschedule(),
                Effect::Download(job) => {
                    watcher_info!(
                        "Download job_id={} url={} to={}",
                        job.job_id,
                        job.source_url,
                        job.destination
                    );
                    self.engine.enqueue(map_job(job));
                }
                Effect::PersistSetting { key, value } => {
                    if let Err(err) = self.settings.set(key, &value) {
                        watcher_error!("Could not persist {}: {}", key.as_str(), err);
                    }
                }
                Effect::ShowNotice(text) => console.push(ConsoleLine::Notice(text)),
                Effect::ShowError(text) => console.push(ConsoleLine::Error(text)),
            }
        }
        console
    }

    fn poll_now(&self, epoch: u64) {
        let poll = self.poller.spawn_poll(Arc::clone(&self.sink));
        let msg_tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let summary = match poll.await {
                Ok(report) => map_report(report),
                Err(err) => {
                    watcher_warn!("Initial cache poll did not finish: {}", err);
                    PollSummary {
                        error: Some(err.to_string()),
                        ..PollSummary::default()
                    }
                }
            };
            let _ = msg_tx.send(Msg::InitialPollFinished { epoch, summary });
        });
    }
}

fn spawn_event_relay(
    mut event_rx: mpsc::UnboundedReceiver<EngineEvent>,
    msg_tx: mpsc::UnboundedSender<Msg>,
) {
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if msg_tx.send(map_event(event)).is_err() {
                break;
            }
        }
        watcher_debug!("Engine event relay stopped");
    });
}

fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::DownloadCompleted { job_id, result } => Msg::DownloadFinished {
            job_id,
            outcome: match result {
                Ok(_) => JobOutcome::Delivered,
                Err(err) if err.kind.is_timeout() => JobOutcome::TimedOut,
                Err(err) => JobOutcome::Failed {
                    detail: err.to_string(),
                },
            },
        },
    }
}

fn map_job(job: DownloadJob) -> DownloadRequest {
    DownloadRequest {
        job_id: job.job_id,
        source_url: job.source_url,
        destination: job.destination,
        headers: job.headers,
        timeout: job.timeout,
    }
}

fn map_report(report: PollReport) -> PollSummary {
    PollSummary {
        partitions: report.partitions,
        failed_partitions: report.failed_partitions,
        urls: report.urls,
        error: report.error,
    }
}

fn map_source(source: SourceKind) -> DiscoverySource {
    match source {
        SourceKind::ResourceFeed => DiscoverySource::ResourceFeed,
        SourceKind::CacheStorage => DiscoverySource::CacheStorage,
    }
}
