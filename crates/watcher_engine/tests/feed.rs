use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use watcher_engine::{
    Candidate, CandidateSink, ChannelCandidateSink, EventFeed, MemoryTimeline, SourceKind,
};

fn channel_sink() -> (Arc<dyn CandidateSink>, mpsc::UnboundedReceiver<Candidate>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChannelCandidateSink::new(tx)), rx)
}

async fn next_url(rx: &mut mpsc::UnboundedReceiver<Candidate>) -> String {
    let candidate = time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("candidate in time")
        .expect("sink open");
    assert_eq!(candidate.source, SourceKind::ResourceFeed);
    candidate.url
}

async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<Candidate>) {
    let extra = time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(extra.is_err(), "unexpected candidate: {extra:?}");
}

#[tokio::test]
async fn arming_replays_buffer_then_forwards_live_entries() {
    let timeline = Arc::new(MemoryTimeline::new());
    timeline.record("http://h/pageimg1.jpg");
    let mut feed = EventFeed::new(timeline.clone());
    let (sink, mut rx) = channel_sink();

    feed.arm(sink);
    assert!(feed.is_armed());
    assert_eq!(next_url(&mut rx).await, "http://h/pageimg1.jpg");

    timeline.record("http://h/pageimg2.jpg");
    assert_eq!(next_url(&mut rx).await, "http://h/pageimg2.jpg");
}

#[tokio::test]
async fn disarmed_feed_forwards_nothing() {
    let timeline = Arc::new(MemoryTimeline::new());
    let mut feed = EventFeed::new(timeline.clone());
    let (sink, mut rx) = channel_sink();

    feed.arm(sink);
    feed.disarm();
    assert!(!feed.is_armed());
    timeline.record("http://h/pageimg1.jpg");

    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn rearming_skips_entries_already_forwarded() {
    let timeline = Arc::new(MemoryTimeline::new());
    let mut feed = EventFeed::new(timeline.clone());
    let (sink, mut rx) = channel_sink();

    feed.arm(sink.clone());
    timeline.record("http://h/a.jpg");
    assert_eq!(next_url(&mut rx).await, "http://h/a.jpg");
    feed.disarm();

    timeline.record("http://h/b.jpg");
    feed.arm(sink);
    assert_eq!(next_url(&mut rx).await, "http://h/b.jpg");
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn arming_twice_keeps_a_single_subscription() {
    let timeline = Arc::new(MemoryTimeline::new());
    let mut feed = EventFeed::new(timeline.clone());
    let (sink, mut rx) = channel_sink();

    feed.arm(sink.clone());
    feed.arm(sink);
    timeline.record("http://h/once.jpg");

    assert_eq!(next_url(&mut rx).await, "http://h/once.jpg");
    assert_quiet(&mut rx).await;
}

/// Sink that shuts the feed down from inside its first delivery.
struct DisarmingSink {
    feed: Arc<Mutex<Option<EventFeed>>>,
    tx: mpsc::UnboundedSender<Candidate>,
}

impl CandidateSink for DisarmingSink {
    fn offer(&self, candidate: Candidate) {
        let _ = self.tx.send(candidate);
        if let Some(feed) = self.feed.lock().unwrap().as_mut() {
            feed.disarm();
        }
    }
}

#[tokio::test]
async fn disarming_from_inside_a_delivery_stops_forwarding() {
    let timeline = Arc::new(MemoryTimeline::new());
    timeline.record("http://h/first.jpg");
    timeline.record("http://h/second.jpg");
    let feed = Arc::new(Mutex::new(Some(EventFeed::new(timeline.clone()))));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = Arc::new(DisarmingSink {
        feed: feed.clone(),
        tx,
    });

    if let Some(armed) = feed.lock().unwrap().as_mut() {
        armed.arm(sink);
    }

    assert_eq!(next_url(&mut rx).await, "http://h/first.jpg");
    assert_quiet(&mut rx).await;
    timeline.record("http://h/third.jpg");
    assert_quiet(&mut rx).await;
    assert!(!feed.lock().unwrap().as_ref().unwrap().is_armed());
}
