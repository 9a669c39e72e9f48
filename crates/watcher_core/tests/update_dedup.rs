use std::sync::Once;

use pretty_assertions::assert_eq;
use watcher_core::{
    update, CanonicalKey, DiscoverySource, DownloadJob, Effect, JobOutcome, Msg, WatcherOptions,
    WatcherState, DEFAULT_DOWNLOAD_TIMEOUT,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(watcher_logging::initialize_for_tests);
}

fn active_with_pattern(pattern: &str) -> WatcherState {
    let options = WatcherOptions {
        document_url: Some("https://viewer.example/doc.html".to_string()),
        ..WatcherOptions::default()
    };
    let (state, _) = update(
        WatcherState::with_options(options),
        Msg::PatternEntered(pattern.to_string()),
    );
    let (state, _) = update(state, Msg::FolderEntered("pages".to_string()));
    let (state, _) = update(state, Msg::StartRequested);
    state
}

fn found(state: WatcherState, source: DiscoverySource, url: &str) -> (WatcherState, Vec<Effect>) {
    update(
        state,
        Msg::CandidateFound {
            source,
            url: url.to_string(),
        },
    )
}

fn from_feed(state: WatcherState, url: &str) -> (WatcherState, Vec<Effect>) {
    found(state, DiscoverySource::ResourceFeed, url)
}

fn from_cache(state: WatcherState, url: &str) -> (WatcherState, Vec<Effect>) {
    found(state, DiscoverySource::CacheStorage, url)
}

fn jobs(effects: &[Effect]) -> Vec<DownloadJob> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Download(job) => Some(job.clone()),
            _ => None,
        })
        .collect()
}

fn finish(state: WatcherState, job_id: u64, outcome: JobOutcome) -> WatcherState {
    let (state, effects) = update(state, Msg::DownloadFinished { job_id, outcome });
    assert!(effects.is_empty());
    state
}

#[test]
fn candidates_are_discarded_while_idle() {
    init_logging();
    let (state, _) = update(WatcherState::new(), Msg::PatternEntered(r"\.png".into()));
    let (state, effects) = from_feed(state, "http://h/img1.png");

    assert!(effects.is_empty());
    assert!(state.seen().is_empty());
    assert_eq!(state.totals().ignored_while_idle, 1);
}

#[test]
fn query_variants_produce_a_single_job() {
    init_logging();
    let state = active_with_pattern(r"/img\d+\.png/i");

    let (state, first) = from_feed(state, "http://h/img1.png?x=1");
    let (state, second) = from_feed(state, "http://h/img1.png?x=2");

    assert_eq!(
        jobs(&first),
        vec![DownloadJob {
            job_id: 1,
            key: CanonicalKey::from_url("http://h/img1.png"),
            source_url: "http://h/img1.png?x=1".to_string(),
            destination: "pages/img1.png".to_string(),
            headers: vec![(
                "Referer".to_string(),
                "https://viewer.example/doc.html".to_string()
            )],
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }]
    );
    assert!(second.is_empty());
    assert_eq!(state.totals().dispatched, 1);
    assert_eq!(state.view().in_flight, 1);
}

#[test]
fn both_sources_racing_for_a_key_dispatch_once() {
    init_logging();
    let state = active_with_pattern(r"\.jpg$");

    let (state, feed) = from_feed(state, "https://cdn.example/a/pageimg1.jpg");
    let (state, cache) = from_cache(state, "https://cdn.example/a/pageimg1.jpg");
    let (state, cache_again) = from_cache(state, "https://cdn.example/a/pageimg1.jpg");

    assert_eq!(jobs(&feed).len(), 1);
    assert!(cache.is_empty());
    assert!(cache_again.is_empty());
    assert_eq!(state.seen().len(), 1);
}

#[test]
fn non_matching_candidates_are_ignored() {
    init_logging();
    let state = active_with_pattern(r"/img\d+\.png/i");
    let (state, effects) = from_cache(state, "http://h/app.js");

    assert!(effects.is_empty());
    assert!(state.seen().is_empty());
}

#[test]
fn failed_download_is_retried_exactly_once_on_next_detection() {
    init_logging();
    let state = active_with_pattern(r"/img\d+\.png/i");
    let (state, effects) = from_feed(state, "http://h/img1.png");
    let job_id = jobs(&effects)[0].job_id;

    let state = finish(
        state,
        job_id,
        JobOutcome::Failed {
            detail: "http status 503".to_string(),
        },
    );
    assert!(state.seen().is_empty());
    assert_eq!(state.totals().failed, 1);

    let (state, retry) = from_cache(state, "http://h/img1.png?cache=1");
    let (state, again) = from_feed(state, "http://h/img1.png");

    let retry = jobs(&retry);
    assert_eq!(retry.len(), 1);
    assert_ne!(retry[0].job_id, job_id);
    assert!(again.is_empty());
    assert_eq!(state.totals().dispatched, 2);
}

#[test]
fn timed_out_download_releases_the_key() {
    init_logging();
    let state = active_with_pattern(r"\.png");
    let (state, effects) = from_feed(state, "http://h/img1.png");
    let job_id = jobs(&effects)[0].job_id;

    let state = finish(state, job_id, JobOutcome::TimedOut);
    assert_eq!(state.totals().timed_out, 1);

    let (_state, retry) = from_feed(state, "http://h/img1.png");
    assert_eq!(jobs(&retry).len(), 1);
}

#[test]
fn delivered_resource_is_never_dispatched_again() {
    init_logging();
    let state = active_with_pattern(r"\.png");
    let (state, effects) = from_feed(state, "http://h/img1.png");
    let state = finish(state, jobs(&effects)[0].job_id, JobOutcome::Delivered);

    let (state, again) = from_cache(state, "http://h/img1.png?v=2");
    assert!(again.is_empty());
    assert_eq!(state.view().delivered, 1);
    assert_eq!(state.totals().delivered, 1);
}

#[test]
fn stop_does_not_cancel_in_flight_jobs() {
    init_logging();
    let state = active_with_pattern(r"\.png");
    let (state, effects) = from_feed(state, "http://h/img1.png");
    let job_id = jobs(&effects)[0].job_id;

    let (state, _) = update(state, Msg::StopRequested);
    assert_eq!(state.view().jobs.len(), 1);

    let state = finish(state, job_id, JobOutcome::Delivered);
    assert_eq!(state.seen().delivered(), 1);
    assert!(state.view().jobs.is_empty());

    let (state, _) = update(state, Msg::StartRequested);
    let (_state, effects) = from_cache(state, "http://h/img1.png");
    assert!(effects.is_empty());
}

#[test]
fn failure_reported_after_stop_allows_dispatch_after_restart() {
    init_logging();
    let state = active_with_pattern(r"\.png");
    let (state, effects) = from_feed(state, "http://h/img1.png");
    let job_id = jobs(&effects)[0].job_id;

    let (state, _) = update(state, Msg::StopRequested);
    let state = finish(
        state,
        job_id,
        JobOutcome::Failed {
            detail: "network error".to_string(),
        },
    );

    let (state, _) = update(state, Msg::StartRequested);
    let (_state, effects) = from_cache(state, "http://h/img1.png");
    assert_eq!(jobs(&effects).len(), 1);
}

#[test]
fn pattern_change_makes_downloaded_resources_eligible_again() {
    init_logging();
    let state = active_with_pattern(r"\.png");
    let (state, effects) = from_feed(state, "http://h/photo.png");
    let state = finish(state, jobs(&effects)[0].job_id, JobOutcome::Delivered);

    let (state, _) = update(state, Msg::PatternEntered("photo".into()));
    assert!(state.seen().is_empty());

    let (_state, effects) = from_cache(state, "http://h/photo.png");
    assert_eq!(jobs(&effects).len(), 1);
}

#[test]
fn pattern_change_keeps_a_running_job_sole_owner_of_its_key() {
    init_logging();
    let state = active_with_pattern(r"\.png");
    let (state, effects) = from_feed(state, "http://h/img1.png");
    let running = jobs(&effects)[0].job_id;

    let (state, _) = update(state, Msg::PatternEntered(r"img\d".into()));
    let (state, again) = from_feed(state, "http://h/img1.png");
    let (state, cached) = from_cache(state, "http://h/img1.png?v=3");

    assert!(again.is_empty());
    assert!(cached.is_empty());
    assert_eq!(state.totals().dispatched, 1);
    assert_eq!(state.view().in_flight, 1);
    assert_eq!(state.view().jobs.len(), 1);

    let state = finish(
        state,
        running,
        JobOutcome::Failed {
            detail: "connection reset".to_string(),
        },
    );
    assert!(state.seen().is_empty());

    let (_state, retry) = from_cache(state, "http://h/img1.png");
    let retry = jobs(&retry);
    assert_eq!(retry.len(), 1);
    assert_ne!(retry[0].job_id, running);
}

#[test]
fn malformed_candidates_never_dispatch() {
    init_logging();
    let state = active_with_pattern(".*");

    let (state, query_only) = from_feed(state, "?x");
    let (state, relative) = from_cache(state, "pageimg1.jpg");
    let (state, garbage) = from_feed(state, "not a url");

    assert!(query_only.is_empty());
    assert!(relative.is_empty());
    assert!(garbage.is_empty());
    assert!(state.seen().is_empty());
    assert_eq!(state.totals().dispatched, 0);
}

#[test]
fn unknown_completion_is_ignored() {
    init_logging();
    let state = active_with_pattern(r"\.png");
    let before = state.clone();
    let (state, effects) = update(
        state,
        Msg::DownloadFinished {
            job_id: 99,
            outcome: JobOutcome::Delivered,
        },
    );

    assert!(effects.is_empty());
    assert_eq!(state.seen(), before.seen());
    assert_eq!(state.totals(), before.totals());
}

#[test]
fn jobs_without_document_url_carry_no_referer() {
    init_logging();
    let (state, _) = update(WatcherState::new(), Msg::PatternEntered(r"\.png".into()));
    let (state, _) = update(state, Msg::StartRequested);
    let (_state, effects) = from_feed(state, "http://h/files/");

    assert!(effects.is_empty());

    let (state, _) = update(WatcherState::new(), Msg::PatternEntered("files".into()));
    let (state, _) = update(state, Msg::StartRequested);
    let (_state, effects) = from_feed(state, "http://h/files/?page=2");
    let job = &jobs(&effects)[0];
    assert!(job.headers.is_empty());
    assert_eq!(job.destination, "Resource_Downloads/index");
}
