use watcher_logging::{watcher_debug, watcher_info, watcher_trace, watcher_warn};

use crate::{
    evaluate, sanitize_folder, DiscoverySource, Effect, JobId, JobOutcome, Msg, PollSummary,
    SettingKey, WatcherState, DEFAULT_FOLDER,
};

/// Pure update function: applies a message to state and returns any effects.
///
/// Nothing in here suspends, so every compound step (dedup check-and-insert,
/// rule swap plus ledger clear) is atomic with respect to other messages.
pub fn update(mut state: WatcherState, msg: Msg) -> (WatcherState, Vec<Effect>) {
    let effects = match msg {
        Msg::ToggleRequested => {
            if state.is_active() {
                stop(&mut state)
            } else {
                start(&mut state)
            }
        }
        Msg::StartRequested => start(&mut state),
        Msg::StopRequested => stop(&mut state),
        Msg::FolderEntered(raw) => configure_folder(&mut state, &raw),
        Msg::PatternEntered(source) => configure_pattern(&mut state, &source),
        Msg::CandidateFound { source, url } => candidate_found(&mut state, source, &url),
        Msg::InitialPollFinished { epoch, summary } => {
            initial_poll_finished(&mut state, epoch, &summary)
        }
        Msg::DownloadFinished { job_id, outcome } => {
            download_finished(&mut state, job_id, outcome);
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn start(state: &mut WatcherState) -> Vec<Effect> {
    if state.is_active() {
        return Vec::new();
    }
    let epoch = state.activate();
    watcher_info!("Detection activated (epoch {})", epoch);
    vec![Effect::ArmFeed, Effect::PollCache { epoch }]
}

fn stop(state: &mut WatcherState) -> Vec<Effect> {
    if !state.is_active() {
        return Vec::new();
    }
    state.deactivate();
    watcher_info!(
        "Detection deactivated; {} download(s) still in flight",
        state.seen().in_flight()
    );
    vec![Effect::DisarmFeed, Effect::UnschedulePolling]
}

fn configure_folder(state: &mut WatcherState, raw: &str) -> Vec<Effect> {
    let mut effects = Vec::with_capacity(2);
    let folder = match sanitize_folder(raw) {
        Some(folder) => folder,
        None => {
            effects.push(Effect::ShowNotice(format!(
                "Folder name cannot be empty. Using default: {DEFAULT_FOLDER}"
            )));
            DEFAULT_FOLDER.to_string()
        }
    };
    watcher_info!("Destination folder set to {}", folder);
    state.set_folder(folder.clone());
    effects.push(Effect::PersistSetting {
        key: SettingKey::DestinationFolder,
        value: folder,
    });
    effects
}

fn configure_pattern(state: &mut WatcherState, source: &str) -> Vec<Effect> {
    let swapped = state.patterns_mut().set_rule(source).map(|_| ());
    if let Err(err) = swapped {
        watcher_warn!("Rejected pattern: {}", err);
        let message = err.to_string();
        state.set_last_error(Some(message.clone()));
        return vec![Effect::ShowError(message)];
    }

    // Running jobs keep their keys until they report back.
    let forgotten = state.seen_mut().forget_delivered();
    state.set_last_error(None);
    watcher_info!(
        "Pattern set to {}; forgot {} downloaded resource(s), {} still in flight",
        source,
        forgotten,
        state.seen().in_flight()
    );

    let mut effects = vec![
        Effect::PersistSetting {
            key: SettingKey::MatchPattern,
            value: source.to_string(),
        },
        Effect::ShowNotice(format!("Pattern set to {source}; detected list cleared")),
    ];
    if state.is_active() {
        effects.extend(stop(state));
        effects.extend(start(state));
        watcher_info!("Detection restarted with the new pattern");
    }
    effects
}

fn candidate_found(state: &mut WatcherState, source: DiscoverySource, url: &str) -> Vec<Effect> {
    if !state.is_active() {
        state.note_ignored();
        watcher_trace!("Ignoring {:?} candidate while idle: {}", source, url);
        return Vec::new();
    }
    let Some(found) = evaluate(url, state.patterns().current_rule()) else {
        return Vec::new();
    };
    match state.reserve(found, url) {
        Some(job) => {
            watcher_info!(
                "[{:?}] New resource {} -> {} (job {})",
                source,
                job.key,
                job.destination,
                job.job_id
            );
            vec![Effect::Download(job)]
        }
        None => Vec::new(),
    }
}

fn initial_poll_finished(state: &mut WatcherState, epoch: u64, summary: &PollSummary) -> Vec<Effect> {
    match &summary.error {
        Some(error) => watcher_warn!("Initial cache poll failed: {}", error),
        None => watcher_debug!(
            "Initial cache poll done: {} partition(s), {} failed, {} url(s)",
            summary.partitions,
            summary.failed_partitions,
            summary.urls
        ),
    }
    if !state.is_active() || epoch != state.epoch() {
        watcher_debug!(
            "Initial poll for epoch {} finished after the activation it belonged to",
            epoch
        );
        return Vec::new();
    }
    vec![Effect::SchedulePolling {
        interval: state.options().poll_interval,
    }]
}

fn download_finished(state: &mut WatcherState, job_id: JobId, outcome: JobOutcome) {
    let Some(job) = state.take_job(job_id) else {
        watcher_warn!("Completion for unknown job {}", job_id);
        return;
    };
    match outcome {
        JobOutcome::Delivered => {
            state.seen_mut().mark_delivered(&job.key, job_id);
            state.totals_mut().delivered += 1;
            watcher_info!("Downloaded {} to {}", job.key, job.destination);
        }
        JobOutcome::Failed { detail } => {
            state.seen_mut().release(&job.key, job_id);
            state.totals_mut().failed += 1;
            watcher_warn!("Download of {} failed: {}", job.key, detail);
        }
        JobOutcome::TimedOut => {
            state.seen_mut().release(&job.key, job_id);
            state.totals_mut().timed_out += 1;
            watcher_warn!("Download of {} timed out after {:?}", job.key, job.timeout);
        }
    }
    state.mark_dirty();
}
