use std::collections::BTreeMap;
use std::time::Duration;

use watcher_logging::{watcher_info, watcher_warn};

use crate::view_model::{JobRowView, StatusView};
use crate::{
    sanitize_folder, DownloadJob, PatternStore, ResourceMatch, SeenSet, SettingKey, SettingsStore,
    DEFAULT_FOLDER,
};

pub type JobId = u64;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5_000);
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_millis(20_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationState {
    #[default]
    Idle,
    Active,
}

/// Host-provided knobs that are not user settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherOptions {
    /// Sent as `Referer` with every download when present.
    pub document_url: Option<String>,
    pub poll_interval: Duration,
    pub download_timeout: Duration,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            document_url: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }
}

/// Counters for the whole process lifetime; never reset by stop or pattern changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionTotals {
    pub dispatched: u64,
    pub delivered: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub ignored_while_idle: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherState {
    activation: ActivationState,
    epoch: u64,
    patterns: PatternStore,
    seen: SeenSet,
    folder: String,
    options: WatcherOptions,
    jobs: BTreeMap<JobId, DownloadJob>,
    next_job_id: JobId,
    totals: SessionTotals,
    last_error: Option<String>,
    dirty: bool,
}

impl Default for WatcherState {
    fn default() -> Self {
        Self::with_options(WatcherOptions::default())
    }
}

impl WatcherState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: WatcherOptions) -> Self {
        Self {
            activation: ActivationState::Idle,
            epoch: 0,
            patterns: PatternStore::with_default(),
            seen: SeenSet::new(),
            folder: DEFAULT_FOLDER.to_string(),
            options,
            jobs: BTreeMap::new(),
            next_job_id: 1,
            totals: SessionTotals::default(),
            last_error: None,
            dirty: false,
        }
    }

    /// Builds the initial state from stored settings.
    ///
    /// An unusable stored pattern is replaced by the default, both here and in
    /// the store.
    pub fn load(options: WatcherOptions, settings: &mut dyn SettingsStore) -> Self {
        let mut state = Self::with_options(options);

        let stored_folder = settings.get(SettingKey::DestinationFolder);
        state.folder = stored_folder
            .as_deref()
            .and_then(sanitize_folder)
            .unwrap_or_else(|| DEFAULT_FOLDER.to_string());

        let stored_pattern = settings.get(SettingKey::MatchPattern);
        let (patterns, replaced) = PatternStore::from_stored(stored_pattern.as_deref());
        if replaced {
            let default = patterns.current_rule().source().to_string();
            if let Err(err) = settings.set(SettingKey::MatchPattern, &default) {
                watcher_warn!("Could not store default pattern: {}", err);
            }
        }
        state.patterns = patterns;
        watcher_info!(
            "Watcher initialized: folder={} pattern={}",
            state.folder,
            state.patterns.current_rule().source()
        );
        state
    }

    pub fn activation(&self) -> ActivationState {
        self.activation
    }

    pub fn is_active(&self) -> bool {
        self.activation == ActivationState::Active
    }

    /// Activation counter; bumps on every Idle → Active transition.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn options(&self) -> &WatcherOptions {
        &self.options
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn patterns(&self) -> &PatternStore {
        &self.patterns
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn totals(&self) -> SessionTotals {
        self.totals
    }

    pub fn job(&self, job_id: JobId) -> Option<&DownloadJob> {
        self.jobs.get(&job_id)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn view(&self) -> StatusView {
        StatusView {
            activation: self.activation,
            folder: self.folder.clone(),
            pattern: self.patterns.current_rule().source().to_string(),
            reserved: self.seen.len(),
            in_flight: self.seen.in_flight(),
            delivered: self.seen.delivered(),
            totals: self.totals,
            jobs: self
                .jobs
                .values()
                .map(|job| JobRowView {
                    job_id: job.job_id,
                    key: job.key.to_string(),
                    destination: job.destination.clone(),
                })
                .collect(),
            last_error: self.last_error.clone(),
            dirty: self.dirty,
        }
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Idle → Active. Returns the new epoch.
    pub(crate) fn activate(&mut self) -> u64 {
        self.activation = ActivationState::Active;
        self.epoch += 1;
        self.mark_dirty();
        self.epoch
    }

    pub(crate) fn deactivate(&mut self) {
        self.activation = ActivationState::Idle;
        self.mark_dirty();
    }

    pub(crate) fn set_folder(&mut self, folder: String) {
        self.folder = folder;
        self.mark_dirty();
    }

    pub(crate) fn patterns_mut(&mut self) -> &mut PatternStore {
        &mut self.patterns
    }

    pub(crate) fn seen_mut(&mut self) -> &mut SeenSet {
        &mut self.seen
    }

    pub(crate) fn set_last_error(&mut self, message: Option<String>) {
        self.last_error = message;
        self.mark_dirty();
    }

    pub(crate) fn note_ignored(&mut self) {
        self.totals.ignored_while_idle += 1;
    }

    /// Runs the dedup gate for `found` and, if this call wins, records the job.
    pub(crate) fn reserve(&mut self, found: ResourceMatch, source_url: &str) -> Option<DownloadJob> {
        let job_id = self.next_job_id;
        if !self.seen.try_reserve(&found.key, job_id) {
            return None;
        }
        self.next_job_id += 1;

        let destination = if self.folder.is_empty() {
            found.name
        } else {
            format!("{}/{}", self.folder, found.name)
        };
        let headers = self
            .options
            .document_url
            .iter()
            .map(|referer| ("Referer".to_string(), referer.clone()))
            .collect();
        let job = DownloadJob {
            job_id,
            key: found.key,
            source_url: source_url.to_string(),
            destination,
            headers,
            timeout: self.options.download_timeout,
        };
        self.jobs.insert(job_id, job.clone());
        self.totals.dispatched += 1;
        self.mark_dirty();
        Some(job)
    }

    pub(crate) fn take_job(&mut self, job_id: JobId) -> Option<DownloadJob> {
        self.jobs.remove(&job_id)
    }

    pub(crate) fn totals_mut(&mut self) -> &mut SessionTotals {
        &mut self.totals
    }
}
