//! Watcher core: pure detection/dedup state machine and view-model helpers.
mod effect;
mod matcher;
mod msg;
mod pattern;
mod seen;
mod settings;
mod state;
mod update;
mod view_model;

pub use effect::{DownloadJob, Effect};
pub use matcher::{evaluate, CanonicalKey, ResourceMatch, FALLBACK_NAME};
pub use msg::{DiscoverySource, JobOutcome, Msg, PollSummary};
pub use pattern::{MatchRule, PatternStore, ValidationError, DEFAULT_PATTERN};
pub use seen::SeenSet;
pub use settings::{
    sanitize_folder, MemorySettings, SettingKey, SettingsError, SettingsStore, DEFAULT_FOLDER,
};
pub use state::{
    ActivationState, JobId, SessionTotals, WatcherOptions, WatcherState, DEFAULT_DOWNLOAD_TIMEOUT,
    DEFAULT_POLL_INTERVAL,
};
pub use update::update;
pub use view_model::{JobRowView, StatusView};
