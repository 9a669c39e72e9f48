use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use watcher_core::WatcherOptions;
use watcher_engine::DownloadSettings;

use super::logging::{parse_level, LogDestination};

/// Looked up in the working directory when no config path is given.
pub const DEFAULT_CONFIG_FILE: &str = "watcher.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse config {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("unknown log level {0:?}")]
    LogLevel(String),
}

/// Host configuration. Every field has a default, so a config file only
/// needs the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Downloads land in `<download_root>/<folder>/<name>`.
    pub download_root: PathBuf,
    /// Page the resources belong to; sent as `Referer`.
    pub document_url: Option<String>,
    pub poll_interval_ms: u64,
    pub download_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_download_bytes: u64,
    pub settings_path: PathBuf,
    /// Directory of cache partition manifests; in-memory cache when unset.
    pub cache_dir: Option<PathBuf>,
    pub log_destination: LogDestination,
    pub log_level: String,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        let download = DownloadSettings::default();
        let options = WatcherOptions::default();
        Self {
            download_root: PathBuf::from("downloads"),
            document_url: None,
            poll_interval_ms: duration_ms(options.poll_interval),
            download_timeout_ms: duration_ms(options.download_timeout),
            connect_timeout_ms: duration_ms(download.connect_timeout),
            max_download_bytes: download.max_bytes,
            settings_path: PathBuf::from("watcher_settings.ron"),
            cache_dir: None,
            log_destination: LogDestination::File,
            log_level: "info".to_string(),
        }
    }
}

impl WatcherConfig {
    /// Reads `path`, or `watcher.ron` if it exists, or falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&text).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    fn from_ron(text: &str) -> Result<Self, String> {
        ron::from_str(text).map_err(|err| err.to_string())
    }

    pub fn log_level(&self) -> Result<LevelFilter, ConfigError> {
        parse_level(&self.log_level).ok_or_else(|| ConfigError::LogLevel(self.log_level.clone()))
    }

    pub fn watcher_options(&self) -> WatcherOptions {
        WatcherOptions {
            document_url: self
                .document_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            download_timeout: Duration::from_millis(self.download_timeout_ms),
        }
    }

    pub fn download_settings(&self) -> DownloadSettings {
        DownloadSettings {
            root: self.download_root.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            max_bytes: self.max_download_bytes,
            ..DownloadSettings::default()
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
