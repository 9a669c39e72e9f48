//! Command-line flags; each one overrides the matching config file value.

use std::path::PathBuf;

use clap::Parser;

use crate::platform::config::WatcherConfig;
use crate::platform::logging::LogDestination;

/// Watches a page's resource loads and cache storage, downloading every
/// resource that matches the active pattern exactly once.
#[derive(Parser, Debug)]
#[command(name = "watcher")]
#[command(author, version, about)]
pub struct Args {
    /// RON config file (defaults to ./watcher.ron when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory downloads are written below
    #[arg(short = 'o', long)]
    pub download_root: Option<PathBuf>,

    /// Page URL sent as Referer with every download
    #[arg(short = 'u', long)]
    pub document_url: Option<String>,

    /// Directory of cache partition manifests (<name>.json)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Settings file holding the folder and pattern
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Milliseconds between cache polls (10-3600000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(10..=3_600_000))]
    pub poll_interval_ms: Option<u64>,

    /// Milliseconds before a download is abandoned (1-600000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=600_000))]
    pub download_timeout_ms: Option<u64>,

    /// Where log output goes
    #[arg(long, value_enum)]
    pub log: Option<LogDestination>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn apply_to(&self, config: &mut WatcherConfig) {
        if let Some(root) = &self.download_root {
            config.download_root = root.clone();
        }
        if let Some(url) = &self.document_url {
            config.document_url = Some(url.clone());
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = Some(dir.clone());
        }
        if let Some(path) = &self.settings {
            config.settings_path = path.clone();
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(ms) = self.download_timeout_ms {
            config.download_timeout_ms = ms;
        }
        if let Some(destination) = self.log {
            config.log_destination = destination;
        }
        match self.verbose {
            0 => {}
            1 => config.log_level = "debug".to_string(),
            _ => config.log_level = "trace".to_string(),
        }
    }
}
