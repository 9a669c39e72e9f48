#![deny(missing_docs)]
//! Shared logging utilities for the watcher workspace.
//!
//! This crate provides the `watcher_*` logging macros used across the codebase,
//! the cache poll cycle counter that tags poller output, and a minimal test
//! initializer for the global logger.

use std::sync::atomic::{AtomicU64, Ordering};

/// Number of the most recently started cache poll cycle, process wide.
static POLL_CYCLE: AtomicU64 = AtomicU64::new(0);

/// Records that a new cache poll cycle started and returns its number.
pub fn begin_poll_cycle() -> u64 {
    POLL_CYCLE.fetch_add(1, Ordering::Relaxed) + 1
}

/// Retrieves the number of the most recently started cache poll cycle.
/// Returns 0 if no poll has run yet.
pub fn poll_cycle() -> u64 {
    POLL_CYCLE.load(Ordering::Relaxed)
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! watcher_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! watcher_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! watcher_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! watcher_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! watcher_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Another test may have installed the logger already.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
