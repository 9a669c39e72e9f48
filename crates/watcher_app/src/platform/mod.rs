pub mod app;
pub mod commands;
pub mod config;
pub mod effects;
pub mod logging;
pub mod persistence;
pub mod render;

pub use app::run_app;
