//! Logging system configuration and initialization
//!
//! Console and optional rolling file output through `tracing`, with the
//! level and per-module filters driven by [`LoggingConfig`]. `RUST_LOG`
//! overrides the configured levels when set.

use anyhow::Result;
use lazy_static::lazy_static;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking file writer alive for the process lifetime.
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

/// Log directory next to the working directory.
pub fn get_log_directory() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("logs")
}

/// Initialize the logging system with default configuration.
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Initialize the logging system from configuration.
///
/// Safe to call more than once; subsequent calls are no-ops because the
/// global subscriber is already installed.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let filter = build_env_filter(config);

    let console_layer = if config.console_output {
        Some(fmt::layer().with_target(true))
    } else {
        None
    };

    let file_layer = if config.file_output {
        let log_dir = get_log_directory();
        std::fs::create_dir_all(&log_dir)?;
        let appender = rolling::daily(log_dir, "review-agent.log");
        let (writer, guard) = non_blocking(appender);
        if let Ok(mut guards) = LOG_GUARDS.lock() {
            guards.push(guard);
        }
        Some(fmt::layer().with_ansi(false).with_writer(writer))
    } else {
        None
    };

    let _ = Registry::default()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    Ok(())
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let mut directives = vec![config.level.clone()];
    for (module, level) in &config.module_filters {
        directives.push(format!("{module}={level}"));
    }

    EnvFilter::try_new(directives.join(","))
        .unwrap_or_else(|_| EnvFilter::new(crate::infrastructure::config::defaults::LOG_LEVEL))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_includes_module_directives() {
        let mut config = LoggingConfig::default();
        config.level = "debug".to_string();
        config.module_filters.clear();
        config
            .module_filters
            .insert("hyper".to_string(), "error".to_string());

        let filter = build_env_filter(&config);
        let rendered = filter.to_string();
        assert!(rendered.contains("hyper=error"));
    }

    #[test]
    fn init_is_idempotent() {
        assert!(init_logging().is_ok());
        assert!(init_logging().is_ok());
    }
}
