//! Debug logging support for minised
//!
//! When debug mode is enabled (`--debug` or `logging.debug` in the config),
//! compile and execution events are logged to a file. Logs go to the
//! configured file, otherwise ~/.minised/minised.log.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

/// Environment variable overriding the log filter
pub const LOG_FILTER_ENV: &str = "MINISED_LOG";

const DEFAULT_FILTER: &str = "minised=debug";

/// Initialize the debug logging system
///
/// If debug_enabled is true, sets up file logging.
/// Returns the path to the log file, or None if logging is not enabled.
pub fn init_debug_logging(debug_enabled: bool, log_file: Option<&Path>) -> Result<Option<PathBuf>> {
    if !debug_enabled {
        return Ok(None);
    }

    let log_path = get_log_path(log_file)?;

    // Ensure parent directory exists
    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()));

    match file {
        Ok(log_file) => {
            let subscriber = registry()
                .with(
                    fmt::layer()
                        .with_writer(log_file)
                        .with_ansi(false)
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false),
                )
                .with(env_filter());

            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

            Ok(Some(log_path))
        }
        Err(e) => {
            // Editing goes on without a log
            eprintln!("Warning: Could not create log file: {:#}", e);
            Ok(None)
        }
    }
}

/// Filter from `$MINISED_LOG`, or everything this crate logs at debug level
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Get the log file path: the configured one, else ~/.minised/minised.log
fn get_log_path(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }

    default_log_path().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))
}

/// Where the log goes when the config names no file
pub fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".minised").join("minised.log"))
}
