//! Configuration management for minised
//!
//! minised reads optional settings from `~/.minised/config.toml`, or from the
//! file named by `$MINISED_CONFIG`. Command-line flags override them.

use crate::cli::RegexFlavor;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an alternative config file
pub const CONFIG_ENV: &str = "MINISED_CONFIG";

/// minised configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Processing settings
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Regex settings
    #[serde(default)]
    pub regex: RegexConfig,

    /// Debug log settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Suppress automatic printing, like -n
    #[serde(default = "default_quiet")]
    pub quiet: Option<bool>,

    /// Wrap width for the `l` command, like -l
    #[serde(default = "default_line_wrap")]
    pub line_wrap: Option<usize>,

    /// What `N` does on the last line: "discard" or "print"
    #[serde(default = "default_final_next_append")]
    pub final_next_append: Option<String>,

    /// Flush output after every line, like -u
    #[serde(default = "default_unbuffered")]
    pub unbuffered: Option<bool>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            quiet: Some(false),
            line_wrap: Some(70),
            final_next_append: Some("discard".to_string()),
            unbuffered: Some(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegexConfig {
    /// Regex syntax: "bre" (default) or "ere"
    #[serde(default = "default_syntax")]
    pub syntax: Option<String>,
}

impl Default for RegexConfig {
    fn default() -> Self {
        Self {
            syntax: Some("bre".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write a debug log
    #[serde(default)]
    pub debug: Option<bool>,

    /// Log file; defaults to ~/.minised/minised.log
    #[serde(default)]
    pub file: Option<PathBuf>,
}

// Default functions for serde
fn default_quiet() -> Option<bool> { Some(false) }
fn default_line_wrap() -> Option<usize> { Some(70) }
fn default_final_next_append() -> Option<String> { Some("discard".to_string()) }
fn default_unbuffered() -> Option<bool> { Some(false) }
fn default_syntax() -> Option<String> { Some("bre".to_string()) }

/// What `N` does when there is no next line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinalNextAppend {
    /// Quit without printing the pattern space
    #[default]
    Discard,
    /// Print the pattern space (unless quiet), then quit
    Print,
}

/// Settings the compiler and engine run with, after merging defaults, the
/// config file and command-line flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingOptions {
    pub quiet: bool,
    pub regex_flavor: RegexFlavor,
    pub line_wrap: usize,
    pub final_next_append: FinalNextAppend,
    pub unbuffered: bool,
    /// Each input file is its own stream
    pub separate: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            quiet: false,
            regex_flavor: RegexFlavor::BRE,
            line_wrap: 70,
            final_next_append: FinalNextAppend::Discard,
            unbuffered: false,
            separate: false,
        }
    }
}

impl ProcessingOptions {
    /// Options from a validated config
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        let regex_flavor = match config.regex.syntax.as_deref() {
            Some("ere") => RegexFlavor::ERE,
            _ => RegexFlavor::BRE,
        };
        let final_next_append = match config.processing.final_next_append.as_deref() {
            Some("print") => FinalNextAppend::Print,
            _ => FinalNextAppend::Discard,
        };

        Self {
            quiet: config.processing.quiet.unwrap_or(defaults.quiet),
            regex_flavor,
            line_wrap: config.processing.line_wrap.unwrap_or(defaults.line_wrap),
            final_next_append,
            unbuffered: config.processing.unbuffered.unwrap_or(defaults.unbuffered),
            separate: defaults.separate,
        }
    }
}

/// Get the configuration file path
pub fn config_file_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    let home_dir = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home_dir.join(".minised").join("config.toml"))
}

/// Load configuration, falling back to defaults when no file exists
pub fn load_config() -> Result<Config> {
    match config_file_path() {
        Ok(path) => load_config_from(&path),
        // No home directory means no config file
        Err(_) => Ok(Config::default()),
    }
}

/// Load and validate the configuration at `path`
///
/// A missing file yields the defaults. A malformed file is an error.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    validate_config(&config)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    Ok(config)
}

/// Validate configuration values
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(syntax) = &config.regex.syntax {
        if !["bre", "ere"].contains(&syntax.as_str()) {
            anyhow::bail!("Invalid regex syntax: {} (must be 'bre' or 'ere')", syntax);
        }
    }

    if let Some(policy) = &config.processing.final_next_append {
        if !["discard", "print"].contains(&policy.as_str()) {
            anyhow::bail!(
                "Invalid final_next_append: {} (must be 'discard' or 'print')",
                policy
            );
        }
    }

    if let Some(width) = config.processing.line_wrap {
        if width > 10_000 {
            anyhow::bail!("Invalid line_wrap: {} (max 10000)", width);
        }
    }

    Ok(())
}
