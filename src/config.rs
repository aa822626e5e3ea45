//! Runtime configuration loading from environment variables.
//!
//! All configuration values are loaded from `ONDEVICE_*` environment
//! variables with sensible defaults. Invalid values fall back to defaults
//! without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `ONDEVICE_DOCUMENTS_DIR` | `./documents` | Root of durable storage (`models/<engine>/...`) |
//! | `ONDEVICE_ASSET_DIR` | `./assets` | Bundled asset root |
//! | `ONDEVICE_TEMP_DIR` | system temp dir | Parent of the per-process staging area |
//! | `ONDEVICE_THREADS` | 0 | Default native threads when a model sets none (0 = auto) |
//! | `ONDEVICE_STREAM_BUFFER` | 16 | Output stream channel capacity |
//! | `ONDEVICE_LOG_LEVEL` | `info` | `tracing` filter directive |
//! | `ONDEVICE_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `ONDEVICE_LOG_FILE` | unset | Log to this file instead of stderr |

use std::path::PathBuf;

use crate::telemetry::{LogConfig, LogFormat};

const MAX_THREADS: u32 = 256;
const MAX_STREAM_BUFFER: usize = 4096;

/// Directory layout the runtime works in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConfig {
    pub documents_dir: PathBuf,
    pub asset_dir: PathBuf,
    pub temp_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("./documents"),
            asset_dir: PathBuf::from("./assets"),
            temp_dir: std::env::temp_dir(),
        }
    }
}

/// Effective runtime configuration summary.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub documents_dir: String,
    pub asset_dir: String,
    pub temp_dir: String,
    pub default_threads: u32,
    pub stream_buffer: usize,
    pub log_level: String,
    pub log_format: &'static str,
    pub log_file: Option<String>,
}

/// All runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub paths: PathConfig,
    pub default_threads: u32,
    pub stream_buffer: usize,
    pub log: LogConfig,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u32` env var, returning `default` on missing or invalid.
fn parse_u32(key: &str, default: u32) -> u32 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u32>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Non-empty path env var.
fn parse_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn load_paths() -> PathConfig {
    let defaults = PathConfig::default();
    PathConfig {
        documents_dir: parse_path("ONDEVICE_DOCUMENTS_DIR").unwrap_or(defaults.documents_dir),
        asset_dir: parse_path("ONDEVICE_ASSET_DIR").unwrap_or(defaults.asset_dir),
        temp_dir: parse_path("ONDEVICE_TEMP_DIR").unwrap_or(defaults.temp_dir),
    }
}

fn load_log_config() -> LogConfig {
    let defaults = LogConfig::default();
    let level = std::env::var("ONDEVICE_LOG_LEVEL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(defaults.level);
    let format = std::env::var("ONDEVICE_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or(defaults.format);
    LogConfig {
        format,
        level,
        file: parse_path("ONDEVICE_LOG_FILE"),
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let default_threads = parse_u32("ONDEVICE_THREADS", 0).min(MAX_THREADS);
    let stream_buffer = parse_usize("ONDEVICE_STREAM_BUFFER", 16).clamp(1, MAX_STREAM_BUFFER);

    EnvConfig {
        paths: load_paths(),
        default_threads,
        stream_buffer,
        log: load_log_config(),
    }
}

impl EnvConfig {
    /// Return a printable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            documents_dir: self.paths.documents_dir.display().to_string(),
            asset_dir: self.paths.asset_dir.display().to_string(),
            temp_dir: self.paths.temp_dir.display().to_string(),
            default_threads: self.default_threads,
            stream_buffer: self.stream_buffer,
            log_level: self.log.level.clone(),
            log_format: self.log.format.as_str(),
            log_file: self
                .log
                .file
                .as_ref()
                .map(|p| p.display().to_string()),
        }
    }
}
