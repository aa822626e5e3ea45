//! Config CLI subcommands: show, defaults.
//!
//! These commands read configuration directly from environment variables.

use crate::config::{self, EffectiveConfig, EnvConfig, PathConfig};
use crate::telemetry::LogConfig;

/// Print effective config as key-value pairs to stdout.
pub fn run_show() {
    let cfg = config::load().effective_config();
    print_config(&cfg);
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    let defaults = EnvConfig {
        paths: PathConfig::default(),
        default_threads: 0,
        stream_buffer: 16,
        log: LogConfig::default(),
    };
    print_config(&defaults.effective_config());
}

fn print_config(cfg: &EffectiveConfig) {
    println!("ONDEVICE_DOCUMENTS_DIR={}", cfg.documents_dir);
    println!("ONDEVICE_ASSET_DIR={}", cfg.asset_dir);
    println!("ONDEVICE_TEMP_DIR={}", cfg.temp_dir);
    println!("ONDEVICE_THREADS={}", cfg.default_threads);
    println!("ONDEVICE_STREAM_BUFFER={}", cfg.stream_buffer);
    println!("ONDEVICE_LOG_LEVEL={}", cfg.log_level);
    println!("ONDEVICE_LOG_FORMAT={}", cfg.log_format);
    println!("ONDEVICE_LOG_FILE={}", cfg.log_file.as_deref().unwrap_or(""));
}
