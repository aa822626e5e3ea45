//! Telemetry for the engine core.
//!
//! Structured logging setup and lifecycle metrics. Output goes to a file or
//! stderr; no network exporters.

mod logging;
mod metrics;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{
    record_call, record_fallback, record_load_failure, record_load_success, record_unload,
};
