//! Metrics for engine lifecycle events via the `metrics` facade.
//!
//! No exporter is installed here; the embedding application decides where
//! the values go.

use std::time::Duration;

use crate::engine::error::RuntimeError;
use crate::engine::loader::LoadStrategy;
use crate::models::EngineKind;

pub fn record_load_success(kind: EngineKind, strategy: LoadStrategy, elapsed: Duration) {
    ::metrics::counter!(
        "ondevice_model_loads_total",
        "engine" => kind.as_str(),
        "strategy" => strategy.as_str()
    )
    .increment(1);
    ::metrics::histogram!("ondevice_model_load_seconds", "engine" => kind.as_str())
        .record(elapsed.as_secs_f64());
}

pub fn record_load_failure(kind: EngineKind, error: &RuntimeError) {
    ::metrics::counter!(
        "ondevice_model_load_failures_total",
        "engine" => kind.as_str(),
        "category" => format!("{:?}", error.category())
    )
    .increment(1);
}

pub fn record_fallback(kind: EngineKind) {
    ::metrics::counter!("ondevice_buffer_fallbacks_total", "engine" => kind.as_str()).increment(1);
}

pub fn record_unload(kind: EngineKind) {
    ::metrics::counter!("ondevice_model_unloads_total", "engine" => kind.as_str()).increment(1);
}

pub fn record_call(kind: EngineKind, operation: &'static str, elapsed: Duration) {
    ::metrics::histogram!(
        "ondevice_call_seconds",
        "engine" => kind.as_str(),
        "operation" => operation
    )
    .record(elapsed.as_secs_f64());
}
