//! Runtime error types for the engine core.
//!
//! Every failure inside a backend is converted to a `RuntimeError` at the
//! backend boundary. Nothing is downgraded to an empty or default result.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::lifecycle::EngineState;
use crate::models::EngineKind;
use crate::native::NativeError;
use crate::staging::StagingError;

/// Errors surfaced by engines and the registry.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Unsupported engine kind: {0}")]
    UnsupportedEngine(String),

    #[error("Invalid model descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Model file not found for '{model_id}': {}", path.display())]
    ModelNotFound { model_id: String, path: PathBuf },

    #[error("Model '{model_id}' is too small to hold a format signature: {size} bytes, need at least {minimum}")]
    TooSmall {
        model_id: String,
        size: usize,
        minimum: usize,
    },

    #[error("Hash mismatch for model {model_id}: expected {expected}, got {actual}")]
    HashMismatch {
        model_id: String,
        expected: String,
        actual: String,
    },

    #[error("Native construction failed for '{model_id}': {primary}; fallback: {fallback}")]
    NativeConstruction {
        model_id: String,
        primary: String,
        fallback: String,
    },

    #[error("No model loaded in {0} engine")]
    NotLoaded(EngineKind),

    #[error("Invalid state for {engine} engine: expected {expected}, found {actual}")]
    InvalidState {
        engine: EngineKind,
        expected: EngineState,
        actual: EngineState,
    },

    #[error("{engine} engine already has '{current}' loaded; unload it first")]
    AlreadyLoaded { engine: EngineKind, current: String },

    #[error("No voice style loaded; call load_style before synthesis")]
    StyleNotLoaded,

    #[error("{operation} is not supported by the {engine} engine: {reason}")]
    Unsupported {
        engine: EngineKind,
        operation: &'static str,
        reason: &'static str,
    },

    #[error("Inference failed: {0}")]
    Inference(#[from] NativeError),

    #[error("Worker for {0} engine stopped unexpectedly")]
    WorkerGone(EngineKind),

    #[error("Staging failed: {0}")]
    Staging(#[from] StagingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used by callers to decide on remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad descriptor or registry setup. Never retried.
    Configuration,
    /// Model file missing. Caller may download and retry.
    ResourceNotFound,
    /// File present but unusable.
    MalformedModel,
    /// Both native loading strategies failed.
    NativeConstruction,
    /// Call issued in the wrong lifecycle state.
    InvalidState,
    /// Documented engine limitation.
    Unsupported,
    /// Runtime failure during inference or I/O.
    Execution,
}

impl RuntimeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsupportedEngine(_) | Self::InvalidDescriptor(_) | Self::InvalidConfig(_) => {
                ErrorCategory::Configuration
            }
            Self::ModelNotFound { .. } => ErrorCategory::ResourceNotFound,
            Self::Staging(StagingError::SourceMissing(_)) => ErrorCategory::ResourceNotFound,
            Self::TooSmall { .. } | Self::HashMismatch { .. } => ErrorCategory::MalformedModel,
            Self::NativeConstruction { .. } => ErrorCategory::NativeConstruction,
            Self::NotLoaded(_)
            | Self::InvalidState { .. }
            | Self::AlreadyLoaded { .. }
            | Self::StyleNotLoaded => ErrorCategory::InvalidState,
            Self::Unsupported { .. } => ErrorCategory::Unsupported,
            Self::Inference(_) | Self::WorkerGone(_) | Self::Staging(_) | Self::Io(_) => {
                ErrorCategory::Execution
            }
        }
    }

    /// Returns true if retrying the same call can succeed after remediation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::ResourceNotFound | ErrorCategory::Execution
        )
    }

    /// Returns true if this error reports a caller sequencing mistake.
    pub fn is_precondition(&self) -> bool {
        self.category() == ErrorCategory::InvalidState
    }
}
