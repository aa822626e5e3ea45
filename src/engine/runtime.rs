//! The capability contract shared by every backend.

use async_trait::async_trait;

use super::config::GenerationConfig;
use super::error::RuntimeError;
use super::lifecycle::EngineState;
use super::streaming::TextStream;
use crate::models::{EngineKind, ModelDescriptor};

/// Uniform lifecycle over incompatible native inference engines.
///
/// One model may be loaded per engine at a time. Calls to the same engine
/// must be serialized by the caller; violations surface as
/// [`RuntimeError::InvalidState`] rather than being queued.
#[async_trait]
pub trait RuntimeEngine: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Load `descriptor`. Requires the engine to be unloaded. On failure
    /// every partially created native resource is released before the
    /// error is returned.
    async fn load_model(&self, descriptor: &ModelDescriptor) -> Result<(), RuntimeError>;

    /// One-shot text generation.
    async fn generate(&self, prompt: &str, config: &GenerationConfig)
        -> Result<String, RuntimeError>;

    /// Incremental text generation. Fully consuming the stream is
    /// equivalent to one `generate` call; dropping it cancels.
    async fn generate_stream(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<TextStream, RuntimeError>;

    /// Release the loaded model. Calling it when nothing is loaded is a no-op.
    async fn unload(&self) -> Result<(), RuntimeError>;

    /// Release process-wide resources held beyond a model's lifetime.
    async fn dispose(&self) -> Result<(), RuntimeError>;

    fn state(&self) -> EngineState;

    fn is_loaded(&self) -> bool;

    fn current_model(&self) -> Option<ModelDescriptor>;
}
