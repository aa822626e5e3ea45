//! Contracts for the three native inference engines.
//!
//! Each binding exposes construct-from-file and construct-from-buffer. The
//! returned handle is exclusively owned by one engine worker and released
//! when dropped. Inference calls on a handle block the calling thread, so the
//! engines only ever invoke them from their worker.

mod unavailable;

#[cfg(feature = "gguf")]
pub mod llama;

pub use unavailable::Unavailable;

use std::path::Path;

use thiserror::Error;

/// Failure reported by a native binding.
#[derive(Debug, Clone, Error)]
#[error("{binding}: {message}")]
pub struct NativeError {
    pub binding: &'static str,
    pub message: String,
}

impl NativeError {
    pub fn new(binding: &'static str, message: impl Into<String>) -> Self {
        Self {
            binding,
            message: message.into(),
        }
    }
}

/// GPU offload request for the language-model engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuOffload {
    Disabled,
    Layers(u32),
    /// Offload as many layers as the device accepts.
    Max,
}

impl GpuOffload {
    /// Layer count passed to llama.cpp for maximum offload.
    pub const MAX_LAYERS: u32 = 999;

    /// 0 disables the GPU, negative values request maximum offload.
    pub fn from_config(value: i64) -> Self {
        match value {
            0 => Self::Disabled,
            v if v < 0 => Self::Max,
            v => Self::Layers(u32::try_from(v).unwrap_or(Self::MAX_LAYERS)),
        }
    }

    pub fn layer_count(&self) -> u32 {
        match self {
            Self::Disabled => 0,
            Self::Layers(n) => *n,
            Self::Max => Self::MAX_LAYERS,
        }
    }
}

/// Options for loading a language model.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmLoadParams {
    pub n_threads: u32,
    pub n_ctx: u32,
    pub n_batch: u32,
    pub gpu: GpuOffload,
}

/// Options shared by the tensor-graph and speech bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpreterParams {
    pub n_threads: u32,
}

/// Loaded language model. Generation is not wired through the runtime yet,
/// so the handle only reports what it holds.
pub trait LanguageModelSession: Send {
    fn model_size(&self) -> u64;
}

/// Loaded tensor graph.
pub trait GraphInterpreter: Send {
    /// Run the graph once on a flat f32 input tensor.
    fn invoke(&mut self, input: &[f32]) -> Result<Vec<f32>, NativeError>;
}

/// Loaded speech synthesizer.
pub trait SpeechSynthesizer: Send {
    fn sample_rate(&self) -> u32;

    /// Install a voice style. May be called again to switch voices.
    fn set_style(&mut self, name: &str, style: &[u8]) -> Result<(), NativeError>;

    /// Synthesize one text chunk with the installed style.
    fn synthesize(&mut self, text: &str, steps: u32, speed: f32) -> Result<Vec<f32>, NativeError>;
}

pub trait LanguageModelBinding: Send + Sync {
    fn name(&self) -> &'static str;

    fn load_from_file(
        &self,
        path: &Path,
        params: &LlmLoadParams,
    ) -> Result<Box<dyn LanguageModelSession>, NativeError>;

    fn load_from_buffer(
        &self,
        bytes: &[u8],
        params: &LlmLoadParams,
    ) -> Result<Box<dyn LanguageModelSession>, NativeError>;

    /// Release process-wide state held beyond any single model.
    fn dispose(&self) {}
}

pub trait GraphBinding: Send + Sync {
    fn name(&self) -> &'static str;

    fn load_from_file(
        &self,
        path: &Path,
        params: &InterpreterParams,
    ) -> Result<Box<dyn GraphInterpreter>, NativeError>;

    fn load_from_buffer(
        &self,
        bytes: &[u8],
        params: &InterpreterParams,
    ) -> Result<Box<dyn GraphInterpreter>, NativeError>;

    fn dispose(&self) {}
}

pub trait SpeechBinding: Send + Sync {
    fn name(&self) -> &'static str;

    fn load_from_file(
        &self,
        path: &Path,
        params: &InterpreterParams,
    ) -> Result<Box<dyn SpeechSynthesizer>, NativeError>;

    fn load_from_buffer(
        &self,
        bytes: &[u8],
        params: &InterpreterParams,
    ) -> Result<Box<dyn SpeechSynthesizer>, NativeError>;

    fn dispose(&self) {}
}
