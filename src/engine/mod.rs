//! Engine layer: the `RuntimeEngine` contract, the three backends and the
//! pieces they share (lifecycle cell, worker thread, load steps, streams).

pub mod config;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod llm;
pub mod loader;
pub mod runtime;
pub mod signature;
pub mod speech;
pub mod streaming;
pub mod worker;

pub use config::{GenerationConfig, SynthesisParams};
pub use error::{ErrorCategory, RuntimeError};
pub use graph::TensorGraphEngine;
pub use lifecycle::EngineState;
pub use llm::LanguageModelEngine;
pub use loader::{EngineContext, LoadStrategy};
pub use runtime::RuntimeEngine;
pub use signature::{FormatSignature, SignatureCheck};
pub use speech::{AudioStream, SpeechSynthesisEngine, Waveform};
pub use streaming::{OutputStream, TextStream};
