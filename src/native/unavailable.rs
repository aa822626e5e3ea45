//! Binding used when an engine was not compiled into this build.

use std::path::Path;

use super::{
    GraphBinding, GraphInterpreter, InterpreterParams, LanguageModelBinding, LanguageModelSession,
    LlmLoadParams, NativeError, SpeechBinding, SpeechSynthesizer,
};

/// Fails every construction with a fixed explanation, e.g. which cargo
/// feature would provide the engine.
#[derive(Debug, Clone, Copy)]
pub struct Unavailable {
    reason: &'static str,
}

impl Unavailable {
    pub const fn new(reason: &'static str) -> Self {
        Self { reason }
    }

    fn error(&self) -> NativeError {
        NativeError::new("unavailable", self.reason)
    }
}

impl LanguageModelBinding for Unavailable {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn load_from_file(
        &self,
        _path: &Path,
        _params: &LlmLoadParams,
    ) -> Result<Box<dyn LanguageModelSession>, NativeError> {
        Err(self.error())
    }

    fn load_from_buffer(
        &self,
        _bytes: &[u8],
        _params: &LlmLoadParams,
    ) -> Result<Box<dyn LanguageModelSession>, NativeError> {
        Err(self.error())
    }
}

impl GraphBinding for Unavailable {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn load_from_file(
        &self,
        _path: &Path,
        _params: &InterpreterParams,
    ) -> Result<Box<dyn GraphInterpreter>, NativeError> {
        Err(self.error())
    }

    fn load_from_buffer(
        &self,
        _bytes: &[u8],
        _params: &InterpreterParams,
    ) -> Result<Box<dyn GraphInterpreter>, NativeError> {
        Err(self.error())
    }
}

impl SpeechBinding for Unavailable {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn load_from_file(
        &self,
        _path: &Path,
        _params: &InterpreterParams,
    ) -> Result<Box<dyn SpeechSynthesizer>, NativeError> {
        Err(self.error())
    }

    fn load_from_buffer(
        &self,
        _bytes: &[u8],
        _params: &InterpreterParams,
    ) -> Result<Box<dyn SpeechSynthesizer>, NativeError> {
        Err(self.error())
    }
}
