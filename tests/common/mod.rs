//! Shared fixtures: a counting fake binding for all three engines and a
//! runtime rooted in a temp directory.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ondevice_core::models::EngineKind;
use ondevice_core::native::{
    GraphBinding, GraphInterpreter, InterpreterParams, LanguageModelBinding, LanguageModelSession,
    LlmLoadParams, NativeError, SpeechBinding, SpeechSynthesizer,
};
use ondevice_core::{Bindings, Runtime, RuntimeConfig};
use tempfile::TempDir;

pub const GGUF_MODEL: &[u8] = b"GGUF\x03\0\0\0fake-weights";
pub const TFLITE_MODEL: &[u8] = b"\x1c\0\0\0TFL3fake-graph";
pub const SPEECH_MODEL: &[u8] = b"speech-model-bytes";
pub const SAMPLE_RATE: u32 = 24_000;

/// Which construction strategies fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct Behavior {
    pub fail_file: bool,
    pub fail_buffer: bool,
    pub load_delay: Option<Duration>,
}

/// Records every native call and counts live handles.
#[derive(Default)]
pub struct FakeBinding {
    pub behavior: Behavior,
    pub calls: Mutex<Vec<&'static str>>,
    pub paths: Mutex<Vec<PathBuf>>,
    pub live: Arc<AtomicUsize>,
    pub invocations: Arc<AtomicUsize>,
    pub disposed: AtomicBool,
}

impl FakeBinding {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    fn from_file(&self, path: &Path) -> Result<FakeHandle, NativeError> {
        if let Some(delay) = self.behavior.load_delay {
            std::thread::sleep(delay);
        }
        self.calls.lock().unwrap().push("file");
        self.paths.lock().unwrap().push(path.to_path_buf());
        if self.behavior.fail_file {
            return Err(NativeError::new("fake", "file loading rejected"));
        }
        Ok(self.handle())
    }

    fn from_buffer(&self, bytes: &[u8]) -> Result<FakeHandle, NativeError> {
        self.calls.lock().unwrap().push("buffer");
        if self.behavior.fail_buffer || bytes.is_empty() {
            return Err(NativeError::new("fake", "buffer loading rejected"));
        }
        Ok(self.handle())
    }

    fn handle(&self) -> FakeHandle {
        self.live.fetch_add(1, Ordering::SeqCst);
        FakeHandle {
            live: Arc::clone(&self.live),
            invocations: Arc::clone(&self.invocations),
            style: None,
        }
    }
}

pub struct FakeHandle {
    live: Arc<AtomicUsize>,
    invocations: Arc<AtomicUsize>,
    style: Option<String>,
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl LanguageModelSession for FakeHandle {
    fn model_size(&self) -> u64 {
        GGUF_MODEL.len() as u64
    }
}

impl GraphInterpreter for FakeHandle {
    fn invoke(&mut self, input: &[f32]) -> Result<Vec<f32>, NativeError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if input.is_empty() {
            return Err(NativeError::new("fake", "empty input tensor"));
        }
        Ok(input.iter().map(|x| x * 2.0).collect())
    }
}

impl SpeechSynthesizer for FakeHandle {
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn set_style(&mut self, name: &str, style: &[u8]) -> Result<(), NativeError> {
        serde_json::from_slice::<serde_json::Value>(style)
            .map_err(|e| NativeError::new("fake", format!("bad style json: {e}")))?;
        self.style = Some(name.to_string());
        Ok(())
    }

    /// One sample per character, valued by the style name's length.
    fn synthesize(&mut self, text: &str, _steps: u32, _speed: f32) -> Result<Vec<f32>, NativeError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let style = self
            .style
            .as_ref()
            .ok_or_else(|| NativeError::new("fake", "no style"))?;
        Ok(vec![style.len() as f32; text.chars().count()])
    }
}

impl LanguageModelBinding for FakeBinding {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn load_from_file(
        &self,
        path: &Path,
        _params: &LlmLoadParams,
    ) -> Result<Box<dyn LanguageModelSession>, NativeError> {
        Ok(Box::new(self.from_file(path)?))
    }

    fn load_from_buffer(
        &self,
        bytes: &[u8],
        _params: &LlmLoadParams,
    ) -> Result<Box<dyn LanguageModelSession>, NativeError> {
        Ok(Box::new(self.from_buffer(bytes)?))
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

impl GraphBinding for FakeBinding {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn load_from_file(
        &self,
        path: &Path,
        _params: &InterpreterParams,
    ) -> Result<Box<dyn GraphInterpreter>, NativeError> {
        Ok(Box::new(self.from_file(path)?))
    }

    fn load_from_buffer(
        &self,
        bytes: &[u8],
        _params: &InterpreterParams,
    ) -> Result<Box<dyn GraphInterpreter>, NativeError> {
        Ok(Box::new(self.from_buffer(bytes)?))
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

impl SpeechBinding for FakeBinding {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn load_from_file(
        &self,
        path: &Path,
        _params: &InterpreterParams,
    ) -> Result<Box<dyn SpeechSynthesizer>, NativeError> {
        Ok(Box::new(self.from_file(path)?))
    }

    fn load_from_buffer(
        &self,
        bytes: &[u8],
        _params: &InterpreterParams,
    ) -> Result<Box<dyn SpeechSynthesizer>, NativeError> {
        Ok(Box::new(self.from_buffer(bytes)?))
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

/// A runtime whose three engines all use one fake binding.
pub struct Fixture {
    pub dir: TempDir,
    pub runtime: Runtime,
    pub binding: Arc<FakeBinding>,
}

impl Fixture {
    pub fn new(behavior: Behavior) -> Self {
        Self::with_stream_buffer(behavior, 16)
    }

    pub fn with_stream_buffer(behavior: Behavior, stream_buffer: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let binding = FakeBinding::new(behavior);
        let config = RuntimeConfig {
            documents_dir: dir.path().join("documents"),
            asset_dir: dir.path().join("assets"),
            temp_dir: dir.path().join("tmp"),
            default_threads: 2,
            stream_buffer,
        };
        let bindings = Bindings {
            language_model: binding.clone(),
            tensor_graph: binding.clone(),
            speech: binding.clone(),
        };
        let runtime = Runtime::new(config, bindings).unwrap();
        Self {
            dir,
            runtime,
            binding,
        }
    }

    /// Write a bundled asset.
    pub fn write_asset(&self, relative: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join("assets").join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, bytes).unwrap();
        path
    }

    /// Write a downloaded model into durable storage.
    pub fn write_storage(&self, kind: EngineKind, relative: &str, bytes: &[u8]) -> PathBuf {
        let path = self
            .dir
            .path()
            .join("documents")
            .join("models")
            .join(kind.storage_dir())
            .join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, bytes).unwrap();
        path
    }
}
