//! Model descriptors: identity, file name, engine kind and the opaque
//! per-engine configuration map.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::error::RuntimeError;

/// Configuration key marking a model shipped inside the application bundle.
pub const KEY_IS_BUNDLED: &str = "isBundled";
/// Thread-count hint understood by every backend.
pub const KEY_THREADS: &str = "threads";
/// Optional SHA-256 of the model file, verified after staging.
pub const KEY_SHA256: &str = "sha256";

/// Which native inference technology handles a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// llama.cpp-style causal language model (GGUF).
    LanguageModel,
    /// Generic tensor-graph interpreter (TFLite flatbuffers).
    TensorGraph,
    /// Text-to-speech pipeline.
    SpeechSynthesis,
}

impl EngineKind {
    pub const ALL: [EngineKind; 3] = [
        EngineKind::LanguageModel,
        EngineKind::TensorGraph,
        EngineKind::SpeechSynthesis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LanguageModel => "language_model",
            Self::TensorGraph => "tensor_graph",
            Self::SpeechSynthesis => "speech_synthesis",
        }
    }

    /// Fixed subdirectory under `<documents>/models/` for downloaded files.
    pub fn storage_dir(&self) -> &'static str {
        match self {
            Self::LanguageModel => "llm",
            Self::TensorGraph => "tensor_graph",
            Self::SpeechSynthesis => "tts",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "language_model" | "llm" | "llama" => Ok(Self::LanguageModel),
            "tensor_graph" | "tflite" => Ok(Self::TensorGraph),
            "speech_synthesis" | "tts" => Ok(Self::SpeechSynthesis),
            other => Err(RuntimeError::UnsupportedEngine(other.to_string())),
        }
    }
}

/// Engine-specific options. Opaque to the registry; each backend reads the
/// keys it understands and ignores the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelConfig(BTreeMap<String, Value>);

impl ModelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_bundled(&self) -> bool {
        self.get_bool(KEY_IS_BUNDLED).unwrap_or(false)
    }

    /// Thread-count hint; 0 means "let the backend decide".
    pub fn threads(&self) -> u32 {
        self.get_u32(KEY_THREADS).unwrap_or(0)
    }

    pub fn sha256(&self) -> Option<&str> {
        self.get(KEY_SHA256).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get_i64(key).and_then(|v| u32::try_from(v).ok())
    }

    pub fn get_f32(&self, key: &str) -> Option<f32> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64().map(|v| v as f32),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Describes one loadable model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Unique model identifier (e.g., "qwen-0.5b-q4").
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Asset-relative or storage-relative file name.
    pub file_name: String,
    /// Backend selector.
    pub engine_kind: EngineKind,
    #[serde(default)]
    pub configuration: ModelConfig,
}

impl ModelDescriptor {
    pub fn new(
        id: impl Into<String>,
        file_name: impl Into<String>,
        engine_kind: EngineKind,
    ) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            file_name: file_name.into(),
            engine_kind,
            configuration: ModelConfig::default(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_config(mut self, configuration: ModelConfig) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn is_bundled(&self) -> bool {
        self.configuration.is_bundled()
    }

    /// Parse a descriptor from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, RuntimeError> {
        let descriptor: Self = serde_json::from_str(json)
            .map_err(|e| RuntimeError::InvalidDescriptor(format!("invalid descriptor JSON: {e}")))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Validate descriptor fields for correctness.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.id.trim().is_empty() {
            return Err(RuntimeError::InvalidDescriptor("id cannot be empty".into()));
        }
        if self.file_name.trim().is_empty() {
            return Err(RuntimeError::InvalidDescriptor(format!(
                "model '{}' has an empty file name",
                self.id
            )));
        }
        if is_rooted(&self.file_name) {
            return Err(RuntimeError::InvalidDescriptor(format!(
                "model '{}' file name must be relative: {}",
                self.id, self.file_name
            )));
        }
        if self.file_name.split(['/', '\\']).any(|part| part == "..") {
            return Err(RuntimeError::InvalidDescriptor(format!(
                "model '{}' file name escapes its directory: {}",
                self.id, self.file_name
            )));
        }
        if let Some(hash) = self.configuration.sha256() {
            if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(RuntimeError::InvalidDescriptor(format!(
                    "model '{}' sha256 must be 64 hex characters",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// True for absolute, UNC and drive-prefixed paths, which would replace the
/// root they are joined onto. Windows forms are recognized on every host.
pub(crate) fn is_rooted(file_name: &str) -> bool {
    let bytes = file_name.as_bytes();
    let drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    drive
        || file_name.starts_with(['/', '\\'])
        || Path::new(file_name)
            .components()
            .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
}
