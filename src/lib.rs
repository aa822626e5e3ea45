//! On-device inference runtime core.
//!
//! A uniform lifecycle over incompatible native inference engines: a
//! GGUF language-model engine, a tensor-graph interpreter and a
//! speech-synthesis engine. Each engine is a state machine
//! (`Unloaded -> Loading -> Loaded <-> Generating -> Unloading`) that owns one
//! native handle on a dedicated worker thread.
//!
//! # Layout
//!
//! - `models`: descriptors and catalogs
//! - `staging`: descriptor to durably written local file
//! - `native`: binding contracts for the native engines
//! - `engine`: the `RuntimeEngine` contract and the three backends
//! - `registry`: engine-kind dispatch

pub mod cli;
pub mod config;
pub mod engine;
pub mod models;
pub mod native;
pub mod registry;
pub mod staging;
pub mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use engine::EngineContext;
use native::{GraphBinding, LanguageModelBinding, SpeechBinding, Unavailable};
use registry::RuntimeRegistry;
use staging::{DirAssetSource, ModelStorage, StagingArea, StagingResolver};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub documents_dir: PathBuf,
    pub asset_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub default_threads: u32,
    pub stream_buffer: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let paths = config::PathConfig::default();
        Self {
            documents_dir: paths.documents_dir,
            asset_dir: paths.asset_dir,
            temp_dir: paths.temp_dir,
            default_threads: 0,
            stream_buffer: 16,
        }
    }
}

impl From<&config::EnvConfig> for RuntimeConfig {
    fn from(env: &config::EnvConfig) -> Self {
        Self {
            documents_dir: env.paths.documents_dir.clone(),
            asset_dir: env.paths.asset_dir.clone(),
            temp_dir: env.paths.temp_dir.clone(),
            default_threads: env.default_threads,
            stream_buffer: env.stream_buffer,
        }
    }
}

/// Native bindings wired into the registry.
#[derive(Clone)]
pub struct Bindings {
    pub language_model: Arc<dyn LanguageModelBinding>,
    pub tensor_graph: Arc<dyn GraphBinding>,
    pub speech: Arc<dyn SpeechBinding>,
}

impl Bindings {
    /// Bindings compiled into this build. Engines without one fail to load
    /// with a message saying what is missing.
    pub fn compiled() -> Self {
        #[cfg(feature = "gguf")]
        let language_model: Arc<dyn LanguageModelBinding> =
            Arc::new(native::llama::LlamaBinding::new());
        #[cfg(not(feature = "gguf"))]
        let language_model: Arc<dyn LanguageModelBinding> = Arc::new(Unavailable::new(
            "GGUF support not compiled in. Enable 'gguf' feature.",
        ));

        Self {
            language_model,
            tensor_graph: Arc::new(Unavailable::new(
                "no tensor-graph interpreter is linked into this build",
            )),
            speech: Arc::new(Unavailable::new(
                "no speech synthesizer is linked into this build",
            )),
        }
    }
}

/// The runtime instance: a staging area plus the engine registry.
pub struct Runtime {
    pub registry: Arc<RuntimeRegistry>,
    pub staging: Arc<StagingArea>,
}

impl Runtime {
    /// Create a runtime. Creates the staging area under `temp_dir`.
    pub fn new(config: RuntimeConfig, bindings: Bindings) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.temp_dir)?;
        let staging = Arc::new(StagingArea::create_in(&config.temp_dir)?);
        let resolver = StagingResolver::new(
            Arc::new(DirAssetSource::new(config.asset_dir)),
            ModelStorage::new(config.documents_dir),
        );
        let ctx = EngineContext::new(resolver, Arc::clone(&staging))
            .with_stream_buffer(config.stream_buffer)
            .with_default_threads(config.default_threads);

        let registry = RuntimeRegistry::builder(ctx)
            .language_model(bindings.language_model)
            .tensor_graph(bindings.tensor_graph)
            .speech_synthesis(bindings.speech)
            .build();

        tracing::debug!(staging = %staging.path().display(), "runtime created");
        Ok(Self {
            registry: Arc::new(registry),
            staging,
        })
    }

    /// Unload every engine and release binding state.
    pub async fn shutdown(&self) -> Result<(), engine::RuntimeError> {
        self.registry.dispose_all().await
    }
}
