//! Language-model backend (GGUF via llama.cpp).
//!
//! Bundled models are staged into the temp area; downloaded models are
//! loaded in place. Loading, unloading and disposal are fully supported.
//! Text generation is not wired to the native session yet: once a model is
//! loaded, `generate` and `generate_stream` report `Unsupported`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::config::GenerationConfig;
use super::error::RuntimeError;
use super::lifecycle::{EngineCell, EngineState, LoadLease};
use super::loader::{self, EngineContext, LoadStrategy};
use super::runtime::RuntimeEngine;
use super::signature;
use super::streaming::TextStream;
use super::worker::Worker;
use crate::models::{EngineKind, ModelConfig, ModelDescriptor};
use crate::native::{GpuOffload, LanguageModelBinding, LanguageModelSession, LlmLoadParams};
use crate::telemetry;

pub const KEY_CONTEXT_SIZE: &str = "contextSize";
pub const KEY_BATCH_SIZE: &str = "batchSize";
pub const KEY_GPU_LAYERS: &str = "nGpuLayers";

const DEFAULT_CONTEXT_SIZE: u32 = 2048;
const MIN_CONTEXT_SIZE: u32 = 128;
const DEFAULT_BATCH_SIZE: u32 = 512;

const GENERATION_PENDING: &str =
    "text generation is not wired to the native session in this release";

type Session = Box<dyn LanguageModelSession>;

/// Translate descriptor configuration into llama.cpp load options.
pub fn load_params(ctx: &EngineContext, config: &ModelConfig) -> LlmLoadParams {
    LlmLoadParams {
        n_threads: ctx.threads_for(config),
        n_ctx: config
            .get_u32(KEY_CONTEXT_SIZE)
            .unwrap_or(DEFAULT_CONTEXT_SIZE)
            .max(MIN_CONTEXT_SIZE),
        n_batch: config
            .get_u32(KEY_BATCH_SIZE)
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_BATCH_SIZE),
        gpu: GpuOffload::from_config(config.get_i64(KEY_GPU_LAYERS).unwrap_or(0)),
    }
}

pub struct LanguageModelEngine {
    binding: Arc<dyn LanguageModelBinding>,
    ctx: EngineContext,
    cell: EngineCell<Session>,
}

impl LanguageModelEngine {
    pub fn new(binding: Arc<dyn LanguageModelBinding>, ctx: EngineContext) -> Self {
        Self {
            binding,
            ctx,
            cell: EngineCell::new(EngineKind::LanguageModel),
        }
    }

    /// Size in bytes reported by the loaded native model.
    pub async fn model_size(&self) -> Result<u64, RuntimeError> {
        let (_busy, client) = self.cell.begin_call()?;
        client.call(|session: &mut Session| session.model_size()).await
    }

    /// Local path of the model file, plus its digest when staging computed one.
    async fn locate(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<(PathBuf, Option<String>), RuntimeError> {
        if descriptor.is_bundled() {
            let staged = self
                .ctx
                .resolver
                .ensure_local_file(descriptor, self.ctx.staging_dir())
                .await
                .map_err(|e| loader::staging_failure(descriptor, e))?;
            Ok((staged.path, Some(staged.sha256)))
        } else {
            let path = self
                .ctx
                .resolver
                .resolve_in_place(descriptor)
                .await
                .map_err(|e| loader::staging_failure(descriptor, e))?;
            Ok((path, None))
        }
    }

    async fn open(
        &self,
        descriptor: &ModelDescriptor,
        lease: LoadLease,
    ) -> Result<(Worker<Session>, LoadStrategy), RuntimeError> {
        let (path, digest) = self.locate(descriptor).await?;
        loader::check_header(descriptor, &path, &[signature::GGUF]).await?;
        loader::verify_integrity(descriptor, &path, digest.as_deref()).await?;

        let params = load_params(&self.ctx, &descriptor.configuration);
        tracing::debug!(
            model_id = %descriptor.id,
            binding = self.binding.name(),
            n_threads = params.n_threads,
            n_ctx = params.n_ctx,
            n_batch = params.n_batch,
            gpu_layers = params.gpu.layer_count(),
            "constructing language model"
        );

        let file_binding = Arc::clone(&self.binding);
        let buffer_binding = Arc::clone(&self.binding);
        let buffer_params = params.clone();
        let (session, strategy) = loader::construct(
            descriptor,
            lease,
            path,
            move |p| file_binding.load_from_file(p, &params),
            move |bytes| buffer_binding.load_from_buffer(bytes, &buffer_params),
        )
        .await?;

        let worker = Worker::spawn(EngineKind::LanguageModel, session)?;
        Ok((worker, strategy))
    }
}

#[async_trait]
impl RuntimeEngine for LanguageModelEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::LanguageModel
    }

    async fn load_model(&self, descriptor: &ModelDescriptor) -> Result<(), RuntimeError> {
        loader::load_with(&self.cell, descriptor, |lease| self.open(descriptor, lease)).await
    }

    async fn generate(
        &self,
        _prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String, RuntimeError> {
        self.cell.ensure_loaded()?;
        config.validate()?;
        Err(RuntimeError::Unsupported {
            engine: EngineKind::LanguageModel,
            operation: "generate",
            reason: GENERATION_PENDING,
        })
    }

    async fn generate_stream(
        &self,
        _prompt: &str,
        config: &GenerationConfig,
    ) -> Result<TextStream, RuntimeError> {
        self.cell.ensure_loaded()?;
        config.validate()?;
        Err(RuntimeError::Unsupported {
            engine: EngineKind::LanguageModel,
            operation: "generate_stream",
            reason: GENERATION_PENDING,
        })
    }

    async fn unload(&self) -> Result<(), RuntimeError> {
        if let Some(model) = self.cell.unload().await? {
            telemetry::record_unload(EngineKind::LanguageModel);
            tracing::info!(engine = %EngineKind::LanguageModel, model_id = %model.id, "model unloaded");
        }
        Ok(())
    }

    async fn dispose(&self) -> Result<(), RuntimeError> {
        self.unload().await?;
        self.binding.dispose();
        tracing::debug!(binding = self.binding.name(), "language model backend disposed");
        Ok(())
    }

    fn state(&self) -> EngineState {
        self.cell.state()
    }

    fn is_loaded(&self) -> bool {
        self.cell.is_loaded()
    }

    fn current_model(&self) -> Option<ModelDescriptor> {
        self.cell.current_model()
    }
}
