//! Tensor-graph backend (TFLite-style flatbuffers).
//!
//! The interpreter only accepts real files, so every model is staged first.
//! Text generation depends on the graph's architecture and is reported as
//! unsupported; [`TensorGraphEngine::run`] executes the graph directly.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::config::GenerationConfig;
use super::error::RuntimeError;
use super::lifecycle::{EngineCell, EngineState, LoadLease};
use super::loader::{self, EngineContext, LoadStrategy};
use super::runtime::RuntimeEngine;
use super::signature;
use super::streaming::TextStream;
use super::worker::Worker;
use crate::models::{EngineKind, ModelDescriptor};
use crate::native::{GraphBinding, GraphInterpreter, InterpreterParams};
use crate::telemetry;

const TEXT_GENERATION: &str = "text generation depends on the graph architecture; use run";

type Interpreter = Box<dyn GraphInterpreter>;

pub struct TensorGraphEngine {
    binding: Arc<dyn GraphBinding>,
    ctx: EngineContext,
    cell: EngineCell<Interpreter>,
}

impl TensorGraphEngine {
    pub fn new(binding: Arc<dyn GraphBinding>, ctx: EngineContext) -> Self {
        Self {
            binding,
            ctx,
            cell: EngineCell::new(EngineKind::TensorGraph),
        }
    }

    /// Execute the loaded graph once on a flat input tensor.
    pub async fn run(&self, input: Vec<f32>) -> Result<Vec<f32>, RuntimeError> {
        let (_busy, client) = self.cell.begin_call()?;
        let started = Instant::now();
        let output = client
            .call(move |interpreter: &mut Interpreter| interpreter.invoke(&input))
            .await?;
        telemetry::record_call(EngineKind::TensorGraph, "run", started.elapsed());
        output.map_err(|e| {
            tracing::error!(engine = %EngineKind::TensorGraph, error = %e, "graph invocation failed");
            RuntimeError::from(e)
        })
    }

    async fn open(
        &self,
        descriptor: &ModelDescriptor,
        lease: LoadLease,
    ) -> Result<(Worker<Interpreter>, LoadStrategy), RuntimeError> {
        let staged = self
            .ctx
            .resolver
            .ensure_local_file(descriptor, self.ctx.staging_dir())
            .await
            .map_err(|e| loader::staging_failure(descriptor, e))?;
        loader::check_header(descriptor, &staged.path, &[signature::TFLITE]).await?;
        loader::verify_integrity(descriptor, &staged.path, Some(&staged.sha256)).await?;

        let params = InterpreterParams {
            n_threads: self.ctx.threads_for(&descriptor.configuration),
        };
        let file_binding = Arc::clone(&self.binding);
        let buffer_binding = Arc::clone(&self.binding);
        let buffer_params = params.clone();
        let (interpreter, strategy) = loader::construct(
            descriptor,
            lease,
            staged.path,
            move |p| file_binding.load_from_file(p, &params),
            move |bytes| buffer_binding.load_from_buffer(bytes, &buffer_params),
        )
        .await?;

        let worker = Worker::spawn(EngineKind::TensorGraph, interpreter)?;
        Ok((worker, strategy))
    }
}

#[async_trait]
impl RuntimeEngine for TensorGraphEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::TensorGraph
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
            engine: EngineKind::TensorGraph,
            operation: "generate",
            reason: TEXT_GENERATION,
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
            engine: EngineKind::TensorGraph,
            operation: "generate_stream",
            reason: TEXT_GENERATION,
        })
    }

    async fn unload(&self) -> Result<(), RuntimeError> {
        if let Some(model) = self.cell.unload().await? {
            telemetry::record_unload(EngineKind::TensorGraph);
            tracing::info!(engine = %EngineKind::TensorGraph, model_id = %model.id, "model unloaded");
        }
        Ok(())
    }

    async fn dispose(&self) -> Result<(), RuntimeError> {
        self.unload().await?;
        self.binding.dispose();
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
