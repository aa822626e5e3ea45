//! Dispatch table from engine kind to backend.
//!
//! Built once at startup and shared by `Arc`. The registry owns no load
//! state: every query goes to the backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::engine::{
    EngineContext, EngineState, GenerationConfig, LanguageModelEngine, RuntimeEngine,
    RuntimeError, SpeechSynthesisEngine, TensorGraphEngine, TextStream,
};
use crate::models::{EngineKind, ModelDescriptor};
use crate::native::{GraphBinding, LanguageModelBinding, SpeechBinding};

/// One registered backend.
#[derive(Clone)]
pub enum Backend {
    LanguageModel(Arc<LanguageModelEngine>),
    TensorGraph(Arc<TensorGraphEngine>),
    SpeechSynthesis(Arc<SpeechSynthesisEngine>),
}

impl Backend {
    /// The backend through the shared lifecycle contract.
    pub fn engine(&self) -> &dyn RuntimeEngine {
        match self {
            Self::LanguageModel(e) => e.as_ref(),
            Self::TensorGraph(e) => e.as_ref(),
            Self::SpeechSynthesis(e) => e.as_ref(),
        }
    }

    pub fn kind(&self) -> EngineKind {
        self.engine().kind()
    }
}

/// Snapshot of one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub kind: EngineKind,
    pub state: EngineState,
    pub model_id: Option<String>,
}

/// Assembles a registry from native bindings.
pub struct RegistryBuilder {
    ctx: EngineContext,
    backends: BTreeMap<EngineKind, Backend>,
}

impl RegistryBuilder {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            ctx,
            backends: BTreeMap::new(),
        }
    }

    pub fn language_model(mut self, binding: Arc<dyn LanguageModelBinding>) -> Self {
        let engine = LanguageModelEngine::new(binding, self.ctx.clone());
        self.backends
            .insert(EngineKind::LanguageModel, Backend::LanguageModel(Arc::new(engine)));
        self
    }

    pub fn tensor_graph(mut self, binding: Arc<dyn GraphBinding>) -> Self {
        let engine = TensorGraphEngine::new(binding, self.ctx.clone());
        self.backends
            .insert(EngineKind::TensorGraph, Backend::TensorGraph(Arc::new(engine)));
        self
    }

    pub fn speech_synthesis(mut self, binding: Arc<dyn SpeechBinding>) -> Self {
        let engine = SpeechSynthesisEngine::new(binding, self.ctx.clone());
        self.backends
            .insert(EngineKind::SpeechSynthesis, Backend::SpeechSynthesis(Arc::new(engine)));
        self
    }

    pub fn build(self) -> RuntimeRegistry {
        tracing::debug!(
            engines = ?self.backends.keys().map(EngineKind::as_str).collect::<Vec<_>>(),
            "runtime registry built"
        );
        RuntimeRegistry {
            backends: self.backends,
        }
    }
}

/// Closed mapping `EngineKind -> Backend`.
pub struct RuntimeRegistry {
    backends: BTreeMap<EngineKind, Backend>,
}

impl RuntimeRegistry {
    pub fn builder(ctx: EngineContext) -> RegistryBuilder {
        RegistryBuilder::new(ctx)
    }

    pub fn kinds(&self) -> impl Iterator<Item = EngineKind> + '_ {
        self.backends.keys().copied()
    }

    pub fn backend(&self, kind: EngineKind) -> Result<&Backend, RuntimeError> {
        self.backends
            .get(&kind)
            .ok_or_else(|| RuntimeError::UnsupportedEngine(kind.to_string()))
    }

    /// Backend for a descriptor's engine kind.
    pub fn resolve(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<&dyn RuntimeEngine, RuntimeError> {
        self.backend(descriptor.engine_kind).map(Backend::engine)
    }

    /// Backend for an engine kind given as text, e.g. from a catalog or CLI.
    pub fn resolve_tag(&self, tag: &str) -> Result<&dyn RuntimeEngine, RuntimeError> {
        let kind: EngineKind = tag.parse()?;
        self.backend(kind).map(Backend::engine)
    }

    pub fn language_model(&self) -> Option<&Arc<LanguageModelEngine>> {
        match self.backends.get(&EngineKind::LanguageModel) {
            Some(Backend::LanguageModel(e)) => Some(e),
            _ => None,
        }
    }

    pub fn tensor_graph(&self) -> Option<&Arc<TensorGraphEngine>> {
        match self.backends.get(&EngineKind::TensorGraph) {
            Some(Backend::TensorGraph(e)) => Some(e),
            _ => None,
        }
    }

    pub fn speech(&self) -> Option<&Arc<SpeechSynthesisEngine>> {
        match self.backends.get(&EngineKind::SpeechSynthesis) {
            Some(Backend::SpeechSynthesis(e)) => Some(e),
            _ => None,
        }
    }

    pub async fn load_model(&self, descriptor: &ModelDescriptor) -> Result<(), RuntimeError> {
        self.resolve(descriptor)?.load_model(descriptor).await
    }

    pub async fn generate(
        &self,
        kind: EngineKind,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String, RuntimeError> {
        self.backend(kind)?.engine().generate(prompt, config).await
    }

    pub async fn generate_stream(
        &self,
        kind: EngineKind,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<TextStream, RuntimeError> {
        self.backend(kind)?.engine().generate_stream(prompt, config).await
    }

    pub async fn unload(&self, kind: EngineKind) -> Result<(), RuntimeError> {
        self.backend(kind)?.engine().unload().await
    }

    /// Unload every backend. All are attempted; the first error is returned.
    pub async fn unload_all(&self) -> Result<(), RuntimeError> {
        let mut first = None;
        for backend in self.backends.values() {
            if let Err(e) = backend.engine().unload().await {
                tracing::warn!(engine = %backend.kind(), error = %e, "unload failed during teardown");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Unload and release process-wide binding state for every backend.
    pub async fn dispose_all(&self) -> Result<(), RuntimeError> {
        let mut first = None;
        for backend in self.backends.values() {
            if let Err(e) = backend.engine().dispose().await {
                tracing::warn!(engine = %backend.kind(), error = %e, "dispose failed");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    pub fn status(&self) -> Vec<EngineStatus> {
        self.backends
            .values()
            .map(|backend| {
                let engine = backend.engine();
                EngineStatus {
                    kind: engine.kind(),
                    state: engine.state(),
                    model_id: engine.current_model().map(|m| m.id),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::Unavailable;
    use crate::staging::{DirAssetSource, ModelStorage, StagingArea, StagingResolver};

    fn context(dir: &std::path::Path) -> EngineContext {
        let resolver = StagingResolver::new(
            Arc::new(DirAssetSource::new(dir.join("assets"))),
            ModelStorage::new(dir.join("documents")),
        );
        EngineContext::new(resolver, Arc::new(StagingArea::create_in(dir).unwrap()))
    }

    #[tokio::test]
    async fn test_unregistered_kind_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RuntimeRegistry::builder(context(dir.path()))
            .tensor_graph(Arc::new(Unavailable::new("test")))
            .build();

        let d = ModelDescriptor::new("tts", "tts.onnx", EngineKind::SpeechSynthesis);
        assert!(matches!(registry.resolve(&d), Err(RuntimeError::UnsupportedEngine(_))));
        assert!(matches!(
            registry.load_model(&d).await,
            Err(RuntimeError::UnsupportedEngine(_))
        ));
        assert!(matches!(registry.resolve_tag("vulkan"), Err(RuntimeError::UnsupportedEngine(_))));
        assert_eq!(registry.resolve_tag("tflite").unwrap().kind(), EngineKind::TensorGraph);
    }

    #[tokio::test]
    async fn test_status_and_teardown_when_idle() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RuntimeRegistry::builder(context(dir.path()))
            .language_model(Arc::new(Unavailable::new("test")))
            .tensor_graph(Arc::new(Unavailable::new("test")))
            .speech_synthesis(Arc::new(Unavailable::new("test")))
            .build();

        let status = registry.status();
        assert_eq!(status.len(), 3);
        assert!(status.iter().all(|s| s.state == EngineState::Unloaded && s.model_id.is_none()));
        registry.unload_all().await.unwrap();
        registry.dispose_all().await.unwrap();
        assert!(registry.speech().is_some());
    }
}
