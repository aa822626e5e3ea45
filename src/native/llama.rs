//! llama-cpp-2 binding for GGUF language models.

use std::path::Path;
use std::sync::Arc;

use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::LlamaModel;
use parking_lot::Mutex;

use super::{LanguageModelBinding, LanguageModelSession, LlmLoadParams, NativeError};

const BINDING: &str = "llama.cpp";

/// Holds the process-wide llama backend across model loads.
///
/// The backend may only be initialized once per process, so it is created
/// lazily on first load and released by `dispose`.
#[derive(Default)]
pub struct LlamaBinding {
    backend: Mutex<Option<Arc<LlamaBackend>>>,
}

impl LlamaBinding {
    pub fn new() -> Self {
        Self::default()
    }

    fn backend(&self) -> Result<Arc<LlamaBackend>, NativeError> {
        let mut slot = self.backend.lock();
        if let Some(backend) = slot.as_ref() {
            return Ok(backend.clone());
        }
        let backend = LlamaBackend::init()
            .map_err(|e| NativeError::new(BINDING, format!("backend init: {e}")))?;
        let backend = Arc::new(backend);
        *slot = Some(backend.clone());
        Ok(backend)
    }
}

/// A loaded GGUF model.
pub struct LlamaSession {
    _backend: Arc<LlamaBackend>,
    model: LlamaModel,
}

// SAFETY: LlamaModel and LlamaBackend are Send+Sync in llama-cpp-2.
unsafe impl Send for LlamaSession {}

impl LanguageModelSession for LlamaSession {
    fn model_size(&self) -> u64 {
        self.model.size()
    }
}

impl LanguageModelBinding for LlamaBinding {
    fn name(&self) -> &'static str {
        BINDING
    }

    fn load_from_file(
        &self,
        path: &Path,
        params: &LlmLoadParams,
    ) -> Result<Box<dyn LanguageModelSession>, NativeError> {
        let backend = self.backend()?;
        let model_params = LlamaModelParams::default().with_n_gpu_layers(params.gpu.layer_count());
        let model = LlamaModel::load_from_file(&backend, path, &model_params)
            .map_err(|e| NativeError::new(BINDING, format!("load: {e}")))?;
        tracing::debug!(
            n_ctx = params.n_ctx,
            n_batch = params.n_batch,
            n_threads = params.n_threads,
            "llama model loaded"
        );
        Ok(Box::new(LlamaSession {
            _backend: backend,
            model,
        }))
    }

    fn load_from_buffer(
        &self,
        _bytes: &[u8],
        _params: &LlmLoadParams,
    ) -> Result<Box<dyn LanguageModelSession>, NativeError> {
        Err(NativeError::new(
            BINDING,
            "loading from an in-memory buffer is not supported",
        ))
    }

    fn dispose(&self) {
        self.backend.lock().take();
    }
}
