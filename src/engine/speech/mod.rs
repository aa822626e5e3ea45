//! Speech-synthesis backend.
//!
//! The synthesizer model is always staged. Its format has no fixed magic, so
//! only the minimum-size check applies. A voice style must be loaded with
//! [`SpeechSynthesisEngine::load_style`] before synthesis and can be swapped
//! at any time without reloading the model.
//!
//! Input text is split into sentence-bounded chunks that are synthesized one
//! after another on the worker.

mod chunk;

pub use chunk::chunk_text;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::config::{GenerationConfig, SynthesisParams};
use super::error::RuntimeError;
use super::lifecycle::{EngineCell, EngineState, LoadLease};
use super::loader::{self, EngineContext, LoadStrategy};
use super::runtime::RuntimeEngine;
use super::streaming::{OutputStream, TextStream};
use super::worker::Worker;
use crate::models::{descriptor, EngineKind, ModelDescriptor};
use crate::native::{InterpreterParams, NativeError, SpeechBinding, SpeechSynthesizer};
use crate::telemetry;

/// Configuration key overriding the directory voice styles are read from.
pub const KEY_STYLE_DIR: &str = "styleDir";
pub const DEFAULT_STYLE_DIR: &str = "voice_styles";
/// Longest text chunk handed to the synthesizer in one call.
pub const MAX_CHUNK_CHARS: usize = 300;

const TEXT_GENERATION: &str = "the speech engine produces audio; use synthesize";

type Synthesizer = Box<dyn SpeechSynthesizer>;

/// Mono PCM samples in [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// One waveform per text chunk.
pub type AudioStream = OutputStream<Waveform>;

pub struct SpeechSynthesisEngine {
    binding: Arc<dyn SpeechBinding>,
    ctx: EngineContext,
    cell: EngineCell<Synthesizer>,
    style: Mutex<Option<String>>,
}

impl SpeechSynthesisEngine {
    pub fn new(binding: Arc<dyn SpeechBinding>, ctx: EngineContext) -> Self {
        Self {
            binding,
            ctx,
            cell: EngineCell::new(EngineKind::SpeechSynthesis),
            style: Mutex::new(None),
        }
    }

    /// Name of the installed voice style.
    pub fn active_style(&self) -> Option<String> {
        self.style.lock().clone()
    }

    /// Read `<styleDir>/<name>.json` next to the model and install it.
    pub async fn load_style(&self, name: &str) -> Result<(), RuntimeError> {
        let (_busy, client) = self.cell.begin_call()?;
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(RuntimeError::InvalidConfig(format!("invalid voice style name '{name}'")));
        }
        let model = self
            .cell
            .current_model()
            .ok_or(RuntimeError::NotLoaded(EngineKind::SpeechSynthesis))?;

        let dir = model
            .configuration
            .get(KEY_STYLE_DIR)
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_STYLE_DIR);
        if descriptor::is_rooted(dir) || dir.split(['/', '\\']).any(|part| part == "..") {
            return Err(RuntimeError::InvalidConfig(format!(
                "{KEY_STYLE_DIR} must be a relative path inside the model directory: {dir}"
            )));
        }
        let relative = format!("{}/{name}.json", dir.trim_end_matches('/'));
        let bytes = self
            .ctx
            .resolver
            .read_auxiliary(EngineKind::SpeechSynthesis, model.is_bundled(), &relative)
            .await
            .map_err(|e| loader::staging_failure(&model, e))?;

        let style_name = name.to_string();
        client
            .call(move |synth: &mut Synthesizer| synth.set_style(&style_name, &bytes))
            .await??;

        *self.style.lock() = Some(name.to_string());
        tracing::info!(model_id = %model.id, style = name, "voice style loaded");
        Ok(())
    }

    /// Synthesize `text` into one waveform, chunks joined with silence.
    pub async fn synthesize(
        &self,
        text: &str,
        params: &SynthesisParams,
    ) -> Result<Waveform, RuntimeError> {
        let (_busy, client) = self.cell.begin_call()?;
        let chunks = self.prepare(text, params)?;
        let steps = params.steps;
        let speed = params.speed;
        let silence_secs = params.silence_secs;

        let started = Instant::now();
        let waveform = client
            .call(move |synth: &mut Synthesizer| -> Result<Waveform, NativeError> {
                let sample_rate = synth.sample_rate();
                let gap = silence(sample_rate, silence_secs);
                let mut samples = Vec::new();
                for (i, chunk) in chunks.iter().enumerate() {
                    if i > 0 {
                        samples.extend_from_slice(&gap);
                    }
                    samples.extend(synth.synthesize(chunk, steps, speed)?);
                }
                Ok(Waveform {
                    samples,
                    sample_rate,
                })
            })
            .await?
            .map_err(|e| {
                tracing::error!(engine = %EngineKind::SpeechSynthesis, error = %e, "synthesis failed");
                RuntimeError::from(e)
            })?;
        telemetry::record_call(EngineKind::SpeechSynthesis, "synthesize", started.elapsed());
        Ok(waveform)
    }

    /// Stream one waveform per chunk. Silence is left to the consumer.
    ///
    /// The engine stays busy until the stream is dropped.
    pub async fn synthesize_stream(
        &self,
        text: &str,
        params: &SynthesisParams,
    ) -> Result<AudioStream, RuntimeError> {
        let (busy, client) = self.cell.begin_call()?;
        let chunks = self.prepare(text, params)?;
        let steps = params.steps;
        let speed = params.speed;

        let (tx, stream) = AudioStream::channel(self.ctx.stream_buffer);
        client.submit(move |synth: &mut Synthesizer| {
            let sample_rate = synth.sample_rate();
            for chunk in chunks {
                if tx.is_closed() {
                    break;
                }
                let item = synth
                    .synthesize(&chunk, steps, speed)
                    .map(|samples| Waveform {
                        samples,
                        sample_rate,
                    })
                    .map_err(RuntimeError::from);
                let failed = item.is_err();
                if !tx.send_blocking(item) || failed {
                    break;
                }
            }
        })?;
        Ok(stream.hold(busy))
    }

    fn prepare(&self, text: &str, params: &SynthesisParams) -> Result<Vec<String>, RuntimeError> {
        if self.active_style().is_none() {
            return Err(RuntimeError::StyleNotLoaded);
        }
        params.validate()?;
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(RuntimeError::InvalidConfig("text to synthesize is empty".into()));
        }
        Ok(chunks)
    }

    async fn open(
        &self,
        descriptor: &ModelDescriptor,
        lease: LoadLease,
    ) -> Result<(Worker<Synthesizer>, LoadStrategy), RuntimeError> {
        let staged = self
            .ctx
            .resolver
            .ensure_local_file(descriptor, self.ctx.staging_dir())
            .await
            .map_err(|e| loader::staging_failure(descriptor, e))?;
        loader::check_header(descriptor, &staged.path, &[]).await?;
        loader::verify_integrity(descriptor, &staged.path, Some(&staged.sha256)).await?;

        let params = InterpreterParams {
            n_threads: self.ctx.threads_for(&descriptor.configuration),
        };
        let file_binding = Arc::clone(&self.binding);
        let buffer_binding = Arc::clone(&self.binding);
        let buffer_params = params.clone();
        let (synth, strategy) = loader::construct(
            descriptor,
            lease,
            staged.path,
            move |p| file_binding.load_from_file(p, &params),
            move |bytes| buffer_binding.load_from_buffer(bytes, &buffer_params),
        )
        .await?;

        let worker = Worker::spawn(EngineKind::SpeechSynthesis, synth)?;
        Ok((worker, strategy))
    }
}

fn silence(sample_rate: u32, secs: f32) -> Vec<f32> {
    vec![0.0; (sample_rate as f32 * secs).round() as usize]
}

#[async_trait]
impl RuntimeEngine for SpeechSynthesisEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::SpeechSynthesis
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
            engine: EngineKind::SpeechSynthesis,
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
            engine: EngineKind::SpeechSynthesis,
            operation: "generate_stream",
            reason: TEXT_GENERATION,
        })
    }

    async fn unload(&self) -> Result<(), RuntimeError> {
        let unloaded = self.cell.unload().await?;
        *self.style.lock() = None;
        if let Some(model) = unloaded {
            telemetry::record_unload(EngineKind::SpeechSynthesis);
            tracing::info!(engine = %EngineKind::SpeechSynthesis, model_id = %model.id, "model unloaded");
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
