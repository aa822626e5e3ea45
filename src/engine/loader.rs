//! Load steps shared by the backends: source resolution errors, header
//! sanity checks, integrity checks and native construction with a single
//! file-to-buffer fallback.

use std::fs::File;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use memmap2::Mmap;

use super::error::RuntimeError;
use super::lifecycle::{EngineCell, LoadLease};
use super::signature::{self, FormatSignature, MIN_MODEL_BYTES};
use super::worker::Worker;
use crate::models::{EngineKind, ModelConfig, ModelDescriptor};
use crate::native::NativeError;
use crate::staging::{self, StagingArea, StagingError, StagingResolver};
use crate::telemetry;

/// Everything a backend needs to turn a descriptor into local bytes.
#[derive(Clone)]
pub struct EngineContext {
    pub resolver: StagingResolver,
    pub staging: Arc<StagingArea>,
    /// Channel capacity for output streams.
    pub stream_buffer: usize,
    /// Thread count used when a descriptor does not set `threads`. 0 = auto.
    pub default_threads: u32,
}

impl EngineContext {
    pub fn new(resolver: StagingResolver, staging: Arc<StagingArea>) -> Self {
        Self {
            resolver,
            staging,
            stream_buffer: 16,
            default_threads: 0,
        }
    }

    pub fn with_stream_buffer(mut self, size: usize) -> Self {
        self.stream_buffer = size.max(1);
        self
    }

    pub fn with_default_threads(mut self, threads: u32) -> Self {
        self.default_threads = threads;
        self
    }

    /// Resolve the native thread count for a model.
    pub fn threads_for(&self, config: &ModelConfig) -> u32 {
        match (config.threads(), self.default_threads) {
            (0, 0) => auto_threads(),
            (0, fallback) => fallback,
            (n, _) => n,
        }
    }

    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }
}

/// Which native strategy produced the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    File,
    Buffer,
}

impl LoadStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Buffer => "buffer",
        }
    }
}

/// Maximum threads picked automatically.
const MAX_AUTO_THREADS: u32 = 16;

fn auto_threads() -> u32 {
    u32::try_from(num_cpus::get())
        .unwrap_or(MAX_AUTO_THREADS)
        .clamp(1, MAX_AUTO_THREADS)
}

/// Drive one load through the engine's state machine.
///
/// Checks the descriptor, moves the cell to Loading, runs `open` and commits
/// the worker it returns. Any failure leaves the engine Unloaded with the
/// partially built handle released. When this future is dropped mid-load the
/// engine stays Loading until work holding the lease passed to `open` has
/// finished.
pub async fn load_with<H, O, F>(
    cell: &EngineCell<H>,
    descriptor: &ModelDescriptor,
    open: O,
) -> Result<(), RuntimeError>
where
    H: Send + 'static,
    O: FnOnce(LoadLease) -> F,
    F: Future<Output = Result<(Worker<H>, LoadStrategy), RuntimeError>>,
{
    let kind = cell.kind();
    descriptor.validate()?;
    if descriptor.engine_kind != kind {
        return Err(RuntimeError::InvalidDescriptor(format!(
            "model '{}' targets {} but was given to the {} engine",
            descriptor.id, descriptor.engine_kind, kind
        )));
    }

    let ticket = cell.begin_load()?;
    let started = Instant::now();
    tracing::info!(engine = %kind, model_id = %descriptor.id, file = %descriptor.file_name, "loading model");

    match open(ticket.lease()).await {
        Ok((worker, strategy)) => {
            ticket.commit(descriptor.clone(), worker);
            let elapsed = started.elapsed();
            telemetry::record_load_success(kind, strategy, elapsed);
            tracing::info!(
                engine = %kind,
                model_id = %descriptor.id,
                strategy = strategy.as_str(),
                elapsed_ms = elapsed.as_millis() as u64,
                "model loaded"
            );
            Ok(())
        }
        Err(e) => {
            drop(ticket);
            telemetry::record_load_failure(kind, &e);
            tracing::error!(engine = %kind, model_id = %descriptor.id, error = %e, "model load failed");
            Err(e)
        }
    }
}

/// Convert a staging failure, naming the model when its file is missing.
pub fn staging_failure(descriptor: &ModelDescriptor, err: StagingError) -> RuntimeError {
    match err {
        StagingError::SourceMissing(path) => RuntimeError::ModelNotFound {
            model_id: descriptor.id.clone(),
            path,
        },
        other => RuntimeError::Staging(other),
    }
}

/// Enforce the minimum size and log the signature diagnostic.
pub async fn check_header(
    descriptor: &ModelDescriptor,
    path: &Path,
    known: &[FormatSignature],
) -> Result<(), RuntimeError> {
    let header = staging::read_header(path, MIN_MODEL_BYTES)
        .await
        .map_err(|e| staging_failure(descriptor, e))?;
    let result = if known.is_empty() {
        if header.len() < MIN_MODEL_BYTES {
            Err(signature::TooShort { size: header.len() })
        } else {
            Ok(())
        }
    } else {
        signature::check_and_log(&descriptor.id, &header, known).map(|_| ())
    };
    result.map_err(|short| RuntimeError::TooSmall {
        model_id: descriptor.id.clone(),
        size: short.size,
        minimum: MIN_MODEL_BYTES,
    })
}

/// Compare against the configured `sha256`, if any. `known` is the digest
/// already computed while staging.
pub async fn verify_integrity(
    descriptor: &ModelDescriptor,
    path: &Path,
    known: Option<&str>,
) -> Result<(), RuntimeError> {
    let Some(expected) = descriptor.configuration.sha256() else {
        return Ok(());
    };
    let actual = match known {
        Some(digest) => digest.to_string(),
        None => staging::sha256_file(path)
            .await
            .map_err(|e| staging_failure(descriptor, e))?,
    };
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(RuntimeError::HashMismatch {
            model_id: descriptor.id.clone(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Construct a native handle off the async runtime: file-based first, then
/// exactly one buffer-based attempt over a memory map of the same file.
///
/// The blocking task cannot be cancelled, so it holds `lease` until its
/// result is consumed. A handle built for an abandoned load is dropped
/// before the lease.
pub async fn construct<T, FF, FB>(
    descriptor: &ModelDescriptor,
    lease: LoadLease,
    path: PathBuf,
    from_file: FF,
    from_buffer: FB,
) -> Result<(T, LoadStrategy), RuntimeError>
where
    T: Send + 'static,
    FF: FnOnce(&Path) -> Result<T, NativeError> + Send + 'static,
    FB: FnOnce(&[u8]) -> Result<T, NativeError> + Send + 'static,
{
    let model_id = descriptor.id.clone();
    let kind = descriptor.engine_kind;
    let task_model_id = model_id.clone();

    let joined = tokio::task::spawn_blocking(move || {
        let built = build(&task_model_id, kind, &path, from_file, from_buffer);
        (built, lease)
    })
    .await;

    match joined {
        Ok((Ok(done), _lease)) => Ok(done),
        Ok((Err((primary, fallback)), _lease)) => Err(RuntimeError::NativeConstruction {
            model_id,
            primary,
            fallback,
        }),
        Err(e) => Err(RuntimeError::NativeConstruction {
            model_id,
            primary: format!("construction task failed: {e}"),
            fallback: "not attempted".into(),
        }),
    }
}

type Built<T> = Result<(T, LoadStrategy), (String, String)>;

fn build<T, FF, FB>(
    model_id: &str,
    kind: EngineKind,
    path: &Path,
    from_file: FF,
    from_buffer: FB,
) -> Built<T>
where
    FF: FnOnce(&Path) -> Result<T, NativeError>,
    FB: FnOnce(&[u8]) -> Result<T, NativeError>,
{
    let primary = match from_file(path) {
        Ok(handle) => return Ok((handle, LoadStrategy::File)),
        Err(e) => e,
    };
    tracing::warn!(
        model_id = %model_id,
        path = %path.display(),
        error = %primary,
        "file-based construction failed; retrying from buffer"
    );
    telemetry::record_fallback(kind);

    let mapped = MappedModel::open(path).map_err(|e| (primary.to_string(), e.to_string()))?;
    from_buffer(mapped.as_bytes())
        .map(|handle| (handle, LoadStrategy::Buffer))
        .map_err(|fallback| (primary.to_string(), fallback.to_string()))
}

/// Memory-mapped model file for buffer-based loading.
pub struct MappedModel {
    mmap: Mmap,
}

impl MappedModel {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the map lives only for one buffer construction call. The
        // runtime never writes the file while it is mapped: staged copies are
        // complete before loading starts and storage files are only read.
        // Another process truncating a storage file inside that window is not
        // prevented here.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap })
    }

    /// Get model data as a byte slice (zero-copy).
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }
}
