//! Staging of model files into a loader-readable location.
//!
//! Native loaders cannot read bundled assets, so bytes are copied into a
//! process-temporary staging area first. Every staged file is written to a
//! sibling `.part` file, flushed, synced and renamed into place, so readers
//! never observe a partially written model.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::models::{EngineKind, ModelDescriptor};

const COPY_CHUNK: usize = 1024 * 1024;

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("Source file not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StagingError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Read-only provider of bundled model bytes.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Full contents of the asset at `relative`.
    async fn read(&self, relative: &str) -> Result<Vec<u8>, StagingError>;
}

/// Bundled assets laid out under a root directory.
#[derive(Debug, Clone)]
pub struct DirAssetSource {
    root: PathBuf,
}

impl DirAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetSource for DirAssetSource {
    async fn read(&self, relative: &str) -> Result<Vec<u8>, StagingError> {
        let path = self.root.join(relative);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StagingError::SourceMissing(path))
            }
            Err(e) => Err(StagingError::io(&path, e)),
        }
    }
}

/// Durable per-engine model storage: `<documents>/models/<engine>/<file>`.
#[derive(Debug, Clone)]
pub struct ModelStorage {
    documents_dir: PathBuf,
}

impl ModelStorage {
    pub fn new(documents_dir: impl Into<PathBuf>) -> Self {
        Self {
            documents_dir: documents_dir.into(),
        }
    }

    pub fn engine_dir(&self, kind: EngineKind) -> PathBuf {
        self.documents_dir.join("models").join(kind.storage_dir())
    }

    pub fn model_path(&self, kind: EngineKind, file_name: &str) -> PathBuf {
        self.engine_dir(kind).join(file_name)
    }

    /// Existence check that treats IO errors as "missing".
    pub async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }
}

/// Process-temporary directory for staged files. Removed on drop.
#[derive(Debug)]
pub struct StagingArea {
    dir: tempfile::TempDir,
}

impl StagingArea {
    /// Create a fresh staging directory under `root`.
    pub fn create_in(root: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix("staging-").tempdir_in(root)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// A fully written, synced local copy of a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub len: u64,
    /// Lowercase hex SHA-256 of the staged bytes.
    pub sha256: String,
}

/// Turns descriptors into readable local files.
#[derive(Clone)]
pub struct StagingResolver {
    assets: Arc<dyn AssetSource>,
    storage: ModelStorage,
}

impl StagingResolver {
    pub fn new(assets: Arc<dyn AssetSource>, storage: ModelStorage) -> Self {
        Self { assets, storage }
    }

    pub fn storage(&self) -> &ModelStorage {
        &self.storage
    }

    /// Deterministic staged file name for a descriptor.
    pub fn staged_name(descriptor: &ModelDescriptor) -> Result<String, StagingError> {
        let base = Path::new(&descriptor.file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StagingError::InvalidName(descriptor.file_name.clone()))?;
        Ok(format!(
            "{}-{}-{}",
            descriptor.engine_kind.storage_dir(),
            sanitize(&descriptor.id),
            sanitize(base)
        ))
    }

    /// Copy the descriptor's model into `destination_dir`, overwriting any
    /// previous copy. The source is the bundled asset when `isBundled` is
    /// set, otherwise the storage file, which must exist.
    pub async fn ensure_local_file(
        &self,
        descriptor: &ModelDescriptor,
        destination_dir: &Path,
    ) -> Result<StagedFile, StagingError> {
        let dest = destination_dir.join(Self::staged_name(descriptor)?);
        tokio::fs::create_dir_all(destination_dir)
            .await
            .map_err(|e| StagingError::io(destination_dir, e))?;

        let staged = if descriptor.is_bundled() {
            let bytes = self.assets.read(&descriptor.file_name).await?;
            write_durably(&dest, &bytes).await?
        } else {
            let source = self.resolve_in_place(descriptor).await?;
            copy_durably(&source, &dest).await?
        };

        tracing::debug!(
            model_id = %descriptor.id,
            path = %staged.path.display(),
            bytes = staged.len,
            "model staged"
        );
        Ok(staged)
    }

    /// Storage path of a downloaded model after checking it exists.
    pub async fn resolve_in_place(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<PathBuf, StagingError> {
        let path = self
            .storage
            .model_path(descriptor.engine_kind, &descriptor.file_name);
        if !self.storage.exists(&path).await {
            return Err(StagingError::SourceMissing(path));
        }
        Ok(path)
    }

    /// Read an auxiliary file (e.g. a voice style) for an engine, from the
    /// bundle or from storage.
    pub async fn read_auxiliary(
        &self,
        kind: EngineKind,
        bundled: bool,
        relative: &str,
    ) -> Result<Vec<u8>, StagingError> {
        if bundled {
            return self.assets.read(relative).await;
        }
        let path = self.storage.model_path(kind, relative);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StagingError::SourceMissing(path))
            }
            Err(e) => Err(StagingError::io(&path, e)),
        }
    }
}

/// Read at most `len` leading bytes of a file.
pub async fn read_header(path: &Path, len: usize) -> Result<Vec<u8>, StagingError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| StagingError::io(path, e))?;
    let mut header = Vec::with_capacity(len);
    file.take(len as u64)
        .read_to_end(&mut header)
        .await
        .map_err(|e| StagingError::io(path, e))?;
    Ok(header)
}

/// Lowercase hex SHA-256 of a file, read in chunks.
pub async fn sha256_file(path: &Path) -> Result<String, StagingError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| StagingError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; COPY_CHUNK];
    loop {
        let n = file.read(&mut buf).await.map_err(|e| StagingError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

async fn finish(part: &Path, dest: &Path, mut file: tokio::fs::File) -> Result<(), StagingError> {
    file.flush().await.map_err(|e| StagingError::io(part, e))?;
    file.sync_all().await.map_err(|e| StagingError::io(part, e))?;
    drop(file);
    tokio::fs::rename(part, dest)
        .await
        .map_err(|e| StagingError::io(dest, e))
}

async fn write_durably(dest: &Path, bytes: &[u8]) -> Result<StagedFile, StagingError> {
    let part = part_path(dest);
    if let Err(e) = write_part(&part, dest, bytes).await {
        discard_part(&part).await;
        return Err(e);
    }
    Ok(StagedFile {
        path: dest.to_path_buf(),
        len: bytes.len() as u64,
        sha256: hex::encode(Sha256::digest(bytes)),
    })
}

async fn write_part(part: &Path, dest: &Path, bytes: &[u8]) -> Result<(), StagingError> {
    let mut file = tokio::fs::File::create(part)
        .await
        .map_err(|e| StagingError::io(part, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| StagingError::io(part, e))?;
    finish(part, dest, file).await
}

async fn copy_durably(source: &Path, dest: &Path) -> Result<StagedFile, StagingError> {
    let input = tokio::fs::File::open(source)
        .await
        .map_err(|e| StagingError::io(source, e))?;
    let part = part_path(dest);
    match copy_part(input, source, &part, dest).await {
        Ok((len, sha256)) => Ok(StagedFile {
            path: dest.to_path_buf(),
            len,
            sha256,
        }),
        Err(e) => {
            discard_part(&part).await;
            Err(e)
        }
    }
}

/// Copy `input` into `part`, hashing as it goes, then move it over `dest`.
async fn copy_part(
    mut input: tokio::fs::File,
    source: &Path,
    part: &Path,
    dest: &Path,
) -> Result<(u64, String), StagingError> {
    let mut output = tokio::fs::File::create(part)
        .await
        .map_err(|e| StagingError::io(part, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut len = 0u64;
    loop {
        let n = input
            .read(&mut buf)
            .await
            .map_err(|e| StagingError::io(source, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        output
            .write_all(&buf[..n])
            .await
            .map_err(|e| StagingError::io(part, e))?;
        len += n as u64;
    }
    finish(part, dest, output).await?;
    Ok((len, hex::encode(hasher.finalize())))
}

/// Remove a leftover part file. Failures are only logged.
async fn discard_part(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %part.display(), error = %e, "could not remove partial file"),
    }
}
