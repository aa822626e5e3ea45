//! Per-engine lifecycle state machine.
//!
//! `EngineCell` holds the state field, the currently loaded descriptor and
//! the worker that owns the native handle. A worker is present exactly when
//! the state is `Loaded` or `Generating`. The lock is never held across an
//! `.await`; callers still serialize calls to the same engine.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::RuntimeError;
use super::worker::{Worker, WorkerClient};
use crate::models::{EngineKind, ModelDescriptor};

/// Lifecycle states of one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    Unloaded,
    Loading,
    Loaded,
    Generating,
    Unloading,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Generating => "generating",
            Self::Unloading => "unloading",
        };
        f.write_str(s)
    }
}

struct Slot<H: Send + 'static> {
    state: EngineState,
    model: Option<ModelDescriptor>,
    worker: Option<Worker<H>>,
}

/// State, current model and native worker of one engine.
pub struct EngineCell<H: Send + 'static> {
    kind: EngineKind,
    slot: Arc<Mutex<Slot<H>>>,
}

impl<H: Send + 'static> EngineCell<H> {
    pub fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            slot: Arc::new(Mutex::new(Slot {
                state: EngineState::Unloaded,
                model: None,
                worker: None,
            })),
        }
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn state(&self) -> EngineState {
        self.slot.lock().state
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state(), EngineState::Loaded | EngineState::Generating)
    }

    pub fn current_model(&self) -> Option<ModelDescriptor> {
        self.slot.lock().model.clone()
    }

    /// Move Unloaded -> Loading. Without a commit the engine reverts to
    /// Unloaded once the ticket and its leases are dropped.
    pub fn begin_load(&self) -> Result<LoadTicket<H>, RuntimeError> {
        let mut slot = self.slot.lock();
        match slot.state {
            EngineState::Unloaded => {
                slot.state = EngineState::Loading;
                Ok(LoadTicket {
                    inner: Arc::new(PendingLoad {
                        slot: self.slot.clone(),
                        committed: AtomicBool::new(false),
                    }),
                })
            }
            EngineState::Loaded => Err(RuntimeError::AlreadyLoaded {
                engine: self.kind,
                current: slot.model.as_ref().map(|m| m.id.clone()).unwrap_or_default(),
            }),
            actual => Err(RuntimeError::InvalidState {
                engine: self.kind,
                expected: EngineState::Unloaded,
                actual,
            }),
        }
    }

    /// Fail with `NotLoaded` unless a model is loaded (busy counts as loaded).
    pub fn ensure_loaded(&self) -> Result<(), RuntimeError> {
        if self.is_loaded() {
            Ok(())
        } else {
            Err(RuntimeError::NotLoaded(self.kind))
        }
    }

    /// Move Loaded -> Generating and hand out a worker client. The guard
    /// returns the state to Loaded when dropped.
    pub fn begin_call(&self) -> Result<(BusyGuard<H>, WorkerClient<H>), RuntimeError> {
        let mut slot = self.slot.lock();
        match slot.state {
            EngineState::Loaded => {
                let client = match slot.worker.as_ref() {
                    Some(worker) => worker.client(),
                    None => return Err(RuntimeError::WorkerGone(self.kind)),
                };
                slot.state = EngineState::Generating;
                let guard = BusyGuard {
                    slot: self.slot.clone(),
                };
                Ok((guard, client))
            }
            EngineState::Generating => Err(RuntimeError::InvalidState {
                engine: self.kind,
                expected: EngineState::Loaded,
                actual: EngineState::Generating,
            }),
            _ => Err(RuntimeError::NotLoaded(self.kind)),
        }
    }

    /// Release the worker and native handle. No-op when already unloaded.
    ///
    /// Rejected while a call or stream is in flight.
    pub async fn unload(&self) -> Result<Option<ModelDescriptor>, RuntimeError> {
        let (worker, model) = {
            let mut slot = self.slot.lock();
            match slot.state {
                EngineState::Unloaded => return Ok(None),
                EngineState::Loaded => {
                    slot.state = EngineState::Unloading;
                    (slot.worker.take(), slot.model.take())
                }
                actual => {
                    return Err(RuntimeError::InvalidState {
                        engine: self.kind,
                        expected: EngineState::Loaded,
                        actual,
                    })
                }
            }
        };

        if let Some(worker) = worker {
            match tokio::task::spawn_blocking(move || worker.shutdown()).await {
                Ok(true) => {}
                Ok(false) => tracing::warn!(engine = %self.kind, "worker ended abnormally"),
                Err(e) => tracing::error!(engine = %self.kind, error = %e, "worker join failed"),
            }
        }

        self.slot.lock().state = EngineState::Unloaded;
        Ok(model)
    }
}

/// Pending load. The engine returns to Unloaded once the ticket and every
/// [`LoadLease`] taken from it are gone without a `commit`.
pub struct LoadTicket<H: Send + 'static> {
    inner: Arc<PendingLoad<H>>,
}

struct PendingLoad<H: Send + 'static> {
    slot: Arc<Mutex<Slot<H>>>,
    committed: AtomicBool,
}

impl<H: Send + 'static> LoadTicket<H> {
    /// Keep the engine in Loading while work outlives the load future, such
    /// as a blocking native construction that cannot be cancelled.
    pub fn lease(&self) -> LoadLease {
        LoadLease {
            _pending: self.inner.clone(),
        }
    }

    /// Publish the loaded model: Loading -> Loaded.
    pub fn commit(self, model: ModelDescriptor, worker: Worker<H>) {
        let mut slot = self.inner.slot.lock();
        slot.model = Some(model);
        slot.worker = Some(worker);
        slot.state = EngineState::Loaded;
        self.inner.committed.store(true, Ordering::SeqCst);
    }
}

impl<H: Send + 'static> Drop for PendingLoad<H> {
    fn drop(&mut self) {
        if !self.committed.load(Ordering::SeqCst) {
            let mut slot = self.slot.lock();
            slot.state = EngineState::Unloaded;
            slot.model = None;
        }
    }
}

/// Shared hold on a pending load.
pub struct LoadLease {
    _pending: Arc<dyn Send + Sync>,
}

/// Marks the engine busy. Held by one-shot calls and by output streams.
pub struct BusyGuard<H: Send + 'static> {
    slot: Arc<Mutex<Slot<H>>>,
}

impl<H: Send + 'static> Drop for BusyGuard<H> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot.state == EngineState::Generating {
            slot.state = EngineState::Loaded;
        }
    }
}
