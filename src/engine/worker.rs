//! Dedicated execution thread per loaded engine instance.
//!
//! The worker owns the native handle for its whole lifetime. Calls are
//! submitted as closures over `&mut H` and answered through oneshot
//! channels, so the caller's task never runs blocking native code. Shutdown
//! queues a stop message behind pending jobs, joins the thread and drops the
//! handle.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tokio::sync::oneshot;

use crate::engine::error::RuntimeError;
use crate::models::EngineKind;

type Job<H> = Box<dyn FnOnce(&mut H) + Send + 'static>;

enum Message<H> {
    Run(Job<H>),
    Stop,
}

/// Owns the worker thread and, through it, the native handle.
pub struct Worker<H: Send + 'static> {
    kind: EngineKind,
    jobs: Option<mpsc::Sender<Message<H>>>,
    thread: Option<JoinHandle<H>>,
}

impl<H: Send + 'static> Worker<H> {
    /// Move `handle` onto a new named thread.
    pub fn spawn(kind: EngineKind, handle: H) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Message<H>>();
        let thread = thread::Builder::new()
            .name(format!("{}-worker", kind.storage_dir()))
            .spawn(move || {
                let mut handle = handle;
                while let Ok(Message::Run(job)) = rx.recv() {
                    job(&mut handle);
                }
                handle
            })?;
        Ok(Self {
            kind,
            jobs: Some(tx),
            thread: Some(thread),
        })
    }

    /// Cheap sender used to submit calls without holding the engine lock.
    pub fn client(&self) -> WorkerClient<H> {
        WorkerClient {
            kind: self.kind,
            jobs: self.jobs.clone(),
        }
    }

    /// Close the queue, wait for pending jobs, then release the handle.
    ///
    /// Blocks the current thread; call from `spawn_blocking`.
    pub fn shutdown(mut self) -> bool {
        self.join()
    }

    fn join(&mut self) -> bool {
        if let Some(jobs) = self.jobs.take() {
            let _ = jobs.send(Message::Stop);
        }
        match self.thread.take() {
            Some(thread) => match thread.join() {
                Ok(handle) => {
                    drop(handle);
                    true
                }
                Err(_) => {
                    tracing::error!(engine = %self.kind, "worker thread panicked");
                    false
                }
            },
            None => true,
        }
    }
}

impl<H: Send + 'static> Drop for Worker<H> {
    fn drop(&mut self) {
        self.join();
    }
}

/// Submits calls to a worker.
pub struct WorkerClient<H: Send + 'static> {
    kind: EngineKind,
    jobs: Option<mpsc::Sender<Message<H>>>,
}

impl<H: Send + 'static> WorkerClient<H> {
    /// Run `f` on the worker thread and await its result.
    pub async fn call<R, F>(&self, f: F) -> Result<R, RuntimeError>
    where
        R: Send + 'static,
        F: FnOnce(&mut H) -> R + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(move |handle| {
            let _ = tx.send(f(handle));
        })?;
        rx.await.map_err(|_| RuntimeError::WorkerGone(self.kind))
    }

    /// Queue `f` without waiting for it. Used by streaming producers.
    pub fn submit<F>(&self, f: F) -> Result<(), RuntimeError>
    where
        F: FnOnce(&mut H) + Send + 'static,
    {
        let jobs = self.jobs.as_ref().ok_or(RuntimeError::WorkerGone(self.kind))?;
        jobs.send(Message::Run(Box::new(f)))
            .map_err(|_| RuntimeError::WorkerGone(self.kind))
    }
}
