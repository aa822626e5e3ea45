//! Incremental output streams.
//!
//! A stream is lazy, finite and forward-only. The producer runs as a job on
//! the engine worker and pushes items through a bounded channel. Dropping the
//! stream closes the channel; the producer sees the failed send and stops.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::error::RuntimeError;

/// Stream of text increments.
pub type TextStream = OutputStream<String>;

/// Consumer half of an output stream.
pub struct OutputStream<T> {
    receiver: mpsc::Receiver<Result<T, RuntimeError>>,
    // Keeps the engine busy until the consumer is done or drops the stream.
    _busy: Option<Box<dyn Send + Sync>>,
}

impl<T: Send + 'static> OutputStream<T> {
    /// Create a new stream with sender/receiver pair.
    pub fn channel(buffer_size: usize) -> (StreamSender<T>, Self) {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        (
            StreamSender { sender },
            Self {
                receiver,
                _busy: None,
            },
        )
    }

    /// Tie a busy guard to the stream's lifetime.
    pub(crate) fn hold<G: Send + Sync + 'static>(mut self, guard: G) -> Self {
        self._busy = Some(Box::new(guard));
        self
    }

    /// Receive the next item, if any.
    pub async fn next_item(&mut self) -> Option<Result<T, RuntimeError>> {
        self.receiver.recv().await
    }

    /// Drain the stream, stopping at the first error.
    pub async fn collect_all(mut self) -> Result<Vec<T>, RuntimeError> {
        let mut items = Vec::new();
        while let Some(item) = self.next_item().await {
            items.push(item?);
        }
        Ok(items)
    }
}

impl TextStream {
    /// Concatenate all increments; equivalent to a one-shot generate.
    pub async fn collect_text(self) -> Result<String, RuntimeError> {
        Ok(self.collect_all().await?.concat())
    }
}

impl<T> Stream for OutputStream<T> {
    type Item = Result<T, RuntimeError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Producer half, used from the worker thread.
pub struct StreamSender<T> {
    sender: mpsc::Sender<Result<T, RuntimeError>>,
}

impl<T> StreamSender<T> {
    /// Blocking send. Returns false once the consumer has gone away.
    pub fn send_blocking(&self, item: Result<T, RuntimeError>) -> bool {
        self.sender.blocking_send(item).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
