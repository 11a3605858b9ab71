//! Generic cancellable stream consumption.
//!
//! [`StreamConsumer`] drives any `Stream<Item = Result<T>>` to its end and
//! reports what happened through a [`StreamHandler`]. It knows nothing about
//! SSE or chat.

use crate::error::{ChatStreamError, Result};
use futures::{Stream, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Lifecycle callbacks for one [`StreamConsumer::read`] call.
///
/// Exactly one of `on_complete`, `on_error` or `on_abort` runs per read.
pub trait StreamHandler<T> {
    /// An item arrived.
    fn on_data(&mut self, item: T);

    /// The stream ended normally.
    fn on_complete(&mut self) {}

    /// The stream failed.
    fn on_error(&mut self, error: ChatStreamError) {
        let _ = error;
    }

    /// The read was cancelled.
    fn on_abort(&mut self) {}
}

/// How a read ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The stream was exhausted.
    Completed,
    /// The stream yielded an error.
    Errored,
    /// The read was cancelled.
    Aborted,
}

/// Observable consumer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// No read in flight.
    Idle,
    /// A read is in flight.
    Reading,
}

struct ActiveRead {
    id: u64,
    token: CancellationToken,
}

/// Drives one stream at a time with cooperative cancellation.
#[derive(Default)]
pub struct StreamConsumer {
    active: Mutex<Option<ActiveRead>>,
    next_id: AtomicU64,
    reading: AtomicBool,
}

impl std::fmt::Debug for StreamConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConsumer")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl StreamConsumer {
    /// Create an idle consumer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `stream` until it ends, fails, or is cancelled.
    ///
    /// Any read already in flight on this consumer is cancelled first. The
    /// stream is dropped before this returns, on every exit path.
    pub async fn read<S, T, H>(&self, stream: S, handler: &mut H) -> ReadOutcome
    where
        S: Stream<Item = Result<T>> + Unpin,
        H: StreamHandler<T> + ?Sized,
    {
        let (id, token) = self.begin();
        let mut stream = stream;

        let outcome = loop {
            if token.is_cancelled() {
                handler.on_abort();
                break ReadOutcome::Aborted;
            }

            let next = tokio::select! {
                biased;
                () = token.cancelled() => {
                    handler.on_abort();
                    break ReadOutcome::Aborted;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(item)) => handler.on_data(item),
                Some(Err(e)) if e.is_abort() => {
                    handler.on_abort();
                    break ReadOutcome::Aborted;
                }
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "stream read failed");
                    handler.on_error(e);
                    break ReadOutcome::Errored;
                }
                None => {
                    handler.on_complete();
                    break ReadOutcome::Completed;
                }
            }
        };

        drop(stream);
        self.finish(id);
        tracing::trace!(?outcome, "stream read finished");
        outcome
    }

    /// Request cancellation of the in-flight read.
    ///
    /// Takes effect at the loop's next suspension point; `is_reading`
    /// flips to `false` immediately.
    pub fn cancel(&self) {
        if let Some(active) = self.lock_active().as_ref() {
            active.token.cancel();
        }
        self.reading.store(false, Ordering::SeqCst);
    }

    /// Cancel and forget any in-flight read.
    pub fn cleanup(&self) {
        if let Some(active) = self.lock_active().take() {
            active.token.cancel();
        }
        self.reading.store(false, Ordering::SeqCst);
    }

    /// Whether a read is in flight and not cancelled.
    pub fn is_reading(&self) -> bool {
        self.reading.load(Ordering::SeqCst)
    }

    /// Current state.
    pub fn state(&self) -> ConsumerState {
        if self.is_reading() {
            ConsumerState::Reading
        } else {
            ConsumerState::Idle
        }
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();

        let previous = self.lock_active().replace(ActiveRead {
            id,
            token: token.clone(),
        });
        if let Some(previous) = previous {
            tracing::debug!(read = previous.id, "discarding in-flight read");
            previous.token.cancel();
        }

        self.reading.store(true, Ordering::SeqCst);
        (id, token)
    }

    fn finish(&self, id: u64) {
        let mut active = self.lock_active();
        if active.as_ref().is_some_and(|a| a.id == id) {
            *active = None;
            self.reading.store(false, Ordering::SeqCst);
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveRead>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type DataFn<'a, T> = Box<dyn FnMut(T) + Send + 'a>;
type HookFn<'a> = Box<dyn FnMut() + Send + 'a>;
type ErrorFn<'a> = Box<dyn FnMut(ChatStreamError) + Send + 'a>;

/// Closure-based [`StreamHandler`].
///
/// ```
/// use chatstream_rs::consumer::{Callbacks, StreamConsumer};
///
/// # async fn run() {
/// let mut seen = Vec::new();
/// let items = futures::stream::iter(vec![Ok::<_, chatstream_rs::ChatStreamError>(1), Ok(2)]);
/// let consumer = StreamConsumer::new();
/// consumer.read(items, &mut Callbacks::new(|n| seen.push(n))).await;
/// # }
/// ```
pub struct Callbacks<'a, T> {
    on_data: DataFn<'a, T>,
    on_complete: Option<HookFn<'a>>,
    on_error: Option<ErrorFn<'a>>,
    on_abort: Option<HookFn<'a>>,
}

impl<'a, T> Callbacks<'a, T> {
    /// Handler that forwards items to `on_data`.
    pub fn new(on_data: impl FnMut(T) + Send + 'a) -> Self {
        Self {
            on_data: Box::new(on_data),
            on_complete: None,
            on_error: None,
            on_abort: None,
        }
    }

    /// Set the completion callback.
    #[must_use]
    pub fn on_complete(mut self, f: impl FnMut() + Send + 'a) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Set the error callback.
    #[must_use]
    pub fn on_error(mut self, f: impl FnMut(ChatStreamError) + Send + 'a) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Set the abort callback.
    #[must_use]
    pub fn on_abort(mut self, f: impl FnMut() + Send + 'a) -> Self {
        self.on_abort = Some(Box::new(f));
        self
    }
}

impl<T> StreamHandler<T> for Callbacks<'_, T> {
    fn on_data(&mut self, item: T) {
        (self.on_data)(item);
    }

    fn on_complete(&mut self) {
        if let Some(f) = &mut self.on_complete {
            f();
        }
    }

    fn on_error(&mut self, error: ChatStreamError) {
        if let Some(f) = &mut self.on_error {
            f(error);
        }
    }

    fn on_abort(&mut self) {
        if let Some(f) = &mut self.on_abort {
            f();
        }
    }
}
