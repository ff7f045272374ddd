//! Single-flight serialization of a non-reentrant upstream call
//!
//! The upstream takes one argument and reports its outcome through exactly
//! one callback. [`SingleFlight::call`] makes it awaitable and guarantees
//! that at most one upstream invocation is outstanding at any time.
//!
//! Callers are served in FIFO order: the guard is a `tokio::sync::Mutex`,
//! which grants the lock to waiters in the order they started waiting.

use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};

/// Failure reported by, or on behalf of, the upstream
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The upstream reported an error
    #[error("upstream failed: {0}")]
    Upstream(String),
    /// The upstream dropped its callback without completing it
    #[error("upstream dropped the request without answering")]
    Abandoned,
    /// The upstream cannot serve requests right now
    #[error("upstream unavailable")]
    Unavailable,
}

impl FetchError {
    /// Create an upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }
}

/// One-shot callback handed to the upstream for a single invocation.
///
/// Consuming `self` makes a second completion impossible. Dropping it
/// without completing resolves the caller with [`FetchError::Abandoned`].
#[derive(Debug)]
pub struct Completion<T> {
    tx: oneshot::Sender<Result<T, FetchError>>,
}

impl<T> Completion<T> {
    /// Deliver an outcome to the waiting caller
    pub fn complete(self, outcome: Result<T, FetchError>) {
        if self.tx.send(outcome).is_err() {
            debug!("Caller stopped waiting before the upstream answered");
        }
    }

    /// Deliver a successful result
    pub fn succeed(self, value: T) {
        self.complete(Ok(value));
    }

    /// Deliver a failure
    pub fn fail(self, err: FetchError) {
        self.complete(Err(err));
    }
}

/// A non-reentrant callback-style upstream call
pub trait UpstreamFetch: Send + Sync + 'static {
    /// Argument of one invocation
    type Arg: Send + 'static;
    /// Successful result of one invocation
    type Output: Send + 'static;

    /// Start one invocation; `done` must eventually be completed or dropped
    fn fetch(&self, arg: Self::Arg, done: Completion<Self::Output>);
}

/// Awaitable, serialized front to an [`UpstreamFetch`]
pub struct SingleFlight<U> {
    upstream: U,
    guard: Mutex<()>,
}

impl<U: UpstreamFetch> SingleFlight<U> {
    /// Wrap `upstream`
    pub fn new(upstream: U) -> Self {
        Self {
            upstream,
            guard: Mutex::new(()),
        }
    }

    /// Invoke the upstream once `arg`'s turn comes and await its callback.
    ///
    /// The guard is released on every exit path, including cancellation of
    /// the returned future.
    ///
    /// # Errors
    ///
    /// Returns the upstream's [`FetchError`], or [`FetchError::Abandoned`] if
    /// the callback was dropped without an answer.
    pub async fn call(&self, arg: U::Arg) -> Result<U::Output, FetchError> {
        let _turn = self.guard.lock().await;
        let (tx, rx) = oneshot::channel();
        self.upstream.fetch(arg, Completion { tx });
        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("Upstream dropped its callback");
                Err(FetchError::Abandoned)
            }
        }
    }

    /// Whether an invocation is currently outstanding
    pub fn is_busy(&self) -> bool {
        self.guard.try_lock().is_err()
    }

    /// Wrapped upstream
    pub fn upstream(&self) -> &U {
        &self.upstream
    }
}
