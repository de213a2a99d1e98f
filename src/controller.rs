//! Stateful front-end for the retry engine.
//!
//! A [`RequestController`] owns the observable state of one request site.
//! Each [`RequestController::execute`] call takes a new generation number and
//! a fresh cancellation token; starting another call or resetting cancels the
//! token and bumps the generation, so a superseded call can neither keep
//! retrying nor write its late result into the state.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    engine, FetchResult, Payload, RequestConfig, RequestState, RetryOptions, Transport,
    CANCELLED_MESSAGE,
};

const FALLBACK_ERROR: &str = "Request failed";

/// Point-in-time copy of a controller's state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestSnapshot {
    pub state: RequestState,
    pub data: Option<Payload>,
    pub error: Option<String>,
}

impl RequestSnapshot {
    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }
}

#[derive(Default)]
struct Inner {
    snapshot: RequestSnapshot,
    generation: u64,
    cancel: Option<CancellationToken>,
}

struct Shared {
    inner: Mutex<Inner>,
    state_tx: watch::Sender<RequestState>,
}

impl Shared {
    fn publish(&self, inner: &mut Inner, state: RequestState) {
        inner.snapshot.state = state;
        self.state_tx.send_replace(state);
    }

    /// Moves call `generation` into `waking-backend`. Returns `false` when
    /// that call has been superseded.
    fn mark_waking(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return false;
        }
        if inner.snapshot.state == RequestState::Loading {
            self.publish(&mut inner, RequestState::WakingBackend);
        }
        true
    }

    fn settle(&self, generation: u64, result: &FetchResult) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                generation,
                current = inner.generation,
                "discarding result of superseded request"
            );
            return;
        }
        inner.cancel = None;

        if result.is_success() {
            inner.snapshot.data = result.data.clone();
            self.publish(&mut inner, RequestState::Success);
        } else {
            inner.snapshot.error = Some(
                result
                    .error
                    .clone()
                    .unwrap_or_else(|| FALLBACK_ERROR.to_owned()),
            );
            self.publish(&mut inner, RequestState::Error);
        }
    }

    /// Settles call `generation` as cancelled after its future was dropped.
    fn abandon(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(generation, "request dropped before completion");
        inner.snapshot.error = Some(CANCELLED_MESSAGE.to_owned());
        self.publish(&mut inner, RequestState::Error);
    }
}

/// Drives `idle → loading → (waking-backend) → success | error` for one
/// request site, with at most one live call at a time.
pub struct RequestController<Tr: Transport> {
    transport: Tr,
    options: RetryOptions,
    shared: Arc<Shared>,
}

impl<Tr: Transport> RequestController<Tr> {
    /// Creates an idle controller.
    ///
    /// `options` supplies the timing and the caller's hooks. A cancellation
    /// token in `options` acts as a parent: cancelling it cancels whatever
    /// call is in flight.
    pub fn new(transport: Tr, options: RetryOptions) -> Self {
        let (state_tx, _) = watch::channel(RequestState::Idle);
        Self {
            transport,
            options,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                state_tx,
            }),
        }
    }

    /// Runs a request, replacing any call already in flight.
    ///
    /// The result is always returned, even when a newer call or a
    /// [`reset`](Self::reset) has since made it irrelevant for the state.
    ///
    /// Dropping the returned future before it completes cancels the call and,
    /// unless a newer call has started, leaves the controller in `error` with
    /// the cancellation message.
    pub async fn execute(&self, target: &str, request: &RequestConfig) -> FetchResult {
        let (generation, cancel) = self.begin();
        let pending = PendingCall {
            shared: &self.shared,
            generation,
        };
        let options = self.call_options(generation, cancel);
        let result = engine::run(&self.transport, target, request, &options).await;
        pending.settle(&result);
        result
    }

    /// Cancels any call in flight and returns to `idle`.
    pub fn reset(&self) {
        let mut inner = self.shared.inner.lock();
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
        inner.generation += 1;
        inner.snapshot.data = None;
        inner.snapshot.error = None;
        self.shared.publish(&mut inner, RequestState::Idle);
    }

    pub fn state(&self) -> RequestState {
        self.shared.inner.lock().snapshot.state
    }

    pub fn data(&self) -> Option<Payload> {
        self.shared.inner.lock().snapshot.data.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.shared.inner.lock().snapshot.error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    pub fn snapshot(&self) -> RequestSnapshot {
        self.shared.inner.lock().snapshot.clone()
    }

    /// Subscribes to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<RequestState> {
        self.shared.state_tx.subscribe()
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let mut inner = self.shared.inner.lock();
        if let Some(previous) = inner.cancel.take() {
            #[cfg(feature = "tracing")]
            tracing::debug!(generation = inner.generation, "superseding in-flight request");
            previous.cancel();
        }
        inner.generation += 1;

        let cancel = match &self.options.cancel {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        inner.cancel = Some(cancel.clone());
        inner.snapshot.data = None;
        inner.snapshot.error = None;
        self.shared.publish(&mut inner, RequestState::Loading);

        (inner.generation, cancel)
    }

    fn call_options(&self, generation: u64, cancel: CancellationToken) -> RetryOptions {
        let shared = Arc::clone(&self.shared);
        let on_backend_waking = self.options.on_backend_waking.clone();

        let mut options = self.options.clone().with_on_backend_waking(move || {
            if !shared.mark_waking(generation) {
                return;
            }
            #[cfg(feature = "tracing")]
            tracing::debug!(generation, "backend waking detected");
            if let Some(callback) = &on_backend_waking {
                callback();
            }
        });
        options.cancel = Some(cancel);
        options
    }
}

/// Settles an `execute` call exactly once, also when its future is dropped.
struct PendingCall<'a> {
    shared: &'a Shared,
    generation: u64,
}

impl PendingCall<'_> {
    fn settle(self, result: &FetchResult) {
        self.shared.settle(self.generation, result);
        std::mem::forget(self);
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        self.shared.abandon(self.generation);
    }
}
