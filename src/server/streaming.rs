//! Streaming bridge: generation events in, HTTP body bytes out
//!
//! Adapts the backend's event stream into a byte stream suitable for an
//! incremental HTTP body, firing lifecycle callbacks in a fixed order:
//!
//! `on_start` (once, on first poll) → per fragment: `on_token` then the
//! fragment is forwarded downstream → `on_completion` → `on_final`.
//!
//! `on_token` always fires *before* its fragment is handed downstream.
//! Backpressure is inherent: the downstream body polls the bridge, the
//! bridge polls upstream, so production paces itself to the transport.
//! Dropping the outward stream drops the upstream response and aborts the
//! generation.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::backend::{BackendError, GenerationEvent, GenerationStream};

type StartHook = Box<dyn FnMut() + Send>;
type TokenHook = Box<dyn FnMut(&str) + Send>;
type CompletionHook = Box<dyn FnMut() + Send>;
type FinalHook = Box<dyn FnMut(&str) + Send>;

/// Optional lifecycle observers; each is a no-op when unset
#[derive(Default)]
pub struct StreamCallbacks {
    on_start: Option<StartHook>,
    on_token: Option<TokenHook>,
    on_completion: Option<CompletionHook>,
    on_final: Option<FinalHook>,
}

impl StreamCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires once before the first fragment is forwarded
    pub fn on_start(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    /// Fires once per fragment, in arrival order, before forwarding it
    pub fn on_token(mut self, hook: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_token = Some(Box::new(hook));
        self
    }

    /// Fires once after the last fragment, before `on_final`
    pub fn on_completion(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_completion = Some(Box::new(hook));
        self
    }

    /// Fires last, with the full accumulated text
    pub fn on_final(mut self, hook: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_final = Some(Box::new(hook));
        self
    }

    fn start(&mut self) {
        if let Some(hook) = self.on_start.as_mut() {
            hook();
        }
    }

    fn token(&mut self, fragment: &str) {
        if let Some(hook) = self.on_token.as_mut() {
            hook(fragment);
        }
    }

    fn completion(&mut self) {
        if let Some(hook) = self.on_completion.as_mut() {
            hook();
        }
    }

    fn finalize(&mut self, full_text: &str) {
        if let Some(hook) = self.on_final.as_mut() {
            hook(full_text);
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Upstream(#[from] BackendError),

    #[error("generation stream ended without a completion signal")]
    Truncated,
}

struct BridgeState {
    upstream: GenerationStream,
    callbacks: StreamCallbacks,
    accumulated: String,
    started: bool,
    finished: bool,
}

/// Republish a generation stream as an HTTP-ready byte stream.
///
/// Fragments are forwarded unchanged and in order; their concatenation is
/// buffered internally and handed to `on_final`. On an upstream error or a
/// missing terminal event the outward stream yields one error and ends, and
/// neither `on_completion` nor `on_final` fires. Callbacks already fired
/// are not retracted.
pub fn bridge_generation(
    upstream: GenerationStream,
    callbacks: StreamCallbacks,
) -> impl Stream<Item = Result<Bytes, BridgeError>> + Send {
    let state = BridgeState {
        upstream,
        callbacks,
        accumulated: String::new(),
        started: false,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }
        if !state.started {
            state.started = true;
            state.callbacks.start();
        }
        match state.upstream.next().await {
            Some(Ok(GenerationEvent::Token(fragment))) => {
                state.callbacks.token(&fragment);
                state.accumulated.push_str(&fragment);
                Some((Ok(Bytes::from(fragment)), state))
            }
            Some(Ok(GenerationEvent::Completion(_))) => {
                state.finished = true;
                state.callbacks.completion();
                state.callbacks.finalize(&state.accumulated);
                None
            }
            Some(Err(err)) => {
                state.finished = true;
                Some((Err(BridgeError::Upstream(err)), state))
            }
            None => {
                state.finished = true;
                Some((Err(BridgeError::Truncated), state))
            }
        }
    })
}
