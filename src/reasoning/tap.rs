//! Reasoning stream tap
//!
//! [`ReasoningTap`] decorates a [`StreamFn`] so that every streamed payload is
//! checked for reasoning text before being handed to the caller's own
//! `on_payload` callback. The observer is a side channel only: whatever it
//! does, the original callback sees every payload, once, unchanged and in
//! order.
//!
//! For a payload that carries reasoning, the observer runs first and the
//! original callback second, both on the thread delivering the payload.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::extract::extract_reasoning_text;
use crate::services::{StreamFn, StreamOptions};

const TARGET: &str = "agent::reasoning";

/// Reasoning text seen in one streamed payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningEvent {
    pub text: String,
}

/// Observer receiving [`ReasoningEvent`]s
pub type ReasoningObserver = Arc<dyn Fn(ReasoningEvent) + Send + Sync>;

/// Options for [`ReasoningTap::new`]
#[derive(Clone, Default)]
pub struct TapOptions {
    /// Called with each piece of reasoning text; `None` disables the tap
    pub on_reasoning_stream: Option<ReasoningObserver>,
}

impl TapOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reasoning observer
    #[must_use]
    pub fn on_reasoning_stream(
        mut self,
        observer: impl Fn(ReasoningEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_reasoning_stream = Some(Arc::new(observer));
        self
    }
}

impl fmt::Debug for TapOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapOptions")
            .field(
                "on_reasoning_stream",
                &self.on_reasoning_stream.as_ref().map(|_| "<observer>"),
            )
            .finish()
    }
}

/// Factory for reasoning-tapped stream functions
#[derive(Clone)]
pub struct ReasoningTap {
    observer: ReasoningObserver,
}

impl ReasoningTap {
    /// Create a tap, or `None` when no observer was supplied.
    ///
    /// `None` means there is nothing to do: callers should use their stream
    /// function as is instead of wrapping it.
    #[must_use]
    pub fn new(options: TapOptions) -> Option<Self> {
        options
            .on_reasoning_stream
            .map(|observer| Self { observer })
    }

    /// Wrap a stream function so its payloads pass through the tap.
    ///
    /// Each call to the returned function installs a fresh payload callback;
    /// nothing is shared between invocations except the observer. Wrapping an
    /// already tapped function stacks: each layer reports reasoning on its
    /// own, so the observer fires once per layer.
    pub fn wrap_stream_fn<F>(&self, stream_fn: F) -> TappedStreamFn<F> {
        tracing::debug!(target: TARGET, "reasoning tap installed");
        TappedStreamFn {
            inner: stream_fn,
            observer: Arc::clone(&self.observer),
        }
    }
}

impl fmt::Debug for ReasoningTap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReasoningTap").finish_non_exhaustive()
    }
}

/// A stream function with a reasoning tap on its payload callback
#[derive(Clone)]
pub struct TappedStreamFn<F> {
    inner: F,
    observer: ReasoningObserver,
}

impl<F, M, C> StreamFn<M, C> for TappedStreamFn<F>
where
    F: StreamFn<M, C>,
{
    type Output = F::Output;

    fn stream(&self, model: M, context: C, options: Option<StreamOptions>) -> F::Output {
        let mut options = options.unwrap_or_default();
        let original = options.on_payload.take();
        let observer = Arc::clone(&self.observer);

        options.on_payload = Some(Arc::new(move |payload: &Value| {
            notify(&observer, payload);
            if let Some(original) = &original {
                original(payload);
            }
        }));

        self.inner.stream(model, context, Some(options))
    }
}

impl<F> fmt::Debug for TappedStreamFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TappedStreamFn").finish_non_exhaustive()
    }
}

/// Run extraction and the observer; a panic in either is dropped here.
fn notify(observer: &ReasoningObserver, payload: &Value) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        if let Some(text) = extract_reasoning_text(payload) {
            tracing::trace!(target: TARGET, len = text.len(), "reasoning delta");
            observer(ReasoningEvent {
                text: text.to_owned(),
            });
        }
    }));

    if outcome.is_err() {
        tracing::trace!(target: TARGET, "reasoning observer panicked, event dropped");
    }
}
