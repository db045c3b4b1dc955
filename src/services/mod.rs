//! Streaming chat-completion services
//!
//! This module defines the calling contract shared by every streaming
//! function in the crate ([`StreamFn`]) and two implementations of it:
//! - [`openai::OpenAICompatClient`] for live OpenAI-compatible endpoints
//!   (OpenAI, OpenRouter, Ollama, vLLM, ...)
//! - [`replay::ReplayStream`] for recorded SSE transcripts

pub mod openai;
pub mod replay;
pub mod streaming;

use std::{collections::BTreeMap, fmt, pin::Pin, sync::Arc};

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Callback invoked once per raw streamed payload.
pub type PayloadCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Options for a streaming invocation
///
/// Everything except `on_payload` is forwarded to the provider.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature for sampling (0.0-2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Top-p for nucleus sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    /// Reasoning effort level (for reasoning models)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,

    /// Extra HTTP headers sent with the request
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_headers: BTreeMap<String, String>,

    /// Raw payload observer
    #[serde(skip)]
    pub on_payload: Option<PayloadCallback>,
}

impl StreamOptions {
    /// Create empty options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw payload callback
    #[must_use]
    pub fn on_payload(mut self, callback: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.on_payload = Some(Arc::new(callback));
        self
    }

    /// Hand a payload to the `on_payload` callback, if there is one
    pub fn emit_payload(&self, payload: &Value) {
        if let Some(callback) = &self.on_payload {
            callback(payload);
        }
    }
}

impl fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamOptions")
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("stop_sequences", &self.stop_sequences)
            .field("reasoning_effort", &self.reasoning_effort)
            .field("extra_headers", &self.extra_headers)
            .field("on_payload", &self.on_payload.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

/// A streaming model invocation: `(model, context, options) -> output`.
///
/// The output is whatever the implementation produces (usually a
/// [`CompletionStream`]); payloads are reported through
/// [`StreamOptions::on_payload`] as they arrive. Any
/// `Fn(M, C, Option<StreamOptions>) -> O` is a stream function.
pub trait StreamFn<M, C> {
    /// Value returned by an invocation
    type Output;

    /// Start streaming
    fn stream(&self, model: M, context: C, options: Option<StreamOptions>) -> Self::Output;
}

impl<F, M, C, O> StreamFn<M, C> for F
where
    F: Fn(M, C, Option<StreamOptions>) -> O,
{
    type Output = O;

    fn stream(&self, model: M, context: C, options: Option<StreamOptions>) -> O {
        self(model, context, options)
    }
}

/// A chunk of streaming completion data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompletionChunk {
    /// Text delta
    TextDelta { text: String },

    /// Thinking/reasoning content (for reasoning models)
    ThinkingDelta { thinking: String },

    /// Tool use started
    ToolUseStart { id: String, name: String },

    /// Tool input delta (JSON string fragment)
    ToolInputDelta { id: String, partial_json: String },

    /// Stream completed
    Done {
        stop_reason: String,
        usage: Option<Usage>,
    },
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Completion stream type
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<CompletionChunk>> + Send>>;
