//! Streaming support for OpenAI-compatible chat completions
//!
//! Raw bytes go through three stages:
//! 1. [`SseParser`] splits them into events
//! 2. each event's data is parsed as JSON and handed to the caller's
//!    `on_payload` callback, untouched
//! 3. [`ChunkDecoder`] turns the payload into [`CompletionChunk`]s

pub mod sse_parser;

pub use sse_parser::{SseEvent, SseParser, DONE_MARKER};

use std::collections::BTreeMap;

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde_json::Value;

use super::{CompletionChunk, CompletionStream, StreamOptions, Usage};
use crate::{
    error::{Result, TapError},
    reasoning::extract_reasoning_text,
};

/// Tool call being assembled from deltas
#[derive(Debug, Clone, Default)]
struct ToolCallBuilder {
    id: String,
    name: String,
}

/// Decoder for streamed chat-completion payloads
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    /// Tool calls by their `index` in the delta
    tool_calls: BTreeMap<u64, ToolCallBuilder>,
    usage: Option<Usage>,
    finish_reason: Option<String>,
}

impl ChunkDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one payload.
    ///
    /// Unknown shapes decode to nothing. A payload carrying an `error` object
    /// (sent mid-stream by some providers) is reported as an error.
    pub fn decode(&mut self, payload: &Value) -> Result<Vec<CompletionChunk>> {
        if let Some(error) = payload.get("error").filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown provider error");
            return Err(TapError::Stream(message.to_string()));
        }

        if let Some(usage) = payload.get("usage").and_then(parse_usage) {
            self.usage = Some(usage);
        }

        let mut chunks = Vec::new();

        let Some(choice) = payload.get("choices").and_then(|c| c.get(0)) else {
            return Ok(chunks);
        };

        if let Some(delta) = choice.get("delta") {
            if let Some(thinking) = extract_reasoning_text(payload) {
                chunks.push(CompletionChunk::ThinkingDelta {
                    thinking: thinking.to_string(),
                });
            }

            if let Some(text) = delta.get("content").and_then(Value::as_str) {
                if !text.is_empty() {
                    chunks.push(CompletionChunk::TextDelta {
                        text: text.to_string(),
                    });
                }
            }

            if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
                for tool_call in tool_calls {
                    self.apply_tool_call_delta(tool_call, &mut chunks);
                }
            }
        }

        if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
            self.finish_reason = Some(reason.to_string());
        }

        Ok(chunks)
    }

    fn apply_tool_call_delta(&mut self, delta: &Value, chunks: &mut Vec<CompletionChunk>) {
        let index = delta.get("index").and_then(Value::as_u64).unwrap_or(0);
        let function = delta.get("function");
        let is_new = !self.tool_calls.contains_key(&index);
        let builder = self.tool_calls.entry(index).or_default();

        if let Some(id) = delta.get("id").and_then(Value::as_str) {
            builder.id = id.to_string();
        }
        if let Some(name) = function.and_then(|f| f.get("name")).and_then(Value::as_str) {
            builder.name = name.to_string();
        }
        if is_new {
            chunks.push(CompletionChunk::ToolUseStart {
                id: builder.id.clone(),
                name: builder.name.clone(),
            });
        }

        if let Some(args) = function
            .and_then(|f| f.get("arguments"))
            .and_then(Value::as_str)
        {
            if !args.is_empty() {
                chunks.push(CompletionChunk::ToolInputDelta {
                    id: builder.id.clone(),
                    partial_json: args.to_string(),
                });
            }
        }
    }

    /// Final chunk of the stream
    #[must_use]
    pub fn done(&self) -> CompletionChunk {
        CompletionChunk::Done {
            stop_reason: self
                .finish_reason
                .clone()
                .unwrap_or_else(|| "stop".to_string()),
            usage: self.usage,
        }
    }

    /// Whether the provider reported a finish reason
    #[must_use]
    pub fn has_finished(&self) -> bool {
        self.finish_reason.is_some()
    }
}

fn parse_usage(usage: &Value) -> Option<Usage> {
    let tokens = |key: &str| {
        usage
            .get(key)
            .and_then(Value::as_u64)
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
    };

    Some(Usage {
        input_tokens: tokens("prompt_tokens")?,
        output_tokens: tokens("completion_tokens")?,
    })
}

/// Bytes-to-chunks pipeline for one streamed response
#[derive(Debug)]
pub struct PayloadPump {
    parser: SseParser,
    decoder: ChunkDecoder,
    options: StreamOptions,
    done: bool,
    /// Error hit after some chunks of the same push were already decoded
    pending: Option<TapError>,
}

impl PayloadPump {
    #[must_use]
    pub fn new(options: StreamOptions) -> Self {
        Self {
            parser: SseParser::new(),
            decoder: ChunkDecoder::new(),
            options,
            done: false,
            pending: None,
        }
    }

    /// Feed response bytes.
    ///
    /// When an event fails after earlier events in `bytes` already decoded,
    /// those chunks are returned and the error is held back for
    /// [`PayloadPump::take_error`]. Nothing is decoded once an error is pending.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<CompletionChunk>> {
        if let Some(e) = self.pending.take() {
            return Err(e);
        }

        let mut chunks = Vec::new();
        for event in self.parser.feed(bytes) {
            match self.handle(&event) {
                Ok(decoded) => chunks.extend(decoded),
                Err(e) if chunks.is_empty() => return Err(e),
                Err(e) => {
                    self.pending = Some(e);
                    break;
                }
            }
        }
        Ok(chunks)
    }

    /// Error held back by the last [`PayloadPump::push`]
    pub fn take_error(&mut self) -> Option<TapError> {
        self.pending.take()
    }

    /// End of the response body.
    ///
    /// A stream that ends without `[DONE]` is accepted only if the provider
    /// already reported a finish reason.
    pub fn finish(&mut self) -> Result<Vec<CompletionChunk>> {
        if let Some(e) = self.pending.take() {
            return Err(e);
        }

        let mut chunks = match self.parser.finish() {
            Some(event) => self.handle(&event)?,
            None => Vec::new(),
        };

        if !self.done {
            if !self.decoder.has_finished() {
                return Err(TapError::Stream(
                    "stream ended before completion".to_string(),
                ));
            }
            self.done = true;
            chunks.push(self.decoder.done());
        }

        Ok(chunks)
    }

    /// Whether `[DONE]` has been seen
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn handle(&mut self, event: &SseEvent) -> Result<Vec<CompletionChunk>> {
        if self.done {
            return Ok(Vec::new());
        }
        if event.is_done_marker() {
            self.done = true;
            return Ok(vec![self.decoder.done()]);
        }

        let payload: Value = serde_json::from_str(&event.data)?;
        self.options.emit_payload(&payload);
        self.decoder.decode(&payload)
    }
}

/// Run a response body through a [`PayloadPump`] as a [`CompletionStream`].
///
/// The first error ends the stream.
pub fn pump_stream<S, B, E>(body: S, options: StreamOptions) -> CompletionStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<TapError> + Send + 'static,
{
    Box::pin(stream! {
        let mut pump = PayloadPump::new(options);
        let mut body = Box::pin(body);

        while let Some(next) = body.next().await {
            let pushed = match next {
                Ok(bytes) => pump.push(bytes.as_ref()),
                Err(e) => Err(e.into()),
            };
            match pushed {
                Ok(chunks) => {
                    for chunk in chunks {
                        yield Ok(chunk);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
            if let Some(e) = pump.take_error() {
                yield Err(e);
                return;
            }
            if pump.is_done() {
                break;
            }
        }

        match pump.finish() {
            Ok(chunks) => {
                for chunk in chunks {
                    yield Ok(chunk);
                }
            }
            Err(e) => yield Err(e),
        }
    })
}
