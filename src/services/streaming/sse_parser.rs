//! Server-Sent Events (SSE) parser
//!
//! Incremental, byte-oriented: network reads may split lines and even UTF-8
//! sequences anywhere, so input is buffered as bytes and only complete lines
//! are decoded.
//!
//! Follows <https://html.spec.whatwg.org/multipage/server-sent-events.html>.

/// Data value OpenAI-compatible providers send to mark the end of a stream
pub const DONE_MARKER: &str = "[DONE]";

/// SSE event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type from an `event:` field
    pub event_type: Option<String>,

    /// Event data, multiple `data:` lines joined by `\n`
    pub data: String,

    /// Last event ID
    pub id: Option<String>,

    /// Reconnection delay in milliseconds
    pub retry: Option<u64>,
}

impl SseEvent {
    /// Check if this is the `[DONE]` marker
    #[must_use]
    pub fn is_done_marker(&self) -> bool {
        self.data.trim() == DONE_MARKER
    }
}

/// Incremental SSE parser
#[derive(Debug, Default)]
pub struct SseParser {
    /// Event being assembled
    current: SseEvent,

    /// Whether `current` has seen a `data:` field
    has_data: bool,

    /// Bytes of the line not yet terminated
    pending: Vec<u8>,
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every event completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            if let Some(event) = self.process_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }

        events
    }

    /// Feed a string slice
    pub fn feed_str(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.feed(chunk.as_bytes())
    }

    /// End of input: dispatch whatever was buffered.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            if let Some(event) = self.process_line(&String::from_utf8_lossy(&line)) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }

        // Comment / keepalive
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.current.event_type = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.current.data.push('\n');
                }
                self.current.data.push_str(value);
                self.has_data = true;
            }
            "id" => self.current.id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse() {
                    self.current.retry = Some(ms);
                }
            }
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = std::mem::take(&mut self.current);
        std::mem::take(&mut self.has_data).then_some(event)
    }
}
