//! Playback of recorded SSE transcripts
//!
//! A transcript is the raw body of a streamed chat completion as captured
//! from the wire. Replaying it drives the same pipeline a live response
//! would, including `on_payload` callbacks, which makes it handy for
//! inspecting captures and for tests.

use std::{path::Path, sync::Arc};

use futures::stream;

use super::{streaming::pump_stream, CompletionStream, StreamFn, StreamOptions};
use crate::{
    error::{Result, TapError},
    messages::ChatContext,
};

/// Size of the slices a transcript is delivered in by default
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Stream function that plays back a recorded transcript
#[derive(Debug, Clone)]
pub struct ReplayStream {
    transcript: Arc<[u8]>,
    chunk_size: usize,
}

impl ReplayStream {
    pub fn new(transcript: impl Into<Vec<u8>>) -> Self {
        Self {
            transcript: transcript.into().into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Load a transcript from disk
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read
    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(std::fs::read(path)?))
    }

    /// Deliver the transcript in slices of `chunk_size` bytes (minimum 1)
    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl StreamFn<String, ChatContext> for ReplayStream {
    type Output = CompletionStream;

    fn stream(
        &self,
        model: String,
        context: ChatContext,
        options: Option<StreamOptions>,
    ) -> CompletionStream {
        tracing::debug!(
            model = %model,
            messages = context.messages.len(),
            bytes = self.transcript.len(),
            "replaying transcript"
        );

        let slices: Vec<std::result::Result<Vec<u8>, TapError>> = self
            .transcript
            .chunks(self.chunk_size)
            .map(|slice| Ok(slice.to_vec()))
            .collect();

        pump_stream(stream::iter(slices), options.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::CompletionChunk;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    const TRANSCRIPT: &str = concat!(
        ": OPENROUTER PROCESSING\n\n",
        "data: {\"id\":\"gen-1\",\"choices\":[{\"delta\":{\"role\":\"assistant\",\"reasoning\":\"Two plus two\"}}]}\n\n",
        "data: {\"id\":\"gen-1\",\"choices\":[{\"delta\":{\"content\":\"4\"},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );

    #[tokio::test]
    async fn test_replay_delivers_every_payload() {
        let seen = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&seen);
        let options = StreamOptions::new().on_payload(move |_| *counter.lock().unwrap() += 1);

        let chunks: Vec<CompletionChunk> = ReplayStream::new(TRANSCRIPT)
            .chunk_size(5)
            .stream("m".to_string(), ChatContext::default(), Some(options))
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(*seen.lock().unwrap(), 2);
        assert_eq!(
            chunks,
            vec![
                CompletionChunk::ThinkingDelta {
                    thinking: "Two plus two".to_string()
                },
                CompletionChunk::TextDelta {
                    text: "4".to_string()
                },
                CompletionChunk::Done {
                    stop_reason: "stop".to_string(),
                    usage: None
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_replay_is_repeatable() {
        let replay = ReplayStream::new(TRANSCRIPT);
        for _ in 0..2 {
            let count = replay
                .stream("m".to_string(), ChatContext::default(), None)
                .count()
                .await;
            assert_eq!(count, 3);
        }
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = ReplayStream::from_path(Path::new("/nonexistent/transcript.sse")).unwrap_err();
        assert!(matches!(err, TapError::Io(_)));
    }
}
