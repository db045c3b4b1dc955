//! Command implementations

use std::{
    io::{self, BufRead, Write},
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use futures::StreamExt;
use tokio::io::AsyncReadExt;

use super::{Cli, Commands};
use crate::{
    config::TapConfig,
    error::Result,
    messages::ChatContext,
    reasoning::{extract_reasoning_text, ReasoningEvent, ReasoningTap, TapOptions},
    services::{
        openai::OpenAICompatClient, replay::ReplayStream, CompletionChunk, CompletionStream,
        StreamFn, StreamOptions,
    },
};

/// Execute the parsed command
///
/// # Errors
///
/// Returns an error if input cannot be read, the configuration is invalid,
/// or the stream fails
pub async fn run(cli: Cli, config: TapConfig) -> Result<()> {
    match cli.command {
        Commands::Replay {
            file,
            model,
            chunk_size,
        } => {
            let replay = load_transcript(&file).await?.chunk_size(chunk_size);
            let model = model.unwrap_or_else(|| config.default_model.clone());
            stream_and_render(replay, model, ChatContext::default(), StreamOptions::new(), &config)
                .await
        }
        Commands::Chat {
            prompt,
            model,
            system,
            max_tokens,
            reasoning_effort,
            ..
        } => {
            config.validate()?;
            let client = OpenAICompatClient::from_config(&config)?;
            let model = model.unwrap_or_else(|| config.default_model.clone());

            let mut context = ChatContext::from_prompt(prompt);
            if let Some(system) = system {
                context = context.with_system_prompt(system);
            }
            let options = StreamOptions {
                max_tokens,
                reasoning_effort,
                ..StreamOptions::default()
            };

            stream_and_render(client, model, context, options, &config).await
        }
        Commands::Extract => {
            let stdin = io::stdin();
            let stdout = io::stdout();
            extract_lines(stdin.lock(), stdout.lock())?;
            Ok(())
        }
    }
}

async fn load_transcript(file: &Path) -> Result<ReplayStream> {
    if file == Path::new("-") {
        let mut transcript = Vec::new();
        tokio::io::stdin().read_to_end(&mut transcript).await?;
        Ok(ReplayStream::new(transcript))
    } else {
        ReplayStream::from_path(file)
    }
}

/// Prints reasoning fragments to stderr as they arrive
#[derive(Debug, Clone, Default)]
struct ReasoningPrinter {
    printed: Arc<AtomicBool>,
}

impl ReasoningPrinter {
    fn tap_options(&self) -> TapOptions {
        let printed = Arc::clone(&self.printed);
        TapOptions::new().on_reasoning_stream(move |event: ReasoningEvent| {
            printed.store(true, Ordering::Relaxed);
            let mut stderr = io::stderr().lock();
            let _ = write!(stderr, "{}", event.text);
            let _ = stderr.flush();
        })
    }

    fn finish(&self) {
        if self.printed.load(Ordering::Relaxed) {
            eprintln!();
        }
    }
}

/// Start `stream_fn`, tapped when reasoning output is enabled, and render
/// the content to stdout.
async fn stream_and_render<F>(
    stream_fn: F,
    model: String,
    context: ChatContext,
    mut options: StreamOptions,
    config: &TapConfig,
) -> Result<()>
where
    F: StreamFn<String, ChatContext, Output = CompletionStream>,
{
    if config.echo_payloads {
        options = options.on_payload(|payload| eprintln!("{payload}"));
    }

    let printer = ReasoningPrinter::default();
    let tap_options = if config.show_reasoning {
        printer.tap_options()
    } else {
        TapOptions::default()
    };

    let stream = match ReasoningTap::new(tap_options) {
        Some(tap) => tap.wrap_stream_fn(stream_fn).stream(model, context, Some(options)),
        None => stream_fn.stream(model, context, Some(options)),
    };

    let result = render(stream, &mut io::stdout()).await;
    printer.finish();
    result
}

async fn render<W: Write>(mut stream: CompletionStream, out: &mut W) -> Result<()> {
    while let Some(chunk) = stream.next().await {
        match chunk? {
            CompletionChunk::TextDelta { text } => {
                write!(out, "{text}")?;
                out.flush()?;
            }
            CompletionChunk::ToolUseStart { id, name } => {
                tracing::info!(tool = %name, id = %id, "tool call requested");
            }
            CompletionChunk::Done { stop_reason, usage } => {
                writeln!(out)?;
                tracing::debug!(stop_reason = %stop_reason, ?usage, "stream complete");
            }
            CompletionChunk::ThinkingDelta { .. } | CompletionChunk::ToolInputDelta { .. } => {}
        }
    }
    Ok(())
}

/// Run extraction over JSON lines, writing one JSON line per input line.
///
/// Lines that are not valid JSON (including lines that are not UTF-8)
/// produce `null`.
///
/// # Errors
///
/// Returns an error if reading input or writing output fails
pub fn extract_lines<R: BufRead, W: Write>(input: R, mut output: W) -> Result<usize> {
    let mut found = 0;

    for (number, line) in input.split(b'\n').enumerate() {
        let mut line = line?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        let event = match serde_json::from_slice(&line) {
            Ok(payload) => extract_reasoning_text(&payload).map(|text| ReasoningEvent {
                text: text.to_string(),
            }),
            Err(e) => {
                tracing::debug!(line = number + 1, error = %e, "skipping non-JSON line");
                None
            }
        };

        found += usize::from(event.is_some());
        serde_json::to_writer(&mut output, &event)?;
        writeln!(output)?;
    }

    output.flush()?;
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TapError;
    use futures::stream;
    use pretty_assertions::assert_eq;

    /// Writer whose reader has gone away
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
    }

    fn chunks(items: Vec<CompletionChunk>) -> CompletionStream {
        Box::pin(stream::iter(items.into_iter().map(Ok)))
    }

    #[test]
    fn test_extract_lines() {
        let input = concat!(
            "{\"choices\":[{\"delta\":{\"reasoning\":\"a\\nb\"}}]}\n",
            "{\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n",
            "not json\n",
            "\n",
            "{\"choices\":[{\"delta\":{\"thinking\":\"c\"}}]}\n",
        );
        let mut output = Vec::new();

        let found = extract_lines(input.as_bytes(), &mut output).unwrap();

        assert_eq!(found, 2);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "{\"text\":\"a\\nb\"}\nnull\nnull\nnull\n{\"text\":\"c\"}\n"
        );
    }

    #[test]
    fn test_extract_lines_maps_non_utf8_to_null() {
        let mut input = b"{\"choices\":[{\"delta\":{\"reasoning\":\"a\"}}]}\n".to_vec();
        input.extend_from_slice(b"\xff\xfe\r\n");
        input.extend_from_slice(b"{\"choices\":[{\"delta\":{\"reasoning\":\"b\"}}]}\r\n");
        let mut output = Vec::new();

        let found = extract_lines(input.as_slice(), &mut output).unwrap();

        assert_eq!(found, 2);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "{\"text\":\"a\"}\nnull\n{\"text\":\"b\"}\n"
        );
    }

    #[tokio::test]
    async fn test_render_writes_text_and_final_newline() {
        let stream = chunks(vec![
            CompletionChunk::ThinkingDelta {
                thinking: "hidden".to_string(),
            },
            CompletionChunk::TextDelta {
                text: "4".to_string(),
            },
            CompletionChunk::Done {
                stop_reason: "stop".to_string(),
                usage: None,
            },
        ]);
        let mut out = Vec::new();

        render(stream, &mut out).await.unwrap();

        assert_eq!(out, b"4\n");
    }

    #[tokio::test]
    async fn test_render_closed_output_is_an_error() {
        let stream = chunks(vec![CompletionChunk::TextDelta {
            text: "4".to_string(),
        }]);

        let err = render(stream, &mut ClosedPipe).await.unwrap_err();

        assert!(matches!(err, TapError::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }
}
