//! OpenAI-compatible streaming client
//!
//! Supports:
//! - OpenAI official API
//! - OpenRouter, which reports reasoning in `delta.reasoning`
//! - Other OpenAI-compatible endpoints (Ollama, vLLM, LM Studio, ...)

use async_stream::stream;
use futures::StreamExt;
use reqwest::{header, Client};
use serde::Serialize;

use super::{streaming::pump_stream, CompletionStream, StreamFn, StreamOptions};
use crate::{
    config::TapConfig,
    error::{Result, TapError},
    messages::{ChatContext, ContentBlock, Message, Role},
};

/// Streaming client for `POST {base_url}/chat/completions`
#[derive(Debug, Clone)]
pub struct OpenAICompatClient {
    client: Client,
    base_url: String,
}

impl OpenAICompatClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, api_key: Option<&str>) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(api_key) = api_key {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
                    TapError::ConfigValidation("Invalid API key format".to_string())
                })?,
            );
        }

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from resolved configuration
    ///
    /// # Errors
    ///
    /// See [`OpenAICompatClient::new`]
    pub fn from_config(config: &TapConfig) -> Result<Self> {
        Self::new(&config.base_url, config.api_key.as_deref())
    }

    fn build_request(model: String, context: &ChatContext, options: &StreamOptions) -> ChatRequest {
        let mut messages = Vec::with_capacity(context.messages.len() + 1);
        if let Some(system) = &context.system_prompt {
            messages.push(ChatMessage {
                role: Role::System.as_str(),
                content: system.clone(),
            });
        }
        messages.extend(context.messages.iter().map(convert_message));

        ChatRequest {
            model,
            messages,
            stream: true,
            stream_options: StreamUsage {
                include_usage: true,
            },
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            stop: options.stop_sequences.clone(),
            reasoning_effort: options.reasoning_effort.clone(),
        }
    }
}

/// Tool calls are not replayed to the endpoint; only text survives.
fn convert_message(message: &Message) -> ChatMessage {
    let content = message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    ChatMessage {
        role: message.role.as_str(),
        content,
    }
}

impl StreamFn<String, ChatContext> for OpenAICompatClient {
    type Output = CompletionStream;

    fn stream(
        &self,
        model: String,
        context: ChatContext,
        options: Option<StreamOptions>,
    ) -> CompletionStream {
        let options = options.unwrap_or_default();
        let body = Self::build_request(model, &context, &options);

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(header::ACCEPT, "text/event-stream")
            .json(&body);
        for (name, value) in &options.extra_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        tracing::debug!(model = %body.model, url = %self.base_url, "starting chat completion stream");

        Box::pin(stream! {
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(TapError::from(e));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                tracing::warn!(status = status.as_u16(), "chat completion request failed");
                yield Err(TapError::Api {
                    status: status.as_u16(),
                    message,
                });
                return;
            }

            let mut chunks = pump_stream(response.bytes_stream(), options);
            while let Some(chunk) = chunks.next().await {
                yield chunk;
            }
        })
    }
}

// OpenAI API types

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    stream_options: StreamUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct StreamUsage {
    include_usage: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::CompletionChunk;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use wiremock::{
        matchers::{body_partial_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    const BODY: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"reasoning\":\"Checking\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Yes\"},\"finish_reason\":\"stop\"}]}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":2}}\n\n",
        "data: [DONE]\n\n",
    );

    #[test]
    fn test_build_request() {
        let context = ChatContext::from_prompt("hi").with_system_prompt("be brief");
        let options = StreamOptions {
            max_tokens: Some(100),
            reasoning_effort: Some("high".to_string()),
            ..StreamOptions::default()
        };

        let body = serde_json::to_value(OpenAICompatClient::build_request(
            "gpt-test".to_string(),
            &context,
            &options,
        ))
        .unwrap();

        assert_eq!(
            body,
            json!({
                "model": "gpt-test",
                "messages": [
                    { "role": "system", "content": "be brief" },
                    { "role": "user", "content": "hi" }
                ],
                "stream": true,
                "stream_options": { "include_usage": true },
                "max_tokens": 100,
                "reasoning_effort": "high"
            })
        );
    }

    #[test]
    fn test_invalid_api_key() {
        let err = OpenAICompatClient::new("http://localhost", Some("bad\nkey")).unwrap_err();
        assert!(matches!(err, TapError::ConfigValidation(_)));
    }

    #[tokio::test]
    async fn test_stream_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("x-title", "reasoning-tap"))
            .and(body_partial_json(json!({ "model": "r1", "stream": true })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(BODY, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAICompatClient::new(format!("{}/", server.uri()), Some("sk-test")).unwrap();
        let payloads = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&payloads);
        let mut options = StreamOptions::new().on_payload(move |_| *counter.lock().unwrap() += 1);
        options
            .extra_headers
            .insert("x-title".to_string(), "reasoning-tap".to_string());

        let chunks: Vec<CompletionChunk> = client
            .stream("r1".to_string(), ChatContext::from_prompt("ok?"), Some(options))
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(*payloads.lock().unwrap(), 3);
        assert_eq!(
            chunks.last(),
            Some(&CompletionChunk::Done {
                stop_reason: "stop".to_string(),
                usage: Some(crate::services::Usage {
                    input_tokens: 3,
                    output_tokens: 2
                })
            })
        );
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("no key"))
            .mount(&server)
            .await;

        let client = OpenAICompatClient::new(server.uri(), None).unwrap();
        let items: Vec<_> = client
            .stream("r1".to_string(), ChatContext::from_prompt("x"), None)
            .collect()
            .await;

        assert_eq!(items.len(), 1);
        match &items[0] {
            Err(TapError::Api { status, message }) => {
                assert_eq!(*status, 401);
                assert_eq!(message, "no key");
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }
}
