//! Client for the OpenAI-compatible chat-completion endpoint.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::grammar::TagSet;
use crate::io_struct::AnalyzeRequest;
use crate::stream::{DONE_PAYLOAD, SseLineDecoder};

const DEFAULT_PERSONA: &str = "You are an observer versed in Japanese aesthetics. \
Find the quiet, moving qualities (omomuki) in the given image or text. \
Write plainly, ground every finding in something concrete from the input, \
and choose each category from: wabi-sabi, yugen, mono no aware, fuga.";

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Text increments produced by the upstream model.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, UpstreamError>> + Send>>;

/// One streamed chat-completion chunk. Only the fields we read are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChatChoiceDelta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatChoiceDelta {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub delta: ChatDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatDelta {
    pub role: Option<String>,
    pub content: Option<String>,
}

impl ChatCompletionChunk {
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .filter(|content| !content.is_empty())
    }
}

/// Built-in system prompt: persona plus the output grammar.
pub fn default_system_prompt(tags: &TagSet) -> String {
    format!("{}\n\n{}", DEFAULT_PERSONA, tags.format_instructions())
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl ChatClient {
    pub fn new(config: &UpstreamConfig, tags: &TagSet) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let system_prompt = config
            .system_prompt
            .clone()
            .unwrap_or_else(|| default_system_prompt(tags));

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system_prompt,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn request_body(&self, request: &AnalyzeRequest) -> Value {
        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "stream": true,
            "messages": request.to_messages(&self.system_prompt),
        })
    }

    /// Open a streaming completion and yield the model's text increments.
    pub async fn stream_chat(&self, request: &AnalyzeRequest) -> Result<TextStream, UpstreamError> {
        let mut builder = self.client.post(&self.endpoint).json(&self.request_body(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(text_increments(resp.bytes_stream()))
    }
}

/// Decode an upstream SSE byte stream into text increments.
pub fn text_increments<St>(bytes: St) -> TextStream
where
    St: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let state = (Box::pin(bytes), SseLineDecoder::new(), false);
    let increments = stream::unfold(state, |(mut bytes, mut decoder, done)| async move {
        if done {
            return None;
        }
        let (items, done) = match bytes.next().await {
            Some(Ok(chunk)) => {
                let (texts, saw_done) = decode_payloads(decoder.feed(&chunk));
                (texts.into_iter().map(Ok).collect(), saw_done)
            }
            Some(Err(e)) => (vec![Err(UpstreamError::from(e))], true),
            None => {
                let (texts, _) = decode_payloads(decoder.finish());
                (texts.into_iter().map(Ok).collect(), true)
            }
        };
        Some((stream::iter(items), (bytes, decoder, done)))
    })
    .flatten();

    Box::pin(increments)
}

fn decode_payloads(payloads: Vec<String>) -> (Vec<String>, bool) {
    let mut texts = Vec::new();
    for payload in payloads {
        if payload == DONE_PAYLOAD {
            return (texts, true);
        }
        match serde_json::from_str::<ChatCompletionChunk>(&payload) {
            Ok(chunk) => {
                if let Some(content) = chunk.content() {
                    texts.push(content.to_string());
                }
            }
            Err(e) => debug!(error = %e, "Skipping undecodable upstream chunk"),
        }
    }
    (texts, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_content() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"id":"x","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"<summary>"},"finish_reason":null}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.content(), Some("<summary>"));

        let empty: ChatCompletionChunk =
            serde_json::from_str(r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#)
                .unwrap();
        assert_eq!(empty.content(), None);
    }

    #[test]
    fn test_decode_payloads_stops_at_done() {
        let payloads = vec![
            r#"{"choices":[{"delta":{"content":"a"}}]}"#.to_string(),
            "not json".to_string(),
            r#"{"choices":[{"delta":{"content":"b"}}]}"#.to_string(),
            DONE_PAYLOAD.to_string(),
            r#"{"choices":[{"delta":{"content":"c"}}]}"#.to_string(),
        ];
        assert_eq!(
            decode_payloads(payloads),
            (vec!["a".to_string(), "b".to_string()], true)
        );
    }

    #[test]
    fn test_request_body() {
        let config = UpstreamConfig {
            base_url: "http://localhost:8000/v1/".to_string(),
            ..Default::default()
        };
        let client = ChatClient::new(&config, &TagSet::default()).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8000/v1/chat/completions");

        let body = client.request_body(&AnalyzeRequest {
            text: Some("rain".to_string()),
            image_url: None,
        });
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 1024);
        let system = body["messages"][0]["content"].as_str().unwrap();
        assert!(system.contains("<omomuki>"));
    }

    #[test]
    fn test_request_body_with_custom_system_prompt() {
        let config = UpstreamConfig {
            system_prompt: Some("Reply with <summary> only.".to_string()),
            ..Default::default()
        };
        let client = ChatClient::new(&config, &TagSet::default()).unwrap();
        let body = client.request_body(&AnalyzeRequest {
            text: Some("rain".to_string()),
            image_url: None,
        });
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "Reply with <summary> only.");
    }
}
