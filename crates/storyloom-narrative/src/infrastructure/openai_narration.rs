//! Narration client for OpenAI-compatible chat completion servers
//! (LM Studio, Ollama, vLLM and the hosted API).

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use storyloom_core::error::DomainError;
use storyloom_core::message::Conversation;
use storyloom_core::narration::{FragmentStream, NarrationClient};
use tracing::{debug, warn};

/// Default base URL, a local LM Studio server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:1234/v1";

/// Default model name.
pub const DEFAULT_MODEL: &str = "local-model";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Connection settings for an OpenAI-compatible server.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiSettings {
    /// Base URL including the version segment, e.g. `http://host:1234/v1`.
    pub base_url: String,
    /// Model name sent with every request.
    pub model: String,
    /// Bearer token, if the server wants one.
    pub api_key: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Client for the `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiNarrationClient {
    client: Client,
    settings: OpenAiSettings,
}

impl OpenAiNarrationClient {
    /// Creates a client. Requests time out after two minutes; local models
    /// can be slow.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the HTTP client cannot be
    /// built.
    pub fn new(mut settings: OpenAiSettings) -> Result<Self, DomainError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| DomainError::Infrastructure(format!("cannot build HTTP client: {e}")))?;
        settings.base_url = settings.base_url.trim_end_matches('/').to_owned();
        Ok(Self { client, settings })
    }

    async fn send(
        &self,
        conversation: &Conversation,
        system_prompt: &str,
        stream: bool,
    ) -> Result<reqwest::Response, DomainError> {
        let body = ChatRequest {
            model: &self.settings.model,
            messages: build_messages(conversation, system_prompt),
            temperature: self.settings.temperature,
            stream,
        };

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.settings.base_url))
            .json(&body);
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DomainError::Narration(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DomainError::Narration(format!(
                "model server returned {status}: {text}"
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl NarrationClient for OpenAiNarrationClient {
    async fn get_chat_completion(
        &self,
        conversation: &Conversation,
        system_prompt: &str,
    ) -> Result<String, DomainError> {
        let response: ChatResponse = self
            .send(conversation, system_prompt, false)
            .await?
            .json()
            .await
            .map_err(|e| DomainError::Narration(format!("invalid completion response: {e}")))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| DomainError::Narration("completion contained no choices".to_owned()))
    }

    async fn get_streamed_chat_completion(
        &self,
        conversation: &Conversation,
        system_prompt: &str,
    ) -> Result<FragmentStream, DomainError> {
        let body = self
            .send(conversation, system_prompt, true)
            .await?
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| DomainError::Narration(format!("stream interrupted: {e}")))
            })
            .boxed();

        Ok(fragments(body))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// System prompt first, then the conversation in order.
fn build_messages(conversation: &Conversation, system_prompt: &str) -> Vec<ChatMessage> {
    let system = (!system_prompt.trim().is_empty()).then(|| ChatMessage {
        role: "system",
        content: system_prompt.to_owned(),
    });
    system
        .into_iter()
        .chain(conversation.iter().map(|m| ChatMessage {
            role: m.role().as_str(),
            content: m.content().to_owned(),
        }))
        .collect()
}

/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SseItem {
    Fragment(String),
    Done,
}

/// Splits a byte stream into `data:` lines. Lines may straddle chunks.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseItem> {
        self.buffer.extend_from_slice(bytes);
        let mut items = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(item) = decode_line(&String::from_utf8_lossy(&line)) {
                items.push(item);
            }
        }
        items
    }

    fn finish(&mut self) -> Option<SseItem> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&String::from_utf8_lossy(&rest))
    }
}

fn decode_line(line: &str) -> Option<SseItem> {
    let data = line.trim_end().strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseItem::Done);
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|content| !content.is_empty())
            .map(SseItem::Fragment),
        Err(e) => {
            warn!(error = %e, "skipping malformed stream chunk");
            None
        }
    }
}

struct FragmentState {
    body: BoxStream<'static, Result<Vec<u8>, DomainError>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

/// Turns a raw SSE body into text fragments, ending at `[DONE]` or EOF.
fn fragments(body: BoxStream<'static, Result<Vec<u8>, DomainError>>) -> FragmentStream {
    let state = FragmentState {
        body,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    for item in state.decoder.push(&bytes) {
                        match item {
                            SseItem::Fragment(text) => state.pending.push_back(text),
                            SseItem::Done => {
                                state.finished = true;
                                break;
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    state.pending.clear();
                    return Some((Err(e), state));
                }
                None => {
                    debug!("model stream ended without [DONE]");
                    if let Some(SseItem::Fragment(text)) = state.decoder.finish() {
                        state.pending.push_back(text);
                    }
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}
