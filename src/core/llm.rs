use crate::config::Settings;
use crate::error::{CompareError, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Incremental text deltas of one completion, in arrival order.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// Seam between the compare flow and the model provider.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Bind the backend to a credential. Empty keys are rejected.
    fn initialize(&mut self, api_key: &str) -> Result<()>;

    /// Open a streaming completion for `messages`.
    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> Result<TokenStream>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

struct Connection {
    client: Client,
    api_key: String,
}

pub struct LLMClient {
    connection: Option<Connection>,
    model: String,
    temperature: Option<f32>,
    base_url: String,
}

impl LLMClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            connection: None,
            model: settings.llm.model.clone(),
            temperature: settings.llm.temperature,
            base_url: settings.llm.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.connection.is_some()
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatBackend for LLMClient {
    fn initialize(&mut self, api_key: &str) -> Result<()> {
        if api_key.is_empty() {
            return Err(CompareError::Initialization);
        }

        self.connection = Some(Connection {
            client: Client::new(),
            api_key: api_key.to_string(),
        });
        tracing::debug!("[LLMClient] Initialized for model {}", self.model);
        Ok(())
    }

    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> Result<TokenStream> {
        let connection = self.connection.as_ref().ok_or(CompareError::NotInitialized)?;

        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            stream: true,
        };

        let response = connection
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", connection.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("[LLMClient] HTTP request failed: {}", e);
                CompareError::StreamSetup("request could not be sent".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("[LLMClient] API returned error status {}: {}", status, error_text);
            return Err(CompareError::StreamSetup(format!("API error {}", status)));
        }

        tracing::debug!("[LLMClient] Stream opened with status {}", status);

        let mut decoder = SseDecoder::default();
        let deltas = response
            .bytes_stream()
            .map(Some)
            .chain(stream::once(async { None }))
            .map(move |chunk| match chunk {
                Some(Ok(bytes)) => decoder.feed(&bytes).into_iter().map(Ok).collect::<Vec<_>>(),
                Some(Err(e)) => vec![Err(CompareError::Stream(e.to_string()))],
                // body ended, possibly without a trailing newline
                None => decoder.finish().into_iter().map(Ok).collect(),
            })
            .flat_map(stream::iter);

        Ok(deltas.boxed())
    }
}

/// Incremental decoder for an OpenAI style `text/event-stream` body.
///
/// Network chunks may split lines anywhere, including inside a UTF-8
/// sequence, so raw bytes are buffered until a full line is available.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    /// Feed a chunk of the body, returning every non-empty content delta it
    /// completed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut deltas = Vec::new();
        if self.done {
            return deltas;
        }

        self.buffer.extend_from_slice(bytes);

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(content) = self.decode_line(&line) {
                deltas.push(content);
            }
            if self.done {
                break;
            }
        }

        deltas
    }

    /// Decode whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.done || self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line)
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(line);
        let data = line.trim_end_matches(['\r', '\n']).strip_prefix("data:")?.trim_start();

        if data == "[DONE]" {
            self.done = true;
            self.buffer.clear();
            return None;
        }

        match serde_json::from_str::<StreamChunk>(data) {
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
                .filter(|content| !content.is_empty()),
            Err(e) => {
                tracing::warn!("[SseDecoder] Skipping undecodable event: {}", e);
                None
            }
        }
    }
}
