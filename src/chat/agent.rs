//! Client for the external agent service.
//!
//! The agent runs the reasoning loop and calls our MCP tools on its own; this
//! side only forwards the conversation and relays the streamed reply. The
//! production client speaks the OpenAI-compatible `chat/completions`
//! streaming protocol.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::{ChatConfig, HttpConfig};
use crate::sources::ErrorKind;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Errors from the agent service
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    #[error("agent unavailable{}: {detail}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Unavailable { status: Option<u16>, detail: String },

    #[error("agent rejected credentials: {0}")]
    Authentication(String),

    #[error("malformed agent stream: {0}")]
    Malformed(String),
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Unavailable { .. } => ErrorKind::SourceUnavailable,
            AgentError::Authentication(_) => ErrorKind::AuthenticationFailure,
            AgentError::Malformed(_) => ErrorKind::MalformedResponse,
        }
    }

    fn unavailable(status: Option<u16>, detail: impl Into<String>) -> Self {
        AgentError::Unavailable {
            status,
            detail: detail.into(),
        }
    }
}

/// Stream of text deltas for one agent turn
pub type DeltaStream = BoxStream<'static, Result<String, AgentError>>;

/// One conversational turn against the agent
#[async_trait]
pub trait AgentSession: Send + Sync + std::fmt::Debug {
    /// Send the messages and stream back the reply text
    ///
    /// `reasoning` switches the model's extended thinking on for this turn.
    async fn stream(
        &self,
        model: &str,
        reasoning: bool,
        messages: Vec<ChatMessage>,
    ) -> Result<DeltaStream, AgentError>;
}

/// Agent reached over an OpenAI-compatible streaming endpoint
#[derive(Debug, Clone)]
pub struct HttpAgentSession {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    reasoning_budget: u32,
}

impl HttpAgentSession {
    pub fn new(chat: &ChatConfig, http: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(&http.user_agent)
            .connect_timeout(http.connect_timeout())
            .timeout(chat.agent_timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", chat.agent_url.trim_end_matches('/')),
            api_key: chat.agent_api_key.clone(),
            reasoning_budget: chat.reasoning_budget_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, model: &str, reasoning: bool, messages: &[ChatMessage]) -> Value {
        let thinking = if reasoning {
            json!({ "type": "enabled", "budget_tokens": self.reasoning_budget })
        } else {
            json!({ "type": "disabled" })
        };
        json!({
            "model": model,
            "messages": messages,
            "stream": true,
            "thinking": thinking,
        })
    }
}

#[async_trait]
impl AgentSession for HttpAgentSession {
    async fn stream(
        &self,
        model: &str,
        reasoning: bool,
        messages: Vec<ChatMessage>,
    ) -> Result<DeltaStream, AgentError> {
        let count = messages.len();
        let body = self.request_body(model, reasoning, &messages);

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!(endpoint = %self.endpoint, model, reasoning, messages = count, "calling agent");
        let response = request
            .send()
            .await
            .map_err(|e| AgentError::unavailable(None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let mut bytes = Box::pin(response.bytes_stream());
        let stream = async_stream::try_stream! {
            // Bytes, not text: a UTF-8 sequence may straddle two chunks
            let mut buffer: Vec<u8> = Vec::new();
            let mut done = false;
            'read: while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|e| AgentError::unavailable(None, format!("stream read error: {}", e)))?;
                buffer.extend_from_slice(&chunk);

                while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                    let line = String::from_utf8_lossy(&raw);

                    match parse_sse_line(line.trim())? {
                        SseLine::Delta(text) => yield text,
                        SseLine::Done => {
                            done = true;
                            break 'read;
                        }
                        SseLine::Skip => {}
                    }
                }
            }

            // Last line may arrive without a newline
            if !done && !buffer.is_empty() {
                let line = String::from_utf8_lossy(&buffer).into_owned();
                if let SseLine::Delta(text) = parse_sse_line(line.trim())? {
                    yield text;
                }
            }
        };

        Ok(stream.boxed())
    }
}

fn status_error(status: StatusCode, body: &str) -> AgentError {
    let detail = format!(
        "{}: {}",
        status.canonical_reason().unwrap_or("error"),
        body.chars().take(300).collect::<String>()
    );
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Authentication(detail),
        _ => AgentError::unavailable(Some(status.as_u16()), detail),
    }
}

/// Meaning of one line of the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    Delta(String),
    Done,
    /// Comments, keep-alives, role-only chunks and other fields
    Skip,
}

/// Parse a single line of an OpenAI-compatible event stream
pub fn parse_sse_line(line: &str) -> Result<SseLine, AgentError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };
    parse_sse_chunk(data.trim())
}

/// Parse the payload of one `data:` field
pub fn parse_sse_chunk(data: &str) -> Result<SseLine, AgentError> {
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }
    if data.is_empty() {
        return Ok(SseLine::Skip);
    }

    let v: Value = serde_json::from_str(data)
        .map_err(|e| AgentError::Malformed(format!("invalid chunk JSON: {}", e)))?;

    // Some servers report failures mid-stream instead of via the status line
    if let Some(error) = v.get("error") {
        let detail = error["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(AgentError::unavailable(None, detail));
    }

    let text = v["choices"]
        .get(0)
        .and_then(|choice| choice["delta"]["content"].as_str())
        .filter(|s| !s.is_empty());

    Ok(match text {
        Some(text) => SseLine::Delta(text.to_string()),
        None => SseLine::Skip,
    })
}
