use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use thiserror::Error;

use crate::prompt::SystemPrompt;
use crate::stream::StreamEvent;
use pith_store::types::ModelMessage;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Per §7: "contains 401 or error-name suggests auth" → surfaced to the
    /// host CLI collaborator as an auth failure (exit code 1 there; this
    /// crate only classifies, it doesn't exit).
    pub fn is_auth_failure(&self) -> bool {
        match self {
            ProviderError::Api { status, message } => {
                *status == 401 || message.to_lowercase().contains("auth")
            }
            _ => false,
        }
    }
}

/// Classification of a provider's authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    ApiKey,
    OAuth,
    None,
}

#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub token_type: TokenType,
    pub expires_at: Option<i64>,
    pub refreshable: bool,
}

#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A tool call the model requested.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: SystemPrompt,
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub stop_reason: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

/// Grounded in the source project's `skynet-agent/src/provider.rs` trait,
/// narrowed to this project's tool-loop shape. No real network-calling
/// implementation ships here (§1: the concrete LLM client is an external
/// collaborator) — only the trait and the `EchoProvider` test double.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Default: falls back to non-streaming, replaying the single response
    /// as one `TextDelta` plus a terminal `Done`.
    async fn send_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<BoxStream<'static, StreamEvent>, ProviderError> {
        let response = self.send(request).await?;
        let mut events = Vec::with_capacity(response.tool_calls.len() + 2);
        if !response.content.is_empty() {
            events.push(StreamEvent::TextDelta { text: response.content });
        }
        for call in response.tool_calls {
            events.push(StreamEvent::ToolUse {
                id: call.id,
                name: call.name,
                args: call.args,
            });
        }
        events.push(StreamEvent::Done { stop_reason: response.stop_reason });
        Ok(stream::iter(events).boxed())
    }

    fn token_info(&self) -> TokenInfo;
}

/// Test double: echoes the latest user message back as assistant text,
/// never requests a tool call. Used by the chat-loop test suite in place
/// of a real network-calling provider.
pub struct EchoProvider;

#[async_trait]
impl LlmProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let last_user_text = request
            .messages
            .iter()
            .rev()
            .find_map(|m| match m {
                ModelMessage::User { text } => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            content: format!("echo: {last_user_text}"),
            tool_calls: Vec::new(),
            stop_reason: "end_turn".to_string(),
            tokens_in: 0,
            tokens_out: 0,
        })
    }

    fn token_info(&self) -> TokenInfo {
        TokenInfo { token_type: TokenType::None, expires_at: None, refreshable: false }
    }
}
