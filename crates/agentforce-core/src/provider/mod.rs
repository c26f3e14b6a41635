//! LLM Provider abstraction using GenAI
//!
//! Three backends are supported through the genai framework:
//! - Ollama (local)
//! - OpenRouter
//! - Google Gemini
//!
//! Agents talk to them through the [`ChatProvider`] trait so tests can swap
//! in a scripted provider.

pub mod catalog;
mod genai_provider;
mod logging;

pub use genai_provider::GenAIProvider;
pub use logging::InteractionLog;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tools::ToolDefinition;

// Re-export the genai message types used in conversation history
pub use genai::chat::{ChatMessage, ChatRole, ToolCall, ToolResponse};

/// Supported LLM provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Ollama (local)
    Ollama,
    /// OpenRouter (OpenAI-compatible gateway)
    OpenRouter,
    /// Google Gemini
    Gemini,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(ProviderType::Ollama),
            "openrouter" => Ok(ProviderType::OpenRouter),
            "gemini" | "google" => Ok(ProviderType::Gemini),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

impl ProviderType {
    /// Get the default model for this provider
    pub fn default_model(&self) -> &'static str {
        catalog::default_model(self.as_str()).unwrap_or("unknown")
    }

    /// Get the environment variable name for API key
    pub fn api_key_env(&self) -> Option<&'static str> {
        catalog::api_key_env(self.as_str())
    }

    /// Get the default endpoint
    pub fn default_base_url(&self) -> Option<&'static str> {
        catalog::base_url(self.as_str())
    }

    /// Get the provider type as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Ollama => "ollama",
            ProviderType::OpenRouter => "openrouter",
            ProviderType::Gemini => "gemini",
        }
    }

    /// Whether requests need an API key
    pub fn requires_api_key(&self) -> bool {
        self.api_key_env().is_some()
    }
}

/// Sampling settings passed with each request
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Message for LLM API calls
///
/// genai uses different types for chat messages, tool calls, and tool
/// results. This enum keeps them in one conversation history.
#[derive(Debug, Clone)]
pub enum LlmMessage {
    /// Regular chat message (user, assistant, system)
    Chat(ChatMessage),
    /// Tool result message
    ToolResult(ToolResponse),
    /// Assistant message with tool calls
    AssistantToolCalls {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
}

impl LlmMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::Chat(ChatMessage::user(content.into()))
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Chat(ChatMessage::assistant(content.into()))
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::Chat(ChatMessage::system(content.into()))
    }

    /// Create an assistant message carrying tool calls
    pub fn assistant_with_tool_calls(content: Option<String>, calls: &[PendingToolCall]) -> Self {
        Self::AssistantToolCalls {
            content,
            tool_calls: calls.iter().cloned().map(ToolCall::from).collect(),
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult(ToolResponse::new(call_id.into(), content.into()))
    }

    /// Get the role of this message
    pub fn role(&self) -> ChatRole {
        match self {
            Self::Chat(msg) => msg.role.clone(),
            Self::ToolResult(_) => ChatRole::Tool,
            Self::AssistantToolCalls { .. } => ChatRole::Assistant,
        }
    }

    /// Lowercase role name
    pub fn role_name(&self) -> &'static str {
        match self {
            Self::ToolResult(_) => "tool",
            Self::AssistantToolCalls { .. } => "assistant",
            Self::Chat(msg) => match msg.role {
                ChatRole::System => "system",
                ChatRole::Assistant => "assistant",
                ChatRole::Tool => "tool",
                _ => "user",
            },
        }
    }

    /// Get text content as a string (for logging/display)
    pub fn content_as_text(&self) -> String {
        match self {
            Self::Chat(msg) => msg.content.joined_texts().unwrap_or_default(),
            Self::ToolResult(resp) => resp.content.to_string(),
            Self::AssistantToolCalls { content, .. } => content.clone().unwrap_or_default(),
        }
    }
}

/// Tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingToolCall {
    pub call_id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl From<ToolCall> for PendingToolCall {
    fn from(tc: ToolCall) -> Self {
        Self {
            call_id: tc.call_id,
            name: tc.fn_name,
            arguments: tc.fn_arguments,
        }
    }
}

impl From<PendingToolCall> for ToolCall {
    fn from(tc: PendingToolCall) -> Self {
        ToolCall {
            call_id: tc.call_id,
            fn_name: tc.name,
            fn_arguments: tc.arguments,
            thought_signatures: None,
        }
    }
}

/// Response from completion that may contain both content and tool calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResult {
    /// Text content from the assistant (may be present even with tool calls)
    pub content: Option<String>,
    pub tool_calls: Vec<PendingToolCall>,
}

impl CompletionResult {
    /// Plain text reply without tool calls
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Check if this result has any tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Check if this result has text content
    pub fn has_content(&self) -> bool {
        self.content.as_ref().map(|c| !c.is_empty()).unwrap_or(false)
    }
}

/// A chat backend the agent can drive
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name (e.g., "ollama", "gemini")
    fn name(&self) -> &str;

    /// Model identifier sent with each request
    fn model(&self) -> &str;

    /// Run one completion over the conversation so far
    async fn chat(
        &self,
        messages: &[LlmMessage],
        tools: &[ToolDefinition],
        settings: &ModelSettings,
    ) -> Result<CompletionResult>;
}
