//! GenAI-based LLM provider implementation
//!
//! Each provider gets its own service-target resolver that pins the genai
//! adapter kind, so model names such as `openai/gpt-4o-mini` on OpenRouter
//! are never re-routed by name. Base URL and API key come from the provider
//! catalog unless overridden.

use async_trait::async_trait;
use futures::StreamExt;
use genai::adapter::AdapterKind;
use genai::chat::{ChatOptions, ChatRequest, ChatStreamEvent, Tool};
use genai::resolver::{AuthData, Endpoint, ServiceTargetResolver};
use genai::{Client, ModelIden, ServiceTarget, WebConfig};
use std::time::Duration;

use super::logging::InteractionLog;
use super::{ChatProvider, CompletionResult, LlmMessage, ModelSettings, PendingToolCall, ProviderType};
use crate::error::{Error, Result};
use crate::tools::ToolDefinition;

/// A provider implementation using genai
pub struct GenAIProvider {
    client: Client,
    provider_type: ProviderType,
    model: String,
    base_url: String,
    interaction_log: Option<InteractionLog>,
}

impl GenAIProvider {
    /// Default timeout for LLM API requests (5 minutes)
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    fn default_web_config() -> WebConfig {
        WebConfig::default()
            .with_timeout(Self::DEFAULT_TIMEOUT)
            .with_connect_timeout(Duration::from_secs(30))
    }

    /// Create a provider that reads its API key from the catalog's env var
    pub fn new(provider_type: ProviderType, model: Option<&str>) -> Self {
        Self::with_config(provider_type, None, model, None)
    }

    /// Create a provider with a specific API key
    pub fn with_api_key(provider_type: ProviderType, api_key: &str, model: Option<&str>) -> Self {
        Self::with_config(provider_type, Some(api_key), model, None)
    }

    /// Create a provider with optional API key and base URL overrides
    pub fn with_config(
        provider_type: ProviderType,
        api_key: Option<&str>,
        model: Option<&str>,
        base_url: Option<&str>,
    ) -> Self {
        let base_url = endpoint_url(
            base_url
                .or(provider_type.default_base_url())
                .unwrap_or_default(),
        );
        let auth = match (api_key, provider_type.api_key_env()) {
            (Some(key), _) => AuthData::from_single(key.to_string()),
            (None, Some(env)) => AuthData::from_env(env),
            // Local servers ignore the key but genai still sends one
            (None, None) => AuthData::from_single(provider_type.as_str().to_string()),
        };

        let adapter = adapter_kind(provider_type);
        let endpoint_base = base_url.clone();
        let target_resolver = ServiceTargetResolver::from_resolver_fn(
            move |target: ServiceTarget| -> std::result::Result<ServiceTarget, genai::resolver::Error> {
                let ServiceTarget { model, .. } = target;
                Ok(ServiceTarget {
                    endpoint: Endpoint::from_owned(endpoint_base.clone()),
                    auth: auth.clone(),
                    model: ModelIden::new(adapter, model.model_name),
                })
            },
        );

        let client = Client::builder()
            .with_web_config(Self::default_web_config())
            .with_service_target_resolver(target_resolver)
            .build();

        Self {
            client,
            provider_type,
            model: model.unwrap_or(provider_type.default_model()).to_string(),
            base_url,
            interaction_log: None,
        }
    }

    /// Append every exchange to a JSON-lines file
    pub fn with_interaction_log(mut self, log: InteractionLog) -> Self {
        self.interaction_log = Some(log);
        self
    }

    pub fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    /// Resolved endpoint, always ending with `/`
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(messages: &[LlmMessage], tools: &[ToolDefinition]) -> ChatRequest {
        let mut chat_req = ChatRequest::default();

        for msg in messages {
            chat_req = match msg {
                LlmMessage::Chat(chat) => chat_req.append_message(chat.clone()),
                LlmMessage::ToolResult(response) => chat_req.append_message(response.clone()),
                LlmMessage::AssistantToolCalls { tool_calls, .. } => {
                    // OpenAI-style APIs need the calls as one assistant message
                    chat_req.append_message(tool_calls.clone())
                }
            };
        }

        if !tools.is_empty() {
            let genai_tools: Vec<Tool> = tools
                .iter()
                .map(|t| {
                    Tool::new(&t.name)
                        .with_description(&t.description)
                        .with_schema(t.parameters.clone())
                })
                .collect();
            chat_req = chat_req.with_tools(genai_tools);
        }

        chat_req
    }

    async fn stream_completion(
        &self,
        chat_req: ChatRequest,
        options: &ChatOptions,
    ) -> Result<CompletionResult> {
        let stream_response = self
            .client
            .exec_chat_stream(&self.model, chat_req, Some(options))
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, model = %self.model, "LLM request failed");
                Error::Provider(format!("GenAI error: {:?}", e))
            })?;

        let mut content = String::new();
        let mut tool_calls: Vec<PendingToolCall> = Vec::new();
        let mut stream = stream_response.stream;

        while let Some(event) = stream.next().await {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) => {
                    content.push_str(&chunk.content);
                }
                Ok(ChatStreamEvent::ToolCallChunk(tc)) => {
                    // Each ToolCallChunk contains a complete ToolCall
                    tool_calls.push(PendingToolCall::from(tc.tool_call));
                }
                Ok(ChatStreamEvent::End(_)) => break,
                // Reasoning text stays out of the reply
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = ?e, model = %self.model, "LLM stream error");
                    return Err(Error::Provider(format!("GenAI stream error: {:?}", e)));
                }
            }
        }

        Ok(CompletionResult {
            content: if content.is_empty() { None } else { Some(content) },
            tool_calls,
        })
    }
}

#[async_trait]
impl ChatProvider for GenAIProvider {
    fn name(&self) -> &str {
        self.provider_type.as_str()
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[LlmMessage],
        tools: &[ToolDefinition],
        settings: &ModelSettings,
    ) -> Result<CompletionResult> {
        let chat_req = Self::build_request(messages, tools);
        let options = chat_options(settings);

        tracing::debug!(
            provider = %self.provider_type,
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "Sending chat request"
        );

        let result = self.stream_completion(chat_req, &options).await;

        if let Some(log) = &self.interaction_log {
            let error = result.as_ref().err().map(|e| e.to_string());
            log.record(
                self.name(),
                &self.model,
                messages,
                tools,
                result.as_ref().ok(),
                error.as_deref(),
            );
        }

        result
    }
}

fn adapter_kind(provider_type: ProviderType) -> AdapterKind {
    match provider_type {
        ProviderType::Ollama => AdapterKind::Ollama,
        ProviderType::OpenRouter => AdapterKind::OpenAI,
        ProviderType::Gemini => AdapterKind::Gemini,
    }
}

fn chat_options(settings: &ModelSettings) -> ChatOptions {
    let mut options = ChatOptions::default();
    if let Some(temperature) = settings.temperature {
        options = options.with_temperature(temperature);
    }
    if let Some(max_tokens) = settings.max_tokens {
        options = options.with_max_tokens(max_tokens);
    }
    options
}

/// genai joins request paths onto the endpoint, so it must end with `/`
fn endpoint_url(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    }
}
