//! Model/tool round trips
//!
//! Each round sends the conversation plus the registered tool definitions to
//! the provider. Native tool calls are executed and answered with tool result
//! messages. Models without native tool support may instead write a fenced
//! JSON invocation:
//!
//! ````text
//! ```json
//! {"tool": "fs_read_file", "arguments": {"path": "notes.txt"}}
//! ```
//! ````
//!
//! Those are executed the same way, with results fed back as a user message.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::formatting::scan;
use crate::formatting::truncate::{MAX_TOOL_RESULT_SIZE, truncate_tool_result};
use crate::provider::{ChatProvider, CompletionResult, LlmMessage, ModelSettings, PendingToolCall};
use crate::tools::ToolRegistry;

/// Summary of a finished loop
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    /// Final assistant text
    pub response: String,
    /// Rounds in which tools were executed
    pub rounds: usize,
    pub tool_calls: usize,
    /// True when the loop stopped at the round limit
    pub hit_limit: bool,
}

pub struct ToolLoop<'a> {
    provider: &'a dyn ChatProvider,
    registry: &'a ToolRegistry,
    settings: ModelSettings,
    max_rounds: usize,
}

impl<'a> ToolLoop<'a> {
    pub fn new(provider: &'a dyn ChatProvider, registry: &'a ToolRegistry) -> Self {
        Self {
            provider,
            registry,
            settings: ModelSettings::default(),
            max_rounds: 10,
        }
    }

    pub fn with_settings(mut self, settings: ModelSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Drive the conversation until the model stops calling tools
    ///
    /// Every message produced along the way is appended to `messages`,
    /// ending with the final assistant reply.
    pub async fn run(&self, messages: &mut Vec<LlmMessage>) -> Result<LoopOutcome> {
        let definitions = self.registry.list();
        let mut rounds = 0;
        let mut tool_calls = 0;

        loop {
            let result = self.provider.chat(messages.as_slice(), &definitions, &self.settings).await?;
            let text = result.content.clone().unwrap_or_default();

            let (calls, native) = if result.has_tool_calls() {
                (result.tool_calls.clone(), true)
            } else if self.registry.is_empty() {
                (Vec::new(), false)
            } else {
                // Only names of registered tools count, so JSON answers pass through
                let calls = parse_fenced_tool_calls(&text)
                    .into_iter()
                    .filter(|call| self.registry.get(&call.name).is_some())
                    .collect();
                (calls, false)
            };

            if calls.is_empty() {
                messages.push(LlmMessage::assistant(text.clone()));
                return Ok(LoopOutcome {
                    response: text,
                    rounds,
                    tool_calls,
                    hit_limit: false,
                });
            }

            if rounds >= self.max_rounds {
                warn!(
                    provider = self.provider.name(),
                    max_rounds = self.max_rounds,
                    pending = calls.len(),
                    "Tool round limit reached, returning last reply"
                );
                messages.push(LlmMessage::assistant(text.clone()));
                return Ok(LoopOutcome {
                    response: text,
                    rounds,
                    tool_calls,
                    hit_limit: true,
                });
            }

            rounds += 1;
            tool_calls += calls.len();
            debug!(round = rounds, calls = calls.len(), native, "Executing tool calls");

            let outputs =
                futures::future::join_all(calls.iter().map(|call| self.execute_call(call))).await;

            if native {
                messages.push(assistant_turn(&result));
                for (call, output) in calls.iter().zip(outputs) {
                    messages.push(LlmMessage::tool_result(&call.call_id, output));
                }
            } else {
                messages.push(LlmMessage::assistant(text));
                let report = calls
                    .iter()
                    .zip(outputs)
                    .map(|(call, output)| format!("Result of tool `{}`:\n{}", call.name, output))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                messages.push(LlmMessage::user(report));
            }
        }
    }

    /// Run one call; failures become error text for the model
    async fn execute_call(&self, call: &PendingToolCall) -> String {
        let Some(tool) = self.registry.get(&call.name) else {
            warn!(tool = %call.name, "Model called an unknown tool");
            return format!("Error: Unknown tool: {}", call.name);
        };

        let output = match tool.execute(call.arguments.clone()).await {
            Ok(output) => {
                debug!(tool = %call.name, success = output.success, "Tool finished");
                output.to_model_text()
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool failed");
                format!("Error: {}", e)
            }
        };

        let truncated = truncate_tool_result(&output, MAX_TOOL_RESULT_SIZE);
        if truncated.len() < output.len() {
            info!(
                "Truncated {} result from {} to {} chars",
                call.name,
                output.len(),
                truncated.len()
            );
        }
        truncated
    }
}

fn assistant_turn(result: &CompletionResult) -> LlmMessage {
    let content = result.content.clone().filter(|c| !c.is_empty());
    LlmMessage::assistant_with_tool_calls(content, &result.tool_calls)
}

/// Tool invocations written as fenced JSON in a reply
///
/// Accepts `{"tool"|"name": ..., "arguments"|"args": {...}}` objects, or an
/// array of them, in `json` tagged or untagged blocks.
pub fn parse_fenced_tool_calls(text: &str) -> Vec<PendingToolCall> {
    scan(text)
        .into_iter()
        .filter(|block| block.is_language("json") || block.is_generic())
        .filter_map(|block| serde_json::from_str::<Value>(block.content.trim()).ok())
        .flat_map(|value| match value {
            Value::Array(items) => items,
            single => vec![single],
        })
        .filter_map(|value| invocation(&value))
        .collect()
}

fn invocation(value: &Value) -> Option<PendingToolCall> {
    let object = value.as_object()?;
    let name = object
        .get("tool")
        .or_else(|| object.get("name"))
        .and_then(Value::as_str)?;
    let arguments = object
        .get("arguments")
        .or_else(|| object.get("args"))
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));

    Some(PendingToolCall {
        call_id: format!("call_{}", uuid::Uuid::new_v4().simple()),
        name: name.to_string(),
        arguments,
    })
}
