//! LLM request/response logging
//!
//! When an interaction log path is configured, every request and its
//! outcome is appended to that file as one JSON line.

use serde_json::{Value, json};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{CompletionResult, LlmMessage};
use crate::tools::ToolDefinition;

fn message_to_json(msg: &LlmMessage) -> Value {
    let mut entry = json!({
        "role": msg.role_name(),
        "content": msg.content_as_text(),
    });
    if let LlmMessage::AssistantToolCalls { tool_calls, .. } = msg {
        entry["tool_calls"] = tool_calls
            .iter()
            .map(|c| json!({"name": c.fn_name, "call_id": c.call_id, "arguments": c.fn_arguments}))
            .collect();
    }
    entry
}

/// Append-only JSON-lines log of LLM exchanges
#[derive(Debug, Clone)]
pub struct InteractionLog {
    path: PathBuf,
}

impl InteractionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one exchange. Write failures are logged and otherwise ignored.
    pub fn record(
        &self,
        provider: &str,
        model: &str,
        messages: &[LlmMessage],
        tools: &[ToolDefinition],
        result: Option<&CompletionResult>,
        error: Option<&str>,
    ) {
        let entry = build_entry(provider, model, messages, tools, result, error);

        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{}", entry) {
                    warn!("Failed to write to LLM log file: {}", e);
                    return;
                }
            }
            Err(e) => {
                warn!("Failed to open LLM log file {}: {}", self.path.display(), e);
                return;
            }
        }

        debug!("Logged LLM interaction to {}", self.path.display());
    }
}

fn build_entry(
    provider: &str,
    model: &str,
    messages: &[LlmMessage],
    tools: &[ToolDefinition],
    result: Option<&CompletionResult>,
    error: Option<&str>,
) -> Value {
    json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "provider": provider,
        "model": model,
        "request": {
            "messages": messages.iter().map(message_to_json).collect::<Vec<_>>(),
            "message_count": messages.len(),
            "tools": tools.iter().map(|t| json!({
                "name": t.name,
                "description": t.description,
                "parameters": t.parameters,
            })).collect::<Vec<_>>(),
            "tool_count": tools.len(),
        },
        "response": result.map(|r| json!({
            "type": if r.has_tool_calls() { "tool_calls" } else { "message" },
            "content": r.content,
            "tool_calls": r.tool_calls,
        })),
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_appends_json_lines() {
        let dir = TempDir::new().unwrap();
        let log = InteractionLog::new(dir.path().join("llm.jsonl"));
        let messages = vec![LlmMessage::system("Be brief"), LlmMessage::user("Hi")];

        log.record("ollama", "llama3.2", &messages, &[], Some(&CompletionResult::text("Hello")), None);
        log.record("ollama", "llama3.2", &messages, &[], None, Some("connection refused"));

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["request"]["message_count"], 2);
        assert_eq!(lines[0]["request"]["messages"][1]["role"], "user");
        assert_eq!(lines[0]["response"]["content"], "Hello");
        assert_eq!(lines[0]["response"]["type"], "message");
        assert!(lines[1]["response"].is_null());
        assert_eq!(lines[1]["error"], "connection refused");
    }

    #[test]
    fn test_unwritable_path_is_ignored() {
        let dir = TempDir::new().unwrap();
        let log = InteractionLog::new(dir.path().join("missing").join("llm.jsonl"));
        log.record("gemini", "m", &[], &[], None, None);
        assert!(!log.path().exists());
    }
}
