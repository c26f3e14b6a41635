//! MCP integration tests
//!
//! An in-process fake server answers JSON-RPC requests, so the manager,
//! the tool wrapper and the agent can be exercised end to end.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use agentforce_core::agent::{AgentConfig, AgentForceAgent};
use agentforce_core::config::McpServerConfig;
use agentforce_core::mcp_manager::{McpServerManager, McpServerStatus};
use agentforce_core::provider::{ChatProvider, CompletionResult, LlmMessage, ModelSettings, PendingToolCall};
use agentforce_core::tools::mcp::create_mcp_tools;
use agentforce_core::tools::{Tool, ToolDefinition};
use agentforce_core::{Error, Result};
use agentforce_mcp::Transport;
use async_trait::async_trait;
use serde_json::{Value, json};

/// Minimal MCP server with an `echo` and a `fail` tool
#[derive(Default)]
struct FakeServer {
    inbox: VecDeque<Value>,
    received: Arc<Mutex<Vec<String>>>,
}

impl FakeServer {
    fn handle(&mut self, message: &Value) {
        let method = message["method"].as_str().unwrap_or_default().to_string();
        self.received.lock().unwrap().push(method.clone());

        let Some(id) = message.get("id").cloned() else {
            return;
        };

        let result = match method.as_str() {
            "initialize" => json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "fake", "version": "0.0.1"}
            }),
            "tools/list" => json!({"tools": [
                {
                    "name": "echo",
                    "description": "Echo the text argument",
                    "inputSchema": {"type": "object", "properties": {"text": {"type": "string"}}}
                },
                {"name": "fail", "description": "Always fails"}
            ]}),
            "tools/call" => {
                let name = message["params"]["name"].as_str().unwrap_or_default();
                let text = message["params"]["arguments"]["text"].as_str().unwrap_or_default();
                match name {
                    "echo" => json!({"content": [{"type": "text", "text": format!("echo: {}", text)}]}),
                    "fail" => json!({"content": [{"type": "text", "text": "boom"}], "isError": true}),
                    _ => {
                        self.inbox.push_back(json!({
                            "jsonrpc": "2.0", "id": id,
                            "error": {"code": -32602, "message": format!("Unknown tool {}", name)}
                        }));
                        return;
                    }
                }
            }
            _ => json!({}),
        };

        // Servers may interleave notifications before the response
        self.inbox.push_back(json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {}}));
        self.inbox.push_back(json!({"jsonrpc": "2.0", "id": id, "result": result}));
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn send(&mut self, message: Value) -> io::Result<()> {
        self.handle(&message);
        Ok(())
    }

    async fn receive(&mut self) -> io::Result<Option<Value>> {
        Ok(self.inbox.pop_front())
    }

    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

async fn running_manager(name: &str) -> (Arc<McpServerManager>, Arc<Mutex<Vec<String>>>) {
    let manager = Arc::new(McpServerManager::new());
    manager.add_server(name, McpServerConfig::new("unused")).await;

    let server = FakeServer::default();
    let received = server.received.clone();
    manager
        .start_with_transport(name, Box::new(server))
        .await
        .unwrap();
    (manager, received)
}

#[tokio::test]
async fn test_handshake_and_tool_discovery() {
    let (manager, received) = running_manager("fake").await;

    let servers = manager.list_servers().await;
    assert_eq!(servers[0].status, McpServerStatus::Running);
    assert_eq!(servers[0].tool_count, 2);

    let methods = received.lock().unwrap().clone();
    assert_eq!(methods, vec!["initialize", "notifications/initialized", "tools/list"]);

    let tools = manager.get_server_tools("fake").await.unwrap();
    assert_eq!(tools[0].name, "echo");
    assert_eq!(tools[1].input_schema["type"], "object");
}

#[tokio::test]
async fn test_call_tool_through_manager() {
    let (manager, _) = running_manager("fake").await;

    let result = manager
        .call_tool("fake", "echo", json!({"text": "hi"}))
        .await
        .unwrap();
    assert_eq!(result.text(), "echo: hi");

    let err = manager.call_tool("fake", "nope", json!({})).await.unwrap_err();
    assert!(matches!(err, Error::Mcp(ref m) if m.contains("Unknown tool")));
}

#[tokio::test]
async fn test_wrapped_tools() {
    let (manager, _) = running_manager("fake-srv").await;

    let tools = create_mcp_tools(manager.clone()).await;
    let mut names: Vec<String> = tools.iter().map(|t| t.name().to_string()).collect();
    names.sort();
    assert_eq!(names, vec!["mcp__fake_srv__echo", "mcp__fake_srv__fail"]);

    let echo = tools.iter().find(|t| t.name().ends_with("echo")).unwrap();
    let output = echo.execute(json!({"text": "wrapped"})).await.unwrap();
    assert!(output.success);
    assert_eq!(output.content, json!("echo: wrapped"));
    assert_eq!(output.metadata["mcp_server"], "fake-srv");

    let fail = tools.iter().find(|t| t.name().ends_with("fail")).unwrap();
    let output = fail.execute(json!({})).await.unwrap();
    assert!(!output.success);
    assert_eq!(output.to_model_text(), "Error: boom");
}

#[tokio::test]
async fn test_stop_server_clears_tools() {
    let (manager, _) = running_manager("fake").await;

    manager.stop_server("fake").await.unwrap();
    assert!(manager.get_all_tools().await.is_empty());
    assert!(manager.call_tool("fake", "echo", json!({})).await.is_err());
    assert_eq!(manager.list_servers().await[0].status, McpServerStatus::Stopped);
}

/// Calls the MCP echo tool once, then answers with what it got back
struct McpCallingProvider;

#[async_trait]
impl ChatProvider for McpCallingProvider {
    fn name(&self) -> &str {
        "mcp-caller"
    }

    fn model(&self) -> &str {
        "test"
    }

    async fn chat(
        &self,
        messages: &[LlmMessage],
        tools: &[ToolDefinition],
        _settings: &ModelSettings,
    ) -> Result<CompletionResult> {
        if let Some(result) = messages.iter().rev().find(|m| m.role_name() == "tool") {
            return Ok(CompletionResult::text(format!("Got {}", result.content_as_text())));
        }
        assert!(tools.iter().any(|t| t.name == "mcp__docs__echo"));
        Ok(CompletionResult {
            content: None,
            tool_calls: vec![PendingToolCall {
                call_id: "m1".to_string(),
                name: "mcp__docs__echo".to_string(),
                arguments: json!({"text": "from agent"}),
            }],
        })
    }
}

#[tokio::test]
async fn test_agent_uses_mcp_tools() {
    let (manager, _) = running_manager("docs").await;

    let mut agent = AgentForceAgent::new(AgentConfig::new("mcp-agent"))
        .with_provider(Arc::new(McpCallingProvider))
        .with_mcp_manager(manager)
        .with_mcp(["docs"])
        .prompt("use the echo tool");

    let run = agent.run().await.unwrap();
    assert_eq!(run.response, "Got echo: from agent");
    assert_eq!(run.tool_calls, 1);
}
