//! MCP Client implementation

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Mutex;

use crate::protocol::{methods, is_response, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId};
use crate::transport::Transport;
use crate::{McpResource, McpTool, ServerCapabilities, PROTOCOL_VERSION};

/// MCP Client for connecting to MCP servers
pub struct McpClient<T: Transport> {
    transport: Arc<Mutex<T>>,
    request_id: AtomicI64,
    server_capabilities: Option<ServerCapabilities>,
}

impl<T: Transport> McpClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(Mutex::new(transport)),
            request_id: AtomicI64::new(1),
            server_capabilities: None,
        }
    }

    fn next_id(&self) -> RequestId {
        RequestId::Number(self.request_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Capabilities reported by the server during `initialize`
    pub fn server_capabilities(&self) -> Option<&ServerCapabilities> {
        self.server_capabilities.as_ref()
    }

    /// Initialize the connection
    pub async fn initialize(&mut self, client_info: ClientInfo) -> Result<ServerInfo, McpError> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": client_info.name,
                "version": client_info.version
            }
        });

        let request = JsonRpcRequest::new(self.next_id(), methods::INITIALIZE).with_params(params);
        let result = self.request_result(request).await?;

        let init: InitializeResult =
            serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))?;
        self.server_capabilities = Some(init.capabilities);

        self.notify(JsonRpcNotification::new(methods::INITIALIZED)).await?;

        tracing::debug!(
            server = %init.server_info.name,
            version = %init.server_info.version,
            protocol = %init.protocol_version,
            "MCP server initialized"
        );

        Ok(ServerInfo {
            name: init.server_info.name,
            version: init.server_info.version,
        })
    }

    /// List available tools
    pub async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
        let request = JsonRpcRequest::new(self.next_id(), methods::TOOLS_LIST);
        let result = self.request_result(request).await?;
        let tools: ToolsListResult =
            serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))?;
        Ok(tools.tools)
    }

    /// Call a tool
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments
        });

        let request = JsonRpcRequest::new(self.next_id(), methods::TOOLS_CALL).with_params(params);
        let result = self.request_result(request).await?;
        serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))
    }

    /// List resources
    pub async fn list_resources(&self) -> Result<Vec<McpResource>, McpError> {
        let request = JsonRpcRequest::new(self.next_id(), methods::RESOURCES_LIST);
        let result = self.request_result(request).await?;
        let resources: ResourcesListResult =
            serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))?;
        Ok(resources.resources)
    }

    /// Shut the transport down
    pub async fn close(&self) -> Result<(), McpError> {
        let mut transport = self.transport.lock().await;
        transport
            .close()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))
    }

    async fn notify(&self, notification: JsonRpcNotification) -> Result<(), McpError> {
        let value =
            serde_json::to_value(&notification).map_err(|e| McpError::Protocol(e.to_string()))?;
        let mut transport = self.transport.lock().await;
        transport
            .send(value)
            .await
            .map_err(|e| McpError::Transport(e.to_string()))
    }

    /// Send a request and unwrap its `result`, turning JSON-RPC errors into
    /// [`McpError::Server`]
    async fn request_result(&self, request: JsonRpcRequest) -> Result<Value, McpError> {
        let method = request.method.clone();
        let response = self.send_request(request).await?;

        match (response.result, response.error) {
            (_, Some(error)) => Err(McpError::Server(format!(
                "{} failed ({}): {}",
                method, error.code, error.message
            ))),
            (Some(result), None) => Ok(result),
            (None, None) => Err(McpError::Protocol(format!("Empty response to {}", method))),
        }
    }

    async fn send_request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, McpError> {
        let mut transport = self.transport.lock().await;

        let request_value =
            serde_json::to_value(&request).map_err(|e| McpError::Protocol(e.to_string()))?;
        transport
            .send(request_value)
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        loop {
            let message = transport
                .receive()
                .await
                .map_err(|e| McpError::Transport(e.to_string()))?
                .ok_or_else(|| McpError::Transport("Connection closed".to_string()))?;

            if !is_response(&message) {
                let method = message
                    .get("method")
                    .and_then(|m| m.as_str())
                    .unwrap_or_default();
                tracing::debug!(method, "Skipping server message while awaiting response");
                continue;
            }

            let response: JsonRpcResponse =
                serde_json::from_value(message).map_err(|e| McpError::Protocol(e.to_string()))?;
            if response.id.as_ref() == Some(&request.id) {
                return Ok(response);
            }
            tracing::debug!(
                expected = %request.id,
                got = ?response.id,
                "Skipping response for another request"
            );
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl ClientInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct InitializeResult {
    #[serde(rename = "protocolVersion", default)]
    protocol_version: String,
    #[serde(default)]
    capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    server_info: ServerInfoInner,
}

#[derive(Debug, Deserialize)]
struct ServerInfoInner {
    name: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
struct ToolsListResult {
    #[serde(default)]
    tools: Vec<McpTool>,
}

#[derive(Debug, Deserialize)]
struct ResourcesListResult {
    #[serde(default)]
    resources: Vec<McpResource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ContentItem>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Text items joined by newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|item| item.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// MCP errors
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Server error: {0}")]
    Server(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::io;

    /// Replays scripted inbound messages and records what was sent
    #[derive(Default)]
    struct ScriptedTransport {
        inbound: VecDeque<Value>,
        sent: Arc<std::sync::Mutex<Vec<Value>>>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&mut self, message: Value) -> io::Result<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn receive(&mut self) -> io::Result<Option<Value>> {
            Ok(self.inbound.pop_front())
        }

        async fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn client(inbound: Vec<Value>) -> (McpClient<ScriptedTransport>, Arc<std::sync::Mutex<Vec<Value>>>) {
        let transport = ScriptedTransport {
            inbound: inbound.into(),
            ..Default::default()
        };
        let sent = transport.sent.clone();
        (McpClient::new(transport), sent)
    }

    #[tokio::test]
    async fn test_initialize_sends_notification() {
        let (mut client, sent) = client(vec![json!({
            "jsonrpc": "2.0", "id": 1,
            "result": {
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {"listChanged": true}},
                "serverInfo": {"name": "echo-server", "version": "1.2.0"}
            }
        })]);

        let info = client.initialize(ClientInfo::new("agentforce", "0.1.0")).await.unwrap();
        assert_eq!(info.name, "echo-server");
        assert!(client.server_capabilities().unwrap().tools.as_ref().unwrap().list_changed);

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["method"], "initialize");
        assert_eq!(sent[0]["params"]["clientInfo"]["name"], "agentforce");
        assert_eq!(sent[1]["method"], "notifications/initialized");
        assert!(sent[1].get("id").is_none());
    }

    #[tokio::test]
    async fn test_skips_notifications_and_foreign_ids() {
        let (client, _) = client(vec![
            json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {"level": "info"}}),
            json!({"jsonrpc": "2.0", "id": "srv-1", "method": "roots/list"}),
            json!({"jsonrpc": "2.0", "params": {}}),
            json!({"jsonrpc": "2.0", "id": 99, "result": {}}),
            json!({"jsonrpc": "2.0", "id": 1, "result": {"tools": [
                {"name": "echo", "description": "Echo text", "inputSchema": {"type": "object"}}
            ]}}),
        ]);

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo");
    }

    #[tokio::test]
    async fn test_call_tool() {
        let (client, sent) = client(vec![json!({
            "jsonrpc": "2.0", "id": 1,
            "result": {"content": [
                {"type": "text", "text": "line one"},
                {"type": "image"},
                {"type": "text", "text": "line two"}
            ]}
        })]);

        let result = client.call_tool("echo", Value::Null).await.unwrap();
        assert!(!result.is_error);
        assert_eq!(result.text(), "line one\nline two");
        assert_eq!(sent.lock().unwrap()[0]["params"]["arguments"], json!({}));
    }

    #[tokio::test]
    async fn test_server_error() {
        let (client, _) = client(vec![json!({
            "jsonrpc": "2.0", "id": 1,
            "error": {"code": -32602, "message": "Unknown tool"}
        })]);

        let err = client.call_tool("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, McpError::Server(ref m) if m.contains("Unknown tool")));
    }

    #[tokio::test]
    async fn test_connection_closed() {
        let (client, _) = client(vec![]);
        assert!(matches!(client.list_resources().await, Err(McpError::Transport(_))));
    }
}
