//! MCP Tool Wrapper
//!
//! Each tool advertised by a running MCP server is wrapped as a [`Tool`] so
//! the agent can call it like any built-in tool.

use std::sync::Arc;

use serde_json::Value;

use crate::error::ToolError;
use crate::mcp_manager::{McpServerManager, McpToolInfo};
use crate::tools::{BoxFuture, Tool, ToolOutput};

/// Wrapper that exposes an MCP tool as an AgentForce Tool
pub struct McpToolWrapper {
    tool_info: McpToolInfo,
    manager: Arc<McpServerManager>,
    /// Prefixed name for the tool (mcp__{server}__{tool})
    prefixed_name: String,
}

impl McpToolWrapper {
    pub fn new(tool_info: McpToolInfo, manager: Arc<McpServerManager>) -> Self {
        let prefixed_name = prefixed_tool_name(&tool_info.server, &tool_info.name);
        Self {
            tool_info,
            manager,
            prefixed_name,
        }
    }

    /// Get the server name this tool belongs to
    pub fn server_name(&self) -> &str {
        &self.tool_info.server
    }

    /// Get the original MCP tool name (without prefix)
    pub fn original_name(&self) -> &str {
        &self.tool_info.name
    }
}

/// `mcp__{server}__{tool}` with dashes replaced by underscores
pub fn prefixed_tool_name(server: &str, tool: &str) -> String {
    format!("mcp__{}__{}", server.replace('-', "_"), tool.replace('-', "_"))
}

impl Tool for McpToolWrapper {
    fn name(&self) -> &str {
        &self.prefixed_name
    }

    fn description(&self) -> &str {
        &self.tool_info.description
    }

    fn parameters_schema(&self) -> Value {
        self.tool_info.input_schema.clone()
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let result = self
                .manager
                .call_tool(&self.tool_info.server, &self.tool_info.name, params)
                .await
                .map_err(|e| {
                    ToolError::ExecutionFailed(format!(
                        "MCP tool '{}' on server '{}' failed: {}",
                        self.tool_info.name, self.tool_info.server, e
                    ))
                })?;

            let text = result.text();
            if result.is_error {
                let message = if text.is_empty() {
                    "MCP tool execution failed".to_string()
                } else {
                    text
                };
                return Ok(ToolOutput::error(message));
            }

            // Non-text content is passed through as JSON
            let content = if text.is_empty() && !result.content.is_empty() {
                serde_json::to_value(&result.content).unwrap_or(Value::Null)
            } else {
                Value::String(text)
            };

            Ok(ToolOutput::success(content)
                .with_metadata("mcp_server", self.tool_info.server.clone())
                .with_metadata("mcp_tool", self.tool_info.name.clone()))
        })
    }
}

/// Create tool wrappers for all tools from all running MCP servers
pub async fn create_mcp_tools(manager: Arc<McpServerManager>) -> Vec<Arc<dyn Tool>> {
    manager
        .get_all_tools()
        .await
        .into_iter()
        .map(|tool_info| Arc::new(McpToolWrapper::new(tool_info, manager.clone())) as Arc<dyn Tool>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(server: &str, name: &str, schema: Value) -> McpToolInfo {
        McpToolInfo {
            name: name.to_string(),
            description: format!("{} tool", name),
            input_schema: schema,
            server: server.to_string(),
        }
    }

    #[test]
    fn test_mcp_tool_wrapper_name_format() {
        let manager = Arc::new(McpServerManager::new());
        let wrapper = McpToolWrapper::new(info("playwright", "browser_click", serde_json::json!({})), manager);

        assert_eq!(wrapper.name(), "mcp__playwright__browser_click");
        assert_eq!(wrapper.original_name(), "browser_click");
        assert_eq!(wrapper.server_name(), "playwright");
        assert_eq!(wrapper.description(), "browser_click tool");
    }

    #[test]
    fn test_mcp_tool_wrapper_handles_dashes() {
        assert_eq!(
            prefixed_tool_name("my-server", "some-tool-name"),
            "mcp__my_server__some_tool_name"
        );
    }

    #[tokio::test]
    async fn test_create_mcp_tools_empty_when_no_servers() {
        let manager = Arc::new(McpServerManager::new());
        assert!(create_mcp_tools(manager).await.is_empty());
    }

    #[test]
    fn test_mcp_tool_schema_passthrough() {
        let manager = Arc::new(McpServerManager::new());
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "URL to navigate to" }
            },
            "required": ["url"]
        });

        let wrapper = McpToolWrapper::new(info("browser", "navigate", schema.clone()), manager);
        assert_eq!(wrapper.parameters_schema(), schema);
    }

    #[tokio::test]
    async fn test_execute_on_stopped_server_fails() {
        let manager = Arc::new(McpServerManager::new());
        manager
            .add_server("docs", crate::config::McpServerConfig::new("docs-server"))
            .await;
        let wrapper = McpToolWrapper::new(info("docs", "search", serde_json::json!({})), manager);

        let result = wrapper.execute(serde_json::json!({"q": "x"})).await;
        assert!(matches!(result, Err(ToolError::ExecutionFailed(_))));
    }
}
