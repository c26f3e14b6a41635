//! MCP (Model Context Protocol) Server Manager
//!
//! Manages the lifecycle of MCP servers: starting, stopping, and discovering
//! tools. Child processes are killed when their client is dropped, so
//! dropping the manager also shuts local servers down.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use agentforce_mcp::{ClientInfo, HttpTransport, McpClient, StdioTransport, ToolCallResult, Transport};

use crate::config::McpServerConfig;
use crate::error::{Error, Result};

/// Startup handshake budget per server
const START_TIMEOUT: Duration = Duration::from_secs(30);

type SharedClient = Arc<McpClient<Box<dyn Transport>>>;

/// Status of an MCP server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum McpServerStatus {
    Stopped,
    Starting,
    Running,
    /// Server failed to start or crashed
    Failed(String),
}

/// Information about a tool provided by an MCP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolInfo {
    pub name: String,
    pub description: String,
    /// Input schema (JSON Schema)
    pub input_schema: Value,
    /// Server that provides this tool
    pub server: String,
}

/// Summary of a configured server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerInfo {
    pub name: String,
    /// Command, or URL for HTTP servers
    pub command: String,
    pub enabled: bool,
    pub status: McpServerStatus,
    pub tool_count: usize,
}

struct McpServerInstance {
    config: McpServerConfig,
    status: McpServerStatus,
    client: Option<SharedClient>,
    tools: Vec<McpToolInfo>,
}

impl McpServerInstance {
    fn new(config: McpServerConfig) -> Self {
        Self {
            config,
            status: McpServerStatus::Stopped,
            client: None,
            tools: Vec::new(),
        }
    }
}

/// Manager for MCP servers
#[derive(Default)]
pub struct McpServerManager {
    servers: RwLock<HashMap<String, McpServerInstance>>,
}

impl McpServerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the manager with server configurations
    pub fn with_configs(configs: HashMap<String, McpServerConfig>) -> Self {
        let servers = configs
            .into_iter()
            .map(|(name, config)| (name, McpServerInstance::new(config)))
            .collect();
        Self {
            servers: RwLock::new(servers),
        }
    }

    /// Add or replace a server definition (not started)
    pub async fn add_server(&self, name: impl Into<String>, config: McpServerConfig) {
        let mut servers = self.servers.write().await;
        servers.insert(name.into(), McpServerInstance::new(config));
    }

    /// Stop and forget a server
    pub async fn remove_server(&self, name: &str) -> Result<()> {
        self.stop_server(name).await?;
        self.servers.write().await.remove(name);
        Ok(())
    }

    /// Start a configured server and cache its tool list
    pub async fn start_server(&self, name: &str) -> Result<()> {
        let config = {
            let mut servers = self.servers.write().await;
            let instance = servers
                .get_mut(name)
                .ok_or_else(|| Error::Mcp(format!("Unknown MCP server: {}", name)))?;
            if instance.status == McpServerStatus::Running {
                return Ok(());
            }
            instance.status = McpServerStatus::Starting;
            instance.config.clone()
        };

        let transport = match open_transport(&config).await {
            Ok(transport) => transport,
            Err(e) => {
                self.mark_failed(name, &e).await;
                return Err(e);
            }
        };

        self.start_with_transport(name, transport).await
    }

    /// Connect a server over an already-open transport
    pub async fn start_with_transport(&self, name: &str, transport: Box<dyn Transport>) -> Result<()> {
        {
            let mut servers = self.servers.write().await;
            let instance = servers
                .get_mut(name)
                .ok_or_else(|| Error::Mcp(format!("Unknown MCP server: {}", name)))?;
            instance.status = McpServerStatus::Starting;
        }

        match tokio::time::timeout(START_TIMEOUT, handshake(name, transport)).await {
            Ok(Ok((client, tools))) => {
                tracing::info!(server = name, tools = tools.len(), "MCP server started");
                let mut servers = self.servers.write().await;
                if let Some(instance) = servers.get_mut(name) {
                    instance.status = McpServerStatus::Running;
                    instance.client = Some(client);
                    instance.tools = tools;
                }
                Ok(())
            }
            Ok(Err(e)) => {
                self.mark_failed(name, &e).await;
                Err(e)
            }
            Err(_) => {
                let e = Error::Timeout(START_TIMEOUT.as_secs());
                self.mark_failed(name, &e).await;
                Err(e)
            }
        }
    }

    async fn mark_failed(&self, name: &str, error: &Error) {
        tracing::warn!(server = name, error = %error, "MCP server failed to start");
        if let Some(instance) = self.servers.write().await.get_mut(name) {
            instance.status = McpServerStatus::Failed(error.to_string());
            instance.client = None;
            instance.tools.clear();
        }
    }

    /// Stop a running server
    pub async fn stop_server(&self, name: &str) -> Result<()> {
        let client = {
            let mut servers = self.servers.write().await;
            let instance = servers
                .get_mut(name)
                .ok_or_else(|| Error::Mcp(format!("Unknown MCP server: {}", name)))?;
            instance.status = McpServerStatus::Stopped;
            instance.tools.clear();
            instance.client.take()
        };

        if let Some(client) = client {
            client.close().await?;
            tracing::info!(server = name, "MCP server stopped");
        }
        Ok(())
    }

    /// Start every enabled server, returning per-server outcomes
    pub async fn start_enabled(&self) -> Vec<(String, Result<()>)> {
        let names: Vec<String> = {
            let servers = self.servers.read().await;
            servers
                .iter()
                .filter(|(_, s)| s.config.enabled)
                .map(|(name, _)| name.clone())
                .collect()
        };

        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let result = self.start_server(&name).await;
            results.push((name, result));
        }
        results
    }

    /// Start only the named servers
    pub async fn start_named(&self, names: &[String]) -> Result<()> {
        for name in names {
            self.start_server(name).await?;
        }
        Ok(())
    }

    pub async fn stop_all(&self) -> Vec<(String, Result<()>)> {
        let running: Vec<String> = {
            let servers = self.servers.read().await;
            servers
                .iter()
                .filter(|(_, s)| s.client.is_some())
                .map(|(name, _)| name.clone())
                .collect()
        };

        let mut results = Vec::with_capacity(running.len());
        for name in running {
            let result = self.stop_server(&name).await;
            results.push((name, result));
        }
        results
    }

    /// List all servers and their status, sorted by name
    pub async fn list_servers(&self) -> Vec<McpServerInfo> {
        let servers = self.servers.read().await;
        let mut infos: Vec<McpServerInfo> = servers
            .iter()
            .map(|(name, s)| McpServerInfo {
                name: name.clone(),
                command: s.config.url.clone().unwrap_or_else(|| s.config.command.clone()),
                enabled: s.config.enabled,
                status: s.status.clone(),
                tool_count: s.tools.len(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Get all tools from all running servers
    pub async fn get_all_tools(&self) -> Vec<McpToolInfo> {
        let servers = self.servers.read().await;
        servers
            .values()
            .filter(|s| s.status == McpServerStatus::Running)
            .flat_map(|s| s.tools.clone())
            .collect()
    }

    /// Get tools from a specific server
    pub async fn get_server_tools(&self, name: &str) -> Option<Vec<McpToolInfo>> {
        let servers = self.servers.read().await;
        servers.get(name).map(|s| s.tools.clone())
    }

    /// Call a tool on a running server
    pub async fn call_tool(&self, server_name: &str, tool_name: &str, arguments: Value) -> Result<ToolCallResult> {
        let client = {
            let servers = self.servers.read().await;
            let instance = servers
                .get(server_name)
                .ok_or_else(|| Error::Mcp(format!("Unknown MCP server: {}", server_name)))?;
            instance
                .client
                .clone()
                .ok_or_else(|| Error::Mcp(format!("MCP server {} is not running", server_name)))?
        };

        tracing::debug!(server = server_name, tool = tool_name, "Calling MCP tool");
        Ok(client.call_tool(tool_name, arguments).await?)
    }
}

async fn open_transport(config: &McpServerConfig) -> Result<Box<dyn Transport>> {
    if let Some(url) = &config.url {
        return Ok(Box::new(HttpTransport::new(url.clone())));
    }
    if config.command.is_empty() {
        return Err(Error::Config("MCP server needs a command or a url".to_string()));
    }
    let transport = StdioTransport::spawn(&config.command, &config.args, &config.env)
        .await
        .map_err(|e| Error::Mcp(format!("Failed to spawn {}: {}", config.command, e)))?;
    Ok(Box::new(transport))
}

async fn handshake(name: &str, transport: Box<dyn Transport>) -> Result<(SharedClient, Vec<McpToolInfo>)> {
    let mut client = McpClient::new(transport);
    client
        .initialize(ClientInfo::new("agentforce", env!("CARGO_PKG_VERSION")))
        .await?;

    let tools = client
        .list_tools()
        .await?
        .into_iter()
        .map(|tool| McpToolInfo {
            name: tool.name,
            description: tool.description,
            input_schema: tool.input_schema,
            server: name.to_string(),
        })
        .collect();

    Ok((Arc::new(client), tools))
}
