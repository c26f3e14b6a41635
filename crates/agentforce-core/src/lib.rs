//! AgentForce Core - agents that turn model replies into structured output
//!
//! This crate provides:
//! - A fluent agent builder over Ollama, OpenRouter and Gemini
//! - Extraction of JSON, YAML and HTML from free-form replies
//! - Tools (filesystem, web fetch, MCP) driven by a tool-calling loop
//! - An optional HTTP wrapper exposing agents as endpoints

pub mod agent;
pub mod config;
pub mod error;
pub mod formatting;
pub mod mcp_manager;
pub mod provider;
#[cfg(feature = "server")]
pub mod server;
pub mod tools;

pub use agent::{AgentConfig, AgentForceAgent, AgentRun, OutputFormat};
pub use config::{Config, ConfigManager, GeneralConfig, McpServerConfig, ProviderConfig};
pub use error::{Error, FormatError, Result, ToolError};
pub use mcp_manager::{McpServerInfo, McpServerManager, McpServerStatus, McpToolInfo};
pub use provider::{ChatProvider, CompletionResult, GenAIProvider, LlmMessage, ModelSettings, ProviderType};
pub use tools::{Tool, ToolDefinition, ToolOutput, ToolRegistry};

pub use formatting::{
    FencedBlock, FormattedOutput, HtmlFilterConfig, ValidationResult, format_as_html, format_as_json,
    format_as_markdown, format_as_yaml, scan, truncate_str, validate_and_format_html,
    validate_and_format_json, validate_and_format_yaml,
};

#[cfg(feature = "server")]
pub use server::{AgentServer, ServerError};
