//! Error types for AgentForce Core

use thiserror::Error;

/// Result type alias using the AgentForce Error
pub type Result<T> = std::result::Result<T, Error>;

/// AgentForce error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),
}

/// Tool-specific errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Structured-output extraction errors
///
/// Only exceptional failures surface here. Content that simply does not
/// parse is passed through as text by the extractors.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("HTML parse error at byte {position}: {message}")]
    HtmlParse { position: u64, message: String },

    #[error("Invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },
}

impl From<agentforce_mcp::McpError> for Error {
    fn from(e: agentforce_mcp::McpError) -> Self {
        Error::Mcp(e.to_string())
    }
}
