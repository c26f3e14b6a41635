//! Read file tool

use serde_json::{json, Value};
use std::path::PathBuf;

use crate::error::ToolError;
use crate::tools::{BoxFuture, Tool, ToolOutput};

use super::{path_to_display, validate_path};

/// Tool for reading file contents
pub struct ReadFile {
    workspace: PathBuf,
}

impl ReadFile {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

impl Tool for ReadFile {
    fn name(&self) -> &str {
        "fs_read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file in the workspace."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to read (relative to workspace)"
                },
                "max_bytes": {
                    "type": "integer",
                    "description": "Return at most this many bytes of content"
                }
            },
            "required": ["path"]
        })
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let path_str = params["path"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidParams("path is required".into()))?;

            let path = self.workspace.join(path_str);
            let validated = validate_path(&path, &self.workspace)?;

            if validated.is_dir() {
                return Err(ToolError::InvalidParams(format!(
                    "{} is a directory; use fs_list_dir",
                    path_to_display(&path)
                )));
            }

            let content = tokio::fs::read_to_string(&validated)
                .await
                .map_err(ToolError::Io)?;
            let size = content.len();

            let content = match params["max_bytes"].as_u64() {
                Some(max) if (max as usize) < size => {
                    crate::formatting::truncate_str(&content, max as usize)
                }
                _ => content,
            };

            tracing::debug!(path = %validated.display(), size, "Read file");

            Ok(ToolOutput::success(json!({
                "content": content,
                "path": path_to_display(&validated),
                "size": size
            })))
        })
    }
}
