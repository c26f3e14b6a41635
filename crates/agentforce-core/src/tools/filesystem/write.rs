//! Write file tool

use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::error::ToolError;
use crate::tool_params;
use crate::tools::{BoxFuture, Tool, ToolOutput};

use super::{path_to_display, validate_path, validate_write_path};

/// Tool for writing file contents
pub struct WriteFile {
    workspace: PathBuf,
}

impl WriteFile {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }

    /// Nearest existing ancestor must also resolve inside the workspace,
    /// so a symlinked directory cannot redirect the write
    fn check_existing_ancestor(&self, path: &Path) -> Result<(), ToolError> {
        match path.ancestors().skip(1).find(|p| p.exists()) {
            Some(ancestor) => validate_path(ancestor, &self.workspace).map(|_| ()),
            None => Ok(()),
        }
    }
}

impl Tool for WriteFile {
    fn name(&self) -> &str {
        "fs_write_file"
    }

    fn description(&self) -> &str {
        "Write text to a file in the workspace, creating parent directories as needed. \
         Overwrites existing files."
    }

    fn parameters_schema(&self) -> Value {
        tool_params!(
            path: "string" => "Path to the file to write (relative to workspace)",
            content: "string" => "The content to write to the file",
        )
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let path_str = params["path"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidParams("path is required".into()))?;

            let content = params["content"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidParams("content is required".into()))?;

            let path = validate_write_path(Path::new(path_str), &self.workspace)?;

            if path.exists() {
                validate_path(&path, &self.workspace)?;
            } else {
                self.check_existing_ancestor(&path)?;
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(ToolError::Io)?;
                }
            }

            tokio::fs::write(&path, content).await.map_err(ToolError::Io)?;
            tracing::debug!(path = %path.display(), bytes = content.len(), "Wrote file");

            Ok(ToolOutput::success(json!({
                "path": path_to_display(&path),
                "bytes_written": content.len()
            })))
        })
    }
}
