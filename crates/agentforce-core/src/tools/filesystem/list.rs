//! List directory tool

use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::error::ToolError;
use crate::tools::{BoxFuture, Tool, ToolOutput};

use super::{path_to_display, validate_path};

/// Cap on entries returned by a single listing
const MAX_ENTRIES: usize = 1000;

/// Tool for listing directory contents
pub struct ListDirectory {
    workspace: PathBuf,
}

impl ListDirectory {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }

    fn relative_display(&self, root: &Path, path: &Path) -> String {
        path.strip_prefix(root)
            .map(path_to_display)
            .unwrap_or_else(|_| path_to_display(path))
    }
}

impl Tool for ListDirectory {
    fn name(&self) -> &str {
        "fs_list_dir"
    }

    fn description(&self) -> &str {
        "List contents of a directory in the workspace. Returns names, paths, and sizes."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the directory to list (relative to workspace)",
                    "default": "."
                },
                "recursive": {
                    "type": "boolean",
                    "description": "List recursively",
                    "default": false
                },
                "include_hidden": {
                    "type": "boolean",
                    "description": "Include hidden files (starting with .)",
                    "default": false
                }
            }
        })
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let path_str = params["path"].as_str().unwrap_or(".");
            let recursive = params["recursive"].as_bool().unwrap_or(false);
            let include_hidden = params["include_hidden"].as_bool().unwrap_or(false);

            let path = self.workspace.join(path_str);
            let validated = validate_path(&path, &self.workspace)?;
            if !validated.is_dir() {
                return Err(ToolError::InvalidParams(format!(
                    "{} is not a directory",
                    path_to_display(&path)
                )));
            }
            let root = dunce::canonicalize(&self.workspace).map_err(ToolError::Io)?;

            let walker = walkdir::WalkDir::new(&validated)
                .min_depth(1)
                .max_depth(if recursive { usize::MAX } else { 1 })
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| {
                    e.depth() == 0
                        || include_hidden
                        || !e.file_name().to_string_lossy().starts_with('.')
                });

            let mut entries = Vec::new();
            let mut truncated = false;
            for entry in walker.filter_map(|e| e.ok()) {
                if entries.len() == MAX_ENTRIES {
                    truncated = true;
                    break;
                }
                let metadata = entry.metadata().ok();
                let is_dir = entry.file_type().is_dir();
                entries.push(json!({
                    "name": entry.file_name().to_string_lossy(),
                    "path": self.relative_display(&root, entry.path()),
                    "is_dir": is_dir,
                    "size": if is_dir { None } else { metadata.map(|m| m.len()) },
                }));
            }

            Ok(ToolOutput::success(json!({
                "path": self.relative_display(&root, &validated),
                "entries": entries,
                "count": entries.len(),
                "truncated": truncated
            })))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::write(dir.path().join("README.md"), "readme").unwrap();
        std::fs::write(dir.path().join(".env"), "SECRET=1").unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/nested/deep.rs"), "").unwrap();
        dir
    }

    fn names(output: &ToolOutput) -> Vec<String> {
        output.content["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["path"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_list_top_level() {
        let dir = fixture();
        let tool = ListDirectory::new(dir.path().to_path_buf());

        let output = tool.execute(json!({})).await.unwrap();
        assert_eq!(names(&output), vec!["README.md", "src"]);
        assert_eq!(output.content["entries"][0]["size"], 6);
        assert_eq!(output.content["entries"][1]["is_dir"], true);
    }

    #[tokio::test]
    async fn test_list_recursive_and_hidden() {
        let dir = fixture();
        let tool = ListDirectory::new(dir.path().to_path_buf());

        let output = tool
            .execute(json!({"path": "src", "recursive": true}))
            .await
            .unwrap();
        assert_eq!(names(&output), vec!["src/lib.rs", "src/nested", "src/nested/deep.rs"]);

        let output = tool.execute(json!({"include_hidden": true})).await.unwrap();
        assert!(names(&output).contains(&".env".to_string()));
    }

    #[tokio::test]
    async fn test_list_outside_denied() {
        let dir = fixture();
        let tool = ListDirectory::new(dir.path().join("src"));
        let result = tool.execute(json!({"path": ".."})).await;
        assert!(matches!(result, Err(ToolError::PermissionDenied(_))));
    }
}
