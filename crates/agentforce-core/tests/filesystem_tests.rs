//! Filesystem tool tests
//!
//! Exercises the workspace-confined read, write and list tools through the
//! built-in tool catalog, the way an agent reaches them.

use agentforce_core::ToolError;
use agentforce_core::tools::filesystem::{ListDirectory, ReadFile, WriteFile};
use agentforce_core::tools::{Tool, ToolRegistry, builtin_tool};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

/// Create a temporary workspace with a few sample files
fn setup_workspace() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let base = dir.path();

    fs::create_dir_all(base.join("docs/drafts")).unwrap();
    fs::write(base.join("docs/intro.md"), "# Intro\n\nWelcome.\n").unwrap();
    fs::write(base.join("docs/drafts/wip.md"), "todo").unwrap();
    fs::write(base.join("data.json"), r#"{"name": "sample"}"#).unwrap();
    fs::write(base.join(".secret"), "hidden").unwrap();

    dir
}

mod read_file_tests {
    use super::*;

    #[tokio::test]
    async fn test_read_nested_file() {
        let dir = setup_workspace();
        let tool = ReadFile::new(dir.path().to_path_buf());

        let output = tool.execute(json!({"path": "docs/intro.md"})).await.unwrap();
        assert!(output.success);
        assert_eq!(output.content["content"], "# Intro\n\nWelcome.\n");
        assert!(output.content["path"].as_str().unwrap().ends_with("docs/intro.md"));
    }

    #[tokio::test]
    async fn test_read_traversal_denied() {
        let dir = setup_workspace();
        let tool = ReadFile::new(dir.path().join("docs"));

        let result = tool.execute(json!({"path": "../data.json"})).await;
        assert!(matches!(result, Err(ToolError::PermissionDenied(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_through_symlink_denied() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("passwords.txt"), "hunter2").unwrap();

        let dir = setup_workspace();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let tool = ReadFile::new(dir.path().to_path_buf());

        let result = tool.execute(json!({"path": "link/passwords.txt"})).await;
        assert!(matches!(result, Err(ToolError::PermissionDenied(_))));
    }
}

mod write_file_tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read_back() {
        let dir = setup_workspace();
        let writer = WriteFile::new(dir.path().to_path_buf());
        let reader = ReadFile::new(dir.path().to_path_buf());

        let output = writer
            .execute(json!({"path": "out/summary.txt", "content": "three words here"}))
            .await
            .unwrap();
        assert_eq!(output.content["bytes_written"], 16);

        let output = reader.execute(json!({"path": "out/summary.txt"})).await.unwrap();
        assert_eq!(output.content["content"], "three words here");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_through_symlinked_dir_denied() {
        let outside = TempDir::new().unwrap();
        let dir = setup_workspace();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let tool = WriteFile::new(dir.path().to_path_buf());

        let result = tool
            .execute(json!({"path": "link/new/file.txt", "content": "x"}))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied(_))));
        assert!(!outside.path().join("new").exists());
    }
}

mod list_dir_tests {
    use super::*;

    fn paths(content: &serde_json::Value) -> Vec<&str> {
        content["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["path"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_list_skips_hidden_by_default() {
        let dir = setup_workspace();
        let tool = ListDirectory::new(dir.path().to_path_buf());

        let output = tool.execute(json!({"path": "."})).await.unwrap();
        assert_eq!(paths(&output.content), vec!["data.json", "docs"]);
        assert_eq!(output.content["count"], 2);
        assert_eq!(output.content["truncated"], false);
    }

    #[tokio::test]
    async fn test_list_recursive() {
        let dir = setup_workspace();
        let tool = ListDirectory::new(dir.path().to_path_buf());

        let output = tool
            .execute(json!({"path": "docs", "recursive": true}))
            .await
            .unwrap();
        assert_eq!(
            paths(&output.content),
            vec!["docs/drafts", "docs/drafts/wip.md", "docs/intro.md"]
        );
    }

    #[tokio::test]
    async fn test_list_file_is_invalid() {
        let dir = setup_workspace();
        let tool = ListDirectory::new(dir.path().to_path_buf());

        let result = tool.execute(json!({"path": "data.json"})).await;
        assert!(matches!(result, Err(ToolError::InvalidParams(_))));
    }
}

mod catalog_tests {
    use super::*;

    #[tokio::test]
    async fn test_builtin_tools_share_workspace() {
        let dir = setup_workspace();
        let mut registry = ToolRegistry::new();
        for name in ["fs_write_file", "fs_read_file", "fs_list_dir"] {
            registry.register(builtin_tool(name, dir.path()).unwrap());
        }
        assert_eq!(registry.len(), 3);

        registry
            .get("fs_write_file")
            .unwrap()
            .execute(json!({"path": "notes.txt", "content": "kept"}))
            .await
            .unwrap();

        let listing = registry
            .get("fs_list_dir")
            .unwrap()
            .execute(json!({}))
            .await
            .unwrap();
        assert!(listing.to_model_text().contains("notes.txt"));

        let read = registry
            .get("fs_read_file")
            .unwrap()
            .execute(json!({"path": "notes.txt"}))
            .await
            .unwrap();
        assert_eq!(read.content["content"], "kept");
    }
}
