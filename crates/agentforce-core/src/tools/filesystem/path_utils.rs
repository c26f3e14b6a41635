//! Path helpers shared by the filesystem tools
//!
//! Every path a tool touches must resolve inside the workspace root.

use std::path::{Component, Path, PathBuf};

use crate::error::ToolError;

/// Convert a path to a display string with forward slash separators.
pub fn path_to_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Normalize a path by resolving `.` and `..` components without filesystem access.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(p) => components.push(Component::Prefix(p)),
            Component::RootDir => {
                components.retain(|c| matches!(c, Component::Prefix(_)));
                components.push(Component::RootDir);
            }
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                // Can't go above root
                Some(Component::RootDir | Component::Prefix(_)) => {}
                Some(Component::Normal(_) | Component::CurDir) => {
                    components.pop();
                }
                Some(Component::ParentDir) | None => components.push(Component::ParentDir),
            },
            Component::Normal(c) => components.push(Component::Normal(c)),
        }
    }

    if components.is_empty() {
        PathBuf::from(".")
    } else {
        components.iter().collect()
    }
}

/// Validate that an existing path is within the workspace boundary.
///
/// Symlinks are resolved, so a link pointing outside the workspace is
/// rejected.
pub fn validate_path(path: &Path, workspace: &Path) -> Result<PathBuf, ToolError> {
    // dunce avoids the \\?\ prefix on Windows
    let canonical = dunce::canonicalize(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ToolError::ResourceNotFound(format!("Path not found: {}", path_to_display(path)))
        } else {
            ToolError::Io(e)
        }
    })?;

    let workspace_canonical = dunce::canonicalize(workspace).map_err(|e| {
        ToolError::Io(std::io::Error::new(
            e.kind(),
            format!("Cannot resolve workspace path '{}': {}", workspace.display(), e),
        ))
    })?;

    if canonical.starts_with(&workspace_canonical) {
        Ok(canonical)
    } else {
        Err(ToolError::PermissionDenied(format!(
            "Path {} is outside workspace {}",
            path.display(),
            workspace.display()
        )))
    }
}

/// Validate a path for writing (path may not exist yet).
pub fn validate_write_path(path: &Path, workspace: &Path) -> Result<PathBuf, ToolError> {
    let workspace_normalized = normalize_path(workspace);
    let workspace_abs = if workspace_normalized.is_absolute() {
        workspace_normalized
    } else {
        std::env::current_dir()
            .map(|cwd| normalize_path(&cwd.join(&workspace_normalized)))
            .unwrap_or(workspace_normalized)
    };

    let path_abs = normalize_path(&workspace_abs.join(path));

    if path_abs.starts_with(&workspace_abs) && path_abs != workspace_abs {
        Ok(path_abs)
    } else {
        Err(ToolError::PermissionDenied(format!(
            "Path {} is outside workspace {}",
            path.display(),
            workspace.display()
        )))
    }
}
