//! Filesystem tools confined to a workspace root

mod list;
mod path_utils;
mod read;
mod write;

pub use list::ListDirectory;
pub use read::ReadFile;
pub use write::WriteFile;

pub use path_utils::{normalize_path, path_to_display, validate_path, validate_write_path};
