//! Structured output extraction
//!
//! Model replies mix prose with fenced code blocks. The functions here pull
//! JSON, YAML, or HTML out of such replies:
//!
//! - [`fence::scan`] finds the fenced blocks
//! - each format claims blocks by language tag, or by sniffing untagged ones
//! - zero claimed blocks fall back to the whole reply, one block stands
//!   alone, and several blocks are merged
//! - the `validate_and_format_*` wrappers report failures as data
//!
//! Everything here is synchronous and stateless.

pub mod fence;
pub mod html;
pub mod json;
pub mod markdown;
pub mod strategy;
pub mod truncate;
pub mod validate;
pub mod yaml;

use std::fmt;

use serde::Serialize;
use serde_json::Value;

pub use fence::{FencedBlock, scan};
pub use html::{ElementList, HtmlFilterConfig, extract_html_elements, format_as_html};
pub use json::format_as_json;
pub use markdown::format_as_markdown;
pub use strategy::{BlockFormat, Candidate, RawText};
pub use truncate::{truncate_str, truncate_tool_result};
pub use validate::{
    ValidationResult, validate_and_format_html, validate_and_format_json, validate_and_format_yaml,
};
pub use yaml::format_as_yaml;

/// Result of a formatting call: text, or a parsed JSON value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FormattedOutput {
    Text(String),
    Json(Value),
}

impl FormattedOutput {
    /// Text form; JSON values render compactly
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FormattedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Json(value) => write!(f, "{value}"),
        }
    }
}

impl From<String> for FormattedOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}
