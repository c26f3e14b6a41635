//! Rendering an agent reply in the requested output format

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::formatting::{
    FormattedOutput, HtmlFilterConfig, ValidationResult, format_as_markdown, validate_and_format_html,
    validate_and_format_json, validate_and_format_yaml,
};

/// Shape of the text returned by [`AgentForceAgent::output`](super::AgentForceAgent::output)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
    #[serde(alias = "md")]
    Markdown,
    Html,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Markdown => "markdown",
            Self::Html => "html",
        }
    }

    /// Pick a format from a file extension; unknown extensions are text
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_ascii_lowercase().as_str() {
                "json" => Some(Self::Json),
                "yaml" | "yml" => Some(Self::Yaml),
                "md" | "markdown" => Some(Self::Markdown),
                "html" | "htm" => Some(Self::Html),
                _ => None,
            })
            .unwrap_or(Self::Text)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "markdown" | "md" => Ok(Self::Markdown),
            "html" | "htm" => Ok(Self::Html),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

/// Render `response` as `format`
///
/// Structured formats go through the validators. When validation fails the
/// trimmed reply is returned unchanged.
pub fn render(response: &str, format: OutputFormat, html: &HtmlFilterConfig) -> String {
    match format {
        OutputFormat::Text => response.to_string(),
        OutputFormat::Markdown => format_as_markdown(response),
        OutputFormat::Json => render_validated(validate_and_format_json(response), format),
        OutputFormat::Yaml => render_validated(validate_and_format_yaml(response), format),
        OutputFormat::Html => render_validated(validate_and_format_html(response, html), format),
    }
}

fn render_validated(result: ValidationResult, format: OutputFormat) -> String {
    if !result.is_valid {
        tracing::debug!(
            format = format.as_str(),
            error = result.error.as_deref().unwrap_or(""),
            "Reply did not validate, passing text through"
        );
    }
    match result.content {
        FormattedOutput::Json(value) => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
        }
        FormattedOutput::Text(text) => text,
    }
}
