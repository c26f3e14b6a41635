//! Pass/fail wrappers around the extractors
//!
//! Extraction errors become `is_valid: false` with the trimmed input as
//! content. None of these panic or return `Err`.

use serde::Serialize;

use super::html::{HtmlFilterConfig, format_as_html};
use super::json::format_as_json;
use super::yaml::format_as_yaml;
use super::FormattedOutput;
use crate::error::FormatError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub content: FormattedOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    fn from_result<T: Into<FormattedOutput>>(raw: &str, result: Result<T, FormatError>) -> Self {
        match result {
            Ok(content) => Self {
                is_valid: true,
                content: content.into(),
                error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Formatting failed, returning input as text");
                Self {
                    is_valid: false,
                    content: FormattedOutput::Text(raw.trim().to_string()),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

pub fn validate_and_format_json(raw: &str) -> ValidationResult {
    ValidationResult::from_result(raw, Ok::<_, FormatError>(format_as_json(raw, true)))
}

pub fn validate_and_format_yaml(raw: &str) -> ValidationResult {
    ValidationResult::from_result(raw, format_as_yaml(raw, true))
}

pub fn validate_and_format_html(raw: &str, config: &HtmlFilterConfig) -> ValidationResult {
    ValidationResult::from_result(raw, format_as_html(raw, config, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_is_always_valid() {
        let result = validate_and_format_json("```json\n{bad json}\n```");
        assert!(result.is_valid);
        assert_eq!(result.content, FormattedOutput::Text("{bad json}".into()));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_yaml_wraps_prose() {
        let result = validate_and_format_yaml("hello world");
        assert!(result.is_valid);
        assert_eq!(result.content.to_text(), "response: hello world\n");
    }

    #[test]
    fn test_html_parse_failure_reported() {
        let raw = "```html\n<p>ok</p>\n<div class=\"broken\n```";
        let result = validate_and_format_html(raw, &HtmlFilterConfig::default());
        assert!(!result.is_valid);
        assert!(result.error.as_deref().is_some_and(|e| !e.is_empty()));
        assert_eq!(result.content.to_text(), raw);
    }

    #[test]
    fn test_html_bad_selector_reported() {
        let config = HtmlFilterConfig::new().with_selector("p:hover");
        let result = validate_and_format_html("<p>x</p><p>y</p>", &config);
        assert!(!result.is_valid);
    }

    #[test]
    fn test_serialized_shape() {
        let ok = serde_json::to_value(validate_and_format_json("{\"a\":1}")).unwrap();
        assert_eq!(ok, json!({"isValid": true, "content": {"a": 1}}));

        let failed = ValidationResult {
            is_valid: false,
            content: FormattedOutput::Text("x".into()),
            error: Some("boom".into()),
        };
        assert_eq!(
            serde_json::to_value(failed).unwrap(),
            json!({"isValid": false, "content": "x", "error": "boom"})
        );
    }
}
