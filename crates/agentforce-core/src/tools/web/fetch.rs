//! web_fetch tool - fetch a URL and reduce HTML pages to readable text

use serde_json::{json, Value};
use std::time::Duration;

use crate::error::ToolError;
use crate::formatting::{HtmlFilterConfig, extract_html_elements};
use crate::tools::{BoxFuture, Tool, ToolOutput};

const DEFAULT_MAX_LENGTH: usize = 50_000;

/// Tool for fetching web content
pub struct WebFetch {
    client: reqwest::Client,
}

impl WebFetch {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("AgentForce/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for WebFetch {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for WebFetch {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch content from an http(s) URL. HTML pages are converted to plain text; \
         pass a CSS selector to keep only matching elements."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch. Must be a fully-formed http or https URL."
                },
                "selector": {
                    "type": "string",
                    "description": "CSS selector limiting which elements of an HTML page are returned"
                },
                "extract_text": {
                    "type": "boolean",
                    "description": "Strip HTML markup and return text only. Default true.",
                    "default": true
                },
                "max_length": {
                    "type": "integer",
                    "description": "Maximum content length to return. Default 50000 bytes.",
                    "default": DEFAULT_MAX_LENGTH
                }
            },
            "required": ["url"]
        })
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let url = params["url"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidParams("url is required".into()))?;
            let selector = params["selector"].as_str();
            let extract_text = params["extract_text"].as_bool().unwrap_or(true);
            let max_length = params["max_length"]
                .as_u64()
                .map(|n| n as usize)
                .unwrap_or(DEFAULT_MAX_LENGTH);

            let parsed_url = url::Url::parse(url)
                .map_err(|e| ToolError::InvalidParams(format!("Invalid URL: {}", e)))?;
            if parsed_url.scheme() != "http" && parsed_url.scheme() != "https" {
                return Err(ToolError::InvalidParams(
                    "Only HTTP and HTTPS URLs are supported".into(),
                ));
            }

            let response = self
                .client
                .get(parsed_url)
                .send()
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("Failed to fetch URL: {}", e)))?;

            let final_url = response.url().to_string();
            let status = response.status();
            if !status.is_success() {
                return Err(ToolError::ExecutionFailed(format!(
                    "HTTP error: {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                )));
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();

            let body = response
                .text()
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("Failed to read response: {}", e)))?;

            let processed = if content_type.contains("text/html") {
                reduce_html(&body, selector, extract_text)
            } else {
                body
            };

            let truncated = processed.len() > max_length;
            let content = if truncated {
                crate::formatting::truncate_str(&processed, max_length)
            } else {
                processed
            };

            tracing::debug!(url, %final_url, bytes = content.len(), truncated, "Fetched URL");

            Ok(ToolOutput::success(json!({
                "content": content,
                "url": url,
                "final_url": final_url,
                "content_type": content_type,
                "truncated": truncated,
                "length": content.len()
            })))
        })
    }
}

/// Apply the element filter to a fetched page, falling back to a plain tag
/// strip when the page does not parse
fn reduce_html(html: &str, selector: Option<&str>, text_only: bool) -> String {
    if !text_only && selector.is_none() {
        return html.to_string();
    }

    let mut config = HtmlFilterConfig::new()
        .text_only(text_only)
        .remove(["script", "style", "noscript", "svg", "head"]);
    if let Some(selector) = selector {
        config = config.with_selector(selector);
    }

    match extract_html_elements(html, &config) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(error = %e, "Page did not parse, stripping tags instead");
            strip_tags(html)
        }
    }
}

/// Tag stripper for pages the DOM parser rejects
fn strip_tags(html: &str) -> String {
    let mut result = html.to_string();

    for tag in ["script", "style"] {
        let open = format!("<{}", tag);
        let close = format!("</{}>", tag);
        while let Some(start) = result.find(&open) {
            match result[start..].find(&close) {
                Some(end) => result.replace_range(start..start + end + close.len(), ""),
                None => break,
            }
        }
    }

    let mut output = String::new();
    let mut in_tag = false;
    for c in result.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => output.push(c),
            _ => {}
        }
    }

    crate::formatting::html::decode_entities(&output)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>T</title><style>p { color: red; }</style></head>
<body><nav><a href="/">Home</a></nav>
<article><h1>Title</h1><p>First &amp; best.</p></article>
<script>var x = "<p>";</script></body></html>"#;

    #[test]
    fn test_reduce_html_text() {
        let text = reduce_html(PAGE, None, true);
        assert!(text.contains("Title"));
        assert!(text.contains("First & best."));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("var x"));
    }

    #[test]
    fn test_reduce_html_selector() {
        let text = reduce_html(PAGE, Some("article p"), true);
        assert_eq!(text, "First & best.");
        let markup = reduce_html(PAGE, Some("nav a"), false);
        assert_eq!(markup, "<a>Home</a>");
    }

    #[test]
    fn test_raw_html_passthrough() {
        assert_eq!(reduce_html(PAGE, None, false), PAGE);
    }

    #[test]
    fn test_strip_tags_fallback() {
        let text = strip_tags("<div><p>One &lt;two&gt;</p>\n<script>bad()</script><p>Three");
        assert_eq!(text, "One <two>\nThree");
    }

    #[tokio::test]
    async fn test_rejects_non_http() {
        let tool = WebFetch::new();
        let result = tool.execute(json!({"url": "file:///etc/passwd"})).await;
        assert!(matches!(result, Err(ToolError::InvalidParams(_))));
        let result = tool.execute(json!({"url": "not a url"})).await;
        assert!(matches!(result, Err(ToolError::InvalidParams(_))));
    }
}
