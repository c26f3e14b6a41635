//! YAML extraction from model output
//!
//! Unlike JSON, every tier yields YAML text. A response with no usable
//! structure is wrapped as `response: <text>` instead of passed through.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_yml::Value;

use super::fence::FencedBlock;
use super::strategy::{BlockFormat, Candidate, RawText};
use crate::error::FormatError;

/// `key: value` or `- key: value` at the start of a line
static KEY_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*(?:-\s+)?[A-Za-z_][\w .-]*:(?:\s|$)").ok());

/// YAML format: `yaml`/`yml` blocks, or generic blocks shaped like a mapping
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlFormat;

/// One entry of a merged multi-block document
#[derive(Serialize)]
#[serde(untagged)]
enum YamlEntry {
    Parsed(Value),
    Raw { content: String },
}

fn parse(text: &str) -> Candidate<Value> {
    match serde_yml::from_str::<Value>(text) {
        Ok(Value::Null) => Err(RawText(text.to_string())),
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::debug!(error = %e, "Block is not valid YAML");
            Err(RawText(text.to_string()))
        }
    }
}

fn is_structured(value: &Value) -> bool {
    matches!(value, Value::Mapping(_) | Value::Sequence(_))
}

impl BlockFormat for YamlFormat {
    type Output = String;

    fn name(&self) -> &'static str {
        "yaml"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["yaml", "yml"]
    }

    fn sniff(&self, content: &str) -> bool {
        let Some(re) = KEY_LINE.as_ref() else {
            return false;
        };
        content
            .lines()
            .map(str::trim_end)
            .find(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
            .is_some_and(|line| re.is_match(line))
    }

    fn passthrough(&self, raw: &str) -> String {
        raw.trim().to_string()
    }

    fn whole_input(&self, raw: &str) -> Result<String, FormatError> {
        let trimmed = raw.trim();

        if let Ok(value) = serde_yml::from_str::<Value>(trimmed)
            && is_structured(&value)
        {
            return Ok(serde_yml::to_string(&value)?);
        }

        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed)
            && (value.is_object() || value.is_array())
        {
            return Ok(serde_yml::to_string(&value)?);
        }

        Ok(serde_yml::to_string(&serde_json::json!({ "response": trimmed }))?)
    }

    fn single(&self, block: &FencedBlock) -> Result<String, FormatError> {
        match parse(&block.content) {
            Ok(value) => Ok(serde_yml::to_string(&value)?),
            Err(RawText(raw)) => Ok(raw),
        }
    }

    fn merge(&self, blocks: &[&FencedBlock]) -> Result<String, FormatError> {
        let entries: Vec<YamlEntry> = blocks
            .iter()
            .map(|block| match parse(&block.content) {
                Ok(value) => YamlEntry::Parsed(value),
                Err(RawText(content)) => YamlEntry::Raw { content },
            })
            .collect();
        Ok(serde_yml::to_string(&entries)?)
    }
}

/// Extract YAML from `raw`, always returning YAML text on success
pub fn format_as_yaml(raw: &str, enable_block_parsing: bool) -> Result<String, FormatError> {
    YamlFormat.format(raw, enable_block_parsing)
}
