//! JSON extraction from model output

use serde_json::{Value, json};

use super::FormattedOutput;
use super::fence::FencedBlock;
use super::strategy::{BlockFormat, Candidate, RawText};
use crate::error::FormatError;

/// JSON format: `json` blocks, or generic blocks opening with `{` or `[`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

fn parse(text: &str) -> Candidate<Value> {
    serde_json::from_str(text.trim()).map_err(|e| {
        tracing::debug!(error = %e, "Block is not valid JSON");
        RawText(text.to_string())
    })
}

impl BlockFormat for JsonFormat {
    type Output = FormattedOutput;

    fn name(&self) -> &'static str {
        "json"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn sniff(&self, content: &str) -> bool {
        let trimmed = content.trim_start();
        trimmed.starts_with('{') || trimmed.starts_with('[')
    }

    fn passthrough(&self, raw: &str) -> FormattedOutput {
        FormattedOutput::Text(raw.trim().to_string())
    }

    fn whole_input(&self, raw: &str) -> Result<FormattedOutput, FormatError> {
        Ok(match parse(raw) {
            Ok(value) => FormattedOutput::Json(value),
            Err(_) => FormattedOutput::Text(raw.to_string()),
        })
    }

    fn single(&self, block: &FencedBlock) -> Result<FormattedOutput, FormatError> {
        Ok(match parse(&block.content) {
            Ok(value) => FormattedOutput::Json(value),
            Err(RawText(raw)) => FormattedOutput::Text(raw),
        })
    }

    fn merge(&self, blocks: &[&FencedBlock]) -> Result<FormattedOutput, FormatError> {
        let values = blocks
            .iter()
            .map(|block| parse(&block.content))
            .map(|candidate| candidate.unwrap_or_else(|RawText(raw)| json!({ "content": raw })))
            .collect();
        Ok(FormattedOutput::Json(Value::Array(values)))
    }
}

/// Extract JSON from `raw`.
///
/// Never fails: anything that cannot be parsed comes back as text.
pub fn format_as_json(raw: &str, enable_block_parsing: bool) -> FormattedOutput {
    JsonFormat
        .format(raw, enable_block_parsing)
        .unwrap_or_else(|_| FormattedOutput::Text(raw.trim().to_string()))
}
