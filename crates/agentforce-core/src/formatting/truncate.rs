//! Size limits for text fed back to the model
//!
//! Tool results are appended to the conversation verbatim, so a directory
//! listing or a fetched page can overflow the context window. JSON results
//! are cut at element boundaries so what remains still parses.

use serde_json::Value;

/// Default cap on a single tool result, in bytes
pub const MAX_TOOL_RESULT_SIZE: usize = 30_000;

/// Largest char boundary at or below `max`
fn floor_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

/// Truncate a string to `max` bytes, adding "..." if truncated
pub fn truncate_str(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..floor_boundary(s, max.saturating_sub(3))])
    }
}

/// Truncate a tool result to at most roughly `max_size` bytes plus a notice
pub fn truncate_tool_result(result: &str, max_size: usize) -> String {
    if result.len() <= max_size {
        return result.to_string();
    }

    let trimmed = result.trim();
    if (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
    {
        if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
            return truncate_json_value(&json, max_size);
        }
    }

    truncate_at_line_boundary(result, max_size)
}

fn truncate_json_value(value: &Value, max_size: usize) -> String {
    match value {
        Value::Array(items) => {
            let mut kept = Vec::new();
            let mut size = 2;
            for item in items {
                let item_size = item.to_string().len() + 2;
                if size + item_size > max_size && !kept.is_empty() {
                    break;
                }
                kept.push(item.clone());
                size += item_size;
            }
            let shown = kept.len();
            let rendered = Value::Array(kept).to_string();
            if shown == items.len() {
                rendered
            } else {
                format!(
                    "{}\n\n[Array truncated - showing {} of {} items]",
                    rendered,
                    shown,
                    items.len()
                )
            }
        }
        Value::Object(map) => {
            let mut kept = serde_json::Map::new();
            let mut size = 2;
            for (key, val) in map {
                let pair_size = key.len() + val.to_string().len() + 6;
                if size + pair_size > max_size && !kept.is_empty() {
                    break;
                }
                kept.insert(key.clone(), val.clone());
                size += pair_size;
            }
            let shown = kept.len();
            let rendered = Value::Object(kept).to_string();
            if shown == map.len() {
                rendered
            } else {
                format!(
                    "{}\n\n[Object truncated - showing {} of {} keys]",
                    rendered,
                    shown,
                    map.len()
                )
            }
        }
        other => truncate_at_line_boundary(&other.to_string(), max_size),
    }
}

fn truncate_at_line_boundary(result: &str, max_size: usize) -> String {
    let limit = floor_boundary(result, max_size);
    let cut = match result[..limit].rfind('\n') {
        Some(newline) if newline > max_size / 2 => newline,
        _ => limit,
    };

    format!(
        "{}\n\n[Result truncated - {} bytes total, showing first {}]",
        &result[..cut],
        result.len(),
        cut
    )
}
