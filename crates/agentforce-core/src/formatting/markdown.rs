//! Markdown output
//!
//! Replies are usually Markdown already. The one thing to undo is a reply
//! wrapped whole in a single `markdown` fence.

use super::fence;

pub fn format_as_markdown(raw: &str) -> String {
    let trimmed = raw.trim();
    let blocks = fence::scan(trimmed);

    if let [block] = blocks.as_slice()
        && (block.is_language("markdown") || block.is_language("md"))
        && block.start == 0
        && block.end == trimmed.len()
    {
        return block.content.trim().to_string();
    }

    trimmed.to_string()
}
