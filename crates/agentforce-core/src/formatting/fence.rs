//! Fenced code block scanner
//!
//! Locates triple-backtick blocks in free-form model output. The scan is
//! line based and greedy: a block opened by a fence line runs until the next
//! line that is exactly the closing delimiter, or until end of input.

use serde::Serialize;

const FENCE: &str = "```";

/// A code block found in model output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FencedBlock {
    /// Text following the opening fence, `None` when the fence is bare
    pub language: Option<String>,
    /// Block body with the fence lines removed
    pub content: String,
    /// Byte offset of the opening fence line
    pub start: usize,
    /// Byte offset just past the closing fence line (or end of input)
    pub end: usize,
    /// False when input ended before a closing fence
    pub terminated: bool,
}

impl FencedBlock {
    /// Case-insensitive comparison against the block's language tag
    pub fn is_language(&self, tag: &str) -> bool {
        self.language
            .as_deref()
            .map(|lang| lang.eq_ignore_ascii_case(tag))
            .unwrap_or(false)
    }

    /// True for bare fences and plain-text tags, which are eligible for content sniffing
    pub fn is_generic(&self) -> bool {
        match self.language.as_deref() {
            None => true,
            Some(lang) => matches!(
                lang.to_ascii_lowercase().as_str(),
                "text" | "txt" | "plain" | "plaintext"
            ),
        }
    }
}

/// Scan `text` for fenced blocks, in order of appearance
pub fn scan(text: &str) -> Vec<FencedBlock> {
    let mut blocks = Vec::new();
    let mut open: Option<(Option<String>, usize, Vec<&str>)> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let body = line.trim_end_matches(['\n', '\r']);
        let trimmed = body.trim();

        match open.take() {
            Some((language, start, lines)) if trimmed == FENCE => {
                blocks.push(FencedBlock {
                    language,
                    content: lines.join("\n"),
                    start,
                    end: offset,
                    terminated: true,
                });
            }
            Some((language, start, mut lines)) => {
                lines.push(body);
                open = Some((language, start, lines));
            }
            None => {
                if let Some(rest) = trimmed.strip_prefix(FENCE) {
                    let tag = rest.trim();
                    // ```inline``` on one line is a code span, not an opener
                    if tag.ends_with(FENCE) {
                        continue;
                    }
                    let language = if tag.is_empty() {
                        None
                    } else {
                        Some(tag.to_string())
                    };
                    open = Some((language, line_start, Vec::new()));
                }
            }
        }
    }

    if let Some((language, start, lines)) = open {
        blocks.push(FencedBlock {
            language,
            content: lines.join("\n"),
            start,
            end: text.len(),
            terminated: false,
        });
    }

    blocks
}
