//! Block tiering shared by every structured output format
//!
//! A format decides which fenced blocks belong to it and how to parse one
//! block, many blocks, or the whole response when no block qualifies. The
//! tiering itself lives in [`BlockFormat::format`] so each format only
//! describes its own parsing.

use super::fence::{self, FencedBlock};
use crate::error::FormatError;

/// Unparsed text carried forward when a block is not valid in the target format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawText(pub String);

/// Outcome of parsing a single block
pub type Candidate<T> = std::result::Result<T, RawText>;

/// A structured output format extracted from free-form model text
pub trait BlockFormat {
    type Output;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Language tags claimed by this format (compared case-insensitively)
    fn tags(&self) -> &'static [&'static str];

    /// Content sniff applied to untagged or plain-text blocks
    fn sniff(&self, content: &str) -> bool;

    /// Output when block parsing is disabled
    fn passthrough(&self, raw: &str) -> Self::Output;

    /// Output when no block qualifies
    fn whole_input(&self, raw: &str) -> Result<Self::Output, FormatError>;

    /// Output for exactly one qualifying block
    fn single(&self, block: &FencedBlock) -> Result<Self::Output, FormatError>;

    /// Output for two or more qualifying blocks, in order of appearance
    fn merge(&self, blocks: &[&FencedBlock]) -> Result<Self::Output, FormatError>;

    fn accepts(&self, block: &FencedBlock) -> bool {
        self.tags().iter().any(|tag| block.is_language(tag))
            || (block.is_generic() && self.sniff(&block.content))
    }

    fn select<'a>(&self, blocks: &'a [FencedBlock]) -> Vec<&'a FencedBlock> {
        blocks.iter().filter(|block| self.accepts(block)).collect()
    }

    /// Run the zero / one / many tiering over `raw`
    fn format(&self, raw: &str, enable_block_parsing: bool) -> Result<Self::Output, FormatError> {
        if !enable_block_parsing {
            return Ok(self.passthrough(raw));
        }

        let blocks = fence::scan(raw);
        let selected = self.select(&blocks);
        tracing::debug!(
            format = self.name(),
            blocks = blocks.len(),
            selected = selected.len(),
            "Scanned response for fenced blocks"
        );

        match selected.as_slice() {
            [] => self.whole_input(raw),
            [block] => self.single(block),
            many => self.merge(many),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts lines; claims `count` blocks and sniffs on a leading `#`
    struct LineCount;

    impl BlockFormat for LineCount {
        type Output = String;

        fn name(&self) -> &'static str {
            "count"
        }

        fn tags(&self) -> &'static [&'static str] {
            &["count"]
        }

        fn sniff(&self, content: &str) -> bool {
            content.starts_with('#')
        }

        fn passthrough(&self, raw: &str) -> String {
            format!("raw:{}", raw.trim())
        }

        fn whole_input(&self, raw: &str) -> Result<String, FormatError> {
            Ok(format!("whole:{}", raw.lines().count()))
        }

        fn single(&self, block: &FencedBlock) -> Result<String, FormatError> {
            Ok(format!("one:{}", block.content.lines().count()))
        }

        fn merge(&self, blocks: &[&FencedBlock]) -> Result<String, FormatError> {
            Ok(format!("many:{}", blocks.len()))
        }
    }

    #[test]
    fn test_disabled_uses_passthrough() {
        assert_eq!(LineCount.format("  ```count\na\n```  ", false).unwrap(), "raw:```count\na\n```");
    }

    #[test]
    fn test_tiers() {
        assert_eq!(LineCount.format("a\nb", true).unwrap(), "whole:2");
        assert_eq!(LineCount.format("```count\na\nb\n```", true).unwrap(), "one:2");
        assert_eq!(
            LineCount.format("```COUNT\na\n```\n```\n# sniffed\n```", true).unwrap(),
            "many:2"
        );
    }

    #[test]
    fn test_foreign_tags_are_ignored() {
        // Tagged blocks of other languages are never sniffed
        assert_eq!(LineCount.format("```python\n# comment\n```", true).unwrap(), "whole:3");
    }
}
