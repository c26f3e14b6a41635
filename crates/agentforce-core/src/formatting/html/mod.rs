//! HTML extraction and element filtering

mod dom;
mod selector;

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use dom::{Document, NodeId, NodeKind, decode_entities};
pub use selector::SelectorList;

use super::fence::FencedBlock;
use super::strategy::BlockFormat;
use crate::error::FormatError;

/// An opening or self-closing tag such as `<p>`, `<a href="x">`, or `<br/>`
static TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<([A-Za-z][A-Za-z0-9-]*)(?:\s[^<>]*)?/?>").ok());

const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Element names to keep, as a list or a comma-separated string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElementList {
    List(Vec<String>),
    Csv(String),
}

impl ElementList {
    /// Normalized tag names with `links` and `styles` resolved
    pub fn names(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Self::List(items) => items.iter().map(String::as_str).collect(),
            Self::Csv(text) => text.split(',').collect(),
        };
        raw.into_iter()
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .map(|name| match name.as_str() {
                "links" => "a".to_string(),
                "styles" => "style".to_string(),
                _ => name,
            })
            .collect()
    }
}

impl From<&str> for ElementList {
    fn from(text: &str) -> Self {
        Self::Csv(text.to_string())
    }
}

impl From<Vec<String>> for ElementList {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl From<Vec<&str>> for ElementList {
    fn from(items: Vec<&str>) -> Self {
        Self::List(items.into_iter().map(String::from).collect())
    }
}

/// Options for [`extract_html_elements`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HtmlFilterConfig {
    pub elements: Option<ElementList>,
    pub selector: Option<String>,
    pub text_only: bool,
    pub include_attributes: bool,
    pub remove_elements: Vec<String>,
}

impl HtmlFilterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_elements(mut self, elements: impl Into<ElementList>) -> Self {
        self.elements = Some(elements.into());
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn text_only(mut self, text_only: bool) -> Self {
        self.text_only = text_only;
        self
    }

    pub fn include_attributes(mut self, include: bool) -> Self {
        self.include_attributes = include;
        self
    }

    pub fn remove<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remove_elements.extend(names.into_iter().map(Into::into));
        self
    }
}

/// Parse `html`, drop removed elements, select, and render the selection
pub fn extract_html_elements(html: &str, config: &HtmlFilterConfig) -> Result<String, FormatError> {
    let mut doc = Document::parse(html)?;

    let removed: HashSet<String> = config
        .remove_elements
        .iter()
        .map(|name| name.trim().to_ascii_lowercase())
        .collect();
    if !removed.is_empty() {
        for id in doc.elements() {
            if doc.element_name(id).is_some_and(|name| removed.contains(name)) {
                doc.detach(id);
            }
        }
    }

    let selector = config.selector.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let elements = config
        .elements
        .as_ref()
        .map(ElementList::names)
        .filter(|names| !names.is_empty());

    let selected = match (selector, elements) {
        (Some(selector), _) => SelectorList::parse(selector)?.select(&doc, doc.root()),
        (None, Some(names)) => doc
            .elements()
            .into_iter()
            .filter(|&id| doc.element_name(id).is_some_and(|name| names.iter().any(|n| n == name)))
            .collect(),
        (None, None) => return Ok(render_body(&doc, config)),
    };

    tracing::debug!(selected = selected.len(), "Filtered HTML elements");
    Ok(render_selection(&doc, &selected, config))
}

fn render_body(doc: &Document, config: &HtmlFilterConfig) -> String {
    let scope = doc.first_element("body").unwrap_or(doc.root());
    if config.text_only {
        doc.text_content(scope).trim().to_string()
    } else {
        doc.inner_html(scope, config.include_attributes).trim().to_string()
    }
}

fn render_selection(doc: &Document, selected: &[NodeId], config: &HtmlFilterConfig) -> String {
    let contributes = |id: NodeId| {
        doc.element_name(id).is_some_and(dom::is_void)
            || doc.has_element_children(id)
            || doc.has_text(id)
    };

    if config.text_only {
        selected
            .iter()
            .map(|&id| doc.text_content(id).trim().to_string())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    } else {
        selected
            .iter()
            .copied()
            .filter(|&id| contributes(id))
            .map(|id| doc.outer_html(id, config.include_attributes))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Whole-response check: a doctype, a paired or self-closing tag, or two distinct tags
pub fn looks_like_html(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    if lower.contains("<!doctype html") {
        return true;
    }
    let Some(tag) = TAG.as_ref() else {
        return false;
    };

    let closed: HashSet<&str> = lower
        .match_indices("</")
        .map(|(i, _)| {
            let rest = &lower[i + 2..];
            let len = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
                .unwrap_or(rest.len());
            &rest[..len]
        })
        .filter(|name| !name.is_empty())
        .collect();

    let mut names = HashSet::new();
    for caps in tag.captures_iter(text) {
        let name = caps[1].to_ascii_lowercase();
        if caps[0].ends_with("/>") || closed.contains(name.as_str()) {
            return true;
        }
        names.insert(name);
    }
    names.len() >= 2
}

/// HTML format: `html` blocks, or generic blocks containing a tag
#[derive(Debug, Clone, Copy)]
pub struct HtmlFormat<'a> {
    pub config: &'a HtmlFilterConfig,
}

impl BlockFormat for HtmlFormat<'_> {
    type Output = String;

    fn name(&self) -> &'static str {
        "html"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["html"]
    }

    fn sniff(&self, content: &str) -> bool {
        TAG.as_ref().is_some_and(|tag| tag.is_match(content))
    }

    fn passthrough(&self, raw: &str) -> String {
        raw.trim().to_string()
    }

    fn whole_input(&self, raw: &str) -> Result<String, FormatError> {
        if looks_like_html(raw) {
            extract_html_elements(raw.trim(), self.config)
        } else {
            Ok(raw.trim().to_string())
        }
    }

    fn single(&self, block: &FencedBlock) -> Result<String, FormatError> {
        extract_html_elements(&block.content, self.config)
    }

    /// A block that fails to parse is carried as its raw text; a bad
    /// selector still fails the whole merge
    fn merge(&self, blocks: &[&FencedBlock]) -> Result<String, FormatError> {
        let mut parts = Vec::with_capacity(blocks.len());
        for block in blocks {
            match extract_html_elements(&block.content, self.config) {
                Ok(part) => parts.push(part),
                Err(e @ FormatError::Selector { .. }) => return Err(e),
                Err(e) => {
                    tracing::debug!(error = %e, "Block is not valid HTML");
                    parts.push(block.content.trim().to_string());
                }
            }
        }
        Ok(parts.join(BLOCK_SEPARATOR))
    }
}

/// Extract and filter HTML from `raw`
pub fn format_as_html(
    raw: &str,
    config: &HtmlFilterConfig,
    enable_block_parsing: bool,
) -> Result<String, FormatError> {
    HtmlFormat { config }.format(raw, enable_block_parsing)
}
