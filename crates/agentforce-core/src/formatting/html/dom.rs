//! Arena-backed HTML tree
//!
//! Built from quick-xml's reader with end-name checks disabled, so
//! mismatched and stray closing tags are tolerated. Void elements never
//! take children and `script`/`style` bodies are kept verbatim. Unclosed
//! elements are closed at end of input. The reader still rejects input it
//! cannot tokenize at all, such as a tag left open at end of input.
//!
//! Attribute values are stored decoded; text nodes keep their source form.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::FormatError;

pub type NodeId = usize;

const ROOT: NodeId = 0;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element {
        name: String,
        attrs: Vec<(String, String)>,
    },
    /// Text as written in the source, entities not decoded
    Text(String),
    Comment(String),
    Doctype(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    pub fn parse(html: &str) -> Result<Self, FormatError> {
        let Prepared {
            source,
            mut raw_bodies,
        } = prepare(html);
        let mut doc = Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        };

        let mut reader = Reader::from_str(&source);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.check_comments = false;

        let mut stack = vec![ROOT];

        loop {
            let event = reader
                .read_event()
                .map_err(|e| parse_error(reader.error_position() as u64, e))?;
            let parent = stack.last().copied().unwrap_or(ROOT);

            match event {
                Event::Start(e) => {
                    let Some(name) = tag_name(&e) else {
                        doc.push_text(parent, &format!("&lt;{}&gt;", String::from_utf8_lossy(&e)));
                        continue;
                    };
                    let void = is_void(&name);
                    let id = doc.append(
                        parent,
                        NodeKind::Element {
                            name,
                            attrs: attributes(&e),
                        },
                    );

                    if void {
                        continue;
                    }
                    if let Some(body) = raw_bodies.remove(&(reader.buffer_position() as usize))
                        && !body.is_empty()
                    {
                        doc.append(id, NodeKind::Text(body));
                    }
                    stack.push(id);
                }
                Event::Empty(e) => match tag_name(&e) {
                    Some(name) => {
                        doc.append(
                            parent,
                            NodeKind::Element {
                                name,
                                attrs: attributes(&e),
                            },
                        );
                    }
                    None => {
                        doc.push_text(parent, &format!("&lt;{}/&gt;", String::from_utf8_lossy(&e)));
                    }
                },
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                    if let Some(pos) = stack
                        .iter()
                        .rposition(|&id| doc.element_name(id) == Some(name.as_str()))
                    {
                        stack.truncate(pos);
                    }
                }
                Event::Text(e) => {
                    let text = String::from_utf8_lossy(e.as_ref()).to_string();
                    doc.push_text(parent, &text);
                }
                Event::GeneralRef(e) => {
                    doc.push_text(parent, &format!("&{};", String::from_utf8_lossy(&e)));
                }
                Event::CData(e) => {
                    doc.push_text(parent, &escape_text(&String::from_utf8_lossy(&e)));
                }
                Event::Comment(e) => {
                    doc.append(parent, NodeKind::Comment(String::from_utf8_lossy(&e).into_owned()));
                }
                Event::DocType(e) => {
                    doc.append(
                        parent,
                        NodeKind::Doctype(String::from_utf8_lossy(&e).trim().to_string()),
                    );
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(doc)
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Parent of `id` when that parent is an element
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id]
            .parent
            .filter(|&parent| self.element_name(parent).is_some())
    }

    /// Element descendants of `id` in document order
    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut pending: Vec<NodeId> = self.nodes[id].children.iter().rev().copied().collect();
        while let Some(next) = pending.pop() {
            if self.element_name(next).is_some() {
                out.push(next);
            }
            pending.extend(self.nodes[next].children.iter().rev().copied());
        }
        out
    }

    /// Every element still attached to the tree, in document order
    pub fn elements(&self) -> Vec<NodeId> {
        self.descendant_elements(ROOT)
    }

    pub fn first_element(&self, name: &str) -> Option<NodeId> {
        self.elements()
            .into_iter()
            .find(|&id| self.element_name(id) == Some(name))
    }

    pub fn has_element_children(&self, id: NodeId) -> bool {
        self.nodes[id]
            .children
            .iter()
            .any(|&child| self.element_name(child).is_some())
    }

    /// True when any text under `id`, including script and style bodies, is not blank
    pub fn has_text(&self, id: NodeId) -> bool {
        self.nodes[id].children.iter().any(|&child| match &self.nodes[child].kind {
            NodeKind::Text(text) => !text.trim().is_empty(),
            NodeKind::Element { .. } => self.has_text(child),
            _ => false,
        })
    }

    /// Unlink `id` from its parent; the subtree stays in the arena but is unreachable
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&child| child != id);
        }
    }

    /// Decoded text of `id`, skipping scripts, styles, and comments
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        decode_entities(&out)
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { name, .. } if RAW_TEXT_ELEMENTS.contains(&name.as_str()) => {}
            NodeKind::Element { .. } | NodeKind::Document => {
                for &child in &self.nodes[id].children {
                    self.collect_text(child, out);
                }
            }
            NodeKind::Comment(_) | NodeKind::Doctype(_) => {}
        }
    }

    pub fn outer_html(&self, id: NodeId, include_attributes: bool) -> String {
        let mut out = String::new();
        self.write_node(id, include_attributes, &mut out);
        out
    }

    pub fn inner_html(&self, id: NodeId, include_attributes: bool) -> String {
        let mut out = String::new();
        for &child in &self.nodes[id].children {
            self.write_node(child, include_attributes, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, include_attributes: bool, out: &mut String) {
        let node = &self.nodes[id];
        match &node.kind {
            NodeKind::Document => {
                for &child in &node.children {
                    self.write_node(child, include_attributes, out);
                }
            }
            NodeKind::Element { name, attrs } => {
                out.push('<');
                out.push_str(name);
                if include_attributes {
                    for (key, value) in attrs {
                        out.push(' ');
                        out.push_str(key);
                        if !value.is_empty() {
                            out.push_str("=\"");
                            out.push_str(&value.replace('&', "&amp;").replace('"', "&quot;"));
                            out.push('"');
                        }
                    }
                }
                out.push('>');
                if is_void(name) {
                    return;
                }
                for &child in &node.children {
                    self.write_node(child, include_attributes, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Doctype(text) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(text);
                out.push('>');
            }
        }
    }

    fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// Append text, merging with a preceding text sibling
    fn push_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(&last) = self.nodes[parent].children.last()
            && let NodeKind::Text(existing) = &mut self.nodes[last].kind
        {
            existing.push_str(text);
            return;
        }
        self.append(parent, NodeKind::Text(text.to_string()));
    }
}

fn parse_error(position: u64, error: quick_xml::Error) -> FormatError {
    FormatError::HtmlParse {
        position,
        message: error.to_string(),
    }
}

/// Lowercased tag name, `None` when the name is not a valid HTML tag name
fn tag_name(e: &BytesStart) -> Option<String> {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
    name.chars()
        .next()
        .filter(char::is_ascii_alphabetic)
        .map(|_| name)
}

fn attributes(e: &BytesStart) -> Vec<(String, String)> {
    e.html_attributes()
        .flatten()
        .map(|attr| {
            (
                String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase(),
                decode_entities(&String::from_utf8_lossy(&attr.value)),
            )
        })
        .collect()
}

/// Parser input with stray markup characters escaped
///
/// Prose such as `a < b` or `AT&T` is common in model output and would
/// otherwise be rejected by the tokenizer. `script` and `style` bodies are
/// lifted out verbatim, keyed by their offset in `source`.
struct Prepared {
    source: String,
    raw_bodies: HashMap<usize, String>,
}

fn prepare(html: &str) -> Prepared {
    let lower = html.to_ascii_lowercase();
    let bytes = html.as_bytes();
    let mut source = String::with_capacity(html.len());
    let mut raw_bodies = HashMap::new();
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'<' => {
                if let Some((body_start, body_end)) = raw_text_span(&lower, i) {
                    source.push_str(&html[copied..body_start]);
                    raw_bodies.insert(source.len(), html[body_start..body_end].to_string());
                    copied = body_end;
                    i = body_end;
                    continue;
                }
                let opens_markup = bytes.get(i + 1).is_some_and(|&next| {
                    next.is_ascii_alphabetic() || matches!(next, b'/' | b'!' | b'?')
                });
                if !opens_markup {
                    source.push_str(&html[copied..i]);
                    source.push_str("&lt;");
                    copied = i + 1;
                }
            }
            b'&' if !starts_entity(&html[i + 1..]) => {
                source.push_str(&html[copied..i]);
                source.push_str("&amp;");
                copied = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    source.push_str(&html[copied..]);

    Prepared { source, raw_bodies }
}

/// Body span of a `script`/`style` element opening at `at`
fn raw_text_span(lower: &str, at: usize) -> Option<(usize, usize)> {
    let rest = &lower[at + 1..];
    let tag = RAW_TEXT_ELEMENTS.iter().find(|tag| {
        rest.starts_with(**tag)
            && rest[tag.len()..].starts_with(|c: char| c.is_ascii_whitespace() || c == '>')
    })?;
    let open_end = at + lower[at..].find('>')?;
    if lower[..open_end].ends_with('/') {
        return None;
    }
    let body_start = open_end + 1;
    let close = format!("</{tag}");
    let body_end = lower[body_start..]
        .find(&close)
        .map(|offset| body_start + offset)
        .unwrap_or(lower.len());
    Some((body_start, body_end))
}

fn starts_entity(rest: &str) -> bool {
    let Some(end) = rest.find(';') else {
        return false;
    };
    let name = &rest[..end];
    if let Some(num) = name.strip_prefix('#') {
        return match num.strip_prefix(['x', 'X']) {
            Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
            None => !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()),
        };
    }
    name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric())
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Decode the common named entities plus numeric references
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        let decoded = rest.find(';').and_then(|end| {
            let ch = match &rest[1..end] {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                name => name.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            ch.map(|c| (c, end))
        });

        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
