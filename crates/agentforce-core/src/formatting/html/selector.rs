//! CSS selector subset for the element filter
//!
//! Supported: type, `*`, `.class`, `#id`, `[attr]`, `[attr=value]`,
//! descendant and `>` child combinators, and `,` groups. Anything else is
//! rejected with [`FormatError::Selector`].

use super::dom::{Document, NodeId};
use crate::error::FormatError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrTest {
    Exists(String),
    Equals(String, String),
}

/// One compound selector, e.g. `div.note[data-x]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// Compounds left to right; each combinator links a compound to the one before it
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    first: Compound,
    rest: Vec<(Combinator, Compound)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    groups: Vec<Complex>,
}

impl SelectorList {
    pub fn parse(selector: &str) -> Result<Self, FormatError> {
        let fail = |reason: &str| FormatError::Selector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        };

        let groups = split_groups(selector)
            .into_iter()
            .map(|group| parse_complex(group).map_err(|reason| fail(&reason)))
            .collect::<Result<Vec<_>, _>>()?;

        if groups.is_empty() {
            return Err(fail("empty selector"));
        }
        Ok(Self { groups })
    }

    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        self.groups.iter().any(|group| group.matches(doc, id))
    }

    /// Matching elements under `scope`, in document order
    pub fn select(&self, doc: &Document, scope: NodeId) -> Vec<NodeId> {
        doc.descendant_elements(scope)
            .into_iter()
            .filter(|&id| self.matches(doc, id))
            .collect()
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.ids.is_empty() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let Some(name) = doc.element_name(id) else {
            return false;
        };
        if let Some(tag) = &self.tag
            && tag != "*"
            && tag != name
        {
            return false;
        }
        if self.ids.iter().any(|want| doc.attr(id, "id") != Some(want.as_str())) {
            return false;
        }
        let classes = doc.attr(id, "class").unwrap_or("");
        if self
            .classes
            .iter()
            .any(|want| !classes.split_ascii_whitespace().any(|c| c == want))
        {
            return false;
        }
        self.attrs.iter().all(|test| match test {
            AttrTest::Exists(key) => doc.attr(id, key).is_some(),
            AttrTest::Equals(key, value) => doc.attr(id, key) == Some(value.as_str()),
        })
    }
}

impl Complex {
    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let mut compounds: Vec<(Option<Combinator>, &Compound)> = vec![(None, &self.first)];
        compounds.extend(self.rest.iter().map(|(comb, compound)| (Some(*comb), compound)));
        matches_from(doc, id, &compounds)
    }
}

/// Match the last compound against `id`, then walk up for the rest
fn matches_from(doc: &Document, id: NodeId, compounds: &[(Option<Combinator>, &Compound)]) -> bool {
    let Some(((combinator, compound), before)) = compounds.split_last() else {
        return true;
    };
    if !compound.matches(doc, id) {
        return false;
    }
    match combinator {
        None => true,
        Some(Combinator::Child) => doc
            .parent_element(id)
            .is_some_and(|parent| matches_from(doc, parent, before)),
        Some(Combinator::Descendant) => {
            let mut ancestor = doc.parent_element(id);
            while let Some(current) = ancestor {
                if matches_from(doc, current, before) {
                    return true;
                }
                ancestor = doc.parent_element(current);
            }
            false
        }
    }
}

/// Split on commas outside attribute brackets and quotes
fn split_groups(selector: &str) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in selector.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                groups.push(selector[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    groups.push(selector[start..].trim());
    groups.retain(|group| !group.is_empty());
    groups
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_complex(group: &str) -> Result<Complex, String> {
    let chars: Vec<char> = group.chars().collect();
    let mut pos = 0;
    let mut compounds: Vec<(Option<Combinator>, Compound)> = Vec::new();
    let mut pending: Option<Combinator> = None;

    while pos < chars.len() {
        let c = chars[pos];
        if c.is_whitespace() {
            if !compounds.is_empty() && pending.is_none() {
                pending = Some(Combinator::Descendant);
            }
            pos += 1;
            continue;
        }
        if c == '>' {
            if compounds.is_empty() || pending == Some(Combinator::Child) {
                return Err("dangling '>' combinator".to_string());
            }
            pending = Some(Combinator::Child);
            pos += 1;
            continue;
        }

        let compound = parse_compound(&chars, &mut pos)?;
        let combinator = if compounds.is_empty() { None } else { pending.take() };
        if !compounds.is_empty() && combinator.is_none() {
            return Err("missing combinator".to_string());
        }
        compounds.push((combinator, compound));
        pending = None;
    }

    if pending == Some(Combinator::Child) {
        return Err("dangling '>' combinator".to_string());
    }

    let mut iter = compounds.into_iter();
    let Some((_, first)) = iter.next() else {
        return Err("empty selector".to_string());
    };
    let rest = iter
        .map(|(comb, compound)| (comb.unwrap_or(Combinator::Descendant), compound))
        .collect();
    Ok(Complex { first, rest })
}

fn parse_compound(chars: &[char], pos: &mut usize) -> Result<Compound, String> {
    let mut compound = Compound::default();

    if chars[*pos] == '*' {
        compound.tag = Some("*".to_string());
        *pos += 1;
    } else if chars[*pos].is_ascii_alphabetic() {
        compound.tag = Some(read_ident(chars, pos).to_ascii_lowercase());
    }

    while let Some(&c) = chars.get(*pos) {
        match c {
            '.' => {
                *pos += 1;
                let class = read_ident(chars, pos);
                if class.is_empty() {
                    return Err("expected class name after '.'".to_string());
                }
                compound.classes.push(class);
            }
            '#' => {
                *pos += 1;
                let id = read_ident(chars, pos);
                if id.is_empty() {
                    return Err("expected id after '#'".to_string());
                }
                compound.ids.push(id);
            }
            '[' => {
                *pos += 1;
                compound.attrs.push(parse_attr(chars, pos)?);
            }
            c if c.is_whitespace() || c == '>' => break,
            other => return Err(format!("unsupported syntax '{other}'")),
        }
    }

    if compound.is_empty() {
        return Err("expected a selector".to_string());
    }
    Ok(compound)
}

fn read_ident(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while chars.get(*pos).is_some_and(|&c| is_ident_char(c)) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

fn parse_attr(chars: &[char], pos: &mut usize) -> Result<AttrTest, String> {
    let skip_ws = |pos: &mut usize| {
        while chars.get(*pos).is_some_and(|c| c.is_whitespace()) {
            *pos += 1;
        }
    };

    skip_ws(pos);
    let key = read_ident(chars, pos).to_ascii_lowercase();
    if key.is_empty() {
        return Err("expected attribute name".to_string());
    }
    skip_ws(pos);

    match chars.get(*pos) {
        Some(']') => {
            *pos += 1;
            Ok(AttrTest::Exists(key))
        }
        Some('=') => {
            *pos += 1;
            skip_ws(pos);
            let value = match chars.get(*pos) {
                Some(&q @ ('"' | '\'')) => {
                    *pos += 1;
                    let start = *pos;
                    while chars.get(*pos).is_some_and(|&c| c != q) {
                        *pos += 1;
                    }
                    if *pos >= chars.len() {
                        return Err("unterminated attribute value".to_string());
                    }
                    let value: String = chars[start..*pos].iter().collect();
                    *pos += 1;
                    value
                }
                _ => read_ident(chars, pos),
            };
            skip_ws(pos);
            if chars.get(*pos) != Some(&']') {
                return Err("expected ']'".to_string());
            }
            *pos += 1;
            Ok(AttrTest::Equals(key, value))
        }
        Some(other) => Err(format!("unsupported attribute operator '{other}'")),
        None => Err("unterminated attribute selector".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<body>
<div id="main" class="content wide">
  <p class="lead">Intro</p>
  <section><p>Nested</p></section>
  <a href="/docs" rel="nofollow">Docs</a>
</div>
<p>Footer</p>
</body>"#;

    fn names(doc: &Document, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| doc.text_content(id)).collect()
    }

    fn select(selector: &str) -> Vec<String> {
        let doc = Document::parse(PAGE).unwrap();
        let list = SelectorList::parse(selector).unwrap();
        let ids = list.select(&doc, doc.root());
        names(&doc, &ids)
    }

    #[test]
    fn test_type_selector() {
        assert_eq!(select("p"), vec!["Intro", "Nested", "Footer"]);
    }

    #[test]
    fn test_class_and_id() {
        assert_eq!(select("p.lead"), vec!["Intro"]);
        assert_eq!(select("#main > p"), vec!["Intro"]);
        assert_eq!(select(".content.wide a"), vec!["Docs"]);
    }

    #[test]
    fn test_descendant_vs_child() {
        assert_eq!(select("div p"), vec!["Intro", "Nested"]);
        assert_eq!(select("div > p"), vec!["Intro"]);
        assert_eq!(select("body>div>section>p"), vec!["Nested"]);
    }

    #[test]
    fn test_attribute_selectors() {
        assert_eq!(select("[rel]"), vec!["Docs"]);
        assert_eq!(select("a[href='/docs']"), vec!["Docs"]);
        assert_eq!(select("a[href=\"/nope\"]"), Vec::<String>::new());
    }

    #[test]
    fn test_groups_keep_document_order() {
        assert_eq!(select("a, p.lead"), vec!["Intro", "Docs"]);
    }

    #[test]
    fn test_universal() {
        assert_eq!(select("section > *"), vec!["Nested"]);
    }

    #[test]
    fn test_unsupported_syntax_rejected() {
        for bad in ["p:first-child", "a ~ b", "p + p", "[href^=x]", "div >", "> p", "", ".", "[x"] {
            let err = SelectorList::parse(bad).unwrap_err();
            assert!(matches!(err, FormatError::Selector { .. }), "{bad}");
        }
    }
}
