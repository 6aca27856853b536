#![forbid(unsafe_code)]

//! Minimal HTML-ish markup reader and writer.
//!
//! Good enough for templates: elements with quoted, unquoted, or bare
//! attributes; void and self-closing elements; text with the common
//! character references; comments. It does not implement the HTML5 tree
//! construction algorithm (no implied end tags, no foster parenting).
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Mismatched close | `</b>` closes an open `<i>` | `MismatchedClose` |
//! | Unclosed element | input ends inside an element | `Unclosed` |
//! | Truncated tag | input ends inside `<...` or a comment | `UnexpectedEof` |

use std::fmt;

use crate::document::Document;
use crate::node::{ElementData, NodeId, NodeKind, is_void_element};

/// Errors from [`Dom::parse`](crate::Dom::parse).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    /// Input ended inside a tag or comment.
    UnexpectedEof { offset: usize },
    /// A closing tag did not match the innermost open element.
    MismatchedClose {
        expected: String,
        found: String,
        offset: usize,
    },
    /// Input ended with elements still open.
    Unclosed { tag: String },
    /// `<` was followed by something that is not a tag name.
    InvalidTag { offset: usize },
    /// The markup contained no element.
    NoElement,
}

impl fmt::Display for MarkupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof { offset } => write!(f, "unexpected end of markup at {offset}"),
            Self::MismatchedClose {
                expected,
                found,
                offset,
            } => write!(
                f,
                "closing tag </{found}> at {offset} does not match open <{expected}>"
            ),
            Self::Unclosed { tag } => write!(f, "element <{tag}> is never closed"),
            Self::InvalidTag { offset } => write!(f, "invalid tag at {offset}"),
            Self::NoElement => f.write_str("markup contains no element"),
        }
    }
}

impl std::error::Error for MarkupError {}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn expect(&mut self, c: char) -> Result<(), MarkupError> {
        match self.bump() {
            Some(got) if got == c => Ok(()),
            Some(_) => Err(MarkupError::InvalidTag { offset: self.pos }),
            None => Err(MarkupError::UnexpectedEof { offset: self.pos }),
        }
    }
}

fn is_name_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '"' | '\'' | '<')
}

pub(crate) fn parse_into(doc: &mut Document, source: &str) -> Result<NodeId, MarkupError> {
    let fragment = doc.create(NodeKind::Fragment);
    let mut open: Vec<(NodeId, String)> = vec![(fragment, String::new())];
    let mut r = Reader { src: source, pos: 0 };

    while !r.eof() {
        let Some(&(parent, _)) = open.last() else {
            break;
        };
        let rest = r.rest();
        if let Some(body) = rest.strip_prefix("<!--") {
            let end = body
                .find("-->")
                .ok_or(MarkupError::UnexpectedEof { offset: r.pos })?;
            let id = doc.create(NodeKind::Comment(body[..end].to_string()));
            attach(doc, parent, id);
            r.pos += 4 + end + 3;
        } else if rest.starts_with("</") {
            let offset = r.pos;
            r.pos += 2;
            let name = r.take_while(is_name_char).to_ascii_lowercase();
            r.skip_ws();
            r.expect('>')?;
            let Some((closed, expected)) = open.pop().filter(|(_, tag)| !tag.is_empty()) else {
                return Err(MarkupError::MismatchedClose {
                    expected: String::new(),
                    found: name,
                    offset,
                });
            };
            if expected != name {
                return Err(MarkupError::MismatchedClose {
                    expected,
                    found: name,
                    offset,
                });
            }
            if expected == "textarea" {
                seed_textarea(doc, closed);
            }
        } else if rest.starts_with('<') {
            let (id, tag, self_closing) = parse_open_tag(doc, &mut r)?;
            attach(doc, parent, id);
            if !self_closing && !is_void_element(&tag) {
                open.push((id, tag));
            }
        } else {
            let text = r.take_while(|c| c != '<');
            let id = doc.create(NodeKind::Text(decode_entities(text)));
            attach(doc, parent, id);
        }
    }

    match open.pop() {
        Some((_, tag)) if !tag.is_empty() => Err(MarkupError::Unclosed { tag }),
        _ => Ok(fragment),
    }
}

fn attach(doc: &mut Document, parent: NodeId, child: NodeId) {
    // Freshly created nodes cannot form cycles or be text parents here.
    let _ = doc.append(parent, child);
}

fn seed_textarea(doc: &mut Document, id: NodeId) {
    let mut text = String::new();
    if let Some(node) = doc.get(id) {
        for child in &node.children {
            if let Some(NodeKind::Text(t)) = doc.get(*child).map(|n| &n.kind) {
                text.push_str(t);
            }
        }
    }
    if let Some(NodeKind::Element(el)) = doc.get_mut(id).map(|n| &mut n.kind) {
        el.value = text;
    }
}

fn parse_open_tag(
    doc: &mut Document,
    r: &mut Reader<'_>,
) -> Result<(NodeId, String, bool), MarkupError> {
    let offset = r.pos;
    r.expect('<')?;
    let tag = r.take_while(is_name_char);
    if tag.is_empty() || !tag.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(MarkupError::InvalidTag { offset });
    }
    let mut el = ElementData::new(tag);
    loop {
        r.skip_ws();
        match r.peek() {
            None => return Err(MarkupError::UnexpectedEof { offset: r.pos }),
            Some('>') => {
                r.bump();
                let tag = el.tag.clone();
                return Ok((doc.create(NodeKind::Element(el)), tag, false));
            }
            Some('/') => {
                r.bump();
                r.expect('>')?;
                let tag = el.tag.clone();
                return Ok((doc.create(NodeKind::Element(el)), tag, true));
            }
            Some(_) => {
                let name = r.take_while(is_name_char);
                if name.is_empty() {
                    return Err(MarkupError::InvalidTag { offset: r.pos });
                }
                r.skip_ws();
                let value = if r.peek() == Some('=') {
                    r.bump();
                    r.skip_ws();
                    read_attr_value(r)?
                } else {
                    String::new()
                };
                el.set_attr(name, &value);
            }
        }
    }
}

fn read_attr_value(r: &mut Reader<'_>) -> Result<String, MarkupError> {
    match r.peek() {
        Some(q @ ('"' | '\'')) => {
            r.bump();
            let raw = r.take_while(|c| c != q);
            r.expect(q)?;
            Ok(decode_entities(raw))
        }
        Some(_) => Ok(decode_entities(
            r.take_while(|c| !c.is_whitespace() && c != '>'),
        )),
        None => Err(MarkupError::UnexpectedEof { offset: r.pos }),
    }
}

/// Decode the character references templates actually use.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        let decoded = rest.find(';').and_then(|end| {
            let name = &rest[1..end];
            let c = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => name
                    .strip_prefix("#x")
                    .or_else(|| name.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| name.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            }?;
            Some((c, end + 1))
        });
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
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

fn escape_into(text: &str, attr: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attr => out.push_str("&lt;"),
            '>' if !attr => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

pub(crate) fn serialize(doc: &Document, id: NodeId, out: &mut String) {
    let Some(node) = doc.get(id) else { return };
    match &node.kind {
        NodeKind::Text(t) => escape_into(t, false, out),
        NodeKind::Comment(c) => {
            out.push_str("<!--");
            out.push_str(c);
            out.push_str("-->");
        }
        NodeKind::Fragment => {
            for child in &node.children {
                serialize(doc, *child, out);
            }
        }
        NodeKind::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            let style = el.style_text();
            let style_attr = (!style.is_empty()).then(|| ("style".to_string(), style));
            for (name, value) in el.attrs.iter().chain(style_attr.iter()) {
                out.push(' ');
                out.push_str(name);
                if !value.is_empty() {
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
            }
            out.push('>');
            if is_void_element(&el.tag) {
                return;
            }
            for child in &node.children {
                serialize(doc, *child, out);
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
    }
}
