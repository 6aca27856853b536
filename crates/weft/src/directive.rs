#![forbid(unsafe_code)]

//! Directive discovery and parsing.
//!
//! A directive is an attribute whose name starts with the configured prefix
//! (`v-text`, `v-on:click`, `v-href`, ...). Names are normalized here so the
//! compiler only ever deals with a [`DirectiveKind`].

use weft_dom::{Dom, NodeId};
use weft_runtime::{Expression, ParseError, ParseErrorKind, is_identifier};

use crate::config::WeftConfig;

/// What a directive binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveKind {
    Text,
    Style,
    Class,
    /// Structural repeat.
    For,
    /// Structural insert/remove.
    If,
    /// `display` toggle; `true` for `show`, `false` for `hide`.
    Display { show: bool },
    Model,
    /// Event listener for the given type.
    On(String),
    /// Plain attribute passthrough for the given attribute name.
    Attr(String),
}

impl DirectiveKind {
    /// Classify the part of an attribute name after the prefix.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "text" => Self::Text,
            "style" => Self::Style,
            "class" => Self::Class,
            "for" => Self::For,
            "if" => Self::If,
            "show" => Self::Display { show: true },
            "hide" => Self::Display { show: false },
            "model" => Self::Model,
            _ => match name
                .strip_prefix("on:")
                .or_else(|| name.strip_prefix("on-"))
            {
                Some(event) if !event.is_empty() => Self::On(event.to_string()),
                _ => Self::Attr(name.to_string()),
            },
        }
    }

    /// List and conditional directives own their subtree.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::For | Self::If)
    }

    /// Short label for logs and errors.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Style => "style",
            Self::Class => "class",
            Self::For => "for",
            Self::If => "if",
            Self::Display { show: true } => "show",
            Self::Display { show: false } => "hide",
            Self::Model => "model",
            Self::On(_) => "on",
            Self::Attr(name) => name,
        }
    }
}

/// One directive attribute found on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub kind: DirectiveKind,
    /// Full attribute name, as written.
    pub attribute: String,
    /// Attribute value (the expression text).
    pub value: String,
}

/// Directive attributes of `node`, in attribute order. Non-elements have none.
#[must_use]
pub fn directives_of(dom: &Dom, node: NodeId, config: &WeftConfig) -> Vec<Directive> {
    let prefix = config.prefix();
    if prefix.is_empty() {
        return Vec::new();
    }
    dom.attributes(node)
        .into_iter()
        .filter_map(|(attribute, value)| {
            let name = attribute.strip_prefix(prefix)?;
            if name.is_empty() {
                return None;
            }
            Some(Directive {
                kind: DirectiveKind::from_name(name),
                attribute,
                value,
            })
        })
        .collect()
}

/// The structural directive governing `directives`, if any. A list wins
/// over a conditional on the same element.
#[must_use]
pub fn structural(directives: &[Directive]) -> Option<&Directive> {
    directives
        .iter()
        .find(|d| d.kind == DirectiveKind::For)
        .or_else(|| directives.iter().find(|d| d.kind == DirectiveKind::If))
}

/// Parsed `item in items` / `(item, index) in items`.
#[derive(Debug, Clone)]
pub struct ListSpec {
    pub item: String,
    pub index: Option<String>,
    pub collection: Expression,
}

/// Default alias for the item index when none is named.
pub const INDEX_ALIAS: &str = "$index";

/// Parse a list directive value.
pub fn parse_list(source: &str) -> Result<ListSpec, ParseError> {
    let invalid = || ParseError::new(ParseErrorKind::InvalidListSyntax, 0, source);
    let (aliases, collection) = split_in(source).ok_or_else(invalid)?;
    let aliases = aliases.trim();
    let aliases = aliases
        .strip_prefix('(')
        .and_then(|a| a.strip_suffix(')'))
        .unwrap_or(aliases);
    let mut names = aliases.split(',').map(str::trim);
    let item = names.next().filter(|n| is_identifier(n)).ok_or_else(invalid)?;
    let index = match names.next() {
        Some(name) if is_identifier(name) => Some(name.to_string()),
        Some(_) => return Err(invalid()),
        None => None,
    };
    if names.next().is_some() || index.as_deref() == Some(item) {
        return Err(invalid());
    }
    let collection = collection.trim_start();
    let base = source.len() - collection.len();
    let collection = Expression::parse(collection.trim_end()).map_err(|mut e| {
        e.offset += base;
        e.source = source.to_string();
        e
    })?;
    Ok(ListSpec {
        item: item.to_string(),
        index,
        collection,
    })
}

/// Split at the first ` in ` keyword outside the alias list.
fn split_in(source: &str) -> Option<(&str, &str)> {
    let bytes = source.as_bytes();
    let mut i = 0;
    while i + 2 <= bytes.len() {
        let boundary_before = i == 0 || bytes[i - 1].is_ascii_whitespace() || bytes[i - 1] == b')';
        let boundary_after = bytes.get(i + 2).is_none_or(u8::is_ascii_whitespace);
        if &bytes[i..i + 2] == b"in" && boundary_before && boundary_after && i > 0 {
            return Some((&source[..i], &source[i + 2..]));
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_normalize() {
        assert_eq!(DirectiveKind::from_name("on:click"), DirectiveKind::On("click".into()));
        assert_eq!(DirectiveKind::from_name("on-input"), DirectiveKind::On("input".into()));
        assert_eq!(
            DirectiveKind::from_name("hide"),
            DirectiveKind::Display { show: false }
        );
        assert_eq!(DirectiveKind::from_name("href"), DirectiveKind::Attr("href".into()));
        assert_eq!(DirectiveKind::from_name("on:"), DirectiveKind::Attr("on:".into()));
    }

    #[test]
    fn collects_prefixed_attributes() {
        let dom = Dom::new();
        let el = dom
            .parse_element(r#"<p id="x" v-text="msg" v-on:click="go" v-="skip"></p>"#)
            .unwrap();
        let found = directives_of(&dom, el, &WeftConfig::default());
        let kinds: Vec<_> = found.iter().map(|d| d.kind.clone()).collect();
        assert_eq!(kinds, vec![DirectiveKind::Text, DirectiveKind::On("click".into())]);
        assert_eq!(found[1].attribute, "v-on:click");
        assert_eq!(found[1].value, "go");
    }

    #[test]
    fn list_wins_over_conditional() {
        let dom = Dom::new();
        let el = dom
            .parse_element(r#"<li v-if="ok" v-for="x in xs"></li>"#)
            .unwrap();
        let found = directives_of(&dom, el, &WeftConfig::default());
        assert_eq!(structural(&found).map(|d| &d.kind), Some(&DirectiveKind::For));
    }

    #[test]
    fn list_syntax() {
        let spec = parse_list("item in items").unwrap();
        assert_eq!(spec.item, "item");
        assert_eq!(spec.index, None);
        assert_eq!(spec.collection.source(), "items");

        let spec = parse_list(" (row, i) in table.rows ").unwrap();
        assert_eq!(spec.item, "row");
        assert_eq!(spec.index.as_deref(), Some("i"));
        assert_eq!(spec.collection.source(), "table.rows");

        let spec = parse_list("(x)in list").unwrap();
        assert_eq!(spec.item, "x");
    }

    #[test]
    fn bad_list_syntax() {
        for bad in ["items", "in items", "(a, a) in xs", "(a, b, c) in xs", "1 in xs", "for in xs"] {
            let err = parse_list(bad).unwrap_err();
            assert_eq!(err.kind, ParseErrorKind::InvalidListSyntax, "{bad}");
        }
        let err = parse_list("x in a +").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedEnd { .. }));
        assert_eq!(err.source, "x in a +");
    }

    #[test]
    fn alias_containing_in() {
        let spec = parse_list("index in indices").unwrap();
        assert_eq!(spec.item, "index");
        assert_eq!(spec.collection.source(), "indices");
    }
}
