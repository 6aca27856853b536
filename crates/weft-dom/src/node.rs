#![forbid(unsafe_code)]

//! Node storage for the DOM arena.
//!
//! Nodes live in a flat arena owned by [`Document`](crate::Document) and are
//! addressed by [`NodeId`]. Tree structure is kept as parent pointers plus an
//! ordered child list per node.

use std::fmt;

use smallvec::SmallVec;

use crate::event::Listener;

/// Handle to a node in a [`Document`](crate::Document).
///
/// Ids are never reused within one document, so a stale id held after the
/// node was destroyed resolves to nothing instead of aliasing a new node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Raw arena index, mostly useful for diagnostics.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Elements that never have children and serialize without a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Returns true if `tag` is a void element.
#[must_use]
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Element payload: tag, attributes, inline style, and form properties.
#[derive(Debug, Clone, Default)]
pub struct ElementData {
    pub(crate) tag: String,
    /// Attributes in insertion order. `style` is stored in [`Self::style`].
    pub(crate) attrs: Vec<(String, String)>,
    /// Inline style declarations in insertion order.
    pub(crate) style: Vec<(String, String)>,
    /// Live `value` property (inputs, textareas, selects, options).
    pub(crate) value: String,
    pub(crate) checked: bool,
    pub(crate) selected: bool,
}

impl ElementData {
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        if name == "style" {
            return None;
        }
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn set_attr(&mut self, name: &str, value: &str) {
        match name {
            "style" => {
                self.style = parse_style(value);
                return;
            }
            "value" => self.value = value.to_string(),
            "checked" => self.checked = true,
            "selected" => self.selected = true,
            _ => {}
        }
        if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value.to_string();
        } else {
            self.attrs.push((name.to_string(), value.to_string()));
        }
    }

    pub(crate) fn remove_attr(&mut self, name: &str) -> bool {
        if name == "style" {
            let had = !self.style.is_empty();
            self.style.clear();
            return had;
        }
        let before = self.attrs.len();
        self.attrs.retain(|(k, _)| k != name);
        before != self.attrs.len()
    }

    pub(crate) fn classes(&self) -> SmallVec<[String; 4]> {
        self.attr("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub(crate) fn set_classes(&mut self, classes: &[String]) {
        if classes.is_empty() {
            self.remove_attr("class");
        } else {
            self.set_attr("class", &classes.join(" "));
        }
    }

    pub(crate) fn style_text(&self) -> String {
        self.style
            .iter()
            .map(|(k, v)| format!("{k}: {v};"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Parse a `prop: value; prop: value` declaration list.
///
/// Empty declarations and declarations without a colon are skipped.
#[must_use]
pub fn parse_style(text: &str) -> Vec<(String, String)> {
    text.split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let k = k.trim();
            let v = v.trim();
            (!k.is_empty()).then(|| (k.to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

/// What a node is.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
    Comment(String),
    /// A detached container whose children move out when it is inserted.
    Fragment,
}

/// One arena slot.
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) listeners: Vec<(String, Listener)>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub(crate) fn element(&self) -> Option<&ElementData> {
        match &self.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
