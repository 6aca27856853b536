#![forbid(unsafe_code)]

//! Shared DOM handle and tree operations.
//!
//! # Design
//!
//! [`Dom`] wraps the node arena in `Rc<RefCell<..>>` so every binding can keep
//! a cheap handle to the tree it patches. Each public method borrows the arena
//! for the duration of that one call only; no borrow is ever held while user
//! callbacks run. That is what makes re-entrant patching safe: an event
//! listener may write to the model, whose dependents patch the tree again,
//! all inside a single [`Dom::dispatch`] call.
//!
//! # Invariants
//!
//! 1. A node has at most one parent, and appears exactly once in that
//!    parent's child list.
//! 2. Inserting a fragment moves its children (in order) and leaves the
//!    fragment empty.
//! 3. Destroyed nodes resolve to nothing; their ids are never reissued.
//! 4. The tree is acyclic: inserting a node into its own subtree fails.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::event::{Event, Listener, ListenerError};
#[cfg(test)]
use crate::event::listener;
use crate::markup::{self, MarkupError};
use crate::node::{ElementData, Node, NodeId, NodeKind};

/// Errors from tree operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The id does not name a live node.
    UnknownNode(NodeId),
    /// The operation needs an element.
    NotAnElement(NodeId),
    /// Text and comment nodes cannot have children.
    NotAContainer(NodeId),
    /// The node is not a child of the given parent.
    NotAChild { parent: NodeId, child: NodeId },
    /// The insertion would make a node its own ancestor.
    Cycle { parent: NodeId, child: NodeId },
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNode(id) => write!(f, "unknown node {id}"),
            Self::NotAnElement(id) => write!(f, "node {id} is not an element"),
            Self::NotAContainer(id) => write!(f, "node {id} cannot have children"),
            Self::NotAChild { parent, child } => {
                write!(f, "node {child} is not a child of {parent}")
            }
            Self::Cycle { parent, child } => {
                write!(f, "inserting {child} into {parent} would create a cycle")
            }
        }
    }
}

impl std::error::Error for DomError {}

/// Coarse node classification for callers that do not need the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Element,
    Text,
    Comment,
    Fragment,
}

#[derive(Default)]
pub(crate) struct Document {
    nodes: Vec<Option<Node>>,
}

impl Document {
    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(Some(Node::new(kind)));
        id
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(DomError::UnknownNode(id))
    }

    fn element(&self, id: NodeId) -> Result<&ElementData, DomError> {
        self.node(id)?.element().ok_or(DomError::NotAnElement(id))
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        self.node_mut(id)?
            .element_mut()
            .ok_or(DomError::NotAnElement(id))
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut cursor = Some(of);
        while let Some(id) = cursor {
            if id == candidate {
                return true;
            }
            cursor = self.node(id).ok().and_then(|n| n.parent);
        }
        false
    }

    fn unlink(&mut self, id: NodeId) -> Result<(), DomError> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(());
        };
        self.node_mut(parent)?.children.retain(|c| *c != id);
        self.node_mut(id)?.parent = None;
        Ok(())
    }

    fn insert(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        if matches!(
            self.node(parent)?.kind,
            NodeKind::Text(_) | NodeKind::Comment(_)
        ) {
            return Err(DomError::NotAContainer(parent));
        }
        if let Some(r) = reference
            && self.node(r)?.parent != Some(parent)
        {
            return Err(DomError::NotAChild { parent, child: r });
        }
        if matches!(self.node(child)?.kind, NodeKind::Fragment) {
            let moved = std::mem::take(&mut self.node_mut(child)?.children);
            for grandchild in moved {
                self.node_mut(grandchild)?.parent = None;
                self.insert(parent, grandchild, reference)?;
            }
            return Ok(());
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(DomError::Cycle { parent, child });
        }
        if reference == Some(child) {
            return Ok(());
        }
        self.unlink(child)?;
        let siblings = &mut self.node_mut(parent)?.children;
        let at = reference
            .and_then(|r| siblings.iter().position(|c| *c == r))
            .unwrap_or(siblings.len());
        siblings.insert(at, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn free(&mut self, id: NodeId) {
        let children = match self.nodes.get_mut(id.0 as usize).and_then(Option::take) {
            Some(node) => node.children,
            None => return,
        };
        for child in children {
            self.free(child);
        }
    }

    fn deep_clone(&mut self, id: NodeId, deep: bool) -> Result<NodeId, DomError> {
        let (kind, children) = {
            let node = self.node(id)?;
            (node.kind.clone(), node.children.clone())
        };
        let copy = self.alloc(kind);
        if deep {
            for child in children {
                let child_copy = self.deep_clone(child, true)?;
                self.node_mut(child_copy)?.parent = Some(copy);
                self.node_mut(copy)?.children.push(child_copy);
            }
        }
        Ok(copy)
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Ok(node) = self.node(id) else { return };
        match &node.kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Comment(_) => {}
            NodeKind::Element(_) | NodeKind::Fragment => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    fn text_of(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn option_value(&self, id: NodeId) -> Option<String> {
        let el = self.element(id).ok()?;
        Some(
            el.attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| self.text_of(id).trim().to_string()),
        )
    }

    fn options_of(&self, select: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(select, &mut |doc, id| {
            if doc.element(id).is_ok_and(|el| el.tag == "option") {
                out.push(id);
            }
        });
        out
    }

    fn walk(&self, id: NodeId, visit: &mut dyn FnMut(&Self, NodeId)) {
        let Ok(node) = self.node(id) else { return };
        for child in &node.children {
            visit(self, *child);
            self.walk(*child, visit);
        }
    }

    pub(crate) fn create(&mut self, kind: NodeKind) -> NodeId {
        self.alloc(kind)
    }

    pub(crate) fn append(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert(parent, child, None)
    }
}

/// Shared handle to a DOM tree.
///
/// Cloning a `Dom` creates another handle to the **same** tree.
#[derive(Clone, Default)]
pub struct Dom {
    inner: Rc<RefCell<Document>>,
}

impl fmt::Debug for Dom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dom")
            .field("live_nodes", &self.node_count())
            .finish()
    }
}

/// Weak counterpart of [`Dom`]. Listeners that need the tree hold one of
/// these so the tree does not keep itself alive.
#[derive(Clone, Default)]
pub struct WeakDom {
    inner: Weak<RefCell<Document>>,
}

impl WeakDom {
    /// The tree, if any strong handle is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Dom> {
        self.inner.upgrade().map(|inner| Dom { inner })
    }
}

impl fmt::Debug for WeakDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakDom")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Dom {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if both handles point at the same tree.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Non-owning handle, for callbacks stored inside this tree.
    #[must_use]
    pub fn downgrade(&self) -> WeakDom {
        WeakDom {
            inner: Rc::downgrade(&self.inner),
        }
    }

    // -- construction -------------------------------------------------------

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner
            .borrow_mut()
            .alloc(NodeKind::Element(ElementData::new(tag)))
    }

    pub fn create_text(&self, text: impl Into<String>) -> NodeId {
        self.inner.borrow_mut().alloc(NodeKind::Text(text.into()))
    }

    pub fn create_comment(&self, text: impl Into<String>) -> NodeId {
        self.inner.borrow_mut().alloc(NodeKind::Comment(text.into()))
    }

    pub fn create_fragment(&self) -> NodeId {
        self.inner.borrow_mut().alloc(NodeKind::Fragment)
    }

    /// Parse markup into a new fragment.
    pub fn parse(&self, source: &str) -> Result<NodeId, MarkupError> {
        markup::parse_into(&mut self.inner.borrow_mut(), source)
    }

    /// Parse markup and return its first element, detached.
    pub fn parse_element(&self, source: &str) -> Result<NodeId, MarkupError> {
        let fragment = self.parse(source)?;
        let first = self
            .children(fragment)
            .into_iter()
            .find(|c| self.is_element(*c))
            .ok_or(MarkupError::NoElement)?;
        let _ = self.detach(first);
        let _ = self.destroy(fragment);
        Ok(first)
    }

    /// Deep or shallow copy. Listeners are not copied.
    pub fn clone_node(&self, id: NodeId, deep: bool) -> Result<NodeId, DomError> {
        self.inner.borrow_mut().deep_clone(id, deep)
    }

    // -- structure ----------------------------------------------------------

    /// Number of live nodes in the arena.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.iter().flatten().count()
    }

    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.inner.borrow().node(id).is_ok()
    }

    #[must_use]
    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        let doc = self.inner.borrow();
        doc.node(id).ok().map(|n| match n.kind {
            NodeKind::Element(_) => NodeType::Element,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::Fragment => NodeType::Fragment,
        })
    }

    #[must_use]
    pub fn is_element(&self, id: NodeId) -> bool {
        self.node_type(id) == Some(NodeType::Element)
    }

    #[must_use]
    pub fn is_text(&self, id: NodeId) -> bool {
        self.node_type(id) == Some(NodeType::Text)
    }

    /// Lowercase tag name, or `None` for non-elements.
    #[must_use]
    pub fn tag_name(&self, id: NodeId) -> Option<String> {
        self.inner.borrow().element(id).ok().map(|el| el.tag.clone())
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.inner.borrow().node(id).ok().and_then(|n| n.parent)
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.inner
            .borrow()
            .node(id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Element children only.
    #[must_use]
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        let doc = self.inner.borrow();
        doc.node(id)
            .map(|n| {
                n.children
                    .iter()
                    .copied()
                    .filter(|c| doc.element(*c).is_ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let doc = self.inner.borrow();
        let parent = doc.node(id).ok()?.parent?;
        let siblings = &doc.node(parent).ok()?.children;
        let at = siblings.iter().position(|c| *c == id)?;
        siblings.get(at + 1).copied()
    }

    #[must_use]
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let doc = self.inner.borrow();
        let parent = doc.node(id).ok()?.parent?;
        let siblings = &doc.node(parent).ok()?.children;
        let at = siblings.iter().position(|c| *c == id)?;
        at.checked_sub(1).and_then(|i| siblings.get(i).copied())
    }

    /// All descendants in document (pre-)order, excluding `id` itself.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.inner.borrow().walk(id, &mut |_, n| out.push(n));
        out
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.inner.borrow_mut().insert(parent, child, None)
    }

    /// Insert `child` before `reference`, or append when `reference` is `None`.
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.inner.borrow_mut().insert(parent, child, reference)
    }

    /// Remove a node from its parent, keeping it alive for reinsertion.
    pub fn detach(&self, id: NodeId) -> Result<(), DomError> {
        self.inner.borrow_mut().unlink(id)
    }

    /// Put `replacement` where `old` is and detach `old`.
    pub fn replace(&self, old: NodeId, replacement: NodeId) -> Result<(), DomError> {
        let mut doc = self.inner.borrow_mut();
        let parent = doc.node(old)?.parent.ok_or(DomError::NotAChild {
            parent: old,
            child: old,
        })?;
        doc.insert(parent, replacement, Some(old))?;
        doc.unlink(old)
    }

    /// Detach a node and free its whole subtree, dropping its listeners.
    pub fn destroy(&self, id: NodeId) -> Result<(), DomError> {
        let mut doc = self.inner.borrow_mut();
        doc.unlink(id)?;
        doc.free(id);
        #[cfg(feature = "tracing")]
        tracing::trace!(node = %id, "destroyed subtree");
        Ok(())
    }

    // -- attributes ---------------------------------------------------------

    /// Attribute value. `style` reflects the live inline style.
    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        let doc = self.inner.borrow();
        let el = doc.element(id).ok()?;
        if name == "style" {
            return (!el.style.is_empty()).then(|| el.style_text());
        }
        el.attr(name).map(str::to_string)
    }

    #[must_use]
    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    /// All attributes in order, `style` last.
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> Vec<(String, String)> {
        let doc = self.inner.borrow();
        let Ok(el) = doc.element(id) else {
            return Vec::new();
        };
        let mut out = el.attrs.clone();
        if !el.style.is_empty() {
            out.push(("style".to_string(), el.style_text()));
        }
        out
    }

    pub fn set_attribute(&self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.inner.borrow_mut().element_mut(id)?.set_attr(name, value);
        Ok(())
    }

    /// Returns whether the attribute was present.
    pub fn remove_attribute(&self, id: NodeId, name: &str) -> Result<bool, DomError> {
        Ok(self.inner.borrow_mut().element_mut(id)?.remove_attr(name))
    }

    // -- text ---------------------------------------------------------------

    /// Concatenated text of the subtree (the data itself for text nodes).
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        self.inner.borrow().text_of(id)
    }

    /// Replace a text node's data, or an element's children with one text node.
    pub fn set_text_content(&self, id: NodeId, text: &str) -> Result<(), DomError> {
        let mut doc = self.inner.borrow_mut();
        if let NodeKind::Text(data) | NodeKind::Comment(data) = &mut doc.node_mut(id)?.kind {
            text.clone_into(data);
            return Ok(());
        }
        let old = std::mem::take(&mut doc.node_mut(id)?.children);
        for child in old {
            if let Ok(node) = doc.node_mut(child) {
                node.parent = None;
            }
            doc.free(child);
        }
        if !text.is_empty() {
            let t = doc.alloc(NodeKind::Text(text.to_string()));
            doc.insert(id, t, None)?;
        }
        Ok(())
    }

    // -- style and classes --------------------------------------------------

    #[must_use]
    pub fn style_property(&self, id: NodeId, name: &str) -> Option<String> {
        let doc = self.inner.borrow();
        let el = doc.element(id).ok()?;
        el.style
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    /// Set one inline style property. An empty value removes it.
    pub fn set_style_property(&self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let mut doc = self.inner.borrow_mut();
        let el = doc.element_mut(id)?;
        let name = name.to_ascii_lowercase();
        if value.is_empty() {
            el.style.retain(|(k, _)| *k != name);
        } else if let Some(slot) = el.style.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = value.to_string();
        } else {
            el.style.push((name, value.to_string()));
        }
        Ok(())
    }

    pub fn remove_style_property(&self, id: NodeId, name: &str) -> Result<bool, DomError> {
        let mut doc = self.inner.borrow_mut();
        let el = doc.element_mut(id)?;
        let before = el.style.len();
        el.style.retain(|(k, _)| k != name);
        Ok(before != el.style.len())
    }

    #[must_use]
    pub fn classes(&self, id: NodeId) -> Vec<String> {
        self.inner
            .borrow()
            .element(id)
            .map(|el| el.classes().into_vec())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).iter().any(|c| c == class)
    }

    pub fn add_class(&self, id: NodeId, class: &str) -> Result<(), DomError> {
        let mut doc = self.inner.borrow_mut();
        let el = doc.element_mut(id)?;
        let mut classes = el.classes();
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
            el.set_classes(&classes);
        }
        Ok(())
    }

    pub fn remove_class(&self, id: NodeId, class: &str) -> Result<(), DomError> {
        let mut doc = self.inner.borrow_mut();
        let el = doc.element_mut(id)?;
        let mut classes = el.classes();
        let before = classes.len();
        classes.retain(|c| c != class);
        if classes.len() != before {
            el.set_classes(&classes);
        }
        Ok(())
    }

    // -- form properties ----------------------------------------------------

    /// Live `value` property. For `<select>` this is the first selected
    /// option's value; for `<option>` the `value` attribute or its text.
    #[must_use]
    pub fn value(&self, id: NodeId) -> Option<String> {
        let doc = self.inner.borrow();
        let el = doc.element(id).ok()?;
        match el.tag.as_str() {
            "select" => Some(
                doc.options_of(id)
                    .into_iter()
                    .find(|o| doc.element(*o).is_ok_and(|e| e.selected))
                    .and_then(|o| doc.option_value(o))
                    .unwrap_or_default(),
            ),
            "option" => doc.option_value(id),
            _ => Some(el.value.clone()),
        }
    }

    /// Set the `value` property. On a `<select>` this selects the matching
    /// option and deselects the rest.
    pub fn set_value(&self, id: NodeId, value: &str) -> Result<(), DomError> {
        let mut doc = self.inner.borrow_mut();
        if doc.element(id)?.tag == "select" {
            for option in doc.options_of(id) {
                let matches = doc.option_value(option).as_deref() == Some(value);
                doc.element_mut(option)?.selected = matches;
            }
            return Ok(());
        }
        value.clone_into(&mut doc.element_mut(id)?.value);
        Ok(())
    }

    #[must_use]
    pub fn checked(&self, id: NodeId) -> bool {
        self.inner.borrow().element(id).is_ok_and(|el| el.checked)
    }

    pub fn set_checked(&self, id: NodeId, checked: bool) -> Result<(), DomError> {
        self.inner.borrow_mut().element_mut(id)?.checked = checked;
        Ok(())
    }

    #[must_use]
    pub fn selected(&self, id: NodeId) -> bool {
        self.inner.borrow().element(id).is_ok_and(|el| el.selected)
    }

    pub fn set_selected(&self, id: NodeId, selected: bool) -> Result<(), DomError> {
        self.inner.borrow_mut().element_mut(id)?.selected = selected;
        Ok(())
    }

    /// `<option>` descendants of a `<select>`, in document order.
    #[must_use]
    pub fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.inner.borrow().options_of(select)
    }

    // -- queries ------------------------------------------------------------

    #[must_use]
    pub fn elements_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        let tag = tag.to_ascii_lowercase();
        let mut out = Vec::new();
        self.inner.borrow().walk(root, &mut |doc, id| {
            if doc.element(id).is_ok_and(|el| el.tag == tag) {
                out.push(id);
            }
        });
        out
    }

    #[must_use]
    pub fn element_by_id(&self, root: NodeId, element_id: &str) -> Option<NodeId> {
        let mut found = None;
        self.inner.borrow().walk(root, &mut |doc, id| {
            if found.is_none() && doc.element(id).is_ok_and(|el| el.attr("id") == Some(element_id))
            {
                found = Some(id);
            }
        });
        found
    }

    // -- events -------------------------------------------------------------

    pub fn add_event_listener(
        &self,
        id: NodeId,
        event_type: &str,
        listener: Listener,
    ) -> Result<(), DomError> {
        self.inner
            .borrow_mut()
            .node_mut(id)?
            .listeners
            .push((event_type.to_string(), listener));
        Ok(())
    }

    #[must_use]
    pub fn listener_count(&self, id: NodeId, event_type: &str) -> usize {
        self.inner
            .borrow()
            .node(id)
            .map(|n| n.listeners.iter().filter(|(t, _)| t == event_type).count())
            .unwrap_or(0)
    }

    /// Deliver `event` to `target` and, if it bubbles, its ancestors.
    pub fn dispatch(&self, target: NodeId, event: &Event) -> Result<(), ListenerError> {
        event.begin(target);
        let mut path = vec![target];
        if event.bubbles() {
            let mut cursor = self.parent(target);
            while let Some(id) = cursor {
                path.push(id);
                cursor = self.parent(id);
            }
        }
        for node in path {
            let listeners: Vec<Listener> = {
                let doc = self.inner.borrow();
                let Ok(n) = doc.node(node) else { continue };
                n.listeners
                    .iter()
                    .filter(|(t, _)| t == event.event_type())
                    .map(|(_, l)| Rc::clone(l))
                    .collect()
            };
            event.enter(node);
            for listener in listeners {
                listener(event)?;
            }
            if event.propagation_stopped() {
                break;
            }
        }
        Ok(())
    }

    // -- serialization ------------------------------------------------------

    #[must_use]
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        markup::serialize(&self.inner.borrow(), id, &mut out);
        out
    }

    #[must_use]
    pub fn inner_html(&self, id: NodeId) -> String {
        let doc = self.inner.borrow();
        let mut out = String::new();
        for child in doc.node(id).map(|n| n.children.clone()).unwrap_or_default() {
            markup::serialize(&doc, child, &mut out);
        }
        out
    }
}

impl Document {
    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.node(id).ok()
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.node_mut(id).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn list(dom: &Dom) -> (NodeId, NodeId, NodeId, NodeId) {
        let ul = dom.create_element("ul");
        let a = dom.create_element("li");
        let b = dom.create_element("li");
        let c = dom.create_element("li");
        for li in [a, b, c] {
            dom.append_child(ul, li).unwrap();
        }
        (ul, a, b, c)
    }

    #[test]
    fn weak_handle_does_not_keep_tree_alive() {
        let dom = Dom::new();
        let weak = dom.downgrade();
        assert!(weak.upgrade().is_some_and(|d| d.ptr_eq(&dom)));
        drop(dom);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn insert_before_orders_children() {
        let dom = Dom::new();
        let (ul, a, b, c) = list(&dom);
        let d = dom.create_element("li");
        dom.insert_before(ul, d, Some(b)).unwrap();
        assert_eq!(dom.children(ul), vec![a, d, b, c]);
        assert_eq!(dom.next_sibling(d), Some(b));
        assert_eq!(dom.previous_sibling(d), Some(a));
    }

    #[test]
    fn reinserting_moves_node() {
        let dom = Dom::new();
        let (ul, a, b, c) = list(&dom);
        dom.append_child(ul, a).unwrap();
        assert_eq!(dom.children(ul), vec![b, c, a]);
        assert_eq!(dom.parent(a), Some(ul));
    }

    #[test]
    fn fragment_children_move_in_order() {
        let dom = Dom::new();
        let (ul, a, ..) = list(&dom);
        let frag = dom.create_fragment();
        let x = dom.create_text("x");
        let y = dom.create_text("y");
        dom.append_child(frag, x).unwrap();
        dom.append_child(frag, y).unwrap();
        dom.insert_before(ul, frag, Some(a)).unwrap();
        assert_eq!(dom.children(ul)[..2], [x, y]);
        assert!(dom.children(frag).is_empty());
    }

    #[test]
    fn cycles_are_rejected() {
        let dom = Dom::new();
        let (ul, a, ..) = list(&dom);
        assert_eq!(
            dom.append_child(a, ul),
            Err(DomError::Cycle {
                parent: a,
                child: ul
            })
        );
        let t = dom.create_text("t");
        assert_eq!(dom.append_child(t, a), Err(DomError::NotAContainer(t)));
    }

    #[test]
    fn replace_swaps_position() {
        let dom = Dom::new();
        let (ul, a, b, c) = list(&dom);
        let marker = dom.create_comment("");
        dom.replace(b, marker).unwrap();
        assert_eq!(dom.children(ul), vec![a, marker, c]);
        assert_eq!(dom.parent(b), None);
    }

    #[test]
    fn destroy_frees_subtree() {
        let dom = Dom::new();
        let (ul, a, b, c) = list(&dom);
        let live = dom.node_count();
        dom.destroy(b).unwrap();
        assert_eq!(dom.children(ul), vec![a, c]);
        assert!(!dom.contains_node(b));
        assert_eq!(dom.node_count(), live - 1);
    }

    #[test]
    fn clone_copies_structure_not_listeners() {
        let dom = Dom::new();
        let el = dom.parse_element("<p class=\"x\">hi <b>there</b></p>").unwrap();
        dom.add_event_listener(el, "click", listener(|_| Ok(())))
            .unwrap();
        let copy = dom.clone_node(el, true).unwrap();
        assert_eq!(dom.outer_html(copy), dom.outer_html(el));
        assert_eq!(dom.listener_count(copy, "click"), 0);
        let shallow = dom.clone_node(el, false).unwrap();
        assert!(dom.children(shallow).is_empty());
    }

    #[test]
    fn text_content_replaces_children() {
        let dom = Dom::new();
        let (ul, ..) = list(&dom);
        dom.set_text_content(ul, "flat").unwrap();
        assert_eq!(dom.children(ul).len(), 1);
        assert_eq!(dom.text_content(ul), "flat");
        dom.set_text_content(ul, "").unwrap();
        assert!(dom.children(ul).is_empty());
    }

    #[test]
    fn class_and_style_edits() {
        let dom = Dom::new();
        let el = dom.create_element("div");
        dom.add_class(el, "a").unwrap();
        dom.add_class(el, "b").unwrap();
        dom.add_class(el, "a").unwrap();
        assert_eq!(dom.classes(el), vec!["a", "b"]);
        dom.remove_class(el, "a").unwrap();
        assert_eq!(dom.attribute(el, "class").as_deref(), Some("b"));

        dom.set_style_property(el, "color", "red").unwrap();
        dom.set_style_property(el, "display", "none").unwrap();
        assert_eq!(
            dom.attribute(el, "style").as_deref(),
            Some("color: red; display: none;")
        );
        dom.set_style_property(el, "display", "").unwrap();
        assert_eq!(dom.style_property(el, "display"), None);
    }

    #[test]
    fn select_value_tracks_options() {
        let dom = Dom::new();
        let sel = dom
            .parse_element("<select><option>a</option><option value=\"2\">b</option></select>")
            .unwrap();
        assert_eq!(dom.value(sel).as_deref(), Some(""));
        dom.set_value(sel, "2").unwrap();
        let opts = dom.options(sel);
        assert!(!dom.selected(opts[0]));
        assert!(dom.selected(opts[1]));
        assert_eq!(dom.value(sel).as_deref(), Some("2"));
        assert_eq!(dom.value(opts[0]).as_deref(), Some("a"));
    }

    #[test]
    fn dispatch_bubbles_until_stopped() {
        let dom = Dom::new();
        let (ul, a, ..) = list(&dom);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        dom.add_event_listener(ul, "click", listener(move |_| {
            h.set(h.get() + 10);
            Ok(())
        }))
        .unwrap();
        let h = Rc::clone(&hits);
        dom.add_event_listener(a, "click", listener(move |e| {
            h.set(h.get() + 1);
            assert_eq!(e.current_target(), e.target());
            Ok(())
        }))
        .unwrap();
        dom.dispatch(a, &Event::new("click")).unwrap();
        assert_eq!(hits.get(), 11);
        dom.dispatch(a, &Event::new("click").non_bubbling()).unwrap();
        assert_eq!(hits.get(), 12);
    }

    #[test]
    fn listener_may_mutate_tree_during_dispatch() {
        let dom = Dom::new();
        let (ul, a, ..) = list(&dom);
        let handle = dom.clone();
        dom.add_event_listener(a, "click", listener(move |_| {
            let extra = handle.create_element("li");
            handle.append_child(ul, extra)?;
            Ok(())
        }))
        .unwrap();
        dom.dispatch(a, &Event::new("click")).unwrap();
        assert_eq!(dom.children(ul).len(), 4);
    }
}
