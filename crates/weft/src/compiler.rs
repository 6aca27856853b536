#![forbid(unsafe_code)]

//! Template compiler.
//!
//! # Design
//!
//! Compilation is two passes over a subtree:
//!
//! 1. **Walk**: pre-order, collecting every element carrying a directive
//!    attribute and every text node containing an interpolation opener.
//!    Descendants of an element carrying a structural directive (`for`,
//!    `if`) are *not* collected; that directive compiles its own instances.
//! 2. **Drain**: each collected node, in order, is resolved to handlers.
//!    Data-driven handlers get a [`Watcher`] and render immediately; event
//!    handlers attach a DOM listener and never re-render.
//!
//! Every binding created lands in the returned [`BindingSet`], which owns
//! the watchers. Dropping or tearing down the set releases their
//! subscriptions.
//!
//! # Failure Modes
//!
//! The first parse, evaluation, or contract error aborts the compile and is
//! returned; bindings created before the failure are torn down.

use std::rc::Rc;

use weft_dom::{Dom, NodeId, NodeType};
use weft_runtime::{BindError, Expression, Scope, Watcher};

use crate::config::WeftConfig;
use crate::directive::{Directive, DirectiveKind, directives_of, structural};
use crate::handlers;

/// Watchers and listeners created by one compile.
#[derive(Debug, Default)]
pub struct BindingSet {
    watchers: Vec<Rc<Watcher>>,
    listeners: usize,
}

impl BindingSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_watcher(&mut self, watcher: Rc<Watcher>) {
        self.watchers.push(watcher);
    }

    pub(crate) fn count_listener(&mut self) {
        self.listeners += 1;
    }

    /// Data-driven bindings at this level (nested instances not included).
    #[must_use]
    pub fn watchers(&self) -> &[Rc<Watcher>] {
        &self.watchers
    }

    /// Event listeners attached at this level.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.watchers.len() + self.listeners
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop every watcher (and, through their renderers, nested instances).
    pub fn teardown(&self) {
        for watcher in &self.watchers {
            watcher.teardown();
        }
    }
}

/// Compiles DOM subtrees into live bindings. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Compiler {
    inner: Rc<CompilerInner>,
}

#[derive(Debug)]
struct CompilerInner {
    dom: Dom,
    config: WeftConfig,
}

impl Compiler {
    #[must_use]
    pub fn new(dom: Dom, config: WeftConfig) -> Self {
        Self {
            inner: Rc::new(CompilerInner { dom, config }),
        }
    }

    #[must_use]
    pub fn dom(&self) -> &Dom {
        &self.inner.dom
    }

    #[must_use]
    pub fn config(&self) -> &WeftConfig {
        &self.inner.config
    }

    /// Compile the descendants of `root` (not `root` itself).
    pub fn compile(&self, root: NodeId, scope: &Scope) -> Result<BindingSet, BindError> {
        let mut queue = Vec::new();
        for child in self.dom().children(root) {
            self.collect(child, &mut queue);
        }
        self.drain(root, queue, scope)
    }

    /// Compile `node` and its descendants.
    pub fn compile_node(&self, node: NodeId, scope: &Scope) -> Result<BindingSet, BindError> {
        let mut queue = Vec::new();
        self.collect(node, &mut queue);
        self.drain(node, queue, scope)
    }

    fn collect(&self, start: NodeId, queue: &mut Vec<NodeId>) {
        let dom = self.dom();
        let (open, _) = self.config().delimiters();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            match dom.node_type(node) {
                Some(NodeType::Element) => {
                    let directives = directives_of(dom, node, self.config());
                    if !directives.is_empty() {
                        queue.push(node);
                    }
                    if structural(&directives).is_some() {
                        continue;
                    }
                }
                Some(NodeType::Text) => {
                    if !open.is_empty() && dom.text_content(node).contains(open) {
                        queue.push(node);
                    }
                    continue;
                }
                Some(NodeType::Fragment) => {}
                _ => continue,
            }
            // Reverse so the stack pops children in document order.
            stack.extend(dom.children(node).into_iter().rev());
        }
    }

    fn drain(
        &self,
        root: NodeId,
        queue: Vec<NodeId>,
        scope: &Scope,
    ) -> Result<BindingSet, BindError> {
        let _span = tracing::debug_span!("compile", root = %root, queued = queue.len()).entered();
        let mut set = BindingSet::new();
        for node in queue {
            if let Err(err) = self.bind_node(node, scope, &mut set) {
                tracing::debug!(node = %node, error = %err, "compile failed");
                set.teardown();
                return Err(err);
            }
        }
        tracing::debug!(
            watchers = set.watchers.len(),
            listeners = set.listeners,
            "compiled"
        );
        Ok(set)
    }

    fn bind_node(&self, node: NodeId, scope: &Scope, set: &mut BindingSet) -> Result<(), BindError> {
        let dom = self.dom();
        if dom.is_text(node) {
            let (open, close) = self.config().delimiters();
            let text = dom.text_content(node);
            if let Some(expression) = Expression::parse_interpolation(&text, open, close)? {
                set.push_watcher(handlers::text::bind_interpolation(self, node, expression, scope)?);
            }
            return Ok(());
        }

        let directives = directives_of(dom, node, self.config());
        if let Some(directive) = structural(&directives) {
            dom.remove_attribute(node, &directive.attribute)?;
            return handlers::bind(self, node, directive, &directives, scope, set);
        }
        // Form bindings go last so they see the control's bound attributes.
        let (models, rest): (Vec<&Directive>, Vec<&Directive>) = directives
            .iter()
            .partition(|d| d.kind == DirectiveKind::Model);
        for directive in rest.into_iter().chain(models) {
            dom.remove_attribute(node, &directive.attribute)?;
            handlers::bind(self, node, directive, &directives, scope, set)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use weft_runtime::{Methods, Value, observe};

    fn setup(markup: &str, model: serde_json::Value) -> (Dom, NodeId, Scope, Compiler) {
        let dom = Dom::new();
        let root = dom.parse(markup).unwrap();
        let model = observe(Value::from_json(model), "");
        let scope = Scope::root(model.as_object().cloned().unwrap_or_default(), Methods::new());
        let compiler = Compiler::new(dom.clone(), WeftConfig::default());
        (dom, root, scope, compiler)
    }

    #[test]
    fn directives_are_consumed() {
        let (dom, root, scope, compiler) = setup(
            r#"<p v-text="msg" title="t"></p><span>{{ msg }}!</span>"#,
            json!({"msg": "hi"}),
        );
        let set = compiler.compile(root, &scope).unwrap();
        assert_eq!(set.watchers().len(), 2);
        assert_eq!(dom.inner_html(root), r#"<p title="t">hi</p><span>hi!</span>"#);
    }

    #[test]
    fn structural_children_are_deferred() {
        let (dom, root, scope, compiler) = setup(
            r#"<ul><li v-for="x in xs">{{ x }}</li></ul>"#,
            json!({"xs": ["a", "b"]}),
        );
        let set = compiler.compile(root, &scope).unwrap();
        // Only the list binding lives at this level.
        assert_eq!(set.watchers().len(), 1);
        assert_eq!(dom.inner_html(root), "<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn failure_releases_created_bindings() {
        let (_dom, root, scope, compiler) = setup(
            r#"<p v-text="n"></p><p v-text="a +"></p>"#,
            json!({"n": 1}),
        );
        let err = compiler.compile(root, &scope).unwrap_err();
        assert!(matches!(err, BindError::Parse(_)));
        assert_eq!(scope.model().dep().unwrap().subscriber_count("n"), 0);
    }

    #[test]
    fn custom_prefix_and_delimiters() {
        let dom = Dom::new();
        let root = dom.parse(r#"<b x-text="a"></b><i>[[ a ]]</i><u v-text="a"></u>"#).unwrap();
        let model = observe(Value::from_json(json!({"a": 7})), "");
        let scope = Scope::root(model.as_object().cloned().unwrap_or_default(), Methods::new());
        let config = WeftConfig::new().with_prefix("x-").with_delimiters("[[", "]]");
        let _set = Compiler::new(dom.clone(), config).compile(root, &scope).unwrap();
        assert_eq!(dom.inner_html(root), r#"<b>7</b><i>7</i><u v-text="a"></u>"#);
    }
}
