#![forbid(unsafe_code)]

//! Structural repeat: `item in items` / `(item, index) in items`.
//!
//! # Design
//!
//! The directive's element is detached and kept as a template. Two empty
//! text markers take its place; every rendered item lives between them, in
//! order. Each item is one deep clone of the template compiled against a
//! child scope whose layer holds the item alias and the index alias.
//!
//! An item's nodes are found by position: item `i` spans from just after
//! item `i - 1`'s last node (or the start marker) through its own last node.
//!
//! Updates are reconciled by the kind of write that triggered them:
//!
//! | Trigger | Effect |
//! |---------|--------|
//! | `items[i] = x`, `i` rendered | rebuild item `i` in place |
//! | `items[i] = x`, `i` past the end | append the missing items |
//! | `items.length = n` | drop items from `n` on, or append |
//! | splice, or `items` replaced | rebuild everything |
//!
//! A mutation record for some other array than the one currently rendered
//! is stale and ignored.

use std::rc::Rc;

use weft_dom::{Dom, NodeId};
use weft_runtime::{
    Array, ArrayChange, BindError, ContractViolation, Depth, Object, Render, Scope, Update,
    Value, WatchOptions, Watcher, observe,
};

use super::watch;
use crate::compiler::{BindingSet, Compiler};
use crate::directive::{INDEX_ALIAS, parse_list};

struct ListItem {
    last: NodeId,
    bindings: BindingSet,
}

struct ListRenderer {
    compiler: Compiler,
    template: NodeId,
    start: NodeId,
    end: NodeId,
    alias: String,
    index_alias: String,
    source: String,
    bound: Option<Array>,
    items: Vec<ListItem>,
}

pub(crate) fn bind(
    compiler: &Compiler,
    node: NodeId,
    source: &str,
    scope: &Scope,
) -> Result<Rc<Watcher>, BindError> {
    let spec = parse_list(source)?;
    let dom = compiler.dom();
    let parent = dom
        .parent(node)
        .ok_or(ContractViolation::DetachedStructural { directive: "for" })?;
    let start = dom.create_text("");
    let end = dom.create_text("");
    dom.insert_before(parent, start, Some(node))?;
    dom.replace(node, end)?;

    let renderer = ListRenderer {
        compiler: compiler.clone(),
        template: node,
        start,
        end,
        alias: spec.item,
        index_alias: spec.index.unwrap_or_else(|| INDEX_ALIAS.to_string()),
        source: spec.collection.source().to_string(),
        bound: None,
        items: Vec::new(),
    };
    watch(
        spec.collection,
        scope,
        WatchOptions::new("for").with_depth(Depth::Members),
        renderer,
    )
}

impl ListRenderer {
    fn dom(&self) -> &Dom {
        self.compiler.dom()
    }

    /// First node of item `index` (the end marker when there is none).
    fn first_node(&self, index: usize) -> NodeId {
        let boundary = match index.checked_sub(1) {
            Some(prev) => self.items.get(prev).map_or(self.start, |item| item.last),
            None => self.start,
        };
        self.dom().next_sibling(boundary).unwrap_or(self.end)
    }

    /// Destroy the sibling run `first ..= last`.
    fn remove_nodes(&self, first: NodeId, last: NodeId) -> Result<(), BindError> {
        let dom = self.dom();
        let mut cursor = first;
        loop {
            if cursor == self.end {
                break;
            }
            let next = dom.next_sibling(cursor);
            dom.destroy(cursor)?;
            match next {
                Some(next) if cursor != last => cursor = next,
                _ => break,
            }
        }
        Ok(())
    }

    /// Compile one item and insert it before `before`.
    fn build(
        &self,
        value: Value,
        index: usize,
        scope: &Scope,
        before: NodeId,
    ) -> Result<ListItem, BindError> {
        let dom = self.dom();
        let layer = Object::new();
        layer.insert_raw(self.alias.clone(), value);
        layer.insert_raw(self.index_alias.clone(), Value::from(index));
        observe(Value::Object(layer.clone()), "");

        let fragment = dom.create_fragment();
        let clone = dom.clone_node(self.template, true)?;
        dom.append_child(fragment, clone)?;
        let bindings = match self.compiler.compile_node(clone, &scope.child(layer)) {
            Ok(bindings) => bindings,
            Err(err) => {
                dom.destroy(fragment)?;
                return Err(err);
            }
        };
        let last = dom.children(fragment).last().copied().unwrap_or(clone);
        let parent = dom
            .parent(before)
            .ok_or(ContractViolation::DetachedStructural { directive: "for" })?;
        dom.insert_before(parent, fragment, Some(before))?;
        dom.destroy(fragment)?;
        Ok(ListItem { last, bindings })
    }

    /// Build items for every index of `array` not rendered yet.
    fn append_missing(&mut self, array: &Array, scope: &Scope) -> Result<(), BindError> {
        for index in self.items.len()..array.peek_len() {
            let value = array.peek(index).unwrap_or_default();
            let item = self.build(value, index, scope, self.end)?;
            self.items.push(item);
        }
        Ok(())
    }

    fn replace_item(&mut self, array: &Array, index: usize, scope: &Scope) -> Result<(), BindError> {
        let first = self.first_node(index);
        let value = array.peek(index).unwrap_or_default();
        let item = self.build(value, index, scope, first)?;
        let old = std::mem::replace(&mut self.items[index], item);
        old.bindings.teardown();
        self.remove_nodes(first, old.last)
    }

    fn truncate(&mut self, len: usize) -> Result<(), BindError> {
        let Some(last) = self.items.last().map(|item| item.last) else {
            return Ok(());
        };
        if len >= self.items.len() {
            return Ok(());
        }
        let first = self.first_node(len);
        for item in self.items.drain(len..) {
            item.bindings.teardown();
        }
        self.remove_nodes(first, last)
    }

    fn clear(&mut self) -> Result<(), BindError> {
        for item in self.items.drain(..) {
            item.bindings.teardown();
        }
        let dom = self.dom();
        while let Some(next) = dom.next_sibling(self.start) {
            if next == self.end {
                break;
            }
            dom.destroy(next)?;
        }
        Ok(())
    }

    fn rebuild(&mut self, array: Option<&Array>, scope: &Scope) -> Result<(), BindError> {
        self.clear()?;
        match array {
            Some(array) => self.append_missing(array, scope),
            None => Ok(()),
        }
    }
}

impl Render for ListRenderer {
    fn render(&mut self, update: &Update<'_>) -> Result<(), BindError> {
        let _span = tracing::debug_span!(
            "list",
            source = %self.source,
            rendered = self.items.len()
        )
        .entered();
        let array = match update.value {
            Value::Array(a) => Some(a.clone()),
            other if !other.truthy() => None,
            other => {
                return Err(ContractViolation::ListNotArray {
                    expression: self.source.clone(),
                    found: other.type_name(),
                }
                .into());
            }
        };
        let same = match (&self.bound, &array) {
            (Some(bound), Some(array)) => bound.ptr_eq(array),
            _ => false,
        };
        match (update.mutation, array) {
            (Some(mutation), Some(array)) if same => {
                if !mutation.array.ptr_eq(&array) {
                    tracing::warn!(source = %self.source, "ignoring mutation of a superseded array");
                    return Ok(());
                }
                match mutation.change {
                    ArrayChange::Index(index) if index < self.items.len() => {
                        tracing::debug!(index, "replacing item");
                        self.replace_item(&array, index, update.scope)
                    }
                    ArrayChange::Index(_) => self.append_missing(&array, update.scope),
                    ArrayChange::Length(len) if len < self.items.len() => {
                        tracing::debug!(len, "truncating");
                        self.truncate(len)
                    }
                    ArrayChange::Length(_) => self.append_missing(&array, update.scope),
                    ArrayChange::Splice => self.rebuild(Some(&array), update.scope),
                }
            }
            (None, Some(_)) if same && !update.initial => Ok(()),
            (_, array) => {
                tracing::debug!(len = array.as_ref().map_or(0, Array::peek_len), "rebuilding");
                self.rebuild(array.as_ref(), update.scope)?;
                self.bound = array;
                Ok(())
            }
        }
    }

    fn teardown(&mut self) {
        for item in self.items.drain(..) {
            item.bindings.teardown();
        }
        self.bound = None;
        let _ = self.compiler.dom().destroy(self.template);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use weft_dom::{Dom, NodeId};
    use weft_runtime::{BindError, ContractViolation, Methods, Scope, Value, observe};

    use crate::compiler::{BindingSet, Compiler};
    use crate::config::WeftConfig;

    type Mounted = (Dom, NodeId, Scope, BindingSet);

    fn compile(markup: &str, model: serde_json::Value) -> Result<Mounted, BindError> {
        let dom = Dom::new();
        let root = dom.parse(markup).unwrap();
        let model = observe(Value::from_json(model), "");
        let scope = Scope::root(model.as_object().cloned().unwrap_or_default(), Methods::new());
        let bindings = Compiler::new(dom.clone(), WeftConfig::default()).compile(root, &scope)?;
        Ok((dom, root, scope, bindings))
    }

    #[test]
    fn needs_a_parent() {
        let dom = Dom::new();
        let el = dom.parse_element(r#"<li v-for="x in xs"></li>"#).unwrap();
        let model = observe(Value::from_json(json!({"xs": []})), "");
        let scope = Scope::root(model.as_object().cloned().unwrap_or_default(), Methods::new());
        let err = Compiler::new(dom.clone(), WeftConfig::default())
            .compile_node(el, &scope)
            .unwrap_err();
        assert!(matches!(
            err,
            BindError::Contract(ContractViolation::DetachedStructural { directive: "for" })
        ));
    }

    #[test]
    fn rejects_non_arrays() {
        let Err(err) = compile(r#"<p v-for="x in xs"></p>"#, json!({"xs": "nope"})) else {
            panic!("a string list source must be rejected");
        };
        assert_eq!(
            err.to_string(),
            "contract violation: list source `xs` must be an array, got string"
        );
    }

    #[test]
    fn falsy_source_renders_nothing() {
        let (dom, root, scope, _bindings) =
            compile(r#"<p v-for="x in xs">{{x}}</p>"#, json!({"xs": null})).unwrap();
        assert_eq!(dom.inner_html(root), "");
        scope
            .model()
            .set("xs", Value::from_json(json!(["a"])))
            .unwrap();
        assert_eq!(dom.inner_html(root), "<p>a</p>");
        scope.model().set("xs", false).unwrap();
        assert_eq!(dom.inner_html(root), "");
    }

    #[test]
    fn index_alias_defaults_and_renames() {
        let (dom, root, _, _bindings) = compile(
            r#"<i v-for="x in xs">{{$index}}{{x}}</i><b v-for="(x, n) in xs">{{n}}</b>"#,
            json!({"xs": ["a", "b"]}),
        )
        .unwrap();
        assert_eq!(dom.inner_html(root), "<i>0a</i><i>1b</i><b>0</b><b>1</b>");
    }

    #[test]
    fn items_see_enclosing_scope() {
        let (dom, root, scope, _bindings) = compile(
            r#"<ul><li v-for="x in xs">{{ prefix }}{{ x }}</li></ul>"#,
            json!({"xs": [1, 2], "prefix": "#"}),
        )
        .unwrap();
        assert_eq!(dom.inner_html(root), "<ul><li>#1</li><li>#2</li></ul>");
        scope.model().set("prefix", "-").unwrap();
        assert_eq!(dom.inner_html(root), "<ul><li>-1</li><li>-2</li></ul>");
    }

    #[tracing_test::traced_test]
    #[test]
    fn writes_to_an_unrendered_array_are_ignored() {
        let (dom, root, scope, _bindings) = compile(
            r#"<p v-for="y in xs.length > 5 ? xs : ys">{{y}}</p>"#,
            json!({"xs": [1], "ys": ["a"]}),
        )
        .unwrap();
        let xs = scope
            .model()
            .peek("xs")
            .and_then(|v| v.as_array().cloned())
            .unwrap();
        xs.push(2).unwrap();
        assert_eq!(dom.inner_html(root), "<p>a</p>");
        assert!(logs_contain("ignoring mutation of a superseded array"));
    }
}
