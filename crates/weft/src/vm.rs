#![forbid(unsafe_code)]

//! The mounting facade.
//!
//! [`Vm::new`] validates its inputs, observes the model, compiles the root's
//! children off-tree in a fragment, puts them back, and fires the optional
//! `mounted` callback once. After that, model writes through [`Vm::data`] and
//! events through [`Vm::dispatch`] keep the tree current.

use std::fmt;

use weft_dom::{Dom, Event, NodeId};
use weft_runtime::{
    BindError, ContractViolation, Expression, Methods, Object, Scope, Value, observe, untracked,
};

use crate::compiler::{BindingSet, Compiler};
use crate::config::WeftConfig;

type Mounted = Box<dyn FnOnce(&Vm)>;

/// Optional inputs to [`Vm::new`].
#[derive(Default)]
pub struct VmOptions {
    methods: Methods,
    mounted: Option<Mounted>,
    config: WeftConfig,
}

impl VmOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Methods callable from expressions and event handlers.
    #[must_use]
    pub fn with_methods(mut self, methods: Methods) -> Self {
        self.methods = methods;
        self
    }

    /// Called once, after the compiled tree is attached.
    #[must_use]
    pub fn with_mounted(mut self, mounted: impl FnOnce(&Vm) + 'static) -> Self {
        self.mounted = Some(Box::new(mounted));
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: WeftConfig) -> Self {
        self.config = config;
        self
    }
}

impl fmt::Debug for VmOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmOptions")
            .field("methods", &self.methods)
            .field("mounted", &self.mounted.is_some())
            .field("config", &self.config)
            .finish()
    }
}

/// A mounted template: a root element kept in sync with a model.
pub struct Vm {
    dom: Dom,
    root: NodeId,
    scope: Scope,
    compiler: Compiler,
    bindings: BindingSet,
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl Vm {
    /// Mount `model` onto the children of `root`.
    ///
    /// # Errors
    ///
    /// [`ContractViolation::InvalidRoot`] when `root` is not an element,
    /// [`ContractViolation::ModelNotObject`] when `model` is not a JSON
    /// object, and any error raised while compiling the template.
    pub fn new(
        dom: Dom,
        root: NodeId,
        model: serde_json::Value,
        options: VmOptions,
    ) -> Result<Self, BindError> {
        if !dom.is_element(root) {
            return Err(ContractViolation::InvalidRoot.into());
        }
        if !model.is_object() {
            return Err(ContractViolation::ModelNotObject {
                found: json_type(&model),
            }
            .into());
        }
        let data = observe(Value::from_json(model), "")
            .as_object()
            .cloned()
            .unwrap_or_default();
        let VmOptions {
            methods,
            mounted,
            config,
        } = options;
        let scope = Scope::root(data, methods);
        let compiler = Compiler::new(dom.clone(), config);

        let bindings = {
            let _span = tracing::debug_span!("mount", root = %root).entered();
            let fragment = dom.create_fragment();
            for child in dom.children(root) {
                dom.append_child(fragment, child)?;
            }
            let compiled = compiler.compile(fragment, &scope);
            dom.append_child(root, fragment)?;
            dom.destroy(fragment)?;
            compiled?
        };
        tracing::debug!(
            watchers = bindings.watchers().len(),
            listeners = bindings.listener_count(),
            "mounted"
        );

        let vm = Self {
            dom,
            root,
            scope,
            compiler,
            bindings,
        };
        if let Some(mounted) = mounted {
            mounted(&vm);
        }
        Ok(vm)
    }

    /// The observed model. Writes through it re-render dependents.
    #[must_use]
    pub fn data(&self) -> &Object {
        self.scope.model()
    }

    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    #[must_use]
    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn config(&self) -> &WeftConfig {
        self.compiler.config()
    }

    /// Top-level bindings (nested list and conditional instances excluded).
    #[must_use]
    pub fn bindings(&self) -> &BindingSet {
        &self.bindings
    }

    /// Evaluate `source` against the model without subscribing to anything.
    pub fn evaluate(&self, source: &str) -> Result<Value, BindError> {
        let expression = Expression::parse(source)?;
        untracked(|| expression.evaluate(&self.scope))
    }

    /// Plain JSON copy of the model.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        Value::Object(self.data().clone()).to_json()
    }

    /// Deliver a DOM event; handler failures come back as [`BindError`].
    pub fn dispatch(&self, target: NodeId, event: &Event) -> Result<(), BindError> {
        self.dom.dispatch(target, event).map_err(BindError::from)
    }

    /// Stop every binding. The tree keeps its last rendered state.
    pub fn teardown(&self) {
        tracing::debug!(root = %self.root, "tearing down");
        self.bindings.teardown();
    }
}

impl fmt::Debug for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("root", &self.root)
            .field("bindings", &self.bindings.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_bad_inputs() {
        let dom = Dom::new();
        let text = dom.create_text("x");
        let err = Vm::new(dom.clone(), text, json!({}), VmOptions::default()).unwrap_err();
        assert!(matches!(err, BindError::Contract(ContractViolation::InvalidRoot)));

        let root = dom.create_element("div");
        let err = Vm::new(dom, root, json!([1]), VmOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            BindError::Contract(ContractViolation::ModelNotObject { found: "array" })
        ));
    }

    #[test]
    fn failed_compile_leaves_children_in_place() {
        let dom = Dom::new();
        let root = dom
            .parse_element(r#"<div><p>keep</p><i v-text="a +"></i></div>"#)
            .unwrap();
        assert!(Vm::new(dom.clone(), root, json!({}), VmOptions::default()).is_err());
        assert_eq!(dom.children(root).len(), 2);
    }
}
