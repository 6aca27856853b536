#![forbid(unsafe_code)]

//! Layered name lookup for expressions.
//!
//! A [`Scope`] is a chain of optional layers ending at the root model:
//!
//! ```text
//! item layer { item, $index }  ->  outer item layer  ->  model + methods
//! ```
//!
//! Lookup walks inward-out and stops at the first layer that owns the name.
//! Layers are observed objects, so reading an alias records a dependency
//! on that layer just like a model read does.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{BindError, EvalError};
use crate::observer::Object;
use crate::value::Value;

/// Name that resolves to the root model object.
pub const DATA_KEY: &str = "$data";

/// A registered method. The first argument is the root model.
pub type Method = Rc<dyn Fn(&Object, &[Value]) -> Result<Value, BindError>>;

/// Method table, looked up by name at call time.
#[derive(Clone, Default)]
pub struct Methods {
    table: FxHashMap<String, Method>,
}

impl Methods {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f` under `name`, replacing any previous entry.
    pub fn insert<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Object, &[Value]) -> Result<Value, BindError> + 'static,
    {
        self.table.insert(name.into(), Rc::new(f));
    }

    /// Builder form of [`Self::insert`].
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Object, &[Value]) -> Result<Value, BindError> + 'static,
    {
        self.insert(name, f);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Method> {
        self.table.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl fmt::Debug for Methods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.table.keys().collect();
        names.sort();
        f.debug_set().entries(names).finish()
    }
}

struct Root {
    model: Object,
    methods: Methods,
}

struct ScopeInner {
    layer: Option<Object>,
    parent: Option<Scope>,
    root: Rc<Root>,
}

/// Shared handle to one link of a scope chain.
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

impl Scope {
    /// The outermost scope: the model and its methods.
    #[must_use]
    pub fn root(model: Object, methods: Methods) -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                layer: None,
                parent: None,
                root: Rc::new(Root { model, methods }),
            }),
        }
    }

    /// A scope whose own names come from `layer`, falling back to `self`.
    #[must_use]
    pub fn child(&self, layer: Object) -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                layer: Some(layer),
                parent: Some(self.clone()),
                root: Rc::clone(&self.inner.root),
            }),
        }
    }

    #[must_use]
    pub fn model(&self) -> &Object {
        &self.inner.root.model
    }

    #[must_use]
    pub fn methods(&self) -> &Methods {
        &self.inner.root.methods
    }

    /// This link's own bindings (`None` at the root).
    #[must_use]
    pub fn layer(&self) -> Option<&Object> {
        self.inner.layer.as_ref()
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Scope> {
        self.inner.parent.as_ref()
    }

    /// Number of layers above the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent();
        while let Some(scope) = cursor {
            depth += 1;
            cursor = scope.parent();
        }
        depth
    }

    fn owning_layer(&self, name: &str) -> Option<&Object> {
        let mut cursor = Some(self);
        while let Some(scope) = cursor {
            if let Some(layer) = scope.layer() {
                if layer.contains_key(name) {
                    return Some(layer);
                }
            }
            cursor = scope.parent();
        }
        None
    }

    /// Resolve `name`. Misses fall through to a tracked model read.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Value {
        if let Some(layer) = self.owning_layer(name) {
            return layer.get(name);
        }
        if name == DATA_KEY {
            return Value::Object(self.model().clone());
        }
        self.model().get(name)
    }

    /// Write `name` in the layer that owns it, else on the model.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), BindError> {
        match self.owning_layer(name) {
            Some(layer) => layer.set(name, value),
            None if name == DATA_KEY => Err(EvalError::NotAssignable(DATA_KEY.to_string()).into()),
            None => self.model().set(name, value),
        }
    }

    #[must_use]
    pub fn has_method(&self, name: &str) -> bool {
        self.methods().contains(name)
    }

    /// Invoke a registered method with the model as receiver.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, BindError> {
        let method = self
            .methods()
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownMethod(name.to_string()))?;
        method(self.model(), args)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("depth", &self.depth())
            .field("layer", &self.inner.layer)
            .finish_non_exhaustive()
    }
}
