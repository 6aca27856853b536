#![forbid(unsafe_code)]

//! Structural insert/remove.
//!
//! The element is swapped for an empty text marker and kept as a template.
//! Each falsy-to-truthy transition compiles a fresh clone in front of the
//! marker; each truthy-to-falsy transition tears that clone down and
//! destroys it. Nothing is reused across toggles.

use std::rc::Rc;

use weft_dom::NodeId;
use weft_runtime::{
    BindError, ContractViolation, Expression, Render, Scope, Update, WatchOptions, Watcher,
};

use super::watch;
use crate::compiler::{BindingSet, Compiler};

struct Instance {
    node: NodeId,
    bindings: BindingSet,
}

struct ConditionalRenderer {
    compiler: Compiler,
    template: NodeId,
    marker: NodeId,
    shown: Option<Instance>,
}

pub(crate) fn bind(
    compiler: &Compiler,
    node: NodeId,
    source: &str,
    scope: &Scope,
) -> Result<Rc<Watcher>, BindError> {
    let expression = Expression::parse(source)?;
    let dom = compiler.dom();
    if dom.parent(node).is_none() {
        return Err(ContractViolation::DetachedStructural { directive: "if" }.into());
    }
    let marker = dom.create_text("");
    dom.replace(node, marker)?;
    let renderer = ConditionalRenderer {
        compiler: compiler.clone(),
        template: node,
        marker,
        shown: None,
    };
    watch(expression, scope, WatchOptions::new("if"), renderer)
}

impl ConditionalRenderer {
    fn insert(&mut self, scope: &Scope) -> Result<(), BindError> {
        let dom = self.compiler.dom();
        let parent = dom
            .parent(self.marker)
            .ok_or(ContractViolation::DetachedStructural { directive: "if" })?;
        let clone = dom.clone_node(self.template, true)?;
        dom.insert_before(parent, clone, Some(self.marker))?;
        match self.compiler.compile_node(clone, scope) {
            Ok(bindings) => {
                self.shown = Some(Instance {
                    node: clone,
                    bindings,
                });
                Ok(())
            }
            Err(err) => {
                dom.destroy(clone)?;
                Err(err)
            }
        }
    }

    fn remove(&mut self) -> Result<(), BindError> {
        if let Some(instance) = self.shown.take() {
            instance.bindings.teardown();
            self.compiler.dom().destroy(instance.node)?;
        }
        Ok(())
    }
}

impl Render for ConditionalRenderer {
    fn render(&mut self, update: &Update<'_>) -> Result<(), BindError> {
        match (update.value.truthy(), self.shown.is_some()) {
            (true, false) => {
                tracing::debug!(marker = %self.marker, "inserting conditional instance");
                self.insert(update.scope)
            }
            (false, true) => {
                tracing::debug!(marker = %self.marker, "removing conditional instance");
                self.remove()
            }
            _ => Ok(()),
        }
    }

    fn teardown(&mut self) {
        if let Some(instance) = self.shown.take() {
            instance.bindings.teardown();
        }
        let _ = self.compiler.dom().destroy(self.template);
    }
}
