#![forbid(unsafe_code)]

//! Text content bindings: the text directive and `{{ }}` interpolation.

use std::rc::Rc;

use weft_dom::{Dom, NodeId};
use weft_runtime::{BindError, Expression, Scope, Update, WatchOptions, Watcher};

use super::watch;
use crate::compiler::Compiler;

/// Replace the element's children with the expression's text.
pub(crate) fn bind(
    compiler: &Compiler,
    node: NodeId,
    source: &str,
    scope: &Scope,
) -> Result<Rc<Watcher>, BindError> {
    let expression = Expression::parse(source)?;
    watch(expression, scope, WatchOptions::new("text"), set_text(compiler.dom(), node))
}

/// Keep an interpolated text node's data current.
pub(crate) fn bind_interpolation(
    compiler: &Compiler,
    node: NodeId,
    expression: Expression,
    scope: &Scope,
) -> Result<Rc<Watcher>, BindError> {
    watch(
        expression,
        scope,
        WatchOptions::new("interpolation"),
        set_text(compiler.dom(), node),
    )
}

fn set_text(
    dom: &Dom,
    node: NodeId,
) -> impl FnMut(&Update<'_>) -> Result<(), BindError> + 'static {
    let dom = dom.clone();
    move |update: &Update<'_>| {
        dom.set_text_content(node, &update.value.display_string())?;
        Ok(())
    }
}
