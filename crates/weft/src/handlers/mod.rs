#![forbid(unsafe_code)]

//! Binding handlers, one module per directive kind.
//!
//! Data-driven handlers build a [`Watcher`] whose renderer patches the DOM;
//! [`event`] wires a listener instead. Structural handlers ([`list`],
//! [`conditional`]) own the compilation of the instances they create.

pub mod attr;
pub mod class;
pub mod conditional;
pub mod display;
pub mod event;
pub mod list;
pub mod model;
pub mod style;
pub mod text;

use std::rc::Rc;

use weft_dom::NodeId;
use weft_runtime::{BindError, Expression, Render, Scope, WatchOptions, Watcher};

use crate::compiler::{BindingSet, Compiler};
use crate::directive::{Directive, DirectiveKind};

/// Bind one directive found on `node`. The attribute is already removed.
/// `siblings` is every directive found on the node, `directive` included.
pub(crate) fn bind(
    compiler: &Compiler,
    node: NodeId,
    directive: &Directive,
    siblings: &[Directive],
    scope: &Scope,
    set: &mut BindingSet,
) -> Result<(), BindError> {
    let _span =
        tracing::trace_span!("bind", directive = directive.kind.label(), node = %node).entered();
    let source = directive.value.as_str();
    match &directive.kind {
        DirectiveKind::Text => set.push_watcher(text::bind(compiler, node, source, scope)?),
        DirectiveKind::Style => set.push_watcher(style::bind(compiler, node, source, scope)?),
        DirectiveKind::Class => set.push_watcher(class::bind(compiler, node, source, scope)?),
        DirectiveKind::For => set.push_watcher(list::bind(compiler, node, source, scope)?),
        DirectiveKind::If => set.push_watcher(conditional::bind(compiler, node, source, scope)?),
        DirectiveKind::Display { show } => {
            set.push_watcher(display::bind(compiler, node, source, *show, scope)?);
        }
        DirectiveKind::Model => {
            let bound_value = siblings.iter().find_map(|d| match &d.kind {
                DirectiveKind::Attr(name) if name == "value" => Some(d.value.as_str()),
                _ => None,
            });
            let (watcher, value_sync) = model::bind(compiler, node, source, bound_value, scope)?;
            set.push_watcher(watcher);
            if let Some(sync) = value_sync {
                set.push_watcher(sync);
            }
            set.count_listener();
        }
        DirectiveKind::On(event_type) => {
            event::bind(compiler, node, event_type, source, scope)?;
            set.count_listener();
        }
        DirectiveKind::Attr(name) => {
            set.push_watcher(attr::bind(compiler, node, name, source, scope)?);
        }
    }
    Ok(())
}

/// Create a watcher and run its first render. A failed first render tears
/// the watcher down before the error propagates.
pub(crate) fn watch(
    expression: Expression,
    scope: &Scope,
    options: WatchOptions,
    renderer: impl Render + 'static,
) -> Result<Rc<Watcher>, BindError> {
    let watcher = Watcher::new(expression, scope.clone(), options, renderer);
    if let Err(err) = watcher.render_initial() {
        watcher.teardown();
        return Err(err);
    }
    Ok(watcher)
}
