#![forbid(unsafe_code)]

//! Inline style bindings.
//!
//! Accepts an object (`{color: c, fontSize: size + 'px'}`) or a declaration
//! string (`"color: red; width: 2px"`). Properties present in the previous
//! value but not the new one are cleared; properties the binding never
//! mentioned are left alone.

use std::rc::Rc;

use rustc_hash::FxHashSet;
use weft_dom::NodeId;
use weft_dom::node::parse_style;
use weft_runtime::{BindError, Depth, Expression, Scope, Update, Value, WatchOptions, Watcher};

use super::watch;
use crate::compiler::Compiler;

pub(crate) fn bind(
    compiler: &Compiler,
    node: NodeId,
    source: &str,
    scope: &Scope,
) -> Result<Rc<Watcher>, BindError> {
    let expression = Expression::parse(source)?;
    let dom = compiler.dom().clone();
    watch(
        expression,
        scope,
        WatchOptions::new("style").with_depth(Depth::Deep),
        move |update: &Update<'_>| -> Result<(), BindError> {
            let next = declarations(update.value);
            let keep: FxHashSet<&str> = next.iter().map(|(name, _)| name.as_str()).collect();
            for (name, _) in declarations(update.old_value) {
                if !keep.contains(name.as_str()) {
                    dom.remove_style_property(node, &name)?;
                }
            }
            for (name, value) in &next {
                dom.set_style_property(node, name, value)?;
            }
            Ok(())
        },
    )
}

/// Normalized `(property, value)` pairs. Nullish object members are skipped.
fn declarations(value: &Value) -> Vec<(String, String)> {
    match value {
        Value::Object(o) => o
            .peek_entries()
            .into_iter()
            .filter(|(_, v)| !v.is_nullish())
            .map(|(k, v)| (css_property(&k), v.display_string()))
            .collect(),
        Value::Str(s) => parse_style(s),
        _ => Vec::new(),
    }
}

/// `fontSize` -> `font-size`. Already-dashed names pass through.
fn css_property(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
