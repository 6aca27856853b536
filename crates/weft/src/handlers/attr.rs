#![forbid(unsafe_code)]

//! Generic attribute passthrough for any unrecognized directive name.
//!
//! `false`, `null` and `undefined` remove the attribute, `true` sets it
//! with an empty value, anything else sets its string form. `checked` and
//! `selected` also drive the matching form property.

use std::rc::Rc;

use weft_dom::{Dom, NodeId};
use weft_runtime::{BindError, Expression, Scope, Update, Value, WatchOptions, Watcher};

use super::watch;
use crate::compiler::Compiler;

pub(crate) fn bind(
    compiler: &Compiler,
    node: NodeId,
    name: &str,
    source: &str,
    scope: &Scope,
) -> Result<Rc<Watcher>, BindError> {
    let expression = Expression::parse(source)?;
    let dom = compiler.dom().clone();
    let name = name.to_string();
    watch(
        expression,
        scope,
        WatchOptions::new(format!("attr:{name}")),
        move |update: &Update<'_>| apply(&dom, node, &name, update.value),
    )
}

/// Attribute text for a bound value; `None` means the attribute is absent.
pub(crate) fn attribute_text(value: &Value) -> Option<String> {
    match value {
        Value::Bool(false) | Value::Null | Value::Undefined => None,
        Value::Bool(true) => Some(String::new()),
        other => Some(other.to_js_string()),
    }
}

fn apply(dom: &Dom, node: NodeId, name: &str, value: &Value) -> Result<(), BindError> {
    let text = attribute_text(value);
    let present = text.is_some();
    match text {
        Some(text) => dom.set_attribute(node, name, &text)?,
        None => {
            dom.remove_attribute(node, name)?;
        }
    }
    match name {
        "checked" => dom.set_checked(node, present)?,
        "selected" => dom.set_selected(node, present)?,
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn boolean_and_nullish_values() {
        let dom = Dom::new();
        let el = dom.create_element("input");
        apply(&dom, el, "disabled", &true.into()).unwrap();
        apply(&dom, el, "title", &Value::from(0)).unwrap();
        assert_eq!(dom.outer_html(el), r#"<input disabled title="0">"#);

        apply(&dom, el, "disabled", &false.into()).unwrap();
        apply(&dom, el, "title", &Value::Null).unwrap();
        assert_eq!(dom.outer_html(el), "<input>");
    }

    #[test]
    fn checked_tracks_property() {
        let dom = Dom::new();
        let el = dom.create_element("input");
        apply(&dom, el, "checked", &"yes".into()).unwrap();
        assert!(dom.checked(el));
        apply(&dom, el, "checked", &Value::Undefined).unwrap();
        assert!(!dom.checked(el));
    }
}
