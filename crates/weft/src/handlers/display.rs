#![forbid(unsafe_code)]

//! `show` / `hide`: toggle the inline `display` property, leaving the node
//! in the tree.

use std::rc::Rc;

use weft_dom::NodeId;
use weft_runtime::{BindError, Expression, Scope, Update, WatchOptions, Watcher};

use super::watch;
use crate::compiler::Compiler;

const HIDDEN: &str = "none";

pub(crate) fn bind(
    compiler: &Compiler,
    node: NodeId,
    source: &str,
    show: bool,
    scope: &Scope,
) -> Result<Rc<Watcher>, BindError> {
    let expression = Expression::parse(source)?;
    let dom = compiler.dom().clone();
    // Restored when the node becomes visible again.
    let authored = dom
        .style_property(node, "display")
        .filter(|d| d != HIDDEN);
    let label = if show { "show" } else { "hide" };
    watch(
        expression,
        scope,
        WatchOptions::new(label),
        move |update: &Update<'_>| -> Result<(), BindError> {
            let visible = update.value.truthy() == show;
            match (&authored, visible) {
                (_, false) => dom.set_style_property(node, "display", HIDDEN)?,
                (Some(display), true) => dom.set_style_property(node, "display", display)?,
                (None, true) => {
                    dom.remove_style_property(node, "display")?;
                }
            }
            Ok(())
        },
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use weft_dom::Dom;
    use weft_runtime::{Methods, Scope, Value, observe};

    use crate::compiler::Compiler;
    use crate::config::WeftConfig;

    #[test]
    fn toggles_and_restores_authored_display() {
        let dom = Dom::new();
        let root = dom
            .parse(r#"<p v-show="on" style="display: flex"></p><i v-hide="on"></i>"#)
            .unwrap();
        let model = observe(Value::from_json(json!({"on": false})), "");
        let scope = Scope::root(model.as_object().cloned().unwrap_or_default(), Methods::new());
        let _bindings = Compiler::new(dom.clone(), WeftConfig::default())
            .compile(root, &scope)
            .unwrap();
        assert_eq!(
            dom.inner_html(root),
            r#"<p style="display: none;"></p><i></i>"#
        );
        scope.model().set("on", true).unwrap();
        assert_eq!(
            dom.inner_html(root),
            r#"<p style="display: flex;"></p><i style="display: none;"></i>"#
        );
    }
}
