#![forbid(unsafe_code)]

//! Event handlers (`on:<type>`).
//!
//! No watcher is created: the expression runs, untracked, each time the
//! event fires. It sees the binding's scope plus `$event`, an object with
//! the event `type` and the target's `value` and `checked` state.
//!
//! A bare method name is called with `$event` as its only argument;
//! anything else (a call, an assignment) is evaluated as written.

use weft_dom::{Dom, Event, ListenerError, NodeId, listener};
use weft_runtime::{BindError, Expression, Object, Scope, Value, observe, untracked};

use crate::compiler::Compiler;

/// Name under which handlers see the event.
pub const EVENT_KEY: &str = "$event";

pub(crate) fn bind(
    compiler: &Compiler,
    node: NodeId,
    event_type: &str,
    source: &str,
    scope: &Scope,
) -> Result<(), BindError> {
    let expression = Expression::parse(source)?;
    let dom = compiler.dom();
    let resolved = compiler.config().resolve_event_type(event_type);
    if resolved != event_type {
        tracing::debug!(from = event_type, to = resolved, "remapped event type");
    }
    let tree = dom.downgrade();
    let scope = scope.clone();
    dom.add_event_listener(
        node,
        resolved,
        listener(move |event| {
            let Some(dom) = tree.upgrade() else {
                return Ok(());
            };
            run(&dom, &expression, &scope, event).map_err(ListenerError::from)
        }),
    )?;
    Ok(())
}

fn event_object(dom: &Dom, event: &Event) -> Object {
    let payload = Object::new();
    payload.insert_raw("type".to_string(), event.event_type().into());
    if let Some(target) = event.target() {
        let value = dom.value(target).map_or(Value::Undefined, Value::from);
        payload.insert_raw("value".to_string(), value);
        payload.insert_raw("checked".to_string(), dom.checked(target).into());
    }
    payload
}

fn run(
    dom: &Dom,
    expression: &Expression,
    scope: &Scope,
    event: &Event,
) -> Result<(), BindError> {
    let payload = Value::Object(event_object(dom, event));
    let layer = Object::new();
    layer.insert_raw(EVENT_KEY.to_string(), payload.clone());
    observe(Value::Object(layer.clone()), "");
    let scope = scope.child(layer);
    tracing::trace!(
        event = event.event_type(),
        handler = expression.source(),
        "handling event"
    );
    untracked(|| match expression.as_identifier() {
        Some(name) if scope.has_method(name) => scope.call(name, &[payload]).map(drop),
        _ => expression.evaluate(&scope).map(drop),
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use weft_runtime::{EvalError, Methods};

    use super::*;
    use crate::config::WeftConfig;

    fn setup(markup: &str, methods: Methods, config: WeftConfig) -> (Dom, NodeId, Scope) {
        let dom = Dom::new();
        let root = dom.parse(markup).unwrap();
        let model = observe(Value::from_json(json!({"count": 0, "seen": ""})), "");
        let scope = Scope::root(model.as_object().cloned().unwrap_or_default(), methods);
        Compiler::new(dom.clone(), config).compile(root, &scope).unwrap();
        (dom, root, scope)
    }

    #[test]
    fn bare_method_receives_event() {
        let types: Rc<RefCell<Vec<String>>> = Rc::default();
        let sink = Rc::clone(&types);
        let methods = Methods::new().with("log", move |_, args: &[Value]| {
            let kind = args[0].as_object().map(|e| e.peek("type").unwrap_or_default());
            sink.borrow_mut().push(kind.unwrap_or_default().to_js_string());
            Ok(Value::Undefined)
        });
        let (dom, root, _) = setup(
            r#"<button v-on:click="log">go</button>"#,
            methods,
            WeftConfig::default(),
        );
        let button = dom.element_children(root)[0];
        dom.dispatch(button, &Event::new("click")).unwrap();
        assert_eq!(*types.borrow(), vec!["click".to_string()]);
    }

    #[test]
    fn assignment_handlers_write_the_model() {
        let (dom, root, scope) = setup(
            r#"<input v-on:input="seen = $event.value"><b v-on-click="count = count + 1"></b>"#,
            Methods::new(),
            WeftConfig::default(),
        );
        let children = dom.element_children(root);
        dom.set_value(children[0], "typed").unwrap();
        dom.dispatch(children[0], &Event::new("input")).unwrap();
        dom.dispatch(children[1], &Event::new("click")).unwrap();
        dom.dispatch(children[1], &Event::new("click")).unwrap();
        assert_eq!(
            Value::Object(scope.model().clone()).to_json(),
            json!({"count": 2, "seen": "typed"})
        );
    }

    #[test]
    fn touch_remaps_click() {
        let (dom, root, scope) = setup(
            r#"<b v-on:click="count = 5"></b>"#,
            Methods::new(),
            WeftConfig::new().with_touch(true),
        );
        let b = dom.element_children(root)[0];
        dom.dispatch(b, &Event::new("click")).unwrap();
        assert_eq!(scope.model().peek("count").unwrap().to_number(), 0.0);
        dom.dispatch(b, &Event::new("touchstart")).unwrap();
        assert_eq!(scope.model().peek("count").unwrap().to_number(), 5.0);
    }

    #[test]
    fn unknown_method_surfaces() {
        let (dom, root, _) = setup(
            r#"<b v-on:click="nope(1)"></b>"#,
            Methods::new(),
            WeftConfig::default(),
        );
        let b = dom.element_children(root)[0];
        let err = dom.dispatch(b, &Event::new("click")).unwrap_err();
        assert!(matches!(
            BindError::from(err),
            BindError::Eval(EvalError::UnknownMethod(name)) if name == "nope"
        ));
    }
}
