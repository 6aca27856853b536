#![forbid(unsafe_code)]

//! Two-way form bindings.
//!
//! The watcher pushes model values into the form control; a DOM listener
//! (`input` for text-like controls, `change` for the rest) writes the
//! control's state back through [`Watcher::set`] or, for checkbox groups,
//! by editing the bound array in place.
//!
//! | Control | Bound value | Rendered as |
//! |---------|-------------|-------------|
//! | text input, textarea | anything | `value` property |
//! | checkbox | boolean | `checked` |
//! | checkbox | array | `checked` iff the array holds the box's value |
//! | radio | anything | `checked` iff its string form is the radio's value |
//! | select | non-array | the matching option is selected |
//! | select multiple | array | options held by the array are selected |
//!
//! `undefined` and `null` render as an empty or unchecked control for every
//! kind; any other mismatch is a [`ContractViolation`].
//!
//! A checkbox or radio whose `value` is itself bound gets a second watcher
//! on that expression, so the checked state follows value changes too.

use std::rc::Rc;

use weft_dom::{Dom, ListenerError, NodeId, listener};
use weft_runtime::{
    BindError, ContractViolation, Depth, EvalError, Expression, Scope, Update, Value,
    WatchOptions, Watcher,
};

use super::{attr, watch};
use crate::compiler::Compiler;

/// Value a checkbox reports when it has no `value` attribute.
const CHECKBOX_DEFAULT: &str = "on";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Text,
    Checkbox,
    Radio,
    Select { multiple: bool },
}

impl Control {
    fn of(dom: &Dom, node: NodeId) -> Result<Self, ContractViolation> {
        let tag = dom.tag_name(node).unwrap_or_default();
        match tag.as_str() {
            "textarea" => Ok(Self::Text),
            "select" => Ok(Self::Select {
                multiple: dom.has_attribute(node, "multiple"),
            }),
            "input" => Ok(
                match dom
                    .attribute(node, "type")
                    .map(|t| t.to_ascii_lowercase())
                    .as_deref()
                {
                    Some("checkbox") => Self::Checkbox,
                    Some("radio") => Self::Radio,
                    _ => Self::Text,
                },
            ),
            _ => Err(ContractViolation::ModelElement { tag }),
        }
    }

    fn event_type(self) -> &'static str {
        match self {
            Self::Text => "input",
            Self::Checkbox | Self::Radio | Self::Select { .. } => "change",
        }
    }

    fn depth(self) -> Depth {
        match self {
            Self::Checkbox | Self::Select { .. } => Depth::Members,
            Self::Text | Self::Radio => Depth::Value,
        }
    }
}

pub(crate) fn bind(
    compiler: &Compiler,
    node: NodeId,
    source: &str,
    bound_value: Option<&str>,
    scope: &Scope,
) -> Result<(Rc<Watcher>, Option<Rc<Watcher>>), BindError> {
    let expression = Expression::parse(source)?;
    if !expression.is_assignable() {
        return Err(EvalError::NotAssignable(format!("`{source}`")).into());
    }
    let dom = compiler.dom().clone();
    let control = Control::of(&dom, node)?;

    let render_dom = dom.clone();
    let expression_text = source.to_string();
    let watcher = watch(
        expression,
        scope,
        WatchOptions::new("model").with_depth(control.depth()),
        move |update: &Update<'_>| {
            render(&render_dom, node, control, &expression_text, update.value, None)
        },
    )?;

    let value_sync = match (control, bound_value) {
        (Control::Checkbox | Control::Radio, Some(value_source)) => {
            match follow_value(&dom, node, control, source, value_source, &watcher, scope) {
                Ok(sync) => Some(sync),
                Err(err) => {
                    watcher.teardown();
                    return Err(err);
                }
            }
        }
        _ => None,
    };

    let weak = Rc::downgrade(&watcher);
    let tree = dom.downgrade();
    dom.add_event_listener(
        node,
        control.event_type(),
        listener(move |_event| {
            let (Some(watcher), Some(dom)) = (weak.upgrade(), tree.upgrade()) else {
                return Ok(());
            };
            if watcher.is_torn_down() {
                return Ok(());
            }
            write_back(&dom, node, control, &watcher).map_err(ListenerError::from)
        }),
    )?;
    Ok((watcher, value_sync))
}

/// Re-render the control against the model whenever its bound `value`
/// changes.
fn follow_value(
    dom: &Dom,
    node: NodeId,
    control: Control,
    model_source: &str,
    value_source: &str,
    model: &Rc<Watcher>,
    scope: &Scope,
) -> Result<Rc<Watcher>, BindError> {
    let expression = Expression::parse(value_source)?;
    let model = Rc::downgrade(model);
    let dom = dom.clone();
    let model_source = model_source.to_string();
    watch(
        expression,
        scope,
        WatchOptions::new("model:value"),
        move |update: &Update<'_>| {
            let Some(model) = model.upgrade() else {
                return Ok(());
            };
            if update.initial || model.is_torn_down() {
                return Ok(());
            }
            let own = attr::attribute_text(update.value)
                .unwrap_or_else(|| CHECKBOX_DEFAULT.to_string());
            render(&dom, node, control, &model_source, &model.value(), Some(own.as_str()))
        },
    )
}

fn own_value(dom: &Dom, node: NodeId) -> String {
    dom.attribute(node, "value")
        .unwrap_or_else(|| CHECKBOX_DEFAULT.to_string())
}

fn holds(items: &[Value], wanted: &str) -> bool {
    items.iter().any(|v| v.display_string() == wanted)
}

/// Push `value` into the control. `own` overrides the control's `value`
/// attribute for checkboxes and radios.
fn render(
    dom: &Dom,
    node: NodeId,
    control: Control,
    expression: &str,
    value: &Value,
    own: Option<&str>,
) -> Result<(), BindError> {
    let control_value = || own.map_or_else(|| own_value(dom, node), str::to_string);
    match control {
        Control::Text => {
            let text = value.display_string();
            if dom.value(node).as_deref() != Some(text.as_str()) {
                dom.set_value(node, &text)?;
            }
        }
        Control::Checkbox => {
            let checked = match value {
                Value::Bool(b) => *b,
                Value::Array(a) => holds(&a.peek_items(), &control_value()),
                Value::Undefined | Value::Null => false,
                other => {
                    return Err(ContractViolation::CheckboxValue {
                        expression: expression.to_string(),
                        found: other.type_name(),
                    }
                    .into());
                }
            };
            dom.set_checked(node, checked)?;
        }
        Control::Radio => {
            let checked = !value.is_nullish() && value.to_js_string() == control_value();
            dom.set_checked(node, checked)?;
        }
        Control::Select { multiple } => {
            let wanted = match (multiple, value) {
                (_, Value::Undefined | Value::Null) => Vec::new(),
                (true, Value::Array(a)) => a.peek_items(),
                (false, v) if v.as_array().is_none() => vec![v.clone()],
                _ => {
                    return Err(ContractViolation::SelectMultiplicity {
                        expression: expression.to_string(),
                        multiple,
                    }
                    .into());
                }
            };
            for option in dom.options(node) {
                let option_value = dom.value(option).unwrap_or_default();
                dom.set_selected(option, holds(&wanted, &option_value))?;
            }
        }
    }
    Ok(())
}

fn write_back(
    dom: &Dom,
    node: NodeId,
    control: Control,
    watcher: &Watcher,
) -> Result<(), BindError> {
    match control {
        Control::Text => watcher.set(dom.value(node).unwrap_or_default().into()),
        Control::Checkbox => {
            let checked = dom.checked(node);
            match watcher.value() {
                Value::Array(list) => {
                    let own = own_value(dom, node);
                    let at = list
                        .peek_items()
                        .iter()
                        .position(|v| v.display_string() == own);
                    match (checked, at) {
                        (true, None) => list.push(own),
                        (false, Some(index)) => list.remove(index).map(drop),
                        _ => Ok(()),
                    }
                }
                _ => watcher.set(checked.into()),
            }
        }
        Control::Radio if dom.checked(node) => watcher.set(own_value(dom, node).into()),
        Control::Radio => Ok(()),
        Control::Select { multiple: true } => {
            let selected: Vec<Value> = dom
                .options(node)
                .into_iter()
                .filter(|o| dom.selected(*o))
                .map(|o| dom.value(o).unwrap_or_default().into())
                .collect();
            watcher.set(selected.into())
        }
        Control::Select { multiple: false } => {
            watcher.set(dom.value(node).unwrap_or_default().into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn control_kinds() {
        let dom = Dom::new();
        let kind = |markup: &str| {
            let el = dom.parse_element(markup).unwrap();
            Control::of(&dom, el)
        };
        assert_eq!(kind("<input>"), Ok(Control::Text));
        assert_eq!(kind(r#"<input type="CheckBox">"#), Ok(Control::Checkbox));
        assert_eq!(kind(r#"<input type="radio">"#), Ok(Control::Radio));
        assert_eq!(kind("<textarea></textarea>"), Ok(Control::Text));
        assert_eq!(
            kind("<select multiple></select>"),
            Ok(Control::Select { multiple: true })
        );
        assert_eq!(
            kind("<div></div>"),
            Err(ContractViolation::ModelElement {
                tag: "div".to_string()
            })
        );
    }

    #[test]
    fn checkbox_default_value() {
        let dom = Dom::new();
        let el = dom.parse_element(r#"<input type="checkbox">"#).unwrap();
        assert_eq!(own_value(&dom, el), "on");
    }
}
