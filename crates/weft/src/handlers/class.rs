#![forbid(unsafe_code)]

//! Class list bindings.

use std::rc::Rc;

use smallvec::SmallVec;
use weft_dom::NodeId;
use weft_runtime::{BindError, Depth, Expression, Scope, Update, Value, WatchOptions, Watcher};

use super::watch;
use crate::compiler::Compiler;

type ClassList = SmallVec<[String; 4]>;

pub(crate) fn bind(
    compiler: &Compiler,
    node: NodeId,
    source: &str,
    scope: &Scope,
) -> Result<Rc<Watcher>, BindError> {
    let expression = Expression::parse(source)?;
    let dom = compiler.dom().clone();
    // Classes written in the markup stay whatever the binding says.
    let authored: ClassList = dom.classes(node).into_iter().collect();
    watch(
        expression,
        scope,
        WatchOptions::new("class").with_depth(Depth::Deep),
        move |update: &Update<'_>| -> Result<(), BindError> {
            let next = class_names(update.value);
            for name in class_names(update.old_value) {
                if !next.contains(&name) && !authored.contains(&name) {
                    dom.remove_class(node, &name)?;
                }
            }
            for name in &next {
                dom.add_class(node, name)?;
            }
            Ok(())
        },
    )
}

/// Classes a value asks for: a space-separated string, an array of names,
/// or an object mapping names to truthy flags.
fn class_names(value: &Value) -> ClassList {
    let mut out = ClassList::new();
    match value {
        Value::Str(s) => out.extend(s.split_whitespace().map(str::to_string)),
        Value::Array(a) => {
            for item in a.peek_items() {
                out.extend(class_names(&item));
            }
        }
        Value::Object(o) => out.extend(
            o.peek_entries()
                .into_iter()
                .filter(|(_, on)| on.truthy())
                .map(|(name, _)| name),
        ),
        _ => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_forms() {
        assert_eq!(class_names(&"a  b".into()).as_slice(), ["a", "b"]);
        assert_eq!(
            class_names(&Value::from_json(json!(["a", "b c", 1, null]))).as_slice(),
            ["a", "b", "c"]
        );
        assert_eq!(
            class_names(&Value::from_json(json!({"on": true, "off": 0, "yes": "y"}))).as_slice(),
            ["on", "yes"]
        );
        assert!(class_names(&Value::Undefined).is_empty());
    }
}
