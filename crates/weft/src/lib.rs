#![forbid(unsafe_code)]

//! Declarative DOM bindings.
//!
//! # Role in weft
//! `weft` turns directive attributes and `{{ }}` text in a [`Dom`] subtree
//! into live bindings against an observed model. The reactive machinery
//! lives in `weft-runtime`; the tree lives in `weft-dom`.
//!
//! # Primary responsibilities
//! - **Compiler**: walks a subtree and binds every directive it finds.
//! - **Handlers**: text, style, class, show/hide, attributes, lists,
//!   conditionals, two-way form bindings, and event handlers.
//! - **Vm**: validates inputs, mounts a template, and fires `mounted`.
//!
//! # Example
//! ```
//! use serde_json::json;
//! use weft::{Dom, Vm, VmOptions};
//!
//! let dom = Dom::new();
//! let root = dom.parse_element(r#"<ul><li v-for="n in list">{{ n }}</li></ul>"#)?;
//! let vm = Vm::new(dom.clone(), root, json!({"list": [1, 2]}), VmOptions::default())?;
//! assert_eq!(dom.inner_html(root), "<li>1</li><li>2</li>");
//!
//! if let Some(list) = vm.data().peek("list").and_then(|v| v.as_array().cloned()) {
//!     list.push(3)?;
//! }
//! assert_eq!(dom.inner_html(root), "<li>1</li><li>2</li><li>3</li>");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod compiler;
pub mod config;
pub mod directive;
mod handlers;
pub mod vm;

pub use compiler::{BindingSet, Compiler};
pub use config::WeftConfig;
pub use directive::{Directive, DirectiveKind, ListSpec, parse_list};
pub use handlers::event::EVENT_KEY;
pub use vm::{Vm, VmOptions};

pub use weft_dom::{Dom, Event, NodeId};
pub use weft_runtime::{
    BindError, ContractViolation, EvalError, Methods, Object, ParseError, Value,
};
