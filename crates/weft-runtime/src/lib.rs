#![forbid(unsafe_code)]

//! Reactive core: observed data, dependency tracking, and expressions.
//!
//! # Role in weft
//! `weft-runtime` owns everything between a model write and the decision
//! to re-render a binding. It has no opinion about what a binding renders
//! into; the `weft` crate plugs DOM patching in through [`Render`].
//!
//! # Primary responsibilities
//! - **Value / Object / Array**: dynamic data with shared containers.
//! - **observe**: marks a container tree observed and assigns paths.
//! - **Dep**: per-container path-to-watcher registry.
//! - **Watcher**: evaluates an expression with dependency tracking and
//!   drives a renderer when a dependency changes.
//! - **Scope / Expression**: layered name lookup and the expression language.
//!
//! # How it fits in the system
//! ```text
//! Object::set ──▶ Dep::notify_before ──▶ Watcher::before_update (snapshot)
//!            └──▶ Dep::notify ────────▶ Watcher::update ──▶ Render::render
//!                                             │
//!                         Expression::evaluate (tracked reads re-subscribe)
//! ```
//! Everything runs synchronously on the calling thread; there is no queue.

pub mod dep;
pub mod error;
pub mod expr;
pub mod observer;
pub mod scope;
pub mod value;
pub mod watcher;

pub use dep::{Dep, DepId};
pub use error::{BindError, ContractViolation, EvalError, ParseError, ParseErrorKind};
pub use expr::{Expression, is_identifier};
pub use observer::{
    Array, ArrayChange, ArrayMutation, LENGTH_KEY, MAX_ARRAY_LEN, Object, child_path, observe,
};
pub use scope::{DATA_KEY, Method, Methods, Scope};
pub use value::Value;
pub use watcher::{
    Depth, MAX_DEFERRED_RUNS, Render, Update, WatchOptions, Watcher, WatcherId, is_tracking,
    untracked,
};
