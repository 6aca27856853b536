#![forbid(unsafe_code)]

//! In-memory DOM for weft.
//!
//! # Role in weft
//! `weft-dom` is the tree the binding engine patches. It owns node storage,
//! attribute/style/class/form-property access, synchronous event dispatch,
//! and a small markup reader/writer used to author templates and to assert
//! on rendered output.
//!
//! # How it fits in the system
//! `weft-runtime` borrows only [`DomError`] from here. The `weft` crate compiles
//! directives found in a [`Dom`] subtree into watchers that patch it.

pub mod document;
pub mod event;
pub mod markup;
pub mod node;

pub use document::{Dom, DomError, NodeType, WeakDom};
pub use event::{Event, Listener, ListenerError, listener};
pub use markup::MarkupError;
pub use node::{NodeId, is_void_element};
