#![forbid(unsafe_code)]

//! DOM events and listeners.
//!
//! Dispatch is synchronous. Listeners for the target run first in
//! registration order, then the event bubbles through each ancestor until a
//! listener calls [`Event::stop_propagation`] or a listener fails.
//!
//! # Failure Modes
//!
//! A listener returning `Err` aborts dispatch; remaining listeners do not run
//! and the error is returned to the dispatcher unchanged.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::node::NodeId;

/// Error type produced by listeners. Boxed so callers can carry their own
/// error enums through dispatch and downcast on the other side.
pub type ListenerError = Box<dyn std::error::Error + 'static>;

/// A registered event callback.
pub type Listener = Rc<dyn Fn(&Event) -> Result<(), ListenerError>>;

/// A synthetic DOM event.
pub struct Event {
    event_type: String,
    bubbles: bool,
    target: Cell<Option<NodeId>>,
    current_target: Cell<Option<NodeId>>,
    stopped: Cell<bool>,
}

impl Event {
    /// Create a bubbling event of the given type.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            bubbles: true,
            target: Cell::new(None),
            current_target: Cell::new(None),
            stopped: Cell::new(false),
        }
    }

    /// Builder: disable bubbling.
    #[must_use]
    pub fn non_bubbling(mut self) -> Self {
        self.bubbles = false;
        self
    }

    /// Event type such as `"click"` or `"input"`.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Node the event was dispatched to.
    #[must_use]
    pub fn target(&self) -> Option<NodeId> {
        self.target.get()
    }

    /// Node whose listeners are currently running.
    #[must_use]
    pub fn current_target(&self) -> Option<NodeId> {
        self.current_target.get()
    }

    #[must_use]
    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// Stop the event from reaching further ancestors.
    pub fn stop_propagation(&self) {
        self.stopped.set(true);
    }

    #[must_use]
    pub fn propagation_stopped(&self) -> bool {
        self.stopped.get()
    }

    pub(crate) fn begin(&self, target: NodeId) {
        self.target.set(Some(target));
        self.stopped.set(false);
    }

    pub(crate) fn enter(&self, node: NodeId) {
        self.current_target.set(Some(node));
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.event_type)
            .field("bubbles", &self.bubbles)
            .field("target", &self.target.get())
            .finish()
    }
}

/// Box a closure as a [`Listener`].
///
/// Prefer this over `Rc::new` so the closure's argument and return types are
/// inferred from the listener signature.
pub fn listener(f: impl Fn(&Event) -> Result<(), ListenerError> + 'static) -> Listener {
    Rc::new(f)
}
