#![forbid(unsafe_code)]

//! Per-container dependency registry.
//!
//! # Design
//!
//! Every observed container owns one [`Dep`]. It maps a path string to the
//! watchers whose most recent evaluation read that path. Watchers are held
//! weakly, the same way `Observable` subscribers are: a watcher that is
//! dropped without tearing down simply fails to upgrade and is pruned on the
//! next notification.
//!
//! # Invariants
//!
//! 1. A watcher appears at most once per path (`add` is idempotent).
//! 2. Within one path, watchers are notified in subscription order.
//! 3. A path whose last subscriber is removed is dropped from the map.
//! 4. No registry borrow is held while a watcher callback runs, so
//!    callbacks may freely subscribe, unsubscribe, and write.
//!
//! # Failure Modes
//!
//! - **Render failure during fan-out**: [`Dep::notify`] stops at the first
//!   watcher that fails and returns its error; later watchers on the same
//!   path are not updated for this write.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use crate::error::BindError;
use crate::observer::ArrayMutation;
use crate::watcher::{Watcher, WatcherId};

/// Identity of a registry, unique for the life of the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepId(u64);

thread_local! {
    static NEXT_DEP_ID: Cell<u64> = const { Cell::new(1) };
}

type Subscribers = Vec<(WatcherId, Weak<Watcher>)>;

struct DepInner {
    id: DepId,
    subscribers: FxHashMap<String, Subscribers>,
}

/// Shared handle to a dependency registry.
#[derive(Clone)]
pub struct Dep {
    inner: Rc<RefCell<DepInner>>,
}

/// Weak handle held by watchers so a dropped container frees its registry.
#[derive(Clone)]
pub(crate) struct WeakDep(Weak<RefCell<DepInner>>);

impl WeakDep {
    pub(crate) fn upgrade(&self) -> Option<Dep> {
        self.0.upgrade().map(|inner| Dep { inner })
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl Dep {
    #[must_use]
    pub fn new() -> Self {
        let id = NEXT_DEP_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            DepId(id)
        });
        Self {
            inner: Rc::new(RefCell::new(DepInner {
                id,
                subscribers: FxHashMap::default(),
            })),
        }
    }

    #[must_use]
    pub fn id(&self) -> DepId {
        self.inner.borrow().id
    }

    pub(crate) fn downgrade(&self) -> WeakDep {
        WeakDep(Rc::downgrade(&self.inner))
    }

    /// Subscribe `watcher` to `path`. Adding twice is a no-op.
    pub fn add(&self, path: &str, watcher: &Rc<Watcher>) {
        let mut inner = self.inner.borrow_mut();
        let subs = inner.subscribers.entry(path.to_string()).or_default();
        if subs.iter().any(|(id, _)| *id == watcher.id()) {
            return;
        }
        subs.push((watcher.id(), Rc::downgrade(watcher)));
    }

    /// Unsubscribe a watcher from `path`, pruning the path if it empties.
    pub fn remove(&self, path: &str, watcher: WatcherId) {
        let mut inner = self.inner.borrow_mut();
        let emptied = match inner.subscribers.get_mut(path) {
            Some(subs) => {
                subs.retain(|(id, _)| *id != watcher);
                subs.is_empty()
            }
            None => false,
        };
        if emptied {
            inner.subscribers.remove(path);
        }
    }

    /// Copy the subscribers of `from` onto `to`, keeping any already there.
    ///
    /// Used when a container gains a member so bindings that depend on the
    /// container as a whole also hear about writes to the new slot.
    pub fn inherit(&self, from: &str, to: &str) {
        let mut inner = self.inner.borrow_mut();
        let Some(source) = inner.subscribers.get(from).cloned() else {
            return;
        };
        let target = inner.subscribers.entry(to.to_string()).or_default();
        for (id, weak) in source {
            if !target.iter().any(|(t, _)| *t == id) {
                target.push((id, weak));
            }
        }
    }

    fn live(&self, path: &str) -> Vec<Rc<Watcher>> {
        let mut inner = self.inner.borrow_mut();
        let Some(subs) = inner.subscribers.get_mut(path) else {
            return Vec::new();
        };
        subs.retain(|(_, w)| w.strong_count() > 0);
        subs.iter().filter_map(|(_, w)| w.upgrade()).collect()
    }

    /// Let every watcher on `path` snapshot its value before a write lands.
    pub fn notify_before(&self, path: &str) {
        for watcher in self.live(path) {
            watcher.before_update();
        }
    }

    /// Re-run every watcher on `path`.
    pub fn notify(&self, path: &str, mutation: Option<&ArrayMutation>) -> Result<(), BindError> {
        let watchers = self.live(path);
        tracing::trace!(path, watchers = watchers.len(), "notify");
        for watcher in watchers {
            watcher.update(mutation)?;
        }
        Ok(())
    }

    /// Live subscriber count for `path`.
    #[must_use]
    pub fn subscriber_count(&self, path: &str) -> usize {
        self.inner
            .borrow()
            .subscribers
            .get(path)
            .map_or(0, |subs| subs.iter().filter(|(_, w)| w.strong_count() > 0).count())
    }

    /// Returns true if `watcher` is subscribed to `path`.
    #[must_use]
    pub fn is_subscribed(&self, path: &str, watcher: WatcherId) -> bool {
        self.inner
            .borrow()
            .subscribers
            .get(path)
            .is_some_and(|subs| subs.iter().any(|(id, _)| *id == watcher))
    }

    /// Paths that currently have at least one subscriber, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.inner.borrow().subscribers.keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Dep")
            .field("id", &inner.id)
            .field("paths", &inner.subscribers.len())
            .finish()
    }
}
