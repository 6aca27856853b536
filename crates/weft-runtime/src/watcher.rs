#![forbid(unsafe_code)]

//! Watchers: one compiled expression bound to one renderer.
//!
//! # Design
//!
//! A [`Watcher`] evaluates its expression inside a tracking frame. Every
//! tracked read of an observed container during that evaluation lands in the
//! frame and subscribes the watcher in the container's [`Dep`]. After the
//! evaluation the watcher *reconciles*: subscriptions from the previous run
//! that were not renewed are removed, so a binding only ever hears about the
//! paths its latest evaluation actually read.
//!
//! Frames live on a thread-local stack managed by [`TrackingGuard`]. Nested
//! evaluations (a list render compiling new item bindings) push their own
//! frame and the guard restores the outer one on drop, even on early return.
//! Renders always run in an untracked frame, so reads performed by a
//! renderer are never attributed to whichever watcher happens to be active.
//!
//! # Invariants
//!
//! 1. After [`Watcher::get`] the subscription set equals the set of
//!    `(registry, path)` pairs read during that evaluation.
//! 2. `old_value` is a structural copy taken by [`Watcher::before_update`];
//!    it is handed to the renderer once and then cleared.
//! 3. A torn-down watcher never renders again.
//!
//! # Failure Modes
//!
//! - **Re-entrant update**: a write that re-notifies the watcher while it is
//!   evaluating or rendering (a method writing a path it reads, a renderer
//!   feeding its own input). The notification is deferred and the watcher
//!   runs again once the outer pass returns, up to [`MAX_DEFERRED_RUNS`]
//!   times; a loop that has not settled by then is dropped with a `warn`.
//! - **Evaluation error**: subscriptions are still reconciled against what
//!   was read before the failure, then the error propagates.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::dep::{Dep, DepId, WeakDep};
use crate::error::BindError;
use crate::expr::Expression;
use crate::observer::{ArrayChange, ArrayMutation};
use crate::scope::Scope;
use crate::value::Value;

/// Identity of a watcher, unique for the life of the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatcherId(u64);

thread_local! {
    static NEXT_WATCHER_ID: Cell<u64> = const { Cell::new(1) };
    static TRACKING: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

type DepKey = (DepId, String);
type DepSet = FxHashMap<DepKey, WeakDep>;

struct Frame {
    watcher: Option<Rc<Watcher>>,
    collected: DepSet,
}

/// RAII handle for one tracking frame.
///
/// Dropping the guard pops its frame (and anything nested above it that a
/// failed evaluation left behind).
pub struct TrackingGuard {
    depth: usize,
    active: bool,
}

impl TrackingGuard {
    fn enter(watcher: Option<Rc<Watcher>>) -> Self {
        let depth = TRACKING.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(Frame {
                watcher,
                collected: DepSet::default(),
            });
            stack.len() - 1
        });
        Self {
            depth,
            active: true,
        }
    }

    fn finish(mut self) -> DepSet {
        self.active = false;
        TRACKING.with(|stack| {
            let mut stack = stack.borrow_mut();
            let frame = if stack.len() > self.depth {
                stack.truncate(self.depth + 1);
                stack.pop()
            } else {
                None
            };
            frame.map(|f| f.collected).unwrap_or_default()
        })
    }
}

impl Drop for TrackingGuard {
    fn drop(&mut self) {
        if self.active {
            // Take the frames out before dropping them: a frame may hold the
            // last handle to a watcher whose teardown touches registries.
            let popped: Vec<Frame> = TRACKING.with(|stack| {
                let mut stack = stack.borrow_mut();
                let depth = self.depth.min(stack.len());
                stack.drain(depth..).collect()
            });
            drop(popped);
        }
    }
}

/// Record a read of `path` (inside the container at `whole`) for the active
/// watcher, if any.
pub(crate) fn track(dep: &Dep, whole: &str, path: &str) {
    let watcher = TRACKING.with(|stack| {
        let stack = stack.borrow();
        stack.last().and_then(|frame| frame.watcher.clone())
    });
    let Some(watcher) = watcher else {
        return;
    };
    dep.add(whole, &watcher);
    dep.add(path, &watcher);
    TRACKING.with(|stack| {
        let mut stack = stack.borrow_mut();
        if let Some(frame) = stack.last_mut() {
            let weak = dep.downgrade();
            frame
                .collected
                .insert((dep.id(), whole.to_string()), weak.clone());
            frame.collected.insert((dep.id(), path.to_string()), weak);
        }
    });
}

/// Run `f` with dependency tracking suspended.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let guard = TrackingGuard::enter(None);
    let result = f();
    drop(guard);
    result
}

/// Returns true while some watcher is collecting dependencies.
#[must_use]
pub fn is_tracking() -> bool {
    TRACKING.with(|stack| {
        stack
            .borrow()
            .last()
            .is_some_and(|frame| frame.watcher.is_some())
    })
}

/// How much of a container result a watcher subscribes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Depth {
    /// Only the paths the expression itself read.
    #[default]
    Value,
    /// Also the result's own members (and length), one level down.
    Members,
    /// Every nested path of the result.
    Deep,
}

/// Behaviour knobs for a watcher.
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub depth: Depth,
    /// Short name used in logs.
    pub label: String,
}

impl WatchOptions {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            depth: Depth::Value,
            label: label.into(),
        }
    }

    #[must_use]
    pub fn with_depth(mut self, depth: Depth) -> Self {
        self.depth = depth;
        self
    }
}

/// What a renderer is asked to apply.
#[derive(Debug)]
pub struct Update<'a> {
    pub value: &'a Value,
    /// Structural copy of the value before the write (`undefined` initially).
    pub old_value: &'a Value,
    pub scope: &'a Scope,
    /// Array-specific details when the triggering write was to an array.
    pub mutation: Option<&'a ArrayMutation>,
    /// True for the first render after compilation.
    pub initial: bool,
}

/// Applies a watcher's value to the outside world.
pub trait Render {
    fn render(&mut self, update: &Update<'_>) -> Result<(), BindError>;

    /// Release anything the renderer created (nested bindings, listeners).
    fn teardown(&mut self) {}
}

impl<F> Render for F
where
    F: FnMut(&Update<'_>) -> Result<(), BindError>,
{
    fn render(&mut self, update: &Update<'_>) -> Result<(), BindError> {
        self(update)
    }
}

/// Extra passes a watcher makes for notifications that arrived mid-run.
pub const MAX_DEFERRED_RUNS: usize = 16;

#[derive(Default)]
struct WatchState {
    value: Value,
    old_value: Value,
    deps: DepSet,
    torn_down: bool,
    /// Notification received while busy; the inner option is its array
    /// mutation, collapsed to a splice when several arrive.
    deferred: Option<Option<ArrayMutation>>,
}

/// One binding: expression, scope, renderer, and live subscriptions.
pub struct Watcher {
    id: WatcherId,
    expression: Expression,
    scope: Scope,
    options: WatchOptions,
    this: Weak<Watcher>,
    state: RefCell<WatchState>,
    renderer: RefCell<Box<dyn Render>>,
}

impl Watcher {
    /// Create a watcher. Nothing is evaluated until [`Self::get`] or
    /// [`Self::render_initial`].
    pub fn new(
        expression: Expression,
        scope: Scope,
        options: WatchOptions,
        renderer: impl Render + 'static,
    ) -> Rc<Self> {
        let id = NEXT_WATCHER_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            WatcherId(id)
        });
        Rc::new_cyclic(|this| Self {
            id,
            expression,
            scope,
            options,
            this: this.clone(),
            state: RefCell::new(WatchState::default()),
            renderer: RefCell::new(Box::new(renderer)),
        })
    }

    #[must_use]
    pub fn id(&self) -> WatcherId {
        self.id
    }

    #[must_use]
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.options.label
    }

    /// Last evaluated value.
    #[must_use]
    pub fn value(&self) -> Value {
        self.state.borrow().value.clone()
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.state.borrow().torn_down
    }

    /// Evaluate with tracking, reconcile subscriptions, store the value.
    pub fn get(&self) -> Result<Value, BindError> {
        let guard = TrackingGuard::enter(self.this.upgrade());
        let result = self.expression.evaluate(&self.scope);
        if let Ok(value) = &result {
            match self.options.depth {
                Depth::Value => {}
                Depth::Members => touch_members(value),
                Depth::Deep => touch_deep(value, &mut FxHashSet::default()),
            }
        }
        let collected = guard.finish();
        self.reconcile(collected);
        let value = result?;
        self.state.borrow_mut().value = value.clone();
        Ok(value)
    }

    fn reconcile(&self, next: DepSet) {
        let stale: Vec<(DepKey, WeakDep)> = {
            let mut state = self.state.borrow_mut();
            if state.torn_down {
                // Late evaluation after teardown must not resubscribe.
                let mut all = std::mem::take(&mut state.deps);
                all.extend(next);
                all.into_iter().collect()
            } else {
                let previous = std::mem::replace(&mut state.deps, next);
                previous
                    .into_iter()
                    .filter(|(key, _)| !state.deps.contains_key(key))
                    .collect()
            }
        };
        if !stale.is_empty() {
            tracing::trace!(
                watcher = self.label(),
                dropped = stale.len(),
                "reconciled dependencies"
            );
        }
        for ((_, path), weak) in stale {
            if let Some(dep) = weak.upgrade() {
                dep.remove(&path, self.id);
            }
        }
    }

    /// Evaluate and render for the first time.
    pub fn render_initial(&self) -> Result<(), BindError> {
        let Ok(mut renderer) = self.renderer.try_borrow_mut() else {
            return Ok(());
        };
        let value = self.get()?;
        let update = Update {
            value: &value,
            old_value: &Value::Undefined,
            scope: &self.scope,
            mutation: None,
            initial: true,
        };
        untracked(|| renderer.render(&update))?;
        self.flush_deferred(&mut **renderer)
    }

    /// Snapshot the current value ahead of a write.
    pub fn before_update(&self) {
        let mut state = self.state.borrow_mut();
        if !state.torn_down {
            state.old_value = state.value.snapshot();
        }
    }

    /// Re-evaluate and re-render after a write.
    pub fn update(&self, mutation: Option<&ArrayMutation>) -> Result<(), BindError> {
        if self.is_torn_down() {
            return Ok(());
        }
        let Ok(mut renderer) = self.renderer.try_borrow_mut() else {
            self.defer(mutation);
            return Ok(());
        };
        self.run(&mut **renderer, mutation)?;
        self.flush_deferred(&mut **renderer)
    }

    fn run(
        &self,
        renderer: &mut dyn Render,
        mutation: Option<&ArrayMutation>,
    ) -> Result<(), BindError> {
        let value = self.get()?;
        let old_value = std::mem::take(&mut self.state.borrow_mut().old_value);
        let update = Update {
            value: &value,
            old_value: &old_value,
            scope: &self.scope,
            mutation,
            initial: false,
        };
        untracked(|| renderer.render(&update))
    }

    fn defer(&self, mutation: Option<&ArrayMutation>) {
        tracing::debug!(watcher = self.label(), "deferring re-entrant update");
        let mut state = self.state.borrow_mut();
        let merged = match (state.deferred.take(), mutation) {
            (None, mutation) => mutation.cloned(),
            (Some(None), None) => None,
            (Some(_), Some(next)) => Some(ArrayMutation {
                array: next.array.clone(),
                change: ArrayChange::Splice,
            }),
            (Some(Some(earlier)), None) => Some(ArrayMutation {
                array: earlier.array,
                change: ArrayChange::Splice,
            }),
        };
        state.deferred = Some(merged);
    }

    /// Re-run for notifications deferred while `renderer` was busy.
    fn flush_deferred(&self, renderer: &mut dyn Render) -> Result<(), BindError> {
        for _ in 0..MAX_DEFERRED_RUNS {
            let pending = {
                let mut state = self.state.borrow_mut();
                if state.torn_down {
                    state.deferred = None;
                }
                state.deferred.take()
            };
            let Some(mutation) = pending else {
                return Ok(());
            };
            self.run(renderer, mutation.as_ref())?;
        }
        if self.state.borrow_mut().deferred.take().is_some() {
            tracing::warn!(watcher = self.label(), "re-entrant updates did not settle");
        }
        Ok(())
    }

    /// Write `value` through the expression (two-way bindings).
    pub fn set(&self, value: Value) -> Result<(), BindError> {
        untracked(|| self.expression.assign(&self.scope, value))
    }

    /// Currently subscribed paths, sorted and deduplicated.
    #[must_use]
    pub fn dependency_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .state
            .borrow()
            .deps
            .keys()
            .map(|(_, path)| path.clone())
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// Release every subscription; the watcher never renders again.
    pub fn teardown(&self) {
        let deps = {
            let mut state = self.state.borrow_mut();
            state.torn_down = true;
            state.old_value = Value::Undefined;
            std::mem::take(&mut state.deps)
        };
        for ((_, path), weak) in deps {
            if let Some(dep) = weak.upgrade() {
                dep.remove(&path, self.id);
            }
        }
        if let Ok(mut renderer) = self.renderer.try_borrow_mut() {
            renderer.teardown();
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        let deps = std::mem::take(&mut self.state.get_mut().deps);
        for ((_, path), weak) in deps {
            if let Some(dep) = weak.upgrade() {
                dep.remove(&path, self.id);
            }
        }
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.id)
            .field("label", &self.options.label)
            .field("expression", &self.expression.source())
            .field("depth", &self.options.depth)
            .finish_non_exhaustive()
    }
}

/// Read each member once so structural writes reach the watcher.
fn touch_members(value: &Value) {
    match value {
        Value::Object(o) => {
            for key in o.keys() {
                let _ = o.get(&key);
            }
        }
        Value::Array(a) => {
            for i in 0..a.len() {
                let _ = a.get(i);
            }
        }
        _ => {}
    }
}

/// Read every nested key so a deep watcher depends on the whole shape.
fn touch_deep(value: &Value, visited: &mut FxHashSet<usize>) {
    match value {
        Value::Object(o) => {
            if !visited.insert(o.addr()) {
                return;
            }
            for key in o.keys() {
                touch_deep(&o.get(&key), visited);
            }
        }
        Value::Array(a) => {
            if !visited.insert(a.addr()) {
                return;
            }
            for i in 0..a.len() {
                touch_deep(&a.get(i), visited);
            }
        }
        _ => {}
    }
}
