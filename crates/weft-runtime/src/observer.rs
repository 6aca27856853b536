#![forbid(unsafe_code)]

//! Observed containers: the read/write interception layer.
//!
//! # Design
//!
//! [`Object`] and [`Array`] are shared handles over `Rc<RefCell<..>>`. A
//! container starts out plain; [`observe`] attaches an observer (a path plus
//! a [`Dep`] registry) to it and, recursively, to every container reachable
//! from it. From then on:
//!
//! - **Reads** ([`Object::get`], [`Array::get`], [`Array::len`]) register
//!   the active watcher on both the container's own path and `path.key`.
//! - **Writes** ([`Object::set`], [`Array::set`], [`Array::set_len`], and the
//!   bulk mutators) run the write protocol:
//!   1. strict-equal writes are dropped;
//!   2. a previously absent member inherits the container's whole-path
//!      subscribers;
//!   3. dependents snapshot their old value (`notify_before`);
//!   4. the new value is observed and stored;
//!   5. dependents re-run (`notify`), array writes carrying an
//!      [`ArrayMutation`].
//!
//! `peek*` accessors bypass tracking for housekeeping reads.
//!
//! # Invariants
//!
//! 1. A container is observed at most once; observing again returns the
//!    same handle.
//! 2. Every container stored into an observed container is observed before
//!    dependents are notified.
//! 3. No container borrow is held while dependents run.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::dep::Dep;
use crate::error::{BindError, EvalError};
use crate::value::Value;
use crate::watcher;

/// Path suffix under which array length changes are published.
pub const LENGTH_KEY: &str = "length";

/// Largest array length a write may produce.
pub const MAX_ARRAY_LEN: usize = u32::MAX as usize;

/// Join a container path and a member key.
#[must_use]
pub fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

#[derive(Clone)]
struct Observer {
    path: String,
    dep: Dep,
}

/// What happened to an array, delivered to dependents of the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayChange {
    /// `array[index] = value`.
    Index(usize),
    /// `array.length = len`.
    Length(usize),
    /// Any other reshaping (insert, remove, bulk replace).
    Splice,
}

/// Array-specific notification arguments.
#[derive(Debug, Clone)]
pub struct ArrayMutation {
    /// The array the write landed on.
    pub array: Array,
    pub change: ArrayChange,
}

/// Wrap `value` for observation under `path`.
///
/// Primitives come back unchanged. Containers are marked observed (with
/// all their descendants) and returned as the same handle.
pub fn observe(value: Value, path: &str) -> Value {
    match &value {
        Value::Object(o) => o.observe_at(path),
        Value::Array(a) => a.observe_at(path),
        _ => {}
    }
    value
}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ObjectInner {
    entries: IndexMap<String, Value>,
    observer: Option<Observer>,
}

/// A string-keyed container preserving insertion order.
#[derive(Clone, Default)]
pub struct Object {
    inner: Rc<RefCell<ObjectInner>>,
}

impl Object {
    /// An empty, unobserved object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    #[must_use]
    pub fn is_observed(&self) -> bool {
        self.inner.borrow().observer.is_some()
    }

    /// Observation path, if observed.
    #[must_use]
    pub fn path(&self) -> Option<String> {
        self.inner.borrow().observer.as_ref().map(|o| o.path.clone())
    }

    /// Registry, if observed.
    #[must_use]
    pub fn dep(&self) -> Option<Dep> {
        self.inner.borrow().observer.as_ref().map(|o| o.dep.clone())
    }

    fn observer(&self) -> Option<Observer> {
        self.inner.borrow().observer.clone()
    }

    fn observe_at(&self, path: &str) {
        let entries = {
            let mut inner = self.inner.borrow_mut();
            if inner.observer.is_some() {
                return;
            }
            inner.observer = Some(Observer {
                path: path.to_string(),
                dep: Dep::new(),
            });
            std::mem::take(&mut inner.entries)
        };
        let observed = entries
            .into_iter()
            .map(|(k, v)| {
                let child = observe(v, &child_path(path, &k));
                (k, child)
            })
            .collect();
        self.inner.borrow_mut().entries = observed;
    }

    fn track(&self, key: &str) {
        if let Some(obs) = self.observer() {
            watcher::track(&obs.dep, &obs.path, &child_path(&obs.path, key));
        }
    }

    /// Tracked read. Missing keys read as `undefined` (and are still tracked,
    /// so a later insertion re-runs the reader).
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        self.track(key);
        self.peek(key).unwrap_or_default()
    }

    /// Untracked read.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.inner.borrow().entries.get(key).cloned()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.borrow().entries.contains_key(key)
    }

    /// Keys in insertion order (untracked).
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().entries.keys().cloned().collect()
    }

    /// Entries in insertion order (untracked).
    #[must_use]
    pub fn peek_entries(&self) -> Vec<(String, Value)> {
        self.inner
            .borrow()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store without observing or notifying. For building plain data.
    pub fn insert_raw(&self, key: String, value: Value) {
        self.inner.borrow_mut().entries.insert(key, value);
    }

    /// Write `key`, notifying dependents when the object is observed.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<(), BindError> {
        let value = value.into();
        let old = self.peek(key);
        if old.as_ref().unwrap_or(&Value::Undefined).same(&value) {
            return Ok(());
        }
        let Some(obs) = self.observer() else {
            self.insert_raw(key.to_string(), value);
            return Ok(());
        };
        let path = child_path(&obs.path, key);
        if old.is_none_or(|v| matches!(v, Value::Undefined)) {
            obs.dep.inherit(&obs.path, &path);
        }
        obs.dep.notify_before(&path);
        let stored = observe(value, &path);
        self.insert_raw(key.to_string(), stored);
        tracing::debug!(path = %path, "object write");
        obs.dep.notify(&path, None)
    }

    /// Remove `key`, notifying its dependents as a write of `undefined`.
    pub fn delete(&self, key: &str) -> Result<(), BindError> {
        if !self.contains_key(key) {
            return Ok(());
        }
        let Some(obs) = self.observer() else {
            self.inner.borrow_mut().entries.shift_remove(key);
            return Ok(());
        };
        let path = child_path(&obs.path, key);
        obs.dep.notify_before(&path);
        self.inner.borrow_mut().entries.shift_remove(key);
        obs.dep.notify(&path, None)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = match self.inner.try_borrow() {
            Ok(inner) => inner,
            Err(_) => return f.write_str("{<borrowed>}"),
        };
        let mut map = f.debug_map();
        for (k, v) in &inner.entries {
            match v {
                // Avoid recursing into cycles.
                Value::Object(_) | Value::Array(_) => map.entry(k, &v.type_name()),
                _ => map.entry(k, v),
            };
        }
        map.finish()
    }
}

// ---------------------------------------------------------------------------
// Array
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ArrayInner {
    items: Vec<Value>,
    observer: Option<Observer>,
}

/// An index-addressed container.
#[derive(Clone, Default)]
pub struct Array {
    inner: Rc<RefCell<ArrayInner>>,
}

impl Array {
    /// An empty, unobserved array.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ArrayInner {
                items,
                observer: None,
            })),
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    #[must_use]
    pub fn is_observed(&self) -> bool {
        self.inner.borrow().observer.is_some()
    }

    #[must_use]
    pub fn path(&self) -> Option<String> {
        self.inner.borrow().observer.as_ref().map(|o| o.path.clone())
    }

    #[must_use]
    pub fn dep(&self) -> Option<Dep> {
        self.inner.borrow().observer.as_ref().map(|o| o.dep.clone())
    }

    fn observer(&self) -> Option<Observer> {
        self.inner.borrow().observer.clone()
    }

    fn observe_at(&self, path: &str) {
        let items = {
            let mut inner = self.inner.borrow_mut();
            if inner.observer.is_some() {
                return;
            }
            inner.observer = Some(Observer {
                path: path.to_string(),
                dep: Dep::new(),
            });
            std::mem::take(&mut inner.items)
        };
        let observed = items
            .into_iter()
            .enumerate()
            .map(|(i, v)| observe(v, &child_path(path, &i.to_string())))
            .collect();
        self.inner.borrow_mut().items = observed;
    }

    fn track(&self, key: &str) {
        if let Some(obs) = self.observer() {
            watcher::track(&obs.dep, &obs.path, &child_path(&obs.path, key));
        }
    }

    /// Tracked element read. Out of range reads `undefined`.
    #[must_use]
    pub fn get(&self, index: usize) -> Value {
        self.track(&index.to_string());
        self.peek(index).unwrap_or_default()
    }

    /// Tracked length read.
    #[must_use]
    pub fn len(&self) -> usize {
        self.track(LENGTH_KEY);
        self.peek_len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn peek(&self, index: usize) -> Option<Value> {
        self.inner.borrow().items.get(index).cloned()
    }

    #[must_use]
    pub fn peek_len(&self) -> usize {
        self.inner.borrow().items.len()
    }

    /// Copy of the elements (untracked).
    #[must_use]
    pub fn peek_items(&self) -> Vec<Value> {
        self.inner.borrow().items.clone()
    }

    /// Append without observing or notifying. For building plain data.
    pub fn push_raw(&self, value: Value) {
        self.inner.borrow_mut().items.push(value);
    }

    /// `array[index] = value`. Writing past the end pads with `undefined`.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<(), BindError> {
        let Some(min_len) = index.checked_add(1).filter(|n| *n <= MAX_ARRAY_LEN) else {
            return Err(EvalError::InvalidIndex(index.to_string()).into());
        };
        let value = value.into();
        let old = self.peek(index);
        if old.as_ref().unwrap_or(&Value::Undefined).same(&value) {
            return Ok(());
        }
        let Some(obs) = self.observer() else {
            let mut inner = self.inner.borrow_mut();
            if index >= inner.items.len() {
                inner.items.resize(min_len, Value::Undefined);
            }
            inner.items[index] = value;
            return Ok(());
        };
        let path = child_path(&obs.path, &index.to_string());
        if old.is_none_or(|v| matches!(v, Value::Undefined)) {
            obs.dep.inherit(&obs.path, &path);
        }
        obs.dep.notify_before(&path);
        let stored = observe(value, &path);
        {
            let mut inner = self.inner.borrow_mut();
            if index >= inner.items.len() {
                inner.items.resize(min_len, Value::Undefined);
            }
            inner.items[index] = stored;
        }
        tracing::debug!(path = %path, "array index write");
        let mutation = ArrayMutation {
            array: self.clone(),
            change: ArrayChange::Index(index),
        };
        obs.dep.notify(&path, Some(&mutation))
    }

    /// `array.length = len`: truncate or pad with `undefined`.
    pub fn set_len(&self, len: usize) -> Result<(), BindError> {
        if len > MAX_ARRAY_LEN {
            return Err(EvalError::InvalidIndex(len.to_string()).into());
        }
        if self.peek_len() == len {
            return Ok(());
        }
        let Some(obs) = self.observer() else {
            self.inner.borrow_mut().items.resize(len, Value::Undefined);
            return Ok(());
        };
        let path = child_path(&obs.path, LENGTH_KEY);
        obs.dep.notify_before(&path);
        self.inner.borrow_mut().items.resize(len, Value::Undefined);
        tracing::debug!(path = %path, len, "array length write");
        let mutation = ArrayMutation {
            array: self.clone(),
            change: ArrayChange::Length(len),
        };
        obs.dep.notify(&path, Some(&mutation))
    }

    /// Append one element (an index write at the end).
    pub fn push(&self, value: impl Into<Value>) -> Result<(), BindError> {
        self.set(self.peek_len(), value)
    }

    /// Remove and return the last element (a length write).
    pub fn pop(&self) -> Result<Option<Value>, BindError> {
        let len = self.peek_len();
        if len == 0 {
            return Ok(None);
        }
        let last = self.peek(len - 1);
        self.set_len(len - 1)?;
        Ok(last)
    }

    /// Insert at `index` (clamped to the length), shifting later elements.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<(), BindError> {
        let value = value.into();
        self.splice_with(|items| {
            let at = index.min(items.len());
            items.insert(at, value);
        })
    }

    /// Remove the element at `index`, shifting later elements down.
    pub fn remove(&self, index: usize) -> Result<Option<Value>, BindError> {
        if index >= self.peek_len() {
            return Ok(None);
        }
        let mut removed = None;
        self.splice_with(|items| removed = Some(items.remove(index)))?;
        Ok(removed)
    }

    /// Replace every element at once.
    pub fn replace_all(&self, values: Vec<Value>) -> Result<(), BindError> {
        self.splice_with(|items| *items = values)
    }

    /// Reshape the array in place and publish it as a whole-array change.
    fn splice_with(&self, edit: impl FnOnce(&mut Vec<Value>)) -> Result<(), BindError> {
        let Some(obs) = self.observer() else {
            edit(&mut self.inner.borrow_mut().items);
            return Ok(());
        };
        obs.dep.notify_before(&obs.path);
        let mut items = std::mem::take(&mut self.inner.borrow_mut().items);
        edit(&mut items);
        let items = items
            .into_iter()
            .enumerate()
            .map(|(i, v)| observe(v, &child_path(&obs.path, &i.to_string())))
            .collect();
        self.inner.borrow_mut().items = items;
        tracing::debug!(path = %obs.path, "array splice");
        let mutation = ArrayMutation {
            array: self.clone(),
            change: ArrayChange::Splice,
        };
        obs.dep.notify(&obs.path, Some(&mutation))
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = match self.inner.try_borrow() {
            Ok(inner) => inner,
            Err(_) => return f.write_str("[<borrowed>]"),
        };
        let mut list = f.debug_list();
        for v in &inner.items {
            match v {
                Value::Object(_) | Value::Array(_) => list.entry(&v.type_name()),
                _ => list.entry(v),
            };
        }
        list.finish()
    }
}
