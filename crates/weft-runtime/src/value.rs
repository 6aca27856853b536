#![forbid(unsafe_code)]

//! Dynamic values flowing through the model and expressions.
//!
//! # Design
//!
//! [`Value`] mirrors the loose value model templates are written against:
//! primitives plus two shared container kinds. Containers are handles
//! ([`Object`], [`Array`]); cloning a `Value` that holds one aliases the same
//! container, exactly like assigning a reference.
//!
//! Coercions (`truthy`, `to_number`, `to_js_string`, the equality operators)
//! follow the scripting conventions template authors expect, so
//! `"" + 1 + 2 == "12"` and `null == undefined`.
//!
//! # Invariants
//!
//! 1. [`Value::same`] is strict equality: containers compare by identity,
//!    `NaN` is never the same as itself.
//! 2. [`Value::snapshot`] never records dependencies and never shares
//!    containers with its source.

use std::fmt;

use rustc_hash::FxHashSet;

use crate::observer::{Array, Object};

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Object(Object),
    Array(Array),
}

impl Value {
    /// Short type name used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
        }
    }

    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Truthiness: `undefined`, `null`, `false`, `0`, `NaN`, and `""` are falsy.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::Object(_) | Self::Array(_) => true,
        }
    }

    /// Numeric coercion.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined | Self::Object(_) => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::Str(s) => str_to_number(s),
            Self::Array(a) => match a.peek_len() {
                0 => 0.0,
                1 => a.peek(0).map_or(f64::NAN, |v| v.to_number()),
                _ => f64::NAN,
            },
        }
    }

    /// String coercion (`undefined` becomes `"undefined"`).
    #[must_use]
    pub fn to_js_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Str(s) => s.clone(),
            Self::Object(_) => "[object Object]".to_string(),
            Self::Array(a) => a
                .peek_items()
                .iter()
                .map(|v| {
                    if v.is_nullish() {
                        String::new()
                    } else {
                        v.to_js_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Text shown by text bindings: like [`Self::to_js_string`] but
    /// `undefined` and `null` render as nothing.
    #[must_use]
    pub fn display_string(&self) -> String {
        if self.is_nullish() {
            String::new()
        } else {
            self.to_js_string()
        }
    }

    /// Strict equality (`===`).
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Loose equality (`==`).
    #[must_use]
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Self::Object(_) | Self::Array(_), Self::Object(_) | Self::Array(_)) => {
                self.same(other)
            }
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(_) | Self::Array(_), _) => {
                Self::Str(self.to_js_string()).loose_eq(other)
            }
            (_, Self::Object(_) | Self::Array(_)) => {
                self.loose_eq(&Self::Str(other.to_js_string()))
            }
            _ => self.to_number() == other.to_number(),
        }
    }

    /// Structural deep copy with fresh, unobserved containers.
    ///
    /// Reads go around dependency tracking. Reference cycles are cut: a
    /// container reached again through its own descendants copies as `null`.
    #[must_use]
    pub fn snapshot(&self) -> Self {
        let mut ancestors = FxHashSet::default();
        self.snapshot_inner(&mut ancestors)
    }

    fn snapshot_inner(&self, ancestors: &mut FxHashSet<usize>) -> Self {
        match self {
            Self::Object(o) => {
                if !ancestors.insert(o.addr()) {
                    return Self::Null;
                }
                let copy = Object::new();
                for (k, v) in o.peek_entries() {
                    copy.insert_raw(k, v.snapshot_inner(ancestors));
                }
                ancestors.remove(&o.addr());
                Self::Object(copy)
            }
            Self::Array(a) => {
                if !ancestors.insert(a.addr()) {
                    return Self::Null;
                }
                let items = a
                    .peek_items()
                    .iter()
                    .map(|v| v.snapshot_inner(ancestors))
                    .collect();
                ancestors.remove(&a.addr());
                Self::Array(Array::from_vec(items))
            }
            other => other.clone(),
        }
    }

    /// Build a value tree from JSON. Containers come out unobserved.
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::Str(s),
            serde_json::Value::Array(items) => {
                Self::Array(Array::from_vec(items.into_iter().map(Self::from_json).collect()))
            }
            serde_json::Value::Object(map) => {
                let obj = Object::new();
                for (k, v) in map {
                    obj.insert_raw(k, Self::from_json(v));
                }
                Self::Object(obj)
            }
        }
    }

    /// Export as JSON without recording dependencies. `undefined` and
    /// non-finite numbers export as `null`; cycles are cut as in
    /// [`Self::snapshot`].
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self.snapshot() {
            Self::Undefined | Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(b),
            Self::Number(n) => number_to_json(n),
            Self::Str(s) => serde_json::Value::String(s),
            Self::Array(a) => {
                serde_json::Value::Array(a.peek_items().iter().map(Self::to_json).collect())
            }
            Self::Object(o) => serde_json::Value::Object(
                o.peek_entries()
                    .into_iter()
                    .map(|(k, v)| (k, v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Integral numbers export as JSON integers so `1` round-trips as `1`.
fn number_to_json(n: f64) -> serde_json::Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.abs() < MAX_SAFE {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

fn str_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    match t {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust accepts "inf"/"nan" spellings that scripts do not.
        _ if t.chars().any(|c| c.is_ascii_alphabetic() && !matches!(c, 'e' | 'E')) => f64::NAN,
        _ => t.parse().unwrap_or(f64::NAN),
    }
}

/// Format a number the way scripts print it (`3`, `0.5`, `NaN`, `Infinity`).
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Object(o) => o.fmt(f),
            Self::Array(a) => a.fmt(f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_js_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Self::Object(o)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Self::Array(a)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(Array::from_vec(items))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Self::from_json(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        for falsy in [
            Value::Undefined,
            Value::Null,
            false.into(),
            0.into(),
            f64::NAN.into(),
            "".into(),
        ] {
            assert!(!falsy.truthy(), "{falsy:?}");
        }
        for truthy in [
            Value::from(true),
            1.into(),
            "0".into(),
            Value::from(json!({})),
            Value::from(json!([])),
        ] {
            assert!(truthy.truthy(), "{truthy:?}");
        }
    }

    #[test]
    fn number_coercion() {
        assert_eq!(Value::from(" 42 ").to_number(), 42.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert_eq!(Value::from("0x1f").to_number(), 31.0);
        assert_eq!(Value::from("1e3").to_number(), 1000.0);
        assert!(Value::from("inf").to_number().is_nan());
        assert!(Value::from("12px").to_number().is_nan());
        assert_eq!(Value::Null.to_number(), 0.0);
        assert_eq!(Value::from(json!([7])).to_number(), 7.0);
    }

    #[test]
    fn string_coercion() {
        assert_eq!(Value::from(3.0).to_js_string(), "3");
        assert_eq!(Value::from(-0.0).to_js_string(), "0");
        assert_eq!(Value::from(0.5).to_js_string(), "0.5");
        assert_eq!(Value::from(f64::INFINITY).to_js_string(), "Infinity");
        assert_eq!(Value::from(json!([1, null, "a"])).to_js_string(), "1,,a");
        assert_eq!(Value::from(json!({"a": 1})).to_js_string(), "[object Object]");
        assert_eq!(Value::Undefined.display_string(), "");
    }

    #[test]
    fn equality() {
        let obj = Value::from(json!({"a": 1}));
        assert!(obj.same(&obj.clone()));
        assert!(!obj.same(&Value::from(json!({"a": 1}))));
        assert!(!Value::from(f64::NAN).same(&f64::NAN.into()));
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(!Value::Null.loose_eq(&0.into()));
        assert!(Value::from("1").loose_eq(&1.into()));
        assert!(Value::from(true).loose_eq(&1.into()));
        assert!(Value::from(json!([2])).loose_eq(&"2".into()));
    }

    #[test]
    fn snapshot_detaches_containers() {
        let original = Value::from(json!({"list": [1, 2], "n": {"x": true}}));
        let copy = original.snapshot();
        let list = original.as_object().unwrap().peek("list").unwrap();
        list.as_array().unwrap().push_raw(3.into());
        assert_eq!(copy.to_json(), json!({"list": [1, 2], "n": {"x": true}}));
        assert_eq!(
            original.to_json(),
            json!({"list": [1, 2, 3], "n": {"x": true}})
        );
    }

    #[test]
    fn snapshot_cuts_cycles() {
        let obj = Object::new();
        obj.insert_raw("me".to_string(), Value::Object(obj.clone()));
        assert_eq!(Value::Object(obj).to_json(), json!({"me": null}));
    }

    #[test]
    fn json_round_trip_preserves_key_order() {
        let src = json!({"z": 1, "a": [true, null, "s"], "m": {"k": 1.5}});
        assert_eq!(Value::from_json(src.clone()).to_json(), src);
    }
}
