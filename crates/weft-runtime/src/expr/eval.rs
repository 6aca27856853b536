#![forbid(unsafe_code)]

//! Tree-walking evaluation against a [`Scope`].

use std::cmp::Ordering;

use super::ast::{BinaryOp, Expr, Literal, Part, UnaryOp};
use crate::error::{BindError, EvalError};
use crate::observer::{Array, LENGTH_KEY, MAX_ARRAY_LEN, Object};
use crate::scope::Scope;
use crate::value::{Value, format_number};

pub(crate) fn evaluate(expr: &Expr, scope: &Scope) -> Result<Value, BindError> {
    match expr {
        Expr::Literal(lit) => Ok(literal(lit)),
        Expr::Ident(name) => Ok(scope.lookup(name)),
        Expr::Member { object, property } => {
            let base = evaluate(object, scope)?;
            read_property(&base, property)
        }
        Expr::Index { object, index } => {
            let base = evaluate(object, scope)?;
            let key = property_key(&evaluate(index, scope)?);
            read_property(&base, &key)
        }
        Expr::Call { method, args } => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            scope.call(method, &args)
        }
        Expr::Unary { op, operand } => {
            let v = evaluate(operand, scope)?;
            Ok(match op {
                UnaryOp::Not => Value::Bool(!v.truthy()),
                UnaryOp::Neg => Value::Number(-v.to_number()),
                UnaryOp::Plus => Value::Number(v.to_number()),
            })
        }
        Expr::Binary { op, left, right } => {
            let l = evaluate(left, scope)?;
            match op {
                BinaryOp::And if !l.truthy() => Ok(l),
                BinaryOp::Or if l.truthy() => Ok(l),
                BinaryOp::And | BinaryOp::Or => evaluate(right, scope),
                _ => Ok(binary(*op, &l, &evaluate(right, scope)?)),
            }
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if evaluate(test, scope)?.truthy() {
                evaluate(consequent, scope)
            } else {
                evaluate(alternate, scope)
            }
        }
        Expr::Object(entries) => {
            let obj = Object::new();
            for (key, value) in entries {
                obj.insert_raw(key.clone(), evaluate(value, scope)?);
            }
            Ok(Value::Object(obj))
        }
        Expr::Array(items) => {
            let arr = Array::new();
            for item in items {
                arr.push_raw(evaluate(item, scope)?);
            }
            Ok(Value::Array(arr))
        }
        Expr::Assign { target, value } => {
            let v = evaluate(value, scope)?;
            assign(target, scope, v.clone())?;
            Ok(v)
        }
        Expr::Interpolation(parts) => {
            let mut out = String::new();
            for part in parts {
                match part {
                    Part::Text(text) => out.push_str(text),
                    Part::Expr(e) => out.push_str(&evaluate(e, scope)?.display_string()),
                }
            }
            Ok(Value::Str(out))
        }
    }
}

pub(crate) fn assign(target: &Expr, scope: &Scope, value: Value) -> Result<(), BindError> {
    match target {
        Expr::Ident(name) => scope.assign(name, value),
        Expr::Member { object, property } => {
            let base = evaluate(object, scope)?;
            write_property(&base, property, value)
        }
        Expr::Index { object, index } => {
            let base = evaluate(object, scope)?;
            let key = property_key(&evaluate(index, scope)?);
            write_property(&base, &key, value)
        }
        Expr::Assign { target, .. } => assign(target, scope, value),
        other => Err(EvalError::NotAssignable(describe(other).to_string()).into()),
    }
}

fn literal(lit: &Literal) -> Value {
    match lit {
        Literal::Undefined => Value::Undefined,
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Number(n) => Value::Number(*n),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}

fn describe(expr: &Expr) -> &'static str {
    match expr {
        Expr::Literal(_) => "a literal",
        Expr::Call { .. } => "a method call",
        Expr::Unary { .. } | Expr::Binary { .. } => "an operator expression",
        Expr::Conditional { .. } => "a conditional expression",
        Expr::Object(_) | Expr::Array(_) => "a container literal",
        Expr::Interpolation(_) => "interpolated text",
        Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. } | Expr::Assign { .. } => {
            "this expression"
        }
    }
}

fn property_key(key: &Value) -> String {
    match key {
        Value::Number(n) => format_number(*n),
        other => other.to_js_string(),
    }
}

fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse().ok()
}

fn read_property(base: &Value, key: &str) -> Result<Value, BindError> {
    match base {
        Value::Undefined | Value::Null => Err(EvalError::NullAccess {
            property: key.to_string(),
            base: base.type_name(),
        }
        .into()),
        Value::Object(o) => Ok(o.get(key)),
        Value::Array(a) if key == LENGTH_KEY => Ok(Value::from(a.len())),
        Value::Array(a) => Ok(array_index(key).map_or(Value::Undefined, |i| a.get(i))),
        Value::Str(s) if key == LENGTH_KEY => Ok(Value::from(s.chars().count())),
        Value::Str(s) => Ok(array_index(key)
            .and_then(|i| s.chars().nth(i))
            .map_or(Value::Undefined, |c| Value::Str(c.to_string()))),
        Value::Bool(_) | Value::Number(_) => Ok(Value::Undefined),
    }
}

fn write_property(base: &Value, key: &str, value: Value) -> Result<(), BindError> {
    match base {
        Value::Undefined | Value::Null => Err(EvalError::NullAccess {
            property: key.to_string(),
            base: base.type_name(),
        }
        .into()),
        Value::Object(o) => o.set(key, value),
        Value::Array(a) if key == LENGTH_KEY => {
            let n = value.to_number();
            if n < 0.0 || n.fract() != 0.0 || !n.is_finite() || n > MAX_ARRAY_LEN as f64 {
                return Err(EvalError::InvalidIndex(format_number(n)).into());
            }
            a.set_len(n as usize)
        }
        Value::Array(a) => match array_index(key) {
            Some(i) => a.set(i, value),
            None => Err(EvalError::InvalidIndex(key.to_string()).into()),
        },
        Value::Bool(_) | Value::Number(_) | Value::Str(_) => Err(EvalError::NotAssignable(
            format!("property `{key}` of a {}", base.type_name()),
        )
        .into()),
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
    match op {
        BinaryOp::Add => add(l, r),
        BinaryOp::Sub => Value::Number(l.to_number() - r.to_number()),
        BinaryOp::Mul => Value::Number(l.to_number() * r.to_number()),
        BinaryOp::Div => Value::Number(l.to_number() / r.to_number()),
        BinaryOp::Rem => Value::Number(l.to_number() % r.to_number()),
        BinaryOp::Lt => Value::Bool(compare(l, r) == Some(Ordering::Less)),
        BinaryOp::Le => Value::Bool(matches!(
            compare(l, r),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(compare(l, r) == Some(Ordering::Greater)),
        BinaryOp::Ge => Value::Bool(matches!(
            compare(l, r),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Eq => Value::Bool(l.loose_eq(r)),
        BinaryOp::Ne => Value::Bool(!l.loose_eq(r)),
        BinaryOp::StrictEq => Value::Bool(l.same(r)),
        BinaryOp::StrictNe => Value::Bool(!l.same(r)),
        // Short-circuit forms are handled before operands are combined.
        BinaryOp::And | BinaryOp::Or => Value::Undefined,
    }
}

fn is_stringy(v: &Value) -> bool {
    matches!(v, Value::Str(_) | Value::Object(_) | Value::Array(_))
}

fn add(l: &Value, r: &Value) -> Value {
    if is_stringy(l) || is_stringy(r) {
        let mut s = l.to_js_string();
        s.push_str(&r.to_js_string());
        Value::Str(s)
    } else {
        Value::Number(l.to_number() + r.to_number())
    }
}

fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    if is_stringy(l) && is_stringy(r) {
        return Some(l.to_js_string().cmp(&r.to_js_string()));
    }
    l.to_number().partial_cmp(&r.to_number())
}
