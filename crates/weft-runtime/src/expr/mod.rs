#![forbid(unsafe_code)]

//! Binding expression language.
//!
//! Directive values and mustache text compile once into an [`Expression`],
//! which then evaluates any number of times against a [`Scope`]. Member
//! reads go through the observed containers, so evaluating inside a
//! watcher records exactly the paths the expression touched.
//!
//! ```
//! use weft_runtime::{Expression, Methods, Scope, Value, observe};
//! use serde_json::json;
//!
//! let model = observe(Value::from_json(json!({"a": 2, "b": [1, 2, 3]})), "");
//! let scope = Scope::root(model.as_object().unwrap().clone(), Methods::new());
//! let expr = Expression::parse("a * b.length + 1").unwrap();
//! assert_eq!(expr.evaluate(&scope).unwrap().to_number(), 7.0);
//! ```

mod ast;
mod eval;
mod lexer;
mod parser;

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

pub use ast::{BinaryOp, Expr, Literal, Part, UnaryOp};
pub use parser::RESERVED_WORDS;

use crate::error::{BindError, ParseError};
use crate::scope::Scope;
use crate::value::Value;

/// A compiled expression. Cheap to clone.
#[derive(Clone)]
pub struct Expression {
    source: Rc<str>,
    ast: Rc<Expr>,
}

impl Expression {
    /// Compile `source`.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let ast = parser::parse(source)?;
        Ok(Self {
            source: source.into(),
            ast: Rc::new(ast),
        })
    }

    /// Compile text containing `open ... close` interpolations.
    ///
    /// Returns `Ok(None)` when the text has no complete interpolation. An
    /// opening delimiter without a matching close is kept as literal text.
    pub fn parse_interpolation(
        text: &str,
        open: &str,
        close: &str,
    ) -> Result<Option<Self>, ParseError> {
        if open.is_empty() || close.is_empty() {
            return Ok(None);
        }
        let mut parts: SmallVec<[Part; 3]> = SmallVec::new();
        let mut rest = text;
        let mut found = false;
        while let Some(start) = rest.find(open) {
            let after_open = &rest[start + open.len()..];
            let Some(end) = after_open.find(close) else {
                break;
            };
            if start > 0 {
                parts.push(Part::Text(rest[..start].to_string()));
            }
            parts.push(Part::Expr(Box::new(parser::parse(
                after_open[..end].trim(),
            )?)));
            found = true;
            rest = &after_open[end + close.len()..];
        }
        if !found {
            return Ok(None);
        }
        if !rest.is_empty() {
            parts.push(Part::Text(rest.to_string()));
        }
        Ok(Some(Self {
            source: text.into(),
            ast: Rc::new(Expr::Interpolation(parts)),
        }))
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Whether [`Self::assign`] can succeed structurally.
    #[must_use]
    pub fn is_assignable(&self) -> bool {
        self.ast.is_assignable()
    }

    /// The bare name, when the whole expression is one identifier.
    #[must_use]
    pub fn as_identifier(&self) -> Option<&str> {
        match self.ast.as_ref() {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn evaluate(&self, scope: &Scope) -> Result<Value, BindError> {
        eval::evaluate(&self.ast, scope)
    }

    /// Store `value` at the location the expression names.
    pub fn assign(&self, scope: &Scope, value: Value) -> Result<(), BindError> {
        eval::assign(&self.ast, scope, value)
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expression").field(&self.source).finish()
    }
}

/// Returns true if `name` can be used as a binding alias.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let bytes = name.as_bytes();
    !bytes.is_empty()
        && lexer::is_ident_start(bytes[0])
        && bytes[1..].iter().copied().all(lexer::is_ident_continue)
        && !RESERVED_WORDS.contains(&name)
        && !matches!(name, "true" | "false" | "null" | "undefined")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EvalError, ParseErrorKind};
    use crate::observer::observe;
    use crate::scope::Methods;
    use serde_json::json;

    fn scope(json: serde_json::Value) -> Scope {
        let model = observe(Value::from_json(json), "");
        Scope::root(model.as_object().cloned().unwrap_or_default(), Methods::new())
    }

    fn eval(src: &str, scope: &Scope) -> Value {
        Expression::parse(src).unwrap().evaluate(scope).unwrap()
    }

    #[test]
    fn arithmetic_and_concatenation() {
        let s = scope(json!({"a": 1, "b": "2"}));
        assert_eq!(eval("a + 1", &s).to_number(), 2.0);
        assert_eq!(eval("a + b", &s).to_js_string(), "12");
        assert_eq!(eval("'' + 1 + 2", &s).to_js_string(), "12");
        assert_eq!(eval("b * 3", &s).to_number(), 6.0);
        assert_eq!(eval("7 % 4", &s).to_number(), 3.0);
        assert!(eval("'a' - 1", &s).to_number().is_nan());
    }

    #[test]
    fn comparisons_and_logic() {
        let s = scope(json!({"n": 5, "name": ""}));
        assert!(eval("n > 3 && n <= 5", &s).truthy());
        assert_eq!(eval("name || 'anon'", &s).to_js_string(), "anon");
        assert_eq!(eval("n && 'yes'", &s).to_js_string(), "yes");
        assert!(eval("'b' > 'a'", &s).truthy());
        assert!(eval("n == '5' && n !== '5'", &s).truthy());
        assert_eq!(eval("n > 4 ? 'big' : 'small'", &s).to_js_string(), "big");
    }

    #[test]
    fn member_access_and_length() {
        let s = scope(json!({"user": {"tags": ["a", "b"]}, "word": "hey"}));
        assert_eq!(eval("user.tags.length", &s).to_number(), 2.0);
        assert_eq!(eval("user['tags'][1]", &s).to_js_string(), "b");
        assert_eq!(eval("word.length", &s).to_number(), 3.0);
        assert!(matches!(eval("user.missing", &s), Value::Undefined));
    }

    #[test]
    fn null_access_is_an_error() {
        let s = scope(json!({}));
        let err = Expression::parse("user.name")
            .unwrap()
            .evaluate(&s)
            .unwrap_err();
        assert!(matches!(
            err,
            BindError::Eval(EvalError::NullAccess { base: "undefined", .. })
        ));
    }

    #[test]
    fn assignment_writes_through() {
        let s = scope(json!({"count": 1, "list": [1, 2, 3], "o": {}}));
        eval("count = count + 1", &s);
        assert_eq!(s.model().peek("count").unwrap().to_number(), 2.0);
        Expression::parse("list.length")
            .unwrap()
            .assign(&s, 1.into())
            .unwrap();
        assert_eq!(s.lookup("list").to_json(), json!([1]));
        eval("o['k'] = 'v'", &s);
        assert_eq!(s.lookup("o").to_json(), json!({"k": "v"}));
    }

    #[test]
    fn assigning_to_non_location_fails() {
        let s = scope(json!({}));
        let err = Expression::parse("a + 1")
            .unwrap()
            .assign(&s, 1.into())
            .unwrap_err();
        assert!(matches!(err, BindError::Eval(EvalError::NotAssignable(_))));
    }

    #[test]
    fn interpolation() {
        let s = scope(json!({"n": 3, "who": null}));
        let e = Expression::parse_interpolation("n = {{ n }}, who = {{who}}!", "{{", "}}")
            .unwrap()
            .unwrap();
        assert_eq!(e.evaluate(&s).unwrap().to_js_string(), "n = 3, who = !");
        assert!(
            Expression::parse_interpolation("plain text", "{{", "}}")
                .unwrap()
                .is_none()
        );
        assert!(
            Expression::parse_interpolation("open {{ only", "{{", "}}")
                .unwrap()
                .is_none()
        );
        let err = Expression::parse_interpolation("{{ a + }}", "{{", "}}").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedEnd { .. }));
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("item"));
        assert!(is_identifier("$index"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("in"));
        assert!(!is_identifier("true"));
    }
}
