#![forbid(unsafe_code)]

//! Error taxonomy shared by every layer of the binding engine.
//!
//! Every error here is a template-authoring or integration defect. Nothing
//! is retried: errors propagate synchronously to whoever started the work
//! (the compile call, the model write, or the event dispatch).
//!
//! | Family | Raised when | Example |
//! |--------|-------------|---------|
//! | [`ParseError`] | A directive value is compiled | `v-text="a +"` |
//! | [`EvalError`] | An expression is evaluated | `user.name` with `user` undefined |
//! | [`ContractViolation`] | A value or element does not fit its directive | list bound to a string |
//! | [`DomError`] | The tree refuses an edit | patching a destroyed node |
//! | [`ListenerError`] | A foreign event listener fails during dispatch | |

use std::fmt;

use weft_dom::{DomError, ListenerError};

/// Kinds of expression compilation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The expression text is empty.
    Empty,
    /// A token that does not fit the grammar at this position.
    UnexpectedToken { found: String, expected: &'static str },
    /// The expression ended early.
    UnexpectedEnd { expected: &'static str },
    /// A string literal is missing its closing quote.
    UnterminatedString,
    /// A character that starts no token.
    UnexpectedChar(char),
    /// A reserved word used as an identifier.
    ReservedWord(String),
    /// The left side of `=` is not a name, member, or index.
    InvalidAssignmentTarget,
    /// A list directive value not of the form `item in expr`.
    InvalidListSyntax,
    /// A call whose callee is not a method name.
    InvalidCallee,
}

/// An expression that failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Byte offset into [`Self::source`].
    pub offset: usize,
    pub source: String,
}

impl ParseError {
    #[must_use]
    pub fn new(kind: ParseErrorKind, offset: usize, source: &str) -> Self {
        Self {
            kind,
            offset,
            source: source.to_string(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParseErrorKind::Empty => f.write_str("empty expression")?,
            ParseErrorKind::UnexpectedToken { found, expected } => {
                write!(f, "unexpected `{found}`, expected {expected}")?;
            }
            ParseErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of expression, expected {expected}")?;
            }
            ParseErrorKind::UnterminatedString => f.write_str("unterminated string literal")?,
            ParseErrorKind::UnexpectedChar(c) => write!(f, "unexpected character `{c}`")?,
            ParseErrorKind::ReservedWord(w) => {
                write!(f, "`{w}` is reserved and cannot be used as a name")?;
            }
            ParseErrorKind::InvalidAssignmentTarget => f.write_str("invalid assignment target")?,
            ParseErrorKind::InvalidListSyntax => {
                f.write_str("list expression must look like `item in items` or `(item, index) in items`")?;
            }
            ParseErrorKind::InvalidCallee => f.write_str("only named methods can be called")?,
        }
        write!(f, " at {} in `{}`", self.offset, self.source)
    }
}

impl std::error::Error for ParseError {}

/// Failures while evaluating a compiled expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Property read or write on `undefined` or `null`.
    NullAccess { property: String, base: &'static str },
    /// A call to a method that was never registered.
    UnknownMethod(String),
    /// Assignment through an expression with no storage location.
    NotAssignable(String),
    /// Index assignment with a key the container cannot hold.
    InvalidIndex(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullAccess { property, base } => {
                write!(f, "cannot access `{property}` of {base}")
            }
            Self::UnknownMethod(name) => write!(f, "unknown method `{name}`"),
            Self::NotAssignable(what) => write!(f, "cannot assign to {what}"),
            Self::InvalidIndex(key) => write!(f, "invalid array index `{key}`"),
        }
    }
}

impl std::error::Error for EvalError {}

/// A value or element that does not satisfy its directive's contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    /// A list directive evaluated to something other than an array.
    ListNotArray { expression: String, found: &'static str },
    /// Checkbox model bound to neither a boolean nor an array.
    CheckboxValue { expression: String, found: &'static str },
    /// `<select multiple>` bound to a non-array, or single select to an array.
    SelectMultiplicity { expression: String, multiple: bool },
    /// The model directive on an element that has no form value.
    ModelElement { tag: String },
    /// A structural directive on a node with no parent to anchor in.
    DetachedStructural { directive: &'static str },
    /// The facade root is missing or not an element.
    InvalidRoot,
    /// The facade model is not a plain object.
    ModelNotObject { found: &'static str },
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListNotArray { expression, found } => {
                write!(f, "list source `{expression}` must be an array, got {found}")
            }
            Self::CheckboxValue { expression, found } => write!(
                f,
                "checkbox model `{expression}` must be a boolean or an array, got {found}"
            ),
            Self::SelectMultiplicity {
                expression,
                multiple: true,
            } => write!(f, "multiple select model `{expression}` must be an array"),
            Self::SelectMultiplicity {
                expression,
                multiple: false,
            } => write!(f, "single select model `{expression}` must not be an array"),
            Self::ModelElement { tag } => write!(f, "model directive is not supported on <{tag}>"),
            Self::DetachedStructural { directive } => {
                write!(f, "`{directive}` directive needs a parent element")
            }
            Self::InvalidRoot => f.write_str("root must be an existing element"),
            Self::ModelNotObject { found } => write!(f, "model must be a plain object, got {found}"),
        }
    }
}

impl std::error::Error for ContractViolation {}

/// Any failure raised while compiling, evaluating, or rendering bindings.
#[derive(Debug)]
pub enum BindError {
    Parse(ParseError),
    Eval(EvalError),
    Contract(ContractViolation),
    Dom(DomError),
    /// A listener not installed by the binding engine failed.
    Listener(ListenerError),
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "expression parse error: {e}"),
            Self::Eval(e) => write!(f, "evaluation error: {e}"),
            Self::Contract(e) => write!(f, "contract violation: {e}"),
            Self::Dom(e) => write!(f, "dom error: {e}"),
            Self::Listener(e) => write!(f, "event listener failed: {e}"),
        }
    }
}

impl std::error::Error for BindError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Eval(e) => Some(e),
            Self::Contract(e) => Some(e),
            Self::Dom(e) => Some(e),
            Self::Listener(e) => Some(e.as_ref()),
        }
    }
}

impl From<ParseError> for BindError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<EvalError> for BindError {
    fn from(e: EvalError) -> Self {
        Self::Eval(e)
    }
}

impl From<ContractViolation> for BindError {
    fn from(e: ContractViolation) -> Self {
        Self::Contract(e)
    }
}

impl From<DomError> for BindError {
    fn from(e: DomError) -> Self {
        Self::Dom(e)
    }
}

impl From<ListenerError> for BindError {
    /// Unwraps errors raised by the engine's own listeners; anything else
    /// is kept as [`BindError::Listener`].
    fn from(e: ListenerError) -> Self {
        match e.downcast::<BindError>() {
            Ok(inner) => *inner,
            Err(other) => Self::Listener(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_mentions_position_and_source() {
        let e = ParseError::new(ParseErrorKind::ReservedWord("new".into()), 4, "a + new");
        assert_eq!(
            e.to_string(),
            "`new` is reserved and cannot be used as a name at 4 in `a + new`"
        );
    }

    #[test]
    fn listener_errors_unwrap_engine_errors() {
        let boxed: ListenerError = Box::new(BindError::from(EvalError::UnknownMethod("go".into())));
        assert!(matches!(
            BindError::from(boxed),
            BindError::Eval(EvalError::UnknownMethod(_))
        ));
        let foreign: ListenerError = "boom".into();
        assert_eq!(
            BindError::from(foreign).to_string(),
            "event listener failed: boom"
        );
    }

    #[test]
    fn bind_error_exposes_source() {
        use std::error::Error;
        let e: BindError = ContractViolation::InvalidRoot.into();
        assert!(e.source().is_some());
        assert_eq!(
            e.to_string(),
            "contract violation: root must be an existing element"
        );
    }
}
