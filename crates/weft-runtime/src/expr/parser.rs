#![forbid(unsafe_code)]

//! Recursive-descent parser for binding expressions.
//!
//! Grammar, loosest first:
//!
//! ```text
//! expression  := conditional ( "=" conditional )?
//! conditional := binary ( "?" conditional ":" conditional )?
//! binary      := unary ( op unary )*          precedence climbing
//! unary       := ( "!" | "-" | "+" ) unary | postfix
//! postfix     := primary ( "." name | "[" expression "]" | "(" args ")" )*
//! primary     := literal | name | "(" expression ")" | array | object
//! ```

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};
use super::lexer::{Spanned, Token, tokenize};
use crate::error::{ParseError, ParseErrorKind};

/// Names with meaning in the host scripting language; never identifiers.
pub const RESERVED_WORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "export", "extends", "finally", "for", "function", "if", "import", "in", "instanceof",
    "let", "new", "return", "super", "switch", "this", "throw", "try", "typeof", "var", "void",
    "while", "with", "yield",
];

/// Methods reachable through `$methods.name(...)`.
pub(crate) const METHODS_NAMESPACE: &str = "$methods";

pub(crate) fn parse(source: &str) -> Result<Expr, ParseError> {
    if source.trim().is_empty() {
        return Err(ParseError::new(ParseErrorKind::Empty, 0, source));
    }
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    let expr = parser.expression()?;
    parser.expect_end()?;
    Ok(expr)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map_or(&Token::Eof, |s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.source.len(), |s| s.offset)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Token::Punct(p) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, expected: &'static str) -> ParseError {
        let kind = match self.peek() {
            Token::Eof => ParseErrorKind::UnexpectedEnd { expected },
            other => ParseErrorKind::UnexpectedToken {
                found: other.describe(),
                expected,
            },
        };
        ParseError::new(kind, self.offset(), self.source)
    }

    fn expect(&mut self, punct: &'static str) -> Result<(), ParseError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.error(punct))
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        match self.peek() {
            Token::Eof => Ok(()),
            _ => Err(self.error("end of expression")),
        }
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        let target_offset = self.offset();
        let left = self.conditional()?;
        if !self.eat("=") {
            return Ok(left);
        }
        if !left.is_assignable() {
            return Err(ParseError::new(
                ParseErrorKind::InvalidAssignmentTarget,
                target_offset,
                self.source,
            ));
        }
        let value = self.conditional()?;
        Ok(Expr::Assign {
            target: Box::new(left),
            value: Box::new(value),
        })
    }

    fn conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.binary(0)?;
        if !self.eat("?") {
            return Ok(test);
        }
        let consequent = self.conditional()?;
        self.expect(":")?;
        let alternate = self.conditional()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn binary(&mut self, min_precedence: u8) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Punct(p) => BinaryOp::from_punct(p),
                _ => None,
            };
            let Some(op) = op else { break };
            let precedence = op.precedence();
            if precedence <= min_precedence {
                break;
            }
            self.pos += 1;
            let right = self.binary(precedence)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = if self.eat("!") {
            UnaryOp::Not
        } else if self.eat("-") {
            UnaryOp::Neg
        } else if self.eat("+") {
            UnaryOp::Plus
        } else {
            return self.postfix();
        };
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(".") {
                let property = match self.advance() {
                    Token::Ident(name) => name,
                    _ => {
                        self.pos -= 1;
                        return Err(self.error("a property name"));
                    }
                };
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.eat("[") {
                let index = self.expression()?;
                self.expect("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if matches!(self.peek(), Token::Punct("(")) {
                let offset = self.offset();
                let method = callee_name(&expr).ok_or_else(|| {
                    ParseError::new(ParseErrorKind::InvalidCallee, offset, self.source)
                })?;
                self.pos += 1;
                let args = self.list(")")?;
                expr = Expr::Call { method, args };
            } else {
                return Ok(expr);
            }
        }
    }

    fn list(&mut self, close: &'static str) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.conditional()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(",")?;
            // Trailing comma.
            if self.eat(close) {
                return Ok(items);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let offset = self.offset();
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Literal::Str(s))),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Literal::Bool(true))),
                "false" => Ok(Expr::Literal(Literal::Bool(false))),
                "null" => Ok(Expr::Literal(Literal::Null)),
                "undefined" => Ok(Expr::Literal(Literal::Undefined)),
                _ if RESERVED_WORDS.contains(&name.as_str()) => Err(ParseError::new(
                    ParseErrorKind::ReservedWord(name),
                    offset,
                    self.source,
                )),
                _ => Ok(Expr::Ident(name)),
            },
            Token::Punct("(") => {
                let inner = self.expression()?;
                self.expect(")")?;
                Ok(inner)
            }
            Token::Punct("[") => Ok(Expr::Array(self.list("]")?)),
            Token::Punct("{") => self.object(),
            _ => {
                self.pos -= 1;
                Err(self.error("an expression"))
            }
        }
    }

    fn object(&mut self) -> Result<Expr, ParseError> {
        let mut entries = Vec::new();
        if self.eat("}") {
            return Ok(Expr::Object(entries));
        }
        loop {
            let key = match self.advance() {
                Token::Ident(name) => name,
                Token::Str(s) => s,
                Token::Number(n) => crate::value::format_number(n),
                _ => {
                    self.pos -= 1;
                    return Err(self.error("a property key"));
                }
            };
            self.expect(":")?;
            let value = self.conditional()?;
            entries.push((key, value));
            if self.eat("}") {
                return Ok(Expr::Object(entries));
            }
            self.expect(",")?;
            if self.eat("}") {
                return Ok(Expr::Object(entries));
            }
        }
    }
}

fn callee_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident(name) => Some(name.clone()),
        Expr::Member { object, property } => match object.as_ref() {
            Expr::Ident(ns) if ns == METHODS_NAMESPACE => Some(property.clone()),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.to_string()))
    }

    #[test]
    fn precedence_and_associativity() {
        let expr = parse("a - b - c * d").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Sub,
                left: Box::new(Expr::Binary {
                    op: BinaryOp::Sub,
                    left: ident("a"),
                    right: ident("b"),
                }),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    left: ident("c"),
                    right: ident("d"),
                }),
            }
        );
    }

    #[test]
    fn logical_binds_looser_than_comparison() {
        let expr = parse("a < 1 || b").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Or, .. }));
    }

    #[test]
    fn member_index_and_calls() {
        let expr = parse("$methods.fmt(user.tags[0], 'x')").unwrap();
        let Expr::Call { method, args } = expr else {
            panic!("expected call");
        };
        assert_eq!(method, "fmt");
        assert_eq!(args.len(), 2);
        assert!(matches!(args[0], Expr::Index { .. }));
    }

    #[test]
    fn assignment_requires_target() {
        assert!(matches!(parse("a.b = c + 1").unwrap(), Expr::Assign { .. }));
        let err = parse("a + 1 = 2").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidAssignmentTarget);
    }

    #[test]
    fn reserved_words_rejected() {
        let err = parse("new Thing").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::ReservedWord("new".into()));
        assert_eq!(err.offset, 0);
        assert!(parse("this.x").is_err());
    }

    #[test]
    fn literals_and_containers() {
        assert!(matches!(parse("{ a: 1, 'b-c': [x, 2,], }").unwrap(), Expr::Object(e) if e.len() == 2));
        assert!(matches!(parse("ok ? 'y' : 'n'").unwrap(), Expr::Conditional { .. }));
        assert_eq!(parse("undefined").unwrap(), Expr::Literal(Literal::Undefined));
    }

    #[test]
    fn invalid_callee() {
        let err = parse("a.b(1)").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidCallee);
    }

    #[test]
    fn trailing_garbage_and_eof() {
        assert!(matches!(
            parse("a b").unwrap_err().kind,
            ParseErrorKind::UnexpectedToken { .. }
        ));
        assert!(matches!(
            parse("a +").unwrap_err().kind,
            ParseErrorKind::UnexpectedEnd { .. }
        ));
        assert_eq!(parse("   ").unwrap_err().kind, ParseErrorKind::Empty);
    }
}
