#![forbid(unsafe_code)]

//! Tokenizer for binding expressions.

use crate::error::{ParseError, ParseErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Number(n) => crate::value::format_number(*n),
            Self::Str(s) => format!("'{s}'"),
            Self::Ident(name) => name.clone(),
            Self::Punct(p) => (*p).to_string(),
            Self::Eof => "end of expression".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

// Longest first so `===` wins over `==` and `=`.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "+", "-", "*", "/", "%", "<", ">", "!",
    "=", "?", ":", ".", ",", "(", ")", "[", "]", "{", "}",
];

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ParseError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        let start = pos;

        if c.is_ascii_digit() || (c == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            pos = scan_number(bytes, pos);
            let text = &source[start..pos];
            let n = text.parse::<f64>().map_err(|_| {
                ParseError::new(
                    ParseErrorKind::UnexpectedToken {
                        found: text.to_string(),
                        expected: "a number",
                    },
                    start,
                    source,
                )
            })?;
            tokens.push(Spanned {
                token: Token::Number(n),
                offset: start,
            });
            continue;
        }

        if c == b'\'' || c == b'"' {
            let (s, end) = scan_string(source, pos)?;
            tokens.push(Spanned {
                token: Token::Str(s),
                offset: start,
            });
            pos = end;
            continue;
        }

        if is_ident_start(c) {
            while pos < bytes.len() && is_ident_continue(bytes[pos]) {
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Ident(source[start..pos].to_string()),
                offset: start,
            });
            continue;
        }

        let rest = &source[pos..];
        match PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) {
            Some(p) => {
                tokens.push(Spanned {
                    token: Token::Punct(p),
                    offset: start,
                });
                pos += p.len();
            }
            None => {
                let ch = rest.chars().next().unwrap_or('\0');
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedChar(ch),
                    start,
                    source,
                ));
            }
        }
    }

    tokens.push(Spanned {
        token: Token::Eof,
        offset: source.len(),
    });
    Ok(tokens)
}

fn scan_number(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos < bytes.len() && matches!(bytes[pos], b'e' | b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && matches!(bytes[exp], b'+' | b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            pos = exp;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    pos
}

fn scan_string(source: &str, start: usize) -> Result<(String, usize), ParseError> {
    let mut chars = source[start..].char_indices();
    let quote = chars.next().map(|(_, q)| q).unwrap_or('\'');
    let mut out = String::new();
    while let Some((i, ch)) = chars.next() {
        match ch {
            c if c == quote => return Ok((out, start + i + c.len_utf8())),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, other)) => out.push(other),
                None => break,
            },
            other => out.push(other),
        }
    }
    Err(ParseError::new(
        ParseErrorKind::UnterminatedString,
        start,
        source,
    ))
}

pub(crate) fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$'
}

pub(crate) fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn operators_prefer_longest_match() {
        assert_eq!(
            kinds("a===b"),
            vec![
                Token::Ident("a".into()),
                Token::Punct("==="),
                Token::Ident("b".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn numbers_and_strings() {
        assert_eq!(
            kinds("1.5e2 .5 'it\\'s' \"x\""),
            vec![
                Token::Number(150.0),
                Token::Number(0.5),
                Token::Str("it's".into()),
                Token::Str("x".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn member_dot_is_not_a_number() {
        assert_eq!(
            kinds("a.b"),
            vec![
                Token::Ident("a".into()),
                Token::Punct("."),
                Token::Ident("b".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn unterminated_string() {
        let err = tokenize("'abc").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedString);
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn stray_character() {
        let err = tokenize("a # b").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedChar('#'));
        assert_eq!(err.offset, 2);
    }
}
