#![forbid(unsafe_code)]

//! Expression syntax tree.

use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    And,
    Or,
}

impl BinaryOp {
    pub(crate) fn from_punct(p: &str) -> Option<Self> {
        Some(match p {
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Rem,
            "+" => Self::Add,
            "-" => Self::Sub,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "===" => Self::StrictEq,
            "!==" => Self::StrictNe,
            "&&" => Self::And,
            "||" => Self::Or,
            _ => return None,
        })
    }

    /// Binding power; higher binds tighter.
    pub(crate) fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::Ne | Self::StrictEq | Self::StrictNe => 3,
            Self::Lt | Self::Le | Self::Gt | Self::Ge => 4,
            Self::Add | Self::Sub => 5,
            Self::Mul | Self::Div | Self::Rem => 6,
        }
    }
}

/// A piece of interpolated text.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Ident(String),
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    /// Call of a registered method by name.
    Call {
        method: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Object(Vec<(String, Expr)>),
    Array(Vec<Expr>),
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// Mustache text: literal runs and embedded expressions.
    Interpolation(SmallVec<[Part; 3]>),
}

impl Expr {
    /// Whether the expression names a storage location.
    #[must_use]
    pub fn is_assignable(&self) -> bool {
        matches!(self, Self::Ident(_) | Self::Member { .. } | Self::Index { .. })
    }
}
