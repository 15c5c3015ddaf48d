// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::lexer::*;
use crate::number::Number;

use core::{cmp, fmt, ops::Deref};
use std::rc::Rc;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BoolOp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOp {
    Neg,
    Not,
    Empty,
}

pub struct NodeRef<T> {
    r: Rc<T>,
}

impl<T> Clone for NodeRef<T> {
    fn clone(&self) -> Self {
        Self { r: self.r.clone() }
    }
}

impl<T: fmt::Debug> fmt::Debug for NodeRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.r.as_ref().fmt(f)
    }
}

impl<T> cmp::PartialEq for NodeRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::as_ptr(&self.r).eq(&Rc::as_ptr(&other.r))
    }
}

impl<T> cmp::Eq for NodeRef<T> {}

impl<T> Deref for NodeRef<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.r
    }
}

impl<T> AsRef<T> for NodeRef<T> {
    fn as_ref(&self) -> &T {
        self.deref()
    }
}

impl<T> NodeRef<T> {
    pub fn new(t: T) -> Self {
        Self { r: Rc::new(t) }
    }
}

pub type Ref<T> = NodeRef<T>;

#[derive(Debug)]
pub enum Expr {
    Null(Span),

    Bool {
        span: Span,
        value: bool,
    },

    Number {
        span: Span,
        value: Number,
    },

    String {
        span: Span,
        value: Rc<str>,
    },

    // Root identifier, resolved against a null base.
    Ident {
        span: Span,
        name: Rc<str>,
    },

    RefDot {
        span: Span,
        refr: Ref<Expr>,
        field: (Span, Rc<str>),
    },

    RefBrack {
        span: Span,
        refr: Ref<Expr>,
        index: Ref<Expr>,
    },

    MethodCall {
        span: Span,
        refr: Ref<Expr>,
        method: (Span, Rc<str>),
        params: Vec<Ref<Expr>>,
    },

    // prefix:name(params). A call without a prefix has an empty prefix.
    Call {
        span: Span,
        prefix: Rc<str>,
        name: Rc<str>,
        params: Vec<Ref<Expr>>,
        arity: usize,
        varargs: bool,
    },

    Unary {
        span: Span,
        op: UnaryOp,
        expr: Ref<Expr>,
    },

    Arith {
        span: Span,
        op: ArithOp,
        lhs: Ref<Expr>,
        rhs: Ref<Expr>,
    },

    BoolExpr {
        span: Span,
        op: BoolOp,
        lhs: Ref<Expr>,
        rhs: Ref<Expr>,
    },

    Logic {
        span: Span,
        op: LogicOp,
        lhs: Ref<Expr>,
        rhs: Ref<Expr>,
    },

    Choice {
        span: Span,
        cond: Ref<Expr>,
        then: Ref<Expr>,
        otherwise: Ref<Expr>,
    },

    Assign {
        span: Span,
        lhs: Ref<Expr>,
        rhs: Ref<Expr>,
    },

    List {
        span: Span,
        items: Vec<Ref<Expr>>,
    },

    MapLit {
        span: Span,
        fields: Vec<(Ref<Expr>, Ref<Expr>)>,
    },
}

impl Expr {
    pub fn span(&self) -> &Span {
        use Expr::*;
        match self {
            Null(span)
            | Bool { span, .. }
            | Number { span, .. }
            | String { span, .. }
            | Ident { span, .. }
            | RefDot { span, .. }
            | RefBrack { span, .. }
            | MethodCall { span, .. }
            | Call { span, .. }
            | Unary { span, .. }
            | Arith { span, .. }
            | BoolExpr { span, .. }
            | Logic { span, .. }
            | Choice { span, .. }
            | Assign { span, .. }
            | List { span, .. }
            | MapLit { span, .. } => span,
        }
    }

    /// Whether the expression names a location that can be assigned to.
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self,
            Expr::Ident { .. } | Expr::RefDot { .. } | Expr::RefBrack { .. }
        )
    }
}

#[derive(Debug)]
pub enum Segment {
    Text(String),
    // `${...}` or, when deferred, `#{...}`.
    Eval { deferred: bool, expr: Ref<Expr> },
}

/// Parsed form of a composite expression.
#[derive(Debug)]
pub struct Template {
    pub segments: Vec<Segment>,
}

impl Template {
    /// The single eval segment, if the template consists of nothing else.
    pub fn single_expr(&self) -> Option<&Ref<Expr>> {
        match self.segments.as_slice() {
            [Segment::Eval { expr, .. }] => Some(expr),
            _ => None,
        }
    }

    pub fn is_literal_text(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Text(_)))
    }
}
