// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::error::Result;
use crate::functions::{CallSite, FunctionBuilders};
use crate::lexer::*;
use crate::number::*;

use core::str::FromStr;
use std::rc::Rc;

const KEYWORDS: [&str; 16] = [
    "and",
    "div",
    "empty",
    "eq",
    "false",
    "ge",
    "gt",
    "instanceof",
    "le",
    "lt",
    "mod",
    "ne",
    "not",
    "null",
    "or",
    "true",
];

#[derive(Clone)]
pub struct Parser<'source, 'b> {
    source: Source,
    lexer: Lexer<'source>,
    tok: Token,
    end: u32,
    builders: &'b FunctionBuilders,
}

impl<'source, 'b> Parser<'source, 'b> {
    pub fn new(source: &'source Source, builders: &'b FunctionBuilders) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let tok = lexer.next_text()?;
        Ok(Self {
            source: source.clone(),
            lexer,
            tok,
            end: 0,
            builders,
        })
    }

    pub fn token_text(&self) -> &str {
        match self.tok.0 {
            TokenKind::Symbol | TokenKind::Number | TokenKind::Ident | TokenKind::Eof => {
                self.tok.1.text()
            }
            TokenKind::String | TokenKind::Text | TokenKind::Open => "",
        }
    }

    pub fn next_token(&mut self) -> Result<()> {
        self.end = self.tok.1.end;
        self.tok = self.lexer.next_token()?;
        Ok(())
    }

    fn next_text(&mut self) -> Result<()> {
        self.end = self.tok.1.end;
        self.tok = self.lexer.next_text()?;
        Ok(())
    }

    fn expect(&mut self, text: &str, context: &str) -> Result<()> {
        if self.token_text() == text {
            self.next_token()
        } else {
            let msg = format!("expecting `{text}` {context}");
            Err(self.source.error(self.tok.1.line, self.tok.1.col, &msg))
        }
    }

    fn is_keyword(ident: &str) -> bool {
        KEYWORDS.contains(&ident)
    }

    fn is_symbol(&self, text: &str) -> bool {
        self.tok.0 == TokenKind::Symbol && self.token_text() == text
    }

    fn is_word(&self, text: &str) -> bool {
        self.tok.0 == TokenKind::Ident && self.token_text() == text
    }

    fn span_from(&self, start: &Span) -> Span {
        let mut span = start.clone();
        span.end = self.end;
        span
    }

    fn parse_ident(&mut self) -> Result<Span> {
        let span = self.tok.1.clone();
        match self.tok.0 {
            TokenKind::Ident if Self::is_keyword(span.text()) => Err(self.source.error(
                self.tok.1.line,
                self.tok.1.col,
                &format!("unexpected keyword `{}`", span.text()),
            )),
            TokenKind::Ident => {
                self.next_token()?;
                Ok(span)
            }
            _ => Err(self
                .source
                .error(self.tok.1.line, self.tok.1.col, "expecting identifier")),
        }
    }

    /// Parse a complete composite expression.
    pub fn parse_template(&mut self) -> Result<Template> {
        let mut segments = vec![];
        loop {
            match self.tok.0 {
                TokenKind::Eof => break,
                TokenKind::Text => {
                    segments.push(Segment::Text(unescape_text(self.tok.1.text())));
                    self.next_text()?;
                }
                TokenKind::Open => {
                    let deferred = self.tok.1.text().starts_with('#');
                    self.next_token()?;
                    if self.is_symbol("}") {
                        return Err(self.source.error(
                            self.tok.1.line,
                            self.tok.1.col,
                            "empty expression",
                        ));
                    }
                    let expr = self.parse_expr()?;
                    if !self.is_symbol("}") {
                        let msg = match self.tok.0 {
                            TokenKind::Eof => "unterminated expression, expecting `}`".to_string(),
                            _ => format!("unexpected `{}`, expecting `}}`", self.tok.1.text()),
                        };
                        return Err(self.source.error(self.tok.1.line, self.tok.1.col, &msg));
                    }
                    segments.push(Segment::Eval {
                        deferred,
                        expr: Ref::new(expr),
                    });
                    self.next_text()?;
                }
                _ => {
                    return Err(self.source.error(
                        self.tok.1.line,
                        self.tok.1.col,
                        "unexpected token",
                    ))
                }
            }
        }
        Ok(Template { segments })
    }

    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_assign_expr()
    }

    fn parse_assign_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let lhs = self.parse_choice_expr()?;
        if !self.is_symbol("=") {
            return Ok(lhs);
        }
        if !lhs.is_lvalue() {
            return Err(self.source.error(
                self.tok.1.line,
                self.tok.1.col,
                "left hand side of assignment is not writable",
            ));
        }
        self.next_token()?;
        let rhs = self.parse_assign_expr()?;
        Ok(Expr::Assign {
            span: self.span_from(&start),
            lhs: Ref::new(lhs),
            rhs: Ref::new(rhs),
        })
    }

    fn parse_choice_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let cond = self.parse_or_expr()?;
        if !self.is_symbol("?") {
            return Ok(cond);
        }
        self.next_token()?;
        let then = self.parse_choice_expr()?;
        self.expect(":", "while parsing conditional expression")?;
        let otherwise = self.parse_choice_expr()?;
        Ok(Expr::Choice {
            span: self.span_from(&start),
            cond: Ref::new(cond),
            then: Ref::new(then),
            otherwise: Ref::new(otherwise),
        })
    }

    fn parse_logic_expr(
        &mut self,
        op: LogicOp,
        symbol: &str,
        word: &str,
        operand: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut expr = operand(self)?;
        while self.is_symbol(symbol) || self.is_word(word) {
            self.next_token()?;
            let rhs = operand(self)?;
            expr = Expr::Logic {
                span: self.span_from(&start),
                op,
                lhs: Ref::new(expr),
                rhs: Ref::new(rhs),
            };
        }
        Ok(expr)
    }

    fn parse_or_expr(&mut self) -> Result<Expr> {
        self.parse_logic_expr(LogicOp::Or, "||", "or", Self::parse_and_expr)
    }

    fn parse_and_expr(&mut self) -> Result<Expr> {
        self.parse_logic_expr(LogicOp::And, "&&", "and", Self::parse_equality_expr)
    }

    fn parse_equality_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut expr = self.parse_relational_expr()?;
        loop {
            let op = match (&self.tok.0, self.token_text()) {
                (TokenKind::Symbol, "==") | (TokenKind::Ident, "eq") => BoolOp::Eq,
                (TokenKind::Symbol, "!=") | (TokenKind::Ident, "ne") => BoolOp::Ne,
                _ => return Ok(expr),
            };
            self.next_token()?;
            let rhs = self.parse_relational_expr()?;
            expr = Expr::BoolExpr {
                span: self.span_from(&start),
                op,
                lhs: Ref::new(expr),
                rhs: Ref::new(rhs),
            };
        }
    }

    fn parse_relational_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut expr = self.parse_additive_expr()?;
        loop {
            let op = match (&self.tok.0, self.token_text()) {
                (TokenKind::Symbol, "<") | (TokenKind::Ident, "lt") => BoolOp::Lt,
                (TokenKind::Symbol, "<=") | (TokenKind::Ident, "le") => BoolOp::Le,
                (TokenKind::Symbol, ">") | (TokenKind::Ident, "gt") => BoolOp::Gt,
                (TokenKind::Symbol, ">=") | (TokenKind::Ident, "ge") => BoolOp::Ge,
                _ => return Ok(expr),
            };
            self.next_token()?;
            let rhs = self.parse_additive_expr()?;
            expr = Expr::BoolExpr {
                span: self.span_from(&start),
                op,
                lhs: Ref::new(expr),
                rhs: Ref::new(rhs),
            };
        }
    }

    fn parse_additive_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut expr = self.parse_multiplicative_expr()?;
        loop {
            let op = match (&self.tok.0, self.token_text()) {
                (TokenKind::Symbol, "+") => ArithOp::Add,
                (TokenKind::Symbol, "-") => ArithOp::Sub,
                _ => return Ok(expr),
            };
            self.next_token()?;
            let rhs = self.parse_multiplicative_expr()?;
            expr = Expr::Arith {
                span: self.span_from(&start),
                op,
                lhs: Ref::new(expr),
                rhs: Ref::new(rhs),
            };
        }
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut expr = self.parse_unary_expr()?;
        loop {
            let op = match (&self.tok.0, self.token_text()) {
                (TokenKind::Symbol, "*") => ArithOp::Mul,
                (TokenKind::Symbol, "/") | (TokenKind::Ident, "div") => ArithOp::Div,
                (TokenKind::Symbol, "%") | (TokenKind::Ident, "mod") => ArithOp::Mod,
                _ => return Ok(expr),
            };
            self.next_token()?;
            let rhs = self.parse_unary_expr()?;
            expr = Expr::Arith {
                span: self.span_from(&start),
                op,
                lhs: Ref::new(expr),
                rhs: Ref::new(rhs),
            };
        }
    }

    fn parse_unary_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let op = match (&self.tok.0, self.token_text()) {
            (TokenKind::Symbol, "-") => UnaryOp::Neg,
            (TokenKind::Symbol, "!") | (TokenKind::Ident, "not") => UnaryOp::Not,
            (TokenKind::Ident, "empty") => UnaryOp::Empty,
            _ => return self.parse_value_expr(),
        };
        self.next_token()?;
        let expr = self.parse_unary_expr()?;
        // Fold negative number literals.
        if let (UnaryOp::Neg, Expr::Number { value, .. }) = (op, &expr) {
            return Ok(Expr::Number {
                span: self.span_from(&start),
                value: value.neg(),
            });
        }
        Ok(Expr::Unary {
            span: self.span_from(&start),
            op,
            expr: Ref::new(expr),
        })
    }

    fn parse_args(&mut self, close: &str, context: &str) -> Result<Vec<Ref<Expr>>> {
        let mut args = vec![];
        if !self.is_symbol(close) {
            args.push(Ref::new(self.parse_expr()?));
            while self.is_symbol(",") {
                self.next_token()?;
                args.push(Ref::new(self.parse_expr()?));
            }
        }
        self.expect(close, context)?;
        Ok(args)
    }

    /// Is the current identifier the start of `prefix:name(`? The three
    /// tokens must touch each other.
    fn at_prefixed_call(&self) -> Result<bool> {
        let mut lexer = self.lexer.clone();
        let colon = lexer.next_token()?;
        if colon.0 != TokenKind::Symbol || colon.1.text() != ":" || colon.1.start != self.tok.1.end
        {
            return Ok(false);
        }
        let name = lexer.next_token()?;
        if name.0 != TokenKind::Ident || name.1.start != colon.1.end {
            return Ok(false);
        }
        let paren = lexer.next_token()?;
        Ok(paren.0 == TokenKind::Symbol && paren.1.text() == "(" && paren.1.start == name.1.end)
    }

    fn parse_call(&mut self, start: &Span, prefix: &str, name: Span) -> Result<Expr> {
        self.expect("(", "while parsing function call")?;
        let params = self.parse_args(")", "while parsing function call")?;
        let site = CallSite {
            span: self.span_from(start),
            prefix: Rc::from(prefix),
            name: Rc::from(name.text()),
            params,
        };
        self.builders.build(site)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let span = self.tok.1.clone();
        match self.tok.0 {
            TokenKind::Number => {
                let value = match Number::from_str(span.text()) {
                    Ok(v) => v,
                    Err(_) => return Err(span.error("could not parse number")),
                };
                self.next_token()?;
                Ok(Expr::Number { span, value })
            }
            TokenKind::String => {
                let value = Rc::from(unescape_string(span.text()).as_str());
                self.next_token()?;
                Ok(Expr::String { span, value })
            }
            TokenKind::Symbol if span.text() == "(" => {
                self.next_token()?;
                let expr = self.parse_expr()?;
                self.expect(")", "while parsing parenthesized expression")?;
                Ok(expr)
            }
            TokenKind::Symbol if span.text() == "[" => {
                self.next_token()?;
                let items = self.parse_args("]", "while parsing list")?;
                Ok(Expr::List {
                    span: self.span_from(&span),
                    items,
                })
            }
            TokenKind::Symbol if span.text() == "{" => {
                self.next_token()?;
                let mut fields = vec![];
                if !self.is_symbol("}") {
                    loop {
                        let key = self.parse_expr()?;
                        self.expect(":", "while parsing map entry")?;
                        let value = self.parse_expr()?;
                        fields.push((Ref::new(key), Ref::new(value)));
                        if !self.is_symbol(",") {
                            break;
                        }
                        self.next_token()?;
                    }
                }
                self.expect("}", "while parsing map")?;
                Ok(Expr::MapLit {
                    span: self.span_from(&span),
                    fields,
                })
            }
            TokenKind::Ident => match span.text() {
                "null" => {
                    self.next_token()?;
                    Ok(Expr::Null(span))
                }
                "true" | "false" => {
                    self.next_token()?;
                    Ok(Expr::Bool {
                        value: span.text() == "true",
                        span,
                    })
                }
                _ => {
                    if !Self::is_keyword(span.text()) && self.at_prefixed_call()? {
                        let prefix = self.parse_ident()?;
                        self.next_token()?;
                        let name = self.parse_ident()?;
                        return self.parse_call(&span, prefix.text(), name);
                    }
                    let ident = self.parse_ident()?;
                    if self.is_symbol("(") && self.tok.1.start == ident.end {
                        return self.parse_call(&span, "", ident);
                    }
                    Ok(Expr::Ident {
                        name: Rc::from(ident.text()),
                        span: ident,
                    })
                }
            },
            _ => Err(self.source.error(
                self.tok.1.line,
                self.tok.1.col,
                "expecting expression",
            )),
        }
    }

    fn parse_value_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut term = self.parse_primary()?;
        loop {
            if self.is_symbol(".") {
                self.next_token()?;
                let field = self.parse_ident()?;
                let name: Rc<str> = Rc::from(field.text());
                if self.is_symbol("(") {
                    self.next_token()?;
                    let params = self.parse_args(")", "while parsing method call")?;
                    term = Expr::MethodCall {
                        span: self.span_from(&start),
                        refr: Ref::new(term),
                        method: (field, name),
                        params,
                    };
                } else {
                    term = Expr::RefDot {
                        span: self.span_from(&start),
                        refr: Ref::new(term),
                        field: (field, name),
                    };
                }
            } else if self.is_symbol("[") {
                self.next_token()?;
                let index = self.parse_expr()?;
                self.expect("]", "while parsing bracketed reference")?;
                term = Expr::RefBrack {
                    span: self.span_from(&start),
                    refr: Ref::new(term),
                    index: Ref::new(index),
                };
            } else {
                return Ok(term);
            }
        }
    }
}

/// Parse a composite expression with the given call-node builders.
pub fn parse(text: &str, builders: &FunctionBuilders) -> Result<Template> {
    let source = Source::from_contents("<expression>".to_string(), text.to_string())?;
    let mut parser = Parser::new(&source, builders)?;
    parser.parse_template()
}
