// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::error::{Error, Result};
use crate::functions::{CallContext, FunctionResolver};
use crate::number::Number;
use crate::resolver::{CompositeResolver, ElContext, EvalMode};
use crate::value::Value;

use core::cmp::Ordering;
use core::str::FromStr;
use std::collections::BTreeMap;

/// Walks a parsed template against one evaluation context.
pub struct Interpreter<'r, 'c> {
    resolver: &'r CompositeResolver,
    functions: &'r dyn FunctionResolver,
    strict_arity: bool,
    ctx: ElContext<'c>,
}

/// Number view of a value for arithmetic. Null counts as zero.
pub(crate) fn coerce_number(v: &Value) -> Result<Number> {
    match v {
        Value::Null => Ok(Number::Int(0)),
        Value::Number(n) => Ok(n.clone()),
        Value::String(s) if s.is_empty() => Ok(Number::Int(0)),
        Value::String(s) => Number::from_str(s)
            .map_err(|_| Error::evaluation(format!("cannot coerce `{s}` to a number"))),
        _ => Err(Error::evaluation(format!(
            "cannot coerce a value of type {} to a number",
            v.type_name()
        ))),
    }
}

pub(crate) fn coerce_bool(v: &Value) -> Result<bool> {
    match v {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.is_empty() => Ok(false),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(Error::evaluation(format!(
            "cannot coerce a value of type {} to a boolean",
            v.type_name()
        ))),
    }
}

fn is_numeric_text(v: &Value) -> bool {
    match v {
        Value::String(s) => Number::from_str(s).is_ok(),
        _ => false,
    }
}

/// Loose equality: numbers compare numerically, text against a number or
/// boolean is converted first.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            match (coerce_number(a), coerce_number(b)) {
                (Ok(x), Ok(y)) => x == y,
                _ => false,
            }
        }
        (Value::Bool(_), Value::String(_)) | (Value::String(_), Value::Bool(_)) => {
            match (coerce_bool(a), coerce_bool(b)) {
                (Ok(x), Ok(y)) => x == y,
                _ => false,
            }
        }
        (Value::String(x), y) | (y, Value::String(x)) if !matches!(y, Value::String(_)) => {
            x.as_ref() == y.to_text()
        }
        _ => a == b,
    }
}

/// Ordering for the relational operators.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Result<Option<Ordering>> {
    Ok(match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            coerce_number(a)?.partial_cmp(&coerce_number(b)?)
        }
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::LocalDate(x), Value::LocalDate(y)) => Some(x.cmp(y)),
        (Value::LocalDateTime(x), Value::LocalDateTime(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => {
            return Err(Error::evaluation(format!(
                "cannot compare {} with {}",
                a.type_name(),
                b.type_name()
            )))
        }
    })
}

impl<'r, 'c> Interpreter<'r, 'c> {
    pub fn new(
        resolver: &'r CompositeResolver,
        functions: &'r dyn FunctionResolver,
        strict_arity: bool,
        ctx: ElContext<'c>,
    ) -> Self {
        Self {
            resolver,
            functions,
            strict_arity,
            ctx,
        }
    }

    pub fn eval_template(&mut self, template: &Template) -> Result<Value> {
        if let Some(expr) = template.single_expr() {
            return self.eval_expr(expr);
        }
        let mut text = String::new();
        for segment in &template.segments {
            match segment {
                Segment::Text(t) => text.push_str(t),
                Segment::Eval { expr, .. } => text.push_str(&self.eval_expr(expr)?.to_text()),
            }
        }
        Ok(Value::from(text))
    }

    /// Store `value` at the location a single-expression template names.
    pub fn assign_template(&mut self, template: &Template, value: Value) -> Result<()> {
        match template.single_expr() {
            Some(expr) => self.assign(expr, value),
            None => Err(Error::not_writable(
                template
                    .segments
                    .iter()
                    .map(|s| match s {
                        Segment::Text(t) => t.clone(),
                        Segment::Eval { expr, .. } => expr.span().text().to_string(),
                    })
                    .collect::<String>(),
            )),
        }
    }

    fn with_mode<T>(&mut self, mode: EvalMode, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.ctx.mode;
        self.ctx.mode = mode;
        let r = f(self);
        self.ctx.mode = saved;
        r
    }

    fn property_of(&mut self, expr: &Expr) -> Result<(Option<Value>, Value)> {
        match expr {
            Expr::Ident { name, .. } => Ok((None, Value::String(name.clone()))),
            Expr::RefDot { refr, field, .. } => {
                let base = self.eval_expr(refr)?;
                Ok((Some(base), Value::String(field.1.clone())))
            }
            Expr::RefBrack { refr, index, .. } => {
                let base = self.eval_expr(refr)?;
                let index = self.with_mode(EvalMode::Read, |i| i.eval_expr(index))?;
                Ok((Some(base), index))
            }
            _ => Err(Error::not_writable(expr.span().text())),
        }
    }

    /// Resolve the base chain in write mode, then store through the chain.
    pub fn assign(&mut self, target: &Expr, value: Value) -> Result<()> {
        if !target.is_lvalue() {
            return Err(Error::not_writable(target.span().text()));
        }
        let (base, property) = self.with_mode(EvalMode::Write, |i| i.property_of(target))?;
        let resolver = self.resolver;
        self.with_mode(EvalMode::Write, |i| {
            resolver.set_value(&mut i.ctx, base.as_ref(), &property, value)
        })
    }

    pub fn eval_expr(&mut self, expr: &Expr) -> Result<Value> {
        let resolver = self.resolver;
        match expr {
            Expr::Null(_) => Ok(Value::Null),
            Expr::Bool { value, .. } => Ok(Value::Bool(*value)),
            Expr::Number { value, .. } => Ok(Value::Number(value.clone())),
            Expr::String { value, .. } => Ok(Value::String(value.clone())),
            Expr::Ident { .. } | Expr::RefDot { .. } | Expr::RefBrack { .. } => {
                let (base, property) = self.property_of(expr)?;
                resolver.get_value(&mut self.ctx, base.as_ref(), &property)
            }
            Expr::MethodCall {
                refr,
                method,
                params,
                ..
            } => {
                let base = self.eval_expr(refr)?;
                let args = self.eval_args(params)?;
                if base.is_null() {
                    return Err(Error::method_not_found(method.1.as_ref()));
                }
                resolver.invoke(&mut self.ctx, &base, &method.1, &args)
            }
            Expr::Call {
                prefix,
                name,
                params,
                arity,
                varargs,
                ..
            } => self.eval_call(prefix, name, params, *arity, *varargs),
            Expr::Unary { op, expr, .. } => {
                let v = self.eval_expr(expr)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Number(coerce_number(&v)?.neg()),
                    UnaryOp::Not => Value::Bool(!coerce_bool(&v)?),
                    UnaryOp::Empty => Value::Bool(v.is_empty()),
                })
            }
            Expr::Arith { op, lhs, rhs, .. } => {
                let lhs = self.eval_expr(lhs)?;
                let rhs = self.eval_expr(rhs)?;
                Self::eval_arith(*op, &lhs, &rhs)
            }
            Expr::BoolExpr { op, lhs, rhs, .. } => {
                let lhs = self.eval_expr(lhs)?;
                let rhs = self.eval_expr(rhs)?;
                Self::eval_bool(*op, &lhs, &rhs)
            }
            Expr::Logic { op, lhs, rhs, .. } => {
                let lhs = coerce_bool(&self.eval_expr(lhs)?)?;
                match (op, lhs) {
                    (LogicOp::And, false) => Ok(Value::Bool(false)),
                    (LogicOp::Or, true) => Ok(Value::Bool(true)),
                    _ => Ok(Value::Bool(coerce_bool(&self.eval_expr(rhs)?)?)),
                }
            }
            Expr::Choice {
                cond,
                then,
                otherwise,
                ..
            } => {
                if coerce_bool(&self.eval_expr(cond)?)? {
                    self.eval_expr(then)
                } else {
                    self.eval_expr(otherwise)
                }
            }
            Expr::Assign { lhs, rhs, .. } => {
                let value = self.with_mode(EvalMode::Read, |i| i.eval_expr(rhs))?;
                self.assign(lhs, value.clone())?;
                Ok(value)
            }
            Expr::List { items, .. } => Ok(Value::from_array(self.eval_args(items)?)),
            Expr::MapLit { fields, .. } => {
                let mut map = BTreeMap::new();
                for (k, v) in fields {
                    let key = self.eval_expr(k)?.to_text();
                    let value = self.eval_expr(v)?;
                    map.insert(key, value);
                }
                Ok(Value::from_map(map))
            }
        }
    }

    fn eval_args(&mut self, params: &[Ref<Expr>]) -> Result<Vec<Value>> {
        let mut args = Vec::with_capacity(params.len());
        for p in params {
            args.push(self.eval_expr(p)?);
        }
        Ok(args)
    }

    fn eval_call(
        &mut self,
        prefix: &str,
        name: &str,
        params: &[Ref<Expr>],
        arity: usize,
        varargs: bool,
    ) -> Result<Value> {
        let Some(delegate) = self.functions.resolve(prefix, name) else {
            return Err(Error::FunctionNotFound {
                expression: String::new(),
                prefix: prefix.to_string(),
                name: name.to_string(),
            });
        };
        let qualified = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}:{name}")
        };
        if self.strict_arity && !varargs {
            if let Some(expected) = delegate.arity() {
                if expected != arity {
                    return Err(Error::evaluation(format!(
                        "`{qualified}` expects {expected} argument(s), got {arity}"
                    )));
                }
            }
        }
        let args = self.eval_args(params)?;
        let mut call = CallContext {
            container: &mut *self.ctx.container,
        };
        delegate
            .invoke(&mut call, &args)
            .map_err(|source| Error::Function {
                expression: String::new(),
                name: qualified,
                source,
            })
    }

    fn eval_arith(op: ArithOp, lhs: &Value, rhs: &Value) -> Result<Value> {
        if op == ArithOp::Add {
            let concat = |v: &Value| matches!(v, Value::String(_)) && !is_numeric_text(v);
            if concat(lhs) || concat(rhs) {
                return Ok(Value::from(lhs.to_text() + &rhs.to_text()));
            }
        }
        let (a, b) = (coerce_number(lhs)?, coerce_number(rhs)?);
        Ok(Value::Number(match op {
            ArithOp::Add => a.add(&b),
            ArithOp::Sub => a.sub(&b),
            ArithOp::Mul => a.mul(&b),
            ArithOp::Div => a.divide(&b),
            ArithOp::Mod => a.modulo(&b)?,
        }))
    }

    fn eval_bool(op: BoolOp, lhs: &Value, rhs: &Value) -> Result<Value> {
        let result = match op {
            BoolOp::Eq => values_equal(lhs, rhs),
            BoolOp::Ne => !values_equal(lhs, rhs),
            _ if lhs.is_null() || rhs.is_null() => false,
            _ => match compare_values(lhs, rhs)? {
                None => false,
                Some(ord) => match op {
                    BoolOp::Lt => ord == Ordering::Less,
                    BoolOp::Le => ord != Ordering::Greater,
                    BoolOp::Gt => ord == Ordering::Greater,
                    BoolOp::Ge => ord != Ordering::Less,
                    BoolOp::Eq | BoolOp::Ne => false,
                },
            },
        };
        Ok(Value::Bool(result))
    }
}
