// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! `variables:` functions. They take the name of a variable as their first
//! argument; a bare identifier in that position is taken as the name rather
//! than evaluated.

use super::{CallContext, CallSite, FunctionBuilders, FunctionDef, FunctionDelegate};
use crate::ast::Expr;
use crate::error::Result;
use crate::interpreter::{compare_values, values_equal};
use crate::value::Value;

use core::cmp::Ordering;
use std::sync::Arc;

use anyhow::bail;
use data_encoding::BASE64;
use lazy_static::lazy_static;

pub const PREFIXES: [&str; 3] = ["variables", "vars", "var"];

type VariableFcn = fn(&mut CallContext<'_>, &str, &[Value]) -> anyhow::Result<Value>;

#[rustfmt::skip]
lazy_static! {
    static ref VARIABLE_FUNCTIONS: Vec<(&'static str, Option<usize>, VariableFcn)> = vec![
	("get", Some(1), get),
	("getOrDefault", Some(2), get_or_default),
	("exists", Some(1), exists),
	("isEmpty", Some(1), is_empty),
	("isNotEmpty", Some(1), is_not_empty),
	("equals", Some(2), equals),
	("notEquals", Some(2), not_equals),
	("lowerThan", Some(2), lower_than),
	("lowerThanOrEquals", Some(2), lower_than_or_equals),
	("greaterThan", Some(2), greater_than),
	("greaterThanOrEquals", Some(2), greater_than_or_equals),
	("contains", None, contains),
	("containsAny", None, contains_any),
	("base64", Some(1), base64),
    ];
}

/// Delegates for all variable functions, declared under every prefix.
pub fn delegates() -> Vec<Arc<dyn FunctionDelegate>> {
    VARIABLE_FUNCTIONS
        .iter()
        .map(|(name, arity, fcn)| {
            let fcn = *fcn;
            let def = FunctionDef::new(PREFIXES[0], name, move |ctx, args| {
                let Some(variable) = args.first() else {
                    bail!("expects a variable name");
                };
                fcn(ctx, &variable.to_text(), &args[1..])
            });
            let def = PREFIXES[1..]
                .iter()
                .fold(def, |def, prefix| def.with_prefix(prefix));
            let def = match arity {
                Some(n) => def.with_arity(*n),
                None => def,
            };
            Arc::new(def) as Arc<dyn FunctionDelegate>
        })
        .collect()
}

/// Turns a leading identifier argument into its name.
pub struct VariableNameBuilder {
    varargs: bool,
}

impl super::FunctionNodeBuilder for VariableNameBuilder {
    fn build(&self, mut site: CallSite) -> Result<Expr> {
        if let Some(first) = site.params.first() {
            if let Expr::Ident { span, name } = first.as_ref() {
                let literal = Expr::String {
                    span: span.clone(),
                    value: name.clone(),
                };
                site.params[0] = crate::ast::Ref::new(literal);
            }
        }
        let arity = site.params.len();
        Ok(Expr::Call {
            span: site.span,
            prefix: site.prefix,
            name: site.name,
            params: site.params,
            arity,
            varargs: self.varargs,
        })
    }
}

pub fn register_builders(builders: &mut FunctionBuilders) {
    for (name, arity, _) in VARIABLE_FUNCTIONS.iter() {
        let builder = Arc::new(VariableNameBuilder {
            varargs: arity.is_none(),
        });
        for prefix in PREFIXES {
            builders.add(&format!("{prefix}:{name}"), builder.clone());
        }
    }
}

fn value_of(ctx: &mut CallContext<'_>, name: &str) -> anyhow::Result<Value> {
    Ok(ctx.container.get_variable(name)?.unwrap_or(Value::Null))
}

fn get(ctx: &mut CallContext<'_>, name: &str, _args: &[Value]) -> anyhow::Result<Value> {
    value_of(ctx, name)
}

fn get_or_default(ctx: &mut CallContext<'_>, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    match value_of(ctx, name)? {
        Value::Null => Ok(args.first().cloned().unwrap_or(Value::Null)),
        v => Ok(v),
    }
}

fn exists(ctx: &mut CallContext<'_>, name: &str, _args: &[Value]) -> anyhow::Result<Value> {
    if !ctx.container.has_variable(name) {
        return Ok(Value::Bool(false));
    }
    Ok(Value::Bool(!value_of(ctx, name)?.is_null()))
}

fn is_empty(ctx: &mut CallContext<'_>, name: &str, _args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::Bool(value_of(ctx, name)?.is_empty()))
}

fn is_not_empty(ctx: &mut CallContext<'_>, name: &str, _args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::Bool(!value_of(ctx, name)?.is_empty()))
}

fn expected(args: &[Value]) -> Value {
    args.first().cloned().unwrap_or(Value::Null)
}

fn equals(ctx: &mut CallContext<'_>, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::Bool(values_equal(&value_of(ctx, name)?, &expected(args))))
}

fn not_equals(ctx: &mut CallContext<'_>, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::Bool(!values_equal(&value_of(ctx, name)?, &expected(args))))
}

/// Ordering of the variable against the argument; `None` when either is null.
fn order(ctx: &mut CallContext<'_>, name: &str, args: &[Value]) -> anyhow::Result<Option<Ordering>> {
    let (value, other) = (value_of(ctx, name)?, expected(args));
    if value.is_null() || other.is_null() {
        return Ok(None);
    }
    Ok(compare_values(&value, &other)?)
}

fn lower_than(ctx: &mut CallContext<'_>, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::Bool(order(ctx, name, args)? == Some(Ordering::Less)))
}

fn lower_than_or_equals(
    ctx: &mut CallContext<'_>,
    name: &str,
    args: &[Value],
) -> anyhow::Result<Value> {
    Ok(Value::Bool(matches!(
        order(ctx, name, args)?,
        Some(Ordering::Less | Ordering::Equal)
    )))
}

fn greater_than(ctx: &mut CallContext<'_>, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::Bool(order(ctx, name, args)? == Some(Ordering::Greater)))
}

fn greater_than_or_equals(
    ctx: &mut CallContext<'_>,
    name: &str,
    args: &[Value],
) -> anyhow::Result<Value> {
    Ok(Value::Bool(matches!(
        order(ctx, name, args)?,
        Some(Ordering::Greater | Ordering::Equal)
    )))
}

/// Whether the variable holds `needle`: a substring of text, an element of a
/// collection, or an element of a json array.
fn holds(value: &Value, needle: &Value) -> bool {
    match value {
        Value::String(s) => s.contains(needle.to_text().as_str()),
        Value::Array(items) | Value::Set(items) => {
            items.borrow().iter().any(|v| values_equal(v, needle))
        }
        Value::Map(fields) => fields.borrow().contains_key(&needle.to_text()),
        Value::Json(node) => {
            let needle = needle.to_json();
            node.with(|n| match n {
                Some(serde_json::Value::Array(items)) => items.contains(&needle),
                Some(serde_json::Value::Object(fields)) => match &needle {
                    serde_json::Value::String(key) => fields.contains_key(key),
                    _ => false,
                },
                _ => false,
            })
        }
        _ => false,
    }
}

fn contains(ctx: &mut CallContext<'_>, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let value = value_of(ctx, name)?;
    if value.is_null() {
        return Ok(Value::Bool(false));
    }
    Ok(Value::Bool(args.iter().all(|needle| holds(&value, needle))))
}

fn contains_any(ctx: &mut CallContext<'_>, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let value = value_of(ctx, name)?;
    Ok(Value::Bool(args.iter().any(|needle| holds(&value, needle))))
}

fn base64(ctx: &mut CallContext<'_>, name: &str, _args: &[Value]) -> anyhow::Result<Value> {
    Ok(match value_of(ctx, name)? {
        Value::Null => Value::Null,
        Value::Bytes(b) => Value::from(BASE64.encode(&b)),
        Value::String(s) => Value::from(BASE64.encode(s.as_bytes())),
        v => bail!("cannot base64 encode a value of type {}", v.type_name()),
    })
}
