// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{ElContext, Resolver};
use crate::error::{Error, Result};
use crate::interpreter::values_equal;
use crate::value::Value;

/// Fallback over foreign objects, plus the built-in methods of text and
/// collection values.
pub struct BeanResolver;

fn expect_args(method: &str, args: &[Value], count: usize) -> Result<()> {
    if args.len() != count {
        return Err(Error::evaluation(format!(
            "`{method}` expects {count} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

fn text_arg(method: &str, args: &[Value]) -> Result<String> {
    expect_args(method, args, 1)?;
    Ok(args[0].to_text())
}

fn string_method(s: &str, method: &str, args: &[Value]) -> Result<Option<Value>> {
    Ok(Some(match method {
        "length" | "size" => {
            expect_args(method, args, 0)?;
            Value::from(s.chars().count())
        }
        "isEmpty" => {
            expect_args(method, args, 0)?;
            Value::Bool(s.is_empty())
        }
        "toUpperCase" => {
            expect_args(method, args, 0)?;
            Value::from(s.to_uppercase())
        }
        "toLowerCase" => {
            expect_args(method, args, 0)?;
            Value::from(s.to_lowercase())
        }
        "contains" => Value::Bool(s.contains(text_arg(method, args)?.as_str())),
        "startsWith" => Value::Bool(s.starts_with(text_arg(method, args)?.as_str())),
        "endsWith" => Value::Bool(s.ends_with(text_arg(method, args)?.as_str())),
        _ => return Ok(None),
    }))
}

fn collection_method(base: &Value, method: &str, args: &[Value]) -> Result<Option<Value>> {
    Ok(Some(match (base, method) {
        (_, "size" | "length") => {
            expect_args(method, args, 0)?;
            Value::from(base.len().unwrap_or(0))
        }
        (_, "isEmpty") => {
            expect_args(method, args, 0)?;
            Value::Bool(base.is_empty())
        }
        (Value::Array(items) | Value::Set(items), "contains") => {
            expect_args(method, args, 1)?;
            Value::Bool(items.borrow().iter().any(|v| values_equal(v, &args[0])))
        }
        (Value::Array(items), "get") => {
            expect_args(method, args, 1)?;
            let items = items.borrow();
            match super::to_index(&args[0], items.len()).and_then(|i| items.get(i)) {
                Some(v) => v.clone(),
                None => return Err(Error::evaluation("index out of bounds")),
            }
        }
        (Value::Map(fields), "contains" | "containsKey") => {
            Value::Bool(fields.borrow().contains_key(&text_arg(method, args)?))
        }
        (Value::Map(fields), "get") => fields
            .borrow()
            .get(&text_arg(method, args)?)
            .cloned()
            .unwrap_or(Value::Null),
        (Value::Json(node), "get") => {
            expect_args(method, args, 1)?;
            node.key_for(&args[0])
                .and_then(|key| node.get_child(&key))
                .unwrap_or(Value::Null)
        }
        (Value::Json(node), "contains" | "containsKey") => {
            expect_args(method, args, 1)?;
            if node.is_array() {
                let needle = args[0].to_json();
                let found = node.with(|n| match n {
                    Some(serde_json::Value::Array(items)) => items.contains(&needle),
                    _ => false,
                });
                Value::Bool(found)
            } else {
                let key = args[0].to_text();
                let found = node.with(|n| match n {
                    Some(serde_json::Value::Object(fields)) => fields.contains_key(&key),
                    _ => false,
                });
                Value::Bool(found)
            }
        }
        _ => return Ok(None),
    }))
}

impl Resolver for BeanResolver {
    fn name(&self) -> &'static str {
        "bean"
    }

    fn get_value(
        &self,
        _ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
    ) -> Result<Option<Value>> {
        match base {
            Some(Value::Object(bean)) => Ok(bean.borrow().get_property(&property.to_text())),
            _ => Ok(None),
        }
    }

    fn set_value(
        &self,
        _ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
        value: Value,
    ) -> Result<bool> {
        let Some(Value::Object(bean)) = base else {
            return Ok(false);
        };
        let name = property.to_text();
        let mut bean = bean.borrow_mut();
        if !bean.is_writable(&name) {
            return match bean.get_property(&name) {
                Some(_) => Err(Error::not_writable(name)),
                None => Ok(false),
            };
        }
        bean.set_property(&name, value).map_err(|e| Error::Function {
            expression: String::new(),
            name: format!("{}.{name}", bean.type_name()),
            source: e,
        })
    }

    fn is_read_only(
        &self,
        _ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
    ) -> Result<Option<bool>> {
        let Some(Value::Object(bean)) = base else {
            return Ok(None);
        };
        let name = property.to_text();
        let bean = bean.borrow();
        Ok(bean
            .get_property(&name)
            .map(|_| !bean.is_writable(&name)))
    }

    fn invoke(
        &self,
        _ctx: &mut ElContext<'_>,
        base: &Value,
        method: &str,
        args: &[Value],
    ) -> Result<Option<Value>> {
        match base {
            Value::Object(bean) => {
                let mut bean = bean.borrow_mut();
                match bean.invoke(method, args) {
                    Some(Ok(v)) => Ok(Some(v)),
                    Some(Err(e)) => Err(Error::Function {
                        expression: String::new(),
                        name: format!("{}.{method}", bean.type_name()),
                        source: e,
                    }),
                    None => Ok(None),
                }
            }
            Value::String(s) => string_method(s, method, args),
            Value::Array(_) | Value::Set(_) | Value::Map(_) | Value::Json(_) => {
                collection_method(base, method, args)
            }
            _ => Ok(None),
        }
    }
}
