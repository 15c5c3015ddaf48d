// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{ElContext, Resolver};
use crate::error::Result;
use crate::value::Value;

/// Root names backed by the variable container.
pub struct VariableResolver;

fn root_name(base: Option<&Value>, property: &Value) -> Option<String> {
    match (base, property) {
        (None, Value::String(name)) => Some(name.to_string()),
        _ => None,
    }
}

impl Resolver for VariableResolver {
    fn name(&self) -> &'static str {
        "variable"
    }

    fn get_value(
        &self,
        ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
    ) -> Result<Option<Value>> {
        match root_name(base, property) {
            Some(name) if ctx.container.has_variable(&name) => {
                Ok(Some(ctx.container.get_variable(&name)?.unwrap_or(Value::Null)))
            }
            _ => Ok(None),
        }
    }

    fn set_value(
        &self,
        ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
        value: Value,
    ) -> Result<bool> {
        match root_name(base, property) {
            Some(name) if ctx.container.has_variable(&name) => {
                ctx.container.set_variable(&name, value)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn is_read_only(
        &self,
        ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
    ) -> Result<Option<bool>> {
        Ok(match root_name(base, property) {
            Some(name) if ctx.container.has_variable(&name) => Some(false),
            _ => None,
        })
    }
}
