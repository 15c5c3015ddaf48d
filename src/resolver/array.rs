// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{to_index, ElContext, Resolver};
use crate::error::{Error, Result};
use crate::value::Value;

/// Ordered sequences indexed by integers.
///
/// Reading past either end yields null. Writing past either end is an error.
pub struct ArrayResolver;

impl Resolver for ArrayResolver {
    fn name(&self) -> &'static str {
        "array"
    }

    fn get_value(
        &self,
        _ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
    ) -> Result<Option<Value>> {
        let Some(Value::Array(items)) = base else {
            return Ok(None);
        };
        let items = items.borrow();
        match to_index(property, items.len()) {
            Some(i) => Ok(Some(items.get(i).cloned().unwrap_or(Value::Null))),
            None if matches!(property, Value::Number(_)) => Ok(Some(Value::Null)),
            None => Err(Error::property_not_found(property.to_text())),
        }
    }

    fn set_value(
        &self,
        _ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
        value: Value,
    ) -> Result<bool> {
        let Some(Value::Array(items)) = base else {
            return Ok(false);
        };
        let mut items = items.borrow_mut();
        match to_index(property, items.len()) {
            Some(i) if i < items.len() => {
                items[i] = value;
                Ok(true)
            }
            _ => Err(Error::property_not_found(property.to_text())),
        }
    }

    fn is_read_only(
        &self,
        _ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        _property: &Value,
    ) -> Result<Option<bool>> {
        Ok(match base {
            Some(Value::Array(_)) => Some(false),
            _ => None,
        })
    }
}
