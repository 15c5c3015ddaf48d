// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{ElContext, Resolver};
use crate::error::Result;
use crate::value::Value;

/// String keyed maps. Missing keys read as null.
pub struct MapResolver;

impl Resolver for MapResolver {
    fn name(&self) -> &'static str {
        "map"
    }

    fn get_value(
        &self,
        _ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
    ) -> Result<Option<Value>> {
        let Some(Value::Map(fields)) = base else {
            return Ok(None);
        };
        let key = property.to_text();
        Ok(Some(
            fields.borrow().get(&key).cloned().unwrap_or(Value::Null),
        ))
    }

    fn set_value(
        &self,
        _ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
        value: Value,
    ) -> Result<bool> {
        let Some(Value::Map(fields)) = base else {
            return Ok(false);
        };
        fields.borrow_mut().insert(property.to_text(), value);
        Ok(true)
    }

    fn is_read_only(
        &self,
        _ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        _property: &Value,
    ) -> Result<Option<bool>> {
        Ok(match base {
            Some(Value::Map(_)) => Some(false),
            _ => None,
        })
    }
}
