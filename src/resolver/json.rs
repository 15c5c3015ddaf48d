// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{ElContext, EvalMode, Resolver};
use crate::error::{Error, Result};
use crate::tree::JsonKey;
use crate::value::Value;

/// Structured json trees.
///
/// A missing child reads as null. While the context is in write mode a
/// missing field of an object node is created as an empty object, so that
/// `a.b.c = 1` builds `b` on demand.
pub struct JsonResolver;

impl Resolver for JsonResolver {
    fn name(&self) -> &'static str {
        "json"
    }

    fn get_value(
        &self,
        ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
    ) -> Result<Option<Value>> {
        let Some(Value::Json(node)) = base else {
            return Ok(None);
        };
        let Some(key) = node.key_for(property) else {
            return Ok(Some(Value::Null));
        };
        if let Some(v) = node.get_child(&key) {
            return Ok(Some(v));
        }
        match (&key, ctx.mode) {
            (JsonKey::Field(field), EvalMode::Write) if node.is_object() => {
                Ok(Some(node.get_or_create_object(field).unwrap_or(Value::Null)))
            }
            _ => Ok(Some(Value::Null)),
        }
    }

    fn set_value(
        &self,
        _ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
        value: Value,
    ) -> Result<bool> {
        let Some(Value::Json(node)) = base else {
            return Ok(false);
        };
        match node.key_for(property) {
            Some(key) if node.set_child(&key, &value) => Ok(true),
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
            Some(Value::Json(_)) => Some(false),
            _ => None,
        })
    }
}
