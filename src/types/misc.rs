// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{deserialization, ValueFields, VariableType};
use crate::error::Result;
use crate::value::Value;

use uuid::Uuid;

pub struct NullType;

impl VariableType for NullType {
    fn type_name(&self) -> &'static str {
        "null"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        value.is_null()
    }

    fn write(&self, _value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        fields.clear_slots();
        Ok(())
    }

    fn read(&self, _fields: &dyn ValueFields) -> Result<Value> {
        Ok(Value::Null)
    }
}

pub struct UuidType;

impl VariableType for UuidType {
    fn type_name(&self) -> &'static str {
        "uuid"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        matches!(value, Value::Uuid(_))
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        if let Value::Uuid(u) = value {
            fields.set_text(Some(u.to_string()));
        }
        Ok(())
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        match fields.text() {
            Some(text) => Uuid::parse_str(text)
                .map(Value::Uuid)
                .map_err(|e| deserialization(fields, e.to_string())),
            None => Ok(Value::Null),
        }
    }
}

/// Raw bytes. Never cached; every read hands out a fresh copy.
pub struct BytesType;

impl VariableType for BytesType {
    fn type_name(&self) -> &'static str {
        "bytes"
    }

    fn is_cachable(&self) -> bool {
        false
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        matches!(value, Value::Bytes(_))
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        if let Value::Bytes(b) = value {
            fields.set_bytes(Some(b.to_vec()));
        }
        Ok(())
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        Ok(fields
            .bytes()
            .map(|b| Value::from(b.to_vec()))
            .unwrap_or(Value::Null))
    }
}

/// Empty lists and sets, kept as the text `list` or `set` so they come back
/// as the same kind of collection.
pub struct EmptyCollectionType;

const LIST: &str = "list";
const SET: &str = "set";

impl VariableType for EmptyCollectionType {
    fn type_name(&self) -> &'static str {
        "emptyCollection"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        match value {
            Value::Array(items) | Value::Set(items) => items.borrow().is_empty(),
            _ => false,
        }
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        let kind = match value {
            Value::Set(_) => SET,
            _ => LIST,
        };
        fields.set_text(Some(kind.to_string()));
        Ok(())
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        match fields.text() {
            Some(SET) => Ok(Value::new_set()),
            Some(LIST) | None => Ok(Value::new_array()),
            Some(other) => Err(deserialization(
                fields,
                format!("unknown collection kind `{other}`"),
            )),
        }
    }
}
