// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{deserialization, text_length, ValueFields, VariableType};
use crate::error::Result;
use crate::value::Value;

/// Null or text of at most `max_length` characters, kept in the text slot.
pub struct StringType {
    max_length: usize,
}

impl StringType {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl VariableType for StringType {
    fn type_name(&self) -> &'static str {
        "string"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::String(s) => text_length(s) <= self.max_length,
            _ => false,
        }
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        fields.set_text(value.as_str().map(str::to_string));
        Ok(())
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        Ok(fields.text().map(Value::from).unwrap_or(Value::Null))
    }

    fn spill_type(&self) -> Option<&'static str> {
        Some("longString")
    }
}

/// Text of at least `min_length` characters, kept as UTF-8 in the byte slot.
pub struct LongStringType {
    min_length: usize,
}

impl LongStringType {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }
}

impl VariableType for LongStringType {
    fn type_name(&self) -> &'static str {
        "longString"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => text_length(s) >= self.min_length,
            _ => false,
        }
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        fields.set_text(None);
        fields.set_bytes(value.as_str().map(|s| s.as_bytes().to_vec()));
        Ok(())
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        match fields.bytes() {
            None => Ok(Value::Null),
            Some(bytes) => match core::str::from_utf8(bytes) {
                Ok(s) => Ok(Value::from(s)),
                Err(e) => Err(deserialization(fields, e.to_string())),
            },
        }
    }
}
