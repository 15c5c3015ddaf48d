// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{deserialization, is_same_object, text_length, MutableType, ValueFields, VariableType};
use crate::error::Result;
use crate::value::Value;

fn encode(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(&value.to_json())?)
}

fn decode(fields: &dyn ValueFields, text: &str) -> Result<Value> {
    serde_json::from_str(text)
        .map(Value::json)
        .map_err(|e| deserialization(fields, e.to_string()))
}

fn encoded_length(value: &Value) -> Option<usize> {
    match value {
        Value::Json(_) => encode(value).ok().map(|s| text_length(&s)),
        _ => None,
    }
}

/// Json trees compare by their serialized form.
struct JsonMutation;

impl MutableType for JsonMutation {
    fn snapshot(&self, value: &Value) -> Result<Value> {
        Ok(value.deep_copy())
    }

    fn is_dirty(&self, snapshot: &Value, current: &Value) -> Result<bool> {
        if is_same_object(snapshot, current) {
            return Ok(false);
        }
        Ok(encode(snapshot)? != encode(current)?)
    }
}

/// Json whose text form fits `max_length` characters, kept in the text slot.
pub struct JsonType {
    max_length: usize,
    tracked: bool,
}

impl JsonType {
    pub fn new(max_length: usize, tracked: bool) -> Self {
        Self {
            max_length,
            tracked,
        }
    }
}

impl VariableType for JsonType {
    fn type_name(&self) -> &'static str {
        "json"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        matches!(encoded_length(value), Some(n) if n <= self.max_length)
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        fields.set_text(Some(encode(value)?));
        Ok(())
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        match fields.text() {
            Some(text) => decode(fields, text),
            None => Ok(Value::Null),
        }
    }

    fn spill_type(&self) -> Option<&'static str> {
        Some("longJson")
    }

    fn mutation(&self) -> Option<&dyn MutableType> {
        match self.tracked {
            true => Some(&JsonMutation),
            false => None,
        }
    }
}

/// Json too long for the text slot, kept as UTF-8 in the byte slot.
pub struct LongJsonType {
    min_length: usize,
    tracked: bool,
}

impl LongJsonType {
    pub fn new(min_length: usize, tracked: bool) -> Self {
        Self {
            min_length,
            tracked,
        }
    }
}

impl VariableType for LongJsonType {
    fn type_name(&self) -> &'static str {
        "longJson"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        matches!(encoded_length(value), Some(n) if n >= self.min_length)
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        fields.set_text(None);
        fields.set_bytes(Some(encode(value)?.into_bytes()));
        Ok(())
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        match fields.bytes() {
            Some(bytes) => match core::str::from_utf8(bytes) {
                Ok(text) => decode(fields, text),
                Err(e) => Err(deserialization(fields, e.to_string())),
            },
            None => Ok(Value::Null),
        }
    }

    fn mutation(&self) -> Option<&dyn MutableType> {
        match self.tracked {
            true => Some(&JsonMutation),
            false => None,
        }
    }
}
