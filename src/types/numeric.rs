// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{deserialization, ValueFields, VariableType};
use crate::error::Result;
use crate::number::{BigInt, Number};
use crate::value::Value;

pub struct BooleanType;

impl VariableType for BooleanType {
    fn type_name(&self) -> &'static str {
        "boolean"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        matches!(value, Value::Bool(_))
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        fields.set_long_value(value.as_bool().map(i64::from));
        Ok(())
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        Ok(match fields.long_value() {
            Some(v) => Value::Bool(v == 1),
            None => Value::Null,
        })
    }
}

/// Integers in `min..=max`, kept in the long slot.
fn integer_in(value: &Value, min: i64, max: i64) -> bool {
    match value {
        Value::Number(Number::Int(i)) => (min..=max).contains(i),
        _ => false,
    }
}

fn write_long(value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
    fields.set_long_value(value.as_i64());
    Ok(())
}

fn read_long(fields: &dyn ValueFields) -> Value {
    fields.long_value().map(Value::from).unwrap_or(Value::Null)
}

pub struct LongType;

impl VariableType for LongType {
    fn type_name(&self) -> &'static str {
        "long"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        integer_in(value, i64::MIN, i64::MAX)
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        write_long(value, fields)
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        Ok(read_long(fields))
    }
}

/// 32 bit integers. Never picked for new values while `long` is
/// registered ahead of it; kept to read values stored under this name.
pub struct IntegerType;

impl VariableType for IntegerType {
    fn type_name(&self) -> &'static str {
        "integer"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        integer_in(value, i32::MIN as i64, i32::MAX as i64)
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        write_long(value, fields)
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        Ok(read_long(fields))
    }
}

pub struct ShortType;

impl VariableType for ShortType {
    fn type_name(&self) -> &'static str {
        "short"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        integer_in(value, i16::MIN as i64, i16::MAX as i64)
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        write_long(value, fields)
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        Ok(read_long(fields))
    }
}

pub struct DoubleType;

impl VariableType for DoubleType {
    fn type_name(&self) -> &'static str {
        "double"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        matches!(value, Value::Number(Number::Float(_)))
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        fields.set_double_value(value.as_number().map(Number::as_f64));
        Ok(())
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        Ok(fields
            .double_value()
            .map(Value::from)
            .unwrap_or(Value::Null))
    }
}

/// Integers beyond 64 bits, kept as decimal text.
pub struct BigIntegerType;

impl VariableType for BigIntegerType {
    fn type_name(&self) -> &'static str {
        "bigInteger"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        matches!(value, Value::Number(Number::BigInt(_)))
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        fields.set_text(value.as_number().map(Number::format_decimal));
        Ok(())
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        match fields.text() {
            None => Ok(Value::Null),
            Some(text) => match BigInt::parse_bytes(text.as_bytes(), 10) {
                Some(n) => Ok(Value::from(n)),
                None => Err(deserialization(fields, format!("`{text}` is not an integer"))),
            },
        }
    }
}
