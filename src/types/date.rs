// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{deserialization, ValueFields, VariableType};
use crate::error::{Error, Result};
use crate::value::Value;

use chrono::{DateTime, NaiveDate};

fn from_millis(fields: &dyn ValueFields, millis: i64) -> Result<DateTime<chrono::Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| deserialization(fields, format!("{millis} is not a valid timestamp")))
}

/// Instants, kept as epoch milliseconds in the long slot.
pub struct DateType;

impl VariableType for DateType {
    fn type_name(&self) -> &'static str {
        "date"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        matches!(value, Value::Date(_))
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        if let Value::Date(d) = value {
            fields.set_long_value(Some(d.timestamp_millis()));
        }
        Ok(())
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        match fields.long_value() {
            Some(millis) => Ok(Value::Date(from_millis(fields, millis)?)),
            None => Ok(Value::Null),
        }
    }
}

/// Calendar dates, kept as ISO-8601 text.
pub struct LocalDateType;

impl VariableType for LocalDateType {
    fn type_name(&self) -> &'static str {
        "localDate"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        matches!(value, Value::LocalDate(_))
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        if let Value::LocalDate(d) = value {
            fields.set_text(Some(d.format("%Y-%m-%d").to_string()));
        }
        Ok(())
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        match fields.text() {
            Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(Value::LocalDate)
                .map_err(|e| deserialization(fields, e.to_string())),
            None => Ok(Value::Null),
        }
    }
}

/// Wall-clock date-times, kept as milliseconds with UTC as the reference.
pub struct LocalDateTimeType;

impl VariableType for LocalDateTimeType {
    fn type_name(&self) -> &'static str {
        "localDateTime"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        matches!(value, Value::LocalDateTime(_))
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        if let Value::LocalDateTime(d) = value {
            fields.set_long_value(Some(d.and_utc().timestamp_millis()));
        }
        Ok(())
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        match fields.long_value() {
            Some(millis) => Ok(Value::LocalDateTime(from_millis(fields, millis)?.naive_utc())),
            None => Ok(Value::Null),
        }
    }
}

/// Legacy date values. Only read, never chosen for new values.
pub struct JodaDateType;

impl VariableType for JodaDateType {
    fn type_name(&self) -> &'static str {
        "jodaDate"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, _value: &Value) -> bool {
        false
    }

    fn write(&self, _value: &Value, _fields: &mut dyn ValueFields) -> Result<()> {
        Err(Error::UnsupportedMutationForReadOnlyType(self.type_name().to_string()))
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        match fields.long_value() {
            Some(millis) => Ok(Value::LocalDate(from_millis(fields, millis)?.date_naive())),
            None => Ok(Value::Null),
        }
    }

    fn is_read_only(&self) -> bool {
        true
    }
}

/// Legacy instants. Only read, never chosen for new values.
pub struct JodaDateTimeType;

impl VariableType for JodaDateTimeType {
    fn type_name(&self) -> &'static str {
        "jodaDateTime"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, _value: &Value) -> bool {
        false
    }

    fn write(&self, _value: &Value, _fields: &mut dyn ValueFields) -> Result<()> {
        Err(Error::UnsupportedMutationForReadOnlyType(self.type_name().to_string()))
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        match fields.long_value() {
            Some(millis) => Ok(Value::Date(from_millis(fields, millis)?)),
            None => Ok(Value::Null),
        }
    }

    fn is_read_only(&self) -> bool {
        true
    }
}
