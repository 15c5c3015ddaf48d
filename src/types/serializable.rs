// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{deserialization, is_same_object, MutableType, ValueFields, VariableType};
use crate::error::{Error, Result};
use crate::number::{BigInt, Number};
use crate::value::Value;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use data_encoding::BASE64;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rebuilds a bean from the json form produced by [`crate::Bean::to_json`].
pub type BeanFactory = Arc<dyn Fn(serde_json::Value) -> anyhow::Result<Value> + Send + Sync>;

/// Bean factories keyed by [`crate::Bean::type_name`].
#[derive(Clone, Default)]
pub struct BeanFactories {
    factories: HashMap<String, BeanFactory>,
}

impl BeanFactories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, type_name: &str, factory: BeanFactory) -> &mut Self {
        self.factories.insert(type_name.to_string(), factory);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&BeanFactory> {
        self.factories.get(type_name)
    }
}

/// Self-describing form of a value graph.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
enum Persisted {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    BigInt(String),
    String(String),
    Bytes(String),
    Date(i64),
    LocalDate(NaiveDate),
    LocalDateTime(i64),
    Uuid(Uuid),
    Array(Vec<Persisted>),
    Set(Vec<Persisted>),
    Map(BTreeMap<String, Persisted>),
    Json(serde_json::Value),
    #[serde(rename_all = "camelCase")]
    Object {
        type_name: String,
        state: serde_json::Value,
    },
}

impl Persisted {
    fn encode(value: &Value) -> core::result::Result<Persisted, String> {
        let encode_all = |items: &[Value]| -> core::result::Result<Vec<Persisted>, String> {
            items.iter().map(Persisted::encode).collect()
        };
        Ok(match value {
            Value::Null => Persisted::Null,
            Value::Bool(b) => Persisted::Bool(*b),
            Value::Number(Number::Int(i)) => Persisted::Int(*i),
            Value::Number(Number::Float(f)) => Persisted::Float(*f),
            Value::Number(n) => Persisted::BigInt(n.format_decimal()),
            Value::String(s) => Persisted::String(s.to_string()),
            Value::Bytes(b) => Persisted::Bytes(BASE64.encode(b)),
            Value::Date(d) => Persisted::Date(d.timestamp_millis()),
            Value::LocalDate(d) => Persisted::LocalDate(*d),
            Value::LocalDateTime(d) => Persisted::LocalDateTime(d.and_utc().timestamp_millis()),
            Value::Uuid(u) => Persisted::Uuid(*u),
            Value::Array(items) => Persisted::Array(encode_all(&items.borrow())?),
            Value::Set(items) => Persisted::Set(encode_all(&items.borrow())?),
            Value::Map(fields) => Persisted::Map(
                fields
                    .borrow()
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Persisted::encode(v)?)))
                    .collect::<core::result::Result<_, String>>()?,
            ),
            Value::Json(node) => Persisted::Json(node.to_json()),
            Value::Object(bean) => {
                let bean = bean.borrow();
                match bean.to_json() {
                    Some(state) => Persisted::Object {
                        type_name: bean.type_name().to_string(),
                        state,
                    },
                    None => return Err(format!("{} is not serializable", bean.type_name())),
                }
            }
        })
    }

    fn decode(self, factories: &BeanFactories) -> core::result::Result<Value, String> {
        let decode_all = |items: Vec<Persisted>| {
            items
                .into_iter()
                .map(|p| p.decode(factories))
                .collect::<core::result::Result<Vec<_>, String>>()
        };
        let millis = |ms: i64| {
            DateTime::from_timestamp_millis(ms).ok_or_else(|| format!("{ms} is not a valid timestamp"))
        };
        Ok(match self {
            Persisted::Null => Value::Null,
            Persisted::Bool(b) => Value::Bool(b),
            Persisted::Int(i) => Value::from(i),
            Persisted::Float(f) => Value::from(f),
            Persisted::BigInt(s) => match BigInt::parse_bytes(s.as_bytes(), 10) {
                Some(n) => Value::from(n),
                None => return Err(format!("`{s}` is not an integer")),
            },
            Persisted::String(s) => Value::from(s),
            Persisted::Bytes(b) => Value::from(
                BASE64
                    .decode(b.as_bytes())
                    .map_err(|e| e.to_string())?,
            ),
            Persisted::Date(ms) => Value::Date(millis(ms)?),
            Persisted::LocalDate(d) => Value::LocalDate(d),
            Persisted::LocalDateTime(ms) => Value::LocalDateTime(millis(ms)?.naive_utc()),
            Persisted::Uuid(u) => Value::Uuid(u),
            Persisted::Array(items) => Value::from_array(decode_all(items)?),
            Persisted::Set(items) => Value::from_set(decode_all(items)?),
            Persisted::Map(fields) => Value::from_map(
                fields
                    .into_iter()
                    .map(|(k, v)| Ok((k, v.decode(factories)?)))
                    .collect::<core::result::Result<_, String>>()?,
            ),
            Persisted::Json(json) => Value::json(json),
            Persisted::Object { type_name, state } => match factories.get(&type_name) {
                Some(factory) => factory(state).map_err(|e| format!("{type_name}: {e}"))?,
                None => return Err(format!("no factory for bean type `{type_name}`")),
            },
        })
    }
}

fn encode(value: &Value) -> Result<Vec<u8>> {
    let persisted =
        Persisted::encode(value).map_err(|_| Error::NoMatchingVariableType(value.type_name()))?;
    Ok(serde_json::to_vec(&persisted)?)
}

/// Whether every part of the graph has a persisted form.
fn is_persistable(value: &Value) -> bool {
    match value {
        Value::Array(items) | Value::Set(items) => items.borrow().iter().all(is_persistable),
        Value::Map(fields) => fields.borrow().values().all(is_persistable),
        Value::Object(bean) => bean.borrow().to_json().is_some(),
        _ => true,
    }
}

struct SerializedMutation;

impl MutableType for SerializedMutation {
    /// The snapshot holds the encoded form in a list of its own, so it has
    /// an identity; beans cannot be copied any other way.
    fn snapshot(&self, value: &Value) -> Result<Value> {
        Ok(Value::from_array(vec![Value::from(encode(value)?)]))
    }

    fn is_dirty(&self, snapshot: &Value, current: &Value) -> Result<bool> {
        if is_same_object(snapshot, current) {
            return Ok(false);
        }
        let Value::Array(items) = snapshot else {
            return Ok(true);
        };
        let current = encode(current)?;
        Ok(match items.borrow().first() {
            Some(Value::Bytes(before)) => before.as_ref() != current.as_slice(),
            _ => true,
        })
    }
}

/// Maps, non-empty collections and serializable beans, encoded as a
/// self-describing json document in the byte slot.
pub struct SerializableType {
    tracked: bool,
    factories: BeanFactories,
}

impl SerializableType {
    pub fn new(tracked: bool, factories: BeanFactories) -> Self {
        Self { tracked, factories }
    }
}

impl VariableType for SerializableType {
    fn type_name(&self) -> &'static str {
        "serializable"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        match value {
            Value::Map(_) | Value::Object(_) => is_persistable(value),
            Value::Array(items) | Value::Set(items) => {
                !items.borrow().is_empty() && is_persistable(value)
            }
            _ => false,
        }
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()> {
        fields.set_bytes(Some(encode(value)?));
        Ok(())
    }

    fn read(&self, fields: &dyn ValueFields) -> Result<Value> {
        let Some(bytes) = fields.bytes() else {
            return Ok(Value::Null);
        };
        let persisted: Persisted =
            serde_json::from_slice(bytes).map_err(|e| deserialization(fields, e.to_string()))?;
        persisted
            .decode(&self.factories)
            .map_err(|message| deserialization(fields, message))
    }

    fn mutation(&self) -> Option<&dyn MutableType> {
        match self.tracked {
            true => Some(&SerializedMutation),
            false => None,
        }
    }
}
