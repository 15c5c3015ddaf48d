// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::number::{BigInt, Number};
use crate::tree::JsonNode;

use core::cell::{Ref, RefCell, RefMut};
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::BTreeMap;
use std::rc::Rc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use data_encoding::BASE64;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;
use uuid::Uuid;

/// Identity of a live, mutable value.
///
/// Every shared handle gets a fresh id when it is created. Clones of the
/// handle keep the id; deep copies get a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    pub fn next() -> NodeId {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A mutable value shared by every holder of the handle.
pub struct Shared<T: ?Sized> {
    id: NodeId,
    cell: Rc<RefCell<T>>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self {
            id: NodeId::next(),
            cell: Rc::new(RefCell::new(value)),
        }
    }
}

impl<T: ?Sized> Shared<T> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.cell.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.cell.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            cell: self.cell.clone(),
        }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.try_borrow() {
            Ok(v) => v.fmt(f),
            Err(_) => write!(f, "<borrowed #{}>", self.id.0),
        }
    }
}

/// Capability descriptor for host objects that are not one of the
/// first-class value kinds.
///
/// The generic bean resolver navigates foreign objects only through this
/// trait. Serialization support is opt-in through `to_json`; the serialized
/// form is restored by looking up a factory registered under `type_name`.
pub trait Bean: fmt::Debug {
    fn type_name(&self) -> &str;

    fn get_property(&self, name: &str) -> Option<Value>;

    /// Returns `Ok(false)` when the bean has no such property.
    fn set_property(&mut self, _name: &str, _value: Value) -> anyhow::Result<bool> {
        Ok(false)
    }

    fn is_writable(&self, _name: &str) -> bool {
        false
    }

    /// `None` when the bean has no method with this name.
    fn invoke(&mut self, _method: &str, _args: &[Value]) -> Option<anyhow::Result<Value>> {
        None
    }

    fn to_json(&self) -> Option<serde_json::Value> {
        None
    }
}

pub type ObjectRef = Shared<dyn Bean>;

/// Runtime values seen by expressions and stored in variables.
///
/// Arrays, sets, maps, json trees and objects are live handles: assigning
/// through a resolver mutates the value every holder sees.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(Rc<str>),
    Bytes(Rc<[u8]>),
    Date(DateTime<Utc>),
    LocalDate(NaiveDate),
    LocalDateTime(NaiveDateTime),
    Uuid(Uuid),

    // Ordered sequence.
    Array(Shared<Vec<Value>>),

    // Insertion ordered, duplicates are dropped on insert.
    Set(Shared<Vec<Value>>),

    // String keyed mapping.
    Map(Shared<BTreeMap<String, Value>>),

    // Cursor into a structured json tree.
    Json(JsonNode),

    // Foreign object.
    Object(ObjectRef),
}

/// Coarse classification used by `get_type` queries and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Bytes,
    Date,
    LocalDate,
    LocalDateTime,
    Uuid,
    Array,
    Set,
    Map,
    Json,
    Object,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Bytes => "bytes",
            ValueKind::Date => "date",
            ValueKind::LocalDate => "localDate",
            ValueKind::LocalDateTime => "localDateTime",
            ValueKind::Uuid => "uuid",
            ValueKind::Array => "array",
            ValueKind::Set => "set",
            ValueKind::Map => "map",
            ValueKind::Json => "json",
            ValueKind::Object => "object",
        }
    }
}

impl Value {
    pub fn new_array() -> Value {
        Value::Array(Shared::new(vec![]))
    }

    pub fn new_set() -> Value {
        Value::Set(Shared::new(vec![]))
    }

    pub fn new_map() -> Value {
        Value::Map(Shared::new(BTreeMap::new()))
    }

    pub fn from_array(items: Vec<Value>) -> Value {
        Value::Array(Shared::new(items))
    }

    pub fn from_set(items: Vec<Value>) -> Value {
        let mut unique: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Value::Set(Shared::new(unique))
    }

    pub fn from_map(m: BTreeMap<String, Value>) -> Value {
        Value::Map(Shared::new(m))
    }

    /// Wrap a json document as a live tree.
    pub fn json(json: serde_json::Value) -> Value {
        Value::Json(JsonNode::new(json))
    }

    pub fn json_str(json: &str) -> crate::Result<Value> {
        Ok(Value::json(serde_json::from_str(json)?))
    }

    pub fn object<B: Bean + 'static>(bean: B) -> Value {
        let cell: Rc<RefCell<dyn Bean>> = Rc::new(RefCell::new(bean));
        Value::Object(Shared {
            id: NodeId::next(),
            cell,
        })
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Date(_) => ValueKind::Date,
            Value::LocalDate(_) => ValueKind::LocalDate,
            Value::LocalDateTime(_) => ValueKind::LocalDateTime,
            Value::Uuid(_) => ValueKind::Uuid,
            Value::Array(_) => ValueKind::Array,
            Value::Set(_) => ValueKind::Set,
            Value::Map(_) => ValueKind::Map,
            Value::Json(_) => ValueKind::Json,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Name of the runtime type, used in diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Value::Object(o) => o.borrow().type_name().to_string(),
            _ => self.kind().as_str().to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Identity of the live value, if it is one.
    pub fn identity(&self) -> Option<NodeId> {
        match self {
            Value::Array(a) | Value::Set(a) => Some(a.id()),
            Value::Map(m) => Some(m.id()),
            Value::Json(j) => Some(j.root_id()),
            Value::Object(o) => Some(o.id()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(Number::as_i64)
    }

    pub fn as_json(&self) -> Option<&JsonNode> {
        match self {
            Value::Json(j) => Some(j),
            _ => None,
        }
    }

    /// Number of elements of a collection-like value.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::Bytes(b) => Some(b.len()),
            Value::Array(a) | Value::Set(a) => Some(a.borrow().len()),
            Value::Map(m) => Some(m.borrow().len()),
            Value::Json(j) => j.len(),
            _ => None,
        }
    }

    /// EL `empty`: null, empty text and empty containers.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            _ => self.len() == Some(0),
        }
    }

    /// Independent copy of the value and everything reachable from it.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Array(a) => Value::from_array(a.borrow().iter().map(Value::deep_copy).collect()),
            Value::Set(s) => Value::Set(Shared::new(
                s.borrow().iter().map(Value::deep_copy).collect(),
            )),
            Value::Map(m) => Value::from_map(
                m.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.deep_copy()))
                    .collect(),
            ),
            Value::Json(j) => Value::Json(j.deep_copy()),
            // Foreign objects are copied by the codec that understands them.
            _ => self.clone(),
        }
    }

    /// Convert to a json document. Dates become RFC 3339 strings, bytes
    /// become base64 and objects use their own json form, if any.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(Number::Int(i)) => Json::from(*i),
            Value::Number(n) => match serde_json::Number::from_f64(n.to_f64_lossy()) {
                Some(n) => Json::Number(n),
                None => Json::String(n.format_decimal()),
            },
            Value::String(s) => Json::String(s.to_string()),
            Value::Bytes(b) => Json::String(BASE64.encode(b)),
            Value::Date(d) => Json::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::LocalDate(d) => Json::String(d.to_string()),
            Value::LocalDateTime(d) => Json::String(d.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()),
            Value::Uuid(u) => Json::String(u.to_string()),
            Value::Array(a) | Value::Set(a) => {
                Json::Array(a.borrow().iter().map(Value::to_json).collect())
            }
            Value::Map(m) => Json::Object(
                m.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Json(j) => j.to_json(),
            Value::Object(o) => {
                let bean = o.borrow();
                bean.to_json()
                    .unwrap_or_else(|| Json::String(format!("<{}>", bean.type_name())))
            }
        }
    }

    /// Convert a json document into plain values: objects become maps and
    /// arrays become arrays. Use [`Value::json`] to keep it as a tree.
    pub fn from_json(json: serde_json::Value) -> Value {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::from(n),
            Json::String(s) => Value::from(s),
            Json::Array(items) => {
                Value::from_array(items.into_iter().map(Value::from_json).collect())
            }
            Json::Object(fields) => Value::from_map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Text used for string coercion and composite expressions.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.to_string(),
            Value::Number(n) => n.format_decimal(),
            Value::Bool(b) => b.to_string(),
            Value::Json(j) => match j.to_json() {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            },
            _ => match self.to_json() {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b.into())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::LocalDate(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self {
        Value::LocalDateTime(d)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Value::from_array(a)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(m: BTreeMap<String, Value>) -> Self {
        Value::from_map(m)
    }
}

impl From<serde_json::Number> for Value {
    fn from(n: serde_json::Number) -> Self {
        if let Some(i) = n.as_i64() {
            Value::from(i)
        } else if let Some(u) = n.as_u64() {
            Value::Number(Number::from(u))
        } else {
            Value::from(n.as_f64().unwrap_or(f64::NAN))
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::LocalDate(a), Value::LocalDate(b)) => a == b,
            (Value::LocalDateTime(a), Value::LocalDateTime(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b) || *a.borrow() == *b.borrow(),
            (Value::Set(a), Value::Set(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().all(|v| b.contains(v))
            }
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b) || *a.borrow() == *b.borrow(),
            (Value::Json(a), Value::Json(b)) => a.to_json() == b.to_json(),
            (Value::Object(a), Value::Object(b)) => {
                a.ptr_eq(b)
                    || matches!(
                        (a.borrow().to_json(), b.borrow().to_json()),
                        (Some(x), Some(y)) if x == y
                    )
            }
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(a) | Value::Set(a) => {
                let items = a.borrow();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(m) => {
                let fields = m.borrow();
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            _ => self.to_json().serialize(serializer),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Object(o) => write!(f, "Object({:?})", o),
            _ => write!(f, "{}({})", self.kind().as_str(), self.to_json()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{s}"),
            Err(_e) => Err(fmt::Error),
        }
    }
}
