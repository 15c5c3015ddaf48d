// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::resolver::to_index;
use crate::value::{NodeId, Shared, Value};

use std::rc::Rc;

use serde_json::{Map, Value as Json};

/// One step from a json container to a child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonKey {
    Field(Rc<str>),
    Index(usize),
}

impl From<&str> for JsonKey {
    fn from(s: &str) -> Self {
        JsonKey::Field(s.into())
    }
}

impl From<usize> for JsonKey {
    fn from(i: usize) -> Self {
        JsonKey::Index(i)
    }
}

/// Cursor into a live json tree.
///
/// All cursors derived from the same tree share its root, so writing through
/// any of them is visible to every other holder. A cursor whose path no
/// longer exists reads as absent.
#[derive(Clone)]
pub struct JsonNode {
    root: Shared<Json>,
    path: Rc<[JsonKey]>,
}

fn step<'a>(json: &'a Json, key: &JsonKey) -> Option<&'a Json> {
    match (json, key) {
        (Json::Object(fields), JsonKey::Field(f)) => fields.get(f.as_ref()),
        (Json::Array(items), JsonKey::Index(i)) => items.get(*i),
        _ => None,
    }
}

fn step_mut<'a>(json: &'a mut Json, key: &JsonKey) -> Option<&'a mut Json> {
    match (json, key) {
        (Json::Object(fields), JsonKey::Field(f)) => fields.get_mut(f.as_ref()),
        (Json::Array(items), JsonKey::Index(i)) => items.get_mut(*i),
        _ => None,
    }
}

/// Widening rules applied to scalar leaves.
fn scalar(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::from(i),
            None => Value::from(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::from(s.as_str()),
        other => Value::from(other.to_string()),
    }
}

impl JsonNode {
    pub fn new(json: Json) -> Self {
        Self {
            root: Shared::new(json),
            path: Rc::from(vec![]),
        }
    }

    /// Identity of the tree this cursor points into.
    pub fn root_id(&self) -> NodeId {
        self.root.id()
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    pub fn path(&self) -> &[JsonKey] {
        &self.path
    }

    pub fn with<R>(&self, f: impl FnOnce(Option<&Json>) -> R) -> R {
        let root = self.root.borrow();
        let mut node = Some(&*root);
        for key in self.path.iter() {
            node = node.and_then(|n| step(n, key));
        }
        f(node)
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(Option<&mut Json>) -> R) -> R {
        let mut root = self.root.borrow_mut();
        let mut node = Some(&mut *root);
        for key in self.path.iter() {
            node = node.and_then(|n| step_mut(n, key));
        }
        f(node)
    }

    /// Copy of the json under the cursor. A dangling cursor yields null.
    pub fn to_json(&self) -> Json {
        self.with(|n| n.cloned().unwrap_or(Json::Null))
    }

    /// A new, independent tree holding a copy of the node.
    pub fn deep_copy(&self) -> JsonNode {
        JsonNode::new(self.to_json())
    }

    pub fn is_object(&self) -> bool {
        self.with(|n| matches!(n, Some(Json::Object(_))))
    }

    pub fn is_array(&self) -> bool {
        self.with(|n| matches!(n, Some(Json::Array(_))))
    }

    pub fn len(&self) -> Option<usize> {
        self.with(|n| match n {
            Some(Json::Object(fields)) => Some(fields.len()),
            Some(Json::Array(items)) => Some(items.len()),
            Some(Json::String(s)) => Some(s.chars().count()),
            _ => None,
        })
    }

    pub fn child(&self, key: JsonKey) -> JsonNode {
        let mut path = self.path.to_vec();
        path.push(key);
        JsonNode {
            root: self.root.clone(),
            path: path.into(),
        }
    }

    /// Read a child. Containers come back as cursors into the same tree,
    /// scalars are converted. `None` when the child does not exist.
    pub fn get_child(&self, key: &JsonKey) -> Option<Value> {
        let found = self.with(|n| {
            n.and_then(|n| step(n, key)).map(|c| match c {
                Json::Object(_) | Json::Array(_) => None,
                _ => Some(scalar(c)),
            })
        });
        match found {
            Some(None) => Some(Value::Json(self.child(key.clone()))),
            Some(Some(v)) => Some(v),
            None => None,
        }
    }

    /// Replace or insert a child. Returns false when the node cannot hold
    /// the key: it is not a container of the right shape, or the index is
    /// past the end of the array.
    pub fn set_child(&self, key: &JsonKey, value: &Value) -> bool {
        // Convert first: the value may be a cursor into this very tree.
        let json = value.to_json();
        self.with_mut(|n| match (n, key) {
            (Some(Json::Object(fields)), JsonKey::Field(f)) => {
                fields.insert(f.to_string(), json);
                true
            }
            (Some(Json::Array(items)), JsonKey::Index(i)) if *i < items.len() => {
                items[*i] = json;
                true
            }
            (Some(Json::Array(items)), JsonKey::Index(i)) if *i == items.len() => {
                items.push(json);
                true
            }
            _ => false,
        })
    }

    /// Return the named child of an object node, creating it as an empty
    /// object when missing. `None` when this node is not an object.
    pub fn get_or_create_object(&self, field: &str) -> Option<Value> {
        let key = JsonKey::Field(field.into());
        let created = self.with_mut(|n| match n {
            Some(Json::Object(fields)) => {
                if !fields.contains_key(field) {
                    fields.insert(field.to_string(), Json::Object(Map::new()));
                }
                true
            }
            _ => false,
        });
        if created {
            self.get_child(&key)
        } else {
            None
        }
    }

    /// Turn an expression property into a key for this node.
    /// Array indexes may be negative, counting from the end.
    pub fn key_for(&self, property: &Value) -> Option<JsonKey> {
        if self.is_array() {
            to_index(property, self.len().unwrap_or(0)).map(JsonKey::Index)
        } else {
            Some(JsonKey::Field(property.to_text().into()))
        }
    }
}

impl core::fmt::Debug for JsonNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
