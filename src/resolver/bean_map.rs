// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{ElContext, Resolver};
use crate::error::{Error, Result};
use crate::value::Value;

use std::collections::BTreeMap;
use std::sync::Arc;

pub type BeanSupplier = Arc<dyn Fn() -> Value + Send + Sync>;

#[derive(Clone)]
enum Bean {
    Json(serde_json::Value),
    Supplier(BeanSupplier),
}

/// Fixed, read-only root names injected by the embedder.
///
/// Entries are stored in a thread-safe form and turned into values on each
/// lookup: json documents become plain values, suppliers are called.
#[derive(Clone, Default)]
pub struct BeanMapResolver {
    beans: BTreeMap<String, Bean>,
}

impl BeanMapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_json(&mut self, name: &str, value: serde_json::Value) {
        self.beans.insert(name.to_string(), Bean::Json(value));
    }

    pub fn insert_supplier(&mut self, name: &str, supplier: BeanSupplier) {
        self.beans.insert(name.to_string(), Bean::Supplier(supplier));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.beans.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.beans.is_empty()
    }

    fn lookup(&self, base: Option<&Value>, property: &Value) -> Option<&Bean> {
        match (base, property) {
            (None, Value::String(name)) => self.beans.get(name.as_ref()),
            _ => None,
        }
    }
}

impl Resolver for BeanMapResolver {
    fn name(&self) -> &'static str {
        "bean-map"
    }

    fn get_value(
        &self,
        _ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
    ) -> Result<Option<Value>> {
        Ok(self.lookup(base, property).map(|bean| match bean {
            Bean::Json(json) => Value::from_json(json.clone()),
            Bean::Supplier(supplier) => supplier(),
        }))
    }

    fn set_value(
        &self,
        _ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
        _value: Value,
    ) -> Result<bool> {
        match self.lookup(base, property) {
            Some(_) => Err(Error::not_writable(property.to_text())),
            None => Ok(false),
        }
    }

    fn is_read_only(
        &self,
        _ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
    ) -> Result<Option<bool>> {
        Ok(self.lookup(base, property).map(|_| true))
    }
}
