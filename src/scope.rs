// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::container::VariableContainer;
use crate::error::Result;
use crate::session::UnitOfWork;
use crate::tracking;
use crate::types::{ValueFields, VariableTypes};
use crate::value::Value;

use core::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use log::debug;

/// Persisted row of one variable.
#[derive(Debug, Clone, Default)]
pub struct VariableInstance {
    name: String,
    scope_type: Option<String>,
    type_name: Option<String>,
    deleted: bool,
    text: Option<String>,
    long_value: Option<i64>,
    double_value: Option<f64>,
    bytes: Option<Vec<u8>>,
    cached: Option<Value>,
}

impl VariableInstance {
    pub fn new(name: &str, scope_type: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            scope_type: scope_type.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn mark_deleted(&mut self) {
        self.deleted = true;
        self.cached = None;
    }

    /// Copy of the persisted slots without the cached value, as a fresh
    /// load from storage would see them.
    pub fn persisted(&self) -> Self {
        Self {
            cached: None,
            ..self.clone()
        }
    }
}

impl ValueFields for VariableInstance {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope_type(&self) -> Option<&str> {
        self.scope_type.as_deref()
    }

    fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    fn set_type_name(&mut self, type_name: Option<String>) {
        self.type_name = type_name;
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    fn set_text(&mut self, text: Option<String>) {
        self.text = text;
    }

    fn long_value(&self) -> Option<i64> {
        self.long_value
    }

    fn set_long_value(&mut self, value: Option<i64>) {
        self.long_value = value;
    }

    fn double_value(&self) -> Option<f64> {
        self.double_value
    }

    fn set_double_value(&mut self, value: Option<f64>) {
        self.double_value = value;
    }

    fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    fn set_bytes(&mut self, bytes: Option<Vec<u8>>) {
        self.bytes = bytes;
    }

    fn cached_value(&self) -> Option<&Value> {
        self.cached.as_ref()
    }

    fn set_cached_value(&mut self, value: Option<Value>) {
        self.cached = value;
    }
}

pub type InstanceRef = Rc<RefCell<VariableInstance>>;

/// Variables of one scope, persisted through the type registry.
///
/// Values handed out or stored through a tracked type are registered with
/// the unit of work, so in-place changes reach the persisted fields when it
/// closes. Transient variables are kept in memory only.
pub struct VariableScope {
    scope_type: String,
    types: Arc<VariableTypes>,
    uow: UnitOfWork,
    instances: BTreeMap<String, InstanceRef>,
    transient: BTreeMap<String, Value>,
}

impl VariableScope {
    pub fn new(scope_type: &str, types: Arc<VariableTypes>, uow: UnitOfWork) -> Self {
        Self {
            scope_type: scope_type.to_string(),
            types,
            uow,
            instances: BTreeMap::new(),
            transient: BTreeMap::new(),
        }
    }

    pub fn scope_type(&self) -> &str {
        &self.scope_type
    }

    pub fn unit_of_work(&self) -> &UnitOfWork {
        &self.uow
    }

    /// Add a row read from storage. Its value is decoded on first access.
    pub fn load(&mut self, instance: VariableInstance) {
        self.instances.insert(
            instance.name().to_string(),
            Rc::new(RefCell::new(instance)),
        );
    }

    pub fn instance(&self, name: &str) -> Option<InstanceRef> {
        self.instances.get(name).cloned()
    }

    pub fn instances(&self) -> impl Iterator<Item = &InstanceRef> {
        self.instances.values()
    }

    /// Delete the variable, returning its row with the deleted flag set.
    pub fn remove_variable(&mut self, name: &str) -> Option<InstanceRef> {
        if self.transient.remove(name).is_some() {
            return None;
        }
        let instance = self.instances.remove(name)?;
        instance.borrow_mut().mark_deleted();
        Some(instance)
    }

    fn track(&self, instance: &InstanceRef, value: &Value) -> Result<()> {
        let Some(type_name) = instance.borrow().type_name().map(str::to_string) else {
            return Ok(());
        };
        let ty = self.types.resolve_for_read(&type_name)?;
        tracking::track(&self.uow, &ty, value, instance.clone(), &self.types)?;
        Ok(())
    }
}

impl VariableContainer for VariableScope {
    fn has_variable(&self, name: &str) -> bool {
        self.transient.contains_key(name) || self.instances.contains_key(name)
    }

    fn get_variable(&mut self, name: &str) -> Result<Option<Value>> {
        if let Some(value) = self.transient.get(name) {
            return Ok(Some(value.clone()));
        }
        let Some(instance) = self.instance(name) else {
            return Ok(None);
        };
        let cached = instance.borrow().cached_value().cloned();
        let value = match cached {
            Some(value) => value,
            None => {
                let (ty, value) = self.types.read(&*instance.borrow())?;
                if ty.is_cachable() {
                    instance.borrow_mut().set_cached_value(Some(value.clone()));
                }
                value
            }
        };
        self.track(&instance, &value)?;
        Ok(Some(value))
    }

    fn set_variable(&mut self, name: &str, value: Value) -> Result<()> {
        if let Some(slot) = self.transient.get_mut(name) {
            *slot = value;
            return Ok(());
        }
        // A cursor into another variable's tree becomes a tree of its own.
        let value = match &value {
            Value::Json(node) if !node.is_root() => value.deep_copy(),
            _ => value,
        };
        let instance = self
            .instances
            .entry(name.to_string())
            .or_insert_with(|| {
                Rc::new(RefCell::new(VariableInstance::new(
                    name,
                    Some(&self.scope_type),
                )))
            })
            .clone();
        let ty = self.types.write(&value, &mut *instance.borrow_mut())?;
        debug!("variable `{name}` stored as `{}`", ty.type_name());
        instance
            .borrow_mut()
            .set_cached_value(ty.is_cachable().then(|| value.clone()));
        self.track(&instance, &value)
    }

    fn set_transient_variable(&mut self, name: &str, value: Value) -> Result<()> {
        self.transient.insert(name.to_string(), value);
        Ok(())
    }
}

impl core::fmt::Debug for VariableScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VariableScope")
            .field("scope_type", &self.scope_type)
            .field("variables", &self.instances.keys().collect::<Vec<_>>())
            .field("transient", &self.transient.keys().collect::<Vec<_>>())
            .finish()
    }
}
