// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::error::Result;
use crate::value::Value;

use std::collections::BTreeMap;

/// Named variables an expression evaluates against.
///
/// Reading takes `&mut self` since persistent containers materialize
/// values lazily and register them for dirty tracking.
pub trait VariableContainer {
    fn has_variable(&self, name: &str) -> bool;

    /// `Ok(None)` when the variable does not exist.
    fn get_variable(&mut self, name: &str) -> Result<Option<Value>>;

    fn set_variable(&mut self, name: &str, value: Value) -> Result<()>;

    /// Set a variable that lives only as long as the container.
    fn set_transient_variable(&mut self, name: &str, value: Value) -> Result<()>;
}

/// Plain in-memory container. Transient variables shadow regular ones.
#[derive(Debug, Default, Clone)]
pub struct VariableMap {
    variables: BTreeMap<String, Value>,
    transient: BTreeMap<String, Value>,
}

impl VariableMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.variables.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.transient.get(name).or_else(|| self.variables.get(name))
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.variables.insert(name.to_string(), value.into());
    }

    /// Persistent variables only.
    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }
}

impl VariableContainer for VariableMap {
    fn has_variable(&self, name: &str) -> bool {
        self.transient.contains_key(name) || self.variables.contains_key(name)
    }

    fn get_variable(&mut self, name: &str) -> Result<Option<Value>> {
        Ok(self.get(name).cloned())
    }

    fn set_variable(&mut self, name: &str, value: Value) -> Result<()> {
        if let Some(slot) = self.transient.get_mut(name) {
            *slot = value;
        } else {
            self.variables.insert(name.to_string(), value);
        }
        Ok(())
    }

    fn set_transient_variable(&mut self, name: &str, value: Value) -> Result<()> {
        self.transient.insert(name.to_string(), value);
        Ok(())
    }
}
