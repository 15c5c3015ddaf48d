// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Object-graph navigation for expressions.
//!
//! A step `base.property` is answered by the first resolver in the chain
//! that claims it. The root step has no base.

mod array;
mod bean;
mod bean_map;
mod json;
mod map;
mod variable;

pub use array::ArrayResolver;
pub use bean::BeanResolver;
pub use bean_map::{BeanMapResolver, BeanSupplier};
pub use json::JsonResolver;
pub use map::MapResolver;
pub use variable::VariableResolver;

use crate::container::VariableContainer;
use crate::error::{Error, Result};
use crate::value::{Value, ValueKind};

use std::sync::Arc;

use log::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    Read,
    Write,
}

/// Per-call evaluation state handed to resolvers.
pub struct ElContext<'a> {
    pub container: &'a mut dyn VariableContainer,
    pub mode: EvalMode,
}

impl<'a> ElContext<'a> {
    pub fn new(container: &'a mut dyn VariableContainer, mode: EvalMode) -> Self {
        Self { container, mode }
    }
}

/// One link of the chain.
///
/// Every query returns `None` (or `false`) when the resolver does not handle
/// the step, letting the next resolver try.
pub trait Resolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn get_value(
        &self,
        ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
    ) -> Result<Option<Value>>;

    fn set_value(
        &self,
        ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
        value: Value,
    ) -> Result<bool>;

    fn is_read_only(
        &self,
        ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
    ) -> Result<Option<bool>>;

    fn get_type(
        &self,
        ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
    ) -> Result<Option<ValueKind>> {
        Ok(self.get_value(ctx, base, property)?.map(|v| v.kind()))
    }

    fn invoke(
        &self,
        _ctx: &mut ElContext<'_>,
        _base: &Value,
        _method: &str,
        _args: &[Value],
    ) -> Result<Option<Value>> {
        Ok(None)
    }
}

fn property_name(property: &Value) -> String {
    property.to_text()
}

/// Ordered resolvers, first claim wins.
#[derive(Clone, Default)]
pub struct CompositeResolver {
    resolvers: Vec<Arc<dyn Resolver>>,
}

impl CompositeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Variables, beans, arrays, maps, json trees, then generic objects.
    pub fn standard(beans: BeanMapResolver) -> Self {
        let mut chain = Self::new();
        chain.add(Arc::new(VariableResolver));
        chain.add(Arc::new(beans));
        chain.add(Arc::new(ArrayResolver));
        chain.add(Arc::new(MapResolver));
        chain.add(Arc::new(JsonResolver));
        chain.add(Arc::new(BeanResolver));
        chain
    }

    pub fn add(&mut self, resolver: Arc<dyn Resolver>) {
        self.resolvers.push(resolver);
    }

    pub fn insert(&mut self, index: usize, resolver: Arc<dyn Resolver>) {
        let index = index.min(self.resolvers.len());
        self.resolvers.insert(index, resolver);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    pub fn get_value(
        &self,
        ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
    ) -> Result<Value> {
        if let Some(Value::Null) = base {
            return Ok(Value::Null);
        }
        for r in &self.resolvers {
            if let Some(v) = r.get_value(ctx, base, property)? {
                trace!("{} resolved `{}`", r.name(), property_name(property));
                return Ok(v);
            }
        }
        Err(Error::property_not_found(property_name(property)))
    }

    pub fn set_value(
        &self,
        ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
        value: Value,
    ) -> Result<()> {
        if !matches!(base, Some(Value::Null)) {
            for r in &self.resolvers {
                if r.set_value(ctx, base, property, value.clone())? {
                    trace!("{} assigned `{}`", r.name(), property_name(property));
                    return Ok(());
                }
            }
        }
        Err(Error::property_not_found(property_name(property)))
    }

    pub fn is_read_only(
        &self,
        ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
    ) -> Result<bool> {
        for r in &self.resolvers {
            if let Some(read_only) = r.is_read_only(ctx, base, property)? {
                return Ok(read_only);
            }
        }
        Err(Error::property_not_found(property_name(property)))
    }

    pub fn get_type(
        &self,
        ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
    ) -> Result<Option<ValueKind>> {
        if let Some(Value::Null) = base {
            return Ok(None);
        }
        for r in &self.resolvers {
            if let Some(kind) = r.get_type(ctx, base, property)? {
                return Ok(Some(kind));
            }
        }
        Err(Error::property_not_found(property_name(property)))
    }

    pub fn invoke(
        &self,
        ctx: &mut ElContext<'_>,
        base: &Value,
        method: &str,
        args: &[Value],
    ) -> Result<Value> {
        for r in &self.resolvers {
            if let Some(v) = r.invoke(ctx, base, method, args)? {
                trace!("{} invoked `{method}`", r.name());
                return Ok(v);
            }
        }
        Err(Error::method_not_found(method))
    }
}

/// Integer index into a sequence of `len` items. Negative indexes count
/// from the end.
pub(crate) fn to_index(property: &Value, len: usize) -> Option<usize> {
    let index = match property {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    let index = if index < 0 {
        len as i64 + index
    } else {
        index
    };
    usize::try_from(index).ok()
}
