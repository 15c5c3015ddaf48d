// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Codecs between runtime values and persisted variable fields.

mod date;
mod json;
mod misc;
mod numeric;
mod serializable;
mod text;

pub use date::{DateType, JodaDateTimeType, JodaDateType, LocalDateTimeType, LocalDateType};
pub use json::{JsonType, LongJsonType};
pub use misc::{BytesType, EmptyCollectionType, NullType, UuidType};
pub use numeric::{BigIntegerType, BooleanType, DoubleType, IntegerType, LongType, ShortType};
pub use serializable::{BeanFactories, BeanFactory, SerializableType};
pub use text::{LongStringType, StringType};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::value::Value;

use std::sync::Arc;

use log::debug;

/// The persisted slots of one variable.
///
/// Codecs only ever read and write a variable through this contract.
pub trait ValueFields {
    fn name(&self) -> &str;

    /// Kind of scope owning the variable, e.g. `"process"` or `"task"`.
    fn scope_type(&self) -> Option<&str>;

    fn type_name(&self) -> Option<&str>;
    fn set_type_name(&mut self, type_name: Option<String>);

    fn is_deleted(&self) -> bool;

    fn text(&self) -> Option<&str>;
    fn set_text(&mut self, text: Option<String>);

    fn long_value(&self) -> Option<i64>;
    fn set_long_value(&mut self, value: Option<i64>);

    fn double_value(&self) -> Option<f64>;
    fn set_double_value(&mut self, value: Option<f64>);

    fn bytes(&self) -> Option<&[u8]>;
    fn set_bytes(&mut self, bytes: Option<Vec<u8>>);

    fn cached_value(&self) -> Option<&Value>;
    fn set_cached_value(&mut self, value: Option<Value>);

    /// Clear every value slot.
    fn clear_slots(&mut self) {
        self.set_text(None);
        self.set_long_value(None);
        self.set_double_value(None);
        self.set_bytes(None);
    }
}

/// Codec for one family of values.
pub trait VariableType: Send + Sync {
    /// Stable name recorded with every persisted value.
    fn type_name(&self) -> &'static str;

    /// Whether the decoded value may be kept in the cached slot.
    fn is_cachable(&self) -> bool;

    fn is_able_to_store(&self, value: &Value) -> bool;

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> Result<()>;

    fn read(&self, fields: &dyn ValueFields) -> Result<Value>;

    /// Types kept only to read old data.
    fn is_read_only(&self) -> bool {
        false
    }

    /// For a bounded type, the unbounded type that takes the values it
    /// rejects for size.
    fn spill_type(&self) -> Option<&'static str> {
        None
    }

    /// Present when values of this type are live objects whose in-place
    /// changes must be detected.
    fn mutation(&self) -> Option<&dyn MutableType> {
        None
    }
}

/// Snapshot and compare support for tracked types.
pub trait MutableType {
    /// Independent copy of `value` as it is now.
    fn snapshot(&self, value: &Value) -> Result<Value>;

    /// Whether `current` differs from `snapshot`. Both sides are compared
    /// through the type's own encoding.
    fn is_dirty(&self, snapshot: &Value, current: &Value) -> Result<bool>;
}

/// Identity fast path of [`MutableType::is_dirty`]: `current` is the
/// snapshot object itself.
pub(crate) fn is_same_object(snapshot: &Value, current: &Value) -> bool {
    snapshot.identity().is_some() && snapshot.identity() == current.identity()
}

pub(crate) fn deserialization(fields: &dyn ValueFields, message: impl Into<String>) -> Error {
    Error::Deserialization {
        variable: fields.name().to_string(),
        message: message.into(),
    }
}

/// Number of characters, the unit of the text length limits.
pub(crate) fn text_length(s: &str) -> usize {
    s.chars().count()
}

/// Ordered codec registry.
///
/// Writing picks the first type that accepts the value; reading looks the
/// type up by its recorded name.
#[derive(Clone, Default)]
pub struct VariableTypes {
    types: Vec<Arc<dyn VariableType>>,
}

impl VariableTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default registry.
    ///
    /// Every bounded type comes right after its unbounded spill
    /// counterpart: `longString` before `string` and `longJson` before
    /// `json`. See [`VariableTypes::validate`].
    pub fn with_defaults(config: &EngineConfig) -> Self {
        Self::with_bean_factories(config, BeanFactories::default())
    }

    pub fn with_bean_factories(config: &EngineConfig, factories: BeanFactories) -> Self {
        let max = config.max_text_length;
        let mut types = Self::new();
        types
            .register_type(Arc::new(NullType))
            .register_type(Arc::new(LongStringType::new(max + 1)))
            .register_type(Arc::new(StringType::new(max)))
            .register_type(Arc::new(BooleanType))
            .register_type(Arc::new(LongType))
            .register_type(Arc::new(IntegerType))
            .register_type(Arc::new(ShortType))
            .register_type(Arc::new(DoubleType))
            .register_type(Arc::new(BigIntegerType))
            .register_type(Arc::new(DateType))
            .register_type(Arc::new(LocalDateType))
            .register_type(Arc::new(LocalDateTimeType))
            .register_type(Arc::new(JodaDateType))
            .register_type(Arc::new(JodaDateTimeType))
            .register_type(Arc::new(UuidType))
            .register_type(Arc::new(BytesType))
            .register_type(Arc::new(EmptyCollectionType))
            .register_type(Arc::new(LongJsonType::new(max + 1, config.track_json)))
            .register_type(Arc::new(JsonType::new(max, config.track_json)))
            .register_type(Arc::new(SerializableType::new(
                config.track_serializable,
                factories,
            )));
        types
    }

    pub fn register_type(&mut self, ty: Arc<dyn VariableType>) -> &mut Self {
        debug!("adding variable type `{}`", ty.type_name());
        self.types.push(ty);
        self
    }

    /// Insert before the type currently at `index`.
    pub fn register_type_at(&mut self, index: usize, ty: Arc<dyn VariableType>) -> &mut Self {
        debug!("adding variable type `{}` at {index}", ty.type_name());
        let index = index.min(self.types.len());
        self.types.insert(index, ty);
        self
    }

    pub fn remove_type(&mut self, type_name: &str) -> bool {
        let before = self.types.len();
        self.types.retain(|t| t.type_name() != type_name);
        before != self.types.len()
    }

    pub fn type_index(&self, type_name: &str) -> Option<usize> {
        self.types.iter().position(|t| t.type_name() == type_name)
    }

    pub fn get_type(&self, type_name: &str) -> Option<Arc<dyn VariableType>> {
        self.types
            .iter()
            .find(|t| t.type_name() == type_name)
            .cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.types.iter().map(|t| t.type_name()).collect()
    }

    pub fn resolve_for_write(&self, value: &Value) -> Result<Arc<dyn VariableType>> {
        match self.types.iter().find(|t| t.is_able_to_store(value)) {
            Some(t) => {
                debug!("value of type {} stored as `{}`", value.type_name(), t.type_name());
                Ok(t.clone())
            }
            None => Err(Error::NoMatchingVariableType(value.type_name())),
        }
    }

    pub fn resolve_for_read(&self, type_name: &str) -> Result<Arc<dyn VariableType>> {
        self.get_type(type_name)
            .ok_or_else(|| Error::UnknownVariableType(type_name.to_string()))
    }

    /// Check that each bounded type directly follows its spill type.
    pub fn validate(&self) -> Result<()> {
        for (i, ty) in self.types.iter().enumerate() {
            let Some(spill) = ty.spill_type() else {
                continue;
            };
            let preceding = i.checked_sub(1).map(|p| self.types[p].type_name());
            if preceding != Some(spill) {
                return Err(Error::Config(format!(
                    "variable type `{}` must directly follow `{spill}`",
                    ty.type_name()
                )));
            }
        }
        Ok(())
    }

    /// Encode `value` with the first matching type and record its name.
    pub fn write(
        &self,
        value: &Value,
        fields: &mut dyn ValueFields,
    ) -> Result<Arc<dyn VariableType>> {
        let ty = self.resolve_for_write(value)?;
        fields.clear_slots();
        ty.write(value, fields)?;
        fields.set_type_name(Some(ty.type_name().to_string()));
        Ok(ty)
    }

    /// Decode the value using the type recorded in `fields`.
    pub fn read(&self, fields: &dyn ValueFields) -> Result<(Arc<dyn VariableType>, Value)> {
        let Some(type_name) = fields.type_name() else {
            return Ok((self.resolve_for_read(NullType.type_name())?, Value::Null));
        };
        let ty = self.resolve_for_read(type_name)?;
        let value = ty.read(fields)?;
        Ok((ty, value))
    }
}

impl core::fmt::Debug for VariableTypes {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
