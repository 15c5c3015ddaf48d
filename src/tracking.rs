// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Detection of in-place changes to live variable values.
//!
//! When a tracked value is materialized, the unit of work records a
//! [`TraceableObject`] and a close listener for it. At closing the listener
//! compares the live value with the snapshot taken at registration and, if
//! they differ, writes the value back into the variable's fields.

use crate::error::{Error, Result};
use crate::session::{CloseListener, UnitOfWork};
use crate::types::{ValueFields, VariableType, VariableTypes};
use crate::value::{NodeId, Value};

use core::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use log::{debug, warn};

/// Handle of a traced value within one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(usize);

pub type SharedFields = Rc<RefCell<dyn ValueFields>>;

/// A live value together with the state it had when it was handed out.
#[derive(Clone)]
pub struct TraceableObject {
    pub ty: Arc<dyn VariableType>,
    pub value: Value,
    pub snapshot: Value,
    pub fields: SharedFields,
    /// Used to choose the type again when the value is written back.
    pub types: Arc<VariableTypes>,
}

impl TraceableObject {
    /// The value is still the one the variable holds.
    fn is_current(&self) -> bool {
        let fields = self.fields.borrow();
        !fields.is_deleted()
            && fields.cached_value().and_then(Value::identity) == self.value.identity()
    }

    fn is_dirty(&self) -> Result<bool> {
        match self.ty.mutation() {
            Some(mutation) => mutation.is_dirty(&self.snapshot, &self.value),
            None => Ok(false),
        }
    }

    /// Write the live value back, choosing the type anew so that a value
    /// that outgrew the text slot moves to the byte slot.
    fn flush(&self) -> Result<()> {
        let mut fields = self.fields.borrow_mut();
        let ty = self.types.write(&self.value, &mut *fields)?;
        fields.set_cached_value(ty.is_cachable().then(|| self.value.clone()));
        Ok(())
    }
}

/// Fields are told apart by address.
type FieldsKey = *const ();

fn fields_key(fields: &SharedFields) -> FieldsKey {
    Rc::as_ptr(fields) as *const ()
}

/// Traced values of one unit of work, at most one per live identity and
/// variable. A value shared by two variables is traced once for each.
#[derive(Default)]
pub struct TraceArena {
    entries: Vec<TraceableObject>,
    by_identity: HashMap<(NodeId, FieldsKey), TraceId>,
}

impl TraceArena {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: TraceId) -> Option<&TraceableObject> {
        self.entries.get(id.0)
    }

    pub fn find(&self, identity: NodeId, fields: &SharedFields) -> Option<TraceId> {
        self.by_identity
            .get(&(identity, fields_key(fields)))
            .copied()
    }

    fn insert(&mut self, identity: NodeId, object: TraceableObject) -> TraceId {
        let id = TraceId(self.entries.len());
        let key = (identity, fields_key(&object.fields));
        self.entries.push(object);
        self.by_identity.insert(key, id);
        id
    }
}

/// Order of trace listeners relative to other close listeners.
pub const TRACE_LISTENER_ORDER: i32 = 100;

struct TraceListener {
    id: TraceId,
}

impl CloseListener for TraceListener {
    fn name(&self) -> &str {
        "traceable-object"
    }

    fn closing(&mut self, uow: &UnitOfWork) -> anyhow::Result<()> {
        let Some(object) = uow.traces(|arena| arena.get(self.id).cloned()) else {
            return Ok(());
        };
        let variable = object.fields.borrow().name().to_string();
        if !object.is_current() {
            warn!("variable `{variable}` was replaced or deleted; skipping change detection");
            return Ok(());
        }
        if !object.is_dirty()? {
            return Ok(());
        }
        debug!("variable `{variable}` changed in place; updating");
        object.flush()?;
        if let Some(history) = uow.history() {
            history.record_variable_update(&*object.fields.borrow(), uow.clock().now());
        }
        Ok(())
    }

    fn order(&self) -> i32 {
        TRACE_LISTENER_ORDER
    }
}

/// Start tracking `value` if its type asks for it.
///
/// Values without identity are never tracked. A value already traced for
/// the same fields in this unit of work keeps its first registration.
pub fn track(
    uow: &UnitOfWork,
    ty: &Arc<dyn VariableType>,
    value: &Value,
    fields: SharedFields,
    types: &Arc<VariableTypes>,
) -> Result<Option<TraceId>> {
    let (Some(mutation), Some(identity)) = (ty.mutation(), value.identity()) else {
        return Ok(None);
    };
    if uow.is_closed() {
        return Err(Error::UnitOfWorkClosed);
    }
    if let Some(id) = uow.traces(|arena| arena.find(identity, &fields)) {
        return Ok(Some(id));
    }
    let object = TraceableObject {
        ty: ty.clone(),
        value: value.clone(),
        snapshot: mutation.snapshot(value)?,
        fields,
        types: types.clone(),
    };
    let id = uow.traces(|arena| arena.insert(identity, object));
    uow.add_close_listener(Box::new(TraceListener { id }))?;
    Ok(Some(id))
}
