// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The unit of work variables are read and written in, and the hooks that
//! run when it closes.

use crate::error::{Error, Result};
use crate::tracking::TraceArena;
use crate::types::ValueFields;

use core::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use log::{debug, error};

/// Source of timestamps for history entries.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Cell<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

/// Receives variable updates detected while the unit of work closes.
pub trait VariableHistory {
    fn record_variable_update(&self, fields: &dyn ValueFields, time: DateTime<Utc>);
}

/// Hooks into the close lifecycle of a [`UnitOfWork`].
///
/// Listeners run in ascending `order`; listeners with equal order run in
/// registration order.
pub trait CloseListener {
    /// Name used in diagnostics and for the `multiple_allowed` check.
    fn name(&self) -> &str;

    /// Runs after the business logic and before the flush.
    fn closing(&mut self, uow: &UnitOfWork) -> anyhow::Result<()>;

    fn after_session_flush(&mut self, _uow: &UnitOfWork) -> anyhow::Result<()> {
        Ok(())
    }

    fn closed(&mut self, _uow: &UnitOfWork) {}

    /// Runs instead of the other hooks when the unit of work failed.
    fn close_failure(&mut self, _uow: &UnitOfWork) {}

    fn order(&self) -> i32 {
        0
    }

    fn multiple_allowed(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Closing,
    Closed,
}

struct Registered {
    order: i32,
    seq: u64,
    listener: Box<dyn CloseListener>,
}

struct Inner {
    state: State,
    failed: bool,
    next_seq: u64,
    listeners: Vec<Registered>,
    traces: TraceArena,
    clock: Rc<dyn Clock>,
    history: Option<Rc<dyn VariableHistory>>,
}

/// Handle to one unit of work. Clones refer to the same unit.
#[derive(Clone)]
pub struct UnitOfWork {
    inner: Rc<RefCell<Inner>>,
}

impl Default for UnitOfWork {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::with_clock(Rc::new(SystemClock))
    }

    pub fn with_clock(clock: Rc<dyn Clock>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: State::Open,
                failed: false,
                next_seq: 0,
                listeners: vec![],
                traces: TraceArena::default(),
                clock,
                history: None,
            })),
        }
    }

    pub fn set_history(&self, history: Rc<dyn VariableHistory>) {
        self.inner.borrow_mut().history = Some(history);
    }

    pub fn history(&self) -> Option<Rc<dyn VariableHistory>> {
        self.inner.borrow().history.clone()
    }

    pub fn clock(&self) -> Rc<dyn Clock> {
        self.inner.borrow().clock.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.borrow().state == State::Closed
    }

    /// Mark the surrounding command as failed. Closing then only runs
    /// `close_failure`.
    pub fn mark_failed(&self) {
        self.inner.borrow_mut().failed = true;
    }

    pub(crate) fn traces<R>(&self, f: impl FnOnce(&mut TraceArena) -> R) -> R {
        f(&mut self.inner.borrow_mut().traces)
    }

    /// Number of listeners waiting for `closing`.
    pub fn pending_listeners(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    pub fn add_close_listener(&self, listener: Box<dyn CloseListener>) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.state == State::Closed {
            return Err(Error::UnitOfWorkClosed);
        }
        if !listener.multiple_allowed()
            && inner
                .listeners
                .iter()
                .any(|r| r.listener.name() == listener.name())
        {
            return Err(Error::DuplicateCloseListener(listener.name().to_string()));
        }
        debug!("registering close listener `{}`", listener.name());
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.listeners.push(Registered {
            order: listener.order(),
            seq,
            listener,
        });
        Ok(())
    }

    /// Take the pending listeners in run order.
    fn take_listeners(&self) -> Vec<Registered> {
        let mut listeners = core::mem::take(&mut self.inner.borrow_mut().listeners);
        listeners.sort_by_key(|r| (r.order, r.seq));
        listeners
    }

    fn set_state(&self, state: State) {
        self.inner.borrow_mut().state = state;
    }

    /// Close without a flush step.
    pub fn close(&self) -> Result<()> {
        self.close_with_flush(|| Ok(()))
    }

    /// Run `closing` on every listener, then `flush`, then
    /// `after_session_flush` and `closed`.
    ///
    /// A failing listener does not stop the others. Failures are logged and
    /// returned together; the flush is skipped and every listener gets
    /// `close_failure` instead of the remaining hooks.
    pub fn close_with_flush(&self, flush: impl FnOnce() -> Result<()>) -> Result<()> {
        match self.inner.borrow().state {
            State::Open => (),
            _ => return Err(Error::UnitOfWorkClosed),
        }
        self.set_state(State::Closing);

        if self.inner.borrow().failed {
            let mut listeners = self.take_listeners();
            for r in listeners.iter_mut() {
                r.listener.close_failure(self);
            }
            self.set_state(State::Closed);
            return Ok(());
        }

        // Listeners may register further listeners while closing.
        let mut done = vec![];
        let mut failures = vec![];
        loop {
            let mut batch = self.take_listeners();
            if batch.is_empty() {
                break;
            }
            for r in batch.iter_mut() {
                if let Err(e) = r.listener.closing(self) {
                    error!("close listener `{}` failed: {e:#}", r.listener.name());
                    failures.push(format!("{}: {e:#}", r.listener.name()));
                }
            }
            done.append(&mut batch);
        }

        let flushed = match failures.is_empty() {
            true => flush(),
            false => Err(Error::CloseListener(core::mem::take(&mut failures))),
        };
        if let Err(e) = flushed {
            for r in done.iter_mut() {
                r.listener.close_failure(self);
            }
            self.set_state(State::Closed);
            return Err(e);
        }

        for r in done.iter_mut() {
            if let Err(e) = r.listener.after_session_flush(self) {
                error!("close listener `{}` failed after flush: {e:#}", r.listener.name());
                failures.push(format!("{}: {e:#}", r.listener.name()));
            }
        }
        for r in done.iter_mut() {
            r.listener.closed(self);
        }
        self.set_state(State::Closed);
        match failures.is_empty() {
            true => Ok(()),
            false => Err(Error::CloseListener(failures)),
        }
    }
}

impl core::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("UnitOfWork")
            .field("state", &inner.state)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}
