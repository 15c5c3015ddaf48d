// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use procvar::*;
use serde_json::json;

#[derive(Default)]
struct History {
    updates: RefCell<Vec<(String, Option<String>, DateTime<Utc>)>>,
}

impl VariableHistory for History {
    fn record_variable_update(&self, fields: &dyn ValueFields, time: DateTime<Utc>) {
        self.updates.borrow_mut().push((
            fields.name().to_string(),
            fields.type_name().map(str::to_string),
            time,
        ));
    }
}

struct Setup {
    manager: ExpressionManager,
    types: Arc<VariableTypes>,
    uow: UnitOfWork,
    history: Rc<History>,
    clock: Rc<FixedClock>,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
}

fn setup(config: EngineConfig) -> Setup {
    let types = Arc::new(VariableTypes::with_defaults(&config));
    let clock = Rc::new(FixedClock::new(start()));
    let uow = UnitOfWork::with_clock(clock.clone());
    let history = Rc::new(History::default());
    uow.set_history(history.clone());
    Setup {
        manager: ExpressionManager::new(config),
        types,
        uow,
        history,
        clock,
    }
}

impl Setup {
    /// A scope holding `value` as it would be loaded from storage.
    fn scope_with(&self, name: &str, value: Value) -> Result<VariableScope> {
        let mut row = VariableInstance::new(name, Some("process"));
        self.types.write(&value, &mut row)?;
        let mut scope = VariableScope::new("process", self.types.clone(), self.uow.clone());
        scope.load(row.persisted());
        Ok(scope)
    }

    fn run(&self, text: &str, scope: &mut VariableScope) -> procvar::Result<Value> {
        self.manager.create_expression(text)?.evaluate(scope)
    }

    fn updates(&self) -> Vec<(String, Option<String>, DateTime<Utc>)> {
        self.history.updates.borrow().clone()
    }
}

fn text_of(scope: &VariableScope, name: &str) -> Option<String> {
    scope
        .instance(name)
        .and_then(|row| row.borrow().text().map(str::to_string))
}

#[test]
fn in_place_change_is_written_back() -> Result<()> {
    let s = setup(EngineConfig::default());
    let mut scope = s.scope_with("doc", Value::json(json!({"a": {"b": 1}})))?;

    s.run("${doc.a.b = 2}", &mut scope)?;
    assert_eq!(s.uow.pending_listeners(), 1);
    // Not persisted before closing.
    assert_eq!(text_of(&scope, "doc").as_deref(), Some(r#"{"a":{"b":1}}"#));

    let later = Utc.with_ymd_and_hms(2024, 5, 1, 9, 5, 0).unwrap();
    s.clock.set(later);
    s.uow.close()?;

    assert_eq!(text_of(&scope, "doc").as_deref(), Some(r#"{"a":{"b":2}}"#));
    assert_eq!(
        s.updates(),
        [("doc".to_string(), Some("json".to_string()), later)]
    );
    Ok(())
}

#[test]
fn reading_alone_changes_nothing() -> Result<()> {
    let s = setup(EngineConfig::default());
    let mut scope = s.scope_with("doc", Value::json(json!({"a": {"b": 1}})))?;

    assert_eq!(s.run("${doc.a.b}", &mut scope)?, Value::from(1));
    assert_eq!(s.run("${doc.a.missing}", &mut scope)?, Value::Null);
    s.uow.close()?;

    assert_eq!(text_of(&scope, "doc").as_deref(), Some(r#"{"a":{"b":1}}"#));
    assert!(s.updates().is_empty());
    Ok(())
}

#[test]
fn one_trace_per_value() -> Result<()> {
    let s = setup(EngineConfig::default());
    let mut scope = s.scope_with("doc", Value::json(json!({"n": 0})))?;
    for _ in 0..3 {
        s.run("${doc.n = doc.n + 1}", &mut scope)?;
    }
    assert_eq!(s.uow.pending_listeners(), 1);
    s.uow.close()?;
    assert_eq!(text_of(&scope, "doc").as_deref(), Some(r#"{"n":3}"#));
    assert_eq!(s.updates().len(), 1);
    Ok(())
}

#[test]
fn grown_json_moves_to_the_byte_slot() -> Result<()> {
    let s = setup(EngineConfig {
        max_text_length: 20,
        ..EngineConfig::default()
    });
    let mut scope = s.scope_with("doc", Value::json(json!({"a": 1})))?;
    s.run("${doc.note = 'this text is long enough'}", &mut scope)?;
    s.uow.close()?;

    let row = scope.instance("doc").expect("row").borrow().persisted();
    assert_eq!(row.type_name(), Some("longJson"));
    assert!(row.text().is_none());
    assert_eq!(
        s.types.read(&row)?.1.to_json(),
        json!({"a": 1, "note": "this text is long enough"})
    );
    assert_eq!(s.updates()[0].1.as_deref(), Some("longJson"));
    Ok(())
}

#[test]
fn replaced_value_is_skipped() -> Result<()> {
    let s = setup(EngineConfig::default());
    let mut scope = s.scope_with("doc", Value::json(json!({"v": "old"})))?;

    let old = scope.get_variable("doc")?.expect("doc");
    scope.set_variable("doc", Value::json(json!({"v": "new"})))?;

    // The earlier value is no longer the variable's.
    let node = old.as_json().expect("json");
    assert!(node.set_child(&JsonKey::from("v"), &Value::from("stale")));
    s.uow.close()?;

    assert_eq!(text_of(&scope, "doc").as_deref(), Some(r#"{"v":"new"}"#));
    assert!(s.updates().is_empty());
    Ok(())
}

#[test]
fn deleted_variable_is_skipped() -> Result<()> {
    let s = setup(EngineConfig::default());
    let mut scope = s.scope_with("doc", Value::json(json!({"v": 1})))?;

    s.run("${doc.v = 2}", &mut scope)?;
    let row = scope.remove_variable("doc").expect("row");
    s.uow.close()?;

    assert!(row.borrow().is_deleted());
    assert_eq!(row.borrow().text(), Some(r#"{"v":1}"#));
    assert!(s.updates().is_empty());
    Ok(())
}

#[test]
fn serialized_collections_are_tracked() -> Result<()> {
    let s = setup(EngineConfig::default());
    let mut scope = s.scope_with("list", Value::from(vec![Value::from(1), Value::from(2)]))?;

    s.run("${list[0] = 5}", &mut scope)?;
    s.uow.close()?;

    let row = scope.instance("list").expect("row").borrow().persisted();
    assert_eq!(row.type_name(), Some("serializable"));
    assert_eq!(s.types.read(&row)?.1.to_json(), json!([5, 2]));
    assert_eq!(s.updates().len(), 1);
    Ok(())
}

#[test]
fn untracked_json_is_not_registered() -> Result<()> {
    let s = setup(EngineConfig {
        track_json: false,
        ..EngineConfig::default()
    });
    let mut scope = s.scope_with("doc", Value::json(json!({"v": 1})))?;
    s.run("${doc.v = 2}", &mut scope)?;
    assert_eq!(s.uow.pending_listeners(), 0);
    s.uow.close()?;
    assert_eq!(text_of(&scope, "doc").as_deref(), Some(r#"{"v":1}"#));
    Ok(())
}

#[test]
fn values_set_in_the_unit_are_tracked_too() -> Result<()> {
    let s = setup(EngineConfig::default());
    let mut scope = VariableScope::new("task", s.types.clone(), s.uow.clone());
    scope.set_variable("cfg", Value::json(json!({"retries": 1})))?;
    s.run("${cfg.retries = 3}", &mut scope)?;
    s.uow.close()?;
    assert_eq!(text_of(&scope, "cfg").as_deref(), Some(r#"{"retries":3}"#));
    assert_eq!(s.updates().len(), 1);
    Ok(())
}

#[test]
fn shared_value_is_written_back_to_every_variable() -> Result<()> {
    let s = setup(EngineConfig::default());
    let mut scope = VariableScope::new("process", s.types.clone(), s.uow.clone());
    scope.set_variable("a", Value::json(json!({"v": 1})))?;
    let shared = scope.get_variable("a")?.expect("a");
    scope.set_variable("b", shared)?;
    assert_eq!(s.uow.pending_listeners(), 2);

    s.run("${b.v = 2}", &mut scope)?;
    s.run("${a.v}", &mut scope)?;
    assert_eq!(s.uow.pending_listeners(), 2);
    s.uow.close()?;

    assert_eq!(text_of(&scope, "a").as_deref(), Some(r#"{"v":2}"#));
    assert_eq!(text_of(&scope, "b").as_deref(), Some(r#"{"v":2}"#));
    let mut names: Vec<String> = s.updates().into_iter().map(|u| u.0).collect();
    names.sort();
    assert_eq!(names, ["a", "b"]);
    Ok(())
}

#[test]
fn copies_of_subtrees_are_independent() -> Result<()> {
    let s = setup(EngineConfig::default());
    let mut scope = s.scope_with("doc", Value::json(json!({"inner": {"x": 1}})))?;
    let inner = s.run("${doc.inner}", &mut scope)?;
    scope.set_variable("copy", inner)?;
    s.run("${copy.x = 9}", &mut scope)?;
    assert_eq!(s.run("${doc.inner.x}", &mut scope)?, Value::from(1));
    s.uow.close()?;
    assert_eq!(text_of(&scope, "copy").as_deref(), Some(r#"{"x":9}"#));
    assert_eq!(text_of(&scope, "doc").as_deref(), Some(r#"{"inner":{"x":1}}"#));
    Ok(())
}

struct Observer {
    scope_row: InstanceRef,
    seen: Rc<RefCell<Option<String>>>,
}

impl CloseListener for Observer {
    fn name(&self) -> &str {
        "observer"
    }

    fn closing(&mut self, _uow: &UnitOfWork) -> anyhow::Result<()> {
        *self.seen.borrow_mut() = self.scope_row.borrow().text().map(str::to_string);
        Ok(())
    }

    fn order(&self) -> i32 {
        procvar::tracking::TRACE_LISTENER_ORDER + 1
    }
}

#[test]
fn later_listeners_see_written_back_fields() -> Result<()> {
    let s = setup(EngineConfig::default());
    let mut scope = s.scope_with("doc", Value::json(json!({"v": 1})))?;
    let seen = Rc::new(RefCell::new(None));
    s.uow.add_close_listener(Box::new(Observer {
        scope_row: scope.instance("doc").expect("row"),
        seen: seen.clone(),
    }))?;

    s.run("${doc.v = 2}", &mut scope)?;
    s.uow.close()?;
    assert_eq!(seen.borrow().as_deref(), Some(r#"{"v":2}"#));
    Ok(())
}

#[test]
fn closed_unit_rejects_new_traces() -> Result<()> {
    let s = setup(EngineConfig::default());
    let mut scope = s.scope_with("doc", Value::json(json!({})))?;
    s.uow.close()?;
    assert!(s.uow.is_closed());
    let err = s.run("${doc}", &mut scope).unwrap_err();
    assert!(matches!(err, Error::UnitOfWorkClosed), "{err}");
    assert!(matches!(s.uow.close(), Err(Error::UnitOfWorkClosed)));
    Ok(())
}

#[test]
fn failed_unit_writes_nothing_back() -> Result<()> {
    let s = setup(EngineConfig::default());
    let mut scope = s.scope_with("doc", Value::json(json!({"v": 1})))?;
    s.run("${doc.v = 2}", &mut scope)?;
    s.uow.mark_failed();
    s.uow.close()?;
    assert_eq!(text_of(&scope, "doc").as_deref(), Some(r#"{"v":1}"#));
    assert!(s.updates().is_empty());
    Ok(())
}
