// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use anyhow::{bail, Result};
use procvar::resolver::{ElContext, Resolver};
use procvar::*;
use serde_json::json;

#[derive(Debug)]
struct Order {
    id: String,
    total: i64,
}

impl Bean for Order {
    fn type_name(&self) -> &str {
        "Order"
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::from(self.id.as_str())),
            "total" => Some(Value::from(self.total)),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: Value) -> anyhow::Result<bool> {
        match (name, value.as_i64()) {
            ("total", Some(total)) => {
                self.total = total;
                Ok(true)
            }
            ("total", None) => bail!("total must be an integer"),
            _ => Ok(false),
        }
    }

    fn is_writable(&self, name: &str) -> bool {
        name == "total"
    }

    fn invoke(&mut self, method: &str, args: &[Value]) -> Option<anyhow::Result<Value>> {
        match method {
            "discount" => {
                let pct = args.first().and_then(Value::as_i64).unwrap_or(0);
                Some(Ok(Value::from(self.total * (100 - pct) / 100)))
            }
            _ => None,
        }
    }
}

fn order() -> Value {
    Value::object(Order {
        id: "o-1".to_string(),
        total: 200,
    })
}

fn run(manager: &ExpressionManager, text: &str, vars: &mut VariableMap) -> procvar::Result<Value> {
    manager.create_expression(text)?.evaluate(vars)
}

#[test]
fn standard_chain_order() {
    let chain = CompositeResolver::standard(BeanMapResolver::new());
    assert_eq!(
        chain.names(),
        ["variable", "bean-map", "array", "map", "json", "bean"]
    );
}

#[test]
fn variable_beats_bean() -> Result<()> {
    let mut beans = BeanMapResolver::new();
    beans.insert_json("x", json!(2));
    let manager = ExpressionManager::default().with_beans(beans);

    let mut vars = VariableMap::new().with("x", 1);
    assert_eq!(run(&manager, "${x}", &mut vars)?, Value::from(1));

    let mut empty = VariableMap::new();
    assert_eq!(run(&manager, "${x}", &mut empty)?, Value::from(2));
    let err = run(&manager, "${x = 3}", &mut empty).unwrap_err();
    assert!(matches!(err, Error::NotWritable { ref property, .. } if property == "x"), "{err}");
    Ok(())
}

#[test]
fn suppliers_run_per_lookup() -> Result<()> {
    let mut beans = BeanMapResolver::new();
    beans.insert_supplier("fresh", Arc::new(|| Value::from(vec![Value::from(1)])));
    let manager = ExpressionManager::default().with_beans(beans);
    let mut vars = VariableMap::new();

    // A mutation through one lookup is not seen by the next.
    run(&manager, "${fresh[0] = 5}", &mut vars)?;
    assert_eq!(run(&manager, "${fresh[0]}", &mut vars)?, Value::from(1));
    Ok(())
}

#[test]
fn object_properties_and_methods() -> Result<()> {
    let manager = ExpressionManager::default();
    let mut vars = VariableMap::new().with("order", order());

    assert_eq!(run(&manager, "${order.id}", &mut vars)?, Value::from("o-1"));
    assert_eq!(run(&manager, "${order.discount(25)}", &mut vars)?, Value::from(150));

    run(&manager, "${order.total = 80}", &mut vars)?;
    assert_eq!(run(&manager, "${order.total}", &mut vars)?, Value::from(80));

    let err = run(&manager, "${order.id = 'x'}", &mut vars).unwrap_err();
    assert!(matches!(err, Error::NotWritable { .. }), "{err}");

    let err = run(&manager, "${order.total = 'lots'}", &mut vars).unwrap_err();
    assert!(err.to_string().contains("total must be an integer"), "{err}");

    let err = run(&manager, "${order.missing}", &mut vars).unwrap_err();
    assert!(matches!(err, Error::PropertyNotFound { .. }), "{err}");

    let err = run(&manager, "${order.cancel()}", &mut vars).unwrap_err();
    assert!(matches!(err, Error::MethodNotFound { ref method, .. } if method == "cancel"));
    Ok(())
}

#[test]
fn read_only_and_type_queries() -> Result<()> {
    let mut beans = BeanMapResolver::new();
    beans.insert_json("cfg", json!({"limit": 10}));
    let chain = CompositeResolver::standard(beans);
    let mut vars = VariableMap::new()
        .with("order", order())
        .with("doc", Value::json(json!({"a": 1})));
    let mut ctx = ElContext::new(&mut vars, EvalMode::Read);

    let name = |s: &str| Value::from(s);
    assert!(chain.is_read_only(&mut ctx, None, &name("cfg"))?);
    assert!(!chain.is_read_only(&mut ctx, None, &name("doc"))?);

    let order = chain.get_value(&mut ctx, None, &name("order"))?;
    assert!(chain.is_read_only(&mut ctx, Some(&order), &name("id"))?);
    assert!(!chain.is_read_only(&mut ctx, Some(&order), &name("total"))?);

    assert_eq!(
        chain.get_type(&mut ctx, None, &name("doc"))?,
        Some(ValueKind::Json)
    );
    assert_eq!(
        chain.get_type(&mut ctx, Some(&Value::Null), &name("x"))?,
        None
    );
    assert!(chain.get_type(&mut ctx, None, &name("nope")).is_err());
    Ok(())
}

/// Answers the root name `now` with a fixed text.
struct Constants;

impl Resolver for Constants {
    fn name(&self) -> &'static str {
        "constants"
    }

    fn get_value(
        &self,
        _ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
    ) -> procvar::Result<Option<Value>> {
        Ok(match (base, property.as_str()) {
            (None, Some("now")) => Some(Value::from("2024-01-01")),
            _ => None,
        })
    }

    fn set_value(
        &self,
        _ctx: &mut ElContext<'_>,
        _base: Option<&Value>,
        _property: &Value,
        _value: Value,
    ) -> procvar::Result<bool> {
        Ok(false)
    }

    fn is_read_only(
        &self,
        _ctx: &mut ElContext<'_>,
        base: Option<&Value>,
        property: &Value,
    ) -> procvar::Result<Option<bool>> {
        Ok(match (base, property.as_str()) {
            (None, Some("now")) => Some(true),
            _ => None,
        })
    }
}

#[test]
fn custom_resolvers_take_their_place_in_the_chain() -> Result<()> {
    let mut chain = CompositeResolver::standard(BeanMapResolver::new());
    chain.insert(1, Arc::new(Constants));
    assert_eq!(chain.names()[..2], ["variable", "constants"]);

    let mut vars = VariableMap::new();
    let mut ctx = ElContext::new(&mut vars, EvalMode::Read);
    assert_eq!(
        chain.get_value(&mut ctx, None, &Value::from("now"))?,
        Value::from("2024-01-01")
    );

    let mut vars = VariableMap::new().with("now", "shadowed");
    let mut ctx = ElContext::new(&mut vars, EvalMode::Read);
    assert_eq!(
        chain.get_value(&mut ctx, None, &Value::from("now"))?,
        Value::from("shadowed")
    );
    Ok(())
}

#[test]
fn json_write_mode_creates_objects() -> Result<()> {
    let chain = CompositeResolver::standard(BeanMapResolver::new());
    let doc = Value::json(json!({}));
    let mut vars = VariableMap::new();

    let mut ctx = ElContext::new(&mut vars, EvalMode::Read);
    assert!(chain.get_value(&mut ctx, Some(&doc), &Value::from("a"))?.is_null());
    assert_eq!(doc.to_json(), json!({}));

    let mut ctx = ElContext::new(&mut vars, EvalMode::Write);
    let child = chain.get_value(&mut ctx, Some(&doc), &Value::from("a"))?;
    chain.set_value(&mut ctx, Some(&child), &Value::from("b"), Value::from(true))?;
    assert_eq!(doc.to_json(), json!({"a": {"b": true}}));
    Ok(())
}

#[test]
fn array_writes_stay_in_bounds() -> Result<()> {
    let chain = CompositeResolver::standard(BeanMapResolver::new());
    let list = Value::from(vec![Value::from(1), Value::from(2)]);
    let mut vars = VariableMap::new();
    let mut ctx = ElContext::new(&mut vars, EvalMode::Write);

    chain.set_value(&mut ctx, Some(&list), &Value::from(-1), Value::from(9))?;
    assert_eq!(list.to_json(), json!([1, 9]));
    assert!(chain
        .set_value(&mut ctx, Some(&list), &Value::from(2), Value::from(3))
        .is_err());
    assert!(chain
        .set_value(&mut ctx, Some(&Value::Null), &Value::from("x"), Value::from(3))
        .is_err());
    Ok(())
}
