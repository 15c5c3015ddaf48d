// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, TimeZone, Utc};
use procvar::types::{BeanFactories, DoubleType};
use procvar::*;
use serde_json::json;

fn types_with_max(max_text_length: usize) -> VariableTypes {
    let config = EngineConfig {
        max_text_length,
        ..EngineConfig::default()
    };
    VariableTypes::with_defaults(&config)
}

/// Store `value`, then read it back from a copy without the cached value.
fn store(types: &VariableTypes, value: &Value) -> Result<(String, Value)> {
    let mut row = VariableInstance::new("v", Some("process"));
    let ty = types.write(value, &mut row)?;
    let (read_ty, back) = types.read(&row.persisted())?;
    assert_eq!(ty.type_name(), read_ty.type_name());
    Ok((ty.type_name().to_string(), back))
}

#[test]
fn default_order() {
    let types = VariableTypes::with_defaults(&EngineConfig::default());
    assert_eq!(
        types.names(),
        [
            "null",
            "longString",
            "string",
            "boolean",
            "long",
            "integer",
            "short",
            "double",
            "bigInteger",
            "date",
            "localDate",
            "localDateTime",
            "jodaDate",
            "jodaDateTime",
            "uuid",
            "bytes",
            "emptyCollection",
            "longJson",
            "json",
            "serializable",
        ]
    );
    assert!(types.validate().is_ok());
}

#[test]
fn values_read_back() -> Result<()> {
    let types = VariableTypes::with_defaults(&EngineConfig::default());
    let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
    let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    let big: BigInt = "123456789012345678901234567890".parse()?;
    let id = uuid::Uuid::new_v4();

    let cases: Vec<(Value, &str)> = vec![
        (Value::Null, "null"),
        (Value::from("text"), "string"),
        (Value::Bool(true), "boolean"),
        (Value::from(i64::MIN), "long"),
        (Value::from(1.5), "double"),
        (Value::from(big), "bigInteger"),
        (Value::from(date), "date"),
        (Value::from(day), "localDate"),
        (Value::from(day.and_hms_milli_opt(8, 15, 0, 250).unwrap()), "localDateTime"),
        (Value::from(id), "uuid"),
        (Value::from(vec![0u8, 1, 255]), "bytes"),
        (Value::json(json!({"a": [1, {"b": null}]})), "json"),
    ];
    for (value, expected) in cases {
        let (type_name, back) = store(&types, &value)?;
        assert_eq!(type_name, expected, "{value:?}");
        assert_eq!(back, value, "{type_name}");
    }
    Ok(())
}

#[test]
fn collections_read_back() -> Result<()> {
    let types = VariableTypes::with_defaults(&EngineConfig::default());

    let (type_name, back) = store(&types, &Value::new_set())?;
    assert_eq!(type_name, "emptyCollection");
    assert!(matches!(back, Value::Set(ref s) if s.borrow().is_empty()));

    let (type_name, back) = store(&types, &Value::new_array())?;
    assert_eq!(type_name, "emptyCollection");
    assert!(matches!(back, Value::Array(ref a) if a.borrow().is_empty()));

    let map = Value::from_map(BTreeMap::from([
        ("n".to_string(), Value::from(1)),
        ("when".to_string(), Value::from(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())),
        ("list".to_string(), Value::from(vec![Value::from("a"), Value::Null])),
    ]));
    let (type_name, back) = store(&types, &map)?;
    assert_eq!(type_name, "serializable");
    assert_eq!(back, map);
    Ok(())
}

#[test]
fn text_boundary() -> Result<()> {
    let types = types_with_max(10);
    let (fits, _) = store(&types, &Value::from("x".repeat(10)))?;
    assert_eq!(fits, "string");
    let (spills, back) = store(&types, &Value::from("x".repeat(11)))?;
    assert_eq!(spills, "longString");
    assert_eq!(back, Value::from("x".repeat(11)));

    // Length counts characters, not bytes.
    let (wide, _) = store(&types, &Value::from("é".repeat(10)))?;
    assert_eq!(wide, "string");
    Ok(())
}

#[test]
fn json_boundary() -> Result<()> {
    let types = types_with_max(10);
    let exact = Value::json(json!({"a": "12"}));
    assert_eq!(serde_json::to_string(&exact.to_json())?.len(), 10);
    let (fits, _) = store(&types, &exact)?;
    assert_eq!(fits, "json");

    let longer = Value::json(json!({"a": "123"}));
    let (spills, back) = store(&types, &longer)?;
    assert_eq!(spills, "longJson");
    assert_eq!(back.to_json(), json!({"a": "123"}));
    Ok(())
}

#[test]
fn slots_are_cleared_on_rewrite() -> Result<()> {
    let types = types_with_max(10);
    let mut row = VariableInstance::new("v", None);
    types.write(&Value::from("y".repeat(20)), &mut row)?;
    assert!(row.bytes().is_some());
    types.write(&Value::from(5), &mut row)?;
    assert_eq!(row.type_name(), Some("long"));
    assert_eq!((row.text(), row.bytes()), (None, None));
    assert_eq!(row.long_value(), Some(5));
    Ok(())
}

#[test]
fn older_types_still_read() -> Result<()> {
    let types = VariableTypes::with_defaults(&EngineConfig::default());
    for (type_name, expected) in [("integer", 7i64), ("short", -3)] {
        let mut row = VariableInstance::new("v", None);
        row.set_type_name(Some(type_name.to_string()));
        row.set_long_value(Some(expected));
        assert_eq!(types.read(&row)?.1, Value::from(expected));
    }

    let mut row = VariableInstance::new("v", None);
    row.set_type_name(Some("jodaDate".to_string()));
    row.set_long_value(Some(Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap().timestamp_millis()));
    assert_eq!(
        types.read(&row)?.1,
        Value::from(NaiveDate::from_ymd_opt(2021, 6, 1).unwrap())
    );

    let joda = types.resolve_for_read("jodaDateTime")?;
    assert!(joda.is_read_only());
    let err = joda.write(&Value::from(Utc::now()), &mut row).unwrap_err();
    assert!(matches!(err, Error::UnsupportedMutationForReadOnlyType(_)), "{err}");
    Ok(())
}

#[test]
fn unknown_and_unmatched() {
    let types = VariableTypes::with_defaults(&EngineConfig::default());
    let mut row = VariableInstance::new("v", None);
    row.set_type_name(Some("customThing".to_string()));
    assert!(matches!(
        types.read(&row),
        Err(Error::UnknownVariableType(ref name)) if name == "customThing"
    ));

    #[derive(Debug)]
    struct Handle;

    impl Bean for Handle {
        fn type_name(&self) -> &str {
            "Handle"
        }

        fn get_property(&self, _name: &str) -> Option<Value> {
            None
        }
    }

    assert!(matches!(
        types.write(&Value::object(Handle), &mut row),
        Err(Error::NoMatchingVariableType(ref name)) if name == "Handle"
    ));
}

#[test]
fn untyped_rows_read_as_null() -> Result<()> {
    let types = VariableTypes::with_defaults(&EngineConfig::default());
    let (ty, value) = types.read(&VariableInstance::new("v", None))?;
    assert_eq!(ty.type_name(), "null");
    assert!(value.is_null());
    Ok(())
}

#[test]
fn corrupt_rows_fail_to_deserialize() {
    let types = VariableTypes::with_defaults(&EngineConfig::default());
    let mut row = VariableInstance::new("broken", None);
    row.set_type_name(Some("json".to_string()));
    row.set_text(Some("{not json".to_string()));
    assert!(matches!(
        types.read(&row),
        Err(Error::Deserialization { ref variable, .. }) if variable == "broken"
    ));
}

/// Fractions in `[0, 1]` stored as basis points.
struct PercentType;

impl VariableType for PercentType {
    fn type_name(&self) -> &'static str {
        "percent"
    }

    fn is_cachable(&self) -> bool {
        true
    }

    fn is_able_to_store(&self, value: &Value) -> bool {
        match value {
            Value::Number(n) if !n.is_integer() => (0.0..=1.0).contains(&n.as_f64()),
            _ => false,
        }
    }

    fn write(&self, value: &Value, fields: &mut dyn ValueFields) -> procvar::Result<()> {
        if let Value::Number(n) = value {
            fields.set_long_value(Some((n.as_f64() * 10_000.0).round() as i64));
        }
        Ok(())
    }

    fn read(&self, fields: &dyn ValueFields) -> procvar::Result<Value> {
        Ok(match fields.long_value() {
            Some(bp) => Value::from(bp as f64 / 10_000.0),
            None => Value::Null,
        })
    }
}

#[test]
fn first_match_wins() -> Result<()> {
    let mut types = VariableTypes::with_defaults(&EngineConfig::default());
    let at = types.type_index("double").unwrap_or_default();
    types.register_type_at(at, Arc::new(PercentType));
    assert!(types.validate().is_ok());

    let (type_name, back) = store(&types, &Value::from(0.25))?;
    assert_eq!((type_name.as_str(), back), ("percent", Value::from(0.25)));
    let (type_name, _) = store(&types, &Value::from(2.5))?;
    assert_eq!(type_name, "double");

    assert!(types.remove_type("percent"));
    assert!(!types.remove_type("percent"));
    Ok(())
}

#[test]
fn spill_types_must_precede_their_bounded_type() {
    let mut types = VariableTypes::with_defaults(&EngineConfig::default());
    assert!(types.remove_type("longString"));
    assert!(matches!(types.validate(), Err(Error::Config(_))));

    let mut types = VariableTypes::with_defaults(&EngineConfig::default());
    let at = types.type_index("json").unwrap_or_default();
    types.register_type_at(at, Arc::new(DoubleType));
    assert!(types.validate().is_err());
}

#[derive(Debug)]
struct Point {
    x: i64,
    y: i64,
}

impl Bean for Point {
    fn type_name(&self) -> &str {
        "Point"
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "x" => Some(Value::from(self.x)),
            "y" => Some(Value::from(self.y)),
            _ => None,
        }
    }

    fn to_json(&self) -> Option<serde_json::Value> {
        Some(json!({"x": self.x, "y": self.y}))
    }
}

#[test]
fn beans_through_factories() -> Result<()> {
    let mut factories = BeanFactories::new();
    factories.add(
        "Point",
        Arc::new(|state: serde_json::Value| -> anyhow::Result<Value> {
            let coord = |k: &str| state[k].as_i64().ok_or_else(|| anyhow::anyhow!("missing {k}"));
            Ok(Value::object(Point {
                x: coord("x")?,
                y: coord("y")?,
            }))
        }),
    );
    let types = VariableTypes::with_bean_factories(&EngineConfig::default(), factories);
    let (type_name, back) = store(&types, &Value::object(Point { x: 1, y: -2 }))?;
    assert_eq!(type_name, "serializable");
    assert_eq!(back.type_name(), "Point");
    assert_eq!(back.to_json(), json!({"x": 1, "y": -2}));
    Ok(())
}
