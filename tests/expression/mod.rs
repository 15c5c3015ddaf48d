// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use procvar::*;
use serde::Deserialize;
use serde_json::Value as Json;
use test_generator::test_resources;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TestCase {
    note: String,
    expression: String,
    /// Plain values: objects become maps, arrays become lists.
    #[serde(default)]
    variables: BTreeMap<String, Json>,
    /// Values kept as json trees.
    #[serde(default)]
    json: BTreeMap<String, Json>,
    #[serde(default)]
    beans: BTreeMap<String, Json>,
    want_result: Option<Json>,
    want_variables: Option<BTreeMap<String, Json>>,
    error: Option<String>,
    #[serde(default)]
    skip: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn manager(beans: &BTreeMap<String, Json>) -> ExpressionManager {
    let mut bean_map = BeanMapResolver::new();
    for (name, value) in beans {
        bean_map.insert_json(name, value.clone());
    }
    ExpressionManager::default()
        .with_beans(bean_map)
        .with_function_delegate(Arc::new(FunctionDef::pure("str", "upper", 1, |args| {
            Ok(Value::from(args[0].to_text().to_uppercase()))
        })))
        .with_function_delegate(Arc::new(FunctionDef::new("fn", "concat", |_, args| {
            Ok(Value::from(
                args.iter().map(Value::to_text).collect::<String>(),
            ))
        })))
        .with_function_delegate(Arc::new(FunctionDef::new("fn", "fail", |_, _| {
            bail!("deliberate")
        })))
}

fn variables(case: &TestCase) -> VariableMap {
    let mut vars = VariableMap::new();
    for (name, value) in &case.variables {
        vars.insert(name, Value::from_json(value.clone()));
    }
    for (name, value) in &case.json {
        vars.insert(name, Value::json(value.clone()));
    }
    vars
}

fn run_case(case: &TestCase) -> Result<()> {
    let manager = manager(&case.beans);
    let mut vars = variables(case);
    let result = manager
        .create_expression(&case.expression)
        .and_then(|expr| expr.evaluate(&mut vars));

    match (result, &case.error) {
        (Ok(value), None) => {
            let expected = case.want_result.clone().unwrap_or(Json::Null);
            if value.to_json() != expected {
                bail!(
                    "result mismatch\nleft  = {}\nright = {}",
                    value.to_json(),
                    expected
                );
            }
        }
        (Ok(value), Some(error)) => bail!("expected error `{error}`, got {value:?}"),
        (Err(actual), Some(expected)) => {
            let actual = actual.to_string();
            if !actual.contains(expected.as_str()) {
                bail!("error message\n`{actual}`\ndoes not contain `{expected}`");
            }
        }
        (Err(actual), None) => return Err(actual.into()),
    }

    for (name, expected) in case.want_variables.iter().flatten() {
        let actual = vars.get(name).map(Value::to_json);
        if actual.as_ref() != Some(expected) {
            bail!("variable `{name}` is {actual:?}, expected {expected}");
        }
    }
    Ok(())
}

fn yaml_test_impl(file: &str) -> Result<()> {
    let yaml_str = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml_str)?;

    println!("running {file}");
    for case in &test.cases {
        print!("case {} ", case.note);
        if case.skip {
            println!("skipped");
            continue;
        }
        if let Err(e) = run_case(case) {
            bail!("case `{}` ({}) failed: {e}", case.note, case.expression);
        }
        println!("passed");
    }
    println!("{} cases passed.", test.cases.len());
    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // An Err is not always printed by cargo test.
            panic!("{}", e);
        }
    }
}

#[test_resources("tests/expression/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}

#[test]
fn expressions_are_reusable_across_containers() -> Result<()> {
    let manager = ExpressionManager::default();
    let expr = manager.create_expression("${a * 2}")?;
    let mut first = VariableMap::new().with("a", 2);
    let mut second = VariableMap::new().with("a", 5);
    assert_eq!(expr.evaluate(&mut first)?, Value::from(4));
    assert_eq!(expr.evaluate(&mut second)?, Value::from(10));
    assert_eq!(expr.evaluate(&mut first)?, Value::from(4));
    Ok(())
}

#[test]
fn assign_through_handle() -> Result<()> {
    let manager = ExpressionManager::default();
    let mut vars = VariableMap::new().with("doc", Value::json(serde_json::json!({"b": "hi"})));

    manager
        .create_expression("${doc.c}")?
        .assign(Value::from(1), &mut vars)?;
    manager
        .create_expression("${doc.x.y}")?
        .assign(Value::from("deep"), &mut vars)?;
    assert_eq!(
        vars.get("doc").map(Value::to_json),
        Some(serde_json::json!({"b": "hi", "c": 1, "x": {"y": "deep"}}))
    );

    let err = manager
        .create_expression("total ${doc.c}")?
        .assign(Value::from(2), &mut vars)
        .unwrap_err();
    assert!(matches!(err, Error::NotWritable { .. }), "{err}");
    Ok(())
}

#[test]
fn read_mode_never_creates_nodes() -> Result<()> {
    let manager = ExpressionManager::default();
    let mut vars = VariableMap::new().with("doc", Value::json(serde_json::json!({})));
    let value = manager
        .create_expression("${doc.a.b}")?
        .evaluate(&mut vars)?;
    assert!(value.is_null());
    assert_eq!(
        vars.get("doc").map(Value::to_json),
        Some(serde_json::json!({}))
    );
    Ok(())
}

#[test]
fn errors_carry_the_expression() -> Result<()> {
    let manager = ExpressionManager::default();
    let err = manager
        .create_expression("${str:missing(x)}")?
        .evaluate(&mut VariableMap::new().with("x", 1))
        .unwrap_err();
    match &err {
        Error::FunctionNotFound { prefix, name, .. } => {
            assert_eq!((prefix.as_str(), name.as_str()), ("str", "missing"))
        }
        other => bail!("unexpected error {other}"),
    }
    assert_eq!(err.expression(), Some("${str:missing(x)}"));
    Ok(())
}

#[test]
fn big_integers() -> Result<()> {
    let manager = ExpressionManager::default();
    let value = manager
        .create_expression("${9223372036854775807 + 1}")?
        .evaluate(&mut VariableMap::new())?;
    match value {
        Value::Number(n) => assert_eq!(n.format_decimal(), "9223372036854775808"),
        other => bail!("expected a number, got {other:?}"),
    }
    Ok(())
}

#[test]
fn oversized_json_integers_widen_to_float() -> Result<()> {
    let manager = ExpressionManager::default();
    let mut vars = VariableMap::new().with(
        "a",
        Value::json(serde_json::json!({"big": 18446744073709551615u64, "small": 7})),
    );
    match manager.create_expression("${a.big}")?.evaluate(&mut vars)? {
        Value::Number(Number::Float(f)) => assert_eq!(f, 18446744073709551615u64 as f64),
        other => bail!("expected a float, got {other:?}"),
    }
    assert_eq!(
        manager.create_expression("${a.small}")?.evaluate(&mut vars)?,
        Value::from(7)
    );
    Ok(())
}

#[test]
fn strict_arity() -> Result<()> {
    let config = EngineConfig {
        strict_function_arity: true,
        ..EngineConfig::default()
    };
    let manager = ExpressionManager::new(config).with_function_delegate(Arc::new(
        FunctionDef::pure("str", "upper", 1, |args| {
            Ok(Value::from(args[0].to_text().to_uppercase()))
        }),
    ));
    let mut vars = VariableMap::new();
    let err = manager
        .create_expression("${str:upper('a', 'b')}")?
        .evaluate(&mut vars)
        .unwrap_err();
    assert!(err.to_string().contains("expects 1 argument"), "{err}");

    // Variadic calls are not checked.
    let mut vars = VariableMap::new().with("tags", Value::from(vec![Value::from("a")]));
    let found = manager
        .create_expression("${vars:contains(tags, 'a')}")?
        .evaluate(&mut vars)?;
    assert_eq!(found, Value::Bool(true));
    Ok(())
}

struct Echo;

impl ScriptEvaluator for Echo {
    fn languages(&self) -> Vec<&str> {
        vec!["echo", "Echo"]
    }

    fn evaluate(
        &self,
        script: &str,
        container: &mut dyn VariableContainer,
    ) -> anyhow::Result<Value> {
        container.set_variable("script", Value::from(script))?;
        Ok(Value::from(script.len()))
    }
}

#[test]
fn scripts_route_by_language() -> Result<()> {
    let manager = ExpressionManager::default().with_script_evaluator(Arc::new(Echo));
    let mut vars = VariableMap::new();
    assert_eq!(
        manager.evaluate_script("ECHO", "hello", &mut vars)?,
        Value::from(5usize)
    );
    assert_eq!(vars.get("script"), Some(&Value::from("hello")));
    assert!(matches!(
        manager.evaluate_script("groovy", "1", &mut vars),
        Err(Error::ScriptEngineNotFound(_))
    ));
    Ok(())
}
