// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::Template;
use crate::config::EngineConfig;
use crate::container::VariableContainer;
use crate::error::{Error, Result};
use crate::functions::{
    variables, FunctionBuilders, FunctionDelegate, FunctionMap, FunctionNodeBuilder,
    FunctionResolver,
};
use crate::interpreter::Interpreter;
use crate::parser;
use crate::resolver::{BeanMapResolver, CompositeResolver, ElContext, EvalMode};
use crate::value::Value;

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use log::debug;

/// Frozen registries shared by every expression of a manager.
pub struct Runtime {
    resolver: CompositeResolver,
    functions: Arc<dyn FunctionResolver>,
    config: EngineConfig,
}

impl Runtime {
    pub fn resolver(&self) -> &CompositeResolver {
        &self.resolver
    }

    pub fn functions(&self) -> &dyn FunctionResolver {
        self.functions.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// A compiled expression.
///
/// Each call builds a fresh evaluation context around the container it is
/// given, so the same expression can be evaluated against any number of
/// containers.
#[derive(Clone)]
pub struct Expression {
    text: Rc<str>,
    template: Rc<Template>,
    runtime: Arc<Runtime>,
}

impl Expression {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// True when the expression has no `${}` or `#{}` segment.
    pub fn is_literal_text(&self) -> bool {
        self.template.is_literal_text()
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    fn interpreter<'a, 'c>(
        &'a self,
        container: &'c mut dyn VariableContainer,
        mode: EvalMode,
    ) -> Interpreter<'a, 'c> {
        Interpreter::new(
            &self.runtime.resolver,
            self.runtime.functions.as_ref(),
            self.runtime.config.strict_function_arity,
            ElContext::new(container, mode),
        )
    }

    pub fn evaluate(&self, container: &mut dyn VariableContainer) -> Result<Value> {
        self.interpreter(container, EvalMode::Read)
            .eval_template(&self.template)
            .map_err(|e| e.with_expression(&self.text))
    }

    /// Store `value` at the location the expression names, e.g. `${a.b}`.
    pub fn assign(&self, value: Value, container: &mut dyn VariableContainer) -> Result<()> {
        self.interpreter(container, EvalMode::Write)
            .assign_template(&self.template, value)
            .map_err(|e| e.with_expression(&self.text))
    }
}

impl core::fmt::Debug for Expression {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Expression({})", self.text)
    }
}

/// External evaluator for script languages.
pub trait ScriptEvaluator: Send + Sync {
    /// Language names this evaluator answers to.
    fn languages(&self) -> Vec<&str>;

    fn evaluate(
        &self,
        script: &str,
        container: &mut dyn VariableContainer,
    ) -> anyhow::Result<Value>;
}

/// Script evaluators keyed by case-insensitive language name.
#[derive(Clone, Default)]
pub struct ScriptingEngines {
    engines: HashMap<String, Arc<dyn ScriptEvaluator>>,
}

impl ScriptingEngines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, evaluator: Arc<dyn ScriptEvaluator>) {
        for language in evaluator.languages() {
            debug!("registering script engine for `{language}`");
            self.engines
                .insert(language.to_lowercase(), evaluator.clone());
        }
    }

    pub fn has_language(&self, language: &str) -> bool {
        self.engines.contains_key(&language.to_lowercase())
    }

    pub fn evaluate(
        &self,
        language: &str,
        script: &str,
        container: &mut dyn VariableContainer,
    ) -> Result<Value> {
        let Some(engine) = self.engines.get(&language.to_lowercase()) else {
            return Err(Error::ScriptEngineNotFound(language.to_string()));
        };
        engine
            .evaluate(script, container)
            .map_err(|source| Error::Script {
                language: language.to_string(),
                source,
            })
    }
}

/// Compiles expressions against a fixed set of beans, functions and
/// call-node builders.
pub struct ExpressionManager {
    config: EngineConfig,
    beans: BeanMapResolver,
    delegates: Vec<Arc<dyn FunctionDelegate>>,
    function_resolver: Option<Arc<dyn FunctionResolver>>,
    builders: Arc<FunctionBuilders>,
    scripts: ScriptingEngines,
    runtime: Arc<Runtime>,
}

impl Default for ExpressionManager {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ExpressionManager {
    pub fn new(config: EngineConfig) -> Self {
        let builders = match config.json_functions {
            true => FunctionBuilders::with_defaults(),
            false => FunctionBuilders::new(),
        };
        let mut manager = Self {
            runtime: Arc::new(Runtime {
                resolver: CompositeResolver::new(),
                functions: Arc::new(FunctionMap::default()),
                config: config.clone(),
            }),
            config,
            beans: BeanMapResolver::new(),
            delegates: vec![],
            function_resolver: None,
            builders: Arc::new(builders),
            scripts: ScriptingEngines::new(),
        };
        manager.freeze();
        manager
    }

    fn freeze(&mut self) {
        let functions = match &self.function_resolver {
            Some(resolver) => resolver.clone(),
            None => {
                let mut delegates = self.delegates.clone();
                if self.config.json_functions {
                    delegates.extend(variables::delegates());
                }
                let map = FunctionMap::new(&delegates);
                debug!("function map holds {} declarations", map.len());
                Arc::new(map) as Arc<dyn FunctionResolver>
            }
        };
        self.runtime = Arc::new(Runtime {
            resolver: CompositeResolver::standard(self.beans.clone()),
            functions,
            config: self.config.clone(),
        });
    }

    pub fn with_beans(mut self, beans: BeanMapResolver) -> Self {
        self.beans = beans;
        self.freeze();
        self
    }

    /// Later delegates never replace a declaration made by an earlier one.
    pub fn with_function_delegate(mut self, delegate: Arc<dyn FunctionDelegate>) -> Self {
        self.delegates.push(delegate);
        self.freeze();
        self
    }

    /// Look functions up through `resolver` instead of the flattened map of
    /// registered delegates.
    pub fn with_function_resolver(mut self, resolver: Arc<dyn FunctionResolver>) -> Self {
        self.function_resolver = Some(resolver);
        self.freeze();
        self
    }

    /// Use `builder` for calls to `key`, either `prefix:name` or a bare name.
    pub fn with_function_node_builder(
        mut self,
        key: &str,
        builder: Arc<dyn FunctionNodeBuilder>,
    ) -> Self {
        Arc::make_mut(&mut self.builders).add(key, builder);
        self
    }

    pub fn with_script_evaluator(mut self, evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        self.scripts.add(evaluator);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Parse `text` once. Functions are looked up when the expression runs.
    pub fn create_expression(&self, text: &str) -> Result<Expression> {
        debug!("compiling expression `{text}`");
        let template = parser::parse(text, &self.builders)?;
        Ok(Expression {
            text: Rc::from(text),
            template: Rc::new(template),
            runtime: self.runtime.clone(),
        })
    }

    pub fn evaluate_script(
        &self,
        language: &str,
        script: &str,
        container: &mut dyn VariableContainer,
    ) -> Result<Value> {
        self.scripts.evaluate(language, script, container)
    }
}
