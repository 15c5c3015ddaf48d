// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub mod variables;

use crate::ast::{Expr, Ref};
use crate::container::VariableContainer;
use crate::error::Result;
use crate::lexer::Span;
use crate::value::Value;

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

/// What a function sees of the evaluation it is called from.
pub struct CallContext<'a> {
    pub container: &'a mut dyn VariableContainer,
}

/// A set of `(prefix, local name)` declarations sharing one target.
///
/// Every prefix is paired with every local name.
pub trait FunctionDelegate: Send + Sync {
    fn prefixes(&self) -> Vec<&str>;

    fn local_names(&self) -> Vec<&str>;

    /// Expected argument count, `None` when variadic.
    fn arity(&self) -> Option<usize> {
        None
    }

    fn invoke(&self, ctx: &mut CallContext<'_>, args: &[Value]) -> anyhow::Result<Value>;

    fn declarations(&self) -> Vec<(String, String)> {
        let mut pairs = vec![];
        for prefix in self.prefixes() {
            for name in self.local_names() {
                pairs.push((prefix.to_string(), name.to_string()));
            }
        }
        pairs
    }

    fn declares(&self, prefix: &str, local_name: &str) -> bool {
        self.prefixes().contains(&prefix) && self.local_names().contains(&local_name)
    }
}

pub type FunctionFcn =
    dyn Fn(&mut CallContext<'_>, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static;

/// Closure backed delegate.
pub struct FunctionDef {
    prefixes: Vec<String>,
    names: Vec<String>,
    arity: Option<usize>,
    fcn: Box<FunctionFcn>,
}

impl FunctionDef {
    pub fn new<F>(prefix: &str, name: &str, fcn: F) -> Self
    where
        F: Fn(&mut CallContext<'_>, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            prefixes: vec![prefix.to_string()],
            names: vec![name.to_string()],
            arity: None,
            fcn: Box::new(fcn),
        }
    }

    /// Function that only looks at its arguments.
    pub fn pure<F>(prefix: &str, name: &str, arity: usize, fcn: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::new(prefix, name, move |_, args| fcn(args)).with_arity(arity)
    }

    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefixes.push(prefix.to_string());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.names.push(name.to_string());
        self
    }
}

impl FunctionDelegate for FunctionDef {
    fn prefixes(&self) -> Vec<&str> {
        self.prefixes.iter().map(String::as_str).collect()
    }

    fn local_names(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }

    fn arity(&self) -> Option<usize> {
        self.arity
    }

    fn invoke(&self, ctx: &mut CallContext<'_>, args: &[Value]) -> anyhow::Result<Value> {
        (self.fcn)(ctx, args)
    }
}

impl core::fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FunctionDef")
            .field("prefixes", &self.prefixes)
            .field("names", &self.names)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Looks up functions by `(prefix, local name)` at call time.
pub trait FunctionResolver: Send + Sync {
    fn resolve(&self, prefix: &str, local_name: &str) -> Option<Arc<dyn FunctionDelegate>>;
}

/// Declarations flattened into a lookup table when built.
/// The first delegate declaring a pair wins.
#[derive(Default)]
pub struct FunctionMap {
    functions: HashMap<(String, String), Arc<dyn FunctionDelegate>>,
}

impl FunctionMap {
    pub fn new(delegates: &[Arc<dyn FunctionDelegate>]) -> Self {
        let mut functions: HashMap<(String, String), Arc<dyn FunctionDelegate>> = HashMap::new();
        for delegate in delegates {
            for key in delegate.declarations() {
                if functions.contains_key(&key) {
                    debug!("function {}:{} already declared, ignoring", key.0, key.1);
                    continue;
                }
                functions.insert(key, delegate.clone());
            }
        }
        Self { functions }
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl FunctionResolver for FunctionMap {
    fn resolve(&self, prefix: &str, local_name: &str) -> Option<Arc<dyn FunctionDelegate>> {
        self.functions
            .get(&(prefix.to_string(), local_name.to_string()))
            .cloned()
    }
}

/// Delegates scanned in order on every lookup, so the list may change
/// after the engine is built.
#[derive(Default)]
pub struct DelegateList {
    delegates: RwLock<Vec<Arc<dyn FunctionDelegate>>>,
}

impl DelegateList {
    pub fn new(delegates: Vec<Arc<dyn FunctionDelegate>>) -> Self {
        Self {
            delegates: RwLock::new(delegates),
        }
    }

    pub fn add(&self, delegate: Arc<dyn FunctionDelegate>) {
        self.delegates.write().push(delegate);
    }

    /// Remove every delegate declaring the pair. Returns how many were removed.
    pub fn remove(&self, prefix: &str, local_name: &str) -> usize {
        let mut delegates = self.delegates.write();
        let before = delegates.len();
        delegates.retain(|d| !d.declares(prefix, local_name));
        before - delegates.len()
    }
}

impl FunctionResolver for DelegateList {
    fn resolve(&self, prefix: &str, local_name: &str) -> Option<Arc<dyn FunctionDelegate>> {
        self.delegates
            .read()
            .iter()
            .find(|d| d.declares(prefix, local_name))
            .cloned()
    }
}

/// A function call as seen by the parser.
pub struct CallSite {
    pub span: Span,
    pub prefix: Rc<str>,
    pub name: Rc<str>,
    pub params: Vec<Ref<Expr>>,
}

/// Builds the AST node for a function call.
pub trait FunctionNodeBuilder: Send + Sync {
    fn build(&self, site: CallSite) -> Result<Expr>;
}

/// Records the call as written.
pub struct DefaultFunctionBuilder;

impl FunctionNodeBuilder for DefaultFunctionBuilder {
    fn build(&self, site: CallSite) -> Result<Expr> {
        let arity = site.params.len();
        Ok(Expr::Call {
            span: site.span,
            prefix: site.prefix,
            name: site.name,
            params: site.params,
            arity,
            varargs: false,
        })
    }
}

/// Node builders keyed by `prefix:name` or by bare local name.
#[derive(Clone, Default)]
pub struct FunctionBuilders {
    builders: HashMap<String, Arc<dyn FunctionNodeBuilder>>,
}

impl FunctionBuilders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builders for the functions that ship with the engine.
    pub fn with_defaults() -> Self {
        let mut builders = Self::new();
        variables::register_builders(&mut builders);
        builders
    }

    pub fn add(&mut self, key: &str, builder: Arc<dyn FunctionNodeBuilder>) {
        self.builders.insert(key.to_string(), builder);
    }

    pub fn build(&self, site: CallSite) -> Result<Expr> {
        let qualified = format!("{}:{}", site.prefix, site.name);
        match self
            .builders
            .get(&qualified)
            .or_else(|| self.builders.get(site.name.as_ref()))
        {
            Some(builder) => builder.build(site),
            None => DefaultFunctionBuilder.build(site),
        }
    }
}
