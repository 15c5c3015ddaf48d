// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

mod ast;
mod config;
mod container;
mod error;
mod expression;
pub mod functions;
mod interpreter;
mod lexer;
mod number;
mod parser;
pub mod resolver;
mod scope;
mod session;
pub mod tracking;
mod tree;
pub mod types;
mod value;

pub use config::EngineConfig;
pub use container::{VariableContainer, VariableMap};
pub use error::{Error, Result};
pub use expression::{Expression, ExpressionManager, Runtime, ScriptEvaluator, ScriptingEngines};
pub use functions::{
    CallContext, FunctionBuilders, FunctionDef, FunctionDelegate, FunctionMap, FunctionResolver,
};
pub use number::{BigInt, Number};
pub use resolver::{BeanMapResolver, CompositeResolver, EvalMode};
pub use scope::{InstanceRef, VariableInstance, VariableScope};
pub use session::{
    Clock, CloseListener, FixedClock, SystemClock, UnitOfWork, VariableHistory,
};
pub use tree::{JsonKey, JsonNode};
pub use types::{ValueFields, VariableType, VariableTypes};
pub use value::{Bean, NodeId, ObjectRef, Shared, Value, ValueKind};

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::ast::*;
    pub use crate::interpreter::Interpreter;
    pub use crate::lexer::*;
    pub use crate::parser::*;
}
