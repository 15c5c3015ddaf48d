// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// Errors raised while compiling or evaluating expressions and while
/// persisting or restoring variables.
///
/// Evaluation-time variants carry the text of the expression that failed.
/// Code below the expression handle raises them with an empty expression;
/// [`Error::with_expression`] fills it in on the way out.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed expression text. `message` is a rendered caret diagnostic.
    #[error("{message}")]
    Syntax {
        expression: String,
        line: u32,
        col: u32,
        message: String,
    },

    #[error("cannot resolve property `{property}` in expression `{expression}`")]
    PropertyNotFound { expression: String, property: String },

    #[error("method `{method}` not found in expression `{expression}`")]
    MethodNotFound { expression: String, method: String },

    #[error("function `{prefix}:{name}` not found in expression `{expression}`")]
    FunctionNotFound {
        expression: String,
        prefix: String,
        name: String,
    },

    #[error("property `{property}` is not writable in expression `{expression}`")]
    NotWritable { expression: String, property: String },

    #[error("error evaluating `{expression}`: {message}")]
    Evaluation { expression: String, message: String },

    #[error("call to `{name}` failed in expression `{expression}`: {source}")]
    Function {
        expression: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("no variable type can store a value of type `{0}`")]
    NoMatchingVariableType(String),

    #[error("unknown variable type `{0}`")]
    UnknownVariableType(String),

    #[error("variable `{variable}` could not be deserialized: {message}")]
    Deserialization { variable: String, message: String },

    #[error("variable type `{0}` is read-only and cannot store values")]
    UnsupportedMutationForReadOnlyType(String),

    #[error("no script engine registered for language `{0}`")]
    ScriptEngineNotFound(String),

    #[error("{language} script failed: {source}")]
    Script {
        language: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("close listener(s) failed: {}", .0.join("; "))]
    CloseListener(Vec<String>),

    #[error("close listener `{0}` does not allow multiple registrations")]
    DuplicateCloseListener(String),

    #[error("unit of work is already closed")]
    UnitOfWorkClosed,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

impl Error {
    pub(crate) fn property_not_found(property: impl Into<String>) -> Self {
        Error::PropertyNotFound {
            expression: String::new(),
            property: property.into(),
        }
    }

    pub(crate) fn method_not_found(method: impl Into<String>) -> Self {
        Error::MethodNotFound {
            expression: String::new(),
            method: method.into(),
        }
    }

    pub(crate) fn not_writable(property: impl Into<String>) -> Self {
        Error::NotWritable {
            expression: String::new(),
            property: property.into(),
        }
    }

    pub(crate) fn evaluation(message: impl Into<String>) -> Self {
        Error::Evaluation {
            expression: String::new(),
            message: message.into(),
        }
    }

    /// Attach the source text of the failing expression.
    /// Errors that already name an expression are left untouched.
    pub fn with_expression(mut self, text: &str) -> Self {
        match &mut self {
            Error::PropertyNotFound { expression, .. }
            | Error::MethodNotFound { expression, .. }
            | Error::FunctionNotFound { expression, .. }
            | Error::NotWritable { expression, .. }
            | Error::Evaluation { expression, .. }
            | Error::Function { expression, .. }
            | Error::Syntax { expression, .. }
                if expression.is_empty() =>
            {
                *expression = text.to_string();
            }
            _ => (),
        }
        self
    }

    /// The expression text attached to an evaluation or syntax error.
    pub fn expression(&self) -> Option<&str> {
        match self {
            Error::PropertyNotFound { expression, .. }
            | Error::MethodNotFound { expression, .. }
            | Error::FunctionNotFound { expression, .. }
            | Error::NotWritable { expression, .. }
            | Error::Evaluation { expression, .. }
            | Error::Function { expression, .. }
            | Error::Syntax { expression, .. } => Some(expression),
            _ => None,
        }
    }
}
