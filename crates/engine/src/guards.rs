//! Transition guards: json-logic rule trees and JMESPath queries.
//!
//! Both strategies evaluate against `{...context, ...event.payload}` and never
//! touch the context itself. Evaluation errors are returned to the caller,
//! which decides how to report them.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{GuardOptions, GuardSpec};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GuardError {
    #[error("query guard rule must be a string")]
    QueryNotAString,

    #[error("invalid query '{expression}': {reason}")]
    InvalidQuery { expression: String, reason: String },

    #[error("guard evaluation failed: {0}")]
    Evaluation(String),
}

/// A compiled guard.
pub enum Guard {
    Rule(GuardOptions),
    Query {
        expression: ::jmespath::Expression<'static>,
        options: GuardOptions,
    },
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rule(options) => f.debug_tuple("Rule").field(&options.rule).finish(),
            Self::Query { expression, .. } => {
                f.debug_tuple("Query").field(&expression.as_str()).finish()
            }
        }
    }
}

impl Guard {
    /// Compile a guard. JMESPath expressions are parsed here, once.
    pub fn compile(spec: &GuardSpec) -> Result<Self, GuardError> {
        match spec {
            GuardSpec::Rule(options) => Ok(Self::Rule(options.clone())),
            GuardSpec::Query(options) => {
                let source = options.rule.as_str().ok_or(GuardError::QueryNotAString)?;
                let expression =
                    ::jmespath::compile(source).map_err(|e| GuardError::InvalidQuery {
                        expression: source.to_owned(),
                        reason: e.to_string(),
                    })?;
                Ok(Self::Query {
                    expression,
                    options: options.clone(),
                })
            }
        }
    }

    pub fn options(&self) -> &GuardOptions {
        match self {
            Self::Rule(options) | Self::Query { options, .. } => options,
        }
    }

    /// Evaluate against pre-merged guard data (see [`guard_data`]).
    pub fn evaluate(&self, data: &Value) -> Result<bool, GuardError> {
        match self {
            Self::Rule(options) => jsonlogic::apply(&options.rule, data)
                .map(|result| is_truthy(&result))
                .map_err(GuardError::Evaluation),
            Self::Query { expression, .. } => expression
                .search(data)
                .map(|result| result.is_truthy())
                .map_err(|e| GuardError::Evaluation(e.to_string())),
        }
    }
}

/// `{...context, ...payload}`: payload fields shadow context fields.
pub fn guard_data(context: &Value, payload: &Value) -> Value {
    let mut data = match context {
        Value::Object(fields) => fields.clone(),
        _ => Map::new(),
    };
    if let Value::Object(fields) = payload {
        data.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    Value::Object(data)
}

/// JavaScript truthiness, which is what json-logic rules are written against.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
