//! JMESPath extraction.

use serde_json::Value;

use crate::{BuildError, PluginError};

/// Projects source data through a compiled JMESPath expression.
pub struct JmespathTransformer {
    expression: ::jmespath::Expression<'static>,
}

impl std::fmt::Debug for JmespathTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("JmespathTransformer")
            .field(&self.expression.as_str())
            .finish()
    }
}

impl JmespathTransformer {
    /// Compile `expression`. Runs of whitespace (multi-line mappings) are
    /// collapsed to single spaces first.
    pub fn new(expression: &str) -> Result<Self, BuildError> {
        let normalized = expression.split_whitespace().collect::<Vec<_>>().join(" ");
        let expression = ::jmespath::compile(&normalized).map_err(|e| BuildError::InvalidQuery {
            expression: normalized.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { expression })
    }

    pub fn expression(&self) -> &str {
        self.expression.as_str()
    }

    pub fn transform(&self, source: &Value) -> Result<Value, PluginError> {
        let result = self
            .expression
            .search(source)
            .map_err(|e| PluginError::Transform(e.to_string()))?;
        serde_json::to_value(&*result).map_err(|e| PluginError::Transform(e.to_string()))
    }
}
