//! Structural payload validation.
//!
//! Compiles the declared JSON Schema once, when the plugin is built, and
//! validates payloads against it on every invocation. A validator without a
//! schema accepts everything.

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use crate::BuildError;

/// The only validator kind currently understood.
pub const JSON_SCHEMA: &str = "json-schema";

/// Result of validating one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct SchemaValidator {
    schema: Option<JSONSchema>,
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("has_schema", &self.has_schema())
            .finish()
    }
}

impl SchemaValidator {
    /// A validator that accepts every payload.
    pub fn none() -> Self {
        Self::default()
    }

    /// Build a validator of `kind` for `schema`.
    ///
    /// # Errors
    /// - [`BuildError::UnsupportedValidator`] for any kind but `json-schema`.
    /// - [`BuildError::InvalidSchema`] if the schema does not compile.
    pub fn try_new(kind: &str, schema: Option<&Value>) -> Result<Self, BuildError> {
        if kind != JSON_SCHEMA {
            return Err(BuildError::UnsupportedValidator(kind.to_owned()));
        }

        let Some(schema) = schema else {
            return Ok(Self::none());
        };

        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(schema)
            .map_err(|e| BuildError::InvalidSchema(e.to_string()))?;

        Ok(Self {
            schema: Some(compiled),
        })
    }

    pub fn has_schema(&self) -> bool {
        self.schema.is_some()
    }

    pub fn validate(&self, payload: &Value) -> ValidationOutcome {
        let Some(schema) = &self.schema else {
            return ValidationOutcome::valid();
        };

        match schema.validate(payload) {
            Ok(()) => ValidationOutcome::valid(),
            Err(errors) => ValidationOutcome {
                valid: false,
                errors: errors
                    .map(|e| format!("'{}': {}", e.instance_path, e.to_string().replace('\n', " ")))
                    .collect(),
            },
        }
    }
}
