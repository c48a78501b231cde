//! Plugin-level error types.

use thiserror::Error;

/// Errors returned by a plugin's `invoke` (or a state action's `run`).
///
/// The runner never propagates these to its caller. It uses the variant to
/// classify the diagnostic event it emits:
/// - `Http`: reported as an `HTTP_ERROR` event.
/// - others: reported as a generic `ERROR` event.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PluginError {
    /// The remote side answered with a non-success HTTP status.
    #[error("request failed with status {status}: {message}")]
    Http { status: u16, message: String },

    /// A transformer could not evaluate against the supplied data.
    #[error("transform failed: {0}")]
    Transform(String),

    /// A payload did not satisfy its declared schema.
    #[error("{stage} validation failed: {}", errors.join("; "))]
    Validation {
        stage: &'static str,
        errors: Vec<String>,
    },

    /// Any other failure raised by a plugin or a host capability.
    #[error("{0}")]
    Failed(String),
}

impl PluginError {
    /// Convenience constructor for generic failures.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// `true` when the failure came from an HTTP exchange.
    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http { .. })
    }
}

/// Errors raised while materialising plugins from their descriptors.
///
/// All of these are fatal: they surface before any event is processed.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("transformer '{0}' is not supported")]
    UnsupportedTransformer(String),

    #[error("validator '{0}' is not supported")]
    UnsupportedValidator(String),

    #[error("invalid jmespath expression '{expression}': {reason}")]
    InvalidQuery { expression: String, reason: String },

    #[error("invalid helper mapping: {0}")]
    InvalidHelper(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// An iterative plugin names an action plugin that was never declared.
    #[error("plugin '{plugin}' references unknown action plugin '{action}'")]
    UnknownActionPlugin { plugin: String, action: String },

    /// Two plugins in the same collection share a name.
    #[error("duplicate plugin name '{0}'")]
    DuplicatePluginName(String),

    /// An outbound plugin was declared but the host supplied no integration.
    #[error("plugin '{0}' requires an integration but none was configured")]
    MissingIntegration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_errors_are_classified() {
        let http = PluginError::Http { status: 502, message: "bad gateway".into() };
        assert!(http.is_http());
        assert!(!PluginError::failed("boom").is_http());
    }

    #[test]
    fn validation_error_lists_every_problem() {
        let err = PluginError::Validation {
            stage: "request",
            errors: vec!["a is required".into(), "b must be a number".into()],
        };
        assert_eq!(
            err.to_string(),
            "request validation failed: a is required; b must be a number"
        );
    }
}
