//! Engine-level error types.

use thiserror::Error;

use plugins::BuildError;

/// Errors produced by the workflow engine (construction + processing).
///
/// Plugin invocation failures never appear here: they are contained by the
/// runner and reported through the event sink.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Definition errors ------

    /// The definition has no states at all.
    #[error("workflow definition declares no states")]
    EmptyDefinition,

    /// `initial` names a state that is not declared.
    #[error("initial state '{0}' is not defined within the workflow definition's states")]
    UnknownInitialState(String),

    /// A transition points at a state that is not declared.
    #[error("transition '{event}' from '{from}' targets unknown state '{target}'")]
    UnknownTransitionTarget {
        from: String,
        event: String,
        target: String,
    },

    /// A guard could not be compiled.
    #[error("invalid guard on '{event}' from '{from}': {reason}")]
    InvalidGuard {
        from: String,
        event: String,
        reason: String,
    },

    // ------ Extension errors ------

    /// A plugin is bound to a state that is not declared.
    #[error("plugin '{plugin}': {state} is not defined within the workflow definition's states")]
    UnknownPluginState { plugin: String, state: String },

    /// A plugin descriptor could not be materialised.
    #[error(transparent)]
    Plugin(#[from] BuildError),

    // ------ Runtime errors ------

    /// The checkpoint resumes into a state the definition does not declare.
    #[error("checkpoint state '{0}' is not defined within the workflow definition's states")]
    UnknownCheckpointState(String),

    /// Callback actions kept raising further callbacks past the configured limit.
    #[error("callback chain exceeded {limit} chained events")]
    CallbackChainExceeded { limit: usize },

    /// Runner configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
