//! Definition validation. Run this before building a state machine.
//!
//! Rules enforced:
//! 1. The definition declares at least one state.
//! 2. `initial` names a declared state.
//! 3. Every transition target names a declared state.
//! 4. Every plugin is bound only to declared states.
//!
//! Guard compilation happens in the state machine build, which reports
//! [`EngineError::InvalidGuard`] itself.

use crate::{EngineError, models::WorkflowDefinition};

/// Validate the definition's state graph.
///
/// # Errors
/// - [`EngineError::EmptyDefinition`] if there are no states.
/// - [`EngineError::UnknownInitialState`] if `initial` is undeclared.
/// - [`EngineError::UnknownTransitionTarget`] if a transition points nowhere.
pub fn validate_definition(definition: &WorkflowDefinition) -> Result<(), EngineError> {
    // -----------------------------------------------------------------------
    // 1. At least one state
    // -----------------------------------------------------------------------
    if definition.states.is_empty() {
        return Err(EngineError::EmptyDefinition);
    }

    // -----------------------------------------------------------------------
    // 2. Initial state
    // -----------------------------------------------------------------------
    if !definition.has_state(&definition.initial) {
        return Err(EngineError::UnknownInitialState(definition.initial.clone()));
    }

    // -----------------------------------------------------------------------
    // 3. Transition targets
    // -----------------------------------------------------------------------
    for (from, state) in &definition.states {
        for (event, transitions) in &state.on {
            for candidate in transitions.candidates() {
                let Some(target) = candidate.target else { continue };
                if !definition.has_state(&target) {
                    return Err(EngineError::UnknownTransitionTarget {
                        from: from.clone(),
                        event: event.clone(),
                        target,
                    });
                }
            }
        }
    }

    Ok(())
}

/// Check that every state a plugin is bound to exists.
///
/// # Errors
/// [`EngineError::UnknownPluginState`] naming the plugin and the first
/// undeclared state.
pub fn validate_plugin_states(
    definition: &WorkflowDefinition,
    plugin: &str,
    state_names: &[String],
) -> Result<(), EngineError> {
    match state_names.iter().find(|s| !definition.has_state(s)) {
        Some(state) => Err(EngineError::UnknownPluginState {
            plugin: plugin.to_owned(),
            state: state.clone(),
        }),
        None => Ok(()),
    }
}
