//! State machine core.
//!
//! [`StateMachine::build`] validates the definition, wires non-blocking state
//! plugins into the entry (`pre`) or exit (`post`) lists of their states and
//! compiles every guard. [`StateMachine::transition`] is then a pure function
//! of `(state, context, event)`: it decides the next state and lists the
//! actions to fire, but runs nothing itself.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use plugins::{StatePlugin, WorkflowEvent, When};

use crate::EngineError;
use crate::events::UPDATE_CONTEXT;
use crate::guards::{Guard, guard_data};
use crate::models::WorkflowDefinition;
use crate::validate::{validate_definition, validate_plugin_states};

// ---------------------------------------------------------------------------
// Compiled definition
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct CompiledTransition {
    target: Option<String>,
    guard: Option<Guard>,
    actions: Vec<String>,
}

#[derive(Debug)]
struct CompiledState {
    entry: Vec<String>,
    exit: Vec<String>,
    on: BTreeMap<String, Vec<CompiledTransition>>,
    is_final: bool,
}

// ---------------------------------------------------------------------------
// Transition outcome
// ---------------------------------------------------------------------------

/// Something a guard wants reported, without having reported it.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardDiagnostic {
    /// A rule evaluated to false and asked for `RULE_EVALUATION_FAILURE`.
    RuleFailed(Value),
    /// A guard raised an error; it counted as false.
    EvaluationError(String),
}

/// The decision for one event.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub source: String,
    /// State after the event; equal to `source` when nothing moved.
    pub target: String,
    /// A transition (or the built-in context update) was selected.
    pub handled: bool,
    /// Exit actions of `source`, transition actions, entry actions of `target`.
    pub actions: Vec<String>,
    /// Built-in `UPDATE_CONTEXT` merge.
    pub context_patch: Option<Map<String, Value>>,
    pub diagnostics: Vec<GuardDiagnostic>,
}

impl TransitionOutcome {
    pub fn changed(&self) -> bool {
        self.source != self.target
    }
}

// ---------------------------------------------------------------------------
// StateMachine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct StateMachine {
    id: Option<String>,
    initial: String,
    states: BTreeMap<String, CompiledState>,
}

impl StateMachine {
    /// Build an executable machine.
    ///
    /// # Errors
    /// Any definition error from [`validate_definition`],
    /// [`EngineError::UnknownPluginState`] for a plugin bound to an undeclared
    /// state, and [`EngineError::InvalidGuard`] for a guard that does not compile.
    pub fn build(
        definition: &WorkflowDefinition,
        non_blocking: &[StatePlugin],
    ) -> Result<Self, EngineError> {
        validate_definition(definition)?;

        let mut states = BTreeMap::new();
        for (name, state) in &definition.states {
            let mut on = BTreeMap::new();
            for (event, transitions) in &state.on {
                let compiled = transitions
                    .candidates()
                    .into_iter()
                    .map(|candidate| {
                        let guard = candidate
                            .cond
                            .as_ref()
                            .map(Guard::compile)
                            .transpose()
                            .map_err(|e| EngineError::InvalidGuard {
                                from: name.clone(),
                                event: event.clone(),
                                reason: e.to_string(),
                            })?;
                        Ok(CompiledTransition {
                            target: candidate.target,
                            guard,
                            actions: candidate.actions,
                        })
                    })
                    .collect::<Result<Vec<_>, EngineError>>()?;
                on.insert(event.clone(), compiled);
            }

            states.insert(
                name.clone(),
                CompiledState {
                    entry: state.entry.clone(),
                    exit: state.exit.clone(),
                    on,
                    is_final: state.is_final(),
                },
            );
        }

        for plugin in non_blocking.iter().filter(|p| !p.is_blocking) {
            validate_plugin_states(definition, &plugin.name, &plugin.state_names)?;
            for state_name in &plugin.state_names {
                let Some(state) = states.get_mut(state_name) else { continue };
                let actions = match plugin.when {
                    When::Pre => &mut state.entry,
                    When::Post => &mut state.exit,
                };
                if !actions.contains(&plugin.name) {
                    actions.push(plugin.name.clone());
                }
            }
        }

        Ok(Self {
            id: definition.id.clone(),
            initial: definition.initial.clone(),
            states,
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn initial(&self) -> &str {
        &self.initial
    }

    pub fn contains(&self, state: &str) -> bool {
        self.states.contains_key(state)
    }

    pub fn is_final(&self, state: &str) -> bool {
        self.states.get(state).is_some_and(|s| s.is_final)
    }

    pub fn entry_actions(&self, state: &str) -> &[String] {
        self.states.get(state).map(|s| s.entry.as_slice()).unwrap_or_default()
    }

    pub fn exit_actions(&self, state: &str) -> &[String] {
        self.states.get(state).map(|s| s.exit.as_slice()).unwrap_or_default()
    }

    /// Decide what `event` does in `state` given `context`.
    ///
    /// Candidates are tried in declaration order; the first whose guard passes
    /// (or that has none) is taken. A state without its own `UPDATE_CONTEXT`
    /// transition falls back to merging the event payload into the context.
    pub fn transition(&self, state: &str, context: &Value, event: &WorkflowEvent) -> TransitionOutcome {
        let mut outcome = TransitionOutcome {
            source: state.to_owned(),
            target: state.to_owned(),
            handled: false,
            actions: Vec::new(),
            context_patch: None,
            diagnostics: Vec::new(),
        };

        let Some(current) = self.states.get(state) else {
            return outcome;
        };

        let Some(candidates) = current.on.get(&event.event_type) else {
            if event.event_type == UPDATE_CONTEXT {
                outcome.handled = true;
                outcome.context_patch = Some(event.payload_fields().cloned().unwrap_or_default());
            }
            return outcome;
        };

        let data = guard_data(context, &event.payload);
        let selected = candidates.iter().find(|candidate| {
            let Some(guard) = &candidate.guard else { return true };
            match guard.evaluate(&data) {
                Ok(true) => true,
                Ok(false) => {
                    if guard.options().assign_on_failure {
                        let options = serde_json::to_value(guard.options()).unwrap_or_default();
                        outcome.diagnostics.push(GuardDiagnostic::RuleFailed(options));
                    }
                    false
                }
                Err(error) => {
                    outcome.diagnostics.push(GuardDiagnostic::EvaluationError(error.to_string()));
                    false
                }
            }
        });

        let Some(selected) = selected else {
            debug!(state, event = %event.event_type, "no transition guard passed");
            return outcome;
        };

        outcome.handled = true;
        match &selected.target {
            Some(target) => {
                outcome.actions.extend(current.exit.iter().cloned());
                outcome.actions.extend(selected.actions.iter().cloned());
                outcome.actions.extend(self.entry_actions(target).iter().cloned());
                outcome.target = target.clone();
            }
            None => outcome.actions.extend(selected.actions.iter().cloned()),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use plugins::mock::MockStateAction;
    use proptest::prelude::*;
    use serde_json::json;

    fn definition() -> WorkflowDefinition {
        serde_json::from_value(json!({
            "id": "onboarding",
            "initial": "A",
            "states": {
                "A": {
                    "exit": ["leaveA"],
                    "on": {
                        "GO": {
                            "target": "B",
                            "actions": ["audit"],
                            "cond": { "type": "json-logic", "options": {
                                "rule": { "==": [{ "var": "amount" }, 10] },
                                "assignOnFailure": true
                            } }
                        },
                        "PING": { "actions": ["pong"] }
                    }
                },
                "B": {
                    "entry": ["enterB"],
                    "on": {
                        "DECIDE": [
                            { "target": "A", "cond": { "type": "jmespath", "options": { "rule": "rejected" } } },
                            { "target": "C" }
                        ],
                        "UPDATE_CONTEXT": "C"
                    }
                },
                "C": { "type": "final" }
            }
        }))
        .unwrap()
    }

    fn plugin(name: &str, states: &[&str], when: When, blocking: bool) -> StatePlugin {
        StatePlugin::new(name, states.iter().copied(), when, blocking, Arc::new(MockStateAction::new()))
    }

    #[test]
    fn guarded_transition_passes() {
        let machine = StateMachine::build(&definition(), &[]).unwrap();
        let outcome = machine.transition("A", &json!({ "amount": 10 }), &WorkflowEvent::new("GO"));

        assert_eq!(outcome.target, "B");
        assert!(outcome.changed());
        assert_eq!(outcome.actions, vec!["leaveA", "audit", "enterB"]);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn failed_rule_with_assign_on_failure_reports_options() {
        let machine = StateMachine::build(&definition(), &[]).unwrap();
        let outcome = machine.transition("A", &json!({ "amount": 5 }), &WorkflowEvent::new("GO"));

        assert_eq!(outcome.target, "A");
        assert!(!outcome.handled);
        assert!(matches!(
            &outcome.diagnostics[..],
            [GuardDiagnostic::RuleFailed(options)] if options["assignOnFailure"] == json!(true)
        ));
    }

    #[test]
    fn event_payload_feeds_the_guard() {
        let machine = StateMachine::build(&definition(), &[]).unwrap();
        let event = WorkflowEvent::new("GO").with_payload(json!({ "amount": 10 }));
        assert_eq!(machine.transition("A", &json!({ "amount": 5 }), &event).target, "B");
    }

    #[test]
    fn first_passing_candidate_wins() {
        let machine = StateMachine::build(&definition(), &[]).unwrap();
        let decide = WorkflowEvent::new("DECIDE");

        assert_eq!(machine.transition("B", &json!({ "rejected": true }), &decide).target, "A");
        assert_eq!(machine.transition("B", &json!({}), &decide).target, "C");
    }

    #[test]
    fn targetless_transition_runs_actions_only() {
        let machine = StateMachine::build(&definition(), &[]).unwrap();
        let outcome = machine.transition("A", &json!({}), &WorkflowEvent::new("PING"));

        assert!(outcome.handled);
        assert!(!outcome.changed());
        assert_eq!(outcome.actions, vec!["pong"]);
    }

    #[test]
    fn update_context_is_built_in() {
        let machine = StateMachine::build(&definition(), &[]).unwrap();
        let event = WorkflowEvent::new(UPDATE_CONTEXT).with_payload(json!({ "x": 1 }));
        let outcome = machine.transition("A", &json!({}), &event);

        assert_eq!(outcome.target, "A");
        assert_eq!(outcome.context_patch, json!({ "x": 1 }).as_object().cloned());
    }

    #[test]
    fn state_level_update_context_overrides_built_in() {
        let machine = StateMachine::build(&definition(), &[]).unwrap();
        let event = WorkflowEvent::new(UPDATE_CONTEXT).with_payload(json!({ "x": 1 }));
        let outcome = machine.transition("B", &json!({}), &event);

        assert_eq!(outcome.target, "C");
        assert!(outcome.context_patch.is_none());
        assert!(machine.is_final("C"));
    }

    #[test]
    fn unknown_event_is_ignored() {
        let machine = StateMachine::build(&definition(), &[]).unwrap();
        let outcome = machine.transition("A", &json!({}), &WorkflowEvent::new("NOPE"));
        assert!(!outcome.handled);
        assert_eq!(outcome.target, "A");
    }

    #[test]
    fn non_blocking_plugins_are_injected_once() {
        let plugins = vec![
            plugin("persist", &["B"], When::Pre, false),
            plugin("persist", &["B"], When::Pre, false),
            plugin("cleanup", &["A"], When::Post, false),
            plugin("blocking", &["A"], When::Pre, true),
        ];
        let machine = StateMachine::build(&definition(), &plugins).unwrap();

        assert_eq!(machine.entry_actions("B"), ["enterB", "persist"]);
        assert_eq!(machine.exit_actions("A"), ["leaveA", "cleanup"]);
        assert!(machine.entry_actions("A").is_empty());
    }

    #[test]
    fn plugin_bound_to_unknown_state_fails_build() {
        let plugins = vec![plugin("persist", &["Z"], When::Pre, false)];
        assert!(matches!(
            StateMachine::build(&definition(), &plugins),
            Err(EngineError::UnknownPluginState { plugin, state }) if plugin == "persist" && state == "Z"
        ));
    }

    #[test]
    fn invalid_query_guard_fails_build() {
        let mut def = definition();
        def.states.get_mut("B").unwrap().on.insert(
            "BROKEN".into(),
            serde_json::from_value(json!({ "target": "C", "cond": { "type": "jmespath", "options": { "rule": "a.[" } } }))
                .unwrap(),
        );
        assert!(matches!(
            StateMachine::build(&def, &[]),
            Err(EngineError::InvalidGuard { event, .. }) if event == "BROKEN"
        ));
    }

    proptest! {
        #[test]
        fn only_declared_edges_are_taken(
            event in prop::sample::select(vec!["GO", "PING", "DECIDE", "UPDATE_CONTEXT", "NOPE", "RESET"]),
            state in prop::sample::select(vec!["A", "B", "C"]),
            amount in 0i64..20,
            rejected in any::<bool>(),
        ) {
            let def = definition();
            let machine = StateMachine::build(&def, &[]).unwrap();
            let context = json!({ "amount": amount, "rejected": rejected });

            let outcome = machine.transition(state, &context, &WorkflowEvent::new(event));

            if outcome.changed() {
                let declared = def.states[state].on.get(event).map(|t| t.candidates()).unwrap_or_default();
                prop_assert!(declared.iter().any(|c| c.target.as_deref() == Some(outcome.target.as_str())));
            }
            prop_assert!(machine.contains(&outcome.target));
        }
    }
}
