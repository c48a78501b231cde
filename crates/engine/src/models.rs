//! Core domain models for the workflow engine.
//!
//! A [`WorkflowDefinition`] is the declarative state chart for one process
//! type. It deserializes from the xstate-like JSON shape hosts already store:
//!
//! ```json
//! {
//!   "id": "onboarding",
//!   "initial": "A",
//!   "states": {
//!     "A": { "on": { "GO": { "target": "B", "cond": { "type": "json-logic", "options": { "rule": {} } } } } },
//!     "B": { "type": "final" }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// Options shared by both guard strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardOptions {
    /// A json-logic tree, or a JMESPath expression string.
    pub rule: Value,
    /// Emit `RULE_EVALUATION_FAILURE` when the rule evaluates to false.
    #[serde(default)]
    pub assign_on_failure: bool,
    /// Anything else the author attached; echoed back in diagnostics.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A transition guard: `{ "type": "json-logic" | "jmespath", "options": {..} }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "options")]
pub enum GuardSpec {
    #[serde(rename = "json-logic", alias = "rule")]
    Rule(GuardOptions),
    #[serde(rename = "jmespath", alias = "query")]
    Query(GuardOptions),
}

impl GuardSpec {
    pub fn options(&self) -> &GuardOptions {
        match self {
            Self::Rule(options) | Self::Query(options) => options,
        }
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// One candidate transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionConfig {
    /// `None` makes this an internal transition: actions run, state stays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cond: Option<GuardSpec>,
    /// Workflow actions fired between the exit and entry actions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
}

/// Everything an `on` entry may hold: a bare target, one transition, or an
/// ordered list of candidates where the first passing guard wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Transitions {
    Target(String),
    Multiple(Vec<TransitionConfig>),
    Single(TransitionConfig),
}

impl Transitions {
    /// Candidates in evaluation order.
    pub fn candidates(&self) -> Vec<TransitionConfig> {
        match self {
            Self::Target(target) => vec![TransitionConfig {
                target: Some(target.clone()),
                ..TransitionConfig::default()
            }],
            Self::Single(config) => vec![config.clone()],
            Self::Multiple(configs) => configs.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    #[default]
    Atomic,
    Final,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDefinition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exit: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub on: BTreeMap<String, Transitions>,
    #[serde(rename = "type", default)]
    pub kind: StateKind,
}

impl StateDefinition {
    pub fn is_final(&self) -> bool {
        self.kind == StateKind::Final
    }
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// A complete workflow definition. Immutable once handed to a runner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub initial: String,
    /// Default context for runs that do not resume from a checkpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    pub states: BTreeMap<String, StateDefinition>,
}

impl WorkflowDefinition {
    pub fn has_state(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }
}

// ---------------------------------------------------------------------------
// Checkpoint / Snapshot
// ---------------------------------------------------------------------------

/// The persisted-state contract: enough to resume a runner elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_context: Option<Map<String, Value>>,
}

/// Point-in-time view of a runner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub state: String,
    pub context: Value,
    /// `true` once a final state has been entered.
    pub done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transitions_accept_all_three_shapes() {
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "initial": "A",
            "states": {
                "A": { "on": {
                    "PLAIN": "B",
                    "OBJ": { "target": "B" },
                    "LIST": [
                        { "target": "B", "cond": { "type": "jmespath", "options": { "rule": "ok" } } },
                        { "target": "A" }
                    ]
                } },
                "B": { "type": "final" }
            }
        }))
        .unwrap();

        let on = &def.states["A"].on;
        assert!(matches!(&on["PLAIN"], Transitions::Target(t) if t == "B"));
        assert!(matches!(&on["OBJ"], Transitions::Single(_)));
        assert_eq!(on["LIST"].candidates().len(), 2);
        assert!(def.states["B"].is_final());
    }

    #[test]
    fn guard_type_aliases_are_accepted() {
        let rule: GuardSpec =
            serde_json::from_value(json!({ "type": "rule", "options": { "rule": { "==": [1, 1] } } }))
                .unwrap();
        let query: GuardSpec =
            serde_json::from_value(json!({ "type": "query", "options": { "rule": "a.b" } })).unwrap();

        assert!(matches!(rule, GuardSpec::Rule(_)));
        assert!(matches!(query, GuardSpec::Query(_)));
    }

    #[test]
    fn guard_options_keep_unknown_fields() {
        let spec: GuardSpec = serde_json::from_value(json!({
            "type": "json-logic",
            "options": { "rule": true, "assignOnFailure": true, "reason": "amount mismatch" }
        }))
        .unwrap();

        let options = spec.options();
        assert!(options.assign_on_failure);
        assert_eq!(options.extra["reason"], json!("amount mismatch"));
        assert_eq!(
            serde_json::to_value(options).unwrap(),
            json!({ "rule": true, "assignOnFailure": true, "reason": "amount mismatch" })
        );
    }

    #[test]
    fn checkpoint_uses_camel_case() {
        let cp: Checkpoint =
            serde_json::from_value(json!({ "state": "B", "machineContext": { "a": 1 } })).unwrap();
        assert_eq!(cp.state.as_deref(), Some("B"));
        assert_eq!(cp.machine_context.unwrap()["a"], json!(1));
    }
}
