//! Test doubles for plugins and host capabilities.
//!
//! Each double records every call it receives and returns a
//! programmer-specified result. Useful in unit and integration tests where a
//! real integration or child-workflow host is unavailable or irrelevant.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{
    ActionablePlugin, ChildWorkflowInvoker, ChildWorkflowRequest, Integration,
    IntegrationRequest, PluginError, PluginOutput, StateAction, StateActionInput,
    WorkflowAction, WorkflowEvent,
};

// ---------------------------------------------------------------------------
// MockIntegration
// ---------------------------------------------------------------------------

/// Integration answering per plugin name. Plugins without a scripted answer
/// get their request body echoed back.
#[derive(Default)]
pub struct MockIntegration {
    answers: Mutex<HashMap<String, Result<Value, PluginError>>>,
    requests: Arc<Mutex<Vec<IntegrationRequest>>>,
}

impl MockIntegration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, plugin: impl Into<String>, body: Value) {
        self.answers.lock().unwrap().insert(plugin.into(), Ok(body));
    }

    pub fn fail(&self, plugin: impl Into<String>, error: PluginError) {
        self.answers.lock().unwrap().insert(plugin.into(), Err(error));
    }

    /// All requests seen so far (in call order).
    pub fn requests(&self) -> Vec<IntegrationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Integration for MockIntegration {
    async fn call(&self, request: IntegrationRequest) -> Result<Value, PluginError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.answers.lock().unwrap().get(&request.plugin) {
            Some(answer) => answer.clone(),
            None => Ok(request.body),
        }
    }
}

// ---------------------------------------------------------------------------
// MockPlugin
// ---------------------------------------------------------------------------

/// An actionable plugin with a fixed outcome.
pub struct MockPlugin {
    name: String,
    state_names: Vec<String>,
    outcome: Result<PluginOutput, PluginError>,
    records_output: bool,
    calls: Arc<Mutex<Vec<Value>>>,
}

impl MockPlugin {
    /// A plugin that always resolves to `output`.
    pub fn returning(name: impl Into<String>, output: PluginOutput) -> Self {
        Self {
            name: name.into(),
            state_names: Vec::new(),
            outcome: Ok(output),
            records_output: true,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A plugin whose `invoke` always fails.
    pub fn failing(name: impl Into<String>, error: PluginError) -> Self {
        Self {
            outcome: Err(error),
            ..Self::returning(name, PluginOutput::default())
        }
    }

    pub fn in_states(mut self, states: &[&str]) -> Self {
        self.state_names = states.iter().map(|s| (*s).to_owned()).collect();
        self
    }

    pub fn fire_and_forget(mut self) -> Self {
        self.records_output = false;
        self
    }

    /// Contexts seen by this plugin (in call order).
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ActionablePlugin for MockPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn state_names(&self) -> &[String] {
        &self.state_names
    }

    fn records_output(&self) -> bool {
        self.records_output
    }

    async fn invoke(&self, context: &Value) -> Result<PluginOutput, PluginError> {
        self.calls.lock().unwrap().push(context.clone());
        self.outcome.clone()
    }
}

// ---------------------------------------------------------------------------
// MockChildInvoker
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockChildInvoker {
    failure: Option<PluginError>,
    requests: Arc<Mutex<Vec<ChildWorkflowRequest>>>,
}

impl MockChildInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(PluginError::failed(message)),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<ChildWorkflowRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChildWorkflowInvoker for MockChildInvoker {
    async fn invoke_child(&self, request: ChildWorkflowRequest) -> Result<(), PluginError> {
        self.requests.lock().unwrap().push(request);
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockStateAction
// ---------------------------------------------------------------------------

/// One observed state-action call.
#[derive(Debug, Clone, PartialEq)]
pub struct StateActionCall {
    pub workflow_id: String,
    pub state: String,
    pub event_type: String,
    pub context: Value,
}

#[derive(Default)]
pub struct MockStateAction {
    failure: Option<PluginError>,
    calls: Arc<Mutex<Vec<StateActionCall>>>,
}

impl MockStateAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: PluginError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<StateActionCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StateAction for MockStateAction {
    async fn run(&self, input: StateActionInput<'_>) -> Result<(), PluginError> {
        self.calls.lock().unwrap().push(StateActionCall {
            workflow_id: input.workflow_id.to_owned(),
            state: input.state.to_owned(),
            event_type: input.event.event_type.clone(),
            context: input.context.clone(),
        });
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockWorkflowAction
// ---------------------------------------------------------------------------

/// Workflow action returning a fixed context patch.
pub struct MockWorkflowAction {
    patch: Option<Map<String, Value>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockWorkflowAction {
    pub fn patching(patch: Value) -> Self {
        Self {
            patch: patch.as_object().cloned(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn noop() -> Self {
        Self {
            patch: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Event types this action fired for.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowAction for MockWorkflowAction {
    async fn run(
        &self,
        _context: &Value,
        event: &WorkflowEvent,
    ) -> Result<Option<Map<String, Value>>, PluginError> {
        self.calls.lock().unwrap().push(event.event_type.clone());
        Ok(self.patch.clone())
    }
}
