//! Capability traits every plugin and host collaborator must fulfil.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{PluginError, PluginKind};

/// An event flowing into (or reported out of) a workflow runner.
///
/// Defined here (in the plugins crate) so both the engine and state actions
/// can import it without a circular dependency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    /// Snapshot state label, set only on events reported outward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowEvent {
    /// An event of the given type with no payload.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Self::default()
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// The payload as an object, if it is one.
    pub fn payload_fields(&self) -> Option<&Map<String, Value>> {
        self.payload.as_object()
    }
}

/// What a plugin invocation resolved to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginOutput {
    /// Event type the runner should raise next, if any.
    pub callback_action: Option<String>,
    /// Payload recorded under `pluginsOutput[name]` on success.
    pub response_body: Option<Value>,
    /// A failure the plugin handled itself (it still resolved).
    pub error: Option<PluginError>,
}

impl PluginOutput {
    pub fn success(callback_action: Option<String>, response_body: Option<Value>) -> Self {
        Self {
            callback_action,
            response_body,
            error: None,
        }
    }

    pub fn failure(callback_action: Option<String>, error: PluginError) -> Self {
        Self {
            callback_action,
            response_body: None,
            error: Some(error),
        }
    }
}

/// The core plugin trait.
///
/// Outbound, child-workflow and iterative plugins all implement this. The
/// runner dispatches through `Arc<dyn ActionablePlugin>`.
#[async_trait]
pub trait ActionablePlugin: Send + Sync {
    /// Unique name within the plugin's collection.
    fn name(&self) -> &str;

    /// States in which the plugin is applicable.
    fn state_names(&self) -> &[String];

    /// Whether the runner records this plugin's result under `pluginsOutput`.
    fn records_output(&self) -> bool {
        true
    }

    /// Run the plugin against a read-only view of the workflow context.
    async fn invoke(&self, context: &Value) -> Result<PluginOutput, PluginError>;

    fn applies_to(&self, state: &str) -> bool {
        self.state_names().iter().any(|s| s == state)
    }
}

/// An outbound call prepared by an API-style plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrationRequest {
    pub kind: PluginKind,
    pub plugin: String,
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

/// Host-supplied transport performing the actual integration call.
///
/// Implementations own their HTTP client, timeouts and retries. A non-success
/// response should be reported as [`PluginError::Http`].
#[async_trait]
pub trait Integration: Send + Sync {
    async fn call(&self, request: IntegrationRequest) -> Result<Value, PluginError>;
}

/// Everything a host needs to spawn or signal a child workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildWorkflowRequest {
    pub plugin: String,
    pub parent_runtime_id: String,
    pub definition_id: String,
    pub init_event: Option<String>,
    pub payload: Value,
}

/// Host-supplied capability that starts child workflows.
///
/// The child's eventual result re-enters the parent as an ordinary event.
#[async_trait]
pub trait ChildWorkflowInvoker: Send + Sync {
    async fn invoke_child(&self, request: ChildWorkflowRequest) -> Result<(), PluginError>;
}

/// Arguments handed to a state plugin's action.
#[derive(Debug, Clone, Copy)]
pub struct StateActionInput<'a> {
    pub workflow_id: &'a str,
    pub context: &'a Value,
    pub event: &'a WorkflowEvent,
    pub state: &'a str,
}

/// Side effect bound to a state's entry or exit.
#[async_trait]
pub trait StateAction: Send + Sync {
    async fn run(&self, input: StateActionInput<'_>) -> Result<(), PluginError>;
}

/// Named workflow-level action referenced from a state's `entry`/`exit` list.
///
/// A returned object is merged into the context field by field.
#[async_trait]
pub trait WorkflowAction: Send + Sync {
    async fn run(
        &self,
        context: &Value,
        event: &WorkflowEvent,
    ) -> Result<Option<Map<String, Value>>, PluginError>;
}
