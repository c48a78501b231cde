//! Host capabilities that perform no I/O, for exercising definitions locally.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use plugins::{
    ChildWorkflowInvoker, ChildWorkflowRequest, ExtensionDescriptors, Integration,
    IntegrationRequest, PluginError, StateAction, StateActionInput, When,
};

/// Integration that answers every request with its own body.
pub struct LoopbackIntegration;

#[async_trait]
impl Integration for LoopbackIntegration {
    async fn call(&self, request: IntegrationRequest) -> Result<Value, PluginError> {
        info!(
            plugin = %request.plugin,
            kind = %request.kind,
            method = %request.method,
            url = %request.url,
            "dry-run integration call"
        );
        Ok(request.body)
    }
}

/// Child invoker that only logs what would have been spawned.
pub struct LoggingChildInvoker;

#[async_trait]
impl ChildWorkflowInvoker for LoggingChildInvoker {
    async fn invoke_child(&self, request: ChildWorkflowRequest) -> Result<(), PluginError> {
        info!(
            plugin = %request.plugin,
            definition = %request.definition_id,
            parent = %request.parent_runtime_id,
            payload = %request.payload,
            "dry-run child workflow"
        );
        Ok(())
    }
}

/// State action that logs its invocation.
pub struct LoggingStateAction {
    pub name: String,
}

#[async_trait]
impl StateAction for LoggingStateAction {
    async fn run(&self, input: StateActionInput<'_>) -> Result<(), PluginError> {
        info!(
            plugin = %self.name,
            workflow = %input.workflow_id,
            state = %input.state,
            event = %input.event.event_type,
            "dry-run state action"
        );
        Ok(())
    }
}

/// On-disk extensions file: the plugin descriptors plus state plugin bindings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionsFile {
    #[serde(flatten)]
    pub descriptors: ExtensionDescriptors,
    #[serde(default)]
    pub blocking_state_plugins: Vec<StatePluginBinding>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePluginBinding {
    pub name: String,
    pub state_names: Vec<String>,
    pub when: When,
    #[serde(default)]
    pub is_blocking: bool,
}
