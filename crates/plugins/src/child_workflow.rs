//! Child-workflow plugin: builds an initiation payload and hands it to the
//! host's child invoker. The child's outcome comes back later as an event.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, instrument};

use crate::descriptor::ChildWorkflowPluginDescriptor;
use crate::transform::TransformerChain;
use crate::{
    ActionablePlugin, BuildError, ChildWorkflowInvoker, ChildWorkflowRequest, PluginError,
    PluginOutput,
};

pub struct ChildWorkflowPlugin {
    name: String,
    state_names: Vec<String>,
    parent_runtime_id: String,
    definition_id: String,
    init_event: Option<String>,
    transformers: TransformerChain,
    invoker: Option<Arc<dyn ChildWorkflowInvoker>>,
}

impl ChildWorkflowPlugin {
    pub fn try_new(
        descriptor: &ChildWorkflowPluginDescriptor,
        parent_runtime_id: impl Into<String>,
        invoker: Option<Arc<dyn ChildWorkflowInvoker>>,
    ) -> Result<Self, BuildError> {
        Ok(Self {
            name: descriptor.name.clone(),
            state_names: descriptor.state_names.clone(),
            parent_runtime_id: parent_runtime_id.into(),
            definition_id: descriptor.definition_id.clone(),
            init_event: descriptor.init_event.clone(),
            transformers: TransformerChain::try_from_specs(&descriptor.transformers)?,
            invoker,
        })
    }
}

#[async_trait]
impl ActionablePlugin for ChildWorkflowPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn state_names(&self) -> &[String] {
        &self.state_names
    }

    #[instrument(skip(self, context), fields(plugin = %self.name, definition = %self.definition_id))]
    async fn invoke(&self, context: &Value) -> Result<PluginOutput, PluginError> {
        let invoker = self
            .invoker
            .as_ref()
            .ok_or_else(|| PluginError::failed("no child workflow invoker configured"))?;

        let payload = self.transformers.apply(context)?;
        invoker
            .invoke_child(ChildWorkflowRequest {
                plugin: self.name.clone(),
                parent_runtime_id: self.parent_runtime_id.clone(),
                definition_id: self.definition_id.clone(),
                init_event: self.init_event.clone(),
                payload,
            })
            .await?;

        info!(parent = %self.parent_runtime_id, "child workflow requested");
        Ok(PluginOutput::default())
    }
}
