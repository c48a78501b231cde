//! The extensions bundle: every plugin collection plus workflow actions,
//! materialised once and read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use plugins::{
    ActionablePlugin, ChildWorkflowInvoker, ExtensionDescriptors, Integration, PluginRef,
    PluginRegistry, StatePlugin, WorkflowAction, When,
};

use crate::EngineError;
use crate::models::WorkflowDefinition;
use crate::validate::validate_plugin_states;

/// Collects caller-supplied plugins and capabilities; consumed by [`build`].
///
/// [`build`]: ExtensionsBuilder::build
#[derive(Default)]
pub struct ExtensionsBuilder {
    descriptors: ExtensionDescriptors,
    state_plugins: Vec<StatePlugin>,
    workflow_actions: HashMap<String, Arc<dyn WorkflowAction>>,
    integration: Option<Arc<dyn Integration>>,
    child_invoker: Option<Arc<dyn ChildWorkflowInvoker>>,
}

impl ExtensionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// API, child-workflow and common plugin descriptors.
    pub fn descriptors(mut self, descriptors: ExtensionDescriptors) -> Self {
        self.descriptors = descriptors;
        self
    }

    pub fn state_plugin(mut self, plugin: StatePlugin) -> Self {
        self.state_plugins.push(plugin);
        self
    }

    pub fn workflow_action(mut self, name: impl Into<String>, action: Arc<dyn WorkflowAction>) -> Self {
        self.workflow_actions.insert(name.into(), action);
        self
    }

    pub fn integration(mut self, integration: Arc<dyn Integration>) -> Self {
        self.integration = Some(integration);
        self
    }

    pub fn child_invoker(mut self, invoker: Arc<dyn ChildWorkflowInvoker>) -> Self {
        self.child_invoker = Some(invoker);
        self
    }

    /// Materialise every plugin for the run identified by `runtime_id`.
    ///
    /// # Errors
    /// [`EngineError::UnknownPluginState`] if any plugin names a state the
    /// definition does not declare; [`EngineError::Plugin`] for descriptor
    /// problems (unsupported transformer/validator, unknown action plugin, ...).
    pub fn build(
        self,
        runtime_id: &str,
        definition: &WorkflowDefinition,
    ) -> Result<Extensions, EngineError> {
        for plugin in &self.state_plugins {
            validate_plugin_states(definition, &plugin.name, &plugin.state_names)?;
        }

        let mut registry = PluginRegistry::new(runtime_id);
        if let Some(integration) = self.integration {
            registry = registry.with_integration(integration);
        }
        if let Some(invoker) = self.child_invoker {
            registry = registry.with_child_invoker(invoker);
        }
        let built = registry.build(&self.descriptors)?;

        for plugin in built
            .api_plugins
            .iter()
            .chain(&built.child_workflow_plugins)
            .chain(&built.common_plugins)
        {
            validate_plugin_states(definition, plugin.name(), plugin.state_names())?;
        }

        Ok(Extensions {
            state_plugins: self.state_plugins,
            api_plugins: built.api_plugins,
            child_workflow_plugins: built.child_workflow_plugins,
            common_plugins: built.common_plugins,
            workflow_actions: self.workflow_actions,
        })
    }
}

/// Read-only plugin collections of one runner.
#[derive(Default)]
pub struct Extensions {
    state_plugins: Vec<StatePlugin>,
    api_plugins: Vec<PluginRef>,
    child_workflow_plugins: Vec<PluginRef>,
    common_plugins: Vec<PluginRef>,
    workflow_actions: HashMap<String, Arc<dyn WorkflowAction>>,
}

impl Extensions {
    pub fn state_plugins(&self) -> &[StatePlugin] {
        &self.state_plugins
    }

    pub fn api_plugins(&self) -> &[PluginRef] {
        &self.api_plugins
    }

    pub fn child_workflow_plugins(&self) -> &[PluginRef] {
        &self.child_workflow_plugins
    }

    pub fn common_plugins(&self) -> &[PluginRef] {
        &self.common_plugins
    }

    /// Blocking state plugins for `when` that apply to `state`, in declaration order.
    pub fn blocking<'a>(&'a self, when: When, state: &'a str) -> impl Iterator<Item = &'a StatePlugin> {
        self.state_plugins
            .iter()
            .filter(move |p| p.is_blocking && p.when == when && p.applies_to(state))
    }

    /// Non-blocking state plugin registered under `name`.
    pub fn non_blocking(&self, name: &str) -> Option<&StatePlugin> {
        self.state_plugins.iter().find(|p| !p.is_blocking && p.name == name)
    }

    pub fn workflow_action(&self, name: &str) -> Option<&Arc<dyn WorkflowAction>> {
        self.workflow_actions.get(name)
    }
}
