//! Materialises live plugins from descriptors, once, at construction time.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::api::ApiPlugin;
use crate::child_workflow::ChildWorkflowPlugin;
use crate::descriptor::{ApiPluginDescriptor, ExtensionDescriptors, PluginKind};
use crate::iterative::IterativePlugin;
use crate::{ActionablePlugin, BuildError, ChildWorkflowInvoker, Integration};

/// Shared handle to a live plugin.
pub type PluginRef = Arc<dyn ActionablePlugin>;

/// The three descriptor-driven plugin collections, ready to run.
#[derive(Default)]
pub struct BuiltPlugins {
    pub api_plugins: Vec<PluginRef>,
    pub child_workflow_plugins: Vec<PluginRef>,
    pub common_plugins: Vec<PluginRef>,
}

/// Maps plugin kinds to constructors and wires in host capabilities.
pub struct PluginRegistry {
    runtime_id: String,
    integration: Option<Arc<dyn Integration>>,
    child_invoker: Option<Arc<dyn ChildWorkflowInvoker>>,
}

impl PluginRegistry {
    pub fn new(runtime_id: impl Into<String>) -> Self {
        Self {
            runtime_id: runtime_id.into(),
            integration: None,
            child_invoker: None,
        }
    }

    pub fn with_integration(mut self, integration: Arc<dyn Integration>) -> Self {
        self.integration = Some(integration);
        self
    }

    pub fn with_child_invoker(mut self, invoker: Arc<dyn ChildWorkflowInvoker>) -> Self {
        self.child_invoker = Some(invoker);
        self
    }

    /// Build one outbound plugin, dispatching on its resolved kind.
    pub fn build_api_plugin(&self, descriptor: &ApiPluginDescriptor) -> Result<PluginRef, BuildError> {
        let integration = self
            .integration
            .clone()
            .ok_or_else(|| BuildError::MissingIntegration(descriptor.name.clone()))?;

        // Kind-specific behaviour lives on `PluginKind`; every outbound kind
        // shares one implementation.
        let kind: PluginKind = descriptor.kind();
        let plugin = ApiPlugin::try_new(descriptor, kind, integration)?;

        debug!(plugin = %descriptor.name, %kind, "built outbound plugin");
        Ok(Arc::new(plugin))
    }

    /// Build every collection. Iterative plugins may name any API or
    /// child-workflow plugin as their action.
    ///
    /// # Errors
    /// Any [`BuildError`]; nothing is partially built.
    pub fn build(&self, descriptors: &ExtensionDescriptors) -> Result<BuiltPlugins, BuildError> {
        ensure_unique(descriptors.api_plugins.iter().map(|d| d.name.as_str()))?;
        ensure_unique(descriptors.child_workflow_plugins.iter().map(|d| d.name.as_str()))?;
        ensure_unique(descriptors.common_plugins.iter().map(|d| d.name.as_str()))?;

        let api_plugins = descriptors
            .api_plugins
            .iter()
            .map(|d| self.build_api_plugin(d))
            .collect::<Result<Vec<_>, _>>()?;

        let child_workflow_plugins = descriptors
            .child_workflow_plugins
            .iter()
            .map(|d| {
                ChildWorkflowPlugin::try_new(d, self.runtime_id.clone(), self.child_invoker.clone())
                    .map(|p| Arc::new(p) as PluginRef)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let common_plugins = descriptors
            .common_plugins
            .iter()
            .map(|d| {
                let action = api_plugins
                    .iter()
                    .chain(&child_workflow_plugins)
                    .find(|p| p.name() == d.action_plugin_name)
                    .cloned()
                    .ok_or_else(|| BuildError::UnknownActionPlugin {
                        plugin: d.name.clone(),
                        action: d.action_plugin_name.clone(),
                    })?;
                IterativePlugin::try_new(d, action).map(|p| Arc::new(p) as PluginRef)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BuiltPlugins {
            api_plugins,
            child_workflow_plugins,
            common_plugins,
        })
    }
}

fn ensure_unique<'a>(names: impl Iterator<Item = &'a str>) -> Result<(), BuildError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(BuildError::DuplicatePluginName(name.to_owned()));
        }
    }
    Ok(())
}
