//! Iterative (common) plugin: selects a slice of the context and maps an
//! action plugin over it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::descriptor::{IterationMode, IterativePluginDescriptor};
use crate::transform::TransformerChain;
use crate::{ActionablePlugin, BuildError, PluginError, PluginOutput};

pub struct IterativePlugin {
    name: String,
    state_names: Vec<String>,
    iterate_on: TransformerChain,
    action: Arc<dyn ActionablePlugin>,
    mode: IterationMode,
    success_action: Option<String>,
    error_action: Option<String>,
}

impl IterativePlugin {
    pub fn try_new(
        descriptor: &IterativePluginDescriptor,
        action: Arc<dyn ActionablePlugin>,
    ) -> Result<Self, BuildError> {
        Ok(Self {
            name: descriptor.name.clone(),
            state_names: descriptor.state_names.clone(),
            iterate_on: TransformerChain::try_from_specs(&descriptor.iterate_on)?,
            action,
            mode: descriptor.mode,
            success_action: descriptor.success_action.clone(),
            error_action: descriptor.error_action.clone(),
        })
    }

    async fn run_action(&self, input: &Value) -> Option<PluginError> {
        match self.action.invoke(input).await {
            Ok(output) => output.error,
            Err(error) => Some(error),
        }
    }
}

#[async_trait]
impl ActionablePlugin for IterativePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn state_names(&self) -> &[String] {
        &self.state_names
    }

    #[instrument(skip(self, context), fields(plugin = %self.name, action = %self.action.name()))]
    async fn invoke(&self, context: &Value) -> Result<PluginOutput, PluginError> {
        let projection = self.iterate_on.apply(context)?;

        let errors = match (self.mode, projection) {
            (IterationMode::Each, Value::Array(items)) => {
                debug!(items = items.len(), "iterating");
                let mut errors = Vec::new();
                for item in &items {
                    if let Some(error) = self.run_action(item).await {
                        errors.push(error);
                    }
                }
                errors
            }
            (IterationMode::Each, _) => {
                return Ok(PluginOutput::failure(
                    self.error_action.clone(),
                    PluginError::failed("iteration on a non-array value is not supported"),
                ));
            }
            (IterationMode::Whole, projection) => {
                self.run_action(&projection).await.into_iter().collect()
            }
        };

        Ok(match aggregate(errors) {
            None => PluginOutput::success(self.success_action.clone(), None),
            Some(error) => PluginOutput::failure(self.error_action.clone(), error),
        })
    }
}

/// A single failure keeps its classification; several are folded together.
fn aggregate(mut errors: Vec<PluginError>) -> Option<PluginError> {
    match errors.len() {
        0 => None,
        1 => errors.pop(),
        n => Some(PluginError::Failed(format!(
            "{n} iterations failed: {}",
            errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
        ))),
    }
}
