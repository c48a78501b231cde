//! Runner tuning knobs.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Environment variables with this prefix override file values,
/// e.g. `WORKFLOW_CORE__MAX_CALLBACK_CHAIN=8`.
pub const ENV_PREFIX: &str = "WORKFLOW_CORE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Callback events one `process` call may chain into.
    pub max_callback_chain: usize,
    /// Log the full context at `debug` after every pass.
    pub debug_context: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_callback_chain: 32,
            debug_context: false,
        }
    }
}

impl RunnerConfig {
    /// Defaults, then the optional file, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }
}
