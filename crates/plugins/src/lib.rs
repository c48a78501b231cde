//! `plugins` crate: the plugin capability traits and the built-in plugin kinds.
//!
//! Every plugin the runner drives implements [`ActionablePlugin`]; host
//! collaborators (integration transport, child-workflow spawner, state
//! actions) implement the remaining traits in [`traits`].

pub mod api;
pub mod child_workflow;
pub mod descriptor;
pub mod error;
pub mod iterative;
pub mod mock;
pub mod path;
pub mod registry;
pub mod state;
pub mod traits;
pub mod transform;
pub mod validator;

pub use descriptor::{
    ApiPluginDescriptor, ChildWorkflowPluginDescriptor, ExtensionDescriptors, IterationMode,
    IterativePluginDescriptor, PayloadSpec, PluginKind,
};
pub use error::{BuildError, PluginError};
pub use registry::{BuiltPlugins, PluginRef, PluginRegistry};
pub use state::{StatePlugin, When};
pub use traits::{
    ActionablePlugin, ChildWorkflowInvoker, ChildWorkflowRequest, Integration,
    IntegrationRequest, PluginOutput, StateAction, StateActionInput, WorkflowAction,
    WorkflowEvent,
};
pub use transform::{TransformerChain, TransformerSpec};
pub use validator::SchemaValidator;
