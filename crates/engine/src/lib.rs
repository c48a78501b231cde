//! `engine` crate: workflow definitions, the state machine core and the
//! runner that orchestrates plugins around each transition.

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod extensions;
pub mod guards;
pub mod machine;
pub mod models;
pub mod runner;
pub mod validate;

pub use config::RunnerConfig;
pub use context::WorkflowContext;
pub use error::EngineError;
pub use events::{EventSink, RecordingSink};
pub use extensions::{Extensions, ExtensionsBuilder};
pub use machine::StateMachine;
pub use models::{Checkpoint, GuardSpec, Snapshot, WorkflowDefinition};
pub use runner::{RunnerArgs, WorkflowRunner};
pub use validate::validate_definition;
