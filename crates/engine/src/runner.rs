//! Workflow runner.
//!
//! `WorkflowRunner` owns one workflow instance (current state + context) and
//! drives it one inbound event at a time. Each pass runs five phases strictly
//! in order:
//! 1. Blocking `pre` state plugins of the current state.
//! 2. The transition, firing exit/transition/entry actions.
//! 3. Common (iterative) plugins of the new state.
//! 4. API plugins of the new state.
//! 5. Blocking `post` state plugins of the new state.
//!
//! A callback action raised in phase 3 or 4 is processed as a nested pass
//! right after the plugin that raised it; the raising pass then resumes
//! against whatever state the nested pass left behind. Nesting lives on an
//! explicit stack inside one `process` call, bounded by
//! `max_callback_chain`. Plugin failures are reported through the event
//! sink and recorded under `pluginsOutput`; they never abort a pass.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use plugins::{
    ActionablePlugin, PluginError, PluginOutput, PluginRef, StateActionInput, StatePlugin,
    WorkflowEvent, When,
};

use crate::config::RunnerConfig;
use crate::context::WorkflowContext;
use crate::events::{ActionStatus, EventEmitter, EventSink};
use crate::extensions::{Extensions, ExtensionsBuilder};
use crate::machine::{GuardDiagnostic, StateMachine};
use crate::models::{Checkpoint, Snapshot, WorkflowDefinition};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Construction input
// ---------------------------------------------------------------------------

pub struct RunnerArgs {
    pub runtime_id: String,
    pub definition: WorkflowDefinition,
    pub extensions: ExtensionsBuilder,
    /// Resume point; `None` starts from the definition defaults.
    pub checkpoint: Option<Checkpoint>,
}

// ---------------------------------------------------------------------------
// WorkflowRunner
// ---------------------------------------------------------------------------

/// Drives one workflow instance.
///
/// Not safe for concurrent `process` calls: hosts serialize events per
/// runtime id (`process` takes `&mut self`).
pub struct WorkflowRunner {
    runtime_id: String,
    machine: StateMachine,
    extensions: Extensions,
    context: WorkflowContext,
    current_state: String,
    events: EventEmitter,
    config: RunnerConfig,
}

impl WorkflowRunner {
    /// Validate everything and build the runner.
    ///
    /// # Errors
    /// Any construction-time [`EngineError`]: an undeclared state referenced
    /// by a plugin, transition or checkpoint, an invalid guard, or a plugin
    /// descriptor the registry rejects.
    pub fn new(args: RunnerArgs, config: RunnerConfig) -> Result<Self, EngineError> {
        let RunnerArgs {
            runtime_id,
            definition,
            extensions,
            checkpoint,
        } = args;

        let extensions = extensions.build(&runtime_id, &definition)?;
        let machine = StateMachine::build(&definition, extensions.state_plugins())?;

        let Checkpoint {
            state,
            machine_context,
        } = checkpoint.unwrap_or_default();

        let current_state = match state {
            Some(state) if !machine.contains(&state) => {
                return Err(EngineError::UnknownCheckpointState(state));
            }
            Some(state) => state,
            None => definition.initial.clone(),
        };

        let fields = machine_context
            .filter(|fields| !fields.is_empty())
            .or(definition.context)
            .unwrap_or_default();
        let context = WorkflowContext::new(runtime_id.clone(), fields);

        info!(%runtime_id, state = %current_state, "workflow runner ready");

        Ok(Self {
            runtime_id,
            machine,
            extensions,
            context,
            current_state,
            events: EventEmitter::default(),
            config,
        })
    }

    /// Attach the single outward subscriber, replacing any previous one.
    pub fn subscribe(&mut self, sink: impl EventSink + 'static) {
        self.events.set_sink(Arc::new(sink));
    }

    pub fn runtime_id(&self) -> &str {
        &self.runtime_id
    }

    pub fn state(&self) -> &str {
        &self.current_state
    }

    pub fn context(&self) -> &Value {
        self.context.as_value()
    }

    pub fn is_done(&self) -> bool {
        self.machine.is_final(&self.current_state)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.current_state.clone(),
            context: self.context.as_value().clone(),
            done: self.is_done(),
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            state: Some(self.current_state.clone()),
            machine_context: Some(self.context.clone().into_fields()),
        }
    }

    /// Process one inbound event, then every callback event it chains into.
    ///
    /// # Errors
    /// Only [`EngineError::CallbackChainExceeded`]. Plugin and guard failures
    /// are contained and reported through the subscriber.
    #[instrument(skip(self, event), fields(runtime_id = %self.runtime_id, event = %event.event_type))]
    pub async fn process(&mut self, event: WorkflowEvent) -> Result<Snapshot, EngineError> {
        let limit = self.config.max_callback_chain;
        let mut passes = vec![Pass::new(event)];
        let mut chained = 0usize;

        while let Some(pass) = passes.last_mut() {
            match self.step(pass).await {
                Step::Continue => {}
                Step::Done => {
                    passes.pop();
                }
                Step::Callback(callback) => {
                    chained += 1;
                    if chained > limit {
                        warn!(limit, callback = %callback, "callback chain limit reached");
                        return Err(EngineError::CallbackChainExceeded { limit });
                    }
                    debug!(callback = %callback, depth = passes.len(), "following callback event");
                    passes.push(Pass::new(WorkflowEvent::new(callback)));
                }
            }
        }

        Ok(self.snapshot())
    }

    // -----------------------------------------------------------------------
    // One pass
    // -----------------------------------------------------------------------

    /// Advance `pass` by one phase, or by one plugin inside the common and
    /// API phases. Plugins are filtered against the state current at the
    /// moment they are reached, so a callback that moved the workflow skips
    /// the rest of the old state's plugins.
    async fn step(&mut self, pass: &mut Pass) -> Step {
        match pass.phase {
            // --------------------------------------------------------------
            // 1. Blocking pre plugins, then 2. the transition.
            // --------------------------------------------------------------
            Phase::Transition => {
                debug!(state = %self.current_state, event = %pass.event.event_type, "processing event");
                for plugin in self.blocking_plugins(When::Pre) {
                    self.run_state_plugin(&plugin, &pass.event).await;
                }
                self.transition(&pass.event).await;
                pass.phase = Phase::Common(0);
                Step::Continue
            }

            // --------------------------------------------------------------
            // 3. Common plugins.
            // --------------------------------------------------------------
            Phase::Common(from) => {
                let Some((index, plugin)) = self.next_applicable(Extensions::common_plugins, from)
                else {
                    pass.phase = Phase::Api(0);
                    return Step::Continue;
                };
                pass.phase = Phase::Common(index + 1);

                let output = self.invoke_plugin(&plugin).await;
                if let Some(error) = &output.error {
                    self.context.record_plugin_error(plugin.name(), error.to_string());
                }
                Step::after(output.callback_action)
            }

            // --------------------------------------------------------------
            // 4. API plugins.
            // --------------------------------------------------------------
            Phase::Api(from) => {
                let Some((index, plugin)) = self.next_applicable(Extensions::api_plugins, from)
                else {
                    pass.phase = Phase::Post;
                    return Step::Continue;
                };
                pass.phase = Phase::Api(index + 1);

                let output = self.invoke_plugin(&plugin).await;
                if !plugin.records_output() {
                    return Step::Continue;
                }
                match (output.response_body, &output.error) {
                    (Some(body), _) => self.context.record_plugin_output(plugin.name(), body),
                    (None, Some(error)) => {
                        self.context.record_plugin_error(plugin.name(), error.to_string())
                    }
                    (None, None) => self.context.record_plugin_output(plugin.name(), Value::Null),
                }
                Step::after(output.callback_action)
            }

            // --------------------------------------------------------------
            // 5. Blocking post plugins, against the post-merge context.
            // --------------------------------------------------------------
            Phase::Post => {
                for plugin in self.blocking_plugins(When::Post) {
                    self.run_state_plugin(&plugin, &pass.event).await;
                }
                if self.config.debug_context {
                    debug!(context = %self.context.as_value(), "context after pass");
                }
                Step::Done
            }
        }
    }

    async fn transition(&mut self, event: &WorkflowEvent) {
        let outcome = self
            .machine
            .transition(&self.current_state, self.context.as_value(), event);

        for diagnostic in &outcome.diagnostics {
            match diagnostic {
                GuardDiagnostic::RuleFailed(options) => {
                    self.events.rule_failure(&self.current_state, options.clone());
                }
                GuardDiagnostic::EvaluationError(message) => {
                    warn!(state = %self.current_state, error = %message, "guard evaluation failed");
                    self.events.error(&self.current_state, message.clone());
                }
            }
        }

        if !outcome.handled {
            debug!(state = %self.current_state, event = %event.event_type, "event not handled");
            return;
        }

        if let Some(patch) = outcome.context_patch.clone() {
            self.context.merge(patch);
        }

        self.current_state = outcome.target.clone();
        for action in &outcome.actions {
            self.run_action(action, event).await;
        }

        if outcome.changed() {
            info!(from = %outcome.source, to = %outcome.target, "transitioned");
            if self.is_done() {
                info!(state = %self.current_state, "reached final state");
            }
        }
        self.events.transition(event, &self.current_state);
    }

    // -----------------------------------------------------------------------
    // Actions and plugins
    // -----------------------------------------------------------------------

    /// Fire one named entry/exit/transition action. State plugins shadow
    /// workflow actions of the same name.
    async fn run_action(&mut self, name: &str, event: &WorkflowEvent) {
        if let Some(plugin) = self.extensions.non_blocking(name).cloned() {
            self.run_state_plugin(&plugin, event).await;
            return;
        }

        let Some(action) = self.extensions.workflow_action(name).cloned() else {
            warn!(action = %name, "no state plugin or workflow action registered");
            return;
        };

        match action.run(self.context.as_value(), event).await {
            Ok(Some(patch)) => self.context.merge(patch),
            Ok(None) => {}
            Err(error) => {
                warn!(action = %name, error = %error, "workflow action failed");
                self.events.plugin_error(&self.current_state, &error);
            }
        }
    }

    async fn run_state_plugin(&mut self, plugin: &StatePlugin, event: &WorkflowEvent) {
        let state = self.current_state.clone();
        self.events.action_status(&state, &plugin.name, ActionStatus::Pending, None);

        let input = StateActionInput {
            workflow_id: self.machine.id().unwrap_or(&self.runtime_id),
            context: self.context.as_value(),
            event,
            state: &state,
        };

        match plugin.action.run(input).await {
            Ok(()) => {
                self.events.action_status(&state, &plugin.name, ActionStatus::Success, None);
            }
            Err(error) => {
                self.report_failure(&plugin.name, &error);
                self.context.record_plugin_error(&plugin.name, error.to_string());
            }
        }
    }

    /// Invoke a plugin against the current context; a thrown error becomes a
    /// failed output so callers handle both uniformly.
    async fn invoke_plugin(&self, plugin: &PluginRef) -> PluginOutput {
        let name = plugin.name();
        self.events.action_status(&self.current_state, name, ActionStatus::Pending, None);

        let output = match plugin.invoke(self.context.as_value()).await {
            Ok(output) => output,
            Err(error) => PluginOutput::failure(None, error),
        };

        match &output.error {
            None => self.events.action_status(&self.current_state, name, ActionStatus::Success, None),
            Some(error) => self.report_failure(name, error),
        }
        output
    }

    fn report_failure(&self, name: &str, error: &PluginError) {
        warn!(plugin = %name, state = %self.current_state, error = %error, "plugin failed");
        self.events
            .action_status(&self.current_state, name, ActionStatus::Error, Some(error));
        self.events.plugin_error(&self.current_state, error);
    }

    fn blocking_plugins(&self, when: When) -> Vec<StatePlugin> {
        self.extensions
            .blocking(when, &self.current_state)
            .cloned()
            .collect()
    }

    /// First plugin at or after `from` that applies to the current state.
    fn next_applicable(
        &self,
        collection: fn(&Extensions) -> &[PluginRef],
        from: usize,
    ) -> Option<(usize, PluginRef)> {
        collection(&self.extensions)
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, plugin)| plugin.applies_to(&self.current_state))
            .map(|(index, plugin)| (index, plugin.clone()))
    }
}

// ---------------------------------------------------------------------------
// Pass bookkeeping
// ---------------------------------------------------------------------------

/// One in-flight pass: the event being processed and where it resumes.
struct Pass {
    event: WorkflowEvent,
    phase: Phase,
}

impl Pass {
    fn new(event: WorkflowEvent) -> Self {
        Self {
            event,
            phase: Phase::Transition,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Transition,
    /// Next common plugin index to consider.
    Common(usize),
    /// Next API plugin index to consider.
    Api(usize),
    Post,
}

enum Step {
    Continue,
    /// Process this event to completion before resuming the current pass.
    Callback(String),
    Done,
}

impl Step {
    fn after(callback: Option<String>) -> Self {
        callback.map_or(Step::Continue, Step::Callback)
    }
}
