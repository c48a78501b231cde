//! Lifecycle and diagnostic events delivered to a runner's subscriber.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::{Value, json};

use plugins::{PluginError, WorkflowEvent};

pub const STATE_ACTION_STATUS: &str = "STATE_ACTION_STATUS";
pub const ERROR: &str = "ERROR";
pub const HTTP_ERROR: &str = "HTTP_ERROR";
pub const RULE_EVALUATION_FAILURE: &str = "RULE_EVALUATION_FAILURE";
pub const UPDATE_CONTEXT: &str = "UPDATE_CONTEXT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionStatus {
    Pending,
    Success,
    Error,
}

/// The single outward subscriber of a runner.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &WorkflowEvent);
}

impl<F> EventSink for F
where
    F: Fn(&WorkflowEvent) + Send + Sync,
{
    fn emit(&self, event: &WorkflowEvent) {
        self(event)
    }
}

/// Builds and delivers the event shapes a runner reports.
///
/// With no subscriber attached every call is a no-op.
#[derive(Clone, Default)]
pub struct EventEmitter {
    sink: Option<Arc<dyn EventSink>>,
}

impl EventEmitter {
    pub fn set_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sink = Some(sink);
    }

    pub fn emit(&self, event: WorkflowEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(&event);
        }
    }

    /// `{type: STATE_ACTION_STATUS, state, payload: {status, action}, error?}`
    pub fn action_status(
        &self,
        state: &str,
        action: &str,
        status: ActionStatus,
        error: Option<&PluginError>,
    ) {
        let mut event = WorkflowEvent::new(STATE_ACTION_STATUS)
            .with_state(state)
            .with_payload(json!({ "status": status, "action": action }));
        if let Some(error) = error {
            event = event.with_error(error.to_string());
        }
        self.emit(event);
    }

    /// `{type: ERROR | HTTP_ERROR, state, error}`
    pub fn plugin_error(&self, state: &str, error: &PluginError) {
        let event_type = if error.is_http() { HTTP_ERROR } else { ERROR };
        self.emit(
            WorkflowEvent::new(event_type)
                .with_state(state)
                .with_error(error.to_string()),
        );
    }

    /// A generic `ERROR` that did not come from a plugin (e.g. a guard).
    pub fn error(&self, state: &str, message: impl Into<String>) {
        self.emit(WorkflowEvent::new(ERROR).with_state(state).with_error(message));
    }

    /// `{type: RULE_EVALUATION_FAILURE, state, payload: guardOptions}`
    pub fn rule_failure(&self, state: &str, options: Value) {
        self.emit(
            WorkflowEvent::new(RULE_EVALUATION_FAILURE)
                .with_state(state)
                .with_payload(options),
        );
    }

    /// `{...inbound, state: newState}`
    pub fn transition(&self, inbound: &WorkflowEvent, new_state: &str) {
        self.emit(inbound.clone().with_state(new_state));
    }
}

/// Sink that keeps every event it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<WorkflowEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.event_type).collect()
    }

    /// `(action, status)` pairs from every `STATE_ACTION_STATUS` event.
    pub fn action_statuses(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == STATE_ACTION_STATUS)
            .map(|e| {
                let field = |key: &str| e.payload[key].as_str().unwrap_or_default().to_owned();
                (field("action"), field("status"))
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &WorkflowEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}
