//! The workflow context: an open JSON object owned by one runner.
//!
//! All changes after construction are field-level merges. The
//! `workflowRuntimeId` field is pinned and survives every merge.

use serde_json::{Map, Value, json};

pub const RUNTIME_ID_KEY: &str = "workflowRuntimeId";
pub const PLUGINS_OUTPUT_KEY: &str = "pluginsOutput";

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowContext {
    runtime_id: String,
    value: Value,
}

impl WorkflowContext {
    /// Build a context from initial fields, pinning the runtime id.
    pub fn new(runtime_id: impl Into<String>, fields: Map<String, Value>) -> Self {
        let mut context = Self {
            runtime_id: runtime_id.into(),
            value: Value::Object(fields),
        };
        context.pin_runtime_id();
        context
    }

    pub fn runtime_id(&self) -> &str {
        &self.runtime_id
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// Shallow merge: each top-level field of `patch` replaces the current one.
    pub fn merge(&mut self, patch: Map<String, Value>) {
        if let Value::Object(fields) = &mut self.value {
            fields.extend(patch);
        }
        self.pin_runtime_id();
    }

    /// Merge a value if it is an object; anything else is ignored.
    pub fn merge_value(&mut self, patch: Value) -> bool {
        match patch {
            Value::Object(fields) => {
                self.merge(fields);
                true
            }
            _ => false,
        }
    }

    /// Store `output` under `pluginsOutput[plugin]`, keeping other entries.
    pub fn record_plugin_output(&mut self, plugin: &str, output: Value) {
        let mut outputs = match self.field(PLUGINS_OUTPUT_KEY) {
            Some(Value::Object(existing)) => existing.clone(),
            _ => Map::new(),
        };
        outputs.insert(plugin.to_owned(), output);

        let mut patch = Map::new();
        patch.insert(PLUGINS_OUTPUT_KEY.to_owned(), Value::Object(outputs));
        self.merge(patch);
    }

    /// Store `{ "error": message }` under `pluginsOutput[plugin]`.
    pub fn record_plugin_error(&mut self, plugin: &str, message: impl Into<String>) {
        self.record_plugin_output(plugin, json!({ "error": message.into() }));
    }

    pub fn plugin_output(&self, plugin: &str) -> Option<&Value> {
        self.field(PLUGINS_OUTPUT_KEY)?.get(plugin)
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.value.get(key)
    }

    pub fn into_fields(self) -> Map<String, Value> {
        match self.value {
            Value::Object(fields) => fields,
            _ => Map::new(),
        }
    }

    fn pin_runtime_id(&mut self) {
        if let Value::Object(fields) = &mut self.value {
            fields.insert(RUNTIME_ID_KEY.to_owned(), Value::String(self.runtime_id.clone()));
        }
    }
}
