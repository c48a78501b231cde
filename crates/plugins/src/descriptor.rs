//! Serializable plugin descriptors.
//!
//! These are the shapes hosts store alongside a workflow definition. They are
//! turned into live plugins exactly once, by [`crate::PluginRegistry`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transform::TransformerSpec;
use crate::validator::JSON_SCHEMA;

/// Kind of outbound plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginKind {
    Api,
    Webhook,
    Kyc,
    KycSession,
    Kyb,
    Email,
}

impl PluginKind {
    /// Resolve the effective kind of a descriptor.
    ///
    /// An explicit kind always wins. Otherwise a plugin is API-style only
    /// when it declares both a success and an error action; anything else is
    /// a fire-and-forget webhook.
    pub fn resolve(explicit: Option<Self>, success_action: Option<&str>, error_action: Option<&str>) -> Self {
        match explicit {
            Some(kind) => kind,
            None if success_action.is_some() && error_action.is_some() => Self::Api,
            None => Self::Webhook,
        }
    }

    /// Webhooks never raise callbacks and their results are not recorded.
    pub fn is_fire_and_forget(self) -> bool {
        matches!(self, Self::Webhook)
    }

    /// Identity-verification vendors correlate their asynchronous results
    /// back to the workflow runtime.
    pub fn is_identity_verification(self) -> bool {
        matches!(self, Self::Kyc | Self::KycSession | Self::Kyb)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Webhook => "webhook",
            Self::Kyc => "kyc",
            Self::KycSession => "kyc-session",
            Self::Kyb => "kyb",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_validator() -> String {
    JSON_SCHEMA.to_owned()
}

fn default_method() -> String {
    "POST".to_owned()
}

/// Transform + validation stage for a request or a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadSpec {
    #[serde(default)]
    pub transform: Vec<TransformerSpec>,
    #[serde(default)]
    pub schema: Option<Value>,
    #[serde(default = "default_validator")]
    pub validator: String,
}

impl Default for PayloadSpec {
    fn default() -> Self {
        Self {
            transform: Vec::new(),
            schema: None,
            validator: default_validator(),
        }
    }
}

/// Outbound integration plugin (API, webhook, identity verification, email).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPluginDescriptor {
    pub name: String,
    pub state_names: Vec<String>,
    #[serde(default)]
    pub plugin_kind: Option<PluginKind>,
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub request: PayloadSpec,
    #[serde(default)]
    pub response: Option<PayloadSpec>,
    #[serde(default)]
    pub success_action: Option<String>,
    #[serde(default)]
    pub error_action: Option<String>,
}

impl ApiPluginDescriptor {
    pub fn kind(&self) -> PluginKind {
        PluginKind::resolve(
            self.plugin_kind,
            self.success_action.as_deref(),
            self.error_action.as_deref(),
        )
    }
}

/// Plugin that hands an initiation payload to a child workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildWorkflowPluginDescriptor {
    pub name: String,
    pub state_names: Vec<String>,
    pub definition_id: String,
    #[serde(default)]
    pub transformers: Vec<TransformerSpec>,
    #[serde(default)]
    pub init_event: Option<String>,
}

/// How an iterative plugin feeds its projection to the action plugin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IterationMode {
    /// One invocation per array item.
    #[default]
    Each,
    /// A single invocation over the whole projection.
    Whole,
}

/// Common plugin mapping an action plugin over a slice of the context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterativePluginDescriptor {
    pub name: String,
    pub state_names: Vec<String>,
    pub iterate_on: Vec<TransformerSpec>,
    pub action_plugin_name: String,
    #[serde(default)]
    pub success_action: Option<String>,
    #[serde(default)]
    pub error_action: Option<String>,
    #[serde(default)]
    pub mode: IterationMode,
}

/// The serializable plugin collections of a workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionDescriptors {
    #[serde(default)]
    pub api_plugins: Vec<ApiPluginDescriptor>,
    #[serde(default)]
    pub child_workflow_plugins: Vec<ChildWorkflowPluginDescriptor>,
    #[serde(default)]
    pub common_plugins: Vec<IterativePluginDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_defaults_follow_declared_actions() {
        assert_eq!(PluginKind::resolve(None, Some("OK"), Some("KO")), PluginKind::Api);
        assert_eq!(PluginKind::resolve(None, Some("OK"), None), PluginKind::Webhook);
        assert_eq!(PluginKind::resolve(None, None, None), PluginKind::Webhook);
        assert_eq!(
            PluginKind::resolve(Some(PluginKind::Kyb), None, None),
            PluginKind::Kyb
        );
    }

    #[test]
    fn api_descriptor_fills_defaults() {
        let d: ApiPluginDescriptor = serde_json::from_value(json!({
            "name": "registry",
            "stateNames": ["checking"],
            "url": "https://registry.example/lookup",
            "pluginKind": "kyc-session",
            "successAction": "DONE",
            "errorAction": "FAILED"
        }))
        .unwrap();

        assert_eq!(d.method, "POST");
        assert_eq!(d.request.validator, JSON_SCHEMA);
        assert!(d.request.transform.is_empty());
        assert_eq!(d.kind(), PluginKind::KycSession);
    }

    #[test]
    fn extensions_deserialize_from_camel_case() {
        let ext: ExtensionDescriptors = serde_json::from_value(json!({
            "commonPlugins": [{
                "name": "spawn_ubos",
                "stateNames": ["review"],
                "iterateOn": [{ "transformer": "jmespath", "mapping": "entity.ubos" }],
                "actionPluginName": "ubo_child",
                "mode": "whole"
            }]
        }))
        .unwrap();

        assert!(ext.api_plugins.is_empty());
        assert_eq!(ext.common_plugins[0].mode, IterationMode::Whole);
    }
}
