//! Outbound integration plugin.
//!
//! One implementation covers every outbound kind; the kind only changes how
//! the result is surfaced:
//! - `api`, `email`: request/response round trip with callbacks.
//! - `kyc`, `kyc-session`, `kyb`: as `api`, and the request body carries the
//!   workflow runtime id so the vendor's asynchronous result can be routed back.
//! - `webhook`: fire and forget: no callback, nothing recorded.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::descriptor::{ApiPluginDescriptor, PayloadSpec, PluginKind};
use crate::transform::TransformerChain;
use crate::validator::SchemaValidator;
use crate::{
    ActionablePlugin, BuildError, Integration, IntegrationRequest, PluginError, PluginOutput,
};

const RUNTIME_ID_KEY: &str = "workflowRuntimeId";

/// Transform followed by validation.
#[derive(Debug, Default)]
pub struct PayloadStage {
    transformers: TransformerChain,
    validator: SchemaValidator,
}

impl PayloadStage {
    pub fn try_from_spec(spec: &PayloadSpec) -> Result<Self, BuildError> {
        Ok(Self {
            transformers: TransformerChain::try_from_specs(&spec.transform)?,
            validator: SchemaValidator::try_new(&spec.validator, spec.schema.as_ref())?,
        })
    }

    pub fn apply(&self, stage: &'static str, source: &Value) -> Result<Value, PluginError> {
        let payload = self.transformers.apply(source)?;
        let outcome = self.validator.validate(&payload);
        if !outcome.valid {
            return Err(PluginError::Validation {
                stage,
                errors: outcome.errors,
            });
        }
        Ok(payload)
    }
}

pub struct ApiPlugin {
    name: String,
    state_names: Vec<String>,
    kind: PluginKind,
    url: String,
    method: String,
    headers: HashMap<String, String>,
    request: PayloadStage,
    response: Option<PayloadStage>,
    success_action: Option<String>,
    error_action: Option<String>,
    integration: Arc<dyn Integration>,
}

impl ApiPlugin {
    /// Build a plugin of an already-resolved kind.
    pub fn try_new(
        descriptor: &ApiPluginDescriptor,
        kind: PluginKind,
        integration: Arc<dyn Integration>,
    ) -> Result<Self, BuildError> {
        let response = descriptor
            .response
            .as_ref()
            .map(PayloadStage::try_from_spec)
            .transpose()?;

        Ok(Self {
            name: descriptor.name.clone(),
            state_names: descriptor.state_names.clone(),
            kind,
            url: descriptor.url.clone(),
            method: descriptor.method.to_uppercase(),
            headers: descriptor.headers.clone(),
            request: PayloadStage::try_from_spec(&descriptor.request)?,
            response,
            success_action: descriptor.success_action.clone(),
            error_action: descriptor.error_action.clone(),
            integration,
        })
    }

    pub fn kind(&self) -> PluginKind {
        self.kind
    }

    async fn exchange(&self, context: &Value) -> Result<Value, PluginError> {
        let mut body = self.request.apply("request", context)?;

        if self.kind.is_identity_verification() {
            if let (Value::Object(fields), Some(runtime_id)) = (&mut body, context.get(RUNTIME_ID_KEY)) {
                fields
                    .entry(RUNTIME_ID_KEY)
                    .or_insert_with(|| runtime_id.clone());
            }
        }

        let request = IntegrationRequest {
            kind: self.kind,
            plugin: self.name.clone(),
            url: self.url.clone(),
            method: self.method.clone(),
            headers: self.headers.clone(),
            body,
        };

        debug!(plugin = %self.name, url = %self.url, method = %self.method, "calling integration");
        let raw = self.integration.call(request).await?;

        match &self.response {
            Some(stage) => stage.apply("response", &raw),
            None => Ok(raw),
        }
    }
}

#[async_trait]
impl ActionablePlugin for ApiPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn state_names(&self) -> &[String] {
        &self.state_names
    }

    fn records_output(&self) -> bool {
        !self.kind.is_fire_and_forget()
    }

    #[instrument(skip(self, context), fields(plugin = %self.name, kind = %self.kind))]
    async fn invoke(&self, context: &Value) -> Result<PluginOutput, PluginError> {
        let result = self.exchange(context).await;

        if self.kind.is_fire_and_forget() {
            return match result {
                Ok(_) => Ok(PluginOutput::default()),
                Err(error) => {
                    warn!(plugin = %self.name, "webhook delivery failed: {error}");
                    Ok(PluginOutput::failure(None, error))
                }
            };
        }

        Ok(match result {
            Ok(body) => PluginOutput::success(self.success_action.clone(), Some(body)),
            Err(error) => {
                warn!(plugin = %self.name, "integration failed: {error}");
                PluginOutput::failure(self.error_action.clone(), error)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockIntegration;
    use serde_json::json;

    fn descriptor(kind: Option<PluginKind>) -> ApiPluginDescriptor {
        serde_json::from_value(json!({
            "name": "scoring",
            "stateNames": ["B"],
            "url": "https://scoring.example/v1",
            "pluginKind": kind,
            "request": {
                "transform": [{ "transformer": "jmespath", "mapping": "{ body: { value: amount } }" }]
            },
            "successAction": "SCORED",
            "errorAction": "SCORING_FAILED"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn successful_call_resolves_success_action() {
        let integration = Arc::new(MockIntegration::new());
        integration.respond("scoring", json!({ "score": 0.9 }));
        let plugin = ApiPlugin::try_new(&descriptor(None), PluginKind::Api, integration.clone()).unwrap();

        let out = plugin.invoke(&json!({ "amount": 10 })).await.unwrap();

        assert_eq!(out.callback_action.as_deref(), Some("SCORED"));
        assert_eq!(out.response_body, Some(json!({ "score": 0.9 })));
        assert!(out.error.is_none());

        let calls = integration.requests();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].body, json!({ "body": { "value": 10 } }));
        assert_eq!(calls[0].method, "POST");
    }

    #[tokio::test]
    async fn failed_call_resolves_error_action() {
        let integration = Arc::new(MockIntegration::new());
        integration.fail("scoring", PluginError::Http { status: 503, message: "down".into() });
        let plugin = ApiPlugin::try_new(&descriptor(None), PluginKind::Api, integration).unwrap();

        let out = plugin.invoke(&json!({ "amount": 10 })).await.unwrap();

        assert_eq!(out.callback_action.as_deref(), Some("SCORING_FAILED"));
        assert!(out.response_body.is_none());
        assert!(out.error.as_ref().is_some_and(PluginError::is_http));
    }

    #[tokio::test]
    async fn invalid_response_is_reported_as_error() {
        let mut d = descriptor(None);
        d.response = Some(PayloadSpec {
            schema: Some(json!({ "type": "object", "required": ["score"] })),
            ..PayloadSpec::default()
        });
        let integration = Arc::new(MockIntegration::new());
        integration.respond("scoring", json!({ "unexpected": true }));
        let plugin = ApiPlugin::try_new(&d, PluginKind::Api, integration).unwrap();

        let out = plugin.invoke(&json!({ "amount": 10 })).await.unwrap();

        assert_eq!(out.callback_action.as_deref(), Some("SCORING_FAILED"));
        assert!(matches!(out.error, Some(PluginError::Validation { stage: "response", .. })));
    }

    #[tokio::test]
    async fn webhook_never_raises_callbacks() {
        let integration = Arc::new(MockIntegration::new());
        let plugin =
            ApiPlugin::try_new(&descriptor(None), PluginKind::Webhook, integration.clone()).unwrap();

        let out = plugin.invoke(&json!({ "amount": 1 })).await.unwrap();

        assert!(!plugin.records_output());
        assert_eq!(out, PluginOutput::default());
        assert_eq!(integration.requests().len(), 1);
    }

    #[tokio::test]
    async fn identity_verification_carries_runtime_id() {
        let integration = Arc::new(MockIntegration::new());
        let plugin = ApiPlugin::try_new(
            &descriptor(Some(PluginKind::Kyc)),
            PluginKind::Kyc,
            integration.clone(),
        )
        .unwrap();

        plugin
            .invoke(&json!({ "amount": 1, "workflowRuntimeId": "wf-1" }))
            .await
            .unwrap();

        assert_eq!(integration.requests()[0].body["workflowRuntimeId"], "wf-1");
    }
}
